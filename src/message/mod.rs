//! Canonical message model and the transforms that operate on it.
//!
//! `EmailMessage` is the single in-memory representation every transport
//! payload normalizes into and every outbound payload serializes from.
//! Submodules hold the pure transforms: quote-aware text processing,
//! HTML-to-text conversion, markdown promotion, and reply building.

pub mod html;
pub mod markdown;
pub mod reply;
pub mod text;
pub mod validate;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MessageError;

pub use html::{QUOTE_SELECTORS, QuoteSelector, convert_html_to_text};
pub use markdown::{has_markdown_markers, markdown_to_html};
pub use reply::build_reply_body;
pub use text::{combine_text_parts, process_text_with_quotes};
pub use validate::is_valid_address;

/// One opaque attachment payload carried by a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Declared filename, if the part carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// MIME type, e.g. `image/jpeg`.
    pub content_type: String,
    /// Decoded payload bytes.
    pub payload: Vec<u8>,
}

impl Attachment {
    pub fn new(filename: Option<String>, content_type: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            filename,
            content_type: content_type.into(),
            payload,
        }
    }
}

/// One logical email, inbound or outbound.
///
/// Inbound instances come from [`crate::payload`] parsing; outbound
/// instances from [`EmailMessage::new`] or [`EmailMessage::create_reply`].
/// Transformations always build a new instance — nothing mutates a
/// received message in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Transport-assigned identifier; empty until the transport sends it.
    #[serde(default)]
    pub message_id: String,
    /// Subject line.
    pub subject: String,
    /// Sender address.
    pub from_address: String,
    /// To recipients, order preserved.
    pub to_addresses: Vec<String>,
    /// CC recipients.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc_addresses: Vec<String>,
    /// Plain-text body; always present, empty when nothing decodable.
    #[serde(default)]
    pub body_text: String,
    /// HTML body, only when natively supplied or promoted from markdown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
    /// Origination time; falls back to "now" when inbound parsing finds
    /// nothing usable, never absent.
    pub timestamp: DateTime<Utc>,
    /// Thread ancestor message IDs, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    /// Immediate parent message ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    /// Attachments in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl EmailMessage {
    /// Create an outbound message, validating sender and recipients.
    pub fn new(
        from_address: impl Into<String>,
        to_addresses: Vec<String>,
        subject: impl Into<String>,
        body_text: impl Into<String>,
    ) -> Result<Self, MessageError> {
        let from_address = from_address.into();
        validate::check_address("from_address", &from_address)?;
        validate::check_addresses("to_addresses", &to_addresses)?;
        Ok(Self {
            message_id: String::new(),
            subject: subject.into(),
            from_address,
            to_addresses,
            cc_addresses: Vec::new(),
            body_text: body_text.into(),
            body_html: None,
            timestamp: Utc::now(),
            references: Vec::new(),
            in_reply_to: None,
            attachments: Vec::new(),
        })
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    /// Set CC recipients, validating each entry.
    pub fn with_cc(mut self, cc_addresses: Vec<String>) -> Result<Self, MessageError> {
        validate::check_addresses("cc_addresses", &cc_addresses)?;
        self.cc_addresses = cc_addresses;
        Ok(self)
    }

    pub fn with_body_html(mut self, body_html: impl Into<String>) -> Self {
        self.body_html = Some(body_html.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_references(mut self, references: Vec<String>) -> Self {
        self.references = references;
        self
    }

    pub fn with_in_reply_to(mut self, in_reply_to: impl Into<String>) -> Self {
        self.in_reply_to = Some(in_reply_to.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Validate addresses on an already-built message.
    ///
    /// Inbound parsing is deliberately lenient; this is the check outbound
    /// serialization runs before handing bytes to a transport.
    pub fn validate(&self) -> Result<(), MessageError> {
        validate::check_address("from_address", &self.from_address)?;
        validate::check_addresses("to_addresses", &self.to_addresses)?;
        validate::check_addresses("cc_addresses", &self.cc_addresses)?;
        Ok(())
    }

    /// Build a threaded reply to this message.
    ///
    /// The reply goes back to the sender, keeps the CC list, extends
    /// `references` with this message's ID, and quotes this message's body
    /// below the reply text when `include_history` is set. The reply's
    /// `from_address` is the first entry of this message's recipients —
    /// the address the original was delivered to answers it.
    ///
    /// Fails when this message has no recipients: with nobody in
    /// `to_addresses` there is no address to reply from.
    pub fn create_reply(
        &self,
        reply_text: &str,
        include_history: bool,
        quote_level: usize,
    ) -> Result<Self, MessageError> {
        if self.to_addresses.is_empty() {
            return Err(MessageError::NoRecipients);
        }

        let mut references = self.references.clone();
        if !self.message_id.is_empty() {
            references.push(self.message_id.clone());
        }

        let subject = if self.subject.starts_with("Re: ") {
            self.subject.clone()
        } else {
            format!("Re: {}", self.subject)
        };

        let body_text = build_reply_body(
            &self.body_text,
            reply_text,
            quote_level,
            include_history,
            &self.subject,
            Some(self.timestamp),
            &self.from_address,
        );

        Ok(Self {
            message_id: String::new(),
            subject,
            from_address: self.to_addresses[0].clone(),
            to_addresses: vec![self.from_address.clone()],
            cc_addresses: self.cc_addresses.clone(),
            body_text,
            body_html: None,
            timestamp: Utc::now(),
            references,
            in_reply_to: (!self.message_id.is_empty()).then(|| self.message_id.clone()),
            attachments: Vec::new(),
        })
    }

    /// Reply with quoted history at one quote level.
    pub fn reply(&self, reply_text: &str) -> Result<Self, MessageError> {
        self.create_reply(reply_text, true, 1)
    }
}

// ── References normalization ────────────────────────────────────────

/// Split a raw `References` header into individual message IDs.
pub fn split_references(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

/// Normalize a JSON references value into a list of message IDs.
///
/// Providers hand references back as either one space-delimited header
/// string or a sequence of IDs; both collapse to the same list. Null and
/// the empty string mean no ancestors. Every other shape is a hard
/// construction error, never coerced.
pub fn parse_references(value: &Value) -> Result<Vec<String>, MessageError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(raw) => Ok(split_references(raw)),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(id) => Ok(id.trim().to_string()),
                other => Err(MessageError::InvalidReferences {
                    found: json_type_name(other).to_string(),
                }),
            })
            .filter(|entry| !matches!(entry, Ok(id) if id.is_empty()))
            .collect(),
        other => Err(MessageError::InvalidReferences {
            found: json_type_name(other).to_string(),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Tests ───────────────────────────────────────────────────────────
