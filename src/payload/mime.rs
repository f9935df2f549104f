//! RFC 5322 payloads — mail-parser inbound, lettre outbound.

use chrono::{DateTime, Utc};
use lettre::Message;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as AttachmentPart, Mailbox, MultiPart, SinglePart};
use mail_parser::{HeaderValue, MessageParser, MimeHeaders, PartType};
use uuid::Uuid;

use super::{MessagePart, extract_content};
use crate::error::PayloadError;
use crate::message::{
    Attachment, EmailMessage, has_markdown_markers, markdown_to_html, split_references,
};

// ── Inbound ─────────────────────────────────────────────────────────

/// Parse raw RFC 5322 bytes into a canonical message.
///
/// Header extraction is lenient: missing headers become empty values, a
/// missing or unparseable `Date` falls back to now, and a missing
/// `Message-ID` gets a generated `gen-` identifier so deduplication and
/// threading keep working. Only a byte stream mail-parser rejects
/// outright is an error.
pub fn parse_rfc5322(raw: &[u8]) -> Result<EmailMessage, PayloadError> {
    let parsed = MessageParser::default().parse(raw).ok_or_else(|| {
        PayloadError::Malformed(format!("Not an RFC 5322 message ({} bytes)", raw.len()))
    })?;

    let root = MimePart {
        message: &parsed,
        part_id: 0,
    };
    let content = extract_content(&root);

    let message_id = parsed
        .message_id()
        .map(str::to_string)
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("gen-{}", Uuid::new_v4()));

    let timestamp = parsed
        .date()
        .and_then(|date| DateTime::from_timestamp(date.to_timestamp(), 0))
        .unwrap_or_else(Utc::now);

    Ok(EmailMessage {
        message_id,
        subject: parsed.subject().unwrap_or_default().to_string(),
        from_address: extract_addresses(parsed.from()).into_iter().next().unwrap_or_default(),
        to_addresses: extract_addresses(parsed.to()),
        cc_addresses: extract_addresses(parsed.cc()),
        body_text: content.body_text,
        body_html: content.body_html,
        timestamp,
        references: header_id_list(parsed.references()),
        in_reply_to: header_first_id(parsed.in_reply_to()),
        attachments: content.attachments,
    })
}

/// One node of a parsed MIME tree, addressed by part id.
struct MimePart<'a> {
    message: &'a mail_parser::Message<'a>,
    part_id: mail_parser::MessagePartId,
}

impl<'a> MimePart<'a> {
    fn part(&self) -> Option<&'a mail_parser::MessagePart<'a>> {
        self.message.part(self.part_id)
    }
}

impl<'a> MessagePart for MimePart<'a> {
    fn mime_type(&self) -> String {
        let Some(content_type) = self.part().and_then(|p| p.content_type()) else {
            return "text/plain".to_string();
        };
        match content_type.subtype() {
            Some(subtype) => {
                format!("{}/{}", content_type.ctype(), subtype).to_ascii_lowercase()
            }
            None => content_type.ctype().to_ascii_lowercase(),
        }
    }

    fn filename(&self) -> Option<String> {
        self.part()
            .and_then(|p| p.attachment_name())
            .map(str::to_string)
    }

    fn is_attachment_disposition(&self) -> bool {
        self.part()
            .and_then(|p| p.content_disposition())
            .is_some_and(|d| d.ctype().eq_ignore_ascii_case("attachment"))
    }

    fn decoded(&self) -> Option<Vec<u8>> {
        match &self.part()?.body {
            PartType::Text(text) | PartType::Html(text) => Some(text.as_bytes().to_vec()),
            PartType::Binary(bytes) | PartType::InlineBinary(bytes) => Some(bytes.to_vec()),
            _ => None,
        }
    }

    fn children(&self) -> Vec<Self> {
        match self.part().map(|p| &p.body) {
            Some(PartType::Multipart(ids)) => ids
                .iter()
                .map(|id| MimePart {
                    message: self.message,
                    part_id: *id,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn is_container(&self) -> bool {
        matches!(self.part().map(|p| &p.body), Some(PartType::Multipart(_)))
    }
}

/// Pull plain addresses out of a parsed address header.
fn extract_addresses(addr: Option<&mail_parser::Address<'_>>) -> Vec<String> {
    let Some(addr) = addr else {
        return Vec::new();
    };
    match addr {
        mail_parser::Address::List(list) => list
            .iter()
            .filter_map(|a| a.address.as_ref().map(|s| s.to_string()))
            .collect(),
        mail_parser::Address::Group(groups) => groups
            .iter()
            .flat_map(|g| {
                g.addresses
                    .iter()
                    .filter_map(|a| a.address.as_ref().map(|s| s.to_string()))
            })
            .collect(),
    }
}

fn header_first_id(value: &HeaderValue<'_>) -> Option<String> {
    match value {
        HeaderValue::Text(text) => Some(text.to_string()),
        HeaderValue::TextList(list) => list.first().map(|s| s.to_string()),
        _ => None,
    }
    .filter(|id| !id.is_empty())
}

fn header_id_list(value: &HeaderValue<'_>) -> Vec<String> {
    match value {
        HeaderValue::Text(text) => split_references(text),
        HeaderValue::TextList(list) => list.iter().map(|s| s.to_string()).collect(),
        _ => Vec::new(),
    }
}

// ── Outbound ────────────────────────────────────────────────────────

/// Serialize a canonical message to RFC 5322 bytes.
///
/// Headers go first in a fixed order, then the body: single-part plain
/// when there is nothing else, `multipart/alternative` (plain first)
/// when HTML is present or promoted from markdown, and a
/// `multipart/mixed` wrapper when attachments ride along. Addresses are
/// validated before any bytes are produced.
pub fn to_mime(message: &EmailMessage) -> Result<Vec<u8>, PayloadError> {
    message.validate()?;

    let mut builder = Message::builder()
        .subject(message.subject.as_str())
        .from(parse_mailbox(&message.from_address)?)
        .date(message.timestamp.into());
    for to in &message.to_addresses {
        builder = builder.to(parse_mailbox(to)?);
    }
    for cc in &message.cc_addresses {
        builder = builder.cc(parse_mailbox(cc)?);
    }
    if let Some(parent) = message.in_reply_to.as_deref().filter(|id| !id.is_empty()) {
        builder = builder.in_reply_to(angle_bracketed(parent));
    }
    if !message.references.is_empty() {
        let joined = message
            .references
            .iter()
            .filter(|id| !id.is_empty())
            .map(|id| angle_bracketed(id))
            .collect::<Vec<_>>()
            .join(" ");
        builder = builder.references(joined);
    }
    if !message.message_id.is_empty() {
        // empty means not-yet-sent; lettre then generates one at build time
        builder = builder.message_id(Some(angle_bracketed(&message.message_id)));
    }

    let body_html = promoted_html(message);
    let built = if message.attachments.is_empty() {
        match body_html {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                message.body_text.clone(),
                html,
            )),
            None => builder.singlepart(SinglePart::plain(message.body_text.clone())),
        }
    } else {
        let mut mixed = match body_html {
            Some(html) => MultiPart::mixed().multipart(MultiPart::alternative_plain_html(
                message.body_text.clone(),
                html,
            )),
            None => MultiPart::mixed().singlepart(SinglePart::plain(message.body_text.clone())),
        };
        for attachment in &message.attachments {
            mixed = mixed.singlepart(build_attachment(attachment)?);
        }
        builder.multipart(mixed)
    }
    .map_err(|e| PayloadError::MimeBuild(e.to_string()))?;

    Ok(built.formatted())
}

/// The HTML body to send: native, or synthesized when the plain text
/// clearly carries markdown.
fn promoted_html(message: &EmailMessage) -> Option<String> {
    match &message.body_html {
        Some(html) => Some(html.clone()),
        None if has_markdown_markers(&message.body_text) => {
            Some(markdown_to_html(&message.body_text))
        }
        None => None,
    }
}

fn build_attachment(attachment: &Attachment) -> Result<SinglePart, PayloadError> {
    let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
        PayloadError::MimeBuild(format!(
            "Invalid attachment content type {:?}: {e}",
            attachment.content_type
        ))
    })?;
    let filename = attachment.filename.clone().unwrap_or_default();
    Ok(AttachmentPart::new(filename).body(attachment.payload.clone(), content_type))
}

fn parse_mailbox(address: &str) -> Result<Mailbox, PayloadError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| PayloadError::MimeBuild(format!("Invalid mailbox {address:?}: {e}")))
}

/// Message IDs travel bracketed on the wire; the model stores them bare.
fn angle_bracketed(id: &str) -> String {
    let id = id.trim();
    if id.starts_with('<') && id.ends_with('>') {
        id.to_string()
    } else {
        format!("<{id}>")
    }
}

// ── Tests ───────────────────────────────────────────────────────────
