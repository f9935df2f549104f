//! Transport payload parsing and serialization.
//!
//! The extractor normalizes any part tree into bodies plus attachments
//! through the [`MessagePart`] capability trait; [`mime`] and [`gmail`]
//! adapt the two wire shapes (RFC 5322 byte streams, provider JSON) and
//! provide the whole-payload parse and serialize entry points.

pub mod gmail;
pub mod mime;

use crate::message::{
    Attachment, combine_text_parts, convert_html_to_text, process_text_with_quotes,
};

pub use gmail::{parse_gmail_message, to_gmail_raw};
pub use mime::{parse_rfc5322, to_mime};

/// Capability view of one node in a message content tree.
pub trait MessagePart: Sized {
    /// Lowercased MIME type, e.g. `text/plain`.
    fn mime_type(&self) -> String;
    /// Declared filename, if any.
    fn filename(&self) -> Option<String>;
    /// Whether the part declares an attachment disposition.
    fn is_attachment_disposition(&self) -> bool;
    /// Decoded payload bytes; `None` when the payload cannot be decoded.
    fn decoded(&self) -> Option<Vec<u8>>;
    /// Child parts, empty for leaves.
    fn children(&self) -> Vec<Self>;
    /// Containers hold children and carry no payload of their own.
    fn is_container(&self) -> bool {
        self.mime_type().starts_with("multipart/")
    }
}

/// Bodies and attachments pulled out of one part tree.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExtractedContent {
    pub body_text: String,
    pub body_html: Option<String>,
    pub attachments: Vec<Attachment>,
}

/// Normalize a part tree into `(body_text, body_html, attachments)`.
///
/// Leaves are classified in document order. A leaf with an attachment
/// disposition, a filename, or an `image/*` content type is an
/// attachment — that rule wins over text classification. Remaining
/// `text/plain` leaves are collected and joined (blank parts dropped);
/// the first `text/html` leaf becomes `body_html`. When no plain leaves
/// exist, `body_text` is synthesized from the first HTML leaf. A leaf
/// that fails to decode is skipped; siblings still contribute.
pub fn extract_content<P: MessagePart>(root: &P) -> ExtractedContent {
    if !root.is_container() {
        return extract_single(root);
    }

    let mut text_parts: Vec<String> = Vec::new();
    let mut html_parts: Vec<String> = Vec::new();
    let mut attachments: Vec<Attachment> = Vec::new();
    walk(root, &mut text_parts, &mut html_parts, &mut attachments);

    let body_text = if !text_parts.is_empty() {
        combine_text_parts(text_parts.iter().map(String::as_str))
    } else if let Some(html) = html_parts.first() {
        convert_html_to_text(html)
    } else {
        String::new()
    };

    ExtractedContent {
        body_text,
        body_html: html_parts.into_iter().next(),
        attachments,
    }
}

fn walk<P: MessagePart>(
    part: &P,
    text_parts: &mut Vec<String>,
    html_parts: &mut Vec<String>,
    attachments: &mut Vec<Attachment>,
) {
    for child in part.children() {
        if child.is_container() {
            walk(&child, text_parts, html_parts, attachments);
            continue;
        }

        let mime_type = child.mime_type();
        if child.is_attachment_disposition()
            || child.filename().is_some()
            || mime_type.starts_with("image/")
        {
            if let Some(payload) = child.decoded() {
                attachments.push(Attachment::new(child.filename(), mime_type, payload));
            }
        } else if mime_type == "text/plain" {
            if let Some(text) = decode_text(&child) {
                text_parts.push(text);
            }
        } else if mime_type == "text/html" {
            if let Some(html) = decode_text(&child) {
                html_parts.push(html);
            }
        }
    }
}

/// Single-part root: the whole payload is the body.
fn extract_single<P: MessagePart>(root: &P) -> ExtractedContent {
    let Some(content) = decode_text(root) else {
        return ExtractedContent::default();
    };

    if root.mime_type() == "text/html" {
        ExtractedContent {
            body_text: convert_html_to_text(&content),
            body_html: Some(content),
            attachments: Vec::new(),
        }
    } else {
        ExtractedContent {
            body_text: process_text_with_quotes(&content),
            body_html: None,
            attachments: Vec::new(),
        }
    }
}

/// Decode a text leaf, canonicalizing wire CRLF line endings to `\n`.
fn decode_text<P: MessagePart>(part: &P) -> Option<String> {
    let text = String::from_utf8(part.decoded()?).ok()?;
    if text.contains('\r') {
        Some(text.replace("\r\n", "\n"))
    } else {
        Some(text)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
