//! Gmail REST payloads — provider JSON inbound, `{"raw": ...}` outbound.
//!
//! A full-format Gmail message carries headers as a `name`/`value` list
//! and part payloads as base64url `body.data`. The part tree mirrors
//! MIME structure (`mimeType` + nested `parts`), so the same extractor
//! walks it through the [`MessagePart`] adapter below.

use base64::Engine as _;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use super::{MessagePart, extract_content, to_mime};
use crate::error::PayloadError;
use crate::message::{EmailMessage, split_references};

// ── Inbound ─────────────────────────────────────────────────────────

/// Parse one Gmail REST message object into a canonical message.
///
/// `message_id` is the Gmail API id (the handle `modify`/`get` expect),
/// not the RFC Message-ID header. Header lookup is case-insensitive
/// with the last occurrence winning; a missing or unparseable `Date`
/// falls back to `internalDate`, then to now.
pub fn parse_gmail_message(msg: &Value) -> Result<EmailMessage, PayloadError> {
    if !msg.is_object() {
        return Err(PayloadError::Malformed(
            "Gmail message is not a JSON object".to_string(),
        ));
    }

    let message_id = msg
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| PayloadError::MissingField {
            field: "id".to_string(),
        })?
        .to_string();
    let payload = msg.get("payload").ok_or_else(|| PayloadError::MissingField {
        field: "payload".to_string(),
    })?;

    let content = extract_content(&GmailPart { value: payload });

    let timestamp = header_lookup(payload, "date")
        .and_then(|date| DateTime::parse_from_rfc2822(date.trim()).ok())
        .map(|date| date.with_timezone(&Utc))
        .or_else(|| internal_date(msg))
        .unwrap_or_else(Utc::now);

    Ok(EmailMessage {
        message_id,
        subject: header_lookup(payload, "subject").unwrap_or_default().to_string(),
        from_address: header_lookup(payload, "from")
            .map(address_spec)
            .unwrap_or_default(),
        to_addresses: header_lookup(payload, "to").map(split_addresses).unwrap_or_default(),
        cc_addresses: header_lookup(payload, "cc").map(split_addresses).unwrap_or_default(),
        body_text: content.body_text,
        body_html: content.body_html,
        timestamp,
        references: header_lookup(payload, "references")
            .map(split_references)
            .unwrap_or_default(),
        in_reply_to: header_lookup(payload, "in-reply-to")
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string),
        attachments: content.attachments,
    })
}

/// One node of a Gmail `payload` part tree.
struct GmailPart<'a> {
    value: &'a Value,
}

impl<'a> MessagePart for GmailPart<'a> {
    fn mime_type(&self) -> String {
        self.value
            .get("mimeType")
            .and_then(Value::as_str)
            .unwrap_or("text/plain")
            .to_ascii_lowercase()
    }

    fn filename(&self) -> Option<String> {
        // Gmail sets "" on every non-attachment part
        self.value
            .get("filename")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }

    fn is_attachment_disposition(&self) -> bool {
        header_entries(self.value).any(|(name, value)| {
            name.eq_ignore_ascii_case("content-disposition")
                && value
                    .trim_start()
                    .get(..10)
                    .is_some_and(|head| head.eq_ignore_ascii_case("attachment"))
        })
    }

    fn decoded(&self) -> Option<Vec<u8>> {
        // parts fetched without data (attachmentId only) stay undecodable
        let data = self.value.get("body")?.get("data")?.as_str()?;
        decode_base64url(data)
    }

    fn children(&self) -> Vec<Self> {
        self.value
            .get("parts")
            .and_then(Value::as_array)
            .map(|parts| parts.iter().map(|value| GmailPart { value }).collect())
            .unwrap_or_default()
    }
}

/// Gmail tolerates both padded and unpadded base64url.
fn decode_base64url(data: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(data.trim_end_matches('=')).ok()
}

fn header_entries(value: &Value) -> impl Iterator<Item = (&str, &str)> + '_ {
    value
        .get("headers")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|h| Some((h.get("name")?.as_str()?, h.get("value")?.as_str()?)))
}

fn header_lookup<'v>(payload: &'v Value, name: &str) -> Option<&'v str> {
    let mut found = None;
    for (key, value) in header_entries(payload) {
        if key.eq_ignore_ascii_case(name) {
            found = Some(value);
        }
    }
    found
}

fn internal_date(msg: &Value) -> Option<DateTime<Utc>> {
    let millis = msg
        .get("internalDate")
        .and_then(Value::as_str)?
        .parse::<i64>()
        .ok()?;
    DateTime::from_timestamp(millis / 1000, 0)
}

/// Reduce `Display Name <addr@host>` to the bare addr-spec.
fn address_spec(raw: &str) -> String {
    if let (Some(open), Some(close)) = (raw.rfind('<'), raw.rfind('>'))
        && open < close
    {
        raw[open + 1..close].trim().to_string()
    } else {
        raw.trim().to_string()
    }
}

fn split_addresses(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(address_spec)
        .filter(|addr| !addr.is_empty())
        .collect()
}

// ── Outbound ────────────────────────────────────────────────────────

/// Serialize a canonical message into the body of a Gmail `send` call.
pub fn to_gmail_raw(message: &EmailMessage) -> Result<Value, PayloadError> {
    let bytes = to_mime(message)?;
    Ok(json!({ "raw": URL_SAFE.encode(bytes) }))
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::parse_rfc5322;
    use chrono::TimeZone;

    fn data(text: &str) -> String {
        URL_SAFE.encode(text)
    }

    #[test]
    fn parse_single_part_plain() {
        let msg = json!({
            "id": "18c2f0a9",
            "internalDate": "1704110400000",
            "payload": {
                "mimeType": "text/plain",
                "filename": "",
                "headers": [
                    {"name": "Subject", "value": "Hi"},
                    {"name": "From", "value": "Alice Smith <alice@example.com>"},
                    {"name": "To", "value": "bot@example.com"},
                    {"name": "Date", "value": "Mon, 1 Jan 2024 12:00:00 +0000"}
                ],
                "body": {"data": data("Hello from Gmail")}
            }
        });

        let parsed = parse_gmail_message(&msg).unwrap();
        assert_eq!(parsed.message_id, "18c2f0a9");
        assert_eq!(parsed.subject, "Hi");
        assert_eq!(parsed.from_address, "alice@example.com");
        assert_eq!(parsed.to_addresses, vec!["bot@example.com".to_string()]);
        assert_eq!(parsed.body_text, "Hello from Gmail");
        assert!(parsed.body_html.is_none());
        assert_eq!(
            parsed.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn parse_multipart_alternative() {
        let msg = json!({
            "id": "m1",
            "payload": {
                "mimeType": "multipart/alternative",
                "filename": "",
                "headers": [{"name": "Subject", "value": "Rich"}],
                "parts": [
                    {
                        "mimeType": "text/plain",
                        "filename": "",
                        "body": {"data": data("plain body")}
                    },
                    {
                        "mimeType": "text/html",
                        "filename": "",
                        "body": {"data": data("<p>plain body</p>")}
                    }
                ]
            }
        });

        let parsed = parse_gmail_message(&msg).unwrap();
        assert_eq!(parsed.body_text, "plain body");
        assert_eq!(parsed.body_html.as_deref(), Some("<p>plain body</p>"));
    }

    #[test]
    fn single_part_html_root() {
        let msg = json!({
            "id": "m1",
            "payload": {
                "mimeType": "text/html",
                "filename": "",
                "headers": [],
                "body": {"data": data("<p>Hello <b>there</b></p>")}
            }
        });

        let parsed = parse_gmail_message(&msg).unwrap();
        assert_eq!(parsed.body_text, "Hello there");
        assert_eq!(parsed.body_html.as_deref(), Some("<p>Hello <b>there</b></p>"));
    }

    #[test]
    fn attachment_with_data_captured_id_only_skipped() {
        let png = URL_SAFE.encode([0x89u8, 0x50, 0x4e, 0x47]);
        let msg = json!({
            "id": "m1",
            "payload": {
                "mimeType": "multipart/mixed",
                "filename": "",
                "headers": [],
                "parts": [
                    {
                        "mimeType": "text/plain",
                        "filename": "",
                        "body": {"data": data("see attached")}
                    },
                    {
                        "mimeType": "application/pdf",
                        "filename": "doc.pdf",
                        "body": {"attachmentId": "ATT1", "size": 12345}
                    },
                    {
                        "mimeType": "image/png",
                        "filename": "pic.png",
                        "body": {"data": png}
                    }
                ]
            }
        });

        let parsed = parse_gmail_message(&msg).unwrap();
        assert_eq!(parsed.body_text, "see attached");
        assert_eq!(parsed.attachments.len(), 1);
        assert_eq!(parsed.attachments[0].filename.as_deref(), Some("pic.png"));
        assert_eq!(parsed.attachments[0].payload, vec![0x89, 0x50, 0x4e, 0x47]);
    }

    #[test]
    fn disposition_header_classifies_attachment() {
        let msg = json!({
            "id": "m1",
            "payload": {
                "mimeType": "multipart/mixed",
                "filename": "",
                "headers": [],
                "parts": [
                    {
                        "mimeType": "text/plain",
                        "filename": "",
                        "headers": [
                            {"name": "Content-Disposition", "value": "attachment; filename=\"log.txt\""}
                        ],
                        "body": {"data": data("log line")}
                    }
                ]
            }
        });

        let parsed = parse_gmail_message(&msg).unwrap();
        assert!(parsed.body_text.is_empty());
        assert_eq!(parsed.attachments.len(), 1);
        assert_eq!(parsed.attachments[0].content_type, "text/plain");
    }

    #[test]
    fn references_header_kept_in_order() {
        let msg = json!({
            "id": "m1",
            "payload": {
                "mimeType": "text/plain",
                "filename": "",
                "headers": [
                    {"name": "References", "value": "<a@x.com> <b@x.com>"},
                    {"name": "In-Reply-To", "value": " <b@x.com> "}
                ],
                "body": {"data": data("x")}
            }
        });

        let parsed = parse_gmail_message(&msg).unwrap();
        assert_eq!(
            parsed.references,
            vec!["<a@x.com>".to_string(), "<b@x.com>".to_string()]
        );
        assert_eq!(parsed.in_reply_to.as_deref(), Some("<b@x.com>"));
    }

    #[test]
    fn header_lookup_is_case_insensitive_last_wins() {
        let msg = json!({
            "id": "m1",
            "payload": {
                "mimeType": "text/plain",
                "filename": "",
                "headers": [
                    {"name": "subject", "value": "first"},
                    {"name": "Subject", "value": "second"}
                ],
                "body": {"data": data("x")}
            }
        });

        assert_eq!(parse_gmail_message(&msg).unwrap().subject, "second");
    }

    #[test]
    fn recipients_split_and_stripped() {
        let msg = json!({
            "id": "m1",
            "payload": {
                "mimeType": "text/plain",
                "filename": "",
                "headers": [
                    {"name": "To", "value": "Bob <bob@x.com>, carol@x.com, "},
                    {"name": "Cc", "value": "Dana Deer <dana@x.com>"}
                ],
                "body": {"data": data("x")}
            }
        });

        let parsed = parse_gmail_message(&msg).unwrap();
        assert_eq!(
            parsed.to_addresses,
            vec!["bob@x.com".to_string(), "carol@x.com".to_string()]
        );
        assert_eq!(parsed.cc_addresses, vec!["dana@x.com".to_string()]);
    }

    #[test]
    fn bad_date_falls_back_to_internal_date() {
        let msg = json!({
            "id": "m1",
            "internalDate": "1704110400000",
            "payload": {
                "mimeType": "text/plain",
                "filename": "",
                "headers": [{"name": "Date", "value": "not a date"}],
                "body": {"data": data("x")}
            }
        });

        assert_eq!(
            parse_gmail_message(&msg).unwrap().timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn no_dates_at_all_fall_back_to_now() {
        let before = Utc::now();
        let msg = json!({
            "id": "m1",
            "payload": {
                "mimeType": "text/plain",
                "filename": "",
                "headers": [],
                "body": {"data": data("x")}
            }
        });

        let parsed = parse_gmail_message(&msg).unwrap();
        assert!(parsed.timestamp >= before);
        assert!(parsed.timestamp <= Utc::now());
    }

    #[test]
    fn missing_id_is_error() {
        let msg = json!({"payload": {"mimeType": "text/plain", "body": {}}});
        assert!(matches!(
            parse_gmail_message(&msg),
            Err(PayloadError::MissingField { field }) if field == "id"
        ));
    }

    #[test]
    fn missing_payload_is_error() {
        let msg = json!({"id": "m1"});
        assert!(matches!(
            parse_gmail_message(&msg),
            Err(PayloadError::MissingField { field }) if field == "payload"
        ));
    }

    #[test]
    fn non_object_is_malformed() {
        assert!(matches!(
            parse_gmail_message(&json!("hi")),
            Err(PayloadError::Malformed(_))
        ));
    }

    #[test]
    fn raw_send_body_round_trips() {
        let sent = EmailMessage::new(
            "agent@example.com",
            vec!["user@example.com".into()],
            "Answer",
            "Here you go.",
        )
        .unwrap();

        let body = to_gmail_raw(&sent).unwrap();
        let raw = body["raw"].as_str().unwrap();
        let bytes = URL_SAFE.decode(raw).unwrap();
        let back = parse_rfc5322(&bytes).unwrap();

        assert_eq!(back.subject, "Answer");
        assert_eq!(back.to_addresses, vec!["user@example.com".to_string()]);
        assert_eq!(back.body_text.trim_end(), "Here you go.");
    }

    #[test]
    fn unpadded_base64url_accepted() {
        assert_eq!(decode_base64url("aGk"), Some(b"hi".to_vec()));
        assert_eq!(decode_base64url("aGk="), Some(b"hi".to_vec()));
        assert_eq!(decode_base64url("!!!"), None);
    }
}
