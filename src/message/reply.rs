//! Quoted-history construction for reply bodies.

use chrono::{DateTime, Utc};

/// Format for the `Date:` line inside a quote banner.
const BANNER_DATE_FORMAT: &str = "%b %d, %Y, at %I:%M %p";

/// Build a reply body that quotes the original message below the reply.
///
/// The quoted block opens with an `-------- Original Message --------`
/// banner carrying the original subject, date, and sender, then the
/// original text with every line prefixed by `quote_level` copies of `>`
/// plus a space (blank lines get the bare prefix). Lines already quoted
/// keep their own markers and gain one more level, so replying to a reply
/// deepens the nesting by one each generation. With `include_history`
/// false, the reply text is returned untouched.
pub fn build_reply_body(
    original_text: &str,
    reply_text: &str,
    quote_level: usize,
    include_history: bool,
    subject: &str,
    timestamp: Option<DateTime<Utc>>,
    from_address: &str,
) -> String {
    if !include_history {
        return reply_text.to_string();
    }

    let prefix = ">".repeat(quote_level);
    let date = match timestamp {
        Some(ts) => ts.format(BANNER_DATE_FORMAT).to_string(),
        None => "N/A".to_string(),
    };

    let mut lines: Vec<String> = vec![
        String::new(),
        String::new(),
        format!("{prefix} -------- Original Message --------"),
        format!("{prefix} Subject: {subject}"),
        format!("{prefix} Date: {date}"),
        format!("{prefix} From: {from_address}"),
        prefix.clone(),
    ];

    for line in original_text.lines() {
        if line.trim().is_empty() {
            lines.push(prefix.clone());
        } else {
            lines.push(format!("{prefix} {line}"));
        }
    }

    format!("{reply_text}{}", lines.join("\n"))
}
