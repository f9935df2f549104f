//! Plain-text body processing — quote-run segmentation and part combining.

/// Normalize a plain-text body that may contain inline `>`-quoted lines.
///
/// Splits the input into runs: each contiguous block of `>`-prefixed lines
/// is a quote run, each contiguous block of other lines a plain run. Runs
/// are re-joined in original order with runs of only blank lines dropped.
/// Idempotent — re-applying to its own output changes nothing.
pub fn process_text_with_quotes(content: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current_text: Vec<&str> = Vec::new();
    let mut current_quote: Vec<&str> = Vec::new();

    for line in content.split('\n') {
        if line.starts_with('>') {
            if !current_text.is_empty() {
                parts.push(current_text.join("\n"));
                current_text.clear();
            }
            current_quote.push(line);
        } else {
            if !current_quote.is_empty() {
                parts.push(current_quote.join("\n"));
                current_quote.clear();
            }
            current_text.push(line);
        }
    }

    if !current_text.is_empty() {
        parts.push(current_text.join("\n"));
    }
    if !current_quote.is_empty() {
        parts.push(current_quote.join("\n"));
    }

    parts.retain(|part| !part.trim().is_empty());
    parts.join("\n")
}

/// Join text parts with newlines, dropping blank parts, preserving order.
pub fn combine_text_parts<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    parts
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
