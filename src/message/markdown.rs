//! Markdown to HTML promotion for outbound bodies.
//!
//! When a handler produces plain text that clearly carries markdown,
//! outbound serialization synthesizes an HTML alternative so mail
//! clients render formatting instead of literal markers. Detection is a
//! heuristic over a fixed marker set; prose that merely resembles
//! markdown is an accepted false positive.

use pulldown_cmark::{Event, Options, Parser, html};

/// Render markdown to HTML.
///
/// Single newlines become hard line breaks, since line structure in a
/// mail body is intentional rather than source-wrapping.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });

    let mut output = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut output, parser);
    output
}

/// Whether plain text carries enough markdown to justify an HTML part.
pub fn has_markdown_markers(text: &str) -> bool {
    if text.contains("```") || text.contains("**") {
        return true;
    }
    text.lines().any(|line| {
        let trimmed = line.trim_start();
        is_heading(trimmed) || trimmed.starts_with("> ") || trimmed == ">" || trimmed.starts_with("- ")
    })
}

fn is_heading(line: &str) -> bool {
    let hashes = line.len() - line.trim_start_matches('#').len();
    (1..=6).contains(&hashes) && line[hashes..].starts_with(' ')
}
