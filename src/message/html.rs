//! HTML body conversion — quote-container extraction plus text rendering.
//!
//! Webmail clients wrap earlier thread content in structurally
//! recognizable containers. Conversion extracts those containers first,
//! renders the remaining main content as text, then reattaches each quote
//! `> `-prefixed so downstream plain-text processing sees the usual
//! quoting convention.

/// One structural pattern identifying a mail client's quote wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteSelector {
    /// Any element with this name.
    Tag(&'static str),
    /// Any element carrying this class token.
    Class(&'static str),
    /// Element name plus class token.
    TagClass(&'static str, &'static str),
    /// Element name plus an attribute whose value contains the substring.
    TagAttr(&'static str, &'static str, &'static str),
}

/// Quote wrappers used by the major webmail clients.
pub const QUOTE_SELECTORS: &[QuoteSelector] = &[
    QuoteSelector::Tag("blockquote"),
    QuoteSelector::TagClass("div", "gmail_quote"),
    QuoteSelector::TagAttr("div", "style", "margin-left: 1em"),
    QuoteSelector::TagAttr("div", "style", "border-left"),
    QuoteSelector::Class("yahoo_quoted"),
    QuoteSelector::Class("outlook_quote"),
    QuoteSelector::TagAttr("div", "data-marker", "__QUOTED_TEXT__"),
];

/// Elements that force a paragraph break around their content.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "pre", "blockquote", "ul", "ol", "li", "table", "tr", "h1", "h2", "h3", "h4", "h5",
    "h6",
];

/// Elements that never have a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "br", "hr", "img", "meta", "link", "input", "area", "base", "col", "embed", "source", "track",
    "wbr",
];

impl QuoteSelector {
    fn matches(&self, name: &str, attrs: &str) -> bool {
        match *self {
            Self::Tag(tag) => name == tag,
            Self::Class(class) => has_class_token(attrs, class),
            Self::TagClass(tag, class) => name == tag && has_class_token(attrs, class),
            Self::TagAttr(tag, attr, needle) => {
                name == tag && attr_value(attrs, attr).is_some_and(|v| v.contains(needle))
            }
        }
    }
}

/// Convert an HTML email body to text using the standard quote selectors.
pub fn convert_html_to_text(html: &str) -> String {
    convert_with_selectors(html, QUOTE_SELECTORS)
}

/// Convert an HTML email body to text with a caller-supplied selector set.
///
/// Quote containers are removed from the main flow and re-rendered after
/// it, each line `> `-prefixed, blocks separated by blank lines. A
/// container nested inside another matched container stays part of the
/// outer quote rather than being extracted twice. Output is deterministic
/// for identical input.
pub fn convert_with_selectors(html: &str, selectors: &[QuoteSelector]) -> String {
    struct Frame {
        name: String,
        starts_quote: bool,
    }

    let mut stack: Vec<Frame> = Vec::new();
    let mut main = String::new();
    let mut quote_buf = String::new();
    let mut quotes: Vec<String> = Vec::new();
    let mut in_quote = false;
    let mut skipping: Option<String> = None;

    for token in tokenize(html) {
        // script/style content is dropped wholesale
        if let Some(skip_tag) = &skipping {
            if let Token::Close { name } = &token
                && name == skip_tag
            {
                skipping = None;
            }
            continue;
        }

        match token {
            Token::Text(text) => {
                let sink = if in_quote { &mut quote_buf } else { &mut main };
                push_text(sink, text);
            }
            Token::Open {
                name,
                attrs,
                self_closing,
            } => {
                if name == "script" || name == "style" {
                    if !self_closing {
                        skipping = Some(name);
                    }
                    continue;
                }
                if name == "br" {
                    let sink = if in_quote { &mut quote_buf } else { &mut main };
                    sink.push('\n');
                    continue;
                }
                if VOID_ELEMENTS.contains(&name.as_str()) {
                    continue;
                }
                if BLOCK_ELEMENTS.contains(&name.as_str()) {
                    let sink = if in_quote { &mut quote_buf } else { &mut main };
                    sink.push('\n');
                }
                let starts_quote = !in_quote && selectors.iter().any(|s| s.matches(&name, attrs));
                if starts_quote {
                    in_quote = true;
                }
                if !self_closing {
                    stack.push(Frame { name, starts_quote });
                } else if starts_quote {
                    // self-closed container: nothing was captured
                    in_quote = false;
                }
            }
            Token::Close { name } => {
                if VOID_ELEMENTS.contains(&name.as_str()) {
                    continue;
                }
                if BLOCK_ELEMENTS.contains(&name.as_str()) {
                    let sink = if in_quote { &mut quote_buf } else { &mut main };
                    sink.push('\n');
                }
                // close the topmost matching frame, implicitly closing
                // anything left open above it
                if let Some(idx) = stack.iter().rposition(|f| f.name == name) {
                    for frame in stack.split_off(idx) {
                        if frame.starts_quote {
                            in_quote = false;
                            finish_quote(&mut quote_buf, &mut quotes);
                        }
                    }
                }
            }
        }
    }

    // unterminated container at end of input
    if in_quote {
        finish_quote(&mut quote_buf, &mut quotes);
    }

    let main_text = collapse_lines(&main);
    let mut parts: Vec<String> = Vec::new();
    if !main_text.is_empty() {
        parts.push(main_text);
    }
    for quote in quotes {
        let prefixed = quote
            .split('\n')
            .map(|line| format!("> {line}"))
            .collect::<Vec<_>>()
            .join("\n");
        parts.push(prefixed);
    }
    parts.join("\n\n")
}

fn finish_quote(buf: &mut String, quotes: &mut Vec<String>) {
    let cleaned = collapse_lines(buf);
    if !cleaned.is_empty() {
        quotes.push(cleaned);
    }
    buf.clear();
}

// ── Tokenizer ───────────────────────────────────────────────────────

enum Token<'a> {
    Text(&'a str),
    Open {
        name: String,
        attrs: &'a str,
        self_closing: bool,
    },
    Close {
        name: String,
    },
}

fn tokenize(html: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < html.len() {
        let rest = &html[pos..];
        match rest.find('<') {
            None => {
                tokens.push(Token::Text(rest));
                break;
            }
            Some(lt) => {
                if lt > 0 {
                    tokens.push(Token::Text(&rest[..lt]));
                }
                let tag_start = &rest[lt..];
                if tag_start.starts_with("<!--") {
                    match tag_start.find("-->") {
                        Some(end) => pos += lt + end + 3,
                        None => break,
                    }
                    continue;
                }
                if tag_start.starts_with("<!") || tag_start.starts_with("<?") {
                    match tag_start.find('>') {
                        Some(end) => pos += lt + end + 1,
                        None => break,
                    }
                    continue;
                }
                let Some(tag_len) = find_tag_end(tag_start) else {
                    // unterminated tag: drop the remainder
                    break;
                };
                let inner = tag_start[1..tag_len - 1].trim();
                pos += lt + tag_len;

                if let Some(close_name) = inner.strip_prefix('/') {
                    let name = close_name
                        .split_whitespace()
                        .next()
                        .unwrap_or("")
                        .to_ascii_lowercase();
                    if !name.is_empty() {
                        tokens.push(Token::Close { name });
                    }
                } else {
                    let self_closing = inner.ends_with('/');
                    let inner = inner.trim_end_matches('/').trim_end();
                    let (name, attrs) = split_name_attrs(inner);
                    if !name.is_empty() {
                        tokens.push(Token::Open {
                            name,
                            attrs,
                            self_closing,
                        });
                    }
                }
            }
        }
    }

    tokens
}

/// Length of the tag starting at `rest` (which begins with `<`), honoring
/// quoted attribute values that may contain `>`.
fn find_tag_end(rest: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, ch) in rest.char_indices().skip(1) {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '>') => return Some(i + 1),
            _ => {}
        }
    }
    None
}

fn split_name_attrs(inner: &str) -> (String, &str) {
    match inner.find(char::is_whitespace) {
        Some(i) => (inner[..i].to_ascii_lowercase(), inner[i..].trim_start()),
        None => (inner.to_ascii_lowercase(), ""),
    }
}

/// Look up one attribute's value in a raw attribute string.
fn attr_value<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    let mut rest = attrs.trim_start();
    while !rest.is_empty() {
        let name_end = rest
            .find(|c: char| c.is_whitespace() || c == '=')
            .unwrap_or(rest.len());
        let attr = &rest[..name_end];
        rest = rest[name_end..].trim_start();

        let mut value = "";
        if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            if let Some(quoted) = after_eq.strip_prefix('"') {
                let end = quoted.find('"').unwrap_or(quoted.len());
                value = &quoted[..end];
                rest = &quoted[(end + 1).min(quoted.len())..];
            } else if let Some(quoted) = after_eq.strip_prefix('\'') {
                let end = quoted.find('\'').unwrap_or(quoted.len());
                value = &quoted[..end];
                rest = &quoted[(end + 1).min(quoted.len())..];
            } else {
                let end = after_eq
                    .find(char::is_whitespace)
                    .unwrap_or(after_eq.len());
                value = &after_eq[..end];
                rest = &after_eq[end..];
            }
        }
        if !attr.is_empty() && attr.eq_ignore_ascii_case(name) {
            return Some(value);
        }
        rest = rest.trim_start();
    }
    None
}

fn has_class_token(attrs: &str, token: &str) -> bool {
    attr_value(attrs, "class").is_some_and(|v| v.split_whitespace().any(|t| t == token))
}

// ── Text rendering ──────────────────────────────────────────────────

fn push_text(sink: &mut String, text: &str) {
    if text.contains('&') {
        sink.push_str(&decode_entities(text));
    } else {
        sink.push_str(text);
    }
}

/// Decode the entities that actually occur in mail HTML.
fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Trim each line and collapse blank runs to a single blank line.
fn collapse_lines(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut prev_was_blank = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !prev_was_blank {
                cleaned.push('\n');
                prev_was_blank = true;
            }
        } else {
            cleaned.push_str(trimmed);
            cleaned.push('\n');
            prev_was_blank = false;
        }
    }
    cleaned.trim().to_string()
}

// ── Tests ───────────────────────────────────────────────────────────
