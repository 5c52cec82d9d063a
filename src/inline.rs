//! Inline markdown – splits a paragraph's text into styled [`Span`]s.
//!
//! Recognised constructs, tried in this order at every position:
//!
//! 1. `**text**` / `__text__` → bold
//! 2. `*text*` / `_text_` → italic
//! 3. `` `code` `` → monospace
//! 4. `[label](url)` → underlined label, URL dropped
//!
//! The scan runs once, left to right. Each construct closes at the nearest
//! delimiter that leaves non-empty content, and matched content is emitted
//! literally: `` `**x**` `` is the code span `**x**`, never bold.

/// Visual flags of a span. `color` is a colour reference (name or `#hex`)
/// that overrides whatever the paragraph or span kind would pick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanStyle {
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    pub link: bool,
    pub color: Option<String>,
}

/// A run of text with uniform inline styling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub style: SpanStyle,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: SpanStyle::default(),
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        let mut span = Self::plain(text);
        span.style.bold = true;
        span
    }

    pub fn italic(text: impl Into<String>) -> Self {
        let mut span = Self::plain(text);
        span.style.italic = true;
        span
    }

    pub fn code(text: impl Into<String>) -> Self {
        let mut span = Self::plain(text);
        span.style.code = true;
        span
    }

    pub fn link(label: impl Into<String>) -> Self {
        let mut span = Self::plain(label);
        span.style.link = true;
        span
    }

    pub fn colored(text: impl Into<String>, color: impl Into<String>) -> Self {
        let mut span = Self::plain(text);
        span.style.color = Some(color.into());
        span
    }
}

/// Concatenate the visible text of a span list.
pub fn plain_text(spans: &[Span]) -> String {
    spans.iter().map(|s| s.text.as_str()).collect()
}

/// Parse one paragraph's text into spans.
pub fn parse_inline(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut plain = String::new();
    let mut rest = text;

    while let Some(ch) = rest.chars().next() {
        match match_construct(rest) {
            Some((span, consumed)) => {
                if !plain.is_empty() {
                    spans.push(Span::plain(std::mem::take(&mut plain)));
                }
                spans.push(span);
                rest = &rest[consumed..];
            }
            None => {
                plain.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
        }
    }
    if !plain.is_empty() {
        spans.push(Span::plain(plain));
    }
    spans
}

fn match_construct(s: &str) -> Option<(Span, usize)> {
    delimited(s, "**")
        .or_else(|| delimited(s, "__"))
        .map(|(t, n)| (Span::bold(t), n))
        .or_else(|| {
            delimited(s, "*")
                .or_else(|| delimited(s, "_"))
                .map(|(t, n)| (Span::italic(t), n))
        })
        .or_else(|| delimited(s, "`").map(|(t, n)| (Span::code(t), n)))
        .or_else(|| link(s))
}

/// `delim content delim` with the shortest non-empty single-line content.
/// Returns the content and the number of bytes consumed.
fn delimited<'a>(s: &'a str, delim: &str) -> Option<(&'a str, usize)> {
    let body = s.strip_prefix(delim)?;
    let first = body.chars().next()?;
    if first == '\n' {
        return None;
    }
    let from = first.len_utf8();
    let close = body[from..].find(delim)? + from;
    let content = &body[..close];
    if content.contains('\n') {
        return None;
    }
    Some((content, delim.len() * 2 + close))
}

/// `[label](url)`, both parts non-empty. If the first `](` does not lead to
/// a closing parenthesis the label is extended to the next one.
fn link(s: &str) -> Option<(Span, usize)> {
    let body = s.strip_prefix('[')?;
    let mut from = body.chars().next()?.len_utf8();

    loop {
        let mid = body[from..].find("](")? + from;
        let label = &body[..mid];
        if label.contains('\n') {
            return None;
        }
        let after = &body[mid + 2..];
        if let Some(first) = after.chars().next() {
            let url_from = first.len_utf8();
            if first != '\n' {
                if let Some(end) = after[url_from..].find(')') {
                    let end = end + url_from;
                    if !after[..end].contains('\n') {
                        return Some((Span::link(label), 1 + mid + 2 + end + 1));
                    }
                }
            }
        }
        from = mid + 1;
    }
}
