//! Markdown converter – turns the summary text into an ordered list of
//! [`Block`]s.
//!
//! The grammar is line oriented and first-match-wins:
//! - Blank lines become small spacers
//! - Pipe tables, ```` ``` ```` code fences
//! - `#`, `##`, `###` headings
//! - `> ` quotes, `- `/`* ` bullets, `1. ` ordered items
//! - `---` / `***` rules
//! - Anything else is a plain paragraph
//!
//! Conversion never fails. Constructs that do not parse are rendered as text,
//! except header-only tables which are dropped.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::PdfConfig;
use crate::inline::{parse_inline, plain_text, Span};

/// Points per centimetre.
pub const CM: f32 = 28.3465;

/// Spacer emitted for a blank line and after list runs.
pub const LINE_GAP: f32 = 0.15 * CM;

/// Spacer emitted before and after a table.
pub const TABLE_GAP: f32 = 0.3 * CM;

static ORDERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s").expect("valid ordered-list pattern"));

/// Named paragraph styles, one per `paragraph_styles` entry in the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StyleTag {
    Title,
    Subtitle,
    Meta,
    SectionTitle,
    Body,
    H1,
    H2,
    H3,
    Quote,
    Code,
}

impl StyleTag {
    pub const ALL: [StyleTag; 10] = [
        StyleTag::Title,
        StyleTag::Subtitle,
        StyleTag::Meta,
        StyleTag::SectionTitle,
        StyleTag::Body,
        StyleTag::H1,
        StyleTag::H2,
        StyleTag::H3,
        StyleTag::Quote,
        StyleTag::Code,
    ];

    /// Key of this style under `paragraph_styles`.
    pub fn name(self) -> &'static str {
        match self {
            StyleTag::Title => "title",
            StyleTag::Subtitle => "subtitle",
            StyleTag::Meta => "meta",
            StyleTag::SectionTitle => "section_title",
            StyleTag::Body => "body",
            StyleTag::H1 => "h1",
            StyleTag::H2 => "h2",
            StyleTag::H3 => "h3",
            StyleTag::Quote => "quote",
            StyleTag::Code => "code",
        }
    }
}

/// A table cell is a paragraph of inline spans.
pub type Cell = Vec<Span>;

/// One renderable unit of the output document.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph { spans: Vec<Span>, style: StyleTag },
    /// Vertical gap, in points.
    Spacer { height: f32 },
    /// Rows of cells; the first row is the header. Rows may be ragged.
    Table { rows: Vec<Vec<Cell>> },
    /// Verbatim text, line breaks preserved.
    Preformatted { text: String, style: StyleTag },
    /// Full-width horizontal rule in the divider colour.
    Rule,
}

impl Block {
    pub fn paragraph(text: &str, style: StyleTag) -> Self {
        Block::Paragraph {
            spans: parse_inline(text),
            style,
        }
    }

    /// Visible text of a paragraph or preformatted block.
    pub fn text(&self) -> Option<String> {
        match self {
            Block::Paragraph { spans, .. } => Some(plain_text(spans)),
            Block::Preformatted { text, .. } => Some(text.clone()),
            _ => None,
        }
    }
}

/// Spacing the converter puts around rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvertOptions {
    pub rule_space_before: f32,
    pub rule_space_after: f32,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            rule_space_before: 6.0,
            rule_space_after: 6.0,
        }
    }
}

impl ConvertOptions {
    pub fn from_config(config: &PdfConfig) -> Self {
        Self {
            rule_space_before: config.divider.space_before,
            rule_space_after: config.divider.space_after,
        }
    }
}

/// Convert markdown text into blocks.
pub fn convert(markdown: &str, options: &ConvertOptions) -> Vec<Block> {
    let lines: Vec<&str> = markdown
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();

        if trimmed.is_empty() {
            blocks.push(Block::Spacer { height: LINE_GAP });
            i += 1;
            continue;
        }

        if trimmed.starts_with('|') {
            let (rows, next) = parse_table(&lines, i);
            if rows.len() >= 2 {
                blocks.push(Block::Spacer { height: TABLE_GAP });
                blocks.push(Block::Table {
                    rows: table_cells(rows),
                });
                blocks.push(Block::Spacer { height: TABLE_GAP });
            } else {
                log::debug!("Dropping table without data rows at line {}", i + 1);
            }
            i = next;
            continue;
        }

        if trimmed.starts_with("```") {
            let mut code_lines = Vec::new();
            i += 1;
            while i < lines.len() && !lines[i].trim().starts_with("```") {
                code_lines.push(lines[i]);
                i += 1;
            }
            blocks.push(Block::Preformatted {
                text: code_lines.join("\n"),
                style: StyleTag::Code,
            });
            // Step over the closing fence when there is one.
            i += 1;
            continue;
        }

        if let Some((text, style)) = heading(line) {
            blocks.push(Block::paragraph(text, style));
            i += 1;
            continue;
        }

        if line.starts_with("> ") {
            let mut quote = Vec::new();
            while i < lines.len() {
                match lines[i].strip_prefix("> ") {
                    Some(rest) => quote.push(rest),
                    None => break,
                }
                i += 1;
            }
            let mut spans = parse_inline(&quote.join(" "));
            for span in &mut spans {
                span.style.italic = true;
            }
            blocks.push(Block::Paragraph {
                spans,
                style: StyleTag::Quote,
            });
            continue;
        }

        if bullet_item(line).is_some() {
            while let Some(item) = lines.get(i).and_then(|l| bullet_item(l)) {
                blocks.push(Block::paragraph(&format!("  \u{2022} {item}"), StyleTag::Body));
                i += 1;
            }
            blocks.push(Block::Spacer { height: LINE_GAP });
            continue;
        }

        if ORDERED_ITEM.is_match(line) {
            let mut counter = 1;
            while i < lines.len() && ORDERED_ITEM.is_match(lines[i]) {
                let item = ORDERED_ITEM.replace(lines[i], "");
                blocks.push(Block::paragraph(
                    &format!("  {counter}. {item}"),
                    StyleTag::Body,
                ));
                counter += 1;
                i += 1;
            }
            blocks.push(Block::Spacer { height: LINE_GAP });
            continue;
        }

        if trimmed == "---" || trimmed == "***" {
            blocks.push(Block::Spacer {
                height: options.rule_space_before,
            });
            blocks.push(Block::Rule);
            blocks.push(Block::Spacer {
                height: options.rule_space_after,
            });
            i += 1;
            continue;
        }

        blocks.push(Block::paragraph(line, StyleTag::Body));
        i += 1;
    }

    blocks
}

fn heading(line: &str) -> Option<(&str, StyleTag)> {
    if let Some(rest) = line.strip_prefix("# ") {
        Some((rest, StyleTag::H1))
    } else if let Some(rest) = line.strip_prefix("## ") {
        Some((rest, StyleTag::H2))
    } else {
        line.strip_prefix("### ").map(|rest| (rest, StyleTag::H3))
    }
}

fn bullet_item(line: &str) -> Option<&str> {
    line.strip_prefix("- ").or_else(|| line.strip_prefix("* "))
}

/// Consume a pipe table starting at `start`. Returns raw cell text per row
/// and the index of the first line after the table.
fn parse_table(lines: &[&str], start: usize) -> (Vec<Vec<String>>, usize) {
    let mut rows = vec![split_row(lines[start])];
    let mut i = start + 1;

    if i < lines.len() && lines[i].contains('|') && lines[i].contains('-') {
        i += 1;
    }

    while i < lines.len() && lines[i].contains('|') {
        rows.push(split_row(lines[i]));
        i += 1;
    }
    (rows, i)
}

fn split_row(line: &str) -> Vec<String> {
    let row = line.trim();
    let row = row.strip_prefix('|').unwrap_or(row);
    let row = row.strip_suffix('|').unwrap_or(row);
    row.split('|').map(|cell| cell.trim().to_string()).collect()
}

/// Inline-process every cell; header cells are bold.
fn table_cells(rows: Vec<Vec<String>>) -> Vec<Vec<Cell>> {
    rows.into_iter()
        .enumerate()
        .map(|(row_idx, row)| {
            row.iter()
                .map(|text| {
                    let mut spans = parse_inline(text);
                    if row_idx == 0 {
                        for span in &mut spans {
                            span.style.bold = true;
                        }
                    }
                    spans
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn conv(md: &str) -> Vec<Block> {
        convert(md, &ConvertOptions::default())
    }

    fn texts(blocks: &[Block]) -> Vec<String> {
        blocks.iter().filter_map(Block::text).collect()
    }

    #[test]
    fn plain_lines_become_paragraphs_in_order() {
        let blocks = conv("first line\nsecond line\nthird");
        assert_eq!(blocks.len(), 3);
        assert_eq!(texts(&blocks), vec!["first line", "second line", "third"]);
        assert!(blocks
            .iter()
            .all(|b| matches!(b, Block::Paragraph { style: StyleTag::Body, .. })));
    }

    #[test]
    fn blank_lines_are_spacers() {
        let blocks = conv("a\n\n   \nb");
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[1], Block::Spacer { height: LINE_GAP });
        assert_eq!(blocks[2], Block::Spacer { height: LINE_GAP });
    }

    #[test]
    fn headings_by_level() {
        let blocks = conv("# One\n## Two\n### Three\n#### Four");
        let styles: Vec<StyleTag> = blocks
            .iter()
            .map(|b| match b {
                Block::Paragraph { style, .. } => *style,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            styles,
            vec![StyleTag::H1, StyleTag::H2, StyleTag::H3, StyleTag::Body]
        );
        assert_eq!(texts(&blocks)[0], "One");
        assert_eq!(texts(&blocks)[3], "#### Four");
    }

    #[test]
    fn table_with_separator() {
        let blocks = conv("| Name | Score |\n|---|---|\n| a | 1 |\n| b | 2 |");
        assert_eq!(blocks.len(), 3);
        match &blocks[1] {
            Block::Table { rows } => {
                assert_eq!(rows.len(), 3);
                assert_eq!(rows[0][0], vec![Span::bold("Name")]);
                assert_eq!(rows[2][1], vec![Span::plain("2")]);
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn header_only_table_is_dropped() {
        let blocks = conv("| Name | Score |\n|---|---|\nafter");
        assert_eq!(texts(&blocks), vec!["after"]);
        assert!(!blocks.iter().any(|b| matches!(b, Block::Table { .. })));
    }

    #[test]
    fn ragged_rows_pass_through() {
        let blocks = conv("| a | b | c |\n| 1 |\n| 1 | 2 | 3 | 4 |");
        match &blocks[1] {
            Block::Table { rows } => {
                let widths: Vec<usize> = rows.iter().map(Vec::len).collect();
                assert_eq!(widths, vec![3, 1, 4]);
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn only_one_outer_pipe_is_trimmed() {
        assert_eq!(split_row("|| a |"), vec!["", "a"]);
    }

    #[test]
    fn code_fence_is_verbatim() {
        let blocks = conv("```\nlet x = **1**;\n  indented\n```\nafter");
        assert_eq!(
            blocks[0],
            Block::Preformatted {
                text: "let x = **1**;\n  indented".to_string(),
                style: StyleTag::Code,
            }
        );
        assert_eq!(texts(&blocks)[1], "after");
    }

    #[test]
    fn unterminated_fence_runs_to_end() {
        let blocks = conv("intro\n```rust\nfn a() {}\n\nfn b() {}");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].text().unwrap(), "fn a() {}\n\nfn b() {}");
    }

    #[test]
    fn quote_lines_join_and_italicise() {
        let blocks = conv("> one\n> two **b**\nplain");
        match &blocks[0] {
            Block::Paragraph { spans, style } => {
                assert_eq!(*style, StyleTag::Quote);
                assert_eq!(plain_text(spans), "one two b");
                assert!(spans.iter().all(|s| s.style.italic));
                assert!(spans.iter().any(|s| s.style.bold));
            }
            other => panic!("expected quote, got {other:?}"),
        }
        assert_eq!(texts(&blocks)[1], "plain");
    }

    #[test]
    fn bullets_get_glyph_and_trailing_spacer() {
        let blocks = conv("- a\n* b\nc");
        assert_eq!(texts(&blocks), vec!["  \u{2022} a", "  \u{2022} b", "c"]);
        assert_eq!(blocks[2], Block::Spacer { height: LINE_GAP });
    }

    #[test]
    fn ordered_lists_renumber_from_one() {
        let blocks = conv("5. a\n5. b\n\n9. c");
        assert_eq!(texts(&blocks), vec!["  1. a", "  2. b", "  1. c"]);
    }

    #[test]
    fn rule_is_bracketed_by_configured_spacing() {
        let options = ConvertOptions {
            rule_space_before: 3.0,
            rule_space_after: 7.0,
        };
        let blocks = convert("  ---  ", &options);
        assert_eq!(
            blocks,
            vec![
                Block::Spacer { height: 3.0 },
                Block::Rule,
                Block::Spacer { height: 7.0 },
            ]
        );
        assert_eq!(convert("***", &options)[1], Block::Rule);
    }

    #[test]
    fn crlf_input() {
        let blocks = conv("# Title\r\nbody\r\n");
        assert_eq!(texts(&blocks), vec!["Title", "body"]);
        assert_eq!(blocks.len(), 3);
    }
}
