//! Summary document assembly – the branded header, meta lines and divider
//! that precede the converted summary text.

use chrono::NaiveDateTime;

use crate::config::PdfConfig;
use crate::inline::Span;
use crate::markdown::{convert, Block, ConvertOptions, StyleTag, CM};

/// Facts about the conversation printed above the summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryMeta {
    pub room_title: String,
    pub created_at: NaiveDateTime,
    pub message_count: usize,
}

/// Timestamp format used in the meta block.
pub const DATE_FORMAT: &str = "%Y.%m.%d %H:%M";

/// Build the complete story: header, meta block, divider, section title and
/// the converted summary.
pub fn build_story(config: &PdfConfig, meta: &SummaryMeta, summary_markdown: &str) -> Vec<Block> {
    let branding = &config.branding;
    let labels = &config.labels;
    let mut story = vec![
        Block::Paragraph {
            spans: vec![
                Span::colored(branding.service_name.as_str(), "primary"),
                Span::plain(" "),
                Span::colored(branding.service_name_en.as_str(), "secondary"),
            ],
            style: StyleTag::Title,
        },
        literal(&branding.tagline, StyleTag::Subtitle),
    ];

    let meta_lines = [
        (labels.room.as_str(), meta.room_title.clone()),
        (
            labels.date.as_str(),
            meta.created_at.format(DATE_FORMAT).to_string(),
        ),
        (
            labels.messages.as_str(),
            format!("{}{}", meta.message_count, labels.message_suffix),
        ),
    ];
    for (label, value) in meta_lines {
        story.push(Block::Paragraph {
            spans: vec![
                Span::bold(format!("{label}:")),
                Span::plain(" "),
                Span::plain(value),
            ],
            style: StyleTag::Meta,
        });
    }

    story.push(Block::Spacer { height: 0.5 * CM });
    story.push(Block::Rule);
    story.push(Block::Spacer { height: 0.3 * CM });
    story.push(literal(&labels.section_title, StyleTag::SectionTitle));

    story.extend(convert(summary_markdown, &ConvertOptions::from_config(config)));
    story
}

/// Configured and user-supplied strings are printed as-is, without inline
/// markdown.
fn literal(text: &str, style: StyleTag) -> Block {
    Block::Paragraph {
        spans: vec![Span::plain(text)],
        style,
    }
}
