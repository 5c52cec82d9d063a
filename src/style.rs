//! Style resolver – turns the YAML paragraph styles into immutable
//! [`ParagraphStyle`] values and decides how each inline span is set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{Alignment, ParagraphStyleConfig, PdfConfig};
use crate::fonts::{FontFamily, FontManager, FontSpec, StyledText};
use crate::inline::{Span, SpanStyle};
use crate::markdown::StyleTag;

/// Colour used when a name is not found in the colour table.
pub const FALLBACK_COLOR: &str = "#000000";

/// Resolve a colour reference: a literal `#RRGGBB` passes through unchanged,
/// anything else is looked up by name, defaulting to black.
pub fn resolve_color<'a>(colors: &'a BTreeMap<String, String>, value: &'a str) -> &'a str {
    if value.starts_with('#') {
        return value;
    }
    colors
        .get(value)
        .map(String::as_str)
        .unwrap_or(FALLBACK_COLOR)
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };

    /// Parse `#RRGGBB`. Other forms, including CSS shorthand, are rejected.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#')?;
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok().map(|v| v as f32 / 255.0);
        Some(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a: 1.0,
        })
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// The two base styles every paragraph style inherits from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseStyle {
    Body,
    /// Titles and headings; kept on the same page as the block that follows.
    Heading,
}

impl BaseStyle {
    fn for_tag(tag: StyleTag) -> Self {
        match tag {
            StyleTag::Title | StyleTag::SectionTitle | StyleTag::H1 | StyleTag::H2 | StyleTag::H3 => {
                BaseStyle::Heading
            }
            _ => BaseStyle::Body,
        }
    }
}

/// A border drawn along the left edge of a paragraph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeBorder {
    pub width: f32,
    pub color: Color,
    pub padding: f32,
}

/// Fully resolved paragraph style.
#[derive(Debug, Clone, PartialEq)]
pub struct ParagraphStyle {
    pub tag: StyleTag,
    pub base: BaseStyle,
    pub font: FontSpec,
    pub font_size: f32,
    /// Distance between baselines, in points.
    pub leading: f32,
    pub color: Color,
    pub background: Option<Color>,
    pub alignment: Alignment,
    pub space_before: f32,
    pub space_after: f32,
    pub left_indent: f32,
    pub right_indent: f32,
    pub border: Option<EdgeBorder>,
}

impl ParagraphStyle {
    pub fn keep_with_next(&self) -> bool {
        self.base == BaseStyle::Heading
    }
}

/// Presentation of markdown tables.
#[derive(Debug, Clone, PartialEq)]
pub struct TableStyle {
    pub border_color: Color,
    pub border_width: f32,
    pub header_background: Option<Color>,
    pub stripe: Option<Color>,
    pub cell_padding: f32,
    /// Style applied to header cells (centred, header font size and colour).
    pub header_cell: ParagraphStyle,
    /// Style applied to data cells (the body style).
    pub body_cell: ParagraphStyle,
}

/// Horizontal rule presentation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleStyle {
    pub color: Color,
    pub thickness: f32,
}

/// All styles derived from one [`PdfConfig`]; immutable once built.
#[derive(Debug, Clone)]
pub struct StyleSheet {
    paragraphs: BTreeMap<StyleTag, ParagraphStyle>,
    pub table: TableStyle,
    pub rule: RuleStyle,
    /// Colour of inline `code` spans.
    pub code_color: Color,
    /// Colour of link labels.
    pub link_color: Color,
    colors: BTreeMap<String, String>,
}

impl StyleSheet {
    pub fn from_config(config: &PdfConfig, fonts: &FontManager) -> Self {
        let body_family = fonts.body_family();
        let paragraphs: BTreeMap<StyleTag, ParagraphStyle> = StyleTag::ALL
            .into_iter()
            .map(|tag| {
                let style =
                    paragraph_style(tag, config.paragraph_styles.get(tag), config, body_family);
                (tag, style)
            })
            .collect();

        let ts = &config.table_style;
        let body = paragraphs[&StyleTag::Body].clone();
        let mut header_cell = body.clone();
        header_cell.font_size = ts.header.font_size;
        header_cell.leading = ts.header.font_size * 1.2;
        header_cell.color = hex(config, &ts.header.text_color);
        header_cell.alignment = Alignment::Center;

        let mut body_cell = body;
        // Cells carry their own padding; paragraph spacing would double it.
        for cell in [&mut header_cell, &mut body_cell] {
            cell.space_before = 0.0;
            cell.space_after = 0.0;
            cell.left_indent = 0.0;
            cell.right_indent = 0.0;
            cell.background = None;
            cell.border = None;
        }

        let table = TableStyle {
            border_color: hex(config, &ts.border.color),
            border_width: ts.border.width,
            header_background: ts.header.background.as_deref().map(|c| hex(config, c)),
            stripe: ts
                .stripe
                .enabled
                .then(|| hex(config, &ts.stripe.even_row_color)),
            cell_padding: ts.cell.padding,
            header_cell,
            body_cell,
        };

        Self {
            paragraphs,
            table,
            rule: RuleStyle {
                color: hex(config, &config.divider.color),
                thickness: config.divider.thickness,
            },
            code_color: hex(config, "code_text"),
            link_color: hex(config, "primary"),
            colors: config.colors.clone(),
        }
    }

    pub fn paragraph(&self, tag: StyleTag) -> &ParagraphStyle {
        // Built for every tag in `from_config`.
        &self.paragraphs[&tag]
    }

    /// Decide font, colour and decoration of one inline span set in
    /// `paragraph`. Precedence for colour: explicit span colour, then the
    /// code/link colour, then the paragraph colour.
    pub fn styled_text(&self, paragraph: &ParagraphStyle, span: &Span) -> StyledText {
        let SpanStyle {
            bold,
            italic,
            code,
            link,
            ref color,
        } = span.style;

        let mut font = paragraph.font;
        if code {
            font.family = FontFamily::Courier;
        }
        font.bold |= bold;
        font.italic |= italic;

        let color = match color {
            Some(value) => {
                Color::from_hex(resolve_color(&self.colors, value)).unwrap_or(Color::BLACK)
            }
            None if code => self.code_color,
            None if link => self.link_color,
            None => paragraph.color,
        };

        StyledText {
            text: span.text.clone(),
            font,
            font_size: paragraph.font_size,
            color,
            underline: link,
        }
    }
}

fn hex(config: &PdfConfig, value: &str) -> Color {
    Color::from_hex(resolve_color(&config.colors, value)).unwrap_or(Color::BLACK)
}

fn paragraph_style(
    tag: StyleTag,
    cfg: &ParagraphStyleConfig,
    config: &PdfConfig,
    body_family: FontFamily,
) -> ParagraphStyle {
    let mut font = FontSpec::new(body_family);
    font.bold = cfg.bold;
    if let Some(name) = &cfg.font_name {
        match FontFamily::from_builtin_name(name) {
            Some(family) => {
                font.family = family;
                font.bold |= FontFamily::name_is_bold(name);
            }
            None => log::warn!(
                "paragraph_styles.{}: unknown font {name:?}, using body font",
                tag.name()
            ),
        }
    }

    let border = (cfg.border_width > 0.0).then(|| EdgeBorder {
        width: cfg.border_width,
        color: cfg
            .border_color
            .as_deref()
            .map(|c| hex(config, c))
            .unwrap_or(Color::BLACK),
        padding: cfg.border_padding,
    });

    ParagraphStyle {
        tag,
        base: BaseStyle::for_tag(tag),
        font,
        font_size: cfg.font_size,
        leading: cfg.line_height.unwrap_or(cfg.font_size * 1.2),
        color: cfg
            .color
            .as_deref()
            .map(|c| hex(config, c))
            .unwrap_or(Color::BLACK),
        background: cfg.background.as_deref().map(|c| hex(config, c)),
        alignment: cfg.alignment,
        space_before: cfg.space_before,
        space_after: cfg.space_after,
        left_indent: cfg.left_indent,
        right_indent: cfg.right_indent,
        border,
    }
}
