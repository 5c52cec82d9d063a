//! Paginated layout – every box, text line and page decoration with its final
//! position. Pagination produces it, the renderer consumes it, and it can be
//! dumped to JSON and rendered again later without the source markdown.

use serde::{Deserialize, Serialize};

use crate::decoration::Decoration;
use crate::error::{Error, Result};
use crate::fonts::FontSpec;

/// A4 in PDF points.
pub const A4_WIDTH_PT: f32 = 595.28;
pub const A4_HEIGHT_PT: f32 = 841.89;

/// A summary document laid out on fixed-size pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// PDF metadata title; the room title for summaries.
    #[serde(default = "LayoutConfig::default_title")]
    pub title: String,
    /// Page size in points.
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    pub pages: Vec<PageLayout>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_index: usize,
    pub boxes: Vec<LayoutBox>,
    /// Watermark, header and footer items, in PDF coordinates.
    #[serde(default)]
    pub decorations: Vec<Decoration>,
}

impl PageLayout {
    pub fn new(page_index: usize) -> Self {
        Self {
            page_index,
            boxes: Vec::new(),
            decorations: Vec::new(),
        }
    }
}

/// A paragraph, table, table row or cell, or rule placed on a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutBox {
    /// Top-left corner, measured from the top-left of the page.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,

    pub background_color: Option<[f32; 4]>,
    pub border: Option<BorderStyle>,

    /// At most one of `text` and `rule` is set.
    pub text: Option<TextContent>,
    pub rule: Option<RuleContent>,

    /// Table rows, or the cells of a row.
    pub children: Vec<LayoutBox>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BorderEdges {
    All,
    Left,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorderStyle {
    pub width: f32,
    pub color: [f32; 4],
    pub edges: BorderEdges,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    pub lines: Vec<TextLine>,
    pub line_height: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLine {
    pub runs: Vec<TextRun>,
    /// X offset within the layout box (alignment and border inset)
    pub x_offset: f32,
    /// Y offset of the line's top from the top of the layout box
    pub y_offset: f32,
    /// Distance from the line's top to its baseline
    pub ascent: f32,
}

impl TextLine {
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub font: FontSpec,
    pub font_size: f32,
    pub color: [f32; 4],
    pub underline: bool,
    /// Measured advance, used for underlines.
    pub width: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleContent {
    pub color: [f32; 4],
    pub thickness: f32,
}

impl LayoutConfig {
    /// Create an empty A4 layout config.
    pub fn a4() -> Self {
        Self {
            title: Self::default_title(),
            page_width_pt: A4_WIDTH_PT,
            page_height_pt: A4_HEIGHT_PT,
            pages: Vec::new(),
        }
    }

    fn default_title() -> String {
        "Chat summary".to_string()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Parse a layout written by [`LayoutConfig::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Render(format!("invalid layout JSON: {e}")))
    }

    /// All text lines on all pages, depth first, in reading order.
    pub fn text_lines(&self) -> Vec<String> {
        fn visit(lbox: &LayoutBox, out: &mut Vec<String>) {
            if let Some(text) = &lbox.text {
                out.extend(text.lines.iter().map(TextLine::text));
            }
            for child in &lbox.children {
                visit(child, out);
            }
        }
        let mut out = Vec::new();
        for page in &self.pages {
            for lbox in &page.boxes {
                visit(lbox, &mut out);
            }
        }
        out
    }
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            background_color: None,
            border: None,
            text: None,
            rule: None,
            children: Vec::new(),
        }
    }
}
