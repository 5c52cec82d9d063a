//! Layout engine – uses Taffy to stack the document blocks in a flex column
//! (tables as flex rows of fixed-width cells), then converts the result into a
//! flat list of positioned boxes in document coordinates.

use std::collections::HashMap;
use taffy::prelude::*;

use crate::config::Alignment;
use crate::error::{Error, Result};
use crate::fonts::{wrap_runs, FontManager, Run, StyledText, WrappedLine};
use crate::inline::Span;
use crate::markdown::Block;
use crate::style::{Color, ParagraphStyle, RuleStyle, StyleSheet};

// ---------------------------------------------------------------------------
// Intermediate layout tree (pre-pagination)
// ---------------------------------------------------------------------------

/// A positioned box in document coordinates (before page splitting).
#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub content: BoxContent,
    pub background: Option<Color>,
    pub border: Option<BoxBorder>,
    pub children: Vec<PositionedBox>,
    /// Headings: do not end a page with this box.
    pub keep_with_next: bool,
    /// Tables: may be split between their rows.
    pub splittable: bool,
}

impl PositionedBox {
    pub fn is_spacer(&self) -> bool {
        matches!(self.content, BoxContent::None) && self.children.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum BoxContent {
    None,
    Text(TextBlock),
    Rule(RuleStyle),
}

/// Wrapped text plus where it sits inside its box.
#[derive(Debug, Clone)]
pub struct TextBlock {
    pub lines: Vec<LaidLine>,
    pub leading: f32,
    pub alignment: Alignment,
    /// Space between the box's left edge and the text (border + padding).
    pub inset_left: f32,
}

#[derive(Debug, Clone)]
pub struct LaidLine {
    pub line: WrappedLine,
    /// Distance from the top of the line to its baseline.
    pub baseline: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxBorder {
    pub width: f32,
    pub color: Color,
    /// Only the left edge is drawn (paragraph borders).
    pub left_only: bool,
}

#[derive(Debug, Clone, Default)]
struct NodeInfo {
    content: Option<BoxContent>,
    background: Option<Color>,
    border: Option<BoxBorder>,
    keep_with_next: bool,
    splittable: bool,
}

// ---------------------------------------------------------------------------
// Build Taffy tree from blocks
// ---------------------------------------------------------------------------

fn layout_err(e: taffy::TaffyError) -> Error {
    Error::Layout(e.to_string())
}

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    fonts: &'a FontManager,
    styles: &'a StyleSheet,
    nodes: HashMap<NodeId, NodeInfo>,
    content_width: f32,
}

impl<'a> LayoutBuilder<'a> {
    fn new(fonts: &'a FontManager, styles: &'a StyleSheet, content_width: f32) -> Self {
        Self {
            taffy: TaffyTree::new(),
            fonts,
            styles,
            nodes: HashMap::new(),
            content_width,
        }
    }

    fn build_block(&mut self, block: &Block) -> Result<NodeId> {
        match block {
            Block::Paragraph { spans, style } => {
                let style = self.styles.paragraph(*style).clone();
                self.build_paragraph(spans, &style, self.content_width, true)
            }
            Block::Spacer { height } => self.build_spacer(*height),
            Block::Table { rows } => self.build_table(rows),
            Block::Preformatted { text, style } => {
                let style = self.styles.paragraph(*style).clone();
                self.build_preformatted(text, &style)
            }
            Block::Rule => self.build_rule(),
        }
    }

    fn build_spacer(&mut self, height: f32) -> Result<NodeId> {
        let node = self
            .taffy
            .new_leaf(Style {
                size: Size {
                    width: Dimension::Auto,
                    height: Dimension::Length(height.max(0.0)),
                },
                flex_shrink: 0.0,
                ..Default::default()
            })
            .map_err(layout_err)?;
        self.nodes.insert(node, NodeInfo::default());
        Ok(node)
    }

    fn build_rule(&mut self) -> Result<NodeId> {
        let rule = self.styles.rule;
        let node = self
            .taffy
            .new_leaf(Style {
                size: Size {
                    width: Dimension::Auto,
                    height: Dimension::Length(rule.thickness.max(0.1)),
                },
                flex_shrink: 0.0,
                ..Default::default()
            })
            .map_err(layout_err)?;
        self.nodes.insert(
            node,
            NodeInfo {
                content: Some(BoxContent::Rule(rule)),
                ..Default::default()
            },
        );
        Ok(node)
    }

    /// Wrap `spans` for a box `outer_width` wide. With `block_spacing` the
    /// paragraph's spacing and indents become margins; table cells pass
    /// `false` because cell padding already separates them.
    fn build_paragraph(
        &mut self,
        spans: &[Span],
        style: &ParagraphStyle,
        outer_width: f32,
        block_spacing: bool,
    ) -> Result<NodeId> {
        let parts: Vec<StyledText> = spans
            .iter()
            .map(|span| self.styles.styled_text(style, span))
            .collect();

        let inset_left = style.border.map(|b| b.width + b.padding).unwrap_or(0.0);
        let (margin_left, margin_right) = if block_spacing {
            (style.left_indent, style.right_indent)
        } else {
            (0.0, 0.0)
        };
        let max_w = outer_width - margin_left - margin_right - inset_left;
        let lines = wrap_runs(&parts, max_w, self.fonts);
        let text = self.text_block(lines, style, inset_left);
        let height = text.lines.len() as f32 * style.leading;

        let margin = if block_spacing {
            Rect {
                top: LengthPercentageAuto::Length(style.space_before),
                right: LengthPercentageAuto::Length(margin_right),
                bottom: LengthPercentageAuto::Length(style.space_after),
                left: LengthPercentageAuto::Length(margin_left),
            }
        } else {
            Rect::zero()
        };

        let node = self
            .taffy
            .new_leaf(Style {
                size: Size {
                    width: Dimension::Auto,
                    height: Dimension::Length(height),
                },
                margin,
                flex_shrink: 0.0,
                ..Default::default()
            })
            .map_err(layout_err)?;
        self.nodes.insert(
            node,
            NodeInfo {
                content: Some(BoxContent::Text(text)),
                background: style.background,
                border: style.border.map(|b| BoxBorder {
                    width: b.width,
                    color: b.color,
                    left_only: true,
                }),
                keep_with_next: block_spacing && style.keep_with_next(),
                splittable: false,
            },
        );
        Ok(node)
    }

    fn text_block(&self, lines: Vec<WrappedLine>, style: &ParagraphStyle, inset_left: f32) -> TextBlock {
        let lines = lines
            .into_iter()
            .map(|line| {
                let ascent = line
                    .runs
                    .iter()
                    .map(|r: &Run| self.fonts.ascender(r.font_size, r.font))
                    .fold(self.fonts.ascender(style.font_size, style.font), f32::max);
                let size = line
                    .runs
                    .iter()
                    .map(|r| r.font_size)
                    .fold(style.font_size, f32::max);
                // Extra leading is split evenly above and below the glyphs.
                let baseline = ascent + (style.leading - size).max(0.0) / 2.0;
                LaidLine { line, baseline }
            })
            .collect();
        TextBlock {
            lines,
            leading: style.leading,
            alignment: style.alignment,
            inset_left,
        }
    }

    /// Code blocks keep their line breaks and are not wrapped.
    fn build_preformatted(&mut self, text: &str, style: &ParagraphStyle) -> Result<NodeId> {
        let lines: Vec<WrappedLine> = text
            .split('\n')
            .map(|raw| {
                if raw.is_empty() {
                    return WrappedLine::default();
                }
                let width = self.fonts.measure(raw, style.font_size, style.font);
                WrappedLine {
                    runs: vec![Run {
                        text: raw.to_string(),
                        font: style.font,
                        font_size: style.font_size,
                        color: style.color,
                        underline: false,
                        width,
                    }],
                    width,
                }
            })
            .collect();
        let inset_left = style.border.map(|b| b.width + b.padding).unwrap_or(0.0);
        let mut block = self.text_block(lines, style, inset_left);
        // Verbatim text is never centred or justified.
        block.alignment = Alignment::Left;
        let height = block.lines.len() as f32 * style.leading;

        let node = self
            .taffy
            .new_leaf(Style {
                size: Size {
                    width: Dimension::Auto,
                    height: Dimension::Length(height),
                },
                margin: Rect {
                    top: LengthPercentageAuto::Length(style.space_before),
                    right: LengthPercentageAuto::Length(style.right_indent),
                    bottom: LengthPercentageAuto::Length(style.space_after),
                    left: LengthPercentageAuto::Length(style.left_indent),
                },
                flex_shrink: 0.0,
                ..Default::default()
            })
            .map_err(layout_err)?;
        self.nodes.insert(
            node,
            NodeInfo {
                content: Some(BoxContent::Text(block)),
                background: style.background,
                border: style.border.map(|b| BoxBorder {
                    width: b.width,
                    color: b.color,
                    left_only: true,
                }),
                ..Default::default()
            },
        );
        Ok(node)
    }

    /// Columns share the content width equally; a short row leaves the
    /// columns it lacks empty and a long row runs past the right edge.
    fn build_table(&mut self, rows: &[Vec<Vec<Span>>]) -> Result<NodeId> {
        let table = self.styles.table.clone();
        let columns = rows.iter().map(Vec::len).max().unwrap_or(1).max(1);
        let col_width = self.content_width / columns as f32;
        let inner_width = (col_width - 2.0 * (table.cell_padding + table.border_width)).max(1.0);

        let mut row_nodes = Vec::with_capacity(rows.len());
        for (row_idx, row) in rows.iter().enumerate() {
            let (cell_style, background) = if row_idx == 0 {
                (&table.header_cell, table.header_background)
            } else if row_idx % 2 == 0 {
                (&table.body_cell, table.stripe)
            } else {
                (&table.body_cell, None)
            };

            let mut cell_nodes = Vec::with_capacity(row.len());
            for cell in row {
                let text = self.build_paragraph(cell, cell_style, inner_width, false)?;
                let cell_node = self
                    .taffy
                    .new_with_children(
                        Style {
                            display: taffy::Display::Flex,
                            flex_direction: taffy::FlexDirection::Column,
                            justify_content: Some(taffy::JustifyContent::Center),
                            flex_grow: 0.0,
                            flex_shrink: 0.0,
                            flex_basis: Dimension::Length(col_width),
                            padding: Rect {
                                top: LengthPercentage::Length(table.cell_padding),
                                right: LengthPercentage::Length(table.cell_padding),
                                bottom: LengthPercentage::Length(table.cell_padding),
                                left: LengthPercentage::Length(table.cell_padding),
                            },
                            border: Rect {
                                top: LengthPercentage::Length(table.border_width),
                                right: LengthPercentage::Length(table.border_width),
                                bottom: LengthPercentage::Length(table.border_width),
                                left: LengthPercentage::Length(table.border_width),
                            },
                            ..Default::default()
                        },
                        &[text],
                    )
                    .map_err(layout_err)?;
                self.nodes.insert(
                    cell_node,
                    NodeInfo {
                        border: (table.border_width > 0.0).then_some(BoxBorder {
                            width: table.border_width,
                            color: table.border_color,
                            left_only: false,
                        }),
                        ..Default::default()
                    },
                );
                cell_nodes.push(cell_node);
            }

            let row_node = self
                .taffy
                .new_with_children(
                    Style {
                        display: taffy::Display::Flex,
                        flex_direction: taffy::FlexDirection::Row,
                        align_items: Some(taffy::AlignItems::Stretch),
                        size: Size {
                            width: Dimension::Percent(1.0),
                            height: Dimension::Auto,
                        },
                        flex_shrink: 0.0,
                        ..Default::default()
                    },
                    &cell_nodes,
                )
                .map_err(layout_err)?;
            self.nodes.insert(
                row_node,
                NodeInfo {
                    background,
                    ..Default::default()
                },
            );
            row_nodes.push(row_node);
        }

        let node = self
            .taffy
            .new_with_children(
                Style {
                    display: taffy::Display::Flex,
                    flex_direction: taffy::FlexDirection::Column,
                    flex_shrink: 0.0,
                    ..Default::default()
                },
                &row_nodes,
            )
            .map_err(layout_err)?;
        self.nodes.insert(
            node,
            NodeInfo {
                splittable: true,
                ..Default::default()
            },
        );
        Ok(node)
    }

    /// Extract positioned boxes after layout computation.
    fn extract(&mut self, node: NodeId, offset_x: f32, offset_y: f32) -> Result<PositionedBox> {
        let layout = *self.taffy.layout(node).map_err(layout_err)?;
        let info = self.nodes.remove(&node).unwrap_or_default();

        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;

        let children = self
            .taffy
            .children(node)
            .map_err(layout_err)?
            .into_iter()
            .map(|child| self.extract(child, x, y))
            .collect::<Result<Vec<_>>>()?;

        Ok(PositionedBox {
            x,
            y,
            width: layout.size.width,
            height: layout.size.height,
            content: info.content.unwrap_or(BoxContent::None),
            background: info.background,
            border: info.border,
            children,
            keep_with_next: info.keep_with_next,
            splittable: info.splittable,
        })
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute layout for a block list, returning the top-level positioned boxes
/// in document coordinates (x includes the left margin, y starts at 0).
pub fn compute_layout(
    blocks: &[Block],
    content_width: f32,
    margin_left: f32,
    styles: &StyleSheet,
    fonts: &FontManager,
) -> Result<Vec<PositionedBox>> {
    let mut builder = LayoutBuilder::new(fonts, styles, content_width);

    let child_ids = blocks
        .iter()
        .map(|block| builder.build_block(block))
        .collect::<Result<Vec<_>>>()?;

    let root_style = Style {
        display: taffy::Display::Flex,
        flex_direction: taffy::FlexDirection::Column,
        size: Size {
            width: Dimension::Length(content_width),
            height: Dimension::Auto,
        },
        ..Default::default()
    };

    let root = builder
        .taffy
        .new_with_children(root_style, &child_ids)
        .map_err(layout_err)?;

    builder
        .taffy
        .compute_layout(
            root,
            Size {
                width: AvailableSpace::Definite(content_width),
                height: AvailableSpace::MaxContent,
            },
        )
        .map_err(layout_err)?;

    let root_box = builder.extract(root, margin_left, 0.0)?;
    log::debug!("Laid out {} blocks", root_box.children.len());
    Ok(root_box.children)
}
