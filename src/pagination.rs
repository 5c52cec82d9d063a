//! Pagination – splits a flat list of positioned boxes into pages.
//!
//! Handles:
//! - A4 page boundaries inside the configured margins
//! - Table row splitting across pages
//! - Paragraph and code block splitting between lines
//! - Headings kept on the same page as the block that follows them

use std::borrow::Cow;

use crate::config::{Alignment, PageConfig};
use crate::layout::{BoxContent, PositionedBox, TextBlock};
use crate::layout_config::*;
use crate::markdown::CM;

/// Page size and margins, all in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
}

impl PageGeometry {
    /// A4 with the margins of the `page` config section (given in cm).
    pub fn a4(page: &PageConfig) -> Self {
        Self {
            width: A4_WIDTH_PT,
            height: A4_HEIGHT_PT,
            margin_top: page.margin_top * CM,
            margin_bottom: page.margin_bottom * CM,
            margin_left: page.margin_left * CM,
            margin_right: page.margin_right * CM,
        }
    }

    pub fn content_width(&self) -> f32 {
        (self.width - self.margin_left - self.margin_right).max(1.0)
    }

    pub fn content_height(&self) -> f32 {
        (self.height - self.margin_top - self.margin_bottom).max(1.0)
    }
}

/// Tolerance for line counts that land exactly on the page bottom.
const FIT_EPSILON: f32 = 0.01;

/// Boxes collected for one page, still in document coordinates. Split
/// paragraphs contribute owned fragments.
struct PendingPage<'a> {
    boxes: Vec<Cow<'a, PositionedBox>>,
    /// Document-space y at which the page begins.
    start_y: f32,
}

impl<'a> PendingPage<'a> {
    fn starting_at(start_y: f32) -> Self {
        Self {
            boxes: Vec::new(),
            start_y,
        }
    }

    fn fits(&self, pbox: &PositionedBox, content_height: f32) -> bool {
        self.room_at(pbox.y, content_height) >= pbox.height
    }

    /// Height left on the page below document-space `y`.
    fn room_at(&self, y: f32, content_height: f32) -> f32 {
        content_height - (y - self.start_y).max(0.0) + FIT_EPSILON
    }

    /// Number of trailing boxes that must move along with the next one:
    /// keep-with-next boxes plus any spacers that follow them.
    fn trailing_keep(&self) -> usize {
        let spacers = self
            .boxes
            .iter()
            .rev()
            .take_while(|b| b.is_spacer())
            .count();
        let keep = self
            .boxes
            .iter()
            .rev()
            .skip(spacers)
            .take_while(|b| b.keep_with_next)
            .count();
        if keep == 0 {
            0
        } else {
            keep + spacers
        }
    }
}

/// Convert positioned boxes into a paginated LayoutConfig. Decorations are
/// left empty; the page decorator fills them in.
pub fn paginate(boxes: &[PositionedBox], geometry: &PageGeometry, title: &str) -> LayoutConfig {
    let content_height = geometry.content_height();
    let mut pages: Vec<PendingPage> = Vec::new();
    let mut current = PendingPage::starting_at(0.0);

    for pbox in boxes {
        if current.fits(pbox, content_height) || current.boxes.is_empty() {
            place(pbox, &mut pages, &mut current, content_height);
            continue;
        }

        // Gaps at a page boundary are dropped.
        if pbox.is_spacer() {
            continue;
        }

        if pbox.splittable {
            split_rows(pbox, &mut pages, &mut current, content_height);
            continue;
        }

        if lines_that_fit(pbox, &current, content_height) > 0 {
            split_lines(pbox, &mut pages, &mut current, content_height);
            continue;
        }

        let keep = current.trailing_keep();
        let carried = if keep > 0 && keep < current.boxes.len() {
            current.boxes.split_off(current.boxes.len() - keep)
        } else {
            Vec::new()
        };
        let start_y = carried.first().map_or(pbox.y, |b| b.y);
        pages.push(std::mem::replace(&mut current, PendingPage::starting_at(start_y)));
        current.boxes.extend(carried);
        place(pbox, &mut pages, &mut current, content_height);
    }

    if !current.boxes.is_empty() || pages.is_empty() {
        pages.push(current);
    }

    let pages: Vec<PageLayout> = pages
        .into_iter()
        .enumerate()
        .map(|(index, pending)| {
            let mut page = PageLayout::new(index);
            page.boxes = pending
                .boxes
                .iter()
                .map(|pbox| {
                    let y_on_page = (pbox.y - pending.start_y).max(0.0);
                    build_layout_box(pbox, geometry.margin_top + y_on_page)
                })
                .collect();
            page
        })
        .collect();

    log::debug!("Paginated {} boxes onto {} pages", boxes.len(), pages.len());
    LayoutConfig {
        title: title.to_string(),
        page_width_pt: geometry.width,
        page_height_pt: geometry.height,
        pages,
    }
}

/// Add `pbox` to the current page, splitting it when it does not fit.
fn place<'a>(
    pbox: &'a PositionedBox,
    pages: &mut Vec<PendingPage<'a>>,
    current: &mut PendingPage<'a>,
    content_height: f32,
) {
    if current.fits(pbox, content_height) {
        current.boxes.push(Cow::Borrowed(pbox));
    } else if pbox.splittable {
        split_rows(pbox, pages, current, content_height);
    } else if matches!(pbox.content, BoxContent::Text(_)) {
        split_lines(pbox, pages, current, content_height);
    } else {
        current.boxes.push(Cow::Borrowed(pbox));
    }
}

/// Place a table row by row, breaking the page between rows.
fn split_rows<'a>(
    table: &'a PositionedBox,
    pages: &mut Vec<PendingPage<'a>>,
    current: &mut PendingPage<'a>,
    content_height: f32,
) {
    for row in &table.children {
        if !current.fits(row, content_height) && !current.boxes.is_empty() {
            pages.push(std::mem::replace(current, PendingPage::starting_at(row.y)));
        }
        current.boxes.push(Cow::Borrowed(row));
    }
}

/// Whole lines of a text box that fit below its top on the current page.
fn lines_that_fit(pbox: &PositionedBox, page: &PendingPage, content_height: f32) -> usize {
    match &pbox.content {
        BoxContent::Text(block) if block.leading > 0.0 => {
            let room = page.room_at(pbox.y, content_height).max(0.0);
            ((room / block.leading).floor() as usize).min(block.lines.len())
        }
        _ => 0,
    }
}

/// Place a paragraph or code block line by line, breaking the page between
/// lines. A single line taller than a page is placed on its own.
fn split_lines<'a>(
    pbox: &'a PositionedBox,
    pages: &mut Vec<PendingPage<'a>>,
    current: &mut PendingPage<'a>,
    content_height: f32,
) {
    let BoxContent::Text(block) = &pbox.content else {
        current.boxes.push(Cow::Borrowed(pbox));
        return;
    };

    let mut rest = block.lines.as_slice();
    let mut top = pbox.y;
    while !rest.is_empty() {
        let room = current.room_at(top, content_height).max(0.0);
        let mut count = if block.leading > 0.0 {
            ((room / block.leading).floor() as usize).min(rest.len())
        } else {
            rest.len()
        };
        if count == 0 {
            if current.boxes.is_empty() {
                count = 1;
            } else {
                pages.push(std::mem::replace(current, PendingPage::starting_at(top)));
                continue;
            }
        }

        let (head, tail) = rest.split_at(count);
        let height = count as f32 * block.leading;
        current.boxes.push(Cow::Owned(PositionedBox {
            y: top,
            height,
            content: BoxContent::Text(TextBlock {
                lines: head.to_vec(),
                ..block.clone()
            }),
            children: Vec::new(),
            // Only the final fragment binds to the next block.
            keep_with_next: pbox.keep_with_next && tail.is_empty(),
            ..pbox.clone()
        }));
        rest = tail;
        top += height;
        if !rest.is_empty() {
            pages.push(std::mem::replace(current, PendingPage::starting_at(top)));
        }
    }
}

/// Recursively build a LayoutBox tree with page-absolute coordinates
/// (origin = top-left of the physical page). PositionedBox.x already
/// includes the left margin.
fn build_layout_box(pbox: &PositionedBox, abs_y: f32) -> LayoutBox {
    let mut lb = LayoutBox::new(pbox.x, abs_y, pbox.width, pbox.height);
    lb.background_color = pbox.background.map(|c| c.to_array());
    lb.border = pbox.border.map(|b| BorderStyle {
        width: b.width,
        color: b.color.to_array(),
        edges: if b.left_only {
            BorderEdges::Left
        } else {
            BorderEdges::All
        },
    });

    match &pbox.content {
        BoxContent::Text(block) => lb.text = Some(text_content(block, pbox.width)),
        BoxContent::Rule(rule) => {
            lb.rule = Some(RuleContent {
                color: rule.color.to_array(),
                thickness: rule.thickness,
            })
        }
        BoxContent::None => {}
    }

    // Child y values are document-space, so the difference to the parent is
    // the offset inside it.
    lb.children = pbox
        .children
        .iter()
        .map(|child| build_layout_box(child, abs_y + (child.y - pbox.y)))
        .collect();
    lb
}

fn text_content(block: &TextBlock, box_width: f32) -> TextContent {
    let available = (box_width - block.inset_left).max(0.0);
    let lines = block
        .lines
        .iter()
        .enumerate()
        .map(|(i, laid)| {
            let slack = (available - laid.line.width).max(0.0);
            let align = match block.alignment {
                Alignment::Center => slack / 2.0,
                Alignment::Right => slack,
                Alignment::Left | Alignment::Justify => 0.0,
            };
            TextLine {
                runs: laid
                    .line
                    .runs
                    .iter()
                    .map(|run| TextRun {
                        text: run.text.clone(),
                        font: run.font,
                        font_size: run.font_size,
                        color: run.color.to_array(),
                        underline: run.underline,
                        width: run.width,
                    })
                    .collect(),
                x_offset: block.inset_left + align,
                y_offset: i as f32 * block.leading,
                ascent: laid.baseline,
            }
        })
        .collect();
    TextContent {
        lines,
        line_height: block.leading,
    }
}
