//! PDF output – draws a paginated [`LayoutConfig`] with printpdf's op lists.
//! Page decorations are drawn first, then boxes in tree order.

use std::collections::HashMap;

use printpdf::*;

use crate::decoration::Decoration;
use crate::error::{Error, Result};
use crate::fonts::{FontFamily, FontManager, FontSpec};
use crate::layout_config::*;

/// Points to millimetres.
const PT_TO_MM: f32 = 0.352778;

/// Fonts and graphics states registered with the document.
struct Resources {
    embedded: Option<FontId>,
    /// Fill-alpha graphics states keyed by the opacity's bit pattern.
    alpha_states: HashMap<u32, ExtendedGraphicsStateId>,
}

impl Resources {
    fn register(doc: &mut PdfDocument, config: &LayoutConfig, fonts: &FontManager) -> Result<Self> {
        let uses_embedded = config.pages.iter().any(|p| p.boxes.iter().any(box_uses_embedded));
        let embedded = match (uses_embedded, fonts.embedded()) {
            (true, Some(font)) => {
                let parsed = ParsedFont::from_bytes(&font.bytes, 0, &mut Vec::new())
                    .ok_or_else(|| Error::Font(format!("cannot embed font {}", font.path)))?;
                log::debug!("Embedding font {}", font.path);
                Some(doc.add_font(&parsed))
            }
            (true, None) => {
                log::warn!("Layout references an embedded font but none is loaded, using Helvetica");
                None
            }
            (false, _) => None,
        };

        let mut alpha_states = HashMap::new();
        for page in &config.pages {
            for decoration in &page.decorations {
                if let Decoration::Watermark { opacity, .. } = decoration {
                    alpha_states.entry(opacity.to_bits()).or_insert_with(|| {
                        doc.add_graphics_state(
                            ExtendedGraphicsState::default()
                                .with_current_fill_alpha(*opacity),
                        )
                    });
                }
            }
        }

        Ok(Self {
            embedded,
            alpha_states,
        })
    }
}

fn box_uses_embedded(lbox: &LayoutBox) -> bool {
    let own = lbox.text.as_ref().is_some_and(|t| {
        t.lines
            .iter()
            .flat_map(|l| &l.runs)
            .any(|r| r.font.family == FontFamily::Embedded)
    });
    own || lbox.children.iter().any(box_uses_embedded)
}

/// Draw every page of `config` and serialise the document.
pub fn render_pdf(config: &LayoutConfig, fonts: &FontManager) -> Result<Vec<u8>> {
    let page_w = Mm(config.page_width_pt * PT_TO_MM);
    let page_h = Mm(config.page_height_pt * PT_TO_MM);

    let mut doc = PdfDocument::new(&config.title);
    let resources = Resources::register(&mut doc, config, fonts)?;

    let mut pages = Vec::new();
    for page_layout in &config.pages {
        let mut ops = Vec::new();

        // Decorations sit underneath the content.
        for decoration in &page_layout.decorations {
            render_decoration(&mut ops, decoration, &resources);
        }
        for lbox in &page_layout.boxes {
            render_box(&mut ops, lbox, config.page_height_pt, &resources);
        }

        pages.push(PdfPage::new(page_w, page_h, ops));
    }

    // An empty layout still produces a blank page.
    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    doc.with_pages(pages);
    let mut warnings = Vec::new();
    let options = PdfSaveOptions {
        // Builtin-font text is written as raw `Tj` ops, see `builtin_text`.
        secure: false,
        ..PdfSaveOptions::default()
    };
    let bytes = doc.save(&options, &mut warnings);
    if !warnings.is_empty() {
        log::debug!("printpdf reported {} warnings while saving", warnings.len());
    }
    if bytes.is_empty() {
        return Err(Error::Render("printpdf produced an empty document".to_string()));
    }
    Ok(bytes)
}

/// Encode text as WinAnsi bytes for the builtin fonts. Characters outside
/// that set become `?`.
fn to_winansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{00A0}' => b' ',
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect()
}

/// Ops that show `text` in a builtin font at the current text position.
///
/// printpdf copies builtin-font strings into the content stream as UTF-8, so
/// the glyph bytes go out through a raw `Tj` with a hex string instead. The
/// empty `WriteTextBuiltinFont` emits nothing but registers the font in the
/// page resources.
fn builtin_text(text: &str, font: BuiltinFont) -> [Op; 2] {
    [
        Op::WriteTextBuiltinFont {
            items: Vec::new(),
            font,
        },
        Op::Unknown {
            key: "Tj".to_string(),
            value: vec![DictItem::String {
                data: to_winansi(text),
                literal: false,
            }],
        },
    ]
}

fn builtin_font(spec: FontSpec) -> BuiltinFont {
    match (spec.family, spec.bold, spec.italic) {
        (FontFamily::Times, true, true) => BuiltinFont::TimesBoldItalic,
        (FontFamily::Times, true, false) => BuiltinFont::TimesBold,
        (FontFamily::Times, false, true) => BuiltinFont::TimesItalic,
        (FontFamily::Times, false, false) => BuiltinFont::TimesRoman,
        (FontFamily::Courier, true, true) => BuiltinFont::CourierBoldOblique,
        (FontFamily::Courier, true, false) => BuiltinFont::CourierBold,
        (FontFamily::Courier, false, true) => BuiltinFont::CourierOblique,
        (FontFamily::Courier, false, false) => BuiltinFont::Courier,
        (_, true, true) => BuiltinFont::HelveticaBoldOblique,
        (_, true, false) => BuiltinFont::HelveticaBold,
        (_, false, true) => BuiltinFont::HelveticaOblique,
        (_, false, false) => BuiltinFont::Helvetica,
    }
}

fn rgb(c: [f32; 4]) -> Color {
    Color::Rgb(Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

fn stroke(ops: &mut Vec<Op>, points: Vec<LinePoint>, is_closed: bool, width: f32, color: [f32; 4]) {
    ops.push(Op::SetOutlineColor { col: rgb(color) });
    ops.push(Op::SetOutlineThickness { pt: Pt(width) });
    ops.push(Op::DrawLine {
        line: Line { points, is_closed },
    });
}

/// Write one run of text at the current text cursor.
fn write_run(ops: &mut Vec<Op>, run: &TextRun, resources: &Resources) {
    ops.push(Op::SetFillColor { col: rgb(run.color) });
    match (run.font.family, &resources.embedded) {
        (FontFamily::Embedded, Some(font_id)) => {
            ops.push(Op::SetFontSize {
                size: Pt(run.font_size),
                font: font_id.clone(),
            });
            ops.push(Op::WriteText {
                items: vec![TextItem::Text(run.text.clone())],
                font: font_id.clone(),
            });
        }
        _ => {
            let font = builtin_font(run.font);
            ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(run.font_size),
                font,
            });
            ops.extend(builtin_text(&run.text, font));
        }
    }
}

fn render_decoration(ops: &mut Vec<Op>, decoration: &Decoration, resources: &Resources) {
    match decoration {
        Decoration::Watermark {
            text,
            x,
            y,
            angle,
            font_size,
            color,
            opacity,
        } => {
            ops.push(Op::SaveGraphicsState);
            if let Some(gs) = resources.alpha_states.get(&opacity.to_bits()) {
                ops.push(Op::LoadGraphicsState { gs: gs.clone() });
            }
            ops.push(Op::StartTextSection);
            ops.push(Op::SetTextMatrix {
                matrix: TextMatrix::TranslateRotate(Pt(*x), Pt(*y), *angle),
            });
            ops.push(Op::SetFillColor { col: rgb(*color) });
            ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(*font_size),
                font: BuiltinFont::Helvetica,
            });
            ops.extend(builtin_text(text, BuiltinFont::Helvetica));
            ops.push(Op::EndTextSection);
            ops.push(Op::RestoreGraphicsState);
        }
        Decoration::Text {
            text,
            x,
            y,
            font_size,
            color,
        } => {
            ops.push(Op::StartTextSection);
            ops.push(Op::SetTextCursor {
                pos: Point { x: Pt(*x), y: Pt(*y) },
            });
            ops.push(Op::SetFillColor { col: rgb(*color) });
            ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(*font_size),
                font: BuiltinFont::Helvetica,
            });
            ops.extend(builtin_text(text, BuiltinFont::Helvetica));
            ops.push(Op::EndTextSection);
        }
        Decoration::Line {
            x1,
            y1,
            x2,
            y2,
            thickness,
            color,
        } => stroke(
            ops,
            vec![point(*x1, *y1), point(*x2, *y2)],
            false,
            *thickness,
            *color,
        ),
    }
}

/// Append the ops for `lbox` and its descendants.
fn render_box(ops: &mut Vec<Op>, lbox: &LayoutBox, page_height: f32, resources: &Resources) {
    // Layout y grows downward from the page top; PDF y grows upward.
    let top = page_height - lbox.y;
    let bottom = top - lbox.height;
    let (left, right) = (lbox.x, lbox.x + lbox.width);

    // Background
    if let Some(bg) = lbox.background_color {
        ops.push(Op::SetFillColor { col: rgb(bg) });
        ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing {
                    points: vec![
                        point(left, bottom),
                        point(right, bottom),
                        point(right, top),
                        point(left, top),
                    ],
                }],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            },
        });
    }

    // Border
    if let Some(border) = &lbox.border {
        match border.edges {
            BorderEdges::All => stroke(
                ops,
                vec![
                    point(left, top),
                    point(right, top),
                    point(right, bottom),
                    point(left, bottom),
                ],
                true,
                border.width,
                border.color,
            ),
            BorderEdges::Left => {
                let x = left + border.width / 2.0;
                stroke(
                    ops,
                    vec![point(x, top), point(x, bottom)],
                    false,
                    border.width,
                    border.color,
                );
            }
        }
    }

    // Rule
    if let Some(rule) = &lbox.rule {
        let y = top - lbox.height / 2.0;
        stroke(
            ops,
            vec![point(left, y), point(right, y)],
            false,
            rule.thickness,
            rule.color,
        );
    }

    // Text
    if let Some(text) = &lbox.text {
        for tline in &text.lines {
            if tline.runs.is_empty() {
                continue;
            }
            let text_x = left + tline.x_offset;
            let baseline = top - tline.y_offset - tline.ascent;

            ops.push(Op::StartTextSection);
            ops.push(Op::SetTextCursor {
                pos: Point {
                    x: Pt(text_x),
                    y: Pt(baseline),
                },
            });
            for run in &tline.runs {
                write_run(ops, run, resources);
            }
            ops.push(Op::EndTextSection);

            // Underlines
            let mut run_x = text_x;
            for run in &tline.runs {
                if run.underline {
                    let underline_y = baseline - run.font_size * 0.1;
                    let start = run_x + leading_space_width(run);
                    stroke(
                        ops,
                        vec![point(start, underline_y), point(run_x + run.width, underline_y)],
                        false,
                        0.5,
                        run.color,
                    );
                }
                run_x += run.width;
            }
        }
    }

    // Children
    for child in &lbox.children {
        render_box(ops, child, page_height, resources);
    }
}

/// Runs that follow a word break begin with a space that is not underlined.
fn leading_space_width(run: &TextRun) -> f32 {
    let chars = run.text.chars().count();
    if chars == 0 || !run.text.starts_with(' ') {
        return 0.0;
    }
    run.width / chars as f32
}
