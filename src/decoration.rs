//! Page decorations – watermark, optional header band and footer, drawn on
//! every page independently of the flowing content.
//!
//! Coordinates are PDF user space: origin bottom-left, y upwards.

use serde::{Deserialize, Serialize};

use crate::config::PdfConfig;
use crate::fonts::{FontFamily, FontManager, FontSpec};
use crate::markdown::CM;
use crate::style::Color;

/// Footer font size in points.
pub const FOOTER_FONT_SIZE: f32 = 8.0;

/// Distance of the footer baseline from the bottom edge, and of its text from
/// the left/right page edges.
pub const FOOTER_BASELINE: f32 = 1.5 * CM;
pub const FOOTER_INSET: f32 = 2.5 * CM;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decoration {
    /// Rotated translucent text; (x, y) is the start of its baseline.
    Watermark {
        text: String,
        x: f32,
        y: f32,
        angle: f32,
        font_size: f32,
        color: [f32; 4],
        opacity: f32,
    },
    /// Helvetica text starting at (x, y) on the baseline.
    Text {
        text: String,
        x: f32,
        y: f32,
        font_size: f32,
        color: [f32; 4],
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        thickness: f32,
        color: [f32; 4],
    },
}

/// Builds the decorations for each page from the config.
pub struct PageDecorator<'a> {
    config: &'a PdfConfig,
    page_width: f32,
    page_height: f32,
}

impl<'a> PageDecorator<'a> {
    pub fn new(config: &'a PdfConfig, page_width: f32, page_height: f32) -> Self {
        Self {
            config,
            page_width,
            page_height,
        }
    }

    fn color(&self, value: &str) -> [f32; 4] {
        Color::from_hex(&self.config.color(value))
            .unwrap_or(Color::BLACK)
            .to_array()
    }

    /// Decorations for the page numbered `page_number` (1-based).
    pub fn decorate(&self, page_number: usize, fonts: &FontManager) -> Vec<Decoration> {
        let mut out = Vec::new();
        let helvetica = FontSpec::new(FontFamily::Helvetica);

        let wm = &self.config.watermark;
        if wm.enabled && !wm.text.is_empty() {
            // Centre the text on the page centre along its rotated baseline.
            let width = fonts.measure(&wm.text, wm.font_size, helvetica);
            let theta = wm.angle.to_radians();
            let (cx, cy) = (self.page_width / 2.0, self.page_height / 2.0);
            out.push(Decoration::Watermark {
                text: wm.text.clone(),
                x: cx - width / 2.0 * theta.cos(),
                y: cy - width / 2.0 * theta.sin(),
                angle: wm.angle,
                font_size: wm.font_size,
                color: self.color(&wm.color),
                opacity: wm.opacity,
            });
        }

        let header = &self.config.header;
        if header.enabled {
            let margin_top = self.config.page.margin_top * CM;
            let margin_left = self.config.page.margin_left * CM;
            let margin_right = self.config.page.margin_right * CM;
            let text = header
                .text
                .clone()
                .unwrap_or_else(|| self.config.branding.tagline.clone());
            let line_y = self.page_height - margin_top + 0.3 * CM;
            out.push(Decoration::Text {
                text,
                x: margin_left,
                y: line_y + 0.2 * CM,
                font_size: header.font_size,
                color: self.color(&header.color),
            });
            if header.show_line {
                out.push(Decoration::Line {
                    x1: margin_left,
                    y1: line_y,
                    x2: self.page_width - margin_right,
                    y2: line_y,
                    thickness: self.config.divider.thickness,
                    color: self.color(&self.config.divider.color),
                });
            }
        }

        let footer = &self.config.footer;
        if footer.enabled {
            let color = self.color("text_light");
            if footer.show_page_number {
                let number = page_number.to_string();
                let width = fonts.measure(&number, FOOTER_FONT_SIZE, helvetica);
                out.push(Decoration::Text {
                    text: number,
                    x: self.page_width - FOOTER_INSET - width,
                    y: FOOTER_BASELINE,
                    font_size: FOOTER_FONT_SIZE,
                    color,
                });
            }
            if footer.show_service_info {
                out.push(Decoration::Text {
                    text: self.config.branding.service_name_en.clone(),
                    x: FOOTER_INSET,
                    y: FOOTER_BASELINE,
                    font_size: FOOTER_FONT_SIZE,
                    color,
                });
            }
        }

        out
    }
}
