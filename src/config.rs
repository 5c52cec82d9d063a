//! PDF styling configuration – the typed YAML schema that drives every visual
//! decision of the summary renderer.
//!
//! The configuration is loaded once (usually from `pdf_config.yaml`) and then
//! handed by reference to [`crate::pipeline::SummaryRenderer`]. Nothing
//! mutates it after [`PdfConfig::validate`] has accepted it.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::markdown::StyleTag;
use crate::style::{resolve_color, Color};

/// Root of the YAML configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfConfig {
    pub branding: Branding,
    /// Named colours, e.g. `primary: "#7C3AED"`.
    pub colors: BTreeMap<String, String>,
    pub fonts: FontsConfig,
    pub page: PageConfig,
    pub paragraph_styles: ParagraphStyles,
    pub watermark: WatermarkConfig,
    pub header: HeaderConfig,
    pub footer: FooterConfig,
    pub divider: DividerConfig,
    pub table_style: TableStyleConfig,
    /// Fixed strings printed around the summary. Defaults to Korean labels.
    #[serde(default)]
    pub labels: Labels,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branding {
    pub service_name: String,
    pub service_name_en: String,
    pub tagline: String,
    pub footer_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontsConfig {
    /// TTF/OTF files tried in order; the first one that parses wins.
    #[serde(default)]
    pub paths: Vec<String>,
    /// Builtin PDF font used when none of `paths` is usable.
    pub default: String,
}

/// Page margins, in centimetres.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
}

/// One entry per paragraph style the converter and the document header
/// refer to. Every style must be present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParagraphStyles {
    pub title: ParagraphStyleConfig,
    pub subtitle: ParagraphStyleConfig,
    pub meta: ParagraphStyleConfig,
    pub section_title: ParagraphStyleConfig,
    pub body: ParagraphStyleConfig,
    pub h1: ParagraphStyleConfig,
    pub h2: ParagraphStyleConfig,
    pub h3: ParagraphStyleConfig,
    pub quote: ParagraphStyleConfig,
    pub code: ParagraphStyleConfig,
}

impl ParagraphStyles {
    pub fn get(&self, tag: StyleTag) -> &ParagraphStyleConfig {
        match tag {
            StyleTag::Title => &self.title,
            StyleTag::Subtitle => &self.subtitle,
            StyleTag::Meta => &self.meta,
            StyleTag::SectionTitle => &self.section_title,
            StyleTag::Body => &self.body,
            StyleTag::H1 => &self.h1,
            StyleTag::H2 => &self.h2,
            StyleTag::H3 => &self.h3,
            StyleTag::Quote => &self.quote,
            StyleTag::Code => &self.code,
        }
    }
}

/// Attributes of a single named paragraph style. Sizes and spacing are in
/// points.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParagraphStyleConfig {
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    /// Leading in points; defaults to 1.2 × `font_size`.
    #[serde(default)]
    pub line_height: Option<f32>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub alignment: Alignment,
    #[serde(default)]
    pub space_before: f32,
    #[serde(default)]
    pub space_after: f32,
    #[serde(default)]
    pub left_indent: f32,
    #[serde(default)]
    pub right_indent: f32,
    #[serde(default)]
    pub bold: bool,
    /// Overrides the resolved font for this style (builtin font name).
    #[serde(default)]
    pub font_name: Option<String>,
    #[serde(default)]
    pub border_width: f32,
    #[serde(default)]
    pub border_color: Option<String>,
    #[serde(default)]
    pub border_padding: f32,
}

fn default_font_size() -> f32 {
    10.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatermarkConfig {
    pub enabled: bool,
    pub text: String,
    pub font_size: f32,
    pub color: String,
    pub opacity: f32,
    /// Rotation in degrees, counter-clockwise.
    pub angle: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderConfig {
    pub enabled: bool,
    /// Header text; the branding tagline when absent.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default = "default_header_font_size")]
    pub font_size: f32,
    #[serde(default = "default_header_color")]
    pub color: String,
    #[serde(default)]
    pub show_line: bool,
}

fn default_header_font_size() -> f32 {
    8.0
}

fn default_header_color() -> String {
    "text_light".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FooterConfig {
    pub enabled: bool,
    pub show_page_number: bool,
    pub show_service_info: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DividerConfig {
    pub color: String,
    pub space_before: f32,
    pub space_after: f32,
    #[serde(default = "default_divider_thickness")]
    pub thickness: f32,
}

fn default_divider_thickness() -> f32 {
    0.5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableStyleConfig {
    pub border: TableBorder,
    pub header: TableHeader,
    pub cell: TableCell,
    pub stripe: TableStripe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableBorder {
    pub color: String,
    pub width: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableHeader {
    pub font_size: f32,
    /// Header row fill; `null` leaves the header unfilled.
    #[serde(default)]
    pub background: Option<String>,
    pub text_color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCell {
    pub padding: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableStripe {
    pub enabled: bool,
    pub even_row_color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub section_title: String,
    pub room: String,
    pub date: String,
    pub messages: String,
    pub message_suffix: String,
    pub untitled_room: String,
    pub user_role: String,
    pub assistant_role: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            section_title: "대화 요약".to_string(),
            room: "대화방".to_string(),
            date: "일시".to_string(),
            messages: "메시지".to_string(),
            message_suffix: "개".to_string(),
            untitled_room: "제목 없음".to_string(),
            user_role: "사용자".to_string(),
            assistant_role: "상담사".to_string(),
        }
    }
}

impl PdfConfig {
    /// Read, parse and validate a YAML configuration file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&content)?;
        log::debug!("Loaded PDF config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a YAML configuration held in memory.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: PdfConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve a colour reference to a `#RRGGBB` string.
    pub fn color(&self, value: &str) -> String {
        resolve_color(&self.colors, value).to_string()
    }

    /// Check the invariants the renderer relies on. Unknown colour *names*
    /// are allowed (they resolve to black) but every hex value must parse.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in &self.colors {
            if Color::from_hex(value).is_none() {
                return Err(Error::ConfigInvalid(format!(
                    "colors.{name}: {value:?} is not a #RRGGBB colour"
                )));
            }
        }

        let m = &self.page;
        for (field, v) in [
            ("margin_top", m.margin_top),
            ("margin_bottom", m.margin_bottom),
            ("margin_left", m.margin_left),
            ("margin_right", m.margin_right),
        ] {
            if v < 0.0 {
                return Err(Error::ConfigInvalid(format!("page.{field} must not be negative")));
            }
        }

        if !(0.0..=1.0).contains(&self.watermark.opacity) {
            return Err(Error::ConfigInvalid(format!(
                "watermark.opacity must be within 0..=1, got {}",
                self.watermark.opacity
            )));
        }
        for (field, v) in [
            ("watermark.font_size", self.watermark.font_size),
            ("header.font_size", self.header.font_size),
            ("table_style.header.font_size", self.table_style.header.font_size),
        ] {
            if v <= 0.0 {
                return Err(Error::ConfigInvalid(format!("{field} must be positive")));
            }
        }

        for tag in StyleTag::ALL {
            let style = self.paragraph_styles.get(tag);
            if style.font_size <= 0.0 {
                return Err(Error::ConfigInvalid(format!(
                    "paragraph_styles.{}.font_size must be positive",
                    tag.name()
                )));
            }
            for reference in [&style.color, &style.background, &style.border_color]
                .into_iter()
                .flatten()
            {
                self.check_color_ref(&format!("paragraph_styles.{}", tag.name()), reference)?;
            }
        }

        let mut refs = vec![
            ("watermark.color", &self.watermark.color),
            ("header.color", &self.header.color),
            ("divider.color", &self.divider.color),
            ("table_style.border.color", &self.table_style.border.color),
            ("table_style.header.text_color", &self.table_style.header.text_color),
            ("table_style.stripe.even_row_color", &self.table_style.stripe.even_row_color),
        ];
        if let Some(bg) = &self.table_style.header.background {
            refs.push(("table_style.header.background", bg));
        }
        for (field, reference) in refs {
            self.check_color_ref(field, reference)?;
        }
        Ok(())
    }

    fn check_color_ref(&self, field: &str, reference: &str) -> Result<()> {
        if reference.starts_with('#') {
            if Color::from_hex(reference).is_none() {
                return Err(Error::ConfigInvalid(format!(
                    "{field}: {reference:?} is not a #RRGGBB colour"
                )));
            }
        } else if !self.colors.contains_key(reference) {
            log::warn!("{field}: colour {reference:?} is not defined, using #000000");
        }
        Ok(())
    }
}
