//! Font loading and text measurement using `ttf-parser`.
//!
//! The configured font files are tried in order and the first one that parses
//! is embedded for body text (regular and bold share the same face). When none
//! is usable the renderer falls back to a builtin PDF font and measures glyphs
//! with an average-width heuristic.

use serde::{Deserialize, Serialize};

use crate::config::FontsConfig;
use crate::style::Color;

/// Which face a run of text is set in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FontFamily {
    /// The TTF/OTF file loaded from the configured paths.
    Embedded,
    Helvetica,
    Times,
    Courier,
}

impl FontFamily {
    /// Map a builtin PDF font name (`Helvetica`, `Times-Roman`, `Courier-Bold`,
    /// ...) to its family. Returns `None` for anything else.
    pub fn from_builtin_name(name: &str) -> Option<Self> {
        let base = name
            .split('-')
            .next()
            .unwrap_or(name)
            .trim()
            .to_ascii_lowercase();
        match base.as_str() {
            "helvetica" | "arial" | "sans" | "sans-serif" => Some(FontFamily::Helvetica),
            "times" | "times new roman" | "serif" => Some(FontFamily::Times),
            "courier" | "monospace" | "mono" => Some(FontFamily::Courier),
            _ => None,
        }
    }

    /// Whether a builtin font name carries a bold suffix (`Helvetica-Bold`).
    pub fn name_is_bold(name: &str) -> bool {
        name.to_ascii_lowercase().contains("bold")
    }
}

/// A concrete face selection: family plus weight/slant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FontSpec {
    pub family: FontFamily,
    pub bold: bool,
    pub italic: bool,
}

impl FontSpec {
    pub fn new(family: FontFamily) -> Self {
        Self {
            family,
            bold: false,
            italic: false,
        }
    }
}

/// A loaded font face with metrics.
#[derive(Clone)]
pub struct EmbeddedFont {
    /// Path the face was loaded from (for logs).
    pub path: String,
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API).
    pub bytes: Vec<u8>,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
}

/// Manages the body font and measures text.
pub struct FontManager {
    embedded: Option<EmbeddedFont>,
    fallback: FontFamily,
}

impl FontManager {
    /// Builtin-only manager.
    pub fn builtin(family: FontFamily) -> Self {
        Self {
            embedded: None,
            fallback: family,
        }
    }

    /// Try every configured path in order, keeping the first face that parses.
    /// Never fails: unusable files are logged and skipped, and the configured
    /// default builtin font takes over.
    pub fn from_config(config: &FontsConfig) -> Self {
        let fallback = FontFamily::from_builtin_name(&config.default).unwrap_or_else(|| {
            log::warn!(
                "Unknown default font {:?}, falling back to Helvetica",
                config.default
            );
            FontFamily::Helvetica
        });
        let mut mgr = Self::builtin(fallback);

        for path in &config.paths {
            let bytes = match std::fs::read(path) {
                Ok(b) => b,
                Err(e) => {
                    log::debug!("Font {path} not readable: {e}");
                    continue;
                }
            };
            match mgr.load_font(path, bytes) {
                Ok(()) => {
                    log::debug!("Using embedded font {path}");
                    return mgr;
                }
                Err(e) => log::warn!("Skipping font {path}: {e}"),
            }
        }

        log::debug!("No configured font usable, using builtin {:?}", mgr.fallback);
        mgr
    }

    /// Load a TTF/OTF font from bytes as the embedded body font.
    pub fn load_font(&mut self, path: &str, bytes: Vec<u8>) -> Result<(), String> {
        let face = ttf_parser::Face::parse(&bytes, 0)
            .map_err(|e| format!("Failed to parse font: {e}"))?;

        self.embedded = Some(EmbeddedFont {
            path: path.to_string(),
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            bytes,
        });
        Ok(())
    }

    /// Family used for body text: the embedded face when loaded, otherwise the
    /// configured builtin.
    pub fn body_family(&self) -> FontFamily {
        if self.embedded.is_some() {
            FontFamily::Embedded
        } else {
            self.fallback
        }
    }

    pub fn has_embedded(&self) -> bool {
        self.embedded.is_some()
    }

    /// Get font bytes for embedding in PDF.
    pub fn embedded(&self) -> Option<&EmbeddedFont> {
        self.embedded.as_ref()
    }

    /// Measure the width of a string at a given font size (in pt).
    /// With real font bytes we sum glyph advances. Otherwise we use an average
    /// character width heuristic per builtin family.
    pub fn measure(&self, text: &str, font_size: f32, spec: FontSpec) -> f32 {
        if spec.family == FontFamily::Embedded {
            if let Some(font) = &self.embedded {
                if let Ok(face) = ttf_parser::Face::parse(&font.bytes, 0) {
                    let scale = font_size / font.units_per_em;
                    return text
                        .chars()
                        .map(|ch| match face.glyph_index(ch) {
                            Some(gid) => face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale,
                            // Fallback for missing glyph
                            None => font_size * 0.5,
                        })
                        .sum();
                }
            }
        }

        let avg = match (spec.family, spec.bold) {
            (FontFamily::Courier, _) => 0.6,
            (FontFamily::Times, false) => 0.45,
            (FontFamily::Times, true) => 0.5,
            (_, false) => 0.5,
            // Bold is ~10 % wider.
            (_, true) => 0.55,
        };
        text.chars().count() as f32 * font_size * avg
    }

    /// Ascender in pt for the given face and size.
    pub fn ascender(&self, font_size: f32, spec: FontSpec) -> f32 {
        match (&self.embedded, spec.family) {
            (Some(font), FontFamily::Embedded) => font.ascender * font_size / font.units_per_em,
            _ => font_size * 0.75,
        }
    }
}

impl Default for FontManager {
    fn default() -> Self {
        Self::builtin(FontFamily::Helvetica)
    }
}

/// A styled fragment of paragraph text, before line breaking.
#[derive(Debug, Clone, PartialEq)]
pub struct StyledText {
    pub text: String,
    pub font: FontSpec,
    pub font_size: f32,
    pub color: Color,
    pub underline: bool,
}

/// A measured run on a wrapped line.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub text: String,
    pub font: FontSpec,
    pub font_size: f32,
    pub color: Color,
    pub underline: bool,
    pub width: f32,
}

/// One wrapped line of runs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WrappedLine {
    pub runs: Vec<Run>,
    pub width: f32,
}

struct Atom<'a> {
    text: String,
    style: &'a StyledText,
    space_before: bool,
}

/// Word-wrap styled text to fit within `max_width` points.
///
/// Words that touch across a style change (`**bold**text`) stay together.
/// A word wider than the line is placed on its own line and allowed to
/// overflow. Leading indentation of the first word is preserved.
pub fn wrap_runs(parts: &[StyledText], max_width: f32, fonts: &FontManager) -> Vec<WrappedLine> {
    let mut atoms: Vec<Atom> = Vec::new();
    let mut pending_space = false;
    let mut indent = String::new();

    for part in parts {
        for (i, word) in part.text.split(' ').enumerate() {
            if i > 0 {
                if atoms.is_empty() {
                    indent.push(' ');
                } else {
                    pending_space = true;
                }
            }
            if word.is_empty() {
                continue;
            }
            let text = if atoms.is_empty() {
                format!("{}{}", std::mem::take(&mut indent), word)
            } else {
                word.to_string()
            };
            atoms.push(Atom {
                text,
                style: part,
                space_before: pending_space,
            });
            pending_space = false;
        }
    }

    // Group atoms that must not be separated by a line break.
    let mut groups: Vec<Vec<Atom>> = Vec::new();
    for atom in atoms {
        match groups.last_mut() {
            Some(group) if !atom.space_before => group.push(atom),
            _ => groups.push(vec![atom]),
        }
    }

    let measure = |a: &Atom| fonts.measure(&a.text, a.style.font_size, a.style.font);
    let space_width = |a: &Atom| fonts.measure(" ", a.style.font_size, a.style.font);

    let mut lines: Vec<Vec<(Atom, bool)>> = Vec::new();
    let mut current: Vec<(Atom, bool)> = Vec::new();
    let mut current_width = 0.0f32;

    for group in groups {
        let group_width: f32 = group.iter().map(measure).sum();
        let gap = if current.is_empty() {
            0.0
        } else {
            space_width(&group[0])
        };
        if !current.is_empty() && max_width > 0.0 && current_width + gap + group_width > max_width {
            lines.push(std::mem::take(&mut current));
            current_width = 0.0;
        }
        let gap = if current.is_empty() { 0.0 } else { gap };
        current_width += gap + group_width;
        for (i, atom) in group.into_iter().enumerate() {
            let spaced = i == 0 && !current.is_empty();
            current.push((atom, spaced));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    let mut wrapped: Vec<WrappedLine> = lines
        .into_iter()
        .map(|atoms| {
            let mut runs: Vec<(String, &StyledText)> = Vec::new();
            for (atom, spaced) in atoms {
                match runs.last_mut() {
                    Some((text, style)) if std::ptr::eq(*style, atom.style) => {
                        if spaced {
                            text.push(' ');
                        }
                        text.push_str(&atom.text);
                    }
                    _ => {
                        let text = if spaced {
                            format!(" {}", atom.text)
                        } else {
                            atom.text
                        };
                        runs.push((text, atom.style));
                    }
                }
            }
            let runs: Vec<Run> = runs
                .into_iter()
                .map(|(text, style)| Run {
                    width: fonts.measure(&text, style.font_size, style.font),
                    text,
                    font: style.font,
                    font_size: style.font_size,
                    color: style.color,
                    underline: style.underline,
                })
                .collect();
            WrappedLine {
                width: runs.iter().map(|r| r.width).sum(),
                runs,
            }
        })
        .collect();

    if wrapped.is_empty() {
        wrapped.push(WrappedLine::default());
    }
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &str) -> StyledText {
        StyledText {
            text: text.to_string(),
            font: FontSpec::new(FontFamily::Helvetica),
            font_size: 16.0,
            color: Color::BLACK,
            underline: false,
        }
    }

    #[test]
    fn heuristic_text_width() {
        let mgr = FontManager::default();
        let w = mgr.measure("Hello", 16.0, FontSpec::new(FontFamily::Helvetica));
        // 5 chars × 16 × 0.5 = 40
        assert!((w - 40.0).abs() < 0.1);
        let mono = mgr.measure("Hello", 10.0, FontSpec::new(FontFamily::Courier));
        assert!((mono - 30.0).abs() < 0.1);
    }

    #[test]
    fn word_wrap_basic() {
        let mgr = FontManager::default();
        let lines = wrap_runs(&[plain("Hello world foo bar")], 60.0, &mgr);
        assert!(lines.len() >= 2, "Expected wrapping, got {:?}", lines);
        assert_eq!(lines[0].runs[0].text, "Hello");
    }

    #[test]
    fn adjacent_styles_stay_on_one_line() {
        let mgr = FontManager::default();
        let mut bold = plain("bold");
        bold.font.bold = true;
        let lines = wrap_runs(&[plain("a "), bold, plain("tail")], 1000.0, &mgr);
        assert_eq!(lines.len(), 1);
        let texts: Vec<&str> = lines[0].runs.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["a", " bold", "tail"]);
    }

    #[test]
    fn leading_indent_is_kept() {
        let mgr = FontManager::default();
        let lines = wrap_runs(&[plain("  • item")], 1000.0, &mgr);
        assert_eq!(lines[0].runs[0].text, "  • item");
    }

    #[test]
    fn empty_text_yields_one_empty_line() {
        let mgr = FontManager::default();
        let lines = wrap_runs(&[plain("")], 100.0, &mgr);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].runs.is_empty());
    }

    #[test]
    fn unknown_paths_fall_back_to_builtin() {
        let config = FontsConfig {
            paths: vec!["/no/such/font.ttf".to_string()],
            default: "Times-Roman".to_string(),
        };
        let mgr = FontManager::from_config(&config);
        assert!(!mgr.has_embedded());
        assert_eq!(mgr.body_family(), FontFamily::Times);
    }

    #[test]
    fn garbage_font_file_is_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        let bogus = dir.path().join("bogus.ttf");
        std::fs::write(&bogus, b"not a font").unwrap();
        let config = FontsConfig {
            paths: vec![bogus.to_string_lossy().into_owned()],
            default: "NoSuchFont".to_string(),
        };
        let mgr = FontManager::from_config(&config);
        assert_eq!(mgr.body_family(), FontFamily::Helvetica);
    }

    #[test]
    fn builtin_names() {
        assert_eq!(
            FontFamily::from_builtin_name("Helvetica-Bold"),
            Some(FontFamily::Helvetica)
        );
        assert!(FontFamily::name_is_bold("Helvetica-Bold"));
        assert_eq!(FontFamily::from_builtin_name("Courier"), Some(FontFamily::Courier));
        assert_eq!(FontFamily::from_builtin_name("KoreanFont"), None);
    }
}
