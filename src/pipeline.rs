//! Pipeline – ties together document assembly, styling, layout, pagination,
//! decoration and rendering behind one renderer instance.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::config::PdfConfig;
use crate::decoration::PageDecorator;
use crate::document::{build_story, SummaryMeta};
use crate::error::Result;
use crate::fonts::FontManager;
use crate::layout::compute_layout;
use crate::layout_config::LayoutConfig;
use crate::markdown::Block;
use crate::pagination::{paginate, PageGeometry};
use crate::render::render_pdf;
use crate::style::StyleSheet;

/// Renders chat summaries to PDF. Fonts and styles are resolved once at
/// construction and reused for every document.
pub struct SummaryRenderer {
    config: Arc<PdfConfig>,
    fonts: FontManager,
    styles: StyleSheet,
    geometry: PageGeometry,
}

impl SummaryRenderer {
    pub fn new(config: Arc<PdfConfig>) -> Result<Self> {
        config.validate()?;
        let fonts = FontManager::from_config(&config.fonts);
        let styles = StyleSheet::from_config(&config, &fonts);
        let geometry = PageGeometry::a4(&config.page);
        log::debug!(
            "Renderer ready (body font {:?}, content width {:.1} pt)",
            fonts.body_family(),
            geometry.content_width()
        );
        Ok(Self {
            config,
            fonts,
            styles,
            geometry,
        })
    }

    pub fn config(&self) -> &PdfConfig {
        &self.config
    }

    pub fn fonts(&self) -> &FontManager {
        &self.fonts
    }

    /// Lay out and paginate arbitrary blocks, with page decorations.
    pub fn layout(&self, blocks: &[Block], title: &str) -> Result<LayoutConfig> {
        let boxes = compute_layout(
            blocks,
            self.geometry.content_width(),
            self.geometry.margin_left,
            &self.styles,
            &self.fonts,
        )?;
        let mut layout = paginate(&boxes, &self.geometry, title);

        let decorator = PageDecorator::new(&self.config, layout.page_width_pt, layout.page_height_pt);
        for page in &mut layout.pages {
            page.decorations = decorator.decorate(page.page_index + 1, &self.fonts);
        }
        Ok(layout)
    }

    /// Full story layout: branded header, meta block and the summary.
    pub fn layout_summary(&self, meta: &SummaryMeta, summary_markdown: &str) -> Result<LayoutConfig> {
        let story = build_story(&self.config, meta, summary_markdown);
        self.layout(&story, &meta.room_title)
    }

    /// Summary text plus metadata → PDF bytes.
    pub fn render_summary(&self, meta: &SummaryMeta, summary_markdown: &str) -> Result<Vec<u8>> {
        let started = Instant::now();
        let layout = self.layout_summary(meta, summary_markdown)?;
        let bytes = self.render_layout(&layout)?;
        log::debug!(
            "Rendered {} pages ({} bytes) in {:?}",
            layout.pages.len(),
            bytes.len(),
            started.elapsed()
        );
        Ok(bytes)
    }

    /// Render an already computed layout.
    pub fn render_layout(&self, layout: &LayoutConfig) -> Result<Vec<u8>> {
        render_pdf(layout, &self.fonts)
    }
}

/// Write an output file, creating missing parent directories.
pub fn write_output(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_config;
    use crate::decoration::Decoration;
    use chrono::NaiveDate;

    fn renderer() -> SummaryRenderer {
        SummaryRenderer::new(Arc::new(sample_config())).unwrap()
    }

    fn meta() -> SummaryMeta {
        SummaryMeta {
            room_title: "Room".to_string(),
            created_at: NaiveDate::from_ymd_opt(2025, 1, 2)
                .unwrap()
                .and_hms_opt(3, 4, 0)
                .unwrap(),
            message_count: 7,
        }
    }

    #[test]
    fn pipeline_basic() {
        let bytes = renderer()
            .render_summary(&meta(), "# Hello\nWorld")
            .unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn every_page_is_decorated() {
        let md: String = (0..150).map(|i| format!("line {i}\n")).collect();
        let layout = renderer().layout_summary(&meta(), &md).unwrap();
        assert!(layout.pages.len() > 1);
        for (i, page) in layout.pages.iter().enumerate() {
            assert!(matches!(page.decorations[0], Decoration::Watermark { .. }));
            let number = (i + 1).to_string();
            assert!(page
                .decorations
                .iter()
                .any(|d| matches!(d, Decoration::Text { text, .. } if *text == number)));
        }
    }

    #[test]
    fn layout_title_is_room_title() {
        let layout = renderer().layout_summary(&meta(), "x").unwrap();
        assert_eq!(layout.title, "Room");
        assert_eq!(layout.text_lines()[0], "러브노트 Love-Note");
    }

    #[test]
    fn write_output_creates_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/out/summary.pdf");
        write_output(&path, b"%PDF-1.7").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"%PDF-1.7");
    }

    #[test]
    fn write_output_reports_io_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let err = write_output(blocker.join("summary.pdf"), b"data").unwrap_err();
        assert!(matches!(err, crate::error::Error::Io(_)));
    }
}
