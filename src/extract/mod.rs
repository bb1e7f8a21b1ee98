//! Geometry and text extraction.
//!
//! [`PageExtractor`] turns a PDF page into [`PageContent`]: positioned spans grouped into lines
//! and blocks, image placements and vector drawings, with blocks kept in the order the content
//! stream painted them.

pub mod backend;
mod content;
mod grouping;
mod source;
mod text;

use std::path::Path;

pub use backend::{ContentOp, FontMetrics, LopdfBackend, MediaBox, PdfBackend, PdfValue};
pub use grouping::{group_lines_into_blocks, group_spans_into_lines, order_blocks};
pub use source::{ExtractedPages, PageSource};
pub use text::{decode_text_simple, normalize_span_text};

use content::ContentInterpreter;

use crate::config::HeuristicConfig;
use crate::detect::sniff_pdf;
use crate::error::{Error, Result};
use crate::model::PageContent;

/// Extracts page content from a PDF backend.
pub struct PageExtractor<B: PdfBackend = LopdfBackend> {
    backend: B,
    config: HeuristicConfig,
}

impl PageExtractor<LopdfBackend> {
    /// Open a PDF file.
    pub fn open<P: AsRef<Path>>(path: P, config: HeuristicConfig) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data, config)
    }

    /// Open an in-memory PDF.
    pub fn from_bytes(data: &[u8], config: HeuristicConfig) -> Result<Self> {
        let header = sniff_pdf(data)?;
        log::debug!("Opening {} ({} bytes)", header, data.len());
        let backend = LopdfBackend::load_bytes(data)?;
        Ok(Self::new(backend, config))
    }
}

impl<B: PdfBackend> PageExtractor<B> {
    /// Wrap an existing backend.
    pub fn new(backend: B, config: HeuristicConfig) -> Self {
        Self { backend, config }
    }

    pub fn page_count(&self) -> usize {
        self.backend.page_count()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Extract one page.
    ///
    /// Fails with [`Error::Extraction`] when the page's content cannot be read or decoded.
    pub fn extract_page(&self, index: usize) -> Result<PageContent> {
        let media_box = self.backend.media_box(index)?;
        let fonts = self.backend.page_fonts(index)?;
        let raw = self.backend.page_content(index)?;
        let ops = self
            .backend
            .decode_content(&raw)
            .map_err(|e| Error::extraction(index, e.to_string()))?;

        let graphics =
            ContentInterpreter::new(&self.backend, index, media_box, &fonts, &self.config)
                .run(&ops)?;

        let lines = group_spans_into_lines(graphics.spans, &self.config);
        let blocks = group_lines_into_blocks(lines, &self.config);

        let mut page = PageContent::new(index, media_box.width(), media_box.height());
        page.blocks = order_blocks(blocks, graphics.images);
        page.drawings = graphics.drawings;

        log::debug!(
            "Page {}: {} blocks, {} drawings",
            index,
            page.blocks.len(),
            page.drawings.len()
        );
        Ok(page)
    }

    /// Plain text of one page.
    ///
    /// Uses the block structure when the page extracts cleanly and falls back to the backend's
    /// own text extraction otherwise.
    pub fn plain_text(&self, index: usize) -> Result<String> {
        match self.extract_page(index) {
            Ok(page) => Ok(page.text()),
            Err(e) => {
                log::warn!("Page {}: falling back to raw text extraction: {}", index, e);
                self.backend.plain_text(index).map(|t| t.trim().to_string())
            }
        }
    }
}
