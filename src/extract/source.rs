//! Page-at-a-time access for the conversion engines.

use std::cell::RefCell;
use std::collections::BTreeMap;

use super::backend::{MediaBox, PdfBackend};
use super::PageExtractor;
use crate::convert::{Diagnostic, DiagnosticKind};
use crate::model::PageContent;

/// Pages handed out one at a time.
///
/// Engines load a page when they reach it and drop it once it is emitted, so a run only holds
/// the page being worked on.
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Load page `index`. A page that cannot be read comes back empty, sized from its MediaBox.
    fn page(&self, index: usize) -> PageContent;
}

impl PageSource for Vec<PageContent> {
    fn page_count(&self) -> usize {
        self.len()
    }

    fn page(&self, index: usize) -> PageContent {
        self.get(index).cloned().unwrap_or_else(|| {
            PageContent::new(index, MediaBox::LETTER.width(), MediaBox::LETTER.height())
        })
    }
}

/// Re-extracts pages from a [`PageExtractor`] on every request.
///
/// Extraction failures are remembered once per page and reported by [`diagnostics`].
///
/// [`diagnostics`]: ExtractedPages::diagnostics
pub struct ExtractedPages<'a, B: PdfBackend> {
    extractor: &'a PageExtractor<B>,
    failures: RefCell<BTreeMap<usize, String>>,
}

impl<'a, B: PdfBackend> ExtractedPages<'a, B> {
    pub fn new(extractor: &'a PageExtractor<B>) -> Self {
        Self {
            extractor,
            failures: RefCell::new(BTreeMap::new()),
        }
    }

    /// The first `count` pages, for classification.
    pub fn sample(&self, count: usize) -> Vec<PageContent> {
        (0..count.min(self.page_count())).map(|i| self.page(i)).collect()
    }

    /// One extraction diagnostic per failed page, in page order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.failures
            .borrow()
            .iter()
            .map(|(index, message)| {
                Diagnostic::page(*index, DiagnosticKind::Extraction, message.clone())
            })
            .collect()
    }
}

impl<B: PdfBackend> PageSource for ExtractedPages<'_, B> {
    fn page_count(&self) -> usize {
        self.extractor.page_count()
    }

    fn page(&self, index: usize) -> PageContent {
        match self.extractor.extract_page(index) {
            Ok(page) => page,
            Err(e) => {
                let mut failures = self.failures.borrow_mut();
                if !failures.contains_key(&index) {
                    log::warn!("Page {}: extraction failed: {}", index + 1, e);
                    failures.insert(index, e.to_string());
                }
                let media_box = self
                    .extractor
                    .backend()
                    .media_box(index)
                    .unwrap_or(MediaBox::LETTER);
                PageContent::new(index, media_box.width(), media_box.height())
            }
        }
    }
}
