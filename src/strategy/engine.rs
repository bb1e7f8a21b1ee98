//! Conversion engines and their registry.
//!
//! An engine turns pages from a [`PageSource`] into a [`WordDocument`], loading each page when
//! it reaches it. The registry holds the standard
//! engine, an optional race challenger and engines specialized for a [`DocumentType`].

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use super::classify::DocumentType;
use super::tables::{LineId, TableDetector, TextUnit};
use crate::config::HeuristicConfig;
use crate::convert::{Diagnostic, DiagnosticKind};
use crate::docx::{StyleSheet, Table, WordDocument};
use crate::emit::DocumentEmitter;
use crate::error::Result;
use crate::extract::PageSource;
use crate::layout::{combine_layouts, DocumentLayout, PageAnalysis, PageLayout};
use crate::model::{PageBlock, PageContent, TextBlock};

/// Shared inputs of an engine run.
pub struct EngineContext<'a> {
    pub config: &'a HeuristicConfig,
    pub analyzer: &'a dyn PageAnalysis,
    /// Scoped directory for staged images
    pub temp_dir: &'a Path,
}

/// Result of an engine run.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub document: WordDocument,
    pub layout: DocumentLayout,
    pub diagnostics: Vec<Diagnostic>,
}

/// A way of building a document from extracted pages.
pub trait ConversionEngine: Send + Sync {
    /// Stable engine name, used in logs and reports.
    fn name(&self) -> &str;

    /// Build the document.
    fn convert(&self, pages: &dyn PageSource, ctx: &EngineContext) -> Result<EngineOutput>;
}

/// Per-page layouts and the document layout derived from them.
#[derive(Debug, Clone, Default)]
pub struct AnalyzedPages {
    /// `None` where the analyzer failed for the page
    pub layouts: Vec<Option<PageLayout>>,
    pub document: DocumentLayout,
    pub diagnostics: Vec<Diagnostic>,
}

/// Analyze every page, loading one page at a time. The document layout is combined from the
/// first `sample_pages` pages that analyzed successfully.
pub fn analyze_pages(
    pages: &dyn PageSource,
    analyzer: &dyn PageAnalysis,
    config: &HeuristicConfig,
) -> AnalyzedPages {
    let mut diagnostics = Vec::new();
    let layouts: Vec<Option<PageLayout>> = (0..pages.page_count())
        .map(|index| match analyzer.analyze_page(&pages.page(index)) {
            Ok(layout) => Some(layout),
            Err(e) => {
                log::warn!("Page {}: analysis failed: {}", index + 1, e);
                diagnostics.push(Diagnostic::page(
                    index,
                    DiagnosticKind::Analysis,
                    e.to_string(),
                ));
                None
            }
        })
        .collect();

    let sampled: Vec<PageLayout> = layouts
        .iter()
        .flatten()
        .take(config.sample_pages)
        .cloned()
        .collect();
    let document = combine_layouts(&sampled, config);

    AnalyzedPages {
        layouts,
        document,
        diagnostics,
    }
}

/// The standard pipeline: column grid for multi-column pages, a single flow otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutEngine;

impl ConversionEngine for LayoutEngine {
    fn name(&self) -> &str {
        "layout"
    }

    fn convert(&self, pages: &dyn PageSource, ctx: &EngineContext) -> Result<EngineOutput> {
        let analyzed = analyze_pages(pages, ctx.analyzer, ctx.config);
        let mut document = WordDocument::new(StyleSheet::from_layout(&analyzed.document));
        let emitter = DocumentEmitter::new(ctx.config, ctx.temp_dir);
        let mut diagnostics = analyzed.diagnostics;

        for (index, layout) in analyzed.layouts.iter().enumerate() {
            let page = pages.page(index);
            match layout {
                Some(layout) => emitter.emit_page(
                    &mut document,
                    &page,
                    layout,
                    &analyzed.document,
                    &mut diagnostics,
                ),
                None => emitter.emit_degraded_page(&mut document, &page),
            }
        }

        Ok(EngineOutput {
            document,
            layout: analyzed.document,
            diagnostics,
        })
    }
}

/// Single-flow emission with tables found from text alignment.
///
/// Columns are ignored; lines that belong to a detected table are emitted as a real table at the
/// table's position and removed from the text flow.
#[derive(Debug, Clone, Default)]
pub struct TableFlowEngine {
    detector: TableDetector,
}

impl TableFlowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detector(detector: TableDetector) -> Self {
        Self { detector }
    }

    /// Detect tables and return the page without their lines.
    fn split_tables(&self, page: &PageContent) -> (PageContent, Vec<(f32, Table)>) {
        let (detected, _) = self.detector.detect(TextUnit::from_page(page));
        if detected.is_empty() {
            return (page.clone(), Vec::new());
        }

        let consumed: HashSet<LineId> = detected.iter().flat_map(|t| t.line_ids()).collect();
        let tables = detected
            .iter()
            .map(|t| (t.top, self.detector.to_table(t)))
            .collect();
        log::debug!(
            "Page {}: {} tables, {} lines consumed",
            page.index + 1,
            detected.len(),
            consumed.len()
        );

        let blocks = page
            .blocks
            .iter()
            .enumerate()
            .filter_map(|(bi, block)| match block {
                PageBlock::Text(text) => {
                    let remaining: Vec<_> = text
                        .lines
                        .iter()
                        .enumerate()
                        .filter(|(li, _)| !consumed.contains(&(bi, *li)))
                        .map(|(_, line)| line.clone())
                        .collect();
                    if remaining.is_empty() {
                        None
                    } else if remaining.len() == text.lines.len() {
                        Some(block.clone())
                    } else {
                        Some(PageBlock::Text(TextBlock::new(remaining)))
                    }
                }
                PageBlock::Image(_) => Some(block.clone()),
            })
            .collect();

        let rest = PageContent {
            blocks,
            ..page.clone()
        };
        (rest, tables)
    }
}

impl ConversionEngine for TableFlowEngine {
    fn name(&self) -> &str {
        "table-flow"
    }

    fn convert(&self, pages: &dyn PageSource, ctx: &EngineContext) -> Result<EngineOutput> {
        let analyzed = analyze_pages(pages, ctx.analyzer, ctx.config);
        let mut document = WordDocument::new(StyleSheet::from_layout(&analyzed.document));
        let emitter = DocumentEmitter::new(ctx.config, ctx.temp_dir);
        let mut diagnostics = analyzed.diagnostics;

        for (index, layout) in analyzed.layouts.iter().enumerate() {
            let page = pages.page(index);
            let Some(layout) = layout else {
                emitter.emit_degraded_page(&mut document, &page);
                continue;
            };
            let (rest, tables) = self.split_tables(&page);
            emitter.emit_flow_page(
                &mut document,
                &rest,
                layout,
                &analyzed.document,
                tables,
                &mut diagnostics,
            );
        }

        Ok(EngineOutput {
            document,
            layout: analyzed.document,
            diagnostics,
        })
    }
}

/// Registry of conversion engines.
pub struct EngineRegistry {
    standard: Arc<dyn ConversionEngine>,
    challenger: Option<Arc<dyn ConversionEngine>>,
    specialized: HashMap<DocumentType, Arc<dyn ConversionEngine>>,
}

impl EngineRegistry {
    /// A registry with only a standard engine.
    pub fn new(standard: Arc<dyn ConversionEngine>) -> Self {
        Self {
            standard,
            challenger: None,
            specialized: HashMap::new(),
        }
    }

    /// `layout` as the standard engine, `table-flow` as challenger and for table-heavy documents.
    pub fn with_defaults() -> Self {
        let table_flow: Arc<dyn ConversionEngine> = Arc::new(TableFlowEngine::new());
        let mut registry = Self::new(Arc::new(LayoutEngine));
        registry.set_challenger(table_flow.clone());
        registry.register(DocumentType::TableHeavy, table_flow);
        registry
    }

    /// Register the engine used for every document of `doc_type`.
    pub fn register(&mut self, doc_type: DocumentType, engine: Arc<dyn ConversionEngine>) {
        self.specialized.insert(doc_type, engine);
    }

    /// Set the engine raced against the standard one on complex documents.
    pub fn set_challenger(&mut self, engine: Arc<dyn ConversionEngine>) {
        self.challenger = Some(engine);
    }

    pub fn set_standard(&mut self, engine: Arc<dyn ConversionEngine>) {
        self.standard = engine;
    }

    pub fn standard(&self) -> &Arc<dyn ConversionEngine> {
        &self.standard
    }

    pub fn challenger(&self) -> Option<&Arc<dyn ConversionEngine>> {
        self.challenger.as_ref()
    }

    pub fn specialized(&self, doc_type: DocumentType) -> Option<&Arc<dyn ConversionEngine>> {
        self.specialized.get(&doc_type)
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
