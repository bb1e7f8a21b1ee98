//! Conversion orchestration.
//!
//! [`Converter`] runs the whole pipeline for one document: sniff the input, classify the first
//! pages, pick and run a conversion plan, record the layout in the pattern store (when one is
//! configured) and write the result atomically. Page, block and engine failures degrade locally
//! and are returned as [`Diagnostic`]s in the [`ConversionReport`].
//!
//! # Example
//!
//! ```no_run
//! use pdfdocx::{ConvertOptions, Converter, TargetFormat};
//!
//! fn main() -> pdfdocx::Result<()> {
//!     let converter = Converter::new()
//!         .with_options(ConvertOptions::new().with_target(TargetFormat::Docx));
//!
//!     let report = converter.convert_file("resume.pdf", "resume.docx")?;
//!     println!("{} pages via {:?}", report.page_count, report.engine);
//!     for diagnostic in &report.diagnostics {
//!         eprintln!("{}", diagnostic);
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::config::ConvertOptions;
use crate::detect::TargetFormat;
use crate::error::Result;
use crate::extract::{ExtractedPages, PageExtractor};
use crate::layout::{
    record_layout, DocumentLayout, LayoutAnalyzer, PageAnalysis, PageLayout, PatternMatch,
    PatternStore,
};
use crate::strategy::{
    self, analyze_pages, classify, ConversionEngine, DocumentProfile, DocumentType, EngineContext,
    EngineRegistry, EngineScore, Plan,
};

/// Pipeline stage a diagnostic comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Extraction,
    Analysis,
    Emission,
    Image,
    PatternStore,
    Engine,
}

/// A non-fatal problem recorded during a conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// Zero-based page index, if the problem is tied to a page
    pub page: Option<usize>,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn page(index: usize, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            page: Some(index),
            kind,
            message: message.into(),
        }
    }

    pub fn document(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            page: None,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page {
            Some(page) => write!(f, "page {}: {:?}: {}", page + 1, self.kind, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

/// Outcome of a successful conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub output: PathBuf,
    pub target: TargetFormat,
    pub page_count: usize,
    /// Classification, for `docx` targets
    pub profile: Option<DocumentProfile>,
    pub plan: Option<Plan>,
    /// Engine whose document was written
    pub engine: Option<String>,
    pub scores: Vec<EngineScore>,
    pub layout: Option<DocumentLayout>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ConversionReport {
    /// Whether anything degraded along the way.
    pub fn is_degraded(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Layout analysis of a document without conversion.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentAnalysis {
    pub page_count: usize,
    pub profile: DocumentProfile,
    pub document: DocumentLayout,
    /// `None` where the page could not be analyzed
    pub pages: Vec<Option<PageLayout>>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Configurable PDF converter.
pub struct Converter {
    options: ConvertOptions,
    analyzer: Option<Arc<dyn PageAnalysis>>,
    registry: EngineRegistry,
    pattern_store: Option<Arc<dyn PatternStore>>,
}

impl Converter {
    /// Converter with default options, the heuristic analyzer and the default engines.
    pub fn new() -> Self {
        Self {
            options: ConvertOptions::default(),
            analyzer: None,
            registry: EngineRegistry::with_defaults(),
            pattern_store: None,
        }
    }

    pub fn with_options(mut self, options: ConvertOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the page analyzer.
    pub fn with_analyzer(mut self, analyzer: Arc<dyn PageAnalysis>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Use `engine` for every document classified as `doc_type`.
    pub fn with_engine(mut self, doc_type: DocumentType, engine: Arc<dyn ConversionEngine>) -> Self {
        self.registry.register(doc_type, engine);
        self
    }

    /// Replace the engine raced against the standard one.
    pub fn with_challenger(mut self, engine: Arc<dyn ConversionEngine>) -> Self {
        self.registry.set_challenger(engine);
        self
    }

    /// Record every converted layout in `store`.
    pub fn with_pattern_store(mut self, store: Arc<dyn PatternStore>) -> Self {
        self.pattern_store = Some(store);
        self
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut EngineRegistry {
        &mut self.registry
    }

    /// Convert `input` and write the result to `output`.
    ///
    /// Nothing is written to `output` unless the conversion succeeds.
    pub fn convert_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<ConversionReport> {
        let (input, output) = (input.as_ref(), output.as_ref());
        log::info!(
            "Converting {} to {} ({})",
            input.display(),
            output.display(),
            self.options.target
        );

        let extractor = PageExtractor::open(input, self.options.heuristics.clone())?;
        let page_count = extractor.page_count();

        match self.options.target {
            TargetFormat::Txt => self.convert_to_text(&extractor, output),
            TargetFormat::Docx => self.convert_to_docx(&extractor, page_count, output),
        }
    }

    /// Analyze `input` without converting it.
    pub fn analyze_file(&self, input: impl AsRef<Path>) -> Result<DocumentAnalysis> {
        let config = &self.options.heuristics;
        let extractor = PageExtractor::open(input, config.clone())?;
        let page_count = extractor.page_count();

        let pages = ExtractedPages::new(&extractor);
        let profile = classify(&pages.sample(config.sample_pages), page_count, config);

        let analyzer = self.analyzer();
        let analyzed = analyze_pages(&pages, analyzer.as_ref(), config);
        let mut diagnostics = pages.diagnostics();
        diagnostics.extend(analyzed.diagnostics);

        Ok(DocumentAnalysis {
            page_count,
            profile,
            document: analyzed.document,
            pages: analyzed.layouts,
            diagnostics,
        })
    }

    fn convert_to_docx(
        &self,
        extractor: &PageExtractor,
        page_count: usize,
        output: &Path,
    ) -> Result<ConversionReport> {
        let config = &self.options.heuristics;
        let pages = ExtractedPages::new(extractor);

        let profile = classify(&pages.sample(config.sample_pages), page_count, config);
        let plan = strategy::plan(&profile, &self.registry, !self.options.disable_race);
        log::info!(
            "Document is {} ({:?}), plan {:?}",
            profile.doc_type.as_str(),
            profile.complexity,
            plan
        );

        let scratch = self.scratch_dir()?;
        let analyzer = self.analyzer();
        let ctx = EngineContext {
            config,
            analyzer: analyzer.as_ref(),
            temp_dir: scratch.path(),
        };
        let selection = strategy::execute(&plan, &self.registry, &pages, &ctx, profile.doc_type)?;
        let mut diagnostics = pages.diagnostics();
        diagnostics.extend(selection.diagnostics);

        if let Some(store) = &self.pattern_store {
            match record_layout(
                store.as_ref(),
                &selection.layout,
                config.pattern_similarity_threshold,
            ) {
                Ok(PatternMatch::Reinforced { index, similarity }) => {
                    log::debug!("Layout matches pattern {} ({:.2})", index, similarity)
                }
                Ok(PatternMatch::Added { index }) => log::debug!("New layout pattern {}", index),
                Err(e) => {
                    log::warn!("Pattern store not updated: {}", e);
                    diagnostics.push(Diagnostic::document(
                        DiagnosticKind::PatternStore,
                        e.to_string(),
                    ));
                }
            }
        }

        write_atomic(output, &selection.bytes)?;
        if let Err(e) = scratch.close() {
            log::debug!("Could not remove scratch directory: {}", e);
        }

        Ok(ConversionReport {
            output: output.to_path_buf(),
            target: TargetFormat::Docx,
            page_count,
            profile: Some(profile),
            plan: Some(plan),
            engine: Some(selection.engine),
            scores: selection.scores,
            layout: Some(selection.layout),
            diagnostics,
        })
    }

    /// Page texts joined by a blank line.
    fn convert_to_text(&self, extractor: &PageExtractor, output: &Path) -> Result<ConversionReport> {
        let mut diagnostics = Vec::new();
        let texts: Vec<String> = (0..extractor.page_count())
            .map(|i| {
                extractor.plain_text(i).unwrap_or_else(|e| {
                    log::warn!("Page {}: no text: {}", i + 1, e);
                    diagnostics.push(Diagnostic::page(i, DiagnosticKind::Extraction, e.to_string()));
                    String::new()
                })
            })
            .collect();

        write_atomic(output, texts.join("\n\n").as_bytes())?;

        Ok(ConversionReport {
            output: output.to_path_buf(),
            target: TargetFormat::Txt,
            page_count: texts.len(),
            profile: None,
            plan: None,
            engine: None,
            scores: Vec::new(),
            layout: None,
            diagnostics,
        })
    }

    fn analyzer(&self) -> Arc<dyn PageAnalysis> {
        match &self.analyzer {
            Some(analyzer) => analyzer.clone(),
            None => Arc::new(LayoutAnalyzer::new(self.options.heuristics.clone())),
        }
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pdfdocx-");
        Ok(match &self.options.temp_dir {
            Some(dir) => builder.tempdir_in(dir)?,
            None => builder.tempdir()?,
        })
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}

/// Write `bytes` to a temporary file next to `path`, then move it into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    staged.persist(path)?;
    Ok(())
}

/// Convert `input` to `output` with default settings.
///
/// Returns `true` when the output was written. Failures are logged.
pub fn convert(input: impl AsRef<Path>, output: impl AsRef<Path>, target: TargetFormat) -> bool {
    let converter = Converter::new().with_options(ConvertOptions::new().with_target(target));
    match converter.convert_file(input.as_ref(), output.as_ref()) {
        Ok(report) => {
            for diagnostic in &report.diagnostics {
                log::warn!("{}", diagnostic);
            }
            true
        }
        Err(e) => {
            log::error!("Conversion of {} failed: {}", input.as_ref().display(), e);
            false
        }
    }
}
