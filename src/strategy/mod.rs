//! Conversion strategy selection.
//!
//! The first pages are classified into a [`DocumentProfile`]; the profile picks a [`Plan`]:
//! an engine specialized for the document type, a race between the standard engine and the
//! challenger for complex documents, or the standard engine alone. Every candidate is
//! post-processed before it is scored or saved.

mod classify;
mod engine;
mod score;
mod tables;

pub use classify::{classify, Complexity, DocumentProfile, DocumentType};
pub use engine::{
    analyze_pages, AnalyzedPages, ConversionEngine, EngineContext, EngineOutput, EngineRegistry,
    LayoutEngine, TableFlowEngine,
};
pub use score::{pick_winner, score_document, Candidate};
pub use tables::{
    DetectedTable, LineId, TableDetector, TableDetectorConfig, TableRowData, TextUnit,
};

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::convert::{Diagnostic, DiagnosticKind};
use crate::docx::{to_bytes, write_docx, WordDocument};
use crate::error::{Error, Result};
use crate::extract::PageSource;
use crate::layout::DocumentLayout;
use crate::postprocess::postprocess;

/// How a document is converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "engine", rename_all = "snake_case")]
pub enum Plan {
    /// The engine registered for the document type
    Specialized(String),
    /// Standard engine against the challenger, best score wins
    Race,
    /// The standard engine alone
    Standard,
}

/// Choose the plan for a classified document.
pub fn plan(profile: &DocumentProfile, registry: &EngineRegistry, race_enabled: bool) -> Plan {
    if let Some(engine) = registry.specialized(profile.doc_type) {
        return Plan::Specialized(engine.name().to_string());
    }
    if race_enabled
        && profile.complexity == Complexity::Complex
        && registry.challenger().is_some()
    {
        return Plan::Race;
    }
    Plan::Standard
}

/// Score of one engine's candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineScore {
    pub engine: String,
    pub score: u32,
}

/// The selected, post-processed and serialized document.
#[derive(Debug, Clone)]
pub struct Selection {
    pub engine: String,
    /// `.docx` package bytes
    pub bytes: Vec<u8>,
    pub layout: DocumentLayout,
    pub diagnostics: Vec<Diagnostic>,
    /// Scores of every candidate that was produced
    pub scores: Vec<EngineScore>,
}

/// Run the plan, falling back to the standard engine when a specialized engine fails.
pub fn execute(
    plan: &Plan,
    registry: &EngineRegistry,
    pages: &dyn PageSource,
    ctx: &EngineContext,
    doc_type: DocumentType,
) -> Result<Selection> {
    match plan {
        Plan::Specialized(_) => {
            let Some(engine) = registry.specialized(doc_type) else {
                return run_engine(registry.standard().as_ref(), pages, ctx, doc_type);
            };
            match run_engine(engine.as_ref(), pages, ctx, doc_type) {
                Ok(selection) => Ok(selection),
                Err(e) => {
                    log::warn!(
                        "Engine {} failed: {}; falling back to {}",
                        engine.name(),
                        e,
                        registry.standard().name()
                    );
                    let mut selection =
                        run_engine(registry.standard().as_ref(), pages, ctx, doc_type)?;
                    selection.diagnostics.push(Diagnostic::document(
                        DiagnosticKind::Engine,
                        format!("{}: {}", engine.name(), e),
                    ));
                    Ok(selection)
                }
            }
        }
        Plan::Race => {
            let mut engines = vec![registry.standard().clone()];
            engines.extend(registry.challenger().cloned());
            run_race(&engines, pages, ctx, doc_type)
        }
        Plan::Standard => run_engine(registry.standard().as_ref(), pages, ctx, doc_type),
    }
}

/// Convert with a single engine.
pub fn run_engine(
    engine: &dyn ConversionEngine,
    pages: &dyn PageSource,
    ctx: &EngineContext,
    doc_type: DocumentType,
) -> Result<Selection> {
    let mut output = engine
        .convert(pages, ctx)
        .map_err(|e| Error::ConversionFailed(format!("{}: {}", engine.name(), e)))?;
    postprocess(&mut output.document, doc_type, ctx.config);

    let score = score_document(&output.document);
    log::info!("Engine {} produced a document (score {})", engine.name(), score);

    Ok(Selection {
        engine: engine.name().to_string(),
        bytes: to_bytes(&output.document)?,
        layout: output.layout,
        diagnostics: output.diagnostics,
        scores: vec![EngineScore {
            engine: engine.name().to_string(),
            score,
        }],
    })
}

/// Run every engine, save each candidate under `ctx.temp_dir` and keep the best.
///
/// Engines are in priority order; a later engine wins only with a strictly higher score. Fails
/// with [`Error::ConversionFailed`] when no engine produced a candidate.
pub fn run_race(
    engines: &[Arc<dyn ConversionEngine>],
    pages: &dyn PageSource,
    ctx: &EngineContext,
    doc_type: DocumentType,
) -> Result<Selection> {
    let mut candidates = Vec::new();
    let mut outputs = Vec::new();
    let mut failures = Vec::new();

    for (i, engine) in engines.iter().enumerate() {
        let mut output = match engine.convert(pages, ctx) {
            Ok(output) => output,
            Err(e) => {
                log::warn!("Engine {} failed: {}", engine.name(), e);
                failures.push(Diagnostic::document(
                    DiagnosticKind::Engine,
                    format!("{}: {}", engine.name(), e),
                ));
                continue;
            }
        };
        postprocess(&mut output.document, doc_type, ctx.config);

        let path = ctx
            .temp_dir
            .join(format!("candidate-{}-{}.docx", i, engine.name()));
        if let Err(e) = save_candidate(&output.document, &path) {
            log::warn!("Engine {}: candidate not saved: {}", engine.name(), e);
            failures.push(Diagnostic::document(
                DiagnosticKind::Engine,
                format!("{}: {}", engine.name(), e),
            ));
            continue;
        }

        let score = score_document(&output.document);
        log::info!("Engine {} scored {}", engine.name(), score);
        candidates.push(Candidate {
            engine: engine.name().to_string(),
            path,
            score,
        });
        outputs.push(output);
    }

    let Some(winner) = pick_winner(&candidates) else {
        return Err(Error::ConversionFailed(format!(
            "all {} engines failed",
            engines.len()
        )));
    };
    let bytes = std::fs::read(&candidates[winner].path)?;
    for candidate in &candidates {
        if let Err(e) = std::fs::remove_file(&candidate.path) {
            log::debug!("Could not remove {}: {}", candidate.path.display(), e);
        }
    }
    log::info!(
        "Engine {} won with score {}",
        candidates[winner].engine,
        candidates[winner].score
    );

    let output = outputs.swap_remove(winner);
    let mut diagnostics = output.diagnostics;
    diagnostics.extend(failures);

    Ok(Selection {
        engine: candidates[winner].engine.clone(),
        bytes,
        layout: output.layout,
        diagnostics,
        scores: candidates
            .into_iter()
            .map(|c| EngineScore {
                engine: c.engine,
                score: c.score,
            })
            .collect(),
    })
}

fn save_candidate(doc: &WordDocument, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let writer = write_docx(doc, BufWriter::new(file))?;
    writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))?
        .sync_all()?;
    Ok(())
}
