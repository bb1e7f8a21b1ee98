//! # pdfdocx
//!
//! PDF to DOCX structural reconstruction for Rust.
//!
//! This library infers the logical layout of a vector PDF (columns, headings, lists, skill
//! ratings, images and tables) from positioned glyphs and drawing primitives, and re-emits it as
//! an editable Office Open XML word-processing document.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfdocx::TargetFormat;
//!
//! if pdfdocx::convert("resume.pdf", "resume.docx", TargetFormat::Docx) {
//!     println!("done");
//! }
//! ```
//!
//! For diagnostics, custom heuristics or extra engines use [`Converter`]:
//!
//! ```no_run
//! use pdfdocx::{ConvertOptions, Converter, HeuristicConfig};
//!
//! fn main() -> pdfdocx::Result<()> {
//!     let heuristics = HeuristicConfig {
//!         sample_pages: 5,
//!         ..HeuristicConfig::default()
//!     };
//!     let report = Converter::new()
//!         .with_options(ConvertOptions::new().with_heuristics(heuristics))
//!         .convert_file("report.pdf", "report.docx")?;
//!     println!("{:?} won, {} diagnostics", report.engine, report.diagnostics.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Pipeline
//!
//! - **Extraction** ([`extract`]): spans, lines, blocks, images and drawings per page
//! - **Analysis** ([`layout`]): body size, columns, headers, bullets, ratings, resume signal
//! - **Emission** ([`emit`]): sections, column grids, headings, lists, ratings and images
//! - **Post-processing** ([`postprocess`]): generic cleanup plus a pass per document type
//! - **Strategy** ([`strategy`]): classification, engine selection and the scored race
//!
//! Partial reconstruction is an acceptable outcome: pages, blocks and images that fail degrade
//! locally and are reported as [`Diagnostic`]s.

pub mod config;
pub mod convert;
pub mod detect;
pub mod docx;
pub mod emit;
pub mod error;
pub mod extract;
pub mod layout;
pub mod model;
pub mod postprocess;
pub mod strategy;

// Re-export commonly used types
pub use config::{ConvertOptions, HeuristicConfig};
pub use convert::{
    convert, ConversionReport, Converter, Diagnostic, DiagnosticKind, DocumentAnalysis,
};
pub use detect::{is_pdf_bytes, sniff_pdf, PdfHeader, TargetFormat};
pub use error::{Error, Result};
pub use extract::PageSource;
pub use layout::{
    DocumentLayout, JsonPatternStore, LayoutAnalyzer, MemoryPatternStore, PageAnalysis,
    PageLayout, PatternStore,
};
pub use model::PageContent;
pub use strategy::{
    ConversionEngine, DocumentProfile, DocumentType, EngineRegistry, LayoutEngine,
    TableFlowEngine,
};

use std::path::Path;

/// Extract the plain text of every page, joined by a blank line.
///
/// # Example
///
/// ```no_run
/// let text = pdfdocx::extract_text("document.pdf").unwrap();
/// println!("{}", text);
/// ```
pub fn extract_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let extractor = extract::PageExtractor::open(path, HeuristicConfig::default())?;
    let texts = (0..extractor.page_count())
        .map(|i| extractor.plain_text(i))
        .collect::<Result<Vec<_>>>()?;
    Ok(texts.join("\n\n"))
}

/// Analyze the layout of a PDF file without converting it.
///
/// # Example
///
/// ```no_run
/// let analysis = pdfdocx::analyze_file("document.pdf").unwrap();
/// println!("{:?}", analysis.document.layout_type);
/// ```
pub fn analyze_file<P: AsRef<Path>>(path: P) -> Result<DocumentAnalysis> {
    Converter::new().analyze_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_rejects_non_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, b"<!DOCTYPE html><html></html>").unwrap();

        assert!(matches!(extract_text(&path), Err(Error::UnknownFormat)));
        assert!(matches!(analyze_file(&path), Err(Error::UnknownFormat)));
    }

    #[test]
    fn test_sniff_reexport() {
        assert_eq!(sniff_pdf(b"%PDF-1.7\n%test").unwrap().version, "1.7");
        assert!(!is_pdf_bytes(b"Not a PDF file"));
    }
}
