//! Document classification: type and complexity from the first sampled pages.

use serde::Serialize;

use crate::config::HeuristicConfig;
use crate::layout::patterns::{has_email, has_phone};
use crate::layout::{detect_by_histogram, DetectionResult};
use crate::model::{PageContent, Rect};

/// Keywords counted toward the resume score, matched in lowercase page text.
const RESUME_TERMS: &[&str] = &[
    "resume",
    "cv",
    "curriculum vitae",
    "professional experience",
    "skills",
    "education",
    "work history",
    "profile",
    "objective",
    "summary",
    "utbildning",
    "arbetslivserfarenhet",
];

/// Kind of document, selecting the engine and the post-processing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    #[default]
    General,
    Resume,
    TableHeavy,
    Form,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::General => "general",
            DocumentType::Resume => "resume",
            DocumentType::TableHeavy => "table_heavy",
            DocumentType::Form => "form",
        }
    }
}

/// How hard the document is to reconstruct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    #[default]
    Simple,
    Moderate,
    Complex,
}

/// Classification result with the raw scores behind it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DocumentProfile {
    pub doc_type: DocumentType,
    pub complexity: Complexity,
    pub resume_score: u32,
    pub table_score: u32,
    pub form_score: u32,
    pub complexity_score: u32,
    pub page_count: usize,
}

/// Classify a document from its first `config.sample_pages` pages.
///
/// `page_count` is the total page count of the document; long documents are always complex.
pub fn classify(pages: &[PageContent], page_count: usize, config: &HeuristicConfig) -> DocumentProfile {
    let mut profile = DocumentProfile {
        page_count,
        ..Default::default()
    };

    for page in pages.iter().take(config.sample_pages) {
        let text = page.text();
        let lower = text.to_lowercase();

        profile.resume_score += RESUME_TERMS.iter().filter(|t| lower.contains(*t)).count() as u32;
        if has_email(&text) {
            profile.resume_score += 2;
        }
        if has_phone(&text) {
            profile.resume_score += 1;
        }

        let rects = page.rect_count();
        if rects > config.rect_density_threshold {
            profile.table_score += (rects / 5) as u32;
            profile.form_score += (rects / 10) as u32;
        }

        if page.blocks.len() > config.dense_block_threshold {
            profile.complexity_score += (page.blocks.len() / 10) as u32;
        }

        let bboxes: Vec<Rect> = page.text_blocks().map(|b| b.bbox).collect();
        if let DetectionResult::Detected(columns) = detect_by_histogram(&bboxes, page.width, config)
        {
            if columns.len() > 1 {
                profile.complexity_score += 2 * columns.len() as u32;
            }
        }
    }

    profile.doc_type = if profile.resume_score >= config.resume_score_threshold {
        DocumentType::Resume
    } else if profile.table_score >= config.table_score_threshold {
        DocumentType::TableHeavy
    } else if profile.form_score >= config.form_score_threshold {
        DocumentType::Form
    } else {
        DocumentType::General
    };

    profile.complexity = if profile.complexity_score >= config.complex_score_threshold
        || page_count > config.complex_page_count
    {
        Complexity::Complex
    } else if profile.complexity_score >= config.moderate_score_threshold {
        Complexity::Moderate
    } else {
        Complexity::Simple
    };

    log::debug!(
        "Classified as {} ({:?}): resume={} table={} form={} complexity={}",
        profile.doc_type.as_str(),
        profile.complexity,
        profile.resume_score,
        profile.table_score,
        profile.form_score,
        profile.complexity_score
    );
    profile
}
