//! Document post-processing.
//!
//! Runs on every engine's output before it is saved: generic cleanup first, then the pass for
//! the classified document type.

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::HeuristicConfig;
use crate::docx::{inches_to_twips, BodyElement, Border, Paragraph, Run, WordDocument};
use crate::strategy::DocumentType;

/// Section names that start a resume heading paragraph (lowercase).
const RESUME_SECTIONS: &[&str] = &[
    "summary",
    "profile",
    "experience",
    "education",
    "skills",
    "certifications",
    "languages",
    "arbetslivserfarenhet",
    "utbildning",
    "färdigheter",
];

lazy_static! {
    static ref RE_MULTI_SPACE: Regex = Regex::new(r" {2,}").unwrap();
    static ref RE_FORM_BLANK: Regex = Regex::new(r"[^:]+:\s*_{3,}").unwrap();
    static ref RE_FORM_GAP: Regex = Regex::new(r"[^:]+:(\s{3,}|\t)").unwrap();
    static ref RE_FORM_SPLIT: Regex = Regex::new(r":|\s{3,}|_{3,}").unwrap();
}

/// Apply generic cleanup and the pass for `doc_type`.
pub fn postprocess(doc: &mut WordDocument, doc_type: DocumentType, config: &HeuristicConfig) {
    remove_blank_tables(doc);
    strip_table_borders(doc);
    collapse_empty_paragraphs(doc);

    match doc_type {
        DocumentType::Resume => enhance_resume(doc),
        DocumentType::TableHeavy => optimize_tables(doc, config),
        DocumentType::Form => split_form_fields(doc, config),
        DocumentType::General => {}
    }

    collapse_spaces(doc);
}

/// Drop tables whose cells hold only whitespace.
pub fn remove_blank_tables(doc: &mut WordDocument) {
    for section in &mut doc.sections {
        let before = section.body.len();
        section
            .body
            .retain(|e| !matches!(e, BodyElement::Table(t) if t.is_blank()));
        let removed = before - section.body.len();
        if removed > 0 {
            log::debug!("Removed {} blank tables", removed);
        }
    }
}

/// Set every table and cell border to `nil`.
pub fn strip_table_borders(doc: &mut WordDocument) {
    for section in &mut doc.sections {
        for element in &mut section.body {
            if let BodyElement::Table(table) = element {
                table.borders = Some(Border::nil());
                for cell in table.cells_mut() {
                    cell.borders = Some(Border::nil());
                }
            }
        }
    }
}

/// Keep only the first of consecutive blank paragraphs.
pub fn collapse_empty_paragraphs(doc: &mut WordDocument) {
    for section in &mut doc.sections {
        let mut prev_blank = false;
        section.body.retain(|e| match e {
            BodyElement::Paragraph(p) => {
                let blank = p.is_blank();
                let keep = !(blank && prev_blank);
                prev_blank = blank;
                keep
            }
            BodyElement::Table(_) => {
                prev_blank = false;
                true
            }
        });

        for element in &mut section.body {
            if let BodyElement::Table(table) = element {
                for cell in table.cells_mut() {
                    let mut prev_blank = false;
                    cell.paragraphs.retain(|p| {
                        let blank = p.is_blank();
                        let keep = !(blank && prev_blank);
                        prev_blank = blank;
                        keep
                    });
                }
            }
        }
    }
}

/// Collapse repeated spaces inside text runs. Whitespace-only runs are padding and stay as they are.
pub fn collapse_spaces(doc: &mut WordDocument) {
    for paragraph in paragraphs_mut(doc) {
        for run in &mut paragraph.runs {
            if let Some(text) = run.text_mut() {
                if !text.trim().is_empty() && text.contains("  ") {
                    *text = RE_MULTI_SPACE.replace_all(text, " ").into_owned();
                }
            }
        }
    }
}

/// Paragraphs starting with a resume section name become bold `Heading2`.
fn enhance_resume(doc: &mut WordDocument) {
    for paragraph in top_level_paragraphs_mut(doc) {
        let text = paragraph.text().trim().to_lowercase();
        if !RESUME_SECTIONS.iter().any(|s| text.starts_with(s)) {
            continue;
        }
        paragraph.props.style = Some("Heading2".to_string());
        paragraph.props.spacing.before = Some(12.0);
        paragraph.props.spacing.after = Some(6.0);
        for run in &mut paragraph.runs {
            run.props.bold = true;
        }
    }
}

/// Uniform cell margins; a bold first row gets tighter spacing.
fn optimize_tables(doc: &mut WordDocument, config: &HeuristicConfig) {
    for section in &mut doc.sections {
        for element in &mut section.body {
            let BodyElement::Table(table) = element else {
                continue;
            };
            for cell in table.cells_mut() {
                cell.margin = Some(config.table_cell_margin);
            }

            let Some(header) = table.rows.first_mut() else {
                continue;
            };
            let header_like = !header.cells.is_empty()
                && header.cells.iter().all(|c| {
                    c.paragraphs
                        .iter()
                        .flat_map(|p| p.runs.iter())
                        .any(|r| r.props.bold)
                });
            if header_like {
                for paragraph in header.cells.iter_mut().flat_map(|c| c.paragraphs.iter_mut()) {
                    paragraph.props.spacing.after = Some(2.0);
                    for run in &mut paragraph.runs {
                        run.props.bold = true;
                    }
                }
            }
        }
    }
}

/// `label: ___` and `label:   value` paragraphs become a bold label, a tab stop and the value.
fn split_form_fields(doc: &mut WordDocument, config: &HeuristicConfig) {
    let tab_stop = inches_to_twips(config.form_tab_stop_inches);

    for paragraph in top_level_paragraphs_mut(doc) {
        let text = paragraph.text();
        if !(RE_FORM_BLANK.is_match(&text) || RE_FORM_GAP.is_match(&text)) {
            continue;
        }
        let Some(m) = RE_FORM_SPLIT.find(&text) else {
            continue;
        };
        let label = text[..m.start()].trim();
        let value = text[m.end()..].trim();

        paragraph.runs.clear();
        paragraph.add_run(Run::bold(format!("{}: ", label)));
        paragraph.props.tabs.push(tab_stop);
        paragraph.add_run(Run::tab());
        if !value.is_empty() {
            paragraph.add_text(value);
        }
    }
}

fn top_level_paragraphs_mut(doc: &mut WordDocument) -> impl Iterator<Item = &mut Paragraph> + '_ {
    doc.sections.iter_mut().flat_map(|s| {
        s.body.iter_mut().filter_map(|e| match e {
            BodyElement::Paragraph(p) => Some(p),
            BodyElement::Table(_) => None,
        })
    })
}

fn paragraphs_mut(doc: &mut WordDocument) -> Vec<&mut Paragraph> {
    let mut out = Vec::new();
    for section in &mut doc.sections {
        for element in &mut section.body {
            match element {
                BodyElement::Paragraph(p) => out.push(p),
                BodyElement::Table(t) => {
                    out.extend(t.cells_mut().flat_map(|c| c.paragraphs.iter_mut()))
                }
            }
        }
    }
    out
}
