//! Quality rubric for comparing candidate conversions.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::docx::{BodyElement, Paragraph, WordDocument};

/// Score a candidate document.
///
/// Text, headings and mixed formatting are counted on top-level paragraphs only, so content
/// locked in layout tables earns nothing there; tables are scored on their own.
pub fn score_document(doc: &WordDocument) -> u32 {
    let paragraphs: Vec<&Paragraph> = doc
        .sections
        .iter()
        .flat_map(|s| s.body.iter())
        .filter_map(|e| match e {
            BodyElement::Paragraph(p) => Some(p),
            BodyElement::Table(_) => None,
        })
        .collect();

    let mut score = 0;

    let text_length: usize = paragraphs.iter().map(|p| p.text().chars().count()).sum();
    score += match text_length {
        n if n > 1000 => 10,
        n if n > 500 => 5,
        n if n > 100 => 2,
        _ => 0,
    };

    let headings = paragraphs.iter().filter(|p| p.is_heading()).count() as u32;
    score += (headings * 2).min(10);

    for table in doc.tables() {
        if !table.is_blank() {
            score += 2;
            if table.row_count() > 5 && table.column_count() > 3 {
                score += 3;
            }
        }
    }

    score += (doc.image_count() as u32 * 2).min(10);

    let mixed = paragraphs
        .iter()
        .filter(|p| {
            p.runs
                .iter()
                .map(|r| r.props.format_key())
                .collect::<HashSet<_>>()
                .len()
                > 1
        })
        .count() as u32;
    score += mixed.min(10);

    score
}

/// A written candidate of the multi-engine race.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub engine: String,
    pub path: PathBuf,
    pub score: u32,
}

/// Index of the winning candidate.
///
/// Candidates are in priority order (the standard engine first); a later candidate wins only
/// with a strictly higher score.
pub fn pick_winner(candidates: &[Candidate]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, candidate) in candidates.iter().enumerate() {
        if best.map_or(true, |b| candidate.score > candidates[b].score) {
            best = Some(i);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::{Run, Section, Table, TableCell, TableRow};

    fn doc_with(body: Vec<BodyElement>) -> WordDocument {
        let mut doc = WordDocument::default();
        let mut section = Section::for_page(612.0, 792.0, 0.5);
        section.body = body;
        doc.add_section(section);
        doc
    }

    #[test]
    fn test_text_and_headings() {
        let mut body = vec![
            BodyElement::Paragraph(Paragraph::with_text("x".repeat(600))),
            BodyElement::Paragraph(Paragraph::with_text("Title").styled("Heading1")),
        ];
        for _ in 0..6 {
            body.push(BodyElement::Paragraph(
                Paragraph::with_text("Section").styled("Heading2"),
            ));
        }
        // 5 (text) + min(10, 14)
        assert_eq!(score_document(&doc_with(body)), 15);
    }

    #[test]
    fn test_tables_and_formatting() {
        let big = Table::new(
            (0..6)
                .map(|r| TableRow::new((0..4).map(|c| TableCell::with_text(format!("{}{}", r, c))).collect()))
                .collect(),
        );
        let blank = Table::new(vec![TableRow::new(vec![TableCell::with_text("  ")])]);

        let mut mixed = Paragraph::new();
        mixed.add_run(Run::bold("Label"));
        mixed.add_run(Run::text(" value"));

        let doc = doc_with(vec![
            BodyElement::Table(big),
            BodyElement::Table(blank),
            BodyElement::Paragraph(mixed),
        ]);
        // 2 + 3 for the big table, 1 mixed paragraph
        assert_eq!(score_document(&doc), 6);
    }

    #[test]
    fn test_pick_winner() {
        let candidate = |engine: &str, score| Candidate {
            engine: engine.to_string(),
            path: PathBuf::from(format!("{}.docx", engine)),
            score,
        };

        let candidates = vec![candidate("layout", 7), candidate("table-flow", 12)];
        assert_eq!(pick_winner(&candidates), Some(1));

        let candidates = vec![candidate("layout", 12), candidate("table-flow", 7)];
        assert_eq!(pick_winner(&candidates), Some(0));

        let tie = vec![candidate("layout", 9), candidate("table-flow", 9)];
        assert_eq!(pick_winner(&tie), Some(0));
        assert_eq!(pick_winner(&[]), None);
    }
}
