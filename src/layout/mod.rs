//! Layout analysis.
//!
//! [`LayoutAnalyzer`] infers a [`PageLayout`] from extracted page content: body font size,
//! columns, header candidates, list markers, rating glyphs and the resume signal.
//! [`combine_layouts`] folds sampled page layouts into a [`DocumentLayout`].
//!
//! Leaf detectors return [`DetectionResult`]; the analyzer is the only place that turns a
//! degraded result into a fallback, recording the reason on the page layout.

mod columns;
mod decoration;
mod headers;
pub mod patterns;
mod stats;
mod store;
mod types;

pub use columns::{
    alignment_zones, columns_from_boundaries, detect_by_alignment, detect_by_density,
    detect_by_histogram, detect_columns, select_columns, AlignmentZone,
};
pub use decoration::{decorative_block, has_decorative_header};
pub use headers::{detect_headers, header_candidate, header_level, is_allcaps};
pub use stats::FontStatistics;
pub use store::{
    record_layout, JsonPatternStore, LayoutPattern, MemoryPatternStore, PatternMatch,
    PatternStore,
};
pub use types::{
    ColumnSpec, ColumnStrategy, DetectionResult, DocumentLayout, HeaderCandidate, LayoutType,
    Margins, PageLayout, DEFAULT_BASE_FONT, DEFAULT_BODY_FONT_SIZE,
};

use std::collections::BTreeSet;

use crate::config::HeuristicConfig;
use crate::error::Result;
use crate::model::{PageContent, Rect, TextBlock};

/// Page analysis seam.
///
/// The converter holds its analyzer behind this trait so tests can substitute one that fails or
/// returns a fixed layout.
pub trait PageAnalysis: Send + Sync {
    fn analyze_page(&self, page: &PageContent) -> Result<PageLayout>;
}

/// The standard heuristic analyzer.
#[derive(Debug, Clone, Default)]
pub struct LayoutAnalyzer {
    config: HeuristicConfig,
}

impl LayoutAnalyzer {
    pub fn new(config: HeuristicConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HeuristicConfig {
        &self.config
    }

    /// Analyze one page.
    pub fn analyze(&self, page: &PageContent) -> PageLayout {
        let blocks: Vec<&TextBlock> = page.text_blocks().filter(|b| !b.is_empty()).collect();
        if blocks.is_empty() {
            return PageLayout {
                degraded: vec!["no text blocks".to_string()],
                ..PageLayout::default()
            };
        }

        let mut degraded = Vec::new();

        let font_stats = FontStatistics::from_spans(blocks.iter().flat_map(|b| b.spans()));
        let body_font_size =
            body_size(&font_stats).or_fallback(DEFAULT_BODY_FONT_SIZE, &mut degraded);

        let text = page.text();
        let keywords = patterns::resume_keyword_count(&text);
        let is_resume = keywords >= 2
            || (keywords >= 1 && (patterns::has_email(&text) || patterns::has_phone(&text)));

        let rects: Vec<Rect> = blocks.iter().map(|b| b.bbox).collect();
        let (selection, reasons) = detect_columns(&rects, page.width, page.height, &self.config);
        degraded.extend(reasons);
        let (layout_type, columns, column_strategy) = match selection {
            Some((strategy, columns)) => (LayoutType::MultiColumn, columns, Some(strategy)),
            None => (LayoutType::SingleColumn, Vec::new(), None),
        };

        let headers = detect_headers(blocks.iter().copied(), body_font_size, &self.config);

        let bullet_styles: BTreeSet<char> = blocks
            .iter()
            .flat_map(|b| b.lines.iter())
            .filter_map(|line| patterns::match_list_marker(&line.text()))
            .map(|marker| marker.glyph)
            .collect();

        let has_ratings = blocks
            .iter()
            .any(|b| patterns::has_rating_pattern(&b.text()));

        let layout = PageLayout {
            layout_type,
            columns,
            column_strategy,
            headers,
            bullet_styles,
            has_ratings,
            is_resume,
            margins: margins(&rects),
            body_font_size,
            common_spacing: common_spacing(&rects),
            degraded,
            font_stats,
        };

        log::debug!(
            "Page {}: {:?}, {} columns, {} headers, body {}pt",
            page.index,
            layout.layout_type,
            layout.columns.len(),
            layout.headers.len(),
            layout.body_font_size
        );
        layout
    }
}

impl PageAnalysis for LayoutAnalyzer {
    fn analyze_page(&self, page: &PageContent) -> Result<PageLayout> {
        Ok(self.analyze(page))
    }
}

fn body_size(stats: &FontStatistics) -> DetectionResult<f32> {
    match stats.body_size() {
        Some(size) if size > 0.0 => DetectionResult::Detected(size),
        _ => DetectionResult::degraded("no usable font sizes"),
    }
}

/// Extents of the text blocks.
fn margins(rects: &[Rect]) -> Margins {
    match Rect::union_all(rects) {
        Some(u) => Margins {
            left: u.x0,
            right: u.x1,
            top: u.y0,
            bottom: u.y1,
        },
        None => Margins::default(),
    }
}

/// Median positive vertical gap between consecutive blocks (top to bottom).
fn common_spacing(rects: &[Rect]) -> f32 {
    let mut sorted: Vec<&Rect> = rects.iter().collect();
    sorted.sort_by(|a, b| a.y0.total_cmp(&b.y0));

    let mut gaps: Vec<f32> = sorted
        .windows(2)
        .map(|w| w[1].y0 - w[0].y1)
        .filter(|g| *g > 0.0)
        .collect();
    if gaps.is_empty() {
        return 0.0;
    }
    gaps.sort_by(f32::total_cmp);

    let mid = gaps.len() / 2;
    if gaps.len() % 2 == 0 {
        (gaps[mid - 1] + gaps[mid]) / 2.0
    } else {
        gaps[mid]
    }
}

/// Fold page layouts into a document layout.
pub fn combine_layouts(layouts: &[PageLayout], config: &HeuristicConfig) -> DocumentLayout {
    if layouts.is_empty() {
        return DocumentLayout::default();
    }

    let multi = layouts.iter().filter(|l| l.is_multi_column()).count();
    let single = layouts.len() - multi;
    let layout_type = if multi > single {
        LayoutType::MultiColumn
    } else {
        LayoutType::SingleColumn
    };
    let consistent_layout_type = multi == 0 || single == 0;

    let mut stats = FontStatistics::default();
    for layout in layouts {
        stats.merge(&layout.font_stats);
    }

    let body_font_size = stats.body_size().unwrap_or(DEFAULT_BODY_FONT_SIZE);
    let header_font_sizes: Vec<f32> = stats
        .sizes_above(body_font_size, config.header_size_ratio)
        .into_iter()
        .take(3)
        .collect();
    let base_font = stats
        .most_common_font()
        .unwrap_or(DEFAULT_BASE_FONT)
        .to_string();

    DocumentLayout {
        layout_type,
        consistent_layout_type,
        header_font_sizes,
        body_font_size,
        base_font,
        bullet_styles: layouts
            .iter()
            .flat_map(|l| l.bullet_styles.iter().copied())
            .collect(),
        has_ratings: layouts.iter().any(|l| l.has_ratings),
        is_resume: layouts.iter().any(|l| l.is_resume),
        sampled_pages: layouts.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Line, PageBlock, Span};

    fn block(lines: &[(&str, f32)], x0: f32, y0: f32, width: f32) -> PageBlock {
        let mut y = y0;
        let lines = lines
            .iter()
            .map(|(text, size)| {
                let line = Line::from_spans(vec![Span::new(
                    *text,
                    "Helvetica",
                    *size,
                    Rect::new(x0, y, x0 + width, y + size),
                )]);
                y += size * 1.2;
                line
            })
            .collect();
        PageBlock::Text(TextBlock::new(lines))
    }

    fn page(blocks: Vec<PageBlock>) -> PageContent {
        let mut page = PageContent::new(0, 612.0, 792.0);
        page.blocks = blocks;
        page
    }

    #[test]
    fn test_empty_page_is_single_column() {
        let layout = LayoutAnalyzer::default().analyze(&page(vec![]));
        assert_eq!(layout.layout_type, LayoutType::SingleColumn);
        assert!(layout.columns.is_empty());
        assert!(layout.headers.is_empty());
        assert!(layout.bullet_styles.is_empty());
        assert!(!layout.degraded.is_empty());
    }

    #[test]
    fn test_body_size_from_span_counts() {
        let mut blocks = Vec::new();
        for i in 0..40 {
            blocks.push(block(&[("body text", 11.0)], 72.0, 100.0 + i as f32 * 15.0, 400.0));
        }
        for i in 0..3 {
            blocks.push(block(&[("Heading", 16.0)], 72.0, 20.0 + i as f32 * 20.0, 100.0));
        }
        let layout = LayoutAnalyzer::default().analyze(&page(blocks));
        assert_eq!(layout.body_font_size, 11.0);
    }

    #[test]
    fn test_two_column_page() {
        let mut blocks = Vec::new();
        for i in 0..8 {
            let y = 72.0 + i as f32 * 80.0;
            blocks.push(block(&[("left column text", 11.0)], 40.0, y, 240.0));
            blocks.push(block(&[("right column text", 11.0)], 330.0, y, 240.0));
        }
        let layout = LayoutAnalyzer::default().analyze(&page(blocks));

        assert_eq!(layout.layout_type, LayoutType::MultiColumn);
        assert_eq!(layout.columns.len(), 2);
        let sum: f32 = layout.columns.iter().map(|c| c.width_ratio).sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(layout.column_strategy.is_some());
    }

    #[test]
    fn test_single_column_page() {
        let blocks = (0..6)
            .map(|i| block(&[("A full width paragraph.", 11.0)], 72.0, 72.0 + i as f32 * 60.0, 468.0))
            .collect();
        let layout = LayoutAnalyzer::default().analyze(&page(blocks));
        assert_eq!(layout.layout_type, LayoutType::SingleColumn);
        assert!(layout.columns.is_empty());
        assert!((layout.margins.left - 72.0).abs() < 1e-6);
        assert!(layout.common_spacing > 0.0);
    }

    #[test]
    fn test_resume_signals() {
        let blocks = vec![
            block(&[("EXPERIENCE", 14.0)], 72.0, 72.0, 200.0),
            block(&[("• Built things", 11.0), ("• Shipped things", 11.0)], 72.0, 120.0, 300.0),
            block(&[("Rust ●●●●○", 11.0)], 72.0, 200.0, 200.0),
            block(&[("jane@example.com", 11.0)], 72.0, 260.0, 200.0),
        ];
        let layout = LayoutAnalyzer::default().analyze(&page(blocks));

        assert!(layout.is_resume);
        assert!(layout.has_ratings);
        assert_eq!(layout.bullet_styles, ['•'].into_iter().collect());
        assert!(layout.headers.iter().any(|h| h.text == "EXPERIENCE"));
    }

    #[test]
    fn test_combine_layouts() {
        let config = HeuristicConfig::default();
        assert_eq!(combine_layouts(&[], &config), DocumentLayout::default());

        let mut stats = FontStatistics::default();
        for _ in 0..10 {
            stats.add_size(10.0);
        }
        for size in [12.0, 14.0, 16.0, 20.0] {
            stats.add_size(size);
        }
        let multi = PageLayout {
            layout_type: LayoutType::MultiColumn,
            has_ratings: true,
            font_stats: stats,
            ..PageLayout::default()
        };
        let single = PageLayout::default();

        let doc = combine_layouts(&[multi.clone(), single.clone()], &config);
        assert_eq!(doc.layout_type, LayoutType::SingleColumn);
        assert!(!doc.consistent_layout_type);
        assert_eq!(doc.header_font_sizes, vec![20.0, 16.0, 14.0]);
        assert_eq!(doc.body_font_size, 10.0);
        assert_eq!(doc.base_font, DEFAULT_BASE_FONT);
        assert!(doc.has_ratings);
        assert_eq!(doc.sampled_pages, 2);

        let doc = combine_layouts(&[multi.clone(), multi, single], &config);
        assert_eq!(doc.layout_type, LayoutType::MultiColumn);
    }
}
