//! Layout value types.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::stats::FontStatistics;
use crate::model::Rect;

/// Body font size assumed when nothing was observed.
pub const DEFAULT_BODY_FONT_SIZE: f32 = 11.0;
/// Base font assumed when nothing was observed.
pub const DEFAULT_BASE_FONT: &str = "Calibri";

/// Result of a leaf detector: a value, or a reason why the signal was insufficient.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionResult<T> {
    Detected(T),
    Degraded(String),
}

impl<T> DetectionResult<T> {
    pub fn degraded(reason: impl Into<String>) -> Self {
        DetectionResult::Degraded(reason.into())
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, DetectionResult::Detected(_))
    }

    /// The detected value, or `fallback` with the reason pushed onto `reasons`.
    pub fn or_fallback(self, fallback: T, reasons: &mut Vec<String>) -> T {
        match self {
            DetectionResult::Detected(value) => value,
            DetectionResult::Degraded(reason) => {
                reasons.push(reason);
                fallback
            }
        }
    }
}

/// Page layout type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutType {
    #[default]
    SingleColumn,
    MultiColumn,
}

/// Column detection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnStrategy {
    DensityGrid,
    HistogramValley,
    AlignmentZone,
}

/// A horizontal page partition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub left: f32,
    pub right: f32,
    /// `(right - left) / page_width`
    pub width_ratio: f32,
}

impl ColumnSpec {
    pub fn center(&self) -> f32 {
        (self.left + self.right) / 2.0
    }

    pub fn contains_rect(&self, rect: &Rect) -> bool {
        rect.x0 >= self.left && rect.x1 <= self.right
    }

    pub fn contains_x(&self, x: f32) -> bool {
        x >= self.left && x <= self.right
    }
}

/// A block that looks like a header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderCandidate {
    pub text: String,
    /// 1 (largest) to 3
    pub level: u8,
    pub bbox: Rect,
    pub is_bold: bool,
    pub is_allcaps: bool,
    pub size: f32,
}

/// Extents of the text on a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

/// Inferred structure of one page. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub layout_type: LayoutType,
    pub columns: Vec<ColumnSpec>,
    pub column_strategy: Option<ColumnStrategy>,
    pub headers: Vec<HeaderCandidate>,
    pub bullet_styles: BTreeSet<char>,
    pub has_ratings: bool,
    pub is_resume: bool,
    pub margins: Margins,
    pub body_font_size: f32,
    /// Median positive vertical gap between consecutive blocks
    pub common_spacing: f32,
    /// Reasons heuristics fell back to defaults
    pub degraded: Vec<String>,
    #[serde(skip)]
    pub font_stats: FontStatistics,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            layout_type: LayoutType::SingleColumn,
            columns: Vec::new(),
            column_strategy: None,
            headers: Vec::new(),
            bullet_styles: BTreeSet::new(),
            has_ratings: false,
            is_resume: false,
            margins: Margins::default(),
            body_font_size: DEFAULT_BODY_FONT_SIZE,
            common_spacing: 0.0,
            degraded: Vec::new(),
            font_stats: FontStatistics::default(),
        }
    }
}

impl PageLayout {
    pub fn is_multi_column(&self) -> bool {
        self.layout_type == LayoutType::MultiColumn
    }
}

/// Aggregate layout over the sampled pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentLayout {
    pub layout_type: LayoutType,
    pub consistent_layout_type: bool,
    /// Top three header sizes, descending
    pub header_font_sizes: Vec<f32>,
    pub body_font_size: f32,
    pub base_font: String,
    pub bullet_styles: BTreeSet<char>,
    pub has_ratings: bool,
    pub is_resume: bool,
    pub sampled_pages: usize,
}

impl Default for DocumentLayout {
    fn default() -> Self {
        Self {
            layout_type: LayoutType::SingleColumn,
            consistent_layout_type: true,
            header_font_sizes: Vec::new(),
            body_font_size: DEFAULT_BODY_FONT_SIZE,
            base_font: DEFAULT_BASE_FONT.to_string(),
            bullet_styles: BTreeSet::new(),
            has_ratings: false,
            is_resume: false,
            sampled_pages: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_fallback() {
        let mut reasons = Vec::new();
        let value = DetectionResult::Detected(3).or_fallback(0, &mut reasons);
        assert_eq!(value, 3);
        assert!(reasons.is_empty());

        let value = DetectionResult::degraded("no text").or_fallback(0, &mut reasons);
        assert_eq!(value, 0);
        assert_eq!(reasons, vec!["no text".to_string()]);
    }

    #[test]
    fn test_column_containment() {
        let column = ColumnSpec {
            left: 0.0,
            right: 306.0,
            width_ratio: 0.5,
        };
        assert!(column.contains_rect(&Rect::new(72.0, 0.0, 300.0, 10.0)));
        assert!(!column.contains_rect(&Rect::new(72.0, 0.0, 320.0, 10.0)));
        assert_eq!(column.center(), 153.0);
    }

    #[test]
    fn test_layout_serializes_snake_case() {
        let layout = PageLayout::default();
        let json = serde_json::to_value(&layout).unwrap();
        assert_eq!(json["layout_type"], "single_column");
        assert!(json.get("font_stats").is_none());
    }
}
