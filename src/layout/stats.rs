//! Font statistics for body-size and header-size inference.

use std::collections::BTreeMap;

use crate::model::Span;

/// Histogram key precision: sizes are bucketed to 0.1pt.
const SIZE_KEY_SCALE: f32 = 10.0;

/// Observed font sizes and font names with frequency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontStatistics {
    /// Size (×10, rounded) → number of spans
    pub size_histogram: BTreeMap<i32, usize>,
    /// Font name → number of spans
    pub font_histogram: BTreeMap<String, usize>,
}

impl FontStatistics {
    /// Collect statistics over spans.
    pub fn from_spans<'a>(spans: impl IntoIterator<Item = &'a Span>) -> Self {
        let mut stats = Self::default();
        for span in spans {
            stats.add_span(span);
        }
        stats
    }

    /// Add one span observation.
    pub fn add_span(&mut self, span: &Span) {
        self.add_size(span.size);
        if !span.font.is_empty() {
            *self.font_histogram.entry(span.font.clone()).or_insert(0) += 1;
        }
    }

    /// Add a font size observation.
    pub fn add_size(&mut self, size: f32) {
        let key = (size * SIZE_KEY_SCALE).round() as i32;
        *self.size_histogram.entry(key).or_insert(0) += 1;
    }

    /// Fold another page's statistics into this one.
    pub fn merge(&mut self, other: &FontStatistics) {
        for (key, count) in &other.size_histogram {
            *self.size_histogram.entry(*key).or_insert(0) += count;
        }
        for (font, count) in &other.font_histogram {
            *self.font_histogram.entry(font.clone()).or_insert(0) += count;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size_histogram.is_empty()
    }

    /// Most frequent size; ties are broken by the larger size.
    pub fn body_size(&self) -> Option<f32> {
        self.size_histogram
            .iter()
            .max_by(|(ka, ca), (kb, cb)| ca.cmp(cb).then(ka.cmp(kb)))
            .map(|(key, _)| *key as f32 / SIZE_KEY_SCALE)
    }

    /// Distinct sizes strictly greater than `ratio × body`, largest first.
    pub fn sizes_above(&self, body: f32, ratio: f32) -> Vec<f32> {
        self.size_histogram
            .keys()
            .rev()
            .map(|k| *k as f32 / SIZE_KEY_SCALE)
            .filter(|size| *size > body * ratio)
            .collect()
    }

    /// Largest observed size.
    pub fn max_size(&self) -> Option<f32> {
        self.size_histogram
            .keys()
            .next_back()
            .map(|k| *k as f32 / SIZE_KEY_SCALE)
    }

    /// Most frequent font name; ties resolve to the alphabetically first name.
    pub fn most_common_font(&self) -> Option<&str> {
        self.font_histogram
            .iter()
            .max_by(|(fa, ca), (fb, cb)| ca.cmp(cb).then(fb.cmp(fa)))
            .map(|(font, _)| font.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Rect;

    #[test]
    fn test_body_size_is_mode() {
        let mut stats = FontStatistics::default();
        for _ in 0..40 {
            stats.add_size(11.0);
        }
        for _ in 0..3 {
            stats.add_size(16.0);
        }
        assert_eq!(stats.body_size(), Some(11.0));
        assert_eq!(stats.max_size(), Some(16.0));
        assert_eq!(stats.sizes_above(11.0, 1.1), vec![16.0]);
    }

    #[test]
    fn test_body_size_tie_prefers_larger() {
        let mut stats = FontStatistics::default();
        stats.add_size(10.0);
        stats.add_size(12.0);
        assert_eq!(stats.body_size(), Some(12.0));
        assert_eq!(FontStatistics::default().body_size(), None);
    }

    #[test]
    fn test_merge_and_fonts() {
        let spans = vec![
            Span::new("a", "Arial", 10.0, Rect::default()),
            Span::new("b", "Arial", 10.0, Rect::default()),
            Span::new("c", "Georgia", 14.0, Rect::default()),
        ];
        let mut stats = FontStatistics::from_spans(&spans);
        let other = FontStatistics::from_spans(&spans[2..]);
        stats.merge(&other);

        assert_eq!(stats.size_histogram.get(&140), Some(&2));
        assert_eq!(stats.most_common_font(), Some("Arial"));
    }
}
