//! Header candidate detection.

use crate::config::HeuristicConfig;
use crate::model::TextBlock;

use super::patterns::{is_resume_section, is_uppercase_text};
use super::types::HeaderCandidate;

/// Ratio comparisons treat values this close to a boundary as on it.
const RATIO_EPSILON: f32 = 1e-4;

/// Header level from the size ratio to the body size.
///
/// Boundary values belong to the lower level: `≤ 1.1` is 3, `≤ 1.5` is 2, above is 1.
pub fn header_level(size: f32, body_size: f32, config: &HeuristicConfig) -> u8 {
    if body_size <= 0.0 {
        return 3;
    }
    let ratio = size / body_size;
    if ratio <= config.header_size_ratio + RATIO_EPSILON {
        3
    } else if ratio <= config.header_level2_ratio + RATIO_EPSILON {
        2
    } else {
        1
    }
}

/// Whether text counts as all-caps: uppercase throughout and longer than two characters.
pub fn is_allcaps(text: &str) -> bool {
    is_uppercase_text(text) && text.chars().count() > 2
}

/// Header candidate for a block, if it looks like one.
pub fn header_candidate(
    block: &TextBlock,
    body_size: f32,
    config: &HeuristicConfig,
) -> Option<HeaderCandidate> {
    let text = block.text();
    let text = text.trim();
    let char_count = text.chars().count();
    if text.is_empty() || char_count >= config.header_max_chars {
        return None;
    }

    let size = block.max_size();
    let is_bold = block.any_bold();
    let allcaps = is_allcaps(text);

    let larger = size > body_size * config.header_size_ratio + RATIO_EPSILON;
    let bold_caps = is_bold && allcaps;
    let label = text.ends_with(':') && char_count < config.label_header_max_chars;

    if !(larger || bold_caps || label || is_resume_section(text)) {
        return None;
    }

    Some(HeaderCandidate {
        text: text.to_string(),
        level: header_level(size, body_size, config),
        bbox: block.bbox,
        is_bold,
        is_allcaps: allcaps,
        size,
    })
}

/// Header candidates of a page, in block order.
pub fn detect_headers<'a>(
    blocks: impl IntoIterator<Item = &'a TextBlock>,
    body_size: f32,
    config: &HeuristicConfig,
) -> Vec<HeaderCandidate> {
    blocks
        .into_iter()
        .filter_map(|block| header_candidate(block, body_size, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Line, Rect, Span};

    fn block(text: &str, font: &str, size: f32) -> TextBlock {
        TextBlock::new(vec![Line::from_spans(vec![Span::new(
            text,
            font,
            size,
            Rect::new(72.0, 100.0, 300.0, 100.0 + size),
        )])])
    }

    #[test]
    fn test_level_mapping() {
        let config = HeuristicConfig::default();
        assert_eq!(header_level(11.55, 11.0, &config), 3); // 1.05x
        assert_eq!(header_level(14.3, 11.0, &config), 2); // 1.3x
        assert_eq!(header_level(22.0, 11.0, &config), 1); // 2.0x
    }

    #[test]
    fn test_level_boundaries() {
        let config = HeuristicConfig::default();
        assert_eq!(header_level(11.0, 10.0, &config), 3);
        assert_eq!(header_level(11.2, 10.0, &config), 2);
        assert_eq!(header_level(15.0, 10.0, &config), 2);
        assert_eq!(header_level(15.1, 10.0, &config), 1);
    }

    #[test]
    fn test_candidates() {
        let config = HeuristicConfig::default();

        let large = header_candidate(&block("Introduction", "Helvetica", 18.0), 11.0, &config)
            .unwrap();
        assert_eq!(large.level, 1);
        assert!(!large.is_bold);

        let caps = header_candidate(&block("KEY FACTS", "Helvetica-Bold", 11.0), 11.0, &config)
            .unwrap();
        assert!(caps.is_bold && caps.is_allcaps);
        assert_eq!(caps.level, 3);

        assert!(header_candidate(&block("Contact:", "Helvetica", 11.0), 11.0, &config).is_some());
        assert!(header_candidate(&block("Experience", "Helvetica", 11.0), 11.0, &config).is_some());

        // Plain body text and uppercase without bold are not headers
        assert!(header_candidate(&block("Plain sentence.", "Helvetica", 11.0), 11.0, &config)
            .is_none());
        assert!(header_candidate(&block("KEY FACTS", "Helvetica", 11.0), 11.0, &config).is_none());
    }

    #[test]
    fn test_long_text_is_not_a_header() {
        let config = HeuristicConfig::default();
        let long = "A".repeat(120);
        assert!(header_candidate(&block(&long, "Helvetica-Bold", 20.0), 11.0, &config).is_none());
        assert!(header_candidate(&block("   ", "Helvetica", 20.0), 11.0, &config).is_none());
    }
}
