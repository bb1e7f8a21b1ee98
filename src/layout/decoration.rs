//! Decorative page headers.
//!
//! Templates often open the first page with a banner: a filled band, a wide rule, or a cluster of
//! tiny text fragments (initials, icons). The leading fragment of such a banner carries no
//! content and is skipped by the emitter.

use crate::config::HeuristicConfig;
use crate::model::{PageBlock, PageContent};

/// Text blocks with fewer characters than this count as near-empty.
const NEAR_EMPTY_CHARS: usize = 3;

/// Whether the top of the page carries a decorative header.
pub fn has_decorative_header(page: &PageContent, config: &HeuristicConfig) -> bool {
    let region_bottom = page.height * config.decorative_region_ratio;

    let region_texts: Vec<String> = page
        .text_blocks()
        .filter(|b| b.bbox.y0 < region_bottom)
        .map(|b| b.text())
        .collect();
    if region_texts.is_empty() {
        return false;
    }

    let drawings_in_region = page.drawings.iter().any(|d| d.bbox.y0 < region_bottom);

    let near_empty = region_texts
        .iter()
        .filter(|t| t.trim().chars().count() < NEAR_EMPTY_CHARS)
        .count();

    let wide_rule = page.drawings.iter().any(|d| {
        d.bbox.y0 < region_bottom
            && d.is_horizontal_rule()
            && d.bbox.width() > page.width * config.decorative_rule_ratio
    });

    drawings_in_region || near_empty >= 2 || wide_rule
}

/// Index into `page.blocks` of the decorative block to skip, if any.
///
/// The topmost text block is skipped when the page has a decorative header and the block is a
/// short fragment near the top edge.
pub fn decorative_block(page: &PageContent, config: &HeuristicConfig) -> Option<usize> {
    if !has_decorative_header(page, config) {
        return None;
    }

    let (index, block) = page
        .blocks
        .iter()
        .enumerate()
        .filter_map(|(i, b)| match b {
            PageBlock::Text(t) => Some((i, t)),
            PageBlock::Image(_) => None,
        })
        .min_by(|(_, a), (_, b)| a.bbox.y0.total_cmp(&b.bbox.y0))?;

    let starts_high = block.bbox.y0 < page.height * config.decorative_skip_ratio;
    let short = block.text().trim().chars().count() < config.decorative_skip_max_chars;

    if starts_high && short {
        log::debug!("Skipping decorative header block {:?}", block.text());
        Some(index)
    } else {
        None
    }
}
