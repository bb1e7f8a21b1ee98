//! Column detection.
//!
//! Three independent strategies look at block geometry from different angles:
//!
//! - **density grid**: block coverage rasterized onto a fixed grid and collapsed to an x profile,
//!   gutters are profile valleys;
//! - **histogram valley**: a smoothed histogram of block edge x-coordinates, gutters are valleys;
//! - **alignment zone**: a histogram of block left edges, column starts are peaks.
//!
//! Every strategy converts its boundaries with [`columns_from_boundaries`]. The result with the
//! most columns wins ([`select_columns`]).

use crate::config::HeuristicConfig;
use crate::model::Rect;

use super::types::{ColumnSpec, ColumnStrategy, DetectionResult};

/// Turn boundary x-coordinates into columns spanning `[0, page_width]`.
///
/// A boundary closer than `min_ratio × page_width` to the previous kept boundary (or to the
/// page's left edge) is dropped, as are trailing boundaries that would leave a sliver at the
/// right edge; narrow columns thereby merge into a neighbour. Returns an empty list when fewer
/// than two columns remain.
pub fn columns_from_boundaries(
    boundaries: &[f32],
    page_width: f32,
    min_ratio: f32,
) -> Vec<ColumnSpec> {
    if page_width <= 0.0 {
        return vec![];
    }

    let mut cuts: Vec<f32> = boundaries
        .iter()
        .copied()
        .filter(|x| *x > 0.0 && *x < page_width)
        .collect();
    cuts.sort_by(f32::total_cmp);

    let min_width = min_ratio * page_width;
    let mut kept: Vec<f32> = Vec::new();
    let mut last = 0.0;
    for cut in cuts {
        if cut - last >= min_width {
            kept.push(cut);
            last = cut;
        }
    }
    while kept.last().is_some_and(|l| page_width - l < min_width) {
        kept.pop();
    }
    if kept.is_empty() {
        return vec![];
    }

    let mut edges = Vec::with_capacity(kept.len() + 2);
    edges.push(0.0);
    edges.extend(kept);
    edges.push(page_width);

    edges
        .windows(2)
        .map(|w| ColumnSpec {
            left: w[0],
            right: w[1],
            width_ratio: (w[1] - w[0]) / page_width,
        })
        .collect()
}

/// Density-grid strategy.
pub fn detect_by_density(
    blocks: &[Rect],
    page_width: f32,
    page_height: f32,
    config: &HeuristicConfig,
) -> DetectionResult<Vec<ColumnSpec>> {
    if blocks.is_empty() || page_width <= 0.0 || page_height <= 0.0 {
        return DetectionResult::degraded("density grid: no text blocks");
    }

    let n = config.density_grid_size.max(1);
    let mut grid = vec![vec![false; n]; n];
    let to_cell = |v: f32, extent: f32| ((v / extent) * n as f32).clamp(0.0, n as f32);

    for rect in blocks {
        let gx0 = to_cell(rect.x0, page_width).floor() as usize;
        let gx1 = (to_cell(rect.x1, page_width).ceil() as usize).max(gx0 + 1).min(n);
        let gy0 = to_cell(rect.y0, page_height).floor() as usize;
        let gy1 = (to_cell(rect.y1, page_height).ceil() as usize).max(gy0 + 1).min(n);
        for row in grid.iter_mut().take(gy1).skip(gy0) {
            for cell in row.iter_mut().take(gx1).skip(gx0) {
                *cell = true;
            }
        }
    }

    let profile: Vec<f32> = (0..n)
        .map(|x| grid.iter().filter(|row| row[x]).count() as f32)
        .collect();

    let valleys = plateau_valleys(&profile, config.valley_threshold_ratio);
    let cell_width = page_width / n as f32;
    let boundaries: Vec<f32> = valleys.iter().map(|v| v * cell_width).collect();

    log::debug!("density grid: valleys at {:?}", boundaries);
    DetectionResult::Detected(columns_from_boundaries(
        &boundaries,
        page_width,
        config.min_column_width_ratio,
    ))
}

/// Valleys of a profile where flat runs count as one minimum.
///
/// Returns positions in profile units (run centre, measured in cells from the left edge).
fn plateau_valleys(profile: &[f32], threshold_ratio: f32) -> Vec<f32> {
    let peak = profile.iter().copied().fold(0.0, f32::max);
    if peak <= 0.0 {
        return vec![];
    }
    let threshold = peak * threshold_ratio;

    let mut valleys = Vec::new();
    let mut i = 0;
    while i < profile.len() {
        let value = profile[i];
        let mut end = i;
        while end + 1 < profile.len() && profile[end + 1] == value {
            end += 1;
        }

        let left_higher = i > 0 && profile[i - 1] > value;
        let right_higher = end + 1 < profile.len() && profile[end + 1] > value;
        if left_higher && right_higher && value < threshold {
            valleys.push((i + end + 1) as f32 / 2.0);
        }
        i = end + 1;
    }
    valleys
}

/// Histogram-valley strategy over block edge coordinates.
pub fn detect_by_histogram(
    blocks: &[Rect],
    page_width: f32,
    config: &HeuristicConfig,
) -> DetectionResult<Vec<ColumnSpec>> {
    let coords: Vec<f32> = blocks.iter().flat_map(|r| [r.x0, r.x1]).collect();
    if coords.len() <= config.histogram_min_coordinates || page_width <= 0.0 {
        return DetectionResult::degraded(format!(
            "histogram: {} edge coordinates are not enough",
            coords.len()
        ));
    }

    let bins = (coords.len() / 3)
        .max(config.histogram_min_bins)
        .min(config.histogram_max_bins);
    let mut hist = vec![0.0f32; bins];
    for x in &coords {
        let idx = ((x / page_width) * bins as f32).floor();
        let idx = (idx.max(0.0) as usize).min(bins - 1);
        hist[idx] += 1.0;
    }

    let smoothed: Vec<f32> = (0..bins)
        .map(|i| {
            let prev = if i > 0 { hist[i - 1] } else { 0.0 };
            let next = hist.get(i + 1).copied().unwrap_or(0.0);
            (prev + hist[i] + next) / 3.0
        })
        .collect();

    let peak = smoothed.iter().copied().fold(0.0, f32::max);
    let threshold = peak * config.valley_threshold_ratio;
    let bin_width = page_width / bins as f32;
    let min_gap = page_width * config.min_column_width_ratio;

    let mut boundaries: Vec<f32> = Vec::new();
    for i in 1..bins.saturating_sub(1) {
        let v = smoothed[i];
        if v < smoothed[i - 1] && v < smoothed[i + 1] && v < threshold {
            let x = (i as f32 + 0.5) * bin_width;
            if boundaries.last().map_or(true, |prev| x - prev >= min_gap) {
                boundaries.push(x);
            }
        }
    }

    log::debug!("histogram: valleys at {:?}", boundaries);
    DetectionResult::Detected(columns_from_boundaries(
        &boundaries,
        page_width,
        config.min_column_width_ratio,
    ))
}

/// A left-edge alignment zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentZone {
    pub x: f32,
    /// Synthesized page margin rather than an observed peak
    pub synthetic: bool,
}

/// Alignment zones of block left edges, sorted by x.
pub fn alignment_zones(
    blocks: &[Rect],
    page_width: f32,
    config: &HeuristicConfig,
) -> Vec<AlignmentZone> {
    let xs: Vec<f32> = blocks.iter().map(|r| r.x0).collect();
    if xs.is_empty() {
        return vec![];
    }

    let bins = (xs.len() / 5 + 5).min(config.alignment_max_bins).max(1);
    let min_x = xs.iter().copied().fold(f32::INFINITY, f32::min);
    let max_x = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let span = (max_x - min_x).max(f32::EPSILON);

    let mut hist = vec![0usize; bins];
    let mut bin_min = vec![f32::INFINITY; bins];
    for x in &xs {
        let idx = ((((x - min_x) / span) * bins as f32).floor() as usize).min(bins - 1);
        hist[idx] += 1;
        bin_min[idx] = bin_min[idx].min(*x);
    }

    // Strict local maxima; positions outside the histogram count as zero.
    let max_height = hist.iter().copied().max().unwrap_or(0) as f32;
    let min_height = max_height * config.peak_min_height_ratio;
    let mut candidates: Vec<usize> = (0..bins)
        .filter(|&i| {
            let h = hist[i];
            let left = if i > 0 { hist[i - 1] } else { 0 };
            let right = hist.get(i + 1).copied().unwrap_or(0);
            h > left && h > right && h as f32 >= min_height
        })
        .collect();

    // Keep the tallest peaks first, suppressing neighbours within the minimum distance.
    let min_distance = ((bins as f32 * config.peak_min_distance_ratio) as usize).max(1);
    candidates.sort_by(|a, b| hist[*b].cmp(&hist[*a]).then(a.cmp(b)));
    let mut peaks: Vec<usize> = Vec::new();
    for c in candidates {
        if peaks.iter().all(|p| p.abs_diff(c) >= min_distance) {
            peaks.push(c);
        }
    }
    peaks.sort_unstable();

    let mut zones: Vec<AlignmentZone> = peaks
        .into_iter()
        .map(|i| AlignmentZone {
            x: bin_min[i],
            synthetic: false,
        })
        .collect();

    if zones.len() < 2 {
        let dedup = page_width * config.margin_dedup_ratio;
        for x in [
            page_width * config.default_margin_ratio,
            page_width * (1.0 - config.default_margin_ratio),
        ] {
            if zones.iter().all(|z| (z.x - x).abs() >= dedup) {
                zones.push(AlignmentZone { x, synthetic: true });
            }
        }
        zones.sort_by(|a, b| a.x.total_cmp(&b.x));
    }

    zones
}

/// Alignment-zone strategy: observed zones other than the leftmost start new columns.
pub fn detect_by_alignment(
    blocks: &[Rect],
    page_width: f32,
    config: &HeuristicConfig,
) -> DetectionResult<Vec<ColumnSpec>> {
    if blocks.is_empty() || page_width <= 0.0 {
        return DetectionResult::degraded("alignment zones: no text blocks");
    }

    let zones = alignment_zones(blocks, page_width, config);
    let starts: Vec<f32> = zones
        .iter()
        .filter(|z| !z.synthetic)
        .skip(1)
        .map(|z| z.x)
        .collect();

    log::debug!("alignment zones: column starts at {:?}", starts);
    DetectionResult::Detected(columns_from_boundaries(
        &starts,
        page_width,
        config.min_column_width_ratio,
    ))
}

/// Pick the result with the most columns among those with at least two.
///
/// Ties keep the input order.
pub fn select_columns(
    results: Vec<(ColumnStrategy, Vec<ColumnSpec>)>,
) -> Option<(ColumnStrategy, Vec<ColumnSpec>)> {
    let mut candidates: Vec<(ColumnStrategy, Vec<ColumnSpec>)> = results
        .into_iter()
        .filter(|(_, columns)| columns.len() >= 2)
        .collect();
    candidates.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    candidates.into_iter().next()
}

/// Run all strategies and select the winner.
///
/// Returns the selection (if any) and the reasons of strategies that degraded.
pub fn detect_columns(
    blocks: &[Rect],
    page_width: f32,
    page_height: f32,
    config: &HeuristicConfig,
) -> (Option<(ColumnStrategy, Vec<ColumnSpec>)>, Vec<String>) {
    let mut reasons = Vec::new();
    let mut results = Vec::new();

    for (strategy, result) in [
        (
            ColumnStrategy::DensityGrid,
            detect_by_density(blocks, page_width, page_height, config),
        ),
        (
            ColumnStrategy::HistogramValley,
            detect_by_histogram(blocks, page_width, config),
        ),
        (
            ColumnStrategy::AlignmentZone,
            detect_by_alignment(blocks, page_width, config),
        ),
    ] {
        match result {
            DetectionResult::Detected(columns) => results.push((strategy, columns)),
            DetectionResult::Degraded(reason) => reasons.push(reason),
        }
    }

    (select_columns(results), reasons)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_W: f32 = 612.0;
    const PAGE_H: f32 = 792.0;

    fn two_column_blocks() -> Vec<Rect> {
        let mut blocks = Vec::new();
        for i in 0..8 {
            let y = 72.0 + i as f32 * 80.0;
            blocks.push(Rect::new(40.0, y, 280.0, y + 60.0));
            blocks.push(Rect::new(330.0, y, 570.0, y + 60.0));
        }
        blocks
    }

    fn assert_partition(columns: &[ColumnSpec]) {
        let sum: f32 = columns.iter().map(|c| c.width_ratio).sum();
        assert!((sum - 1.0).abs() < 1e-6, "ratios sum to {sum}");
        assert!(columns.iter().all(|c| c.width_ratio >= 0.1 - 1e-6));
        assert!(columns.iter().all(|c| c.left < c.right));
    }

    #[test]
    fn test_boundaries_merge_narrow_columns() {
        // 20 is closer than 61.2 to the left edge; 600 leaves a sliver on the right
        let columns = columns_from_boundaries(&[20.0, 306.0, 330.0, 600.0], PAGE_W, 0.1);
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].right, 306.0);
        assert_partition(&columns);

        assert!(columns_from_boundaries(&[], PAGE_W, 0.1).is_empty());
        assert!(columns_from_boundaries(&[5.0], PAGE_W, 0.1).is_empty());
    }

    #[test]
    fn test_density_finds_gutter() {
        let config = HeuristicConfig::default();
        let result = detect_by_density(&two_column_blocks(), PAGE_W, PAGE_H, &config);
        let DetectionResult::Detected(columns) = result else {
            panic!("expected detection");
        };
        assert_eq!(columns.len(), 2);
        assert!(columns[0].right > 280.0 && columns[0].right < 330.0);
        assert_partition(&columns);
    }

    #[test]
    fn test_density_single_column() {
        let config = HeuristicConfig::default();
        let blocks: Vec<Rect> = (0..6)
            .map(|i| {
                let y = 72.0 + i as f32 * 100.0;
                Rect::new(72.0, y, 540.0, y + 80.0)
            })
            .collect();
        let result = detect_by_density(&blocks, PAGE_W, PAGE_H, &config);
        assert_eq!(result, DetectionResult::Detected(vec![]));
    }

    #[test]
    fn test_density_degrades_without_blocks() {
        let config = HeuristicConfig::default();
        assert!(!detect_by_density(&[], PAGE_W, PAGE_H, &config).is_detected());
    }

    #[test]
    fn test_plateau_valley_centre() {
        let profile = [5.0, 5.0, 0.0, 0.0, 0.0, 0.0, 5.0, 5.0];
        assert_eq!(plateau_valleys(&profile, 0.2), vec![4.0]);
        // Edge plateaus are not valleys
        assert!(plateau_valleys(&[0.0, 0.0, 5.0], 0.2).is_empty());
    }

    #[test]
    fn test_histogram_needs_coordinates() {
        let config = HeuristicConfig::default();
        let blocks = vec![Rect::new(72.0, 72.0, 540.0, 100.0)];
        assert!(!detect_by_histogram(&blocks, PAGE_W, &config).is_detected());
    }

    #[test]
    fn test_alignment_zones_find_column_starts() {
        let config = HeuristicConfig::default();
        let blocks = two_column_blocks();
        let zones = alignment_zones(&blocks, PAGE_W, &config);
        let observed: Vec<f32> = zones.iter().filter(|z| !z.synthetic).map(|z| z.x).collect();
        assert_eq!(observed, vec![40.0, 330.0]);

        let DetectionResult::Detected(columns) = detect_by_alignment(&blocks, PAGE_W, &config)
        else {
            panic!("expected detection");
        };
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[1].left, 330.0);
        assert_partition(&columns);
    }

    #[test]
    fn test_alignment_synthesizes_margins() {
        let config = HeuristicConfig::default();
        let blocks = vec![Rect::new(72.0, 72.0, 540.0, 100.0)];
        let zones = alignment_zones(&blocks, PAGE_W, &config);
        assert_eq!(zones.iter().filter(|z| z.synthetic).count(), 1);
        assert_eq!(zones.iter().filter(|z| !z.synthetic).count(), 1);
        assert_eq!(
            detect_by_alignment(&blocks, PAGE_W, &config),
            DetectionResult::Detected(vec![])
        );
    }

    #[test]
    fn test_selection_prefers_most_columns() {
        let two = columns_from_boundaries(&[306.0], PAGE_W, 0.1);
        let three = columns_from_boundaries(&[204.0, 408.0], PAGE_W, 0.1);

        let (strategy, columns) = select_columns(vec![
            (ColumnStrategy::DensityGrid, two.clone()),
            (ColumnStrategy::HistogramValley, vec![]),
            (ColumnStrategy::AlignmentZone, three),
        ])
        .unwrap();
        assert_eq!(strategy, ColumnStrategy::AlignmentZone);
        assert_eq!(columns.len(), 3);

        // Ties keep the first strategy
        let (strategy, _) = select_columns(vec![
            (ColumnStrategy::DensityGrid, two.clone()),
            (ColumnStrategy::AlignmentZone, two),
        ])
        .unwrap();
        assert_eq!(strategy, ColumnStrategy::DensityGrid);

        assert!(select_columns(vec![(ColumnStrategy::DensityGrid, vec![])]).is_none());
    }
}
