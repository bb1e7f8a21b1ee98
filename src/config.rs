//! Heuristic constants and conversion options.
//!
//! Every threshold used by the analyzer, emitter, post-processor and strategy selector lives in
//! [`HeuristicConfig`]. The defaults are the production values; tests override single fields with
//! struct-update syntax.

use std::path::PathBuf;

use crate::detect::TargetFormat;

/// Fixed heuristic constants of the conversion pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicConfig {
    // --- extraction ---
    /// Font size assumed when a span has none.
    pub default_font_size: f32,
    /// Baseline tolerance for joining spans into a line (fraction of font size).
    pub line_baseline_tolerance: f32,
    /// Horizontal gap that splits a baseline row into separate lines (multiple of font size).
    pub line_split_gap: f32,
    /// Maximum vertical gap between lines of one block (fraction of font size).
    pub block_line_gap: f32,
    /// Maximum font size difference between lines of one block, in points.
    pub block_font_size_delta: f32,
    /// TJ adjustment (thousandths of an em) that counts as a word space.
    pub tj_space_threshold: f32,

    // --- analysis ---
    /// Pages sampled for the document layout and document classification.
    pub sample_pages: usize,
    /// Occupancy grid resolution of the density strategy.
    pub density_grid_size: usize,
    /// Valleys must be below this fraction of the profile peak.
    pub valley_threshold_ratio: f32,
    /// Narrowest column as a fraction of the page width.
    pub min_column_width_ratio: f32,
    /// Minimum histogram bins of the valley strategy.
    pub histogram_min_bins: usize,
    /// Maximum histogram bins of the valley strategy.
    pub histogram_max_bins: usize,
    /// The valley strategy needs more than this many edge coordinates.
    pub histogram_min_coordinates: usize,
    /// Maximum histogram bins of the alignment-zone strategy.
    pub alignment_max_bins: usize,
    /// Peaks must reach this fraction of the highest bin.
    pub peak_min_height_ratio: f32,
    /// Minimum peak distance as a fraction of the bin count.
    pub peak_min_distance_ratio: f32,
    /// Synthesized margin zones, as a fraction of the page width from each edge.
    pub default_margin_ratio: f32,
    /// A synthesized zone is skipped when this close (fraction of page width) to a real one.
    pub margin_dedup_ratio: f32,
    /// Header size ratio; also the level-3 upper bound.
    pub header_size_ratio: f32,
    /// Level-2 upper bound of the size ratio.
    pub header_level2_ratio: f32,
    /// Header candidates are shorter than this many characters.
    pub header_max_chars: usize,
    /// `Label:` headers are shorter than this many characters.
    pub label_header_max_chars: usize,

    // --- emission ---
    /// A span larger than this marks a block as header-like.
    pub header_like_min_size: f32,
    /// Header-like blocks are shorter than this many characters.
    pub header_like_max_chars: usize,
    /// Distance between block centre and page centre that still counts as centred.
    pub center_tolerance: f32,
    /// Left margin must exceed the right margin by this much for right alignment.
    pub right_align_delta: f32,
    /// Smallest emitted run size.
    pub min_run_font_size: f32,
    /// Largest emitted run size.
    pub max_run_font_size: f32,
    /// Space after headings of level 1, 2 and 3, in points.
    pub heading_space_after: [f32; 3],
    /// Empty paragraph spacing inserted before a heading inside a column cell, in points.
    pub cell_heading_spacer: f32,
    /// Content width the column grid is laid out against, in inches.
    pub content_width_inches: f32,
    /// Cell margin of the column grid, in twips.
    pub column_cell_margin: u32,
    /// Ratings labels are padded up to this many characters.
    pub rating_label_width: usize,
    /// Font of rating glyph runs.
    pub rating_font: String,
    /// Size of rating glyph runs.
    pub rating_font_size: f32,
    /// Page margins of emitted sections, in inches.
    pub page_margin_inches: f32,
    /// Top region inspected for decorative headers (fraction of page height).
    pub decorative_region_ratio: f32,
    /// Horizontal rules wider than this fraction of the page are decorative.
    pub decorative_rule_ratio: f32,
    /// A decorative first block must start above this fraction of the page height.
    pub decorative_skip_ratio: f32,
    /// A decorative first block has fewer characters than this.
    pub decorative_skip_max_chars: usize,

    // --- strategy ---
    pub resume_score_threshold: u32,
    pub table_score_threshold: u32,
    pub form_score_threshold: u32,
    /// Pages with more rectangles than this feed the table/form scores.
    pub rect_density_threshold: usize,
    /// Pages with more blocks than this feed the complexity score.
    pub dense_block_threshold: usize,
    pub complex_score_threshold: u32,
    pub moderate_score_threshold: u32,
    /// Documents with more pages than this are always complex.
    pub complex_page_count: usize,
    /// Tab stop of split form fields, in inches.
    pub form_tab_stop_inches: f32,
    /// Cell margin applied to table-heavy documents, in twips.
    pub table_cell_margin: u32,
    /// Minimum similarity for a stored layout pattern to count as a match.
    pub pattern_similarity_threshold: f32,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            default_font_size: 11.0,
            line_baseline_tolerance: 0.3,
            line_split_gap: 2.0,
            block_line_gap: 0.6,
            block_font_size_delta: 1.0,
            tj_space_threshold: 200.0,

            sample_pages: 3,
            density_grid_size: 100,
            valley_threshold_ratio: 0.2,
            min_column_width_ratio: 0.1,
            histogram_min_bins: 20,
            histogram_max_bins: 100,
            histogram_min_coordinates: 5,
            alignment_max_bins: 50,
            peak_min_height_ratio: 0.2,
            peak_min_distance_ratio: 0.1,
            default_margin_ratio: 0.1,
            margin_dedup_ratio: 0.05,
            header_size_ratio: 1.1,
            header_level2_ratio: 1.5,
            header_max_chars: 100,
            label_header_max_chars: 30,

            header_like_min_size: 13.0,
            header_like_max_chars: 50,
            center_tolerance: 50.0,
            right_align_delta: 100.0,
            min_run_font_size: 6.0,
            max_run_font_size: 72.0,
            heading_space_after: [12.0, 8.0, 6.0],
            cell_heading_spacer: 6.0,
            content_width_inches: 6.5,
            column_cell_margin: 60,
            rating_label_width: 20,
            rating_font: "Segoe UI Symbol".to_string(),
            rating_font_size: 10.0,
            page_margin_inches: 0.5,
            decorative_region_ratio: 0.15,
            decorative_rule_ratio: 0.7,
            decorative_skip_ratio: 0.1,
            decorative_skip_max_chars: 10,

            resume_score_threshold: 5,
            table_score_threshold: 10,
            form_score_threshold: 8,
            rect_density_threshold: 10,
            dense_block_threshold: 20,
            complex_score_threshold: 10,
            moderate_score_threshold: 5,
            complex_page_count: 20,
            form_tab_stop_inches: 2.5,
            table_cell_margin: 60,
            pattern_similarity_threshold: 0.75,
        }
    }
}

/// Options for a single conversion run.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Output format
    pub target: TargetFormat,
    /// Heuristic constants
    pub heuristics: HeuristicConfig,
    /// Directory for scoped temporary files (system temp dir if unset)
    pub temp_dir: Option<PathBuf>,
    /// Disable the multi-engine race for complex documents
    pub disable_race: bool,
}

impl ConvertOptions {
    /// Create new conversion options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output format.
    pub fn with_target(mut self, target: TargetFormat) -> Self {
        self.target = target;
        self
    }

    /// Replace the heuristic constants.
    pub fn with_heuristics(mut self, heuristics: HeuristicConfig) -> Self {
        self.heuristics = heuristics;
        self
    }

    /// Place scoped temporary files under `dir`.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Always run a single engine, even for complex documents.
    pub fn without_race(mut self) -> Self {
        self.disable_race = true;
        self
    }
}
