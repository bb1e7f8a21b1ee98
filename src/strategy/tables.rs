//! Table detection using text position analysis (stream mode).
//!
//! Tables are found from text alignment alone: lines are grouped into rows by baseline, left
//! edges that recur across rows become column starts, and runs of consecutive well-aligned rows
//! become table regions.

use std::collections::{HashMap, HashSet};

use crate::docx::{points_to_twips, Paragraph, Run, Table, TableCell, TableRow};
use crate::model::{PageContent, Rect};

/// Position of a line in `page.blocks`: (block index, line index).
pub type LineId = (usize, usize);

/// One positioned line of text, the unit the detector works on.
#[derive(Debug, Clone, PartialEq)]
pub struct TextUnit {
    pub id: LineId,
    pub text: String,
    pub bbox: Rect,
    pub size: f32,
    pub bold: bool,
}

impl TextUnit {
    /// All lines of a page's text blocks.
    pub fn from_page(page: &PageContent) -> Vec<TextUnit> {
        page.blocks
            .iter()
            .enumerate()
            .filter_map(|(bi, b)| b.as_text().map(|t| (bi, t)))
            .flat_map(|(bi, block)| {
                block.lines.iter().enumerate().map(move |(li, line)| TextUnit {
                    id: (bi, li),
                    text: line.text(),
                    bbox: line.bbox,
                    size: line.max_size(),
                    bold: !line.spans.is_empty() && line.spans.iter().all(|s| s.is_bold()),
                })
            })
            .filter(|u| !u.text.trim().is_empty())
            .collect()
    }

    fn x(&self) -> f32 {
        self.bbox.x0
    }

    fn y(&self) -> f32 {
        self.bbox.y0
    }
}

/// A detected table region with its content.
#[derive(Debug, Clone)]
pub struct DetectedTable {
    /// Top of the first row
    pub top: f32,
    /// Top of the last row
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
    /// Column start positions
    pub columns: Vec<f32>,
    pub rows: Vec<TableRowData>,
}

impl DetectedTable {
    pub fn line_ids(&self) -> impl Iterator<Item = LineId> + '_ {
        self.rows.iter().flat_map(|r| r.units.iter().map(|u| u.id))
    }
}

/// Units sharing a row, sorted by x.
#[derive(Debug, Clone)]
pub struct TableRowData {
    pub y: f32,
    pub units: Vec<TextUnit>,
}

/// Table detector configuration.
#[derive(Debug, Clone)]
pub struct TableDetectorConfig {
    /// Minimum number of rows to consider as table
    pub min_rows: usize,
    /// Minimum number of columns to consider as table
    pub min_columns: usize,
    /// Maximum number of columns (above this, likely word-level splitting)
    pub max_columns: usize,
    /// Y tolerance for grouping units into rows (fraction of font size)
    pub y_tolerance_factor: f32,
    /// Minimum column alignment ratio (0.0-1.0)
    pub min_alignment_ratio: f32,
    /// Minimum gap between columns (points)
    pub min_column_gap: f32,
    /// Left edges within this many points share a bucket
    pub bucket_size: f32,
    /// A unit aligns with a column when its left edge is this close, in points
    pub alignment_tolerance: f32,
}

impl Default for TableDetectorConfig {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_columns: 2,
            max_columns: 6,
            y_tolerance_factor: 0.4,
            min_alignment_ratio: 0.3,
            min_column_gap: 15.0,
            bucket_size: 5.0,
            alignment_tolerance: 5.0,
        }
    }
}

/// Detects tables in positioned text.
#[derive(Debug, Clone, Default)]
pub struct TableDetector {
    config: TableDetectorConfig,
}

impl TableDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TableDetectorConfig) -> Self {
        Self { config }
    }

    /// Detect tables among the units.
    ///
    /// Returns the detected tables and the units that are not part of any table.
    pub fn detect(&self, units: Vec<TextUnit>) -> (Vec<DetectedTable>, Vec<TextUnit>) {
        let min_units = self.config.min_rows * self.config.min_columns;
        if units.len() < min_units {
            log::debug!("tables: not enough units ({} < {})", units.len(), min_units);
            return (vec![], units);
        }

        let rows = self.group_into_rows(&units);
        if rows.len() < self.config.min_rows {
            log::debug!("tables: not enough rows ({})", rows.len());
            return (vec![], units);
        }

        let columns = self.detect_columns(&rows);
        log::debug!("tables: column starts {:?}", columns);
        if columns.len() < self.config.min_columns {
            return (vec![], units);
        }

        let regions = self.find_table_regions(&rows, &columns);
        if regions.is_empty() {
            return (vec![], units);
        }

        let mut detected = Vec::new();
        let mut used: HashSet<LineId> = HashSet::new();

        for (start, end) in regions {
            let table_rows = rows[start..=end].to_vec();

            // Columns of this region alone
            let table_columns = self.detect_columns(&table_rows);
            if table_columns.len() < self.config.min_columns {
                continue;
            }
            if table_columns.len() > self.config.max_columns {
                log::debug!(
                    "tables: skipping region with {} columns",
                    table_columns.len()
                );
                continue;
            }
            if self.is_list_pattern(&table_rows, &table_columns) {
                log::debug!("tables: skipping region that is a list");
                continue;
            }

            let all = table_rows.iter().flat_map(|r| r.units.iter());
            let left = all.clone().map(TextUnit::x).fold(f32::INFINITY, f32::min);
            let right = all.clone().map(|u| u.bbox.x1).fold(f32::NEG_INFINITY, f32::max);
            used.extend(all.map(|u| u.id));

            detected.push(DetectedTable {
                top: table_rows.first().map_or(0.0, |r| r.y),
                bottom: table_rows.last().map_or(0.0, |r| r.y),
                left,
                right,
                columns: table_columns,
                rows: table_rows,
            });
        }

        let remaining = units.into_iter().filter(|u| !used.contains(&u.id)).collect();
        (detected, remaining)
    }

    /// Group units into rows by top edge, top to bottom.
    fn group_into_rows(&self, units: &[TextUnit]) -> Vec<TableRowData> {
        let mut sorted = units.to_vec();
        sorted.sort_by(|a, b| a.y().total_cmp(&b.y()).then(a.x().total_cmp(&b.x())));

        let mut rows: Vec<TableRowData> = Vec::new();
        let mut current: Vec<TextUnit> = Vec::new();
        let mut current_y: Option<f32> = None;

        for unit in sorted {
            let tolerance = unit.size * self.config.y_tolerance_factor;
            match current_y {
                Some(y) if (unit.y() - y).abs() <= tolerance => current.push(unit),
                _ => {
                    if !current.is_empty() {
                        rows.push(Self::make_row(std::mem::take(&mut current)));
                    }
                    current_y = Some(unit.y());
                    current.push(unit);
                }
            }
        }
        if !current.is_empty() {
            rows.push(Self::make_row(current));
        }
        rows
    }

    fn make_row(mut units: Vec<TextUnit>) -> TableRowData {
        units.sort_by(|a, b| a.x().total_cmp(&b.x()));
        let y = units.iter().map(TextUnit::y).sum::<f32>() / units.len() as f32;
        TableRowData { y, units }
    }

    /// Column starts: left edges recurring across rows with two or more units.
    ///
    /// Falls back to counting every row when too few rows have several units.
    fn detect_columns(&self, rows: &[TableRowData]) -> Vec<f32> {
        let multi: Vec<&TableRowData> = rows.iter().filter(|r| r.units.len() >= 2).collect();

        let (sample, per_row_once): (Vec<&TableRowData>, bool) =
            if multi.len() >= self.config.min_rows {
                (multi, true)
            } else {
                (rows.iter().collect(), false)
            };
        if sample.is_empty() {
            return vec![];
        }

        let mut edge_counts: HashMap<i32, usize> = HashMap::new();
        for row in &sample {
            let buckets = row
                .units
                .iter()
                .map(|u| (u.x() / self.config.bucket_size).round() as i32);
            if per_row_once {
                for bucket in buckets.collect::<HashSet<_>>() {
                    *edge_counts.entry(bucket).or_insert(0) += 1;
                }
            } else {
                for bucket in buckets {
                    *edge_counts.entry(bucket).or_insert(0) += 1;
                }
            }
        }

        let min_occurrences =
            ((sample.len() as f32 * self.config.min_alignment_ratio) as usize).max(2);

        let mut edges: Vec<f32> = edge_counts
            .iter()
            .filter(|(_, count)| **count >= min_occurrences)
            .map(|(bucket, _)| *bucket as f32 * self.config.bucket_size)
            .collect();
        edges.sort_by(f32::total_cmp);

        let mut merged: Vec<f32> = Vec::new();
        for edge in edges {
            if merged
                .last()
                .map_or(true, |last| edge - last >= self.config.min_column_gap)
            {
                merged.push(edge);
            }
        }
        merged
    }

    /// Contiguous row ranges whose alignment score reaches the threshold.
    fn find_table_regions(&self, rows: &[TableRowData], columns: &[f32]) -> Vec<(usize, usize)> {
        let mut regions = Vec::new();
        let mut start: Option<usize> = None;

        for (i, row) in rows.iter().enumerate() {
            if self.alignment_score(row, columns) >= self.config.min_alignment_ratio {
                start.get_or_insert(i);
            } else if let Some(s) = start.take() {
                if i - s >= self.config.min_rows {
                    regions.push((s, i - 1));
                }
            }
        }
        if let Some(s) = start {
            if rows.len() - s >= self.config.min_rows {
                regions.push((s, rows.len() - 1));
            }
        }
        regions
    }

    /// Fraction of the row's units starting at a column.
    fn alignment_score(&self, row: &TableRowData, columns: &[f32]) -> f32 {
        if row.units.is_empty() || columns.is_empty() {
            return 0.0;
        }
        let aligned = row
            .units
            .iter()
            .filter(|u| {
                columns
                    .iter()
                    .any(|c| (u.x() - c).abs() <= self.config.alignment_tolerance)
            })
            .count();
        aligned as f32 / row.units.len() as f32
    }

    /// Whether the rows are really a bulleted or numbered list split into marker and text.
    fn is_list_pattern(&self, rows: &[TableRowData], columns: &[f32]) -> bool {
        if columns.len() < 2 || rows.is_empty() {
            return false;
        }

        let mut bullets = 0;
        let mut numbers = 0;
        for row in rows {
            if let Some(first) = row.units.first() {
                let text = first.text.trim();
                if is_bullet_marker(text) {
                    bullets += 1;
                } else if is_number_marker(text) {
                    numbers += 1;
                }
            }
        }

        let bullet_ratio = bullets as f32 / rows.len() as f32;
        let marker_ratio = (bullets + numbers) as f32 / rows.len() as f32;

        // Numbered first columns are common in real tables; only two-column ones are rejected
        bullet_ratio >= 0.5 || (columns.len() == 2 && marker_ratio >= 0.5)
    }

    /// Build a document table. Bold units stay bold.
    pub fn to_table(&self, detected: &DetectedTable) -> Table {
        let columns = &detected.columns;

        let rows = detected
            .rows
            .iter()
            .map(|row| {
                let mut contents: Vec<Vec<&TextUnit>> = vec![Vec::new(); columns.len()];
                for unit in &row.units {
                    let idx = column_for(unit.x(), columns, detected.right);
                    contents[idx].push(unit);
                }
                let cells = contents
                    .into_iter()
                    .map(|units| {
                        let mut paragraph = Paragraph::new();
                        for (i, unit) in units.iter().enumerate() {
                            if i > 0 {
                                paragraph.add_text(" ");
                            }
                            let text = unit.text.trim().to_string();
                            paragraph.add_run(if unit.bold {
                                Run::bold(text)
                            } else {
                                Run::text(text)
                            });
                        }
                        TableCell::new(vec![paragraph])
                    })
                    .collect();
                TableRow::new(cells)
            })
            .collect();

        let column_widths = (0..columns.len())
            .map(|i| {
                let end = columns.get(i + 1).copied().unwrap_or(detected.right);
                points_to_twips((end - columns[i]).max(1.0))
            })
            .collect();

        Table {
            column_widths,
            ..Table::new(rows)
        }
    }
}

/// Column whose range holds `x`, allowing units to start up to 10pt early; else the nearest start.
fn column_for(x: f32, columns: &[f32], right: f32) -> usize {
    for (i, start) in columns.iter().enumerate() {
        let end = columns.get(i + 1).copied().unwrap_or(right + 100.0);
        if x >= start - 10.0 && x < end - 10.0 {
            return i;
        }
    }
    columns
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (x - **a).abs().total_cmp(&(x - **b).abs()))
        .map_or(0, |(i, _)| i)
}

/// Bullet glyph on its own (•, -, etc.).
fn is_bullet_marker(text: &str) -> bool {
    matches!(
        text.trim(),
        "-" | "–" | "—" | "•" | "·" | "*" | "○" | "▪" | "◦" | "▸" | "▹" | "►" | "■" | "●" | "※"
            | "□" | "◆" | "◇" | "▶" | "▷" | "☞" | "➤" | "➜"
    )
}

/// Number-style marker on its own (1., 2), a., a bare number).
fn is_number_marker(text: &str) -> bool {
    let cleaned: String = text.trim().chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return false;
    }

    if let Some(pos) = cleaned.find(|c: char| !c.is_ascii_digit()) {
        let (digits, suffix) = cleaned.split_at(pos);
        if !digits.is_empty() && (suffix == "." || suffix == ")") {
            return true;
        }
    }
    if cleaned.parse::<u32>().is_ok() {
        return true;
    }

    let chars: Vec<char> = cleaned.chars().collect();
    chars.len() == 2 && chars[0].is_alphabetic() && (chars[1] == '.' || chars[1] == ')')
}
