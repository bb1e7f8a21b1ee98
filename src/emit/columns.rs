//! Column grid: block assignment and the borderless layout table.

use crate::config::HeuristicConfig;
use crate::docx::{inches_to_twips, Border, Paragraph, Table, TableCell, TableRow};
use crate::layout::ColumnSpec;
use crate::model::Rect;

/// Column index of each block.
///
/// A block goes to the first column that fully contains it, then to the first column containing
/// its horizontal center, then to the column whose center is nearest.
pub fn assign_to_columns(bboxes: &[Rect], columns: &[ColumnSpec]) -> Vec<usize> {
    bboxes
        .iter()
        .map(|bbox| {
            columns
                .iter()
                .position(|c| c.contains_rect(bbox))
                .or_else(|| columns.iter().position(|c| c.contains_x(bbox.center_x())))
                .unwrap_or_else(|| nearest_column(bbox.center_x(), columns))
        })
        .collect()
}

fn nearest_column(x: f32, columns: &[ColumnSpec]) -> usize {
    columns
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (a.center() - x).abs().total_cmp(&(b.center() - x).abs()))
        .map_or(0, |(i, _)| i)
}

/// Cell widths in twips: width ratios clamped to [0.1, 0.9], renormalized, over the content width.
pub fn column_widths(columns: &[ColumnSpec], config: &HeuristicConfig) -> Vec<u32> {
    let ratios: Vec<f32> = columns
        .iter()
        .map(|c| c.width_ratio.clamp(0.1, 0.9))
        .collect();
    let total: f32 = ratios.iter().sum();
    let content = inches_to_twips(config.content_width_inches) as f32;

    ratios
        .iter()
        .map(|r| {
            let share = if total > 0.0 {
                r / total
            } else {
                1.0 / columns.len() as f32
            };
            (share * content).round() as u32
        })
        .collect()
}

/// A single-row borderless table with one cell per column.
pub fn column_table(
    cells: Vec<Vec<Paragraph>>,
    columns: &[ColumnSpec],
    config: &HeuristicConfig,
) -> Table {
    let widths = column_widths(columns, config);
    let margin = config.column_cell_margin;

    let cells = cells
        .into_iter()
        .zip(&widths)
        .map(|(paragraphs, width)| TableCell {
            width: Some(*width),
            margin: Some(margin),
            borders: Some(Border::nil()),
            ..TableCell::new(paragraphs)
        })
        .collect();

    Table {
        column_widths: widths,
        borders: Some(Border::nil()),
        cell_margin: Some(margin),
        ..Table::new(vec![TableRow::new(cells)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec {
                left: 0.0,
                right: 200.0,
                width_ratio: 200.0 / 612.0,
            },
            ColumnSpec {
                left: 200.0,
                right: 612.0,
                width_ratio: 412.0 / 612.0,
            },
        ]
    }

    #[test]
    fn test_assignment_order() {
        let columns = two_columns();
        let bboxes = [
            Rect::new(20.0, 0.0, 180.0, 10.0),  // contained in 0
            Rect::new(150.0, 0.0, 230.0, 10.0), // center 190 in 0
            Rect::new(190.0, 0.0, 400.0, 10.0), // center 295 in 1
            Rect::new(620.0, 0.0, 700.0, 10.0), // off page, nearest 1
        ];
        assert_eq!(assign_to_columns(&bboxes, &columns), vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_widths_sum_to_content_width() {
        let config = HeuristicConfig::default();
        let widths = column_widths(&two_columns(), &config);
        assert_eq!(widths.len(), 2);
        let total: u32 = widths.iter().sum();
        assert!((total as i64 - 9360).abs() <= 1);
        assert!(widths[1] > widths[0]);
    }

    #[test]
    fn test_extreme_ratios_are_clamped() {
        let config = HeuristicConfig::default();
        let columns = vec![
            ColumnSpec {
                left: 0.0,
                right: 10.0,
                width_ratio: 0.02,
            },
            ColumnSpec {
                left: 10.0,
                right: 612.0,
                width_ratio: 0.98,
            },
        ];
        let widths = column_widths(&columns, &config);
        assert_eq!(widths, vec![936, 8424]);
    }

    #[test]
    fn test_table_is_borderless() {
        let config = HeuristicConfig::default();
        let table = column_table(
            vec![vec![Paragraph::with_text("a")], vec![Paragraph::with_text("b")]],
            &two_columns(),
            &config,
        );
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.column_count(), 2);
        assert!(table.borders.as_ref().is_some_and(Border::is_nil));
        assert!(table.cells().all(|c| c.borders.as_ref().is_some_and(Border::is_nil)));
        assert_eq!(table.cell_margin, Some(60));
    }
}
