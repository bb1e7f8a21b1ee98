//! Grouping of positioned spans into lines and blocks.

use crate::config::HeuristicConfig;
use crate::model::{ImageBlock, Line, PageBlock, Span, TextBlock};

/// Group spans into lines.
///
/// Spans whose baselines lie within `line_baseline_tolerance × size` of a row's first span
/// share the row; a row is split where the horizontal gap between neighbours exceeds
/// `line_split_gap × size`. Each returned line carries the smallest sequence number of its spans.
pub fn group_spans_into_lines(
    spans: Vec<(usize, Span)>,
    config: &HeuristicConfig,
) -> Vec<(usize, Line)> {
    if spans.is_empty() {
        return vec![];
    }

    let mut spans = spans;
    spans.sort_by(|(_, a), (_, b)| {
        a.baseline()
            .total_cmp(&b.baseline())
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut rows: Vec<Vec<(usize, Span)>> = Vec::new();
    let mut row_baseline: Option<f32> = None;

    for (seq, span) in spans {
        let tolerance = span.size * config.line_baseline_tolerance;
        match row_baseline {
            Some(baseline) if (span.baseline() - baseline).abs() <= tolerance => {
                if let Some(row) = rows.last_mut() {
                    row.push((seq, span));
                }
            }
            _ => {
                row_baseline = Some(span.baseline());
                rows.push(vec![(seq, span)]);
            }
        }
    }

    let mut lines = Vec::new();
    for mut row in rows {
        row.sort_by(|(_, a), (_, b)| a.bbox.x0.total_cmp(&b.bbox.x0));

        let mut current: Vec<(usize, Span)> = Vec::new();
        for (seq, span) in row {
            if let Some((_, prev)) = current.last() {
                let gap = span.bbox.x0 - prev.bbox.x1;
                if gap > config.line_split_gap * prev.size.max(span.size) {
                    lines.push(finish_line(std::mem::take(&mut current)));
                }
            }
            current.push((seq, span));
        }
        if !current.is_empty() {
            lines.push(finish_line(current));
        }
    }

    lines
}

fn finish_line(spans: Vec<(usize, Span)>) -> (usize, Line) {
    let seq = spans.iter().map(|(s, _)| *s).min().unwrap_or(0);
    (seq, Line::from_spans(spans.into_iter().map(|(_, s)| s).collect()))
}

/// Group lines into blocks.
///
/// Lines are visited top to bottom; a line joins the most recent open block whose last line
/// is vertically close (`block_line_gap × size`), overlaps it horizontally and has a font size
/// within `block_font_size_delta`. Otherwise it opens a new block.
pub fn group_lines_into_blocks(
    lines: Vec<(usize, Line)>,
    config: &HeuristicConfig,
) -> Vec<(usize, TextBlock)> {
    let mut lines = lines;
    lines.sort_by(|(_, a), (_, b)| {
        a.bbox
            .y0
            .total_cmp(&b.bbox.y0)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut groups: Vec<(usize, Vec<Line>)> = Vec::new();

    for (seq, line) in lines {
        let size = line.max_size();
        let target = groups.iter_mut().rev().find(|(_, group)| {
            let Some(last) = group.last() else {
                return false;
            };
            let gap = line.bbox.y0 - last.bbox.y1;
            let limit = config.block_line_gap * size.max(last.max_size());
            gap < limit
                && gap > -size
                && line.bbox.horizontal_overlap(&last.bbox) > 0.0
                && (last.max_size() - size).abs() <= config.block_font_size_delta
        });

        match target {
            Some((group_seq, group)) => {
                *group_seq = (*group_seq).min(seq);
                group.push(line);
            }
            None => groups.push((seq, vec![line])),
        }
    }

    groups
        .into_iter()
        .map(|(seq, group)| (seq, TextBlock::new(group)))
        .collect()
}

/// Merge text blocks and images into native stream order.
pub fn order_blocks(
    text_blocks: Vec<(usize, TextBlock)>,
    images: Vec<(usize, ImageBlock)>,
) -> Vec<PageBlock> {
    let mut all: Vec<(usize, PageBlock)> = text_blocks
        .into_iter()
        .map(|(seq, b)| (seq, PageBlock::Text(b)))
        .chain(images.into_iter().map(|(seq, i)| (seq, PageBlock::Image(i))))
        .collect();
    all.sort_by_key(|(seq, _)| *seq);
    all.into_iter().map(|(_, b)| b).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ImageData, ImageFormat, Rect};

    fn span(seq: usize, text: &str, x0: f32, baseline: f32, size: f32) -> (usize, Span) {
        let width = text.chars().count() as f32 * size * 0.5;
        (
            seq,
            Span::new(
                text,
                "Helvetica",
                size,
                Rect::new(x0, baseline - size * 0.8, x0 + width, baseline + size * 0.2),
            ),
        )
    }

    #[test]
    fn test_spans_on_one_baseline_form_a_line() {
        let config = HeuristicConfig::default();
        let lines = group_spans_into_lines(
            vec![
                span(2, "World", 110.0, 100.5, 12.0),
                span(1, "Hello", 72.0, 100.0, 12.0),
            ],
            &config,
        );
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, 1);
        assert_eq!(lines[0].1.text(), "Hello World");
    }

    #[test]
    fn test_wide_gap_splits_line() {
        let config = HeuristicConfig::default();
        let lines = group_spans_into_lines(
            vec![
                span(1, "Left", 72.0, 100.0, 12.0),
                span(2, "Right", 330.0, 100.0, 12.0),
            ],
            &config,
        );
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_lines_group_into_blocks() {
        let config = HeuristicConfig::default();
        let lines = group_spans_into_lines(
            vec![
                span(1, "First line of text", 72.0, 100.0, 10.0),
                span(2, "second line", 72.0, 112.0, 10.0),
                // Large gap: new block
                span(3, "Next paragraph", 72.0, 160.0, 10.0),
                // Size change: new block
                span(4, "Big", 72.0, 172.0, 18.0),
            ],
            &config,
        );
        let blocks = group_lines_into_blocks(lines, &config);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].1.text(), "First line of text second line");
        assert_eq!(blocks[1].1.text(), "Next paragraph");
        assert_eq!(blocks[2].1.text(), "Big");
    }

    #[test]
    fn test_side_by_side_blocks_stay_apart() {
        let config = HeuristicConfig::default();
        let lines = group_spans_into_lines(
            vec![
                span(1, "Left column", 72.0, 100.0, 10.0),
                span(2, "Left again", 72.0, 112.0, 10.0),
                span(3, "Right column", 320.0, 100.0, 10.0),
                span(4, "Right again", 320.0, 112.0, 10.0),
            ],
            &config,
        );
        let blocks = group_lines_into_blocks(lines, &config);
        assert_eq!(blocks.len(), 2);

        let ordered = order_blocks(blocks, vec![]);
        let texts: Vec<String> = ordered
            .iter()
            .filter_map(PageBlock::as_text)
            .map(TextBlock::text)
            .collect();
        assert_eq!(texts, vec!["Left column Left again", "Right column Right again"]);
    }

    #[test]
    fn test_images_interleave_by_sequence() {
        let image = ImageBlock {
            bbox: Rect::new(0.0, 0.0, 10.0, 10.0),
            data: ImageData::Encoded {
                format: ImageFormat::Png,
                bytes: vec![],
            },
        };
        let ordered = order_blocks(
            vec![(1, TextBlock::default()), (5, TextBlock::default())],
            vec![(3, image)],
        );
        assert!(matches!(ordered[1], PageBlock::Image(_)));
        assert_eq!(ordered.len(), 3);
    }
}
