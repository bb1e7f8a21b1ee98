//! Benchmarks for pdfdocx layout analysis and emission.
//!
//! Run with: cargo bench
//!
//! These benchmarks run on synthetic pages so they measure the heuristics, not PDF parsing.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pdfdocx::docx::{to_bytes, WordDocument};
use pdfdocx::emit::DocumentEmitter;
use pdfdocx::layout::{combine_layouts, detect_columns, LayoutAnalyzer};
use pdfdocx::model::{Line, PageBlock, PageContent, Rect, Span, TextBlock};
use pdfdocx::HeuristicConfig;

/// A page with `rows` paragraphs in each of `columns` columns and a heading per column.
fn create_test_page(columns: usize, rows: usize) -> PageContent {
    let mut page = PageContent::new(0, 612.0, 792.0);
    let column_width = 540.0 / columns as f32;

    for c in 0..columns {
        let x0 = 36.0 + c as f32 * column_width;
        let x1 = x0 + column_width - 24.0;
        page.blocks.push(block(&format!("SECTION {}", c + 1), "Helvetica-Bold", 16.0, x0, 40.0, x1));
        for r in 0..rows {
            let y = 80.0 + r as f32 * 22.0;
            let text = if r % 5 == 0 {
                format!("• Item {} in column {}", r, c)
            } else {
                format!("Body text of row {} with a few more words to measure.", r)
            };
            page.blocks.push(block(&text, "Helvetica", 10.0, x0, y, x1));
        }
    }
    page
}

fn block(text: &str, font: &str, size: f32, x0: f32, y0: f32, x1: f32) -> PageBlock {
    PageBlock::Text(TextBlock::new(vec![Line::from_spans(vec![Span::new(
        text,
        font,
        size,
        Rect::new(x0, y0, x1, y0 + size),
    )])]))
}

/// Benchmark the column strategies alone.
fn bench_column_detection(c: &mut Criterion) {
    let config = HeuristicConfig::default();
    let mut group = c.benchmark_group("column_detection");

    for columns in [1, 2, 3] {
        let page = create_test_page(columns, 30);
        let rects: Vec<Rect> = page.text_blocks().map(|b| b.bbox).collect();

        group.bench_function(format!("{}_columns", columns), |b| {
            b.iter(|| detect_columns(black_box(&rects), 612.0, 792.0, &config));
        });
    }

    group.finish();
}

/// Benchmark full page analysis.
fn bench_page_analysis(c: &mut Criterion) {
    let analyzer = LayoutAnalyzer::default();
    let config = HeuristicConfig::default();
    let page = create_test_page(2, 30);

    c.bench_function("analyze_page", |b| {
        b.iter(|| analyzer.analyze(black_box(&page)));
    });

    let layouts: Vec<_> = (0..3).map(|_| analyzer.analyze(&page)).collect();
    c.bench_function("combine_layouts", |b| {
        b.iter(|| combine_layouts(black_box(&layouts), &config));
    });
}

/// Benchmark emission and serialization of an analyzed page.
fn bench_emission(c: &mut Criterion) {
    let config = HeuristicConfig::default();
    let analyzer = LayoutAnalyzer::default();
    let page = create_test_page(2, 30);
    let layout = analyzer.analyze(&page);
    let document = combine_layouts(std::slice::from_ref(&layout), &config);
    let dir = std::env::temp_dir();

    c.bench_function("emit_and_serialize", |b| {
        b.iter(|| {
            let emitter = DocumentEmitter::new(&config, &dir);
            let mut doc = WordDocument::default();
            let mut diagnostics = Vec::new();
            emitter.emit_page(&mut doc, black_box(&page), &layout, &document, &mut diagnostics);
            to_bytes(&doc).unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_column_detection,
    bench_page_analysis,
    bench_emission,
);
criterion_main!(benches);
