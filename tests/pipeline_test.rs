//! End-to-end tests: PDFs built with lopdf are converted and the produced packages read back.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use pdfdocx::docx::{Paragraph, Section, Table, TableCell, TableRow, WordDocument};
use pdfdocx::layout::{DocumentLayout, LayoutPattern, PageLayout};
use pdfdocx::strategy::{EngineContext, EngineOutput};
use pdfdocx::{
    ConversionEngine, ConvertOptions, Converter, DiagnosticKind, Error, HeuristicConfig,
    MemoryPatternStore, PageAnalysis, PageContent, PageSource, PatternStore, Result, TargetFormat,
};

const PAGE_HEIGHT: f32 = 792.0;
const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// A line of text placed with its baseline `y` points below the top of the page.
struct Text {
    text: &'static str,
    bold: bool,
    size: f32,
    x: f32,
    y: f32,
}

fn regular(text: &'static str, x: f32, y: f32) -> Text {
    Text {
        text,
        bold: false,
        size: 11.0,
        x,
        y,
    }
}

fn build_pdf(pages: &[Vec<Text>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let helvetica = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let helvetica_bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });

    let mut kids: Vec<Object> = Vec::new();
    for texts in pages {
        let mut operations = Vec::new();
        for t in texts {
            let font = if t.bold { "F2" } else { "F1" };
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec![font.into(), t.size.into()]));
            operations.push(Operation::new(
                "Tm",
                vec![
                    1.0f32.into(),
                    0.0f32.into(),
                    0.0f32.into(),
                    1.0f32.into(),
                    t.x.into(),
                    (PAGE_HEIGHT - t.y).into(),
                ],
            ));
            operations.push(Operation::new("Tj", vec![Object::string_literal(t.text)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! {
                    "F1" => helvetica,
                    "F2" => helvetica_bold,
                },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn write_pdf(dir: &Path, name: &str, pages: &[Vec<Text>]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, build_pdf(pages)).unwrap();
    path
}

fn article() -> Vec<Vec<Text>> {
    vec![vec![
        Text {
            text: "Project Overview",
            bold: true,
            size: 18.0,
            x: 72.0,
            y: 150.0,
        },
        regular("The quick brown fox", 72.0, 200.0),
        regular("jumps over the dog.", 72.0, 230.0),
        regular("- First point", 72.0, 280.0),
        regular("- Second point", 72.0, 294.0),
    ]]
}

fn read_part(path: &Path, name: &str) -> String {
    let file = fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut xml = String::new();
    archive.by_name(name).unwrap().read_to_string(&mut xml).unwrap();
    xml
}

/// (style, text) of every body paragraph, tables included.
fn paragraphs(xml: &str) -> Vec<(Option<String>, String)> {
    let doc = roxmltree::Document::parse(xml).unwrap();
    doc.descendants()
        .filter(|n| n.has_tag_name((W_NS, "p")))
        .map(|p| {
            let style = p
                .descendants()
                .find(|n| n.has_tag_name((W_NS, "pStyle")))
                .and_then(|n| n.attribute((W_NS, "val")))
                .map(str::to_string);
            let text: String = p
                .descendants()
                .filter(|n| n.has_tag_name((W_NS, "t")))
                .filter_map(|n| n.text())
                .collect();
            (style, text)
        })
        .collect()
}

fn table_count(xml: &str) -> usize {
    let doc = roxmltree::Document::parse(xml).unwrap();
    doc.descendants()
        .filter(|n| n.has_tag_name((W_NS, "tbl")))
        .count()
}

/// Emits one body paragraph, optional headings and, when asked to, an empty table.
struct FixedEngine {
    name: &'static str,
    text: String,
    headings: usize,
    blank_table: bool,
}

impl FixedEngine {
    fn new(name: &'static str, text: impl Into<String>) -> Self {
        Self {
            name,
            text: text.into(),
            headings: 0,
            blank_table: false,
        }
    }
}

impl ConversionEngine for FixedEngine {
    fn name(&self) -> &str {
        self.name
    }

    fn convert(&self, _pages: &dyn PageSource, _ctx: &EngineContext) -> Result<EngineOutput> {
        let mut section = Section::for_page(612.0, 792.0, 0.5);
        for i in 0..self.headings {
            section.push_paragraph(Paragraph::with_text(format!("Part {}", i + 1)).styled("Heading1"));
        }
        section.push_paragraph(Paragraph::with_text(self.text.clone()));
        if self.blank_table {
            section.push_table(Table::new(vec![TableRow::new(vec![
                TableCell::with_text(""),
                TableCell::with_text("  "),
            ])]));
        }
        let mut document = WordDocument::default();
        document.add_section(section);
        Ok(EngineOutput {
            document,
            layout: DocumentLayout::default(),
            diagnostics: Vec::new(),
        })
    }
}

struct BrokenEngine;

impl ConversionEngine for BrokenEngine {
    fn name(&self) -> &str {
        "broken"
    }

    fn convert(&self, _pages: &dyn PageSource, _ctx: &EngineContext) -> Result<EngineOutput> {
        Err(Error::Other("engine exploded".to_string()))
    }
}

struct FailingAnalyzer;

impl PageAnalysis for FailingAnalyzer {
    fn analyze_page(&self, page: &PageContent) -> Result<PageLayout> {
        Err(Error::Other(format!("no layout for page {}", page.index)))
    }
}

/// Store whose reads always fail.
struct UnreadableStore {
    saves: Mutex<usize>,
}

impl PatternStore for UnreadableStore {
    fn load_patterns(&self) -> Result<Vec<LayoutPattern>> {
        Err(Error::Other("pattern database is locked".to_string()))
    }

    fn save_patterns(&self, _patterns: &[LayoutPattern]) -> Result<()> {
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }
}

#[test]
fn test_docx_structure() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(dir.path(), "article.pdf", &article());
    let output = dir.path().join("article.docx");

    let report = Converter::new().convert_file(&input, &output).unwrap();
    assert_eq!(report.page_count, 1);
    assert_eq!(report.target, TargetFormat::Docx);
    assert_eq!(report.engine.as_deref(), Some("layout"));
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);

    let paragraphs = paragraphs(&read_part(&output, "word/document.xml"));
    let heading = paragraphs
        .iter()
        .find(|(_, text)| text == "Project Overview")
        .expect("heading paragraph");
    assert_eq!(heading.0.as_deref(), Some("Heading1"));

    // The broken sentence is rejoined into a single paragraph.
    assert!(paragraphs
        .iter()
        .any(|(_, text)| text == "The quick brown fox jumps over the dog."));
    assert!(!paragraphs.iter().any(|(_, text)| text == "jumps over the dog."));

    let bullets: Vec<&str> = paragraphs
        .iter()
        .filter(|(style, _)| style.as_deref() == Some("ListBullet"))
        .map(|(_, text)| text.as_str())
        .collect();
    assert_eq!(bullets, vec!["First point", "Second point"]);
}

#[test]
fn test_docx_package_parts() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(dir.path(), "article.pdf", &article());
    let output = dir.path().join("article.docx");
    assert!(pdfdocx::convert(&input, &output, TargetFormat::Docx));

    let file = fs::File::open(&output).unwrap();
    let archive = zip::ZipArchive::new(file).unwrap();
    let names: Vec<&str> = archive.file_names().collect();
    for part in [
        "[Content_Types].xml",
        "_rels/.rels",
        "word/document.xml",
        "word/styles.xml",
        "word/_rels/document.xml.rels",
    ] {
        assert!(names.contains(&part), "missing {}", part);
    }
}

#[test]
fn test_text_target_joins_pages() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(
        dir.path(),
        "two.pdf",
        &[
            vec![regular("Alpha page text.", 72.0, 100.0)],
            vec![regular("Beta page text.", 72.0, 100.0)],
        ],
    );
    let output = dir.path().join("two.txt");

    let report = Converter::new()
        .with_options(ConvertOptions::new().with_target(TargetFormat::Txt))
        .convert_file(&input, &output)
        .unwrap();
    assert_eq!(report.page_count, 2);
    assert!(report.engine.is_none());

    let text = fs::read_to_string(&output).unwrap();
    assert_eq!(text, "Alpha page text.\n\nBeta page text.");
    assert_eq!(pdfdocx::extract_text(&input).unwrap(), text);
}

#[test]
fn test_scratch_files_removed() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let input = write_pdf(dir.path(), "article.pdf", &article());
    let output = dir.path().join("article.docx");

    let heuristics = HeuristicConfig {
        complex_page_count: 0,
        ..HeuristicConfig::default()
    };
    let report = Converter::new()
        .with_options(
            ConvertOptions::new()
                .with_heuristics(heuristics)
                .with_temp_dir(scratch.path()),
        )
        .convert_file(&input, &output)
        .unwrap();

    // Complex documents race both engines through candidate files.
    assert_eq!(report.scores.len(), 2);
    assert!(output.exists());
    assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[test]
fn test_race_picks_higher_score() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(dir.path(), "article.pdf", &article());
    let output = dir.path().join("article.docx");

    let heuristics = HeuristicConfig {
        complex_page_count: 0,
        ..HeuristicConfig::default()
    };
    let mut converter = Converter::new()
        .with_options(ConvertOptions::new().with_heuristics(heuristics))
        .with_challenger(Arc::new(FixedEngine {
            headings: 1,
            ..FixedEngine::new("verbose", "The challenger keeps every paragraph. ".repeat(30))
        }));
    // 5 + 2 = 7 against 10 + 2 = 12
    converter.registry_mut().set_standard(Arc::new(FixedEngine {
        headings: 1,
        ..FixedEngine::new("terse", "Short. ".repeat(80))
    }));

    let report = converter.convert_file(&input, &output).unwrap();
    assert_eq!(report.engine.as_deref(), Some("verbose"));
    let engines: Vec<&str> = report.scores.iter().map(|s| s.engine.as_str()).collect();
    assert_eq!(engines, vec!["terse", "verbose"]);
    let scores: Vec<u32> = report.scores.iter().map(|s| s.score).collect();
    assert_eq!(scores, vec![7, 12]);

    let paragraphs = paragraphs(&read_part(&output, "word/document.xml"));
    assert!(paragraphs
        .iter()
        .any(|(_, t)| t.starts_with("The challenger keeps every paragraph.")));
    assert!(!paragraphs.iter().any(|(_, t)| t.starts_with("Short.")));
}

#[test]
fn test_race_disabled_uses_standard() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(dir.path(), "article.pdf", &article());
    let output = dir.path().join("article.docx");

    let heuristics = HeuristicConfig {
        complex_page_count: 0,
        ..HeuristicConfig::default()
    };
    let report = Converter::new()
        .with_options(
            ConvertOptions::new()
                .with_heuristics(heuristics)
                .without_race(),
        )
        .with_challenger(Arc::new(BrokenEngine))
        .convert_file(&input, &output)
        .unwrap();

    assert_eq!(report.engine.as_deref(), Some("layout"));
    assert!(report.scores.len() <= 1);
}

#[test]
fn test_empty_tables_removed_before_save() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(dir.path(), "article.pdf", &article());
    let output = dir.path().join("article.docx");

    let mut converter = Converter::new();
    converter.registry_mut().set_standard(Arc::new(FixedEngine {
        blank_table: true,
        ..FixedEngine::new("tabular", "Summary.")
    }));
    converter.convert_file(&input, &output).unwrap();

    let xml = read_part(&output, "word/document.xml");
    assert_eq!(table_count(&xml), 0);
    assert!(paragraphs(&xml).iter().any(|(_, t)| t == "Summary."));
}

#[test]
fn test_failed_conversion_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(dir.path(), "article.pdf", &article());
    let output = dir.path().join("article.docx");

    let mut converter = Converter::new();
    converter.registry_mut().set_standard(Arc::new(BrokenEngine));
    let result = converter.convert_file(&input, &output);

    assert!(matches!(result, Err(Error::ConversionFailed(_))));
    assert!(!output.exists());
    assert!(!pdfdocx::convert(dir.path().join("missing.pdf"), &output, TargetFormat::Docx));
    assert!(!output.exists());
}

#[test]
fn test_analysis_failure_degrades() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(dir.path(), "article.pdf", &article());
    let output = dir.path().join("article.docx");

    let report = Converter::new()
        .with_analyzer(Arc::new(FailingAnalyzer))
        .convert_file(&input, &output)
        .unwrap();

    assert!(report.is_degraded());
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::Analysis && d.page == Some(0)));

    let paragraphs = paragraphs(&read_part(&output, "word/document.xml"));
    assert!(paragraphs.iter().any(|(_, t)| t.contains("Project Overview")));
    assert!(paragraphs.iter().any(|(_, t)| t.contains("Second point")));
}

#[test]
fn test_pattern_store_reinforced() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(dir.path(), "article.pdf", &article());
    let store = Arc::new(MemoryPatternStore::new());
    let converter = Converter::new().with_pattern_store(store.clone());

    converter
        .convert_file(&input, dir.path().join("first.docx"))
        .unwrap();
    converter
        .convert_file(&input, dir.path().join("second.docx"))
        .unwrap();

    let patterns = store.patterns();
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].occurrences, 2);
}

#[test]
fn test_pattern_store_failure_is_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(dir.path(), "article.pdf", &article());
    let output = dir.path().join("article.docx");
    let store = Arc::new(UnreadableStore {
        saves: Mutex::new(0),
    });

    let report = Converter::new()
        .with_pattern_store(store.clone())
        .convert_file(&input, &output)
        .unwrap();

    assert!(output.exists());
    assert_eq!(*store.saves.lock().unwrap(), 0);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::PatternStore && d.page.is_none()));
}

#[test]
fn test_conversion_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(dir.path(), "article.pdf", &article());
    let first = dir.path().join("first.docx");
    let second = dir.path().join("second.docx");

    let converter = Converter::new();
    converter.convert_file(&input, &first).unwrap();
    converter.convert_file(&input, &second).unwrap();

    assert_eq!(
        read_part(&first, "word/document.xml"),
        read_part(&second, "word/document.xml")
    );
}

#[test]
fn test_analyze_file_reports_layout() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(dir.path(), "article.pdf", &article());

    let analysis = pdfdocx::analyze_file(&input).unwrap();
    assert_eq!(analysis.page_count, 1);
    assert_eq!(analysis.pages.len(), 1);
    assert!((analysis.document.body_font_size - 11.0).abs() < 0.5);

    let json = serde_json::to_value(&analysis).unwrap();
    assert!(json.get("profile").is_some());
    assert!(json.get("document").is_some());
}

/// One page painting a DeviceGray image whose declared size is far beyond its data.
fn oversized_image_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 70000,
            "Height" => 70000,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![0x80; 16],
    ));
    let helvetica = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    200.into(),
                    0.into(),
                    0.into(),
                    200.into(),
                    200.into(),
                    400.into(),
                ],
            ),
            Operation::new("Do", vec!["Im1".into()]),
            Operation::new("Q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 11.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal("Caption below the scan.")]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => helvetica },
            "XObject" => dictionary! { "Im1" => image_id },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

#[test]
fn test_oversized_image_does_not_abort_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scan.pdf");
    fs::write(&input, oversized_image_pdf()).unwrap();
    let output = dir.path().join("scan.docx");

    assert!(pdfdocx::convert(&input, &output, TargetFormat::Docx));

    let xml = read_part(&output, "word/document.xml");
    assert!(paragraphs(&xml)
        .iter()
        .any(|(_, text)| text.contains("Caption below the scan.")));
}
