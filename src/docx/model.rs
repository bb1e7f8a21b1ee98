//! Word document object model.
//!
//! The model is built incrementally by the emitter, refined by the post-processor and
//! serialized once by [`super::write_docx`]. Units follow OOXML: twips (1/20 pt) for page and
//! table geometry, points for spacing and font sizes, EMU for drawings.

use chrono::{DateTime, Utc};

use crate::model::ImageFormat;

use super::styles::StyleSheet;

/// Twips per point.
pub const TWIPS_PER_POINT: f32 = 20.0;
/// Twips per inch.
pub const TWIPS_PER_INCH: f32 = 1440.0;
/// English Metric Units per point.
pub const EMU_PER_POINT: f32 = 12700.0;

pub fn points_to_twips(points: f32) -> u32 {
    (points * TWIPS_PER_POINT).round().max(0.0) as u32
}

pub fn inches_to_twips(inches: f32) -> u32 {
    (inches * TWIPS_PER_INCH).round().max(0.0) as u32
}

/// Paragraph alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

impl Alignment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
        }
    }
}

/// A border line (`w:bottom`, `w:top`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Border {
    /// `single`, `nil`, ...
    pub style: String,
    /// Eighths of a point
    pub size: u32,
    pub space: u32,
    pub color: String,
}

impl Border {
    /// Thin black single line.
    pub fn single() -> Self {
        Self {
            style: "single".to_string(),
            size: 6,
            space: 0,
            color: "000000".to_string(),
        }
    }

    /// Explicitly no border.
    pub fn nil() -> Self {
        Self {
            style: "nil".to_string(),
            size: 0,
            space: 0,
            color: "auto".to_string(),
        }
    }

    pub fn is_nil(&self) -> bool {
        self.style == "nil"
    }
}

/// Paragraph spacing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Spacing {
    /// Points before
    pub before: Option<f32>,
    /// Points after
    pub after: Option<f32>,
    /// Line spacing multiple
    pub line: Option<f32>,
}

impl Spacing {
    pub fn new(before: f32, after: f32, line: f32) -> Self {
        Self {
            before: Some(before),
            after: Some(after),
            line: Some(line),
        }
    }

    pub fn after(after: f32) -> Self {
        Self {
            after: Some(after),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_none() && self.after.is_none() && self.line.is_none()
    }
}

/// Paragraph formatting.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParagraphProperties {
    /// Style id (e.g., `Heading1`, `ListBullet`)
    pub style: Option<String>,
    pub alignment: Option<Alignment>,
    pub spacing: Spacing,
    pub bottom_border: Option<Border>,
    /// Left tab stops, in twips
    pub tabs: Vec<u32>,
}

/// Run formatting.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunProperties {
    pub font: Option<String>,
    /// Points
    pub size: Option<f32>,
    /// Hex RGB without `#`
    pub color: Option<String>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl RunProperties {
    /// Distinct (bold, italic, underline) combination.
    pub fn format_key(&self) -> (bool, bool, bool) {
        (self.bold, self.italic, self.underline)
    }
}

/// An inline picture referencing a media part.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    /// Relationship id in `document.xml.rels`
    pub rel_id: String,
    pub width_emu: u64,
    pub height_emu: u64,
    /// Drawing object id, unique in the document
    pub id: u32,
    pub name: String,
}

/// Content of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunKind {
    Text(String),
    Break,
    Tab,
    Image(InlineImage),
}

/// A run of uniformly formatted content.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub kind: RunKind,
    pub props: RunProperties,
}

impl Run {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: RunKind::Text(text.into()),
            props: RunProperties::default(),
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        let mut run = Self::text(text);
        run.props.bold = true;
        run
    }

    pub fn line_break() -> Self {
        Self {
            kind: RunKind::Break,
            props: RunProperties::default(),
        }
    }

    pub fn tab() -> Self {
        Self {
            kind: RunKind::Tab,
            props: RunProperties::default(),
        }
    }

    pub fn image(image: InlineImage) -> Self {
        Self {
            kind: RunKind::Image(image),
            props: RunProperties::default(),
        }
    }

    pub fn with_props(mut self, props: RunProperties) -> Self {
        self.props = props;
        self
    }

    /// Text content; breaks and tabs map to `\n` and `\t`.
    pub fn plain_text(&self) -> &str {
        match &self.kind {
            RunKind::Text(t) => t,
            RunKind::Break => "\n",
            RunKind::Tab => "\t",
            RunKind::Image(_) => "",
        }
    }

    pub fn text_mut(&mut self) -> Option<&mut String> {
        match &mut self.kind {
            RunKind::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// A paragraph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Paragraph {
    pub props: ParagraphProperties,
    pub runs: Vec<Run>,
}

impl Paragraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// A paragraph with one plain run.
    pub fn with_text(text: impl Into<String>) -> Self {
        let mut p = Self::new();
        p.add_text(text);
        p
    }

    /// Set the paragraph style.
    pub fn styled(mut self, style: impl Into<String>) -> Self {
        self.props.style = Some(style.into());
        self
    }

    pub fn aligned(mut self, alignment: Alignment) -> Self {
        self.props.alignment = Some(alignment);
        self
    }

    pub fn spaced(mut self, spacing: Spacing) -> Self {
        self.props.spacing = spacing;
        self
    }

    pub fn add_run(&mut self, run: Run) {
        self.runs.push(run);
    }

    pub fn add_text(&mut self, text: impl Into<String>) {
        self.runs.push(Run::text(text));
    }

    pub fn style(&self) -> Option<&str> {
        self.props.style.as_deref()
    }

    pub fn is_heading(&self) -> bool {
        self.style().is_some_and(|s| s.starts_with("Heading"))
    }

    pub fn has_image(&self) -> bool {
        self.runs.iter().any(|r| matches!(r.kind, RunKind::Image(_)))
    }

    /// Concatenated run text.
    pub fn text(&self) -> String {
        self.runs.iter().map(Run::plain_text).collect()
    }

    /// No visible text and no picture.
    pub fn is_blank(&self) -> bool {
        !self.has_image() && self.text().trim().is_empty()
    }
}

/// A table cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableCell {
    pub paragraphs: Vec<Paragraph>,
    /// Twips
    pub width: Option<u32>,
    /// Uniform cell margin, in twips
    pub margin: Option<u32>,
    pub borders: Option<Border>,
}

impl TableCell {
    pub fn new(paragraphs: Vec<Paragraph>) -> Self {
        Self {
            paragraphs,
            ..Default::default()
        }
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new(vec![Paragraph::with_text(text)])
    }

    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_blank(&self) -> bool {
        self.paragraphs.iter().all(Paragraph::is_blank)
    }
}

/// A table row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

impl TableRow {
    pub fn new(cells: Vec<TableCell>) -> Self {
        Self { cells }
    }
}

/// A table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub rows: Vec<TableRow>,
    /// Grid column widths in twips
    pub column_widths: Vec<u32>,
    /// Border applied to all table edges and inner lines; `None` leaves the default
    pub borders: Option<Border>,
    /// Default cell margin, in twips
    pub cell_margin: Option<u32>,
}

impl Table {
    pub fn new(rows: Vec<TableRow>) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.iter().map(|r| r.cells.len()).max().unwrap_or(0)
    }

    pub fn cells(&self) -> impl Iterator<Item = &TableCell> {
        self.rows.iter().flat_map(|r| r.cells.iter())
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut TableCell> {
        self.rows.iter_mut().flat_map(|r| r.cells.iter_mut())
    }

    /// Every cell holds only whitespace.
    pub fn is_blank(&self) -> bool {
        self.cells().all(TableCell::is_blank)
    }
}

/// Top-level body element.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyElement {
    Paragraph(Paragraph),
    Table(Table),
}

/// A page-sized section.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// Page width in twips
    pub width: u32,
    /// Page height in twips
    pub height: u32,
    /// Uniform page margin in twips
    pub margin: u32,
    pub body: Vec<BodyElement>,
}

impl Section {
    /// Section matching a PDF page size given in points.
    pub fn for_page(width_pt: f32, height_pt: f32, margin_inches: f32) -> Self {
        Self {
            width: points_to_twips(width_pt),
            height: points_to_twips(height_pt),
            margin: inches_to_twips(margin_inches),
            body: Vec::new(),
        }
    }

    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }

    pub fn push_paragraph(&mut self, paragraph: Paragraph) {
        self.body.push(BodyElement::Paragraph(paragraph));
    }

    pub fn push_table(&mut self, table: Table) {
        self.body.push(BodyElement::Table(table));
    }
}

/// A binary part under `word/media/`.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPart {
    /// File name, e.g. `image1.png`
    pub name: String,
    pub rel_id: String,
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

/// Core document properties.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentProperties {
    pub title: Option<String>,
    pub creator: String,
    pub created: DateTime<Utc>,
}

impl Default for DocumentProperties {
    fn default() -> Self {
        Self {
            title: None,
            creator: "pdfdocx".to_string(),
            created: Utc::now(),
        }
    }
}

/// The emitted document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WordDocument {
    pub sections: Vec<Section>,
    pub styles: StyleSheet,
    pub media: Vec<MediaPart>,
    pub properties: DocumentProperties,
    next_drawing_id: u32,
}

impl WordDocument {
    pub fn new(styles: StyleSheet) -> Self {
        Self {
            styles,
            ..Default::default()
        }
    }

    pub fn add_section(&mut self, section: Section) {
        self.sections.push(section);
    }

    /// Register an image and return an inline picture for it.
    pub fn add_image(
        &mut self,
        format: ImageFormat,
        bytes: Vec<u8>,
        width_pt: f32,
        height_pt: f32,
    ) -> InlineImage {
        let n = self.media.len() + 1;
        let rel_id = format!("rIdImage{}", n);
        let name = format!("image{}.{}", n, format.extension());
        self.media.push(MediaPart {
            name: name.clone(),
            rel_id: rel_id.clone(),
            format,
            bytes,
        });

        self.next_drawing_id += 1;
        InlineImage {
            rel_id,
            width_emu: (width_pt.max(1.0) * EMU_PER_POINT) as u64,
            height_emu: (height_pt.max(1.0) * EMU_PER_POINT) as u64,
            id: self.next_drawing_id,
            name,
        }
    }

    /// All top-level and in-table paragraphs, in document order.
    pub fn paragraphs(&self) -> Vec<&Paragraph> {
        let mut out = Vec::new();
        for section in &self.sections {
            for element in &section.body {
                match element {
                    BodyElement::Paragraph(p) => out.push(p),
                    BodyElement::Table(t) => {
                        out.extend(t.cells().flat_map(|c| c.paragraphs.iter()))
                    }
                }
            }
        }
        out
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.sections.iter().flat_map(|s| {
            s.body.iter().filter_map(|e| match e {
                BodyElement::Table(t) => Some(t),
                BodyElement::Paragraph(_) => None,
            })
        })
    }

    pub fn image_count(&self) -> usize {
        self.paragraphs()
            .iter()
            .flat_map(|p| p.runs.iter())
            .filter(|r| matches!(r.kind, RunKind::Image(_)))
            .count()
    }

    /// Paragraph texts joined by newlines.
    pub fn plain_text(&self) -> String {
        self.paragraphs()
            .iter()
            .map(|p| p.text())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversions() {
        assert_eq!(points_to_twips(12.0), 240);
        assert_eq!(inches_to_twips(0.5), 720);

        let section = Section::for_page(792.0, 612.0, 0.5);
        assert!(section.is_landscape());
        assert_eq!(section.width, 15840);
    }

    #[test]
    fn test_paragraph_text() {
        let mut p = Paragraph::with_text("Hello");
        p.add_run(Run::line_break());
        p.add_run(Run::bold("World"));
        assert_eq!(p.text(), "Hello\nWorld");
        assert!(!p.is_blank());
        assert!(Paragraph::with_text("  ").is_blank());
        assert!(Paragraph::new().styled("Heading2").is_heading());
    }

    #[test]
    fn test_blank_table() {
        let blank = Table::new(vec![TableRow::new(vec![
            TableCell::with_text(" "),
            TableCell::new(vec![]),
        ])]);
        assert!(blank.is_blank());

        let filled = Table::new(vec![TableRow::new(vec![
            TableCell::with_text(" "),
            TableCell::with_text("x"),
        ])]);
        assert!(!filled.is_blank());
        assert_eq!(filled.column_count(), 2);
    }

    #[test]
    fn test_document_images_and_paragraphs() {
        let mut doc = WordDocument::default();
        let image = doc.add_image(ImageFormat::Png, vec![1, 2, 3], 72.0, 36.0);
        assert_eq!(image.rel_id, "rIdImage1");
        assert_eq!(image.width_emu, 914400);

        let mut section = Section::for_page(612.0, 792.0, 0.5);
        let mut p = Paragraph::new();
        p.add_run(Run::image(image));
        section.push_paragraph(p);
        section.push_table(Table::new(vec![TableRow::new(vec![TableCell::with_text("cell")])]));
        doc.add_section(section);

        assert_eq!(doc.paragraphs().len(), 2);
        assert_eq!(doc.image_count(), 1);
        assert_eq!(doc.plain_text(), "\ncell");
    }
}
