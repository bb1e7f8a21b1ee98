//! Extracted text and image blocks.

use super::geometry::Rect;

/// Span style flag bits.
pub mod flags {
    pub const ITALIC: u32 = 2;
    pub const UNDERLINE: u32 = 4;
    pub const BOLD: u32 = 16;
}

/// Font size assumed when the source does not provide one.
pub const DEFAULT_SPAN_SIZE: f32 = 11.0;

/// The smallest styled run of text: one font, size, color and flag set.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    /// Font name (e.g., "Helvetica-Bold")
    pub font: String,
    /// Font size in points
    pub size: f32,
    /// Packed 0xRRGGBB color
    pub color: u32,
    /// Style bits, see [`flags`]
    pub flags: u32,
    pub bbox: Rect,
}

impl Default for Span {
    fn default() -> Self {
        Self {
            text: String::new(),
            font: String::new(),
            size: DEFAULT_SPAN_SIZE,
            color: 0,
            flags: 0,
            bbox: Rect::default(),
        }
    }
}

impl Span {
    /// Create a span, inferring bold and italic from the font name.
    pub fn new(text: impl Into<String>, font: impl Into<String>, size: f32, bbox: Rect) -> Self {
        let font = font.into();
        let lower = font.to_lowercase();
        let mut span_flags = 0;
        if lower.contains("bold") || lower.contains("black") || lower.contains("heavy") {
            span_flags |= flags::BOLD;
        }
        if lower.contains("italic") || lower.contains("oblique") {
            span_flags |= flags::ITALIC;
        }

        Self {
            text: text.into(),
            font,
            size,
            flags: span_flags,
            bbox,
            ..Default::default()
        }
    }

    pub fn is_bold(&self) -> bool {
        self.flags & flags::BOLD != 0
    }

    pub fn is_italic(&self) -> bool {
        self.flags & flags::ITALIC != 0
    }

    pub fn is_underline(&self) -> bool {
        self.flags & flags::UNDERLINE != 0
    }

    /// Color as (r, g, b) components.
    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.color >> 16) & 0xFF) as u8,
            ((self.color >> 8) & 0xFF) as u8,
            (self.color & 0xFF) as u8,
        )
    }

    /// Approximate baseline (the box includes a 20% descender).
    pub fn baseline(&self) -> f32 {
        self.bbox.y1 - self.size * 0.2
    }
}

/// Spans sharing a baseline, ordered left to right.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Line {
    pub spans: Vec<Span>,
    pub bbox: Rect,
}

impl Line {
    /// Create a line from spans, sorting them by x and computing the union box.
    pub fn from_spans(mut spans: Vec<Span>) -> Self {
        spans.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
        let bbox = Rect::union_all(spans.iter().map(|s| &s.bbox)).unwrap_or_default();
        Self { spans, bbox }
    }

    /// Combined text with gap-based spacing.
    ///
    /// A space is inserted when the gap between spans exceeds 20% of the average character
    /// width, except between two characters of a script written without word spaces.
    pub fn text(&self) -> String {
        self.segments().into_iter().map(|(text, _)| text).collect()
    }

    /// Span texts paired with their span, each prefixed with the space [`Line::text`] would
    /// insert before it.
    pub fn segments(&self) -> Vec<(String, &Span)> {
        let mut segments: Vec<(String, &Span)> = Vec::with_capacity(self.spans.len());

        for (i, span) in self.spans.iter().enumerate() {
            let mut text = String::new();
            if i > 0 {
                let prev = &self.spans[i - 1];
                let gap = span.bbox.x0 - prev.bbox.x1;

                let char_count = span.text.chars().count();
                let avg_char_width = if char_count > 0 && span.bbox.width() > 0.0 {
                    span.bbox.width() / char_count as f32
                } else {
                    span.size * 0.5
                };

                let spaceless = prev.text.chars().last().is_some_and(is_spaceless_script_char)
                    && span.text.chars().next().is_some_and(is_spaceless_script_char);
                let has_space = prev.text.ends_with([' ', '\u{00A0}'])
                    || span.text.starts_with([' ', '\u{00A0}']);

                if gap > avg_char_width * 0.2 && !spaceless && !has_space {
                    text.push(' ');
                }
            }
            text.push_str(&span.text);
            segments.push((text, span));
        }

        segments
    }

    /// Largest span size on the line.
    pub fn max_size(&self) -> f32 {
        self.spans.iter().map(|s| s.size).fold(0.0, f32::max)
    }
}

/// A contiguous text region. Immutable once extracted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextBlock {
    pub bbox: Rect,
    pub lines: Vec<Line>,
}

impl TextBlock {
    /// Create a block from lines, computing the union box.
    pub fn new(lines: Vec<Line>) -> Self {
        let bbox = Rect::union_all(lines.iter().map(|l| &l.bbox)).unwrap_or_default();
        Self { bbox, lines }
    }

    /// Line texts joined with a single space.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(Line::text)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn spans(&self) -> impl Iterator<Item = &Span> {
        self.lines.iter().flat_map(|l| l.spans.iter())
    }

    pub fn max_size(&self) -> f32 {
        self.spans().map(|s| s.size).fold(0.0, f32::max)
    }

    pub fn any_bold(&self) -> bool {
        self.spans().any(Span::is_bold)
    }

    pub fn is_empty(&self) -> bool {
        self.text().trim().is_empty()
    }
}

/// Encoded image container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }
}

/// Image payload as found in the PDF.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageData {
    /// Already-encoded bytes
    Encoded { format: ImageFormat, bytes: Vec<u8> },
    /// Raw 8-bit samples, `channels` is 1 (gray) or 3 (RGB)
    Raw {
        width: u32,
        height: u32,
        channels: u8,
        samples: Vec<u8>,
    },
}

/// A placed image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlock {
    pub bbox: Rect,
    pub data: ImageData,
}

/// A block in native stream order.
#[derive(Debug, Clone, PartialEq)]
pub enum PageBlock {
    Text(TextBlock),
    Image(ImageBlock),
}

impl PageBlock {
    pub fn bbox(&self) -> Rect {
        match self {
            PageBlock::Text(b) => b.bbox,
            PageBlock::Image(b) => b.bbox,
        }
    }

    pub fn as_text(&self) -> Option<&TextBlock> {
        match self {
            PageBlock::Text(b) => Some(b),
            PageBlock::Image(_) => None,
        }
    }
}

/// Check if a character is from a script that doesn't use word spaces.
///
/// Chinese and Japanese don't use spaces between words, but Korean does.
pub fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;

    // CJK Unified Ideographs and extensions
    (0x4E00..=0x9FFF).contains(&code)
        || (0x3400..=0x4DBF).contains(&code)
        || (0x20000..=0x2EBEF).contains(&code)
        // Hiragana, Katakana
        || (0x3040..=0x30FF).contains(&code)
        // CJK Symbols and Punctuation
        || (0x3000..=0x303F).contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span_at(text: &str, x0: f32, x1: f32) -> Span {
        Span::new(text, "Helvetica", 12.0, Rect::new(x0, 100.0, x1, 112.0))
    }

    #[test]
    fn test_span_style_inference() {
        let span = Span::new("Test", "Helvetica-Bold", 12.0, Rect::default());
        assert!(span.is_bold());
        assert!(!span.is_italic());

        let span = Span::new("Test", "Helvetica-Oblique", 12.0, Rect::default());
        assert!(!span.is_bold());
        assert!(span.is_italic());
        assert_eq!(span.flags, flags::ITALIC);
    }

    #[test]
    fn test_span_defaults() {
        let span = Span::default();
        assert_eq!(span.size, 11.0);
        assert_eq!(span.flags, 0);

        let colored = Span {
            color: 0x0563C1,
            ..Span::default()
        };
        assert_eq!(colored.rgb(), (0x05, 0x63, 0xC1));
    }

    #[test]
    fn test_line_text_spacing() {
        let line = Line::from_spans(vec![span_at("World", 50.0, 80.0), span_at("Hello", 10.0, 40.0)]);
        assert_eq!(line.text(), "Hello World");

        // Abutting spans join directly
        let line = Line::from_spans(vec![span_at("sen", 10.0, 28.0), span_at("tence", 28.0, 58.0)]);
        assert_eq!(line.text(), "sentence");
    }

    #[test]
    fn test_line_text_cjk() {
        let line = Line::from_spans(vec![span_at("中文", 10.0, 34.0), span_at("文本", 40.0, 64.0)]);
        assert_eq!(line.text(), "中文文本");
    }

    #[test]
    fn test_block_text_and_bbox() {
        let block = TextBlock::new(vec![
            Line::from_spans(vec![span_at("First", 10.0, 40.0)]),
            Line::from_spans(vec![Span::new(
                "second",
                "Helvetica",
                12.0,
                Rect::new(10.0, 114.0, 50.0, 126.0),
            )]),
        ]);
        assert_eq!(block.text(), "First second");
        assert_eq!(block.bbox, Rect::new(10.0, 100.0, 50.0, 126.0));
        assert_eq!(block.max_size(), 12.0);
    }
}
