//! PDF backend abstraction layer.
//!
//! Provides a trait-based interface for the PDF operations the extractor needs, isolating the
//! concrete PDF library (lopdf) from content-stream interpretation.

use std::collections::HashMap;
use std::path::Path;

use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};

use super::text::decode_text_simple;
use crate::error::{Error, Result};
use crate::model::{ImageData, ImageFormat};

/// Depth limit when walking `/Parent` chains for inherited page attributes.
const MAX_INHERITANCE_DEPTH: usize = 32;
/// Glyph width (thousandths of an em) used when a font declares none.
const FALLBACK_GLYPH_WIDTH: f32 = 500.0;
/// Highest character code accepted from a CIDFont `/W` array.
const MAX_CID: u32 = 0xFFFF;
/// Largest image (in pixels) decoded from raw samples.
const MAX_IMAGE_PIXELS: usize = 64 * 1024 * 1024;

/// Font descriptor flag bits.
const FLAG_ITALIC: i64 = 1 << 6;
const FLAG_FORCE_BOLD: i64 = 1 << 18;

/// Page bounding box in default user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaBox {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl MediaBox {
    /// US Letter, used when a page declares no MediaBox anywhere in its tree.
    pub const LETTER: MediaBox = MediaBox {
        llx: 0.0,
        lly: 0.0,
        urx: 612.0,
        ury: 792.0,
    };

    pub fn width(&self) -> f32 {
        (self.urx - self.llx).abs()
    }

    pub fn height(&self) -> f32 {
        (self.ury - self.lly).abs()
    }
}

/// Glyph metrics and style hints of a page font.
#[derive(Debug, Clone, PartialEq)]
pub struct FontMetrics {
    /// Base font name (e.g., "Helvetica-Bold")
    pub base_font: String,
    /// Composite font with two-byte character codes
    pub two_byte: bool,
    /// First code covered by `widths`
    pub first_char: u32,
    /// Simple-font widths indexed from `first_char`
    pub widths: Vec<f32>,
    /// Composite-font widths by CID
    pub cid_widths: HashMap<u32, f32>,
    /// Width for codes outside the tables
    pub default_width: f32,
    /// Font descriptor declares italic
    pub italic: bool,
    /// Font descriptor declares force-bold
    pub bold: bool,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            base_font: "Unknown".to_string(),
            two_byte: false,
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: FALLBACK_GLYPH_WIDTH,
            italic: false,
            bold: false,
        }
    }
}

impl FontMetrics {
    /// Glyph width of a character code in thousandths of an em.
    pub fn width(&self, code: u32) -> f32 {
        if self.two_byte {
            return self
                .cid_widths
                .get(&code)
                .copied()
                .unwrap_or(self.default_width);
        }
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(self.default_width)
    }

    /// Split a string operand into (code, byte length) pairs.
    pub fn codes(&self, bytes: &[u8]) -> Vec<(u32, usize)> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|c| match c {
                    [hi, lo] => (u32::from(*hi) << 8 | u32::from(*lo), 2),
                    [b] => (u32::from(*b), 1),
                    _ => (0, 0),
                })
                .collect()
        } else {
            bytes.iter().map(|b| (u32::from(*b), 1)).collect()
        }
    }
}

/// A value from a PDF content stream operand.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Other,
}

impl PdfValue {
    /// Numeric value of an integer or real operand.
    pub fn as_number(&self) -> Option<f32> {
        match self {
            PdfValue::Integer(i) => Some(*i as f32),
            PdfValue::Real(r) => Some(*r),
            _ => None,
        }
    }
}

/// A single operation from a PDF content stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

impl ContentOp {
    /// Numeric operand at `idx`, or `default` when missing or not a number.
    pub fn number(&self, idx: usize, default: f32) -> f32 {
        self.operands
            .get(idx)
            .and_then(PdfValue::as_number)
            .unwrap_or(default)
    }

    /// All operands as numbers, `None` if any operand is not numeric.
    pub fn numbers(&self) -> Option<Vec<f32>> {
        self.operands.iter().map(PdfValue::as_number).collect()
    }
}

/// Abstract interface for PDF document access.
///
/// Pages are addressed by zero-based index. Implementations provide page geometry, font
/// metrics, content streams, text decoding and image XObjects without exposing any concrete
/// PDF library types.
pub trait PdfBackend {
    /// Number of pages.
    fn page_count(&self) -> usize;

    /// MediaBox of a page, following inheritance.
    fn media_box(&self, page: usize) -> Result<MediaBox>;

    /// Font metrics keyed by resource name.
    fn page_fonts(&self, page: usize) -> Result<HashMap<Vec<u8>, FontMetrics>>;

    /// The raw (decompressed) content stream bytes for a page.
    fn page_content(&self, page: usize) -> Result<Vec<u8>>;

    /// Parse raw content stream bytes into a sequence of operations.
    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>>;

    /// Decode a text byte sequence using the font's encoding on the given page.
    /// Falls back to simple decoding if the font or encoding is unavailable.
    fn decode_text(&self, page: usize, font_name: &[u8], bytes: &[u8]) -> String;

    /// Image XObject `name` of the page, `None` if it is not a supported image.
    fn page_image(&self, page: usize, name: &[u8]) -> Result<Option<ImageData>>;

    /// Library-level plain text of a page.
    fn plain_text(&self, page: usize) -> Result<String>;
}

/// Concrete [`PdfBackend`] backed by `lopdf::Document`.
pub struct LopdfBackend {
    doc: LopdfDocument,
    pages: Vec<(u32, ObjectId)>,
}

impl LopdfBackend {
    /// Load from a file path.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let doc = LopdfDocument::load(path)?;
        Ok(Self::from_document(doc))
    }

    /// Load from an in-memory byte slice.
    pub fn load_bytes(data: &[u8]) -> Result<Self> {
        let doc = LopdfDocument::load_mem(data)?;
        Ok(Self::from_document(doc))
    }

    fn from_document(doc: LopdfDocument) -> Self {
        let pages = doc.get_pages().into_iter().collect();
        Self { doc, pages }
    }

    /// Get PDF version string.
    pub fn version(&self) -> String {
        self.doc.version.to_string()
    }

    fn page_entry(&self, page: usize) -> Result<(u32, ObjectId)> {
        self.pages
            .get(page)
            .copied()
            .ok_or_else(|| Error::extraction(page, "page index out of range"))
    }

    fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            _ => obj,
        }
    }

    /// Look up a page attribute, walking up the page tree for inheritable keys.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = self.doc.get_dictionary(page_id).ok();
        for _ in 0..MAX_INHERITANCE_DEPTH {
            let dict = current?;
            if let Ok(obj) = dict.get(key) {
                return Some(self.resolve(obj));
            }
            current = dict
                .get(b"Parent")
                .ok()
                .and_then(|p| p.as_reference().ok())
                .and_then(|id| self.doc.get_dictionary(id).ok());
        }
        None
    }

    fn dict_number(&self, dict: &Dictionary, key: &[u8]) -> Option<f32> {
        dict.get(key).ok().map(|o| self.resolve(o)).and_then(number)
    }

    fn font_metrics(&self, font: &Dictionary) -> FontMetrics {
        let base_font = font
            .get(b"BaseFont")
            .ok()
            .and_then(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        let is_type0 = font
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            .is_some_and(|n| n == b"Type0");

        let mut metrics = FontMetrics {
            base_font,
            ..FontMetrics::default()
        };

        let descriptor_owner = if is_type0 {
            metrics.two_byte = true;
            let descendant = font
                .get(b"DescendantFonts")
                .ok()
                .map(|o| self.resolve(o))
                .and_then(|o| o.as_array().ok())
                .and_then(|arr| arr.first())
                .map(|o| self.resolve(o))
                .and_then(|o| o.as_dict().ok());
            if let Some(cid_font) = descendant {
                metrics.default_width = self.dict_number(cid_font, b"DW").unwrap_or(1000.0);
                if let Some(w) = cid_font
                    .get(b"W")
                    .ok()
                    .map(|o| self.resolve(o))
                    .and_then(|o| o.as_array().ok())
                {
                    metrics.cid_widths = self.parse_cid_widths(w);
                }
            }
            descendant
        } else {
            metrics.first_char = self.dict_number(font, b"FirstChar").unwrap_or(0.0) as u32;
            if let Some(widths) = font
                .get(b"Widths")
                .ok()
                .map(|o| self.resolve(o))
                .and_then(|o| o.as_array().ok())
            {
                metrics.widths = widths
                    .iter()
                    .map(|w| number(self.resolve(w)).unwrap_or(0.0))
                    .collect();
            }
            Some(font)
        };

        let descriptor = descriptor_owner
            .and_then(|d| d.get(b"FontDescriptor").ok())
            .map(|o| self.resolve(o))
            .and_then(|o| o.as_dict().ok());
        if let Some(desc) = descriptor {
            if !metrics.two_byte {
                if let Some(missing) = self.dict_number(desc, b"MissingWidth").filter(|w| *w > 0.0) {
                    metrics.default_width = missing;
                }
            }
            let font_flags = self.dict_number(desc, b"Flags").unwrap_or(0.0) as i64;
            metrics.italic = font_flags & FLAG_ITALIC != 0;
            metrics.bold = font_flags & FLAG_FORCE_BOLD != 0;
        }

        metrics
    }

    /// Parse a CIDFont `/W` array: `c [w1 w2 ...]` and `c_first c_last w` entries.
    fn parse_cid_widths(&self, w: &[Object]) -> HashMap<u32, f32> {
        let mut widths = HashMap::new();
        let mut i = 0;
        while i < w.len() {
            let Some(first) = number(self.resolve(&w[i])) else {
                break;
            };
            match w.get(i + 1).map(|o| self.resolve(o)) {
                Some(Object::Array(list)) => {
                    let first = first.max(0.0) as u32;
                    for (offset, width) in list.iter().enumerate() {
                        let code = first.saturating_add(offset as u32);
                        if code > MAX_CID {
                            break;
                        }
                        if let Some(width) = number(self.resolve(width)) {
                            widths.insert(code, width);
                        }
                    }
                    i += 2;
                }
                Some(last) => {
                    let (Some(last), Some(width)) =
                        (number(last), w.get(i + 2).and_then(|o| number(self.resolve(o))))
                    else {
                        break;
                    };
                    let first = first.max(0.0) as u32;
                    let last = (last.max(0.0) as u32).min(MAX_CID);
                    for code in first..=last {
                        widths.insert(code, width);
                    }
                    i += 3;
                }
                None => break,
            }
        }
        widths
    }

    fn image_from_stream(&self, stream: &lopdf::Stream) -> Option<ImageData> {
        let dict = &stream.dict;
        if dict.get(b"ImageMask").ok().and_then(|o| o.as_bool().ok()) == Some(true) {
            return None;
        }

        let filter = match dict.get(b"Filter").ok().map(|o| self.resolve(o)) {
            Some(Object::Name(name)) => Some(name.clone()),
            Some(Object::Array(arr)) => arr.last().and_then(|o| o.as_name().ok()).map(|n| n.to_vec()),
            _ => None,
        };

        match filter.as_deref() {
            Some(b"DCTDecode") => {
                return Some(ImageData::Encoded {
                    format: ImageFormat::Jpeg,
                    bytes: stream.content.clone(),
                })
            }
            Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                log::debug!("Unsupported image filter {:?}", filter);
                return None;
            }
            _ => {}
        }

        let width = self.dict_number(dict, b"Width")? as u32;
        let height = self.dict_number(dict, b"Height")? as u32;
        let bits = self.dict_number(dict, b"BitsPerComponent").unwrap_or(8.0) as u32;
        if bits != 8 || width == 0 || height == 0 {
            log::debug!("Unsupported image layout {}x{} at {} bpc", width, height, bits);
            return None;
        }

        let channels = match dict.get(b"ColorSpace").ok().map(|o| self.resolve(o)) {
            Some(Object::Name(name)) => color_space_channels(name),
            Some(Object::Array(arr)) => match arr.first().and_then(|o| o.as_name().ok()) {
                Some(b"ICCBased") => arr
                    .get(1)
                    .map(|o| self.resolve(o))
                    .and_then(|o| o.as_stream().ok())
                    .and_then(|s| self.dict_number(&s.dict, b"N"))
                    .map(|n| n as u8),
                Some(name) => color_space_channels(name),
                None => None,
            },
            _ => None,
        }?;

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        let pixels = match (width as usize).checked_mul(height as usize) {
            Some(pixels) if pixels <= MAX_IMAGE_PIXELS => pixels,
            _ => {
                log::debug!("Image of {}x{} pixels is too large", width, height);
                return None;
            }
        };
        if data.len() < pixels * channels as usize {
            log::debug!("Image sample data is truncated");
            return None;
        }

        let samples = match channels {
            1 | 3 => data[..pixels * channels as usize].to_vec(),
            4 => data[..pixels * 4]
                .chunks_exact(4)
                .flat_map(|px| cmyk_to_rgb(px[0], px[1], px[2], px[3]))
                .collect(),
            _ => return None,
        };

        Some(ImageData::Raw {
            width,
            height,
            channels: if channels == 4 { 3 } else { channels },
            samples,
        })
    }
}

impl PdfBackend for LopdfBackend {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn media_box(&self, page: usize) -> Result<MediaBox> {
        let (_, page_id) = self.page_entry(page)?;
        let values = self
            .inherited(page_id, b"MediaBox")
            .and_then(|o| o.as_array().ok())
            .map(|arr| {
                arr.iter()
                    .filter_map(|o| number(self.resolve(o)))
                    .collect::<Vec<_>>()
            });

        match values.as_deref() {
            Some([llx, lly, urx, ury]) => Ok(MediaBox {
                llx: llx.min(*urx),
                lly: lly.min(*ury),
                urx: llx.max(*urx),
                ury: lly.max(*ury),
            }),
            _ => Ok(MediaBox::LETTER),
        }
    }

    fn page_fonts(&self, page: usize) -> Result<HashMap<Vec<u8>, FontMetrics>> {
        let (_, page_id) = self.page_entry(page)?;
        let fonts = self
            .doc
            .get_page_fonts(page_id)
            .map_err(|e| Error::extraction(page, e.to_string()))?;

        Ok(fonts
            .iter()
            .map(|(name, dict)| (name.clone(), self.font_metrics(dict)))
            .collect())
    }

    fn page_content(&self, page: usize) -> Result<Vec<u8>> {
        let (_, page_id) = self.page_entry(page)?;
        let page_dict = self
            .doc
            .get_dictionary(page_id)
            .map_err(|e| Error::extraction(page, e.to_string()))?;

        // A page without /Contents is blank.
        let Ok(contents) = page_dict.get(b"Contents") else {
            return Ok(Vec::new());
        };

        let stream_bytes = |obj: &Object| -> Option<Vec<u8>> {
            match self.resolve(obj) {
                Object::Stream(s) => Some(s.decompressed_content().unwrap_or_else(|_| s.content.clone())),
                _ => None,
            }
        };

        match self.resolve(contents) {
            Object::Array(arr) => {
                let mut content = Vec::new();
                for obj in arr {
                    if let Some(data) = stream_bytes(obj) {
                        content.extend_from_slice(&data);
                        content.push(b' ');
                    }
                }
                Ok(content)
            }
            other => stream_bytes(other)
                .ok_or_else(|| Error::extraction(page, "invalid content stream")),
        }
    }

    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>> {
        let content =
            lopdf::content::Content::decode(data).map_err(|e| Error::PdfParse(e.to_string()))?;

        Ok(content
            .operations
            .into_iter()
            .map(|op| ContentOp {
                operator: op.operator,
                operands: op.operands.iter().map(convert_object).collect(),
            })
            .collect())
    }

    fn decode_text(&self, page: usize, font_name: &[u8], bytes: &[u8]) -> String {
        if let Some((_, page_id)) = self.pages.get(page) {
            if let Ok(fonts) = self.doc.get_page_fonts(*page_id) {
                if let Some(font_dict) = fonts.get(font_name) {
                    if let Ok(enc) = font_dict.get_font_encoding(&self.doc) {
                        if let Ok(text) = LopdfDocument::decode_text(&enc, bytes) {
                            return text;
                        }
                    }
                }
            }
        }
        decode_text_simple(bytes)
    }

    fn page_image(&self, page: usize, name: &[u8]) -> Result<Option<ImageData>> {
        let (_, page_id) = self.page_entry(page)?;
        let stream = self
            .inherited(page_id, b"Resources")
            .and_then(|o| o.as_dict().ok())
            .and_then(|res| res.get(b"XObject").ok())
            .map(|o| self.resolve(o))
            .and_then(|o| o.as_dict().ok())
            .and_then(|xobjects| xobjects.get(name).ok())
            .map(|o| self.resolve(o))
            .and_then(|o| o.as_stream().ok());

        let Some(stream) = stream else {
            return Ok(None);
        };
        let is_image = stream
            .dict
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            .is_some_and(|n| n == b"Image");
        if !is_image {
            return Ok(None);
        }
        Ok(self.image_from_stream(stream))
    }

    fn plain_text(&self, page: usize) -> Result<String> {
        let (page_number, _) = self.page_entry(page)?;
        self.doc
            .extract_text(&[page_number])
            .map_err(|e| Error::extraction(page, e.to_string()))
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn color_space_channels(name: &[u8]) -> Option<u8> {
    match name {
        b"DeviceGray" | b"CalGray" | b"G" => Some(1),
        b"DeviceRGB" | b"CalRGB" | b"RGB" => Some(3),
        b"DeviceCMYK" | b"CMYK" => Some(4),
        _ => None,
    }
}

fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    let k = 255 - u32::from(k);
    [
        ((255 - u32::from(c)) * k / 255) as u8,
        ((255 - u32::from(m)) * k / 255) as u8,
        ((255 - u32::from(y)) * k / 255) as u8,
    ]
}

/// Convert a `lopdf::Object` to [`PdfValue`].
fn convert_object(obj: &Object) -> PdfValue {
    match obj {
        Object::Integer(i) => PdfValue::Integer(*i),
        Object::Real(r) => PdfValue::Real(*r),
        Object::Name(n) => PdfValue::Name(n.clone()),
        Object::String(b, _) => PdfValue::Str(b.clone()),
        Object::Array(arr) => PdfValue::Array(arr.iter().map(convert_object).collect()),
        _ => PdfValue::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_simple_font_widths() {
        let metrics = FontMetrics {
            first_char: 32,
            widths: vec![278.0, 278.0, 0.0],
            ..FontMetrics::default()
        };
        assert_eq!(metrics.width(32), 278.0);
        // Zero width and out-of-range codes fall back
        assert_eq!(metrics.width(34), 500.0);
        assert_eq!(metrics.width(10), 500.0);
        assert_eq!(metrics.codes(b"ab"), vec![(97, 1), (98, 1)]);
    }

    #[test]
    fn test_composite_font_codes() {
        let metrics = FontMetrics {
            two_byte: true,
            default_width: 1000.0,
            cid_widths: HashMap::from([(0x0102, 600.0)]),
            ..FontMetrics::default()
        };
        assert_eq!(metrics.codes(&[0x01, 0x02, 0x00, 0x41]), vec![(0x0102, 2), (0x41, 2)]);
        assert_eq!(metrics.width(0x0102), 600.0);
        assert_eq!(metrics.width(0x41), 1000.0);
    }

    #[test]
    fn test_content_op_numbers() {
        let op = ContentOp {
            operator: "Td".to_string(),
            operands: vec![PdfValue::Integer(72), PdfValue::Real(-14.5)],
        };
        assert_eq!(op.number(0, 0.0), 72.0);
        assert_eq!(op.number(1, 0.0), -14.5);
        assert_eq!(op.number(2, 9.0), 9.0);
        assert_eq!(op.numbers(), Some(vec![72.0, -14.5]));
    }

    #[test]
    fn test_cmyk_conversion() {
        assert_eq!(cmyk_to_rgb(0, 0, 0, 0), [255, 255, 255]);
        assert_eq!(cmyk_to_rgb(0, 0, 0, 255), [0, 0, 0]);
        assert_eq!(cmyk_to_rgb(255, 0, 0, 0), [0, 255, 255]);
    }

    fn gray_image(width: i64, height: i64, samples: Vec<u8>) -> lopdf::Stream {
        lopdf::Stream::new(
            lopdf::dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            samples,
        )
    }

    #[test]
    fn test_oversized_image_is_skipped() {
        let backend = LopdfBackend::from_document(LopdfDocument::with_version("1.5"));

        let image = backend.image_from_stream(&gray_image(2, 2, vec![0, 64, 128, 255]));
        assert!(matches!(
            image,
            Some(ImageData::Raw {
                width: 2,
                height: 2,
                channels: 1,
                ..
            })
        ));

        assert!(backend
            .image_from_stream(&gray_image(70000, 70000, vec![0; 16]))
            .is_none());
        assert!(backend
            .image_from_stream(&gray_image(9000, 9000, vec![0; 16]))
            .is_none());
    }

    #[test]
    fn test_cid_width_ranges_are_clamped() {
        let backend = LopdfBackend::from_document(LopdfDocument::with_version("1.5"));
        let w = vec![
            Object::Integer(1),
            Object::Integer(4_000_000_000),
            Object::Integer(500),
            Object::Integer(0xFFFE),
            Object::Array(vec![Object::Integer(600), Object::Integer(700), Object::Integer(800)]),
        ];
        let widths = backend.parse_cid_widths(&w);

        assert_eq!(widths.len(), MAX_CID as usize);
        assert_eq!(widths.get(&1), Some(&500.0));
        assert_eq!(widths.get(&0xFFFF), Some(&700.0));
        assert!(!widths.contains_key(&0x10000));
    }

    #[test]
    fn test_media_box_size() {
        assert_eq!(MediaBox::LETTER.width(), 612.0);
        assert_eq!(MediaBox::LETTER.height(), 792.0);
    }
}
