//! Content stream interpretation.
//!
//! Walks the operators of a page content stream, tracking the graphics and text state, and
//! produces positioned spans, image placements and painted paths in top-left page coordinates.
//! Every span and image carries its position in the stream so blocks can later be ordered the
//! way the producer wrote them.

use std::collections::HashMap;

use super::backend::{ContentOp, FontMetrics, MediaBox, PdfBackend, PdfValue};
use super::text::normalize_span_text;
use crate::config::HeuristicConfig;
use crate::error::Result;
use crate::model::{flags, DrawingKind, DrawingPrimitive, ImageBlock, Rect, Span};

/// Fraction of the font size above the baseline covered by a span box.
const ASCENT: f32 = 0.8;
/// Fraction of the font size below the baseline covered by a span box.
const DESCENT: f32 = 0.2;
/// Text rendering mode "fill, then stroke", commonly used to fake bold.
const RENDER_FILL_STROKE: i64 = 2;

/// 2-D affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn from_op(op: &ContentOp) -> Option<Matrix> {
        match op.numbers()?.as_slice() {
            [a, b, c, d, e, f] => Some(Matrix {
                a: *a,
                b: *b,
                c: *c,
                d: *d,
                e: *e,
                f: *f,
            }),
            _ => None,
        }
    }

    fn translation(tx: f32, ty: f32) -> Matrix {
        Matrix {
            e: tx,
            f: ty,
            ..Matrix::IDENTITY
        }
    }

    /// `self × other`: apply `self` first, then `other`.
    fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Length of the transformed unit y vector.
    fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

/// Graphics state saved by `q` and restored by `Q`.
#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill_color: u32,
    font_resource: Vec<u8>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
    render_mode: i64,
}

impl GraphicsState {
    fn new(default_font_size: f32) -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            fill_color: 0,
            font_resource: Vec::new(),
            font_size: default_font_size,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            render_mode: 0,
        }
    }
}

#[derive(Debug, Default)]
struct Subpath {
    points: Vec<(f32, f32)>,
    is_rect: bool,
}

/// Output of interpreting one content stream.
#[derive(Debug, Default)]
pub struct PageGraphics {
    /// Spans with their stream sequence number
    pub spans: Vec<(usize, Span)>,
    /// Images with their stream sequence number
    pub images: Vec<(usize, ImageBlock)>,
    pub drawings: Vec<DrawingPrimitive>,
}

/// Interprets one page's content stream.
pub struct ContentInterpreter<'a, B: PdfBackend + ?Sized> {
    backend: &'a B,
    page: usize,
    media_box: MediaBox,
    fonts: &'a HashMap<Vec<u8>, FontMetrics>,
    config: &'a HeuristicConfig,

    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    in_text: bool,
    subpaths: Vec<Subpath>,
    seq: usize,
    output: PageGraphics,
}

impl<'a, B: PdfBackend + ?Sized> ContentInterpreter<'a, B> {
    pub fn new(
        backend: &'a B,
        page: usize,
        media_box: MediaBox,
        fonts: &'a HashMap<Vec<u8>, FontMetrics>,
        config: &'a HeuristicConfig,
    ) -> Self {
        Self {
            backend,
            page,
            media_box,
            fonts,
            config,
            state: GraphicsState::new(config.default_font_size),
            stack: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            in_text: false,
            subpaths: Vec::new(),
            seq: 0,
            output: PageGraphics::default(),
        }
    }

    /// Interpret all operations and return what was painted.
    pub fn run(mut self, ops: &[ContentOp]) -> Result<PageGraphics> {
        for op in ops {
            self.apply(op)?;
        }
        mark_underlines(&mut self.output.spans, &self.output.drawings);
        Ok(self.output)
    }

    fn apply(&mut self, op: &ContentOp) -> Result<()> {
        match op.operator.as_str() {
            // Graphics state
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(saved) = self.stack.pop() {
                    self.state = saved;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_op(op) {
                    self.state.ctm = m.then(&self.state.ctm);
                }
            }

            // Colors
            "g" => self.state.fill_color = gray_color(op.number(0, 0.0)),
            "rg" => {
                self.state.fill_color =
                    rgb_color(op.number(0, 0.0), op.number(1, 0.0), op.number(2, 0.0))
            }
            "k" => {
                self.state.fill_color = cmyk_color(
                    op.number(0, 0.0),
                    op.number(1, 0.0),
                    op.number(2, 0.0),
                    op.number(3, 0.0),
                )
            }
            "sc" | "scn" => {
                let components: Vec<f32> =
                    op.operands.iter().filter_map(PdfValue::as_number).collect();
                match components.as_slice() {
                    [v] => self.state.fill_color = gray_color(*v),
                    [r, g, b] => self.state.fill_color = rgb_color(*r, *g, *b),
                    [c, m, y, k] => self.state.fill_color = cmyk_color(*c, *m, *y, *k),
                    // Pattern or separation colors keep the previous color
                    _ => {}
                }
            }

            // Text objects and state
            "BT" => {
                self.in_text = true;
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "ET" => self.in_text = false,
            "Tf" => {
                if let Some(PdfValue::Name(name)) = op.operands.first() {
                    self.state.font_resource = name.clone();
                }
                self.state.font_size = op.number(1, self.config.default_font_size);
            }
            "Tc" => self.state.char_spacing = op.number(0, 0.0),
            "Tw" => self.state.word_spacing = op.number(0, 0.0),
            "Tz" => self.state.horizontal_scale = op.number(0, 100.0) / 100.0,
            "TL" => self.state.leading = op.number(0, 0.0),
            "Ts" => self.state.rise = op.number(0, 0.0),
            "Tr" => self.state.render_mode = op.number(0, 0.0) as i64,
            "Td" => self.move_text(op.number(0, 0.0), op.number(1, 0.0)),
            "TD" => {
                let ty = op.number(1, 0.0);
                self.state.leading = -ty;
                self.move_text(op.number(0, 0.0), ty);
            }
            "Tm" => {
                if let Some(m) = Matrix::from_op(op) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "T*" => self.next_line(),

            // Text showing
            "Tj" => {
                if let Some(PdfValue::Str(bytes)) = op.operands.first() {
                    self.show_text(&[PdfValue::Str(bytes.clone())]);
                }
            }
            "TJ" => {
                if let Some(PdfValue::Array(items)) = op.operands.first() {
                    self.show_text(items);
                }
            }
            "'" => {
                self.next_line();
                if let Some(PdfValue::Str(bytes)) = op.operands.first() {
                    self.show_text(&[PdfValue::Str(bytes.clone())]);
                }
            }
            "\"" => {
                self.state.word_spacing = op.number(0, self.state.word_spacing);
                self.state.char_spacing = op.number(1, self.state.char_spacing);
                self.next_line();
                if let Some(PdfValue::Str(bytes)) = op.operands.get(2) {
                    self.show_text(&[PdfValue::Str(bytes.clone())]);
                }
            }

            // Path construction
            "m" => {
                let p = self.to_device(op.number(0, 0.0), op.number(1, 0.0));
                self.subpaths.push(Subpath {
                    points: vec![p],
                    is_rect: false,
                });
            }
            "l" => {
                let p = self.to_device(op.number(0, 0.0), op.number(1, 0.0));
                self.current_subpath().points.push(p);
            }
            "c" | "v" | "y" => {
                let values = op.numbers().unwrap_or_default();
                let points: Vec<(f32, f32)> = values
                    .chunks_exact(2)
                    .map(|xy| self.to_device(xy[0], xy[1]))
                    .collect();
                self.current_subpath().points.extend(points);
            }
            "re" => {
                let (x, y, w, h) = (
                    op.number(0, 0.0),
                    op.number(1, 0.0),
                    op.number(2, 0.0),
                    op.number(3, 0.0),
                );
                let points = vec![
                    self.to_device(x, y),
                    self.to_device(x + w, y),
                    self.to_device(x + w, y + h),
                    self.to_device(x, y + h),
                ];
                self.subpaths.push(Subpath {
                    points,
                    is_rect: true,
                });
            }
            "h" => {}

            // Path painting
            "S" | "s" => self.paint(false, true),
            "f" | "F" | "f*" => self.paint(true, false),
            "B" | "B*" | "b" | "b*" => self.paint(true, true),
            "n" => self.subpaths.clear(),

            // External objects
            "Do" => {
                if let Some(PdfValue::Name(name)) = op.operands.first() {
                    self.place_xobject(name);
                }
            }

            _ => {}
        }
        Ok(())
    }

    fn move_text(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translation(tx, ty).then(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = if self.state.leading != 0.0 {
            self.state.leading
        } else {
            self.state.font_size * 1.2
        };
        self.move_text(0.0, -leading);
    }

    fn current_subpath(&mut self) -> &mut Subpath {
        if self.subpaths.is_empty() {
            self.subpaths.push(Subpath::default());
        }
        let last = self.subpaths.len() - 1;
        &mut self.subpaths[last]
    }

    /// Map user space to device space (PDF origin, y up).
    fn to_device(&self, x: f32, y: f32) -> (f32, f32) {
        self.state.ctm.apply(x, y)
    }

    /// Map device space to top-left page coordinates.
    fn to_page(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (x - self.media_box.llx, self.media_box.ury - y)
    }

    fn next_seq(&mut self) -> usize {
        self.seq += 1;
        self.seq
    }

    /// Show a text-showing operand list (strings and TJ adjustments) as one span.
    fn show_text(&mut self, items: &[PdfValue]) {
        if !self.in_text {
            return;
        }

        let default_metrics = FontMetrics::default();
        let metrics = self
            .fonts
            .get(&self.state.font_resource)
            .unwrap_or(&default_metrics);

        let font_size = self.state.font_size;
        let th = self.state.horizontal_scale;
        let start_matrix = self.text_matrix.then(&self.state.ctm);

        let mut text = String::new();
        let mut advance = 0.0f32;

        for item in items {
            match item {
                PdfValue::Str(bytes) => {
                    text.push_str(&self.backend.decode_text(
                        self.page,
                        &self.state.font_resource,
                        bytes,
                    ));
                    for (code, len) in metrics.codes(bytes) {
                        let mut spacing = self.state.char_spacing;
                        if code == 32 && len == 1 {
                            spacing += self.state.word_spacing;
                        }
                        advance += (metrics.width(code) / 1000.0 * font_size + spacing) * th;
                    }
                }
                other => {
                    if let Some(n) = other.as_number() {
                        advance -= n / 1000.0 * font_size * th;
                        if -n > self.config.tj_space_threshold
                            && !text.is_empty()
                            && !text.ends_with([' ', '\u{00A0}'])
                            && !text
                                .chars()
                                .last()
                                .is_some_and(crate::model::is_spaceless_script_char)
                        {
                            text.push(' ');
                        }
                    }
                }
            }
        }

        self.text_matrix = Matrix::translation(advance, 0.0).then(&self.text_matrix);

        let text = normalize_span_text(&text);
        if text.trim().is_empty() {
            return;
        }

        let size = font_size * start_matrix.vertical_scale();
        let size = if size > 0.0 {
            size
        } else {
            self.config.default_font_size
        };
        let rise = self.state.rise;
        let (sx, sy) = self.to_page(start_matrix.apply(0.0, rise));
        let (ex, _) = self.to_page(start_matrix.apply(advance, rise));
        let bbox = Rect::new(sx, sy - size * ASCENT, ex, sy + size * DESCENT);

        let mut span = Span::new(text, strip_subset_prefix(&metrics.base_font), size, bbox);
        span.color = self.state.fill_color;
        if metrics.bold || self.state.render_mode == RENDER_FILL_STROKE {
            span.flags |= flags::BOLD;
        }
        if metrics.italic {
            span.flags |= flags::ITALIC;
        }

        let seq = self.next_seq();
        self.output.spans.push((seq, span));
    }

    fn paint(&mut self, filled: bool, stroked: bool) {
        let subpaths = std::mem::take(&mut self.subpaths);
        for subpath in subpaths {
            let corners: Vec<Rect> = subpath
                .points
                .iter()
                .map(|p| {
                    let (x, y) = self.to_page(*p);
                    Rect::new(x, y, x, y)
                })
                .collect();
            let Some(bbox) = Rect::union_all(corners.iter()) else {
                continue;
            };
            self.output.drawings.push(DrawingPrimitive {
                kind: if subpath.is_rect {
                    DrawingKind::Rect
                } else {
                    DrawingKind::Line
                },
                bbox,
                filled,
                stroked,
            });
        }
    }

    fn place_xobject(&mut self, name: &[u8]) {
        match self.backend.page_image(self.page, name) {
            Ok(Some(data)) => {
                let corners: Vec<Rect> = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)]
                    .iter()
                    .map(|(x, y)| {
                        let (px, py) = self.to_page(self.to_device(*x, *y));
                        Rect::new(px, py, px, py)
                    })
                    .collect();
                if let Some(bbox) = Rect::union_all(corners.iter()) {
                    let seq = self.next_seq();
                    self.output.images.push((seq, ImageBlock { bbox, data }));
                }
            }
            Ok(None) => {
                log::debug!(
                    "Page {}: skipping XObject {}",
                    self.page,
                    String::from_utf8_lossy(name)
                );
            }
            Err(e) => {
                log::warn!(
                    "Page {}: image {} could not be read: {}",
                    self.page,
                    String::from_utf8_lossy(name),
                    e
                );
            }
        }
    }
}

/// Flag spans that sit directly on a thin horizontal drawing as underlined.
fn mark_underlines(spans: &mut [(usize, Span)], drawings: &[DrawingPrimitive]) {
    let rules: Vec<&DrawingPrimitive> = drawings.iter().filter(|d| d.is_horizontal_rule()).collect();
    if rules.is_empty() {
        return;
    }

    for (_, span) in spans.iter_mut() {
        let baseline = span.baseline();
        let width = span.bbox.width();
        let underlined = rules.iter().any(|rule| {
            let rule_y = rule.bbox.center_y();
            rule_y >= baseline - 1.0
                && rule_y <= baseline + span.size * 0.25
                && width > 0.0
                && rule.bbox.horizontal_overlap(&span.bbox) >= width * 0.5
        });
        if underlined {
            span.flags |= flags::UNDERLINE;
        }
    }
}

/// Drop the six-letter subset tag of embedded fonts ("ABCDEF+Calibri" -> "Calibri").
fn strip_subset_prefix(name: &str) -> &str {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.chars().all(|c| c.is_ascii_uppercase()) => rest,
        _ => name,
    }
}

fn channel(v: f32) -> u32 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u32
}

fn rgb_color(r: f32, g: f32, b: f32) -> u32 {
    channel(r) << 16 | channel(g) << 8 | channel(b)
}

fn gray_color(v: f32) -> u32 {
    rgb_color(v, v, v)
}

fn cmyk_color(c: f32, m: f32, y: f32, k: f32) -> u32 {
    rgb_color((1.0 - c) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k))
}
