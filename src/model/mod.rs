//! Extracted page model.
//!
//! Positioned text, images and vector drawings as produced by the extractor. All coordinates are
//! in points relative to the page MediaBox with a top-left origin. Values are immutable once
//! extracted; the analyzer and emitter only read them.

mod block;
mod geometry;
mod page;

pub use block::{
    flags, is_spaceless_script_char, ImageBlock, ImageData, ImageFormat, Line, PageBlock, Span,
    TextBlock, DEFAULT_SPAN_SIZE,
};
pub use geometry::{DrawingKind, DrawingPrimitive, Rect};
pub use page::PageContent;
