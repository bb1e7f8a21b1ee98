//! Extracted page content.

use super::block::{ImageBlock, PageBlock, TextBlock};
use super::geometry::{DrawingKind, DrawingPrimitive};

/// Everything extracted from one page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageContent {
    /// Zero-based page index
    pub index: usize,
    /// Page width in points
    pub width: f32,
    /// Page height in points
    pub height: f32,
    /// Text and image blocks in native stream order
    pub blocks: Vec<PageBlock>,
    pub drawings: Vec<DrawingPrimitive>,
}

impl PageContent {
    /// Create an empty page.
    pub fn new(index: usize, width: f32, height: f32) -> Self {
        Self {
            index,
            width,
            height,
            ..Default::default()
        }
    }

    pub fn text_blocks(&self) -> impl Iterator<Item = &TextBlock> {
        self.blocks.iter().filter_map(PageBlock::as_text)
    }

    pub fn image_blocks(&self) -> impl Iterator<Item = &ImageBlock> {
        self.blocks.iter().filter_map(|b| match b {
            PageBlock::Image(img) => Some(img),
            PageBlock::Text(_) => None,
        })
    }

    /// Block texts joined by newlines.
    pub fn text(&self) -> String {
        self.text_blocks()
            .map(TextBlock::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn rect_count(&self) -> usize {
        self.drawings
            .iter()
            .filter(|d| d.kind == DrawingKind::Rect)
            .count()
    }

    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }
}
