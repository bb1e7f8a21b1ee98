//! Document emission.
//!
//! [`DocumentEmitter`] turns an extracted page and its inferred layout into a document section.
//! Multi-column pages become a single-row borderless table with one cell per column; other
//! pages emit their blocks top to bottom. Failures of a single block degrade that block and are
//! recorded as diagnostics.

mod block;
mod columns;
mod images;

pub use block::Flow;
pub use columns::{assign_to_columns, column_table, column_widths};
pub use images::{encode_image, stage_image};

use std::path::Path;

use crate::config::HeuristicConfig;
use crate::convert::{Diagnostic, DiagnosticKind};
use crate::docx::{Paragraph, Run, Section, Table, WordDocument};
use crate::error::Result;
use crate::layout::{decorative_block, DocumentLayout, PageLayout};
use crate::model::{ImageBlock, PageBlock, PageContent};

use block::{image_alignment_for, BlockContext};

/// Emits pages into a [`WordDocument`].
pub struct DocumentEmitter<'a> {
    config: &'a HeuristicConfig,
    temp_dir: &'a Path,
}

impl<'a> DocumentEmitter<'a> {
    /// Create an emitter staging images under `temp_dir`.
    pub fn new(config: &'a HeuristicConfig, temp_dir: &'a Path) -> Self {
        Self { config, temp_dir }
    }

    /// Emit one analyzed page as a new section.
    pub fn emit_page(
        &self,
        doc: &mut WordDocument,
        page: &PageContent,
        layout: &PageLayout,
        document: &DocumentLayout,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let mut section = Section::for_page(page.width, page.height, self.config.page_margin_inches);

        let skipped = if page.index == 0 {
            decorative_block(page, self.config)
        } else {
            None
        };
        if let Some(i) = skipped {
            log::debug!("Skipping decorative block {} on the first page", i);
        }
        let items: Vec<&PageBlock> = page
            .blocks
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skipped)
            .map(|(_, b)| b)
            .collect();

        let ctx = BlockContext {
            config: self.config,
            page_width: page.width,
            layout,
            document,
        };

        if layout.is_multi_column() && layout.columns.len() >= 2 {
            let bboxes: Vec<_> = items.iter().map(|b| b.bbox()).collect();
            let assignment = assign_to_columns(&bboxes, &layout.columns);

            let mut per_column: Vec<Vec<&PageBlock>> = vec![Vec::new(); layout.columns.len()];
            for (block, column) in items.iter().zip(assignment) {
                per_column[column].push(*block);
            }

            let cells = per_column
                .into_iter()
                .map(|mut blocks| {
                    blocks.sort_by(|a, b| a.bbox().y0.total_cmp(&b.bbox().y0));
                    let mut flow = Flow::in_cell();
                    for block in blocks {
                        self.emit_block(doc, &mut flow, &ctx, page.index, block, diagnostics);
                    }
                    flow.into_paragraphs()
                })
                .collect();

            section.push_table(column_table(cells, &layout.columns, self.config));
        } else {
            let mut sorted = items;
            sorted.sort_by(|a, b| a.bbox().y0.total_cmp(&b.bbox().y0));

            let mut flow = Flow::new();
            for block in sorted {
                self.emit_block(doc, &mut flow, &ctx, page.index, block, diagnostics);
            }
            for paragraph in flow.into_paragraphs() {
                section.push_paragraph(paragraph);
            }
        }

        doc.add_section(section);
    }

    /// Emit a page as one top-to-bottom flow, ignoring columns, with `tables` placed at their
    /// top edge. Text already represented by a table must be removed from `page` beforehand.
    pub fn emit_flow_page(
        &self,
        doc: &mut WordDocument,
        page: &PageContent,
        layout: &PageLayout,
        document: &DocumentLayout,
        tables: Vec<(f32, Table)>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let mut section = Section::for_page(page.width, page.height, self.config.page_margin_inches);
        let ctx = BlockContext {
            config: self.config,
            page_width: page.width,
            layout,
            document,
        };

        let skipped = if page.index == 0 {
            decorative_block(page, self.config)
        } else {
            None
        };

        enum Item<'b> {
            Block(&'b PageBlock),
            Table(Table),
        }
        let mut items: Vec<(f32, Item)> = page
            .blocks
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skipped)
            .map(|(_, b)| (b.bbox().y0, Item::Block(b)))
            .collect();
        items.extend(tables.into_iter().map(|(top, t)| (top, Item::Table(t))));
        items.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut flow = Flow::new();
        for (_, item) in items {
            match item {
                Item::Block(block) => {
                    self.emit_block(doc, &mut flow, &ctx, page.index, block, diagnostics)
                }
                Item::Table(table) => {
                    for paragraph in std::mem::take(&mut flow).into_paragraphs() {
                        section.push_paragraph(paragraph);
                    }
                    section.push_table(table);
                }
            }
        }
        for paragraph in flow.into_paragraphs() {
            section.push_paragraph(paragraph);
        }

        doc.add_section(section);
    }

    /// Emit a page without layout information: one plain paragraph per text block.
    pub fn emit_degraded_page(&self, doc: &mut WordDocument, page: &PageContent) {
        let mut section = Section::for_page(page.width, page.height, self.config.page_margin_inches);
        for block in page.text_blocks() {
            let text = block.text();
            if !text.trim().is_empty() {
                section.push_paragraph(Paragraph::with_text(text));
            }
        }
        doc.add_section(section);
    }

    fn emit_block(
        &self,
        doc: &mut WordDocument,
        flow: &mut Flow,
        ctx: &BlockContext,
        page_index: usize,
        block: &PageBlock,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        match block {
            PageBlock::Text(text) => {
                if let Err(e) = flow.emit_text_block(ctx, text) {
                    log::warn!("Page {}: {}; emitting raw text", page_index + 1, e);
                    diagnostics.push(Diagnostic::page(
                        page_index,
                        DiagnosticKind::Emission,
                        e.to_string(),
                    ));
                    flow.push_raw(text);
                }
            }
            PageBlock::Image(image) => match self.emit_image(doc, image, ctx.page_width) {
                Ok(paragraph) => flow.push_standalone(paragraph),
                Err(e) => {
                    log::warn!("Page {}: dropping image: {}", page_index + 1, e);
                    diagnostics.push(Diagnostic::page(
                        page_index,
                        DiagnosticKind::Image,
                        e.to_string(),
                    ));
                }
            },
        }
    }

    fn emit_image(
        &self,
        doc: &mut WordDocument,
        image: &ImageBlock,
        page_width: f32,
    ) -> Result<Paragraph> {
        let (format, bytes) = encode_image(&image.data)?;
        let staged = stage_image(format, &bytes, self.temp_dir)?;

        let inline = doc.add_image(format, staged, image.bbox.width(), image.bbox.height());
        let alignment = image_alignment_for(&image.bbox, page_width, self.config);

        let mut paragraph = Paragraph::new().aligned(alignment);
        paragraph.add_run(Run::image(inline));
        Ok(paragraph)
    }
}
