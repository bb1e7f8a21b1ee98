//! Text block emission.
//!
//! A [`Flow`] is a sequence of paragraphs (the document body of a single-column page, or one
//! cell of a column grid). Each text block is classified in a fixed order: heading,
//! continuation of the previous paragraph, rating lines, list items, link, plain paragraph.

use crate::config::HeuristicConfig;
use crate::docx::{
    heading_style, Alignment, Border, Paragraph, Run, RunProperties, Spacing, LIST_BULLET_STYLE,
    LIST_NUMBER_STYLE,
};
use crate::error::{Error, Result};
use crate::layout::patterns::{
    is_link_like, is_uppercase_text, match_list_marker, split_rating, ListKind, RE_RATING_GLYPHS,
};
use crate::layout::{header_level, DocumentLayout, PageLayout};
use crate::model::{Line, Rect, Span, TextBlock};

/// Hyperlink blue.
const LINK_COLOR: &str = "0563C1";

const TERMINAL_PUNCTUATION: &[char] = &['.', '!', '?', ':', ';'];

/// What a block is emitted against.
pub(crate) struct BlockContext<'a> {
    pub config: &'a HeuristicConfig,
    pub page_width: f32,
    pub layout: &'a PageLayout,
    pub document: &'a DocumentLayout,
}

/// Alignment from the block position relative to the page.
pub(crate) fn alignment_for(bbox: &Rect, page_width: f32, config: &HeuristicConfig) -> Alignment {
    let left_margin = bbox.x0;
    let right_margin = page_width - bbox.x1;

    if (bbox.center_x() - page_width / 2.0).abs() < config.center_tolerance {
        Alignment::Center
    } else if left_margin > right_margin + config.right_align_delta {
        Alignment::Right
    } else {
        Alignment::Left
    }
}

/// Alignment of an image from its centre relative to the page centre.
pub(crate) fn image_alignment_for(bbox: &Rect, page_width: f32, config: &HeuristicConfig) -> Alignment {
    let offset = bbox.center_x() - page_width / 2.0;
    if offset.abs() < config.center_tolerance {
        Alignment::Center
    } else if offset < 0.0 {
        Alignment::Left
    } else {
        Alignment::Right
    }
}

/// Run formatting carried over from a span.
pub(crate) fn span_properties(span: &Span, config: &HeuristicConfig) -> RunProperties {
    RunProperties {
        font: (!span.font.is_empty()).then(|| span.font.clone()),
        size: Some(
            span.size
                .clamp(config.min_run_font_size, config.max_run_font_size),
        ),
        color: Some(format!("{:06X}", span.color & 0xFF_FFFF)),
        bold: span.is_bold(),
        italic: span.is_italic(),
        underline: span.is_underline(),
    }
}

/// Runs of one line, skipping the first `skip` bytes of its text.
fn line_runs(line: &Line, skip: usize, config: &HeuristicConfig) -> Vec<Run> {
    let mut remaining = skip;
    let mut runs = Vec::new();
    for (text, span) in line.segments() {
        let text = if remaining >= text.len() {
            remaining -= text.len();
            continue;
        } else {
            let rest = &text[remaining..];
            remaining = 0;
            rest.to_string()
        };
        if text.is_empty() {
            continue;
        }
        runs.push(Run::text(text).with_props(span_properties(span, config)));
    }
    runs
}

/// Runs of a whole block, with line breaks between lines.
fn block_runs(block: &TextBlock, config: &HeuristicConfig) -> Vec<Run> {
    let mut runs = Vec::new();
    for (i, line) in block.lines.iter().enumerate() {
        if i > 0 {
            runs.push(Run::line_break());
        }
        runs.extend(line_runs(line, 0, config));
    }
    runs
}

/// Average character width of a span.
fn char_width(span: &Span) -> f32 {
    let count = span.text.chars().count();
    if count > 0 && span.bbox.width() > 0.0 {
        span.bbox.width() / count as f32
    } else {
        span.size * 0.5
    }
}

/// The paragraph a following block may continue.
#[derive(Debug, Clone)]
struct Anchor {
    index: usize,
    text: String,
    last_line: Rect,
    size: f32,
}

/// A sequence of paragraphs being built.
#[derive(Debug, Default)]
pub struct Flow {
    pub paragraphs: Vec<Paragraph>,
    anchor: Option<Anchor>,
    in_cell: bool,
}

impl Flow {
    pub fn new() -> Self {
        Self::default()
    }

    /// A flow inside a column grid cell; headings get a spacer paragraph before them.
    pub fn in_cell() -> Self {
        Self {
            in_cell: true,
            ..Default::default()
        }
    }

    pub fn into_paragraphs(self) -> Vec<Paragraph> {
        self.paragraphs
    }

    /// Append a paragraph that nothing may continue (images, spacers).
    pub fn push_standalone(&mut self, paragraph: Paragraph) {
        self.paragraphs.push(paragraph);
        self.anchor = None;
    }

    /// Degraded emission: the block's raw text as an unstyled paragraph.
    pub fn push_raw(&mut self, block: &TextBlock) {
        let text = block.text();
        if !text.trim().is_empty() {
            self.push_standalone(Paragraph::with_text(text));
        }
    }

    /// Emit a text block. On error nothing has been added to the flow.
    pub(crate) fn emit_text_block(&mut self, ctx: &BlockContext, block: &TextBlock) -> Result<()> {
        validate(block)?;

        let text = block.text();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(());
        }

        if let Some(level) = heading_level_for(ctx, block, trimmed) {
            self.emit_heading(ctx, block, trimmed, level);
            return Ok(());
        }

        if self.try_continue(ctx, block, trimmed) {
            return Ok(());
        }

        let has_ratings = ctx.layout.has_ratings || ctx.document.has_ratings;
        if has_ratings && RE_RATING_GLYPHS.is_match(trimmed) {
            self.emit_ratings(ctx, block);
            return Ok(());
        }

        let markers: Vec<_> = block
            .lines
            .iter()
            .map(|line| match_list_marker(&line.text()))
            .collect();
        if markers.iter().any(Option::is_some) {
            self.emit_list(ctx, block, &markers);
            return Ok(());
        }

        let alignment = alignment_for(&block.bbox, ctx.page_width, ctx.config);
        let mut paragraph = Paragraph::new().aligned(alignment);
        paragraph.runs = block_runs(block, ctx.config);

        if is_link_like(trimmed) {
            for run in &mut paragraph.runs {
                run.props.color = Some(LINK_COLOR.to_string());
                run.props.underline = true;
            }
            paragraph.props.spacing = Spacing::after(2.0);
        } else {
            paragraph.props.spacing = Spacing::new(2.0, 4.0, 1.1);
        }
        apply_resume_spacing(ctx, &mut paragraph);

        self.push_anchored(paragraph, block, trimmed);
        Ok(())
    }

    fn push_anchored(&mut self, paragraph: Paragraph, block: &TextBlock, text: &str) {
        self.paragraphs.push(paragraph);
        self.anchor = Some(Anchor {
            index: self.paragraphs.len() - 1,
            text: text.to_string(),
            last_line: block.lines.last().map(|l| l.bbox).unwrap_or(block.bbox),
            size: block.max_size(),
        });
    }

    fn emit_heading(&mut self, ctx: &BlockContext, block: &TextBlock, text: &str, level: u8) {
        if self.in_cell && !self.paragraphs.is_empty() {
            self.push_standalone(
                Paragraph::new().spaced(Spacing::after(ctx.config.cell_heading_spacer)),
            );
        }

        let mut run = Run::text(text);
        if level == 1 {
            run.props.bold = true;
            run.props.size = Some(
                block
                    .max_size()
                    .clamp(ctx.config.min_run_font_size, ctx.config.max_run_font_size),
            );
        }

        let after = ctx.config.heading_space_after[usize::from(level.clamp(1, 3)) - 1];
        let mut paragraph = Paragraph::new()
            .styled(heading_style(level))
            .aligned(alignment_for(&block.bbox, ctx.page_width, ctx.config))
            .spaced(Spacing::after(after));
        if level == 2 {
            paragraph.props.bottom_border = Some(Border::single());
        }
        paragraph.add_run(run);

        self.push_standalone(paragraph);
    }

    /// Append the block to the previous paragraph when it continues a broken sentence.
    fn try_continue(&mut self, ctx: &BlockContext, block: &TextBlock, text: &str) -> bool {
        let Some(anchor) = self.anchor.clone() else {
            return false;
        };
        let prev_text = anchor.text.trim_end();
        if prev_text.is_empty()
            || prev_text.ends_with(TERMINAL_PUNCTUATION)
            || !text.chars().next().is_some_and(char::is_lowercase)
        {
            return false;
        }
        let Some(first_line) = block.lines.first() else {
            return false;
        };

        let size = anchor.size.max(1.0);
        let same_line = (first_line.bbox.y1 - anchor.last_line.y1).abs()
            <= size * ctx.config.line_baseline_tolerance;
        let abutting = same_line
            && first_line.spans.first().is_some_and(|span| {
                first_line.bbox.x0 - anchor.last_line.x1 <= char_width(span) * 0.2
            });
        let hyphenated = !same_line && prev_text.ends_with('-');

        let Some(paragraph) = self.paragraphs.get_mut(anchor.index) else {
            return false;
        };
        if hyphenated {
            strip_trailing_hyphen(paragraph);
        } else if !abutting {
            paragraph.add_run(Run::text(" "));
        }
        paragraph.runs.extend(block_runs(block, ctx.config));

        let joined = if hyphenated {
            format!("{}{}", prev_text.trim_end_matches('-'), text)
        } else {
            format!("{} {}", prev_text, text)
        };
        self.anchor = Some(Anchor {
            text: joined,
            last_line: block.lines.last().map(|l| l.bbox).unwrap_or(block.bbox),
            size: block.max_size(),
            ..anchor
        });
        log::debug!("Continued paragraph {} with {:?}", anchor.index, text);
        true
    }

    fn emit_ratings(&mut self, ctx: &BlockContext, block: &TextBlock) {
        let config = ctx.config;
        for line in &block.lines {
            let line_text = line.text();
            let mut paragraph = Paragraph::new().spaced(Spacing::after(2.0));

            match split_rating(&line_text) {
                Some((label, glyphs)) => {
                    let label_len = label.chars().count();
                    let pad = config
                        .rating_label_width
                        .saturating_sub(label_len)
                        .clamp(1, config.rating_label_width);

                    paragraph.add_run(Run::bold(label));
                    paragraph.add_run(Run::text(" ".repeat(pad)));
                    paragraph.add_run(Run::text(glyphs).with_props(RunProperties {
                        font: Some(config.rating_font.clone()),
                        size: Some(config.rating_font_size),
                        ..Default::default()
                    }));
                }
                None => paragraph.add_text(line_text),
            }
            self.paragraphs.push(paragraph);
        }
        self.anchor = None;
    }

    fn emit_list(
        &mut self,
        ctx: &BlockContext,
        block: &TextBlock,
        markers: &[Option<crate::layout::patterns::ListMarker>],
    ) {
        let alignment = alignment_for(&block.bbox, ctx.page_width, ctx.config);
        let mut preamble: Option<Paragraph> = None;
        let mut items: Vec<Paragraph> = Vec::new();

        for (line, marker) in block.lines.iter().zip(markers) {
            match marker {
                Some(marker) => {
                    let style = match marker.kind {
                        ListKind::Bullet => LIST_BULLET_STYLE,
                        ListKind::Number => LIST_NUMBER_STYLE,
                    };
                    let mut item = Paragraph::new()
                        .styled(style)
                        .aligned(alignment)
                        .spaced(Spacing::new(0.0, 2.0, 1.1));
                    item.runs = line_runs(line, marker.len, ctx.config);
                    items.push(item);
                }
                None => match items.last_mut() {
                    Some(item) => {
                        item.add_run(Run::text(" "));
                        item.runs.extend(line_runs(line, 0, ctx.config));
                    }
                    None => {
                        let p = preamble.get_or_insert_with(|| {
                            Paragraph::new()
                                .aligned(alignment)
                                .spaced(Spacing::new(2.0, 4.0, 1.1))
                        });
                        if !p.runs.is_empty() {
                            p.add_run(Run::line_break());
                        }
                        p.runs.extend(line_runs(line, 0, ctx.config));
                    }
                },
            }
        }

        if let Some(mut p) = preamble {
            apply_resume_spacing(ctx, &mut p);
            self.paragraphs.push(p);
        }
        for mut item in items {
            apply_resume_spacing(ctx, &mut item);
            self.paragraphs.push(item);
        }

        // A wrapped last item may continue into the next block.
        let last_text = self.paragraphs.last().map(Paragraph::text).unwrap_or_default();
        self.anchor = Some(Anchor {
            index: self.paragraphs.len() - 1,
            text: last_text,
            last_line: block.lines.last().map(|l| l.bbox).unwrap_or(block.bbox),
            size: block.max_size(),
        });
    }
}

/// Heading level of a block, or `None` for body text.
fn heading_level_for(ctx: &BlockContext, block: &TextBlock, text: &str) -> Option<u8> {
    let config = ctx.config;
    let layout = ctx.layout;

    let candidate = layout
        .headers
        .iter()
        .find(|h| !h.text.is_empty() && text.contains(h.text.as_str()));

    let header_like = text.chars().count() < config.header_like_max_chars
        && block
            .spans()
            .any(|s| s.size > config.header_like_min_size || s.is_bold());

    if candidate.is_none() && !header_like {
        return None;
    }

    let size = block.max_size();
    let mut level = match candidate {
        Some(h) => h.level,
        None => header_level(size, layout.body_font_size, config),
    };

    let page_max = layout.font_stats.max_size().unwrap_or(0.0);
    if page_max > layout.body_font_size * config.header_size_ratio && size >= page_max {
        level = 1;
    }
    if is_uppercase_text(text) && text.chars().count() > 3 {
        level = level.min(2);
    }
    Some(level)
}

fn apply_resume_spacing(ctx: &BlockContext, paragraph: &mut Paragraph) {
    if ctx.document.is_resume {
        paragraph.props.spacing = Spacing::new(1.0, 3.0, 1.05);
    }
}

fn strip_trailing_hyphen(paragraph: &mut Paragraph) {
    for run in paragraph.runs.iter_mut().rev() {
        if let Some(text) = run.text_mut() {
            if text.trim().is_empty() {
                continue;
            }
            let trimmed_len = text.trim_end().len();
            text.truncate(trimmed_len);
            if text.ends_with('-') {
                text.pop();
            }
            return;
        }
    }
}

/// Reject geometry that cannot be laid out.
fn validate(block: &TextBlock) -> Result<()> {
    let b = &block.bbox;
    if ![b.x0, b.y0, b.x1, b.y1].iter().all(|v| v.is_finite()) {
        return Err(Error::Emission("block has a non-finite bounding box".to_string()));
    }
    if let Some(span) = block.spans().find(|s| !s.size.is_finite() || s.size < 0.0) {
        return Err(Error::Emission(format!(
            "span {:?} has an invalid font size",
            span.text
        )));
    }
    Ok(())
}
