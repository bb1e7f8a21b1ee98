//! Emitted document model and OOXML (`.docx`) serialization.

mod model;
mod styles;
mod writer;

pub use model::{
    inches_to_twips, points_to_twips, Alignment, BodyElement, Border, DocumentProperties,
    InlineImage, MediaPart, Paragraph, ParagraphProperties, Run, RunKind, RunProperties, Section,
    Spacing, Table, TableCell, TableRow, WordDocument, EMU_PER_POINT, TWIPS_PER_INCH,
    TWIPS_PER_POINT,
};
pub use styles::{half_points, numbering_xml, StyleSheet, BULLET_NUM_ID, NUMBER_NUM_ID};
pub use writer::{to_bytes, write_docx};

/// Style id of a heading level (clamped to 1..=3).
pub fn heading_style(level: u8) -> String {
    format!("Heading{}", level.clamp(1, 3))
}

/// Style id of bulleted list items.
pub const LIST_BULLET_STYLE: &str = "ListBullet";
/// Style id of numbered list items.
pub const LIST_NUMBER_STYLE: &str = "ListNumber";
