//! OOXML package writer.
//!
//! Serializes a [`WordDocument`] into the parts of a `.docx` ZIP package.

use std::fmt::Write as _;
use std::io::{Cursor, Seek, Write};

use quick_xml::escape::escape;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::model::{
    points_to_twips, BodyElement, Border, InlineImage, Paragraph, Run, RunKind, Section, Table,
    TableCell, WordDocument,
};
use super::styles::{half_points, numbering_xml};
use crate::error::Result;

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Write the package to `writer`.
pub fn write_docx<W: Write + Seek>(doc: &WordDocument, writer: W) -> Result<W> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts: [(&str, String); 9] = [
        ("[Content_Types].xml", content_types_xml(doc)),
        ("_rels/.rels", package_rels_xml()),
        ("docProps/core.xml", core_xml(doc)),
        ("docProps/app.xml", app_xml()),
        ("word/document.xml", document_xml(doc)),
        ("word/styles.xml", doc.styles.to_xml()),
        ("word/numbering.xml", numbering_xml()),
        ("word/settings.xml", settings_xml()),
        ("word/_rels/document.xml.rels", document_rels_xml(doc)),
    ];
    for (name, content) in parts {
        zip.start_file(name, options)?;
        zip.write_all(content.as_bytes())?;
    }

    for media in &doc.media {
        zip.start_file(format!("word/media/{}", media.name), options)?;
        zip.write_all(&media.bytes)?;
    }

    Ok(zip.finish()?)
}

/// Serialize the package into memory.
pub fn to_bytes(doc: &WordDocument) -> Result<Vec<u8>> {
    let cursor = write_docx(doc, Cursor::new(Vec::new()))?;
    Ok(cursor.into_inner())
}

fn content_types_xml(doc: &WordDocument) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(
        r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    );
    xml.push_str(
        r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    );
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);

    let mut extensions: Vec<(&str, &str)> = doc
        .media
        .iter()
        .map(|m| (m.format.extension(), m.format.content_type()))
        .collect();
    extensions.sort_unstable();
    extensions.dedup();
    for (ext, content_type) in extensions {
        let _ = write!(
            xml,
            r#"<Default Extension="{}" ContentType="{}"/>"#,
            ext, content_type
        );
    }

    for (part, content_type) in [
        (
            "/word/document.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml",
        ),
        (
            "/word/styles.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml",
        ),
        (
            "/word/numbering.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml",
        ),
        (
            "/word/settings.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.settings+xml",
        ),
        (
            "/docProps/core.xml",
            "application/vnd.openxmlformats-package.core-properties+xml",
        ),
        (
            "/docProps/app.xml",
            "application/vnd.openxmlformats-officedocument.extended-properties+xml",
        ),
    ] {
        let _ = write!(
            xml,
            r#"<Override PartName="{}" ContentType="{}"/>"#,
            part, content_type
        );
    }
    xml.push_str("</Types>");
    xml
}

fn package_rels_xml() -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
            r#"<Relationship Id="rId1" Type="{base}/officeDocument" Target="word/document.xml"/>"#,
            r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>"#,
            r#"<Relationship Id="rId3" Type="{base}/extended-properties" Target="docProps/app.xml"/>"#,
            r#"</Relationships>"#
        ),
        base = REL_BASE
    )
}

fn document_rels_xml(doc: &WordDocument) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (id, kind, target) in [
        ("rId1", "styles", "styles.xml"),
        ("rId2", "numbering", "numbering.xml"),
        ("rId3", "settings", "settings.xml"),
    ] {
        let _ = write!(
            xml,
            r#"<Relationship Id="{}" Type="{}/{}" Target="{}"/>"#,
            id, REL_BASE, kind, target
        );
    }
    for media in &doc.media {
        let _ = write!(
            xml,
            r#"<Relationship Id="{}" Type="{}/image" Target="media/{}"/>"#,
            media.rel_id, REL_BASE, media.name
        );
    }
    xml.push_str("</Relationships>");
    xml
}

fn core_xml(doc: &WordDocument) -> String {
    let props = &doc.properties;
    let created = props.created.format("%Y-%m-%dT%H:%M:%SZ");
    let title = props
        .title
        .as_deref()
        .map(|t| format!("<dc:title>{}</dc:title>", escape(t)))
        .unwrap_or_default();

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" "#,
            r#"xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
            "{title}<dc:creator>{creator}</dc:creator>",
            r#"<dcterms:created xsi:type="dcterms:W3CDTF">{created}</dcterms:created>"#,
            r#"<dcterms:modified xsi:type="dcterms:W3CDTF">{created}</dcterms:modified>"#,
            "</cp:coreProperties>"
        ),
        title = title,
        creator = escape(props.creator.as_str()),
        created = created,
    )
}

fn app_xml() -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties">"#,
            "<Application>pdfdocx {}</Application>",
            "</Properties>"
        ),
        env!("CARGO_PKG_VERSION")
    )
}

fn settings_xml() -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<w:settings xmlns:w="{}"><w:defaultTabStop w:val="720"/>"#,
            r#"<w:compat><w:compatSetting w:name="compatibilityMode" w:uri="http://schemas.microsoft.com/office/word" w:val="15"/></w:compat>"#,
            "</w:settings>"
        ),
        NS_W
    )
}

fn document_xml(doc: &WordDocument) -> String {
    let mut xml = String::with_capacity(16 * 1024);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    let _ = write!(
        xml,
        r#"<w:document xmlns:w="{}" xmlns:r="{}" xmlns:wp="{}" xmlns:a="{}" xmlns:pic="{}"><w:body>"#,
        NS_W, NS_R, NS_WP, NS_A, NS_PIC
    );

    let last = doc.sections.len().saturating_sub(1);
    for (i, section) in doc.sections.iter().enumerate() {
        for element in &section.body {
            match element {
                BodyElement::Paragraph(p) => write_paragraph(&mut xml, p),
                BodyElement::Table(t) => write_table(&mut xml, t),
            }
        }
        // A section's properties close it: inside a trailing paragraph for all but the last.
        if i < last {
            xml.push_str("<w:p><w:pPr>");
            write_section_properties(&mut xml, section);
            xml.push_str("</w:pPr></w:p>");
        } else {
            write_section_properties(&mut xml, section);
        }
    }
    if doc.sections.is_empty() {
        write_section_properties(&mut xml, &Section::for_page(612.0, 792.0, 0.5));
    }

    xml.push_str("</w:body></w:document>");
    xml
}

fn write_section_properties(xml: &mut String, section: &Section) {
    let orient = if section.is_landscape() {
        r#" w:orient="landscape""#
    } else {
        ""
    };
    let _ = write!(
        xml,
        concat!(
            r#"<w:sectPr><w:pgSz w:w="{w}" w:h="{h}"{orient}/>"#,
            r#"<w:pgMar w:top="{m}" w:right="{m}" w:bottom="{m}" w:left="{m}" w:header="720" w:footer="720" w:gutter="0"/>"#,
            "</w:sectPr>"
        ),
        w = section.width,
        h = section.height,
        orient = orient,
        m = section.margin,
    );
}

fn write_border(xml: &mut String, edge: &str, border: &Border) {
    let _ = write!(
        xml,
        r#"<w:{} w:val="{}" w:sz="{}" w:space="{}" w:color="{}"/>"#,
        edge, border.style, border.size, border.space, border.color
    );
}

fn write_paragraph(xml: &mut String, p: &Paragraph) {
    xml.push_str("<w:p>");

    let props = &p.props;
    let has_props = props.style.is_some()
        || props.alignment.is_some()
        || !props.spacing.is_empty()
        || props.bottom_border.is_some()
        || !props.tabs.is_empty();
    if has_props {
        xml.push_str("<w:pPr>");
        if let Some(style) = &props.style {
            let _ = write!(xml, r#"<w:pStyle w:val="{}"/>"#, escape(style.as_str()));
        }
        if let Some(border) = &props.bottom_border {
            xml.push_str("<w:pBdr>");
            write_border(xml, "bottom", border);
            xml.push_str("</w:pBdr>");
        }
        if !props.tabs.is_empty() {
            xml.push_str("<w:tabs>");
            for pos in &props.tabs {
                let _ = write!(xml, r#"<w:tab w:val="left" w:pos="{}"/>"#, pos);
            }
            xml.push_str("</w:tabs>");
        }
        if !props.spacing.is_empty() {
            xml.push_str("<w:spacing");
            if let Some(before) = props.spacing.before {
                let _ = write!(xml, r#" w:before="{}""#, points_to_twips(before));
            }
            if let Some(after) = props.spacing.after {
                let _ = write!(xml, r#" w:after="{}""#, points_to_twips(after));
            }
            if let Some(line) = props.spacing.line {
                let _ = write!(
                    xml,
                    r#" w:line="{}" w:lineRule="auto""#,
                    (line * 240.0).round() as u32
                );
            }
            xml.push_str("/>");
        }
        if let Some(alignment) = props.alignment {
            let _ = write!(xml, r#"<w:jc w:val="{}"/>"#, alignment.as_str());
        }
        xml.push_str("</w:pPr>");
    }

    for run in &p.runs {
        write_run(xml, run);
    }
    xml.push_str("</w:p>");
}

fn write_run(xml: &mut String, run: &Run) {
    xml.push_str("<w:r>");

    let props = &run.props;
    let has_props = props.font.is_some()
        || props.size.is_some()
        || props.color.is_some()
        || props.bold
        || props.italic
        || props.underline;
    if has_props {
        xml.push_str("<w:rPr>");
        if let Some(font) = &props.font {
            let font = escape(font.as_str());
            let _ = write!(
                xml,
                r#"<w:rFonts w:ascii="{0}" w:hAnsi="{0}" w:cs="{0}"/>"#,
                font
            );
        }
        if props.bold {
            xml.push_str("<w:b/><w:bCs/>");
        }
        if props.italic {
            xml.push_str("<w:i/><w:iCs/>");
        }
        if let Some(color) = &props.color {
            let _ = write!(xml, r#"<w:color w:val="{}"/>"#, escape(color.as_str()));
        }
        if let Some(size) = props.size {
            let hp = half_points(size);
            let _ = write!(xml, r#"<w:sz w:val="{0}"/><w:szCs w:val="{0}"/>"#, hp);
        }
        if props.underline {
            xml.push_str(r#"<w:u w:val="single"/>"#);
        }
        xml.push_str("</w:rPr>");
    }

    match &run.kind {
        RunKind::Text(text) => {
            let _ = write!(
                xml,
                r#"<w:t xml:space="preserve">{}</w:t>"#,
                escape(text.as_str())
            );
        }
        RunKind::Break => xml.push_str("<w:br/>"),
        RunKind::Tab => xml.push_str("<w:tab/>"),
        RunKind::Image(image) => write_drawing(xml, image),
    }
    xml.push_str("</w:r>");
}

fn write_drawing(xml: &mut String, image: &InlineImage) {
    let name = escape(image.name.as_str());
    let _ = write!(
        xml,
        concat!(
            "<w:drawing>",
            r#"<wp:inline distT="0" distB="0" distL="0" distR="0">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:docPr id="{id}" name="Picture {id}"/>"#,
            r#"<wp:cNvGraphicFramePr><a:graphicFrameLocks noChangeAspect="1"/></wp:cNvGraphicFramePr>"#,
            r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            "<pic:pic>",
            r#"<pic:nvPicPr><pic:cNvPr id="{id}" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            "</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing>"
        ),
        cx = image.width_emu,
        cy = image.height_emu,
        id = image.id,
        name = name,
        rel = image.rel_id,
    );
}

fn write_table(xml: &mut String, table: &Table) {
    xml.push_str("<w:tbl><w:tblPr>");

    let total: u32 = table.column_widths.iter().sum();
    if total > 0 {
        let _ = write!(xml, r#"<w:tblW w:w="{}" w:type="dxa"/>"#, total);
    } else {
        xml.push_str(r#"<w:tblW w:w="0" w:type="auto"/>"#);
    }

    if let Some(border) = &table.borders {
        xml.push_str("<w:tblBorders>");
        for edge in ["top", "left", "bottom", "right", "insideH", "insideV"] {
            write_border(xml, edge, border);
        }
        xml.push_str("</w:tblBorders>");
    }
    xml.push_str(r#"<w:tblLayout w:type="fixed"/>"#);
    if let Some(margin) = table.cell_margin {
        write_cell_margins(xml, "tblCellMar", margin);
    }
    xml.push_str("</w:tblPr>");

    xml.push_str("<w:tblGrid>");
    for width in &table.column_widths {
        let _ = write!(xml, r#"<w:gridCol w:w="{}"/>"#, width);
    }
    xml.push_str("</w:tblGrid>");

    for row in &table.rows {
        xml.push_str("<w:tr>");
        for (i, cell) in row.cells.iter().enumerate() {
            let width = cell.width.or_else(|| table.column_widths.get(i).copied());
            write_cell(xml, cell, width);
        }
        xml.push_str("</w:tr>");
    }
    xml.push_str("</w:tbl>");
}

fn write_cell_margins(xml: &mut String, element: &str, margin: u32) {
    let _ = write!(xml, "<w:{}>", element);
    for edge in ["top", "left", "bottom", "right"] {
        let _ = write!(xml, r#"<w:{} w:w="{}" w:type="dxa"/>"#, edge, margin);
    }
    let _ = write!(xml, "</w:{}>", element);
}

fn write_cell(xml: &mut String, cell: &TableCell, width: Option<u32>) {
    xml.push_str("<w:tc><w:tcPr>");
    match width {
        Some(w) => {
            let _ = write!(xml, r#"<w:tcW w:w="{}" w:type="dxa"/>"#, w);
        }
        None => xml.push_str(r#"<w:tcW w:w="0" w:type="auto"/>"#),
    }
    if let Some(border) = &cell.borders {
        xml.push_str("<w:tcBorders>");
        for edge in ["top", "left", "bottom", "right"] {
            write_border(xml, edge, border);
        }
        xml.push_str("</w:tcBorders>");
    }
    if let Some(margin) = cell.margin {
        write_cell_margins(xml, "tcMar", margin);
    }
    xml.push_str("</w:tcPr>");

    // A cell must end with a paragraph.
    if cell.paragraphs.is_empty() {
        xml.push_str("<w:p/>");
    }
    for p in &cell.paragraphs {
        write_paragraph(xml, p);
    }
    xml.push_str("</w:tc>");
}
