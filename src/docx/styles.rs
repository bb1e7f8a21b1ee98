//! Style and numbering definitions (`styles.xml`, `numbering.xml`).

use quick_xml::escape::escape;

use crate::layout::DocumentLayout;

/// Heading sizes used when the layout observed none.
const DEFAULT_HEADING_SIZES: [f32; 3] = [16.0, 14.0, 12.0];

/// Numbering instance of `ListBullet`.
pub const BULLET_NUM_ID: u32 = 1;
/// Numbering instance of `ListNumber`.
pub const NUMBER_NUM_ID: u32 = 2;

/// Document-wide styles.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleSheet {
    pub base_font: String,
    /// Points
    pub base_size: f32,
    /// Sizes of Heading1..Heading3, in points
    pub heading_sizes: [f32; 3],
}

impl Default for StyleSheet {
    fn default() -> Self {
        Self {
            base_font: crate::layout::DEFAULT_BASE_FONT.to_string(),
            base_size: crate::layout::DEFAULT_BODY_FONT_SIZE,
            heading_sizes: DEFAULT_HEADING_SIZES,
        }
    }
}

impl StyleSheet {
    /// Styles matching an analyzed document.
    pub fn from_layout(layout: &DocumentLayout) -> Self {
        let mut heading_sizes = DEFAULT_HEADING_SIZES;
        for (slot, size) in heading_sizes.iter_mut().zip(&layout.header_font_sizes) {
            *slot = *size;
        }
        Self {
            base_font: layout.base_font.clone(),
            base_size: layout.body_font_size,
            heading_sizes,
        }
    }

    /// Serialize `word/styles.xml`.
    pub fn to_xml(&self) -> String {
        let font = escape(self.base_font.as_str());
        let mut xml = String::with_capacity(4096);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push_str(
            r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
        );

        xml.push_str(&format!(
            concat!(
                r#"<w:docDefaults><w:rPrDefault><w:rPr>"#,
                r#"<w:rFonts w:ascii="{font}" w:hAnsi="{font}" w:eastAsia="{font}" w:cs="{font}"/>"#,
                r#"<w:sz w:val="{size}"/><w:szCs w:val="{size}"/>"#,
                r#"</w:rPr></w:rPrDefault>"#,
                r#"<w:pPrDefault><w:pPr><w:spacing w:after="0" w:line="240" w:lineRule="auto"/></w:pPr></w:pPrDefault>"#,
                r#"</w:docDefaults>"#
            ),
            font = font,
            size = half_points(self.base_size),
        ));

        xml.push_str(
            r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style>"#,
        );

        for (i, size) in self.heading_sizes.iter().enumerate() {
            let level = i + 1;
            xml.push_str(&format!(
                concat!(
                    r#"<w:style w:type="paragraph" w:styleId="Heading{level}">"#,
                    r#"<w:name w:val="heading {level}"/><w:basedOn w:val="Normal"/>"#,
                    r#"<w:next w:val="Normal"/><w:qFormat/>"#,
                    r#"<w:pPr><w:keepNext/><w:outlineLvl w:val="{outline}"/></w:pPr>"#,
                    r#"<w:rPr><w:b/><w:bCs/><w:sz w:val="{size}"/><w:szCs w:val="{size}"/></w:rPr>"#,
                    r#"</w:style>"#
                ),
                level = level,
                outline = i,
                size = half_points(*size),
            ));
        }

        for (id, name, num_id) in [
            ("ListBullet", "List Bullet", BULLET_NUM_ID),
            ("ListNumber", "List Number", NUMBER_NUM_ID),
        ] {
            xml.push_str(&format!(
                concat!(
                    r#"<w:style w:type="paragraph" w:styleId="{id}">"#,
                    r#"<w:name w:val="{name}"/><w:basedOn w:val="Normal"/>"#,
                    r#"<w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="{num_id}"/></w:numPr>"#,
                    r#"<w:ind w:left="360" w:hanging="360"/></w:pPr>"#,
                    r#"</w:style>"#
                ),
                id = id,
                name = name,
                num_id = num_id,
            ));
        }

        xml.push_str(
            r#"<w:style w:type="table" w:default="1" w:styleId="TableNormal"><w:name w:val="Normal Table"/><w:tblPr><w:tblInd w:w="0" w:type="dxa"/><w:tblCellMar><w:left w:w="108" w:type="dxa"/><w:right w:w="108" w:type="dxa"/></w:tblCellMar></w:tblPr></w:style>"#,
        );
        xml.push_str("</w:styles>");
        xml
    }
}

/// Serialize `word/numbering.xml`: a bullet list and a decimal list.
pub fn numbering_xml() -> String {
    let mut xml = String::with_capacity(1024);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(
        r#"<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    );
    for (abstract_id, format, text) in [(0, "bullet", "•"), (1, "decimal", "%1.")] {
        xml.push_str(&format!(
            concat!(
                r#"<w:abstractNum w:abstractNumId="{id}"><w:multiLevelType w:val="singleLevel"/>"#,
                r#"<w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="{format}"/>"#,
                r#"<w:lvlText w:val="{text}"/><w:lvlJc w:val="left"/>"#,
                r#"<w:pPr><w:ind w:left="360" w:hanging="360"/></w:pPr></w:lvl></w:abstractNum>"#
            ),
            id = abstract_id,
            format = format,
            text = text,
        ));
    }
    for (num_id, abstract_id) in [(BULLET_NUM_ID, 0), (NUMBER_NUM_ID, 1)] {
        xml.push_str(&format!(
            r#"<w:num w:numId="{}"><w:abstractNumId w:val="{}"/></w:num>"#,
            num_id, abstract_id
        ));
    }
    xml.push_str("</w:numbering>");
    xml
}

/// Font size in half-points.
pub fn half_points(size: f32) -> u32 {
    (size * 2.0).round().max(1.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_styles_from_layout() {
        let layout = DocumentLayout {
            header_font_sizes: vec![24.0],
            body_font_size: 10.0,
            base_font: "Georgia & Co".to_string(),
            ..DocumentLayout::default()
        };
        let styles = StyleSheet::from_layout(&layout);
        assert_eq!(styles.heading_sizes, [24.0, 14.0, 12.0]);

        let xml = styles.to_xml();
        assert!(xml.contains(r#"w:ascii="Georgia &amp; Co""#));
        assert!(xml.contains(r#"w:styleId="Heading3""#));
        assert!(xml.contains(r#"w:styleId="ListNumber""#));
        assert!(roxmltree::Document::parse(&xml).is_ok());
    }

    #[test]
    fn test_numbering_is_well_formed() {
        let xml = numbering_xml();
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let nums = doc
            .descendants()
            .filter(|n| n.has_tag_name((
                "http://schemas.openxmlformats.org/wordprocessingml/2006/main",
                "num",
            )))
            .count();
        assert_eq!(nums, 2);
        assert_eq!(half_points(10.5), 21);
    }
}
