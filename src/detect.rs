//! Input sniffing and output target selection.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";
const VERSION_LEN: usize = 3;
/// Readers tolerate garbage before the header as long as it starts within the first KiB.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Header information of a PDF input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfHeader {
    /// PDF version (e.g., "1.7", "2.0")
    pub version: String,
    /// Byte offset of `%PDF-` in the input
    pub offset: usize,
}

impl fmt::Display for PdfHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PDF {}", self.version)
    }
}

/// Locate and validate the PDF header.
///
/// Returns [`Error::UnknownFormat`] when no `%PDF-` marker is present in the first KiB and
/// [`Error::UnsupportedVersion`] when the version is not of the form `d.d`.
pub fn sniff_pdf(data: &[u8]) -> Result<PdfHeader> {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    let offset = window
        .windows(PDF_MAGIC.len())
        .position(|w| w == PDF_MAGIC)
        .ok_or(Error::UnknownFormat)?;

    let start = offset + PDF_MAGIC.len();
    let version_bytes = data
        .get(start..start + VERSION_LEN)
        .ok_or(Error::UnknownFormat)?;
    let version = String::from_utf8_lossy(version_bytes).to_string();

    if !is_valid_version(&version) {
        return Err(Error::UnsupportedVersion(version));
    }

    Ok(PdfHeader { version, offset })
}

fn is_valid_version(version: &str) -> bool {
    let bytes = version.as_bytes();
    bytes.len() == 3 && bytes[0].is_ascii_digit() && bytes[1] == b'.' && bytes[2].is_ascii_digit()
}

/// Check if bytes look like a PDF.
pub fn is_pdf_bytes(data: &[u8]) -> bool {
    sniff_pdf(data).is_ok()
}

/// Output format of a conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    /// Office Open XML word-processing document
    #[default]
    Docx,
    /// Plain text, pages separated by a blank line
    Txt,
}

impl TargetFormat {
    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Docx => "docx",
            TargetFormat::Txt => "txt",
        }
    }

    /// Infer the target from an output path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }
}

impl FromStr for TargetFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "docx" | "word" => Ok(TargetFormat::Docx),
            "txt" | "text" => Ok(TargetFormat::Txt),
            other => Err(Error::Other(format!("Unsupported target format: {other}"))),
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_valid_pdf() {
        let header = sniff_pdf(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3").unwrap();
        assert_eq!(header.version, "1.7");
        assert_eq!(header.offset, 0);
    }

    #[test]
    fn test_sniff_leading_garbage() {
        let header = sniff_pdf(b"\x00\x00junk%PDF-2.0\n").unwrap();
        assert_eq!(header.version, "2.0");
        assert_eq!(header.offset, 6);
    }

    #[test]
    fn test_sniff_invalid_format() {
        assert!(matches!(
            sniff_pdf(b"<!DOCTYPE html>"),
            Err(Error::UnknownFormat)
        ));
        assert!(matches!(sniff_pdf(b"%PDF-1"), Err(Error::UnknownFormat)));
        assert!(matches!(sniff_pdf(b""), Err(Error::UnknownFormat)));
    }

    #[test]
    fn test_sniff_bad_version() {
        assert!(matches!(
            sniff_pdf(b"%PDF-x.y\n"),
            Err(Error::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_target_format_parsing() {
        assert_eq!("docx".parse::<TargetFormat>().unwrap(), TargetFormat::Docx);
        assert_eq!(".TXT".parse::<TargetFormat>().unwrap(), TargetFormat::Txt);
        assert!("rtf".parse::<TargetFormat>().is_err());
        assert_eq!(
            TargetFormat::from_path(Path::new("out/report.docx")),
            Some(TargetFormat::Docx)
        );
        assert_eq!(TargetFormat::from_path(Path::new("out/report")), None);
    }
}
