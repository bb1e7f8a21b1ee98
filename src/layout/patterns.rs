//! Text patterns: list markers, rating glyphs, contact details and resume vocabulary.
//!
//! All patterns are compiled once into immutable statics.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Bullet glyph followed by whitespace
    static ref RE_GLYPH_BULLET: Regex = Regex::new(r"^\s*[•⦁◦·○●◆⬤✦]\s").unwrap();
    /// Dash bullet
    static ref RE_DASH_BULLET: Regex = Regex::new(r"^\s*[-–—]\s").unwrap();
    /// "1. "
    static ref RE_NUMBERED: Regex = Regex::new(r"^\s*\d+\.\s").unwrap();
    /// "a) "
    static ref RE_LETTERED: Regex = Regex::new(r"^\s*[a-zA-Z]\)\s").unwrap();
    /// "(1) "
    static ref RE_PARENTHESIZED: Regex = Regex::new(r"^\s*\(\d+\)\s").unwrap();

    /// Runs of rating glyphs, the only kind emitted as a label/glyph pair
    pub static ref RE_RATING_GLYPHS: Regex = Regex::new(r"[●○★☆■□]{3,}").unwrap();
    /// Label followed by a glyph run
    static ref RE_RATING_SPLIT: Regex = Regex::new(r"(.*?)([●○★☆■□]{3,})").unwrap();
    static ref RE_RATING_ANY: Vec<Regex> = vec![
        Regex::new(r"[●○★☆■□]{3,}").unwrap(),
        Regex::new(r"[|│]{3,}").unwrap(),
        Regex::new(r"[▮▯]{2,}").unwrap(),
        Regex::new(r"[0-9]+\s*/\s*[0-9]+").unwrap(),
        Regex::new(r"[0-9]+\s*out of\s*[0-9]+").unwrap(),
    ];

    pub static ref RE_EMAIL: Regex = Regex::new(r"[\w.-]+@[\w.-]+\.\w+").unwrap();
    pub static ref RE_PHONE: Regex = Regex::new(r"(?:\+|00)?[0-9()\s-]{7,}").unwrap();
    static ref RE_EMAIL_FULL: Regex = Regex::new(r"^[\w.-]+@[\w.-]+\.\w+$").unwrap();
    static ref RE_PHONE_FULL: Regex = Regex::new(r"^(?:\+|00)?[0-9()\s-]{7,}$").unwrap();

    /// Resume section names, matched against a block's whole text
    static ref RE_RESUME_SECTION: Vec<Regex> = vec![
        Regex::new(
            r"(?i)^(EDUCATION|EXPERIENCE|SKILLS|WORK HISTORY|EMPLOYMENT|PROFILE|SUMMARY|OBJECTIVE|QUALIFICATIONS)$"
        )
        .unwrap(),
        Regex::new(r"(?i)^(UTBILDNING|ARBETSLIVSERFARENHET|FÄRDIGHETER|PROFIL)$").unwrap(),
    ];
}

/// Resume keywords for the per-page signal, matched as uppercase substrings.
pub const RESUME_KEYWORDS: &[&str] = &[
    "RESUME",
    "CV",
    "CURRICULUM VITAE",
    "PROFILE",
    "EXPERIENCE",
    "EDUCATION",
    "SKILLS",
    "WORK HISTORY",
    "EMPLOYMENT",
    "KONTAKT",
    "PROFIL",
    "UTBILDNING",
    "ARBETSLIVSERFARENHET",
    "SUMMARY",
    "OBJECTIVE",
    "QUALIFICATIONS",
    "CAREER HIGHLIGHTS",
    "CERTIFICATIONS",
];

/// Paragraph style family of a list marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Bullet,
    Number,
}

/// A list marker at the start of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListMarker {
    pub kind: ListKind,
    /// First non-whitespace character of the marker
    pub glyph: char,
    /// Byte length of the marker including surrounding whitespace
    pub len: usize,
}

/// Match a list marker at the start of `line`, trying patterns in priority order.
pub fn match_list_marker(line: &str) -> Option<ListMarker> {
    let patterns: [(&Regex, ListKind); 5] = [
        (&*RE_GLYPH_BULLET, ListKind::Bullet),
        (&*RE_DASH_BULLET, ListKind::Bullet),
        (&*RE_NUMBERED, ListKind::Number),
        (&*RE_LETTERED, ListKind::Number),
        (&*RE_PARENTHESIZED, ListKind::Number),
    ];

    for (re, kind) in patterns {
        if let Some(m) = re.find(line) {
            let glyph = m.as_str().trim_start().chars().next()?;
            let rest = &line[m.end()..];
            let trailing_ws = rest.len() - rest.trim_start().len();
            return Some(ListMarker {
                kind,
                glyph,
                len: m.end() + trailing_ws,
            });
        }
    }
    None
}

/// `line` with its list marker and the following whitespace removed.
pub fn strip_list_marker(line: &str) -> Option<(ListMarker, &str)> {
    match_list_marker(line).map(|marker| (marker, &line[marker.len..]))
}

/// Whether the text contains any rating indicator.
pub fn has_rating_pattern(text: &str) -> bool {
    RE_RATING_ANY.iter().any(|re| re.is_match(text))
}

/// Split a rating line into (label, glyph run).
pub fn split_rating(line: &str) -> Option<(&str, &str)> {
    let caps = RE_RATING_SPLIT.captures(line)?;
    let label = caps.get(1).map_or("", |m| m.as_str());
    let glyphs = caps.get(2)?.as_str();
    Some((label.trim(), glyphs))
}

pub fn has_email(text: &str) -> bool {
    RE_EMAIL.is_match(text)
}

pub fn has_phone(text: &str) -> bool {
    RE_PHONE.is_match(text)
}

/// Whether the whole (trimmed) text is a URL, an email address or a phone number.
pub fn is_link_like(text: &str) -> bool {
    let text = text.trim();
    text.starts_with("http")
        || text.starts_with("www")
        || RE_EMAIL_FULL.is_match(text)
        || RE_PHONE_FULL.is_match(text)
}

/// Whether the whole text is a resume section name (English or Swedish).
pub fn is_resume_section(text: &str) -> bool {
    let text = text.trim();
    RE_RESUME_SECTION.iter().any(|re| re.is_match(text))
}

/// Number of resume keywords present in the text.
pub fn resume_keyword_count(text: &str) -> usize {
    let upper = text.to_uppercase();
    RESUME_KEYWORDS
        .iter()
        .filter(|kw| upper.contains(*kw))
        .count()
}

/// Whether all cased characters are uppercase and at least one exists.
pub fn is_uppercase_text(text: &str) -> bool {
    let mut has_cased = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            has_cased = true;
        }
    }
    has_cased
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bullet_markers() {
        let (marker, rest) = strip_list_marker("• First point").unwrap();
        assert_eq!(marker.kind, ListKind::Bullet);
        assert_eq!(marker.glyph, '•');
        assert_eq!(rest, "First point");

        let (marker, rest) = strip_list_marker("  –  dashed item").unwrap();
        assert_eq!(marker.glyph, '–');
        assert_eq!(rest, "dashed item");
    }

    #[test]
    fn test_numbered_markers() {
        for (line, glyph, rest) in [
            ("1. One", '1', "One"),
            ("b) Two", 'b', "Two"),
            ("(3) Three", '(', "Three"),
        ] {
            let (marker, stripped) = strip_list_marker(line).unwrap();
            assert_eq!(marker.kind, ListKind::Number);
            assert_eq!(marker.glyph, glyph);
            assert_eq!(stripped, rest);
        }
    }

    #[test]
    fn test_non_markers() {
        assert!(match_list_marker("•no space").is_none());
        assert!(match_list_marker("Plain text").is_none());
        assert!(match_list_marker("3.14 is pi").is_none());
    }

    #[test]
    fn test_rating_detection() {
        assert!(has_rating_pattern("Rust ●●●●○"));
        assert!(has_rating_pattern("Level ▮▮▯"));
        assert!(has_rating_pattern("Score 8/10"));
        assert!(has_rating_pattern("4 out of 5"));
        assert!(!has_rating_pattern("Nothing here ●●"));

        assert_eq!(split_rating("Python ●●●○○"), Some(("Python", "●●●○○")));
        assert_eq!(split_rating("Python"), None);
    }

    #[test]
    fn test_contact_patterns() {
        assert!(has_email("Mail me at jane.doe@example.com"));
        assert!(has_phone("Call +46 70 123 45 67"));
        assert!(is_link_like("https://example.com"));
        assert!(is_link_like("www.example.com"));
        assert!(is_link_like(" jane@example.com "));
        assert!(is_link_like("+1 (555) 123-4567"));
        assert!(!is_link_like("Contact jane@example.com today"));
    }

    #[test]
    fn test_resume_vocabulary() {
        assert!(is_resume_section("Experience"));
        assert!(is_resume_section("UTBILDNING"));
        assert!(!is_resume_section("Work experience at ACME"));
        assert_eq!(resume_keyword_count("Work Experience and Education"), 2);
    }

    #[test]
    fn test_uppercase_text() {
        assert!(is_uppercase_text("SKILLS & TOOLS"));
        assert!(!is_uppercase_text("Skills"));
        assert!(!is_uppercase_text("123"));
    }
}
