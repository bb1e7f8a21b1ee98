//! Layout pattern database.
//!
//! Observed document layouts are recorded in a [`PatternStore`] so recurring templates can be
//! recognized. The store is an isolated side effect: the converter only touches it when one is
//! configured, and store failures are logged by the caller rather than surfaced.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{DocumentLayout, LayoutType};
use crate::error::{Error, Result};

/// Header sizes closer than this (points) are considered the same size.
const SIZE_MATCH_TOLERANCE: f32 = 0.5;

/// A recorded document layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutPattern {
    pub layout_type: LayoutType,
    pub body_font_size: f32,
    pub header_font_sizes: Vec<f32>,
    pub bullet_styles: BTreeSet<char>,
    pub has_ratings: bool,
    pub is_resume: bool,
    /// Number of documents matched to this pattern
    pub occurrences: u32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl LayoutPattern {
    /// New pattern from a document layout, seen once.
    pub fn from_layout(layout: &DocumentLayout) -> Self {
        let now = Utc::now();
        Self {
            layout_type: layout.layout_type,
            body_font_size: layout.body_font_size,
            header_font_sizes: layout.header_font_sizes.clone(),
            bullet_styles: layout.bullet_styles.clone(),
            has_ratings: layout.has_ratings,
            is_resume: layout.is_resume,
            occurrences: 1,
            first_seen: now,
            last_seen: now,
        }
    }

    /// Similarity in `[0, 1]`; layouts of a different type score 0.
    ///
    /// Mean of body-size closeness, header-size overlap, bullet-set overlap and agreement of the
    /// ratings and resume flags.
    pub fn similarity(&self, layout: &DocumentLayout) -> f32 {
        if self.layout_type != layout.layout_type {
            return 0.0;
        }

        let body = {
            let max = self.body_font_size.max(layout.body_font_size);
            if max > 0.0 {
                1.0 - (self.body_font_size - layout.body_font_size).abs() / max
            } else {
                1.0
            }
        };

        let headers = {
            let longest = self.header_font_sizes.len().max(layout.header_font_sizes.len());
            if longest == 0 {
                1.0
            } else {
                let matched = self
                    .header_font_sizes
                    .iter()
                    .filter(|a| {
                        layout
                            .header_font_sizes
                            .iter()
                            .any(|b| (*a - b).abs() <= SIZE_MATCH_TOLERANCE)
                    })
                    .count();
                matched as f32 / longest as f32
            }
        };

        let bullets = {
            let union = self.bullet_styles.union(&layout.bullet_styles).count();
            if union == 0 {
                1.0
            } else {
                self.bullet_styles.intersection(&layout.bullet_styles).count() as f32
                    / union as f32
            }
        };

        let flag = |a: bool, b: bool| if a == b { 1.0 } else { 0.0 };

        (body
            + headers
            + bullets
            + flag(self.has_ratings, layout.has_ratings)
            + flag(self.is_resume, layout.is_resume))
            / 5.0
    }
}

/// Outcome of recording a layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PatternMatch {
    /// An existing pattern was reinforced
    Reinforced { index: usize, similarity: f32 },
    /// A new pattern was appended
    Added { index: usize },
}

/// Persistence for layout patterns.
pub trait PatternStore: Send + Sync {
    fn load_patterns(&self) -> Result<Vec<LayoutPattern>>;

    fn save_patterns(&self, patterns: &[LayoutPattern]) -> Result<()>;
}

/// Record a document layout: reinforce the most similar stored pattern at or above `threshold`,
/// or append a new one.
pub fn record_layout(
    store: &dyn PatternStore,
    layout: &DocumentLayout,
    threshold: f32,
) -> Result<PatternMatch> {
    let mut patterns = store.load_patterns()?;

    let best = patterns
        .iter()
        .enumerate()
        .map(|(i, p)| (i, p.similarity(layout)))
        .filter(|(_, s)| *s >= threshold)
        .max_by(|a, b| a.1.total_cmp(&b.1));

    let outcome = match best {
        Some((index, similarity)) => {
            let pattern = &mut patterns[index];
            pattern.occurrences += 1;
            pattern.last_seen = Utc::now();
            PatternMatch::Reinforced { index, similarity }
        }
        None => {
            patterns.push(LayoutPattern::from_layout(layout));
            PatternMatch::Added {
                index: patterns.len() - 1,
            }
        }
    };

    store.save_patterns(&patterns)?;
    Ok(outcome)
}

/// Patterns kept in a JSON file.
///
/// A missing file reads as an empty database; saves replace the file atomically.
#[derive(Debug, Clone)]
pub struct JsonPatternStore {
    path: PathBuf,
}

impl JsonPatternStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PatternStore for JsonPatternStore {
    fn load_patterns(&self) -> Result<Vec<LayoutPattern>> {
        match std::fs::read(&self.path) {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save_patterns(&self, patterns: &[LayoutPattern]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let json = serde_json::to_vec_pretty(patterns)?;

        let mut staged = tempfile::NamedTempFile::new_in(dir)?;
        staged.write_all(&json)?;
        staged.persist(&self.path)?;
        Ok(())
    }
}

/// In-memory patterns, for tests and short-lived hosts.
#[derive(Debug, Default)]
pub struct MemoryPatternStore {
    patterns: Mutex<Vec<LayoutPattern>>,
}

impl MemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored patterns.
    pub fn patterns(&self) -> Vec<LayoutPattern> {
        self.patterns
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

impl PatternStore for MemoryPatternStore {
    fn load_patterns(&self) -> Result<Vec<LayoutPattern>> {
        self.patterns
            .lock()
            .map(|p| p.clone())
            .map_err(|_| Error::Other("pattern store lock poisoned".to_string()))
    }

    fn save_patterns(&self, patterns: &[LayoutPattern]) -> Result<()> {
        let mut guard = self
            .patterns
            .lock()
            .map_err(|_| Error::Other("pattern store lock poisoned".to_string()))?;
        *guard = patterns.to_vec();
        Ok(())
    }
}
