//! Listing types

use serde::{Deserialize, Serialize};
use std::path::Path;

/// File extensions served by default, lower-case and without the dot
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "svg"];

/// One image file found in the scanned directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub name: String,
    /// Last-modified time in Unix milliseconds, 0 when it could not be read
    pub modified_millis: i64,
}

impl ImageEntry {
    pub fn new(name: impl Into<String>, modified_millis: i64) -> Self {
        Self {
            name: name.into(),
            modified_millis,
        }
    }
}

/// A sorted snapshot of the directory, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub entries: Vec<ImageEntry>,
    /// Clock reading taken when the scan behind this snapshot started
    pub fetched_at_millis: i64,
}

impl Listing {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }
}

/// Counters describing cache behaviour since startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub scans: u64,
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub failures: u64,
}

/// Case-insensitive set of accepted file extensions
#[derive(Debug, Clone)]
pub struct ImageExtensions {
    extensions: Vec<String>,
}

impl ImageExtensions {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Whether the path ends in one of the accepted extensions.
    ///
    /// Dotfiles such as `.png` have no extension and never match.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|accepted| *accepted == ext)
            })
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }
}

impl Default for ImageExtensions {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_EXTENSIONS)
    }
}
