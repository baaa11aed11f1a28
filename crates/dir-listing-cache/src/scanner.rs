//! Directory scanning

use crate::error::{Result, ScanError};
use crate::types::{ImageEntry, ImageExtensions};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Produces the current set of image entries, newest first
#[async_trait]
pub trait Scanner: Send + Sync {
    async fn scan(&self) -> Result<Vec<ImageEntry>>;
}

/// Scans one directory on the local filesystem
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    dir: PathBuf,
    extensions: ImageExtensions,
}

impl DirectoryScanner {
    pub fn new(dir: impl Into<PathBuf>, extensions: ImageExtensions) -> Self {
        Self {
            dir: dir.into(),
            extensions,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_dir_error(&self, source: std::io::Error) -> ScanError {
        ScanError::ReadDir {
            dir: self.dir.clone(),
            source,
        }
    }
}

#[async_trait]
impl Scanner for DirectoryScanner {
    async fn scan(&self) -> Result<Vec<ImageEntry>> {
        let mut read_dir = fs::read_dir(&self.dir)
            .await
            .map_err(|e| self.read_dir_error(e))?;

        let mut entries = Vec::new();
        while let Some(dir_entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| self.read_dir_error(e))?
        {
            let path = dir_entry.path();
            if !self.extensions.matches(&path) {
                continue;
            }

            let name = dir_entry.file_name().to_string_lossy().into_owned();

            // Follows symlinks; the file may also vanish between enumeration and here.
            let modified_millis = match fs::metadata(&path).await {
                Ok(meta) if meta.is_dir() => continue,
                Ok(meta) => match meta.modified() {
                    Ok(modified) => DateTime::<Utc>::from(modified).timestamp_millis(),
                    Err(e) => {
                        warn!(file = %name, error = %e, "Modification time unavailable");
                        0
                    }
                },
                Err(e) => {
                    warn!(file = %name, error = %e, "Failed to read file metadata");
                    0
                }
            };

            entries.push(ImageEntry {
                name,
                modified_millis,
            });
        }

        debug!(dir = ?self.dir, count = entries.len(), "Scanned image directory");
        Ok(sort_newest_first(entries))
    }
}

/// Sort by modification time, newest first, keeping enumeration order on ties
pub fn sort_newest_first(mut entries: Vec<ImageEntry>) -> Vec<ImageEntry> {
    // sort_by is stable
    entries.sort_by(|a, b| b.modified_millis.cmp(&a.modified_millis));
    entries
}
