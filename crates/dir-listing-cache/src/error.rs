//! Error types for directory scanning

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// The image directory could not be listed
#[derive(Debug)]
pub enum ScanError {
    /// Reading the directory itself failed (missing, permission denied, ...)
    ReadDir {
        dir: PathBuf,
        source: std::io::Error,
    },
    /// The scan did not finish within the configured bound
    TimedOut { after: Duration },
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::ReadDir { dir, source } => {
                write!(f, "Failed to read directory {}: {}", dir.display(), source)
            }
            ScanError::TimedOut { after } => {
                write!(f, "Directory scan timed out after {:?}", after)
            }
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScanError::ReadDir { source, .. } => Some(source),
            ScanError::TimedOut { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
