//! Directory-backed image listing cache
//!
//! Scans a directory for image files, sorts them newest first, and serves the
//! result from an in-memory snapshot that expires after a fixed TTL. Refreshes
//! are serialized so at most one scan is ever in flight, and writers can
//! invalidate the snapshot so the next read observes their file.

mod cache;
mod clock;
mod error;
mod scanner;
mod types;

pub use cache::{ListingCache, DEFAULT_SCAN_TIMEOUT};
pub use clock::{is_fresh, Clock, ManualClock, SystemClock};
pub use error::{Result, ScanError};
pub use scanner::{sort_newest_first, DirectoryScanner, Scanner};
pub use types::{CacheStats, ImageEntry, ImageExtensions, Listing};
