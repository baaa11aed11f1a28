//! TTL cache over a directory scan

use crate::clock::{is_fresh, Clock, SystemClock};
use crate::error::{Result, ScanError};
use crate::scanner::Scanner;
use crate::types::{CacheStats, Listing};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Upper bound on a single directory scan
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(30);

/// Serves a sorted directory listing, rescanning at most once per TTL window.
///
/// The snapshot lives behind a single async mutex that is held for the whole
/// check, scan and store sequence. Concurrent readers that miss queue behind
/// the first one and are served the snapshot it installed, so at most one scan
/// is ever in flight. `invalidate` and `force_refresh` take the same lock and
/// therefore order cleanly against in-flight reads.
pub struct ListingCache<S> {
    scanner: S,
    /// `None` until the first successful scan and after every invalidation
    current: Mutex<Option<Arc<Listing>>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    ttl_millis: i64,
    scan_timeout: Duration,
    scans: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
    failures: AtomicU64,
}

impl<S: Scanner> ListingCache<S> {
    /// Create an empty cache using the system clock
    pub fn new(scanner: S, ttl: Duration) -> Self {
        Self::with_clock(scanner, ttl, Arc::new(SystemClock))
    }

    /// Create an empty cache reading time from `clock`
    pub fn with_clock(scanner: S, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            scanner,
            current: Mutex::new(None),
            clock,
            ttl,
            ttl_millis: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            scans: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn with_scan_timeout(mut self, scan_timeout: Duration) -> Self {
        self.scan_timeout = scan_timeout;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn scanner(&self) -> &S {
        &self.scanner
    }

    /// Return the cached listing if it is within the TTL, otherwise rescan.
    ///
    /// A failed rescan leaves the previous state in place and returns the error.
    pub async fn get_listing(&self) -> Result<Arc<Listing>> {
        let mut current = self.current.lock().await;
        let now = self.clock.now_millis();

        if let Some(listing) = current.as_ref() {
            if is_fresh(now, listing.fetched_at_millis, self.ttl_millis) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(fetched_at = listing.fetched_at_millis, "Listing cache hit");
                return Ok(Arc::clone(listing));
            }
            debug!(
                fetched_at = listing.fetched_at_millis,
                now, "Listing cache entry expired"
            );
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let listing = self.scan_at(now).await?;
        *current = Some(Arc::clone(&listing));
        Ok(listing)
    }

    /// Drop the cached listing so the next read rescans
    pub async fn invalidate(&self) {
        let mut current = self.current.lock().await;
        *current = None;
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        debug!("Listing cache invalidated");
    }

    /// Invalidate and rescan immediately.
    ///
    /// On failure the cache is left empty.
    pub async fn force_refresh(&self) -> Result<Arc<Listing>> {
        let mut current = self.current.lock().await;
        *current = None;
        self.invalidations.fetch_add(1, Ordering::Relaxed);

        let now = self.clock.now_millis();
        let listing = self.scan_at(now).await?;
        *current = Some(Arc::clone(&listing));
        Ok(listing)
    }

    /// Get current cache counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            scans: self.scans.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    /// Run one bounded scan. Callers must hold the `current` lock.
    async fn scan_at(&self, now: i64) -> Result<Arc<Listing>> {
        self.scans.fetch_add(1, Ordering::Relaxed);

        let entries = match tokio::time::timeout(self.scan_timeout, self.scanner.scan()).await {
            Ok(Ok(entries)) => entries,
            Ok(Err(e)) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "Failed to refresh image listing");
                return Err(e);
            }
            Err(_) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                let err = ScanError::TimedOut {
                    after: self.scan_timeout,
                };
                error!(error = %err, "Failed to refresh image listing");
                return Err(err);
            }
        };

        info!(
            count = entries.len(),
            fetched_at = now,
            "Refreshed image listing"
        );

        Ok(Arc::new(Listing {
            entries,
            fetched_at_millis: now,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::scanner::DirectoryScanner;
    use crate::types::{ImageEntry, ImageExtensions};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use tempfile::tempdir;
    use tokio::sync::Notify;

    const TTL: Duration = Duration::from_millis(5000);

    /// In-memory stand-in for the image directory
    #[derive(Default)]
    struct FakeScanner {
        files: std::sync::Mutex<Vec<ImageEntry>>,
        delay_ms: AtomicU64,
        fail: AtomicBool,
        scans: AtomicUsize,
        started: Notify,
    }

    impl FakeScanner {
        fn with_files(files: Vec<ImageEntry>) -> Self {
            Self {
                files: std::sync::Mutex::new(files),
                ..Default::default()
            }
        }

        fn add(&self, entry: ImageEntry) {
            self.files.lock().unwrap().push(entry);
        }

        fn scan_count(&self) -> usize {
            self.scans.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Scanner for FakeScanner {
        async fn scan(&self) -> Result<Vec<ImageEntry>> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();

            // Snapshot before sleeping so a slow scan reflects the disk at its start.
            let snapshot = self.files.lock().unwrap().clone();
            let delay = self.delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            if self.fail.load(Ordering::SeqCst) {
                return Err(ScanError::ReadDir {
                    dir: PathBuf::from("/fake"),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
                });
            }
            Ok(crate::scanner::sort_newest_first(snapshot))
        }
    }

    fn manual_cache(scanner: FakeScanner) -> (ListingCache<FakeScanner>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let cache = ListingCache::with_clock(scanner, TTL, clock.clone());
        (cache, clock)
    }

    #[tokio::test]
    async fn test_first_read_scans() {
        let (cache, _clock) = manual_cache(FakeScanner::with_files(vec![
            ImageEntry::new("a.png", 10),
            ImageEntry::new("b.png", 20),
        ]));

        let listing = cache.get_listing().await.unwrap();
        assert_eq!(listing.names().collect::<Vec<_>>(), vec!["b.png", "a.png"]);
        assert_eq!(listing.fetched_at_millis, 1_000_000);
        assert_eq!(cache.scanner().scan_count(), 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_reads_within_ttl_do_not_rescan() {
        let (cache, clock) = manual_cache(FakeScanner::with_files(vec![ImageEntry::new(
            "a.png", 10,
        )]));

        let first = cache.get_listing().await.unwrap();
        clock.advance(5000);
        cache.scanner().add(ImageEntry::new("b.png", 20));
        let second = cache.get_listing().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.fetched_at_millis, first.fetched_at_millis);
        assert_eq!(second.len(), 1);
        assert_eq!(cache.scanner().scan_count(), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_rescans() {
        let (cache, clock) = manual_cache(FakeScanner::with_files(vec![ImageEntry::new(
            "a.png", 10,
        )]));

        cache.get_listing().await.unwrap();
        clock.advance(5001);
        cache.scanner().add(ImageEntry::new("b.png", 20));
        let listing = cache.get_listing().await.unwrap();

        assert_eq!(listing.names().collect::<Vec<_>>(), vec!["b.png", "a.png"]);
        assert_eq!(listing.fetched_at_millis, 1_005_001);
        assert_eq!(cache.scanner().scan_count(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_rescan_within_ttl() {
        let (cache, clock) = manual_cache(FakeScanner::with_files(vec![ImageEntry::new(
            "a.png", 10,
        )]));

        cache.get_listing().await.unwrap();
        clock.advance(1);
        cache.scanner().add(ImageEntry::new("b.png", 20));
        cache.invalidate().await;
        assert_eq!(cache.scanner().scan_count(), 1);

        let listing = cache.get_listing().await.unwrap();
        assert_eq!(cache.scanner().scan_count(), 2);
        assert_eq!(listing.names().next(), Some("b.png"));
        assert_eq!(listing.fetched_at_millis, 1_000_001);
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[tokio::test]
    async fn test_force_refresh_repopulates() {
        let (cache, clock) = manual_cache(FakeScanner::with_files(vec![ImageEntry::new(
            "a.png", 10,
        )]));

        cache.get_listing().await.unwrap();
        clock.advance(10);
        cache.scanner().add(ImageEntry::new("b.png", 20));

        let refreshed = cache.force_refresh().await.unwrap();
        assert_eq!(refreshed.len(), 2);
        assert_eq!(refreshed.fetched_at_millis, 1_000_010);

        // Warm: the next read is served from the refreshed snapshot.
        let listing = cache.get_listing().await.unwrap();
        assert!(Arc::ptr_eq(&refreshed, &listing));
        assert_eq!(cache.scanner().scan_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_scan_installs_nothing() {
        let scanner = FakeScanner::with_files(vec![ImageEntry::new("a.png", 10)]);
        scanner.fail.store(true, Ordering::SeqCst);
        let (cache, _clock) = manual_cache(scanner);

        assert!(matches!(
            cache.get_listing().await,
            Err(ScanError::ReadDir { .. })
        ));

        cache.scanner().fail.store(false, Ordering::SeqCst);
        let listing = cache.get_listing().await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(cache.scanner().scan_count(), 2);
        assert_eq!(cache.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_after_expiry_is_retried() {
        let (cache, clock) = manual_cache(FakeScanner::with_files(vec![ImageEntry::new(
            "a.png", 10,
        )]));

        let first = cache.get_listing().await.unwrap();
        clock.advance(6000);
        cache.scanner().fail.store(true, Ordering::SeqCst);
        assert!(cache.get_listing().await.is_err());

        cache.scanner().fail.store(false, Ordering::SeqCst);
        let second = cache.get_listing().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.fetched_at_millis, 1_006_000);
        assert_eq!(cache.scanner().scan_count(), 3);
    }

    #[tokio::test]
    async fn test_failed_force_refresh_leaves_cache_empty() {
        let (cache, _clock) = manual_cache(FakeScanner::with_files(vec![ImageEntry::new(
            "a.png", 10,
        )]));

        cache.get_listing().await.unwrap();
        cache.scanner().fail.store(true, Ordering::SeqCst);
        assert!(cache.force_refresh().await.is_err());

        cache.scanner().fail.store(false, Ordering::SeqCst);
        cache.get_listing().await.unwrap();
        assert_eq!(cache.scanner().scan_count(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_scan() {
        let scanner = FakeScanner::with_files(vec![ImageEntry::new("a.png", 10)]);
        scanner.delay_ms.store(50, Ordering::SeqCst);
        let cache = Arc::new(ListingCache::new(scanner, TTL));

        cache.get_listing().await.unwrap();
        cache.invalidate().await;

        let reads = (0..10).map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_listing().await })
        });
        let results = futures::future::join_all(reads).await;

        let listings: Vec<_> = results
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();
        assert_eq!(cache.scanner().scan_count(), 2);
        let timestamp = listings[0].fetched_at_millis;
        assert!(listings.iter().all(|l| l.fetched_at_millis == timestamp));
        assert!(listings.iter().all(|l| Arc::ptr_eq(l, &listings[0])));

        let stats = cache.stats();
        assert_eq!(stats.scans, 2);
        assert_eq!(stats.hits, 9);
    }

    #[tokio::test]
    async fn test_invalidate_waits_for_in_flight_scan() {
        let scanner = FakeScanner::with_files(vec![ImageEntry::new("a.png", 10)]);
        scanner.delay_ms.store(100, Ordering::SeqCst);
        let cache = Arc::new(ListingCache::new(scanner, TTL));

        let slow_read = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_listing().await })
        };
        cache.scanner().started.notified().await;

        // A write lands while the slow scan is running on the old disk state.
        cache.scanner().add(ImageEntry::new("new.png", 99));
        cache.invalidate().await;

        let stale = slow_read.await.unwrap().unwrap();
        assert_eq!(stale.len(), 1);

        let fresh = cache.get_listing().await.unwrap();
        assert_eq!(fresh.names().next(), Some("new.png"));
        assert_eq!(cache.scanner().scan_count(), 2);
    }

    #[tokio::test]
    async fn test_slow_scan_times_out() {
        let scanner = FakeScanner::with_files(vec![ImageEntry::new("a.png", 10)]);
        scanner.delay_ms.store(500, Ordering::SeqCst);
        let cache = ListingCache::new(scanner, TTL).with_scan_timeout(Duration::from_millis(20));

        let err = cache.get_listing().await.unwrap_err();
        assert!(matches!(err, ScanError::TimedOut { .. }));
        assert_eq!(cache.stats().failures, 1);

        cache.scanner().delay_ms.store(0, Ordering::SeqCst);
        assert_eq!(cache.get_listing().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_directory_cache_excludes_non_images() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("cat.png"), b"png").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"text").unwrap();

        let cache = ListingCache::new(
            DirectoryScanner::new(dir.path(), ImageExtensions::default()),
            TTL,
        );

        let listing = cache.get_listing().await.unwrap();
        assert_eq!(listing.names().collect::<Vec<_>>(), vec!["cat.png"]);

        std::fs::write(dir.path().join("dog.jpg"), b"jpg").unwrap();
        let listing = cache.force_refresh().await.unwrap();
        assert_eq!(listing.len(), 2);
        assert!(listing.names().all(|n| n != "notes.txt"));
    }

    #[tokio::test]
    async fn test_directory_removed_propagates_error() {
        let dir = tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir(&images).unwrap();

        let cache = ListingCache::new(
            DirectoryScanner::new(&images, ImageExtensions::default()),
            TTL,
        );
        cache.get_listing().await.unwrap();

        std::fs::remove_dir(&images).unwrap();
        assert!(matches!(
            cache.force_refresh().await,
            Err(ScanError::ReadDir { .. })
        ));
    }
}
