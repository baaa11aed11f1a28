//! Upload directory: naming, streaming writes, and path resolution

use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use dir_listing_cache::ImageExtensions;
use futures::{Stream, StreamExt};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Suffix for files still being written; never an accepted image extension
const PARTIAL_SUFFIX: &str = ".part";

/// Distinct millisecond stamps tried before giving up on a name
const NAME_ATTEMPTS: i64 = 16;

#[derive(Debug)]
pub enum StoreError {
    /// The client-supplied file name has nothing usable in it
    InvalidName,
    /// The upload stream failed part way through
    Body(MultipartError),
    Io(std::io::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::InvalidName => write!(f, "Invalid file name"),
            StoreError::Body(err) => write!(f, "Upload body error: {}", err),
            StoreError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Body(err) => Some(err),
            StoreError::Io(err) => Some(err),
            StoreError::InvalidName => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

/// A successfully written upload
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
}

/// The directory uploads are written to and served from
#[derive(Debug)]
pub struct UploadStore {
    dir: PathBuf,
    extensions: ImageExtensions,
    /// Names picked by uploads that have not been linked into place yet
    in_flight: Mutex<HashSet<String>>,
}

/// Holds a name in `in_flight` until dropped
struct Reservation<'a> {
    store: &'a UploadStore,
    filename: String,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.store.in_flight().remove(&self.filename);
    }
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, extensions: ImageExtensions) -> Self {
        Self {
            dir: dir.into(),
            extensions,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn in_flight(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ensure the upload directory exists
    pub async fn init(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir).await?;
        info!(image_dir = ?self.dir, "Upload directory ready");
        Ok(())
    }

    /// `<millis>_<basename>`, or `None` if the original name has no usable basename.
    ///
    /// `save` passes a later `now_millis` when the first choice is taken, so a
    /// stored stamp can run up to `NAME_ATTEMPTS - 1` ms past the upload time.
    pub fn stored_name(now_millis: i64, original: &str) -> Option<String> {
        let basename = original.rsplit(['/', '\\']).next()?.trim();
        if basename.is_empty() || basename == "." || basename == ".." {
            return None;
        }
        Some(format!("{}_{}", now_millis, basename))
    }

    /// Stream an upload to disk and make it visible under its final name.
    ///
    /// Bytes go to a `.part` file that is synced and then hard linked into
    /// place, so a directory scan never sees a half-written image and an
    /// existing image is never replaced. The partial file is removed on every
    /// exit path, including the future being dropped mid-write.
    pub async fn save<S>(
        &self,
        now_millis: i64,
        original: &str,
        body: S,
    ) -> Result<StoredImage, StoreError>
    where
        S: Stream<Item = Result<Bytes, MultipartError>>,
    {
        let (mut reservation, mut offset, partial, file) =
            self.begin(now_millis, original).await?;
        let size = write_all(file, body).await?;

        // Another process may have taken the name while we were writing.
        let path = loop {
            let path = self.dir.join(&reservation.filename);
            match fs::hard_link(&partial.path, &path).await {
                Ok(()) => break path,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!(filename = %reservation.filename, "Name taken before publish");
                    (reservation, offset) = self.claim(now_millis, original, offset + 1).await?;
                }
                Err(e) => return Err(e.into()),
            }
        };

        partial.remove().await;
        sync_dir(&self.dir).await?;

        let filename = reservation.filename.clone();
        drop(reservation);
        debug!(filename = %filename, size, "Stored upload");
        Ok(StoredImage {
            filename,
            path,
            size,
        })
    }

    /// Reserve a name and create its partial file
    async fn begin(
        &self,
        now_millis: i64,
        original: &str,
    ) -> Result<(Reservation<'_>, i64, PartialUpload, File), StoreError> {
        let mut from = 0;
        loop {
            let (reservation, offset) = self.claim(now_millis, original, from).await?;
            let partial = self
                .dir
                .join(format!("{}{}", reservation.filename, PARTIAL_SUFFIX));
            let opened = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&partial)
                .await;
            match opened {
                Ok(file) => return Ok((reservation, offset, PartialUpload::new(partial), file)),
                // Left over from a crashed process
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => from = offset + 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Claim the first name from stamp offset `from` on that no finished or
    /// in-flight upload uses.
    ///
    /// The name goes into `in_flight` before the directory is checked. An
    /// upload only releases its name after linking the file into place, so
    /// a concurrent claimer either sees the reservation or the file.
    async fn claim(
        &self,
        now_millis: i64,
        original: &str,
        from: i64,
    ) -> Result<(Reservation<'_>, i64), StoreError> {
        for offset in from..NAME_ATTEMPTS {
            let filename =
                Self::stored_name(now_millis + offset, original).ok_or(StoreError::InvalidName)?;
            if !self.in_flight().insert(filename.clone()) {
                continue;
            }
            let reservation = Reservation {
                store: self,
                filename,
            };
            if fs::try_exists(self.dir.join(&reservation.filename)).await? {
                continue;
            }
            return Ok((reservation, offset));
        }

        Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "no free file name for upload",
        )))
    }

    /// Map a requested file name to a servable image path inside the directory
    pub fn resolve(&self, filename: &str) -> Option<PathBuf> {
        if filename.is_empty()
            || filename.contains(['/', '\\', '\0'])
            || filename == "."
            || filename == ".."
        {
            return None;
        }

        let path = self.dir.join(filename);
        self.extensions.matches(&path).then_some(path)
    }
}

async fn write_all<S>(mut file: File, body: S) -> Result<u64, StoreError>
where
    S: Stream<Item = Result<Bytes, MultipartError>>,
{
    futures::pin_mut!(body);

    let mut size = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(StoreError::Body)?;
        file.write_all(&chunk).await?;
        size += chunk.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(size)
}

/// A `.part` file that is deleted when dropped unless already removed
struct PartialUpload {
    path: PathBuf,
    armed: bool,
}

impl PartialUpload {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    async fn remove(mut self) {
        self.armed = false;
        if let Err(e) = fs::remove_file(&self.path).await {
            warn!(path = ?self.path, error = %e, "Failed to remove partial upload");
        }
    }
}

impl Drop for PartialUpload {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = ?self.path, "Removed abandoned partial upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = ?self.path, error = %e, "Failed to remove partial upload"),
        }
    }
}

/// Flush directory entries so a linked upload survives a crash
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
