//! Image store service library
//!
//! Accepts image uploads over HTTP, stores them in a single directory, and
//! serves a newest-first listing backed by a short-lived listing cache.

pub mod config;
pub mod error;
pub mod routes;
pub mod server;
pub mod storage;

pub use config::Config;
pub use error::{AppError, ImageStoreError, Result};
pub use server::{create_router, start_server, AppState};
pub use storage::{StoreError, StoredImage, UploadStore};
