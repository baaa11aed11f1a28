use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::AppError;
use crate::routes::{image_url, images_base_url};
use crate::server::AppState;
use crate::storage::StoreError;

/// Multipart field carrying the file
const IMAGE_FIELD: &str = "image";

#[derive(Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: &'static str,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    pub filename: String,
}

fn no_file() -> AppError {
    AppError::BadRequest("No file uploaded".into())
}

/// POST /upload
///
/// Stores the `image` file as `<millis>_<original name>` and invalidates the
/// listing cache once the file is on disk, so the next listing includes it.
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let mut multipart = multipart.map_err(|e| {
        debug!(error = %e, "Upload is not a multipart form");
        no_file()
    })?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::from_store(StoreError::Body(e), state.expose_errors))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        // Browsers send an empty filename when no file was picked.
        let Some(original) = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
        else {
            continue;
        };

        let stored = state
            .store
            .save(Utc::now().timestamp_millis(), &original, field)
            .await
            .map_err(|e| AppError::from_store(e, state.expose_errors))?;

        state.cache.invalidate().await;
        info!(filename = %stored.filename, size = stored.size, "Image uploaded");

        let base = images_base_url(&state, &headers);
        return Ok(Json(UploadResponse {
            success: true,
            message: "Image uploaded",
            image_url: image_url(&base, &stored.filename),
            filename: stored.filename,
        }));
    }

    Err(no_file())
}
