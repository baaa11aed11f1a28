use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{Json, Response};
use serde::Serialize;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::warn;

use crate::error::AppError;
use crate::routes::{image_url, images_base_url};
use crate::server::AppState;

/// Stored names carry their upload stamp, so a name never changes content
const IMAGE_CACHE_CONTROL: &str = "public, max-age=86400";

#[derive(Serialize)]
pub struct ImageLink {
    pub filename: String,
    pub url: String,
}

#[derive(Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub images: Vec<ImageLink>,
    /// When the listing behind this response was scanned, in Unix millis
    pub timestamp: i64,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub message: &'static str,
}

/// GET /images/list
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ListResponse>, AppError> {
    let listing = state
        .cache
        .get_listing()
        .await
        .map_err(|e| AppError::internal("Failed to list images", e, state.expose_errors))?;

    let base = images_base_url(&state, &headers);
    let images = listing
        .entries
        .iter()
        .map(|entry| ImageLink {
            url: image_url(&base, &entry.name),
            filename: entry.name.clone(),
        })
        .collect();

    Ok(Json(ListResponse {
        success: true,
        images,
        timestamp: listing.fetched_at_millis,
    }))
}

/// GET /images/refresh-cache
pub async fn refresh_cache(
    State(state): State<AppState>,
) -> Result<Json<RefreshResponse>, AppError> {
    state
        .cache
        .force_refresh()
        .await
        .map_err(|e| AppError::internal("Failed to refresh cache", e, state.expose_errors))?;

    Ok(Json(RefreshResponse {
        success: true,
        message: "Cache refreshed",
    }))
}

/// GET /images/{filename}
///
/// Range and conditional requests are answered by `ServeFile`.
pub async fn serve(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    let not_found = || AppError::NotFound("Image not found".into());
    let path = state.store.resolve(&filename).ok_or_else(not_found)?;

    // Directories and unreadable entries look the same to clients
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(not_found()),
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(filename = %filename, error = %e, "Failed to stat image");
            }
            return Err(not_found());
        }
    }

    let response = ServeFile::new(&path)
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {});
    if response.status() == StatusCode::NOT_FOUND {
        return Err(not_found());
    }

    let mut response = response.map(Body::new);
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(IMAGE_CACHE_CONTROL),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    Ok(response)
}
