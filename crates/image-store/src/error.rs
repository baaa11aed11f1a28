//! Error types for the image store

use crate::storage::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;

/// Startup and server-level failures
#[derive(Debug)]
pub enum ImageStoreError {
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for ImageStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageStoreError::Io(err) => write!(f, "IO error: {}", err),
            ImageStoreError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ImageStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImageStoreError::Io(err) => Some(err.as_ref()),
            ImageStoreError::Config(_) => None,
        }
    }
}

impl From<std::io::Error> for ImageStoreError {
    fn from(err: std::io::Error) -> Self {
        ImageStoreError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for ImageStoreError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ImageStoreError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ImageStoreError>;

/// Request error that renders as `{ success: false, message, error? }`
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    PayloadTooLarge(String),
    /// `detail` is only sent to clients outside production
    Internal {
        message: String,
        detail: Option<String>,
    },
}

impl AppError {
    /// Log the full error and build a 500 that exposes it only when allowed
    pub fn internal(message: &str, err: impl fmt::Display, expose_detail: bool) -> Self {
        tracing::error!(error = %err, "{}", message);
        AppError::Internal {
            message: message.to_string(),
            detail: expose_detail.then(|| err.to_string()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map a storage failure during an upload
    pub fn from_store(err: StoreError, expose_detail: bool) -> Self {
        match err {
            StoreError::InvalidName => AppError::BadRequest("Invalid file name".into()),
            StoreError::Body(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                AppError::PayloadTooLarge("Upload exceeds the size limit".into())
            }
            StoreError::Body(e) => {
                tracing::warn!(error = %e, "Upload body could not be read");
                AppError::BadRequest("Malformed upload".into())
            }
            err @ StoreError::Io(_) => {
                AppError::internal("Failed to store image", err, expose_detail)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::BadRequest(message)
            | AppError::NotFound(message)
            | AppError::PayloadTooLarge(message) => json!({ "success": false, "message": message }),
            AppError::Internal {
                message,
                detail: Some(detail),
            } => json!({ "success": false, "message": message, "error": detail }),
            AppError::Internal {
                message,
                detail: None,
            } => json!({ "success": false, "message": message }),
        };

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[test]
    fn test_config_error_display() {
        let err = ImageStoreError::Config("missing IMAGE_DIR".to_string());
        assert_eq!(format!("{}", err), "Configuration error: missing IMAGE_DIR");
    }

    #[test]
    fn test_io_error_display() {
        let err: ImageStoreError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert_eq!(format!("{}", err), "IO error: denied");
    }

    #[tokio::test]
    async fn test_bad_request_body() {
        let (status, json) = body_json(AppError::BadRequest("No file uploaded".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "No file uploaded");
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn test_internal_exposes_detail_outside_production() {
        let err = AppError::internal("Failed to list images", "directory missing", true);
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "Failed to list images");
        assert_eq!(json["error"], "directory missing");
    }

    #[tokio::test]
    async fn test_internal_hides_detail_in_production() {
        let err = AppError::internal("Failed to list images", "directory missing", false);
        let (_, json) = body_json(err).await;
        assert_eq!(json["success"], false);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_invalid_name_is_bad_request() {
        let err = AppError::from_store(StoreError::InvalidName, true);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
