pub mod images;
pub mod pages;
pub mod upload;

use axum::http::{header, HeaderMap};

use crate::server::AppState;

/// Base URL for links to stored images, e.g. `http://localhost:3000/images/`
pub(crate) fn images_base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(public_url) = &state.public_url {
        return format!("{}/images/", public_url);
    }

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("http");

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    format!("{}://{}/images/", scheme, host)
}

/// Full URL for one stored image
pub(crate) fn image_url(base: &str, filename: &str) -> String {
    format!("{}{}", base, urlencoding::encode(filename))
}
