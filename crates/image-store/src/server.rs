//! HTTP server wiring
//!
//! Provides /, /health, /upload, /images/list, /images/refresh-cache and
//! /images/{filename}. Anything else answers with a JSON 404.

use crate::config::Config;
use crate::error::AppError;
use crate::routes;
use crate::storage::UploadStore;
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, Method},
    middleware::{self, Next},
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use dir_listing_cache::{CacheStats, DirectoryScanner, ImageExtensions, ListingCache};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

/// Shared state passed to all route handlers
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ListingCache<DirectoryScanner>>,
    pub store: Arc<UploadStore>,
    pub public_url: Option<String>,
    /// Include internal error detail in 500 responses
    pub expose_errors: bool,
    pub max_upload_bytes: usize,
    pub slow_request: Duration,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let extensions = ImageExtensions::default();
        let scanner = DirectoryScanner::new(&config.image_dir, extensions.clone());
        let cache =
            ListingCache::new(scanner, config.cache_ttl).with_scan_timeout(config.scan_timeout);

        Self {
            cache: Arc::new(cache),
            store: Arc::new(UploadStore::new(&config.image_dir, extensions)),
            public_url: config.public_url.clone(),
            expose_errors: !config.production,
            max_upload_bytes: config.max_upload_bytes,
            slow_request: config.slow_request,
            started_at: Utc::now(),
        }
    }
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    cache: CacheStats,
}

/// Create the HTTP router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/", get(routes::pages::index))
        .route("/health", get(health))
        .route("/upload", post(routes::upload::upload))
        // Fixed paths take priority over the filename capture
        .route("/images/list", get(routes::images::list))
        .route("/images/refresh-cache", get(routes::images::refresh_cache))
        .route("/images/{filename}", get(routes::images::serve))
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: AppState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok",
        uptime_secs,
        cache: state.cache.stats(),
    })
}

async fn not_found() -> AppError {
    AppError::NotFound("Resource not found".into())
}

/// Log each request with its duration, escalating slow ones to warn
async fn log_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status().as_u16();
    let duration_ms = elapsed.as_millis() as u64;
    if elapsed > state.slow_request {
        warn!(%method, path = %path, status, duration_ms, "Slow request");
    } else {
        debug!(%method, path = %path, status, duration_ms, "Request handled");
    }

    response
}
