//! Image Store - upload images over HTTP and list them newest first

use image_store::{start_server, AppState, Config, ImageStoreError, Result};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("image_store=info".parse()?)
        .add_directive("dir_listing_cache=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Image Store...");

    let config = Config::from_env();
    info!("Port: {}", config.port);
    info!("Image dir: {:?}", config.image_dir);
    info!("Listing cache TTL: {} ms", config.cache_ttl.as_millis());
    info!(
        "Max upload size: {} MB",
        config.max_upload_bytes / (1024 * 1024)
    );
    if config.production {
        info!("Production mode: internal error detail hidden from clients");
    }

    let state = AppState::new(&config);
    state.store.init().await?;

    start_server(state, config.port)
        .await
        .map_err(|e| ImageStoreError::Config(format!("Server error: {}", e)))?;

    Ok(())
}
