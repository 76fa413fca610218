use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router};
use api_shared::HeaderAuthenticator;
use portal_core::{CoreConfig, FileCatalogStore};

/// Main entry point for the resource portal
///
/// Resolves configuration once, opens the catalog and serves the REST API.
///
/// # Environment Variables
/// - `PORTAL_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `PORTAL_STORAGE_DIR`: storage root for uploaded files (default: "uploads")
/// - `PORTAL_CATALOG_DIR`: directory of catalog records (default: "catalog")
/// - `RUST_LOG`: log filter
///
/// # Errors
/// Returns an error if:
/// - the logging configuration cannot be initialised,
/// - the storage or catalog directory cannot be created or opened,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("portal_run=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("portal_core=info".parse()?)
                .add_directive("portal_files=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("PORTAL_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = Arc::new(CoreConfig::from_env_values(
        std::env::var("PORTAL_STORAGE_DIR").ok(),
        std::env::var("PORTAL_CATALOG_DIR").ok(),
    )?);
    tracing::info!("++ Storage root {}", cfg.storage_root().display());
    tracing::info!("++ Catalog dir {}", cfg.catalog_dir().display());

    let store = Arc::new(FileCatalogStore::open(cfg.catalog_dir())?);
    let state = AppState::new(cfg, store, Arc::new(HeaderAuthenticator))?;

    tracing::info!("++ Starting portal REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
