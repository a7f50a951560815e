//! folio host entry point.
//!
//! Boots the scheme interceptor behind a loopback HTTP server. Logging goes
//! to stderr as JSON.

use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use folio_client::{FetchClient, FetchConfig, HandlerConfig, SchemeHandler};
use folio_core::{AppConfig, CacheDb};

mod error;
mod host;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let db = Arc::new(CacheDb::open(&config.db_path).await?);

    let transport = FetchClient::new(FetchConfig::from(&config))?.with_response_store(db.clone());
    let handler = SchemeHandler::new(HandlerConfig::from_app_config(&config)?, Arc::new(transport))
        .with_response_store(db.clone())
        .with_object_store(db);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(
        "Starting folio host on {} serving {}://{}/",
        listener.local_addr()?,
        config.scheme,
        config.scheme_host
    );

    axum::serve(listener, host::router(host::HostState::new(handler)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down folio host");
}
