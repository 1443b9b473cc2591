//! HTTP API server for the note service.

pub mod routes;

use crate::metrics::MetricsCollector;
use crate::service::NoteService;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Shared application state for the HTTP server.
pub struct AppState {
    pub service: NoteService,
    pub metrics: RwLock<MetricsCollector>,
}

impl AppState {
    pub fn new(service: NoteService) -> Self {
        Self {
            service,
            metrics: RwLock::new(MetricsCollector::new()),
        }
    }
}

/// Serve the API on `addr` until Ctrl+C.
pub async fn start(addr: &str, service: NoteService) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(service));

    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}
