//! HTTP boundary
//!
//! Exposes the streaming pipeline over two routes:
//! - `GET /api/stream/config/{filename}` — sizing recommendation for a file
//! - `POST /api/stream/{filename}` — stream the file as server-sent events
//!
//! The orchestrator stays synchronous; handlers bridge it onto the async
//! runtime with a blocking worker and an event channel.

pub mod routes;
pub mod sse;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::CloakstreamConfig;
use crate::scan::{PiiEngine, RegexEngine};

/// Shared state for all handlers. Cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CloakstreamConfig>,
    pub engine: Arc<dyn PiiEngine>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/stream/config/{filename}", get(routes::stream_config))
        .route("/api/stream/{filename}", post(sse::stream_file))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the server until the process is stopped.
pub async fn serve(config: CloakstreamConfig) -> Result<()> {
    let engine: Arc<dyn PiiEngine> = Arc::new(RegexEngine::new()?);
    let bind_addr = config.bind_addr.clone();
    let state = AppState { config: Arc::new(config), engine };

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(addr = %bind_addr, "listening");
    axum::serve(listener, router(state)).await.context("server error")?;
    Ok(())
}
