//! HTTP surface for meetcoach.
//!
//! Provides:
//! - The Zoom webhook receiver (POST /webhook)
//! - A health/status endpoint (GET /)

pub mod error;
pub mod routes;

use crate::app::AppState;
use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tracing::info;

pub struct ApiServer {
    port: u16,
    state: AppState,
}

impl ApiServer {
    pub fn new(state: AppState, port: u16) -> Self {
        Self { port, state }
    }

    /// Builds the full router. Separate from [`start`] so tests can drive
    /// it without binding a socket.
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/", get(status))
            .merge(routes::webhook::router(state))
            .layer(ServiceBuilder::new())
    }

    pub async fn start(self) -> Result<()> {
        let port = self.port;
        let app = Self::router(self.state);

        let listener = tokio::net::TcpListener::bind(&format!("0.0.0.0:{port}")).await?;

        info!("Webhook server listening on http://0.0.0.0:{port}");
        info!("Endpoints:");
        info!("  GET  /         - Service status");
        info!("  POST /webhook  - Zoom webhook receiver");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "meetcoach",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}
