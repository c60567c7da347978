//! Service bootstrap and shared state.

use crate::api::ApiServer;
use crate::config::Config;
use crate::dispatch::LogSink;
use crate::events::{EventRouter, ParticipantRegistry};
use crate::feedback::OpenAiFeedbackGenerator;
use crate::pipeline::RecordingPipeline;
use crate::transcript::WhisperTranscriber;
use crate::zoom::ZoomClient;
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared state handed to every request handler. All interior mutability
/// (token cache, participant registry) lives behind explicit handles inside
/// the router, never in module globals.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub events: Arc<EventRouter>,
}

pub async fn run_service(port_override: Option<u16>) -> Result<()> {
    info!("Starting meetcoach service");

    let config = Config::load()?;
    let port = port_override.unwrap_or(config.server.port);
    let state = build_state(config);

    ApiServer::new(state, port).start().await
}

/// Wires the production collaborators together. Tests build their own
/// `AppState` with mock pipeline components instead.
pub fn build_state(config: Config) -> AppState {
    if config.zoom.webhook_secret.is_empty() {
        warn!("ZOOM_WEBHOOK_SECRET_TOKEN is not set, all signed webhooks will be rejected");
    }
    if config.openai.api_key.is_none() {
        warn!("OPENAI_API_KEY is not set, feedback will be simulated");
    }

    let registry = ParticipantRegistry::default();
    let pipeline = RecordingPipeline::new(
        Arc::new(ZoomClient::new(&config.zoom)),
        Arc::new(WhisperTranscriber::new(&config.openai)),
        Arc::new(OpenAiFeedbackGenerator::new(&config.openai)),
        Arc::new(LogSink),
        registry.clone(),
    );
    let events = EventRouter::new(registry, Arc::new(pipeline));

    AppState {
        config: Arc::new(config),
        events: Arc::new(events),
    }
}
