//! Webhook event types and dispatch.
//!
//! Events arrive pre-verified from the HTTP layer. Dispatch is tolerant by
//! design: unknown event types are acknowledged and logged, partial payloads
//! degrade to "unknown participants", and pipeline failures are contained
//! here so the webhook sender always gets its acknowledgment.

pub mod registry;

pub use registry::{Participant, ParticipantRegistry};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::pipeline::{PipelineContext, RecordingPipeline};
use crate::zoom::RecordingFile;

pub mod event_types {
    pub const URL_VALIDATION: &str = "endpoint.url_validation";
    pub const PARTICIPANT_JOINED: &str = "meeting.participant_joined";
    pub const PARTICIPANT_LEFT: &str = "meeting.participant_left";
    pub const RECORDING_COMPLETED: &str = "recording.completed";
    pub const TRANSCRIPT_COMPLETED: &str = "recording.transcript_completed";
}

/// A verified webhook delivery, parsed from the raw body.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub event_ts: Option<i64>,
    #[serde(default)]
    pub payload: Value,
    /// One-time token for webhook-embedded download URLs, when Zoom sends one.
    #[serde(default)]
    pub download_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ParticipantObject {
    pub uuid: Option<String>,
    pub participant: Option<ParticipantInfo>,
}

/// Participant fields as they appear on the wire. Times stay strings here
/// so one unparsable timestamp cannot sink the whole event.
#[derive(Debug, Deserialize)]
pub struct ParticipantInfo {
    pub id: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub join_time: Option<String>,
    pub leave_time: Option<String>,
}

impl From<ParticipantInfo> for Participant {
    fn from(info: ParticipantInfo) -> Self {
        let join_time = info
            .join_time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc));

        Participant {
            id: info.id,
            user_id: info.user_id,
            name: info
                .user_name
                .unwrap_or_else(|| "Unknown participant".to_string()),
            email: info.email,
            join_time,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RecordingObject {
    pub uuid: Option<String>,
    pub topic: Option<String>,
    #[serde(default)]
    pub recording_files: Vec<RecordingFile>,
    pub recording_play_passcode: Option<String>,
    pub password: Option<String>,
}

/// Pulls the typed `object` out of an event payload, degrading to `None`
/// (with a log line) on any shape mismatch.
pub fn payload_object<T: DeserializeOwned>(payload: &Value) -> Option<T> {
    let object = payload.get("object")?.clone();
    match serde_json::from_value(object) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(error = %e, "Could not parse event payload object");
            None
        }
    }
}

/// Routes verified events to their handlers.
pub struct EventRouter {
    registry: ParticipantRegistry,
    pipeline: Arc<RecordingPipeline>,
}

impl EventRouter {
    pub fn new(registry: ParticipantRegistry, pipeline: Arc<RecordingPipeline>) -> Self {
        Self { registry, pipeline }
    }

    pub async fn dispatch(&self, event: WebhookEvent) {
        match event.event.as_str() {
            event_types::PARTICIPANT_JOINED => self.handle_participant_joined(&event).await,
            event_types::PARTICIPANT_LEFT => self.handle_participant_left(&event).await,
            event_types::RECORDING_COMPLETED => {
                let uuid = payload_object::<RecordingObject>(&event.payload)
                    .and_then(|o| o.uuid)
                    .unwrap_or_default();
                info!(
                    meeting_uuid = %uuid,
                    "Recording available, waiting for transcript completion"
                );
            }
            event_types::TRANSCRIPT_COMPLETED => self.handle_transcript_completed(event).await,
            other => info!(event = other, "Ignoring unrecognized webhook event"),
        }
    }

    async fn handle_participant_joined(&self, event: &WebhookEvent) {
        let Some(object) = payload_object::<ParticipantObject>(&event.payload) else {
            return;
        };
        let (Some(uuid), Some(info)) = (object.uuid, object.participant) else {
            warn!("Participant joined event without meeting uuid or participant");
            return;
        };

        let participant = Participant::from(info);
        info!(meeting_uuid = %uuid, name = %participant.name, "Participant joined");
        self.registry.track_join(&uuid, participant).await;
    }

    async fn handle_participant_left(&self, event: &WebhookEvent) {
        let Some(object) = payload_object::<ParticipantObject>(&event.payload) else {
            return;
        };
        let (Some(uuid), Some(info)) = (object.uuid, object.participant) else {
            warn!("Participant left event without meeting uuid or participant");
            return;
        };

        let participant = Participant::from(info);
        info!(meeting_uuid = %uuid, name = %participant.name, "Participant left");
        self.registry.track_leave(&uuid, &participant).await;
    }

    async fn handle_transcript_completed(&self, event: WebhookEvent) {
        let Some(object) = payload_object::<RecordingObject>(&event.payload) else {
            warn!("Transcript completed event without a parsable object");
            return;
        };
        let Some(uuid) = object.uuid else {
            warn!("Transcript completed event without a meeting uuid");
            return;
        };

        if !self.registry.begin_pipeline(&uuid).await {
            info!(
                meeting_uuid = %uuid,
                "Pipeline already running for meeting, skipping duplicate event"
            );
            return;
        }

        let context = PipelineContext {
            meeting_uuid: uuid.clone(),
            topic: object.topic,
            webhook_files: object.recording_files,
            download_token: event.download_token,
            passcode: object.recording_play_passcode.or(object.password),
        };

        // Single catch point for the whole pipeline: failures are logged and
        // swallowed so the webhook sender still gets its 200.
        let result = self.pipeline.run(context).await;
        self.registry.finish_pipeline(&uuid).await;

        if let Err(e) = result {
            error!(meeting_uuid = %uuid, error = ?e, "Feedback pipeline failed");
        }
    }
}
