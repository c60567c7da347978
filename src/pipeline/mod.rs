//! The recording-to-feedback pipeline.
//!
//! One run per `recording.transcript_completed` event: resolve an artifact
//! (API metadata first, webhook-embedded URLs as fallback), normalize it to
//! plain text, generate feedback, and hand the report to the sink. The
//! caller owns the in-flight guard and the catch-all error handling.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dispatch::{FeedbackReport, FeedbackSink};
use crate::events::{Participant, ParticipantRegistry};
use crate::feedback::FeedbackGenerator;
use crate::transcript::{self, SpeechToText};
use crate::zoom::{RecordingFile, RecordingSource};

/// Everything the webhook payload contributes to a run.
pub struct PipelineContext {
    pub meeting_uuid: String,
    pub topic: Option<String>,
    /// Recording files embedded in the webhook payload, used when the API
    /// lookup is unavailable.
    pub webhook_files: Vec<RecordingFile>,
    pub download_token: Option<String>,
    pub passcode: Option<String>,
}

pub struct RecordingPipeline {
    source: Arc<dyn RecordingSource>,
    speech_to_text: Arc<dyn SpeechToText>,
    generator: Arc<dyn FeedbackGenerator>,
    sink: Arc<dyn FeedbackSink>,
    registry: ParticipantRegistry,
}

impl RecordingPipeline {
    pub fn new(
        source: Arc<dyn RecordingSource>,
        speech_to_text: Arc<dyn SpeechToText>,
        generator: Arc<dyn FeedbackGenerator>,
        sink: Arc<dyn FeedbackSink>,
        registry: ParticipantRegistry,
    ) -> Self {
        Self {
            source,
            speech_to_text,
            generator,
            sink,
            registry,
        }
    }

    pub async fn run(&self, context: PipelineContext) -> Result<()> {
        let run_id = Uuid::new_v4();
        info!(%run_id, meeting_uuid = %context.meeting_uuid, "Starting feedback pipeline");

        let participants = self.registry.snapshot(&context.meeting_uuid).await;
        if participants.is_empty() {
            info!("No tracked participants for meeting, proceeding with unknown roster");
        }

        let Some(transcript) = self.resolve_transcript(&context, &participants).await? else {
            warn!(
                meeting_uuid = %context.meeting_uuid,
                "No transcript or audio artifact available, nothing to analyze"
            );
            return Ok(());
        };

        let outcome = self
            .generator
            .generate(&transcript, &participants)
            .await
            .context("feedback generation failed")?;

        let report = FeedbackReport {
            run_id,
            meeting_uuid: context.meeting_uuid.clone(),
            topic: context.topic,
            participants,
            outcome,
        };
        self.sink
            .deliver(&report)
            .await
            .context("feedback delivery failed")?;

        // Feedback is out the door; the meeting's registry entry is done.
        self.registry.clear(&context.meeting_uuid).await;

        info!(%run_id, "Pipeline complete");
        Ok(())
    }

    /// Resolves a normalized transcript, preferring API-resolved recording
    /// files over the webhook-embedded fallback URLs.
    async fn resolve_transcript(
        &self,
        context: &PipelineContext,
        participants: &[Participant],
    ) -> Result<Option<String>> {
        match self.source.list_recordings(&context.meeting_uuid).await {
            Ok(files) => {
                if let Some(file) = files.iter().find(|f| f.is_transcript()) {
                    let raw = self
                        .source
                        .fetch_transcript(file)
                        .await
                        .context("transcript download failed")?;
                    return Ok(Some(transcript::normalize_vtt(&raw)));
                }
                if let Some(file) = pick_audio(&files) {
                    let audio = self
                        .source
                        .fetch_audio(file)
                        .await
                        .context("audio download failed")?;
                    let text = self
                        .speech_to_text
                        .transcribe(audio, participant_hint(participants))
                        .await
                        .context("speech-to-text failed")?;
                    return Ok(Some(text));
                }
                warn!("Recording listing had no transcript or audio files");
            }
            Err(e) => {
                warn!(error = %e, "Recording listing failed, falling back to webhook URLs");
            }
        }

        if let Some(file) = context.webhook_files.iter().find(|f| f.is_transcript()) {
            let bytes = self
                .source
                .fetch_webhook_artifact(
                    file,
                    context.download_token.as_deref(),
                    context.passcode.as_deref(),
                )
                .await
                .context("webhook transcript download failed")?;
            let raw = String::from_utf8_lossy(&bytes);
            return Ok(Some(transcript::normalize_vtt(&raw)));
        }

        if let Some(file) = pick_audio(&context.webhook_files) {
            let audio = self
                .source
                .fetch_webhook_artifact(
                    file,
                    context.download_token.as_deref(),
                    context.passcode.as_deref(),
                )
                .await
                .context("webhook audio download failed")?;
            let text = self
                .speech_to_text
                .transcribe(audio, participant_hint(participants))
                .await
                .context("speech-to-text failed")?;
            return Ok(Some(text));
        }

        Ok(None)
    }
}

/// Audio-only M4A beats the MP4 screen recording when both are present.
fn pick_audio(files: &[RecordingFile]) -> Option<&RecordingFile> {
    files
        .iter()
        .find(|f| f.file_type_is("M4A"))
        .or_else(|| files.iter().find(|f| f.is_audio()))
}

fn participant_hint(participants: &[Participant]) -> Option<String> {
    if participants.is_empty() {
        return None;
    }
    let names = participants
        .iter()
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!("Meeting participants: {names}"))
}
