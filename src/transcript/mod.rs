//! Transcript normalization: VTT parsing for transcript artifacts and
//! speech-to-text for audio-only recordings.

pub mod vtt;

pub use vtt::{normalize_vtt, parse_vtt, render_cues, Cue};

use async_trait::async_trait;
use tracing::info;

use crate::config::OpenAiConfig;
use crate::openai::{OpenAiClient, OpenAiError, TranscriptionRequest, TranscriptionResponse};

/// Speech-to-text over a raw audio buffer.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribes audio into plain text, `[MM:SS]`-stamped per segment when
    /// the backend returns segment timestamps.
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        participant_hint: Option<String>,
    ) -> Result<String, OpenAiError>;
}

/// OpenAI Whisper-backed transcription.
pub struct WhisperTranscriber {
    client: Option<OpenAiClient>,
    model: String,
    language: String,
}

impl WhisperTranscriber {
    pub fn new(config: &OpenAiConfig) -> Self {
        let client = config
            .api_key
            .as_ref()
            .map(|key| OpenAiClient::new(key).with_base_url(config.api_base.clone()));
        Self {
            client,
            model: config.transcription_model.clone(),
            language: config.language.clone(),
        }
    }
}

#[async_trait]
impl SpeechToText for WhisperTranscriber {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        participant_hint: Option<String>,
    ) -> Result<String, OpenAiError> {
        let Some(client) = &self.client else {
            return Err(OpenAiError::MissingCredential);
        };

        info!("Transcribing {} bytes of meeting audio", audio.len());

        let response = client
            .transcribe_audio(TranscriptionRequest {
                bytes: audio,
                file_name: "meeting_audio.m4a".into(),
                mime_type: "audio/mp4".into(),
                model: self.model.clone(),
                language: self.language.clone(),
                prompt: participant_hint,
            })
            .await?;

        Ok(render_transcription(&response))
    }
}

/// Formats a transcription response as `[MM:SS] text` lines, falling back to
/// the plain transcript when no segments came back.
pub fn render_transcription(response: &TranscriptionResponse) -> String {
    match &response.segments {
        Some(segments) if !segments.is_empty() => segments
            .iter()
            .map(|s| format!("[{}] {}", format_timestamp(s.start), s.text.trim()))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => response.text.trim().to_string(),
    }
}

fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}
