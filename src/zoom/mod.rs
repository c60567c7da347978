//! Zoom platform integration: OAuth token lifecycle, cloud recording
//! metadata, and artifact downloads.

pub mod auth;
mod client;

pub use auth::{FetchedToken, OAuthTokenFetcher, TokenFetcher, TokenManager};
pub use client::ZoomClient;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZoomApiError {
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Zoom API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("malformed response from Zoom: {0}")]
    Malformed(String),
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
}

/// One file entry from a cloud recording, as returned by the recordings API
/// or embedded in a webhook payload.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordingFile {
    pub id: Option<String>,
    pub file_type: Option<String>,
    pub file_extension: Option<String>,
    #[serde(default)]
    pub download_url: String,
    pub recording_type: Option<String>,
    pub status: Option<String>,
}

impl RecordingFile {
    pub fn file_type_is(&self, file_type: &str) -> bool {
        self.file_type
            .as_deref()
            .map(|v| v.eq_ignore_ascii_case(file_type))
            .unwrap_or(false)
    }

    pub fn is_transcript(&self) -> bool {
        self.file_type_is("TRANSCRIPT")
    }

    pub fn is_audio(&self) -> bool {
        self.file_type_is("M4A") || self.file_type_is("MP4")
    }
}

/// Read surface the pipeline needs from the recording platform. Split out as
/// a trait so tests can substitute a mock platform.
#[async_trait]
pub trait RecordingSource: Send + Sync {
    /// Lists the recording files for a meeting via the authenticated API.
    async fn list_recordings(&self, meeting_uuid: &str)
        -> Result<Vec<RecordingFile>, ZoomApiError>;

    /// Downloads a transcript file resolved through the API (bearer auth).
    async fn fetch_transcript(&self, file: &RecordingFile) -> Result<String, ZoomApiError>;

    /// Downloads an audio file resolved through the API as raw bytes.
    async fn fetch_audio(&self, file: &RecordingFile) -> Result<Vec<u8>, ZoomApiError>;

    /// Downloads a webhook-embedded artifact, walking the configured auth
    /// strategy chain until one succeeds.
    async fn fetch_webhook_artifact(
        &self,
        file: &RecordingFile,
        download_token: Option<&str>,
        passcode: Option<&str>,
    ) -> Result<Vec<u8>, ZoomApiError>;
}
