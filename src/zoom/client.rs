use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::auth::{OAuthTokenFetcher, TokenManager};
use super::{RecordingFile, RecordingSource, ZoomApiError};
use crate::config::{DownloadAuth, ZoomConfig};
use async_trait::async_trait;

const API_TIMEOUT: Duration = Duration::from_secs(10);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Authenticated client for the Zoom cloud recording API.
pub struct ZoomClient {
    http: reqwest::Client,
    tokens: TokenManager,
    api_base: String,
    download_auth: Vec<DownloadAuth>,
}

#[derive(Debug, Deserialize)]
struct RecordingListing {
    #[serde(default)]
    recording_files: Vec<RecordingFile>,
}

impl ZoomClient {
    pub fn new(config: &ZoomConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            tokens: TokenManager::new(OAuthTokenFetcher::new(config)),
            api_base: config.api_base.clone(),
            download_auth: config.download_auth.clone(),
        }
    }

    /// Builds the recordings URL with the meeting UUID as a single encoded
    /// path segment. Zoom UUIDs can contain `/` and `=`, which must not be
    /// interpreted as path structure.
    fn recordings_url(&self, meeting_uuid: &str) -> Result<Url, ZoomApiError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| ZoomApiError::Malformed(format!("invalid API base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ZoomApiError::Malformed("API base URL cannot hold paths".into()))?
            .push("meetings")
            .push(meeting_uuid)
            .push("recordings");
        Ok(url)
    }

    async fn download_with_bearer(&self, url: &str) -> Result<Vec<u8>, ZoomApiError> {
        let token = self.tokens.access_token(false).await?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(&token)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?;

        Self::ensure_success(resp).await
    }

    async fn download_with_query(
        &self,
        url: &str,
        param: &str,
        value: &str,
    ) -> Result<Vec<u8>, ZoomApiError> {
        let mut url = Url::parse(url)
            .map_err(|e| ZoomApiError::Malformed(format!("invalid download URL: {e}")))?;
        url.query_pairs_mut().append_pair(param, value);

        let resp = self.http.get(url).timeout(DOWNLOAD_TIMEOUT).send().await?;
        Self::ensure_success(resp).await
    }

    async fn ensure_success(resp: reqwest::Response) -> Result<Vec<u8>, ZoomApiError> {
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(ZoomApiError::Api { status, message });
        }
        // Raw bytes: audio artifacts must never go through text decoding.
        Ok(resp.bytes().await?.to_vec())
    }

    async fn try_strategy(
        &self,
        strategy: DownloadAuth,
        url: &str,
        download_token: Option<&str>,
        passcode: Option<&str>,
    ) -> Result<Vec<u8>, ZoomApiError> {
        match strategy {
            DownloadAuth::BearerHeader => self.download_with_bearer(url).await,
            DownloadAuth::AccessTokenQuery => {
                // Webhook deliveries carry a one-time download token; fall
                // back to the OAuth token when the payload had none.
                let value = match download_token {
                    Some(token) => token.to_string(),
                    None => self.tokens.access_token(false).await?,
                };
                self.download_with_query(url, "access_token", &value).await
            }
            DownloadAuth::PasscodeQuery => {
                let passcode = passcode.ok_or(ZoomApiError::MissingCredential(
                    "no recording passcode in the webhook payload",
                ))?;
                self.download_with_query(url, "pwd", passcode).await
            }
        }
    }
}

#[async_trait]
impl RecordingSource for ZoomClient {
    async fn list_recordings(
        &self,
        meeting_uuid: &str,
    ) -> Result<Vec<RecordingFile>, ZoomApiError> {
        let url = self.recordings_url(meeting_uuid)?;
        let token = self.tokens.access_token(false).await?;

        let mut resp = self
            .http
            .get(url.clone())
            .bearer_auth(&token)
            .timeout(API_TIMEOUT)
            .send()
            .await?;

        // A stale-but-uncached 401 (e.g. revoked scopes) gets one forced
        // refresh before giving up.
        if resp.status() == StatusCode::UNAUTHORIZED {
            debug!("Recordings request rejected, refreshing access token");
            let token = self.tokens.access_token(true).await?;
            resp = self
                .http
                .get(url)
                .bearer_auth(&token)
                .timeout(API_TIMEOUT)
                .send()
                .await?;
        }

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            let message = upstream_message(&body);
            return Err(ZoomApiError::Api { status, message });
        }

        let body = resp.text().await?;
        let listing: RecordingListing = serde_json::from_str(&body)
            .map_err(|e| ZoomApiError::Malformed(format!("recordings listing: {e}")))?;

        info!(
            meeting_uuid,
            files = listing.recording_files.len(),
            "Fetched recording metadata"
        );
        Ok(listing.recording_files)
    }

    async fn fetch_transcript(&self, file: &RecordingFile) -> Result<String, ZoomApiError> {
        let bytes = self.download_with_bearer(&file.download_url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn fetch_audio(&self, file: &RecordingFile) -> Result<Vec<u8>, ZoomApiError> {
        self.download_with_bearer(&file.download_url).await
    }

    async fn fetch_webhook_artifact(
        &self,
        file: &RecordingFile,
        download_token: Option<&str>,
        passcode: Option<&str>,
    ) -> Result<Vec<u8>, ZoomApiError> {
        let mut last_error = None;

        for strategy in &self.download_auth {
            match self
                .try_strategy(*strategy, &file.download_url, download_token, passcode)
                .await
            {
                Ok(bytes) => {
                    info!(?strategy, "Download strategy succeeded");
                    return Ok(bytes);
                }
                Err(e) => {
                    warn!(?strategy, error = %e, "Download strategy failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(ZoomApiError::MissingCredential(
            "no download auth strategies configured",
        )))
    }
}

/// Pulls the `message` field out of a Zoom error body when present, so
/// errors carry the upstream explanation instead of a JSON blob.
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.to_string())
}
