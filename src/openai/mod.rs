//! OpenAI API client for chat completions and audio transcription.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

/// Hard cap imposed by the transcription endpoint. Oversized audio is
/// rejected up front; chunking is out of scope.
pub const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum OpenAiError {
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("OpenAI API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("audio payload is {size} bytes, exceeding the {limit} byte transcription limit")]
    AudioTooLarge { size: usize, limit: usize },
    #[error("OPENAI_API_KEY is not configured")]
    MissingCredential,
}

pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug)]
pub struct TranscriptionRequest {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
    pub model: String,
    pub language: String,
    /// Free-text hint, typically the participant roster, used to bias
    /// name recognition.
    pub prompt: Option<String>,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub async fn chat_completion(
        &self,
        request: ChatRequest,
    ) -> Result<ChatResponse, OpenAiError> {
        let body = serde_json::json!({
            "model": request.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt }
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .inspect_err(|e| error!(error = %e, "Failed to reach chat completions endpoint"))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(OpenAiError::Api { status, message });
        }

        Ok(resp.json::<ChatResponse>().await?)
    }

    pub async fn transcribe_audio(
        &self,
        request: TranscriptionRequest,
    ) -> Result<TranscriptionResponse, OpenAiError> {
        if request.bytes.len() > MAX_AUDIO_BYTES {
            return Err(OpenAiError::AudioTooLarge {
                size: request.bytes.len(),
                limit: MAX_AUDIO_BYTES,
            });
        }

        let part = reqwest::multipart::Part::bytes(request.bytes)
            .file_name(request.file_name)
            .mime_str(&request.mime_type)?;

        let mut form = reqwest::multipart::Form::new()
            .text("model", request.model)
            .text("language", request.language)
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment")
            .part("file", part);

        if let Some(prompt) = request.prompt {
            form = form.text("prompt", prompt);
        }

        let resp = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .multipart(form)
            .send()
            .await
            .inspect_err(|e| error!(error = %e, "Failed to reach transcription endpoint"))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(OpenAiError::Api { status, message });
        }

        Ok(resp.json::<TranscriptionResponse>().await?)
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

impl ChatResponse {
    /// Content of the first choice, if the model returned any.
    pub fn content(&self) -> Option<&str> {
        self.choices.first()?.message.content.as_deref()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptionResponse {
    pub text: String,
    pub segments: Option<Vec<TranscriptionSegment>>,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptionSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}
