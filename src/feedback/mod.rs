//! AI feedback generation over normalized transcripts.
//!
//! The model is asked for a single JSON object matching [`FeedbackResult`].
//! Responses that fail to parse degrade through a fenced-code-block rescue
//! and finally to a structurally valid fallback object, so no parse failure
//! ever escapes this module. A missing API key short-circuits to a clearly
//! labeled simulated result without touching the network.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::config::OpenAiConfig;
use crate::events::Participant;
use crate::openai::{ChatRequest, OpenAiClient, OpenAiError};

const TEMPERATURE: f32 = 0.4;
const MAX_TOKENS: u32 = 1500;

static JSON_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fence regex is valid")
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackResult {
    pub summary: String,
    #[serde(default)]
    pub key_insights: Vec<String>,
    #[serde(default)]
    pub scores: FeedbackScores,
    #[serde(default)]
    pub participant_feedback: Vec<ParticipantFeedback>,
}

/// 1-10 ratings; absent when the model declined to score a dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackScores {
    pub communication: Option<u8>,
    pub engagement: Option<u8>,
    pub clarity: Option<u8>,
    pub overall: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantFeedback {
    pub name: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
}

/// How a feedback result was produced, so callers and tests can tell real
/// output from placeholders without string matching.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum FeedbackOutcome {
    /// Produced by the model and parsed successfully.
    Generated { result: FeedbackResult },
    /// No API credential configured; nothing was analyzed.
    Simulated { result: FeedbackResult },
    /// The model responded but its output was not parsable.
    Fallback { result: FeedbackResult, error: String },
}

impl FeedbackOutcome {
    pub fn result(&self) -> &FeedbackResult {
        match self {
            FeedbackOutcome::Generated { result } => result,
            FeedbackOutcome::Simulated { result } => result,
            FeedbackOutcome::Fallback { result, .. } => result,
        }
    }

    pub fn origin(&self) -> &'static str {
        match self {
            FeedbackOutcome::Generated { .. } => "generated",
            FeedbackOutcome::Simulated { .. } => "simulated",
            FeedbackOutcome::Fallback { .. } => "fallback",
        }
    }
}

#[async_trait]
pub trait FeedbackGenerator: Send + Sync {
    /// Analyzes a transcript. Upstream/network failures propagate; parse
    /// failures and missing credentials do not.
    async fn generate(
        &self,
        transcript: &str,
        participants: &[Participant],
    ) -> Result<FeedbackOutcome, OpenAiError>;
}

pub struct OpenAiFeedbackGenerator {
    client: Option<OpenAiClient>,
    model: String,
}

impl OpenAiFeedbackGenerator {
    pub fn new(config: &OpenAiConfig) -> Self {
        let client = config
            .api_key
            .as_ref()
            .map(|key| OpenAiClient::new(key).with_base_url(config.api_base.clone()));
        Self {
            client,
            model: config.chat_model.clone(),
        }
    }
}

#[async_trait]
impl FeedbackGenerator for OpenAiFeedbackGenerator {
    async fn generate(
        &self,
        transcript: &str,
        participants: &[Participant],
    ) -> Result<FeedbackOutcome, OpenAiError> {
        let Some(client) = &self.client else {
            warn!("OPENAI_API_KEY not configured, returning simulated feedback");
            return Ok(FeedbackOutcome::Simulated {
                result: simulated_result(participants),
            });
        };

        let request = ChatRequest {
            model: self.model.clone(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_prompt: build_user_prompt(transcript, participants),
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = client.chat_completion(request).await?;
        let content = response.content().unwrap_or_default();
        let outcome = parse_feedback(content);
        info!(origin = outcome.origin(), "Feedback generated");
        Ok(outcome)
    }
}

const SYSTEM_PROMPT: &str = "\
You are an experienced meeting facilitation coach. You analyze meeting \
transcripts and produce constructive, specific feedback for the group and \
for individual participants.

Respond with a single JSON object and nothing else, using exactly this shape:
{
  \"summary\": \"two or three sentences describing how the meeting went\",
  \"key_insights\": [\"notable observation\", \"...\"],
  \"scores\": {
    \"communication\": 1-10,
    \"engagement\": 1-10,
    \"clarity\": 1-10,
    \"overall\": 1-10
  },
  \"participant_feedback\": [
    {
      \"name\": \"participant name\",
      \"strengths\": [\"...\"],
      \"improvements\": [\"...\"]
    }
  ]
}
Do not wrap the JSON in markdown fences or add any prose outside it.";

fn build_user_prompt(transcript: &str, participants: &[Participant]) -> String {
    let roster = if participants.is_empty() {
        "No participant information was captured for this meeting.".to_string()
    } else {
        participants
            .iter()
            .map(|p| match &p.email {
                Some(email) => format!("- {} ({})", p.name, email),
                None => format!("- {}", p.name),
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!("Participants:\n{roster}\n\nTranscript:\n{transcript}")
}

/// Parsing ladder: direct JSON, then a fenced json code block, then a
/// structurally valid fallback describing the failure.
pub fn parse_feedback(content: &str) -> FeedbackOutcome {
    let direct_error = match serde_json::from_str::<FeedbackResult>(content) {
        Ok(result) => return FeedbackOutcome::Generated { result },
        Err(e) => e,
    };

    if let Some(captures) = JSON_FENCE_RE.captures(content) {
        if let Ok(result) = serde_json::from_str::<FeedbackResult>(&captures[1]) {
            return FeedbackOutcome::Generated { result };
        }
    }

    warn!(error = %direct_error, "Model response was not parsable as feedback JSON");
    FeedbackOutcome::Fallback {
        result: FeedbackResult {
            summary: format!(
                "Feedback could not be parsed from the model response: {direct_error}"
            ),
            key_insights: vec![
                "The model output did not contain a valid feedback JSON object.".to_string(),
            ],
            scores: FeedbackScores::default(),
            participant_feedback: Vec::new(),
        },
        error: direct_error.to_string(),
    }
}

fn simulated_result(participants: &[Participant]) -> FeedbackResult {
    FeedbackResult {
        summary: "Simulated feedback: OPENAI_API_KEY is not configured, so no analysis was \
                  performed."
            .to_string(),
        key_insights: vec![
            "Set OPENAI_API_KEY to enable real meeting analysis.".to_string(),
        ],
        scores: FeedbackScores::default(),
        participant_feedback: participants
            .iter()
            .map(|p| ParticipantFeedback {
                name: p.name.clone(),
                strengths: vec!["Simulated output, no analysis performed.".to_string()],
                improvements: Vec::new(),
            })
            .collect(),
    }
}
