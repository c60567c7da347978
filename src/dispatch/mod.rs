//! Delivery of finished feedback.
//!
//! v1: structured log sink. Future: chat or email delivery.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use crate::events::Participant;
use crate::feedback::FeedbackOutcome;

/// A finished pipeline run, handed to sinks for delivery.
pub struct FeedbackReport {
    pub run_id: Uuid,
    pub meeting_uuid: String,
    pub topic: Option<String>,
    pub participants: Vec<Participant>,
    pub outcome: FeedbackOutcome,
}

#[async_trait]
pub trait FeedbackSink: Send + Sync {
    async fn deliver(&self, report: &FeedbackReport) -> Result<()>;
}

/// Logs the report; the only delivery target in this deployment.
pub struct LogSink;

#[async_trait]
impl FeedbackSink for LogSink {
    async fn deliver(&self, report: &FeedbackReport) -> Result<()> {
        let result = report.outcome.result();

        info!(
            run_id = %report.run_id,
            meeting_uuid = %report.meeting_uuid,
            topic = report.topic.as_deref().unwrap_or("unknown"),
            origin = report.outcome.origin(),
            participants = report.participants.len(),
            "Meeting feedback ready: {}",
            result.summary
        );
        for insight in &result.key_insights {
            info!(meeting_uuid = %report.meeting_uuid, "Insight: {insight}");
        }

        debug!(
            "Full feedback: {}",
            serde_json::to_string_pretty(&report.outcome)?
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::FeedbackResult;

    #[tokio::test]
    async fn test_log_sink_delivers_any_outcome() {
        let report = FeedbackReport {
            run_id: Uuid::new_v4(),
            meeting_uuid: "meet-123".into(),
            topic: None,
            participants: vec![],
            outcome: FeedbackOutcome::Fallback {
                result: FeedbackResult {
                    summary: "parse failed".into(),
                    ..Default::default()
                },
                error: "expected value".into(),
            },
        };

        assert!(LogSink.deliver(&report).await.is_ok());
    }
}
