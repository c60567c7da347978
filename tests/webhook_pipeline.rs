//! End-to-end webhook flow against mock platform collaborators.
//!
//! Drives the real router (signature verification, event dispatch, pipeline)
//! with the Zoom and OpenAI boundaries replaced by mocks.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use meetcoach::api::ApiServer;
use meetcoach::app::AppState;
use meetcoach::config::Config;
use meetcoach::dispatch::{FeedbackReport, FeedbackSink};
use meetcoach::events::{EventRouter, Participant, ParticipantRegistry};
use meetcoach::feedback::{FeedbackGenerator, FeedbackOutcome, FeedbackResult};
use meetcoach::openai::OpenAiError;
use meetcoach::pipeline::RecordingPipeline;
use meetcoach::signature;
use meetcoach::transcript::SpeechToText;
use meetcoach::zoom::{RecordingFile, RecordingSource, ZoomApiError};

const SECRET: &str = "integration-test-secret";
const TIMESTAMP: &str = "1700000000";

const SAMPLE_VTT: &str = "WEBVTT\n\n1\n00:00:01.000 --> 00:00:04.000\nAlice Johnson: Good morning everyone.\n";

fn transcript_file() -> RecordingFile {
    RecordingFile {
        id: Some("file-1".into()),
        file_type: Some("TRANSCRIPT".into()),
        file_extension: Some("VTT".into()),
        download_url: "https://zoom.example/rec/download/file-1".into(),
        recording_type: Some("audio_transcript".into()),
        status: Some("completed".into()),
    }
}

struct MockSource {
    transcript: Option<String>,
    fail_listing: bool,
}

#[async_trait]
impl RecordingSource for MockSource {
    async fn list_recordings(
        &self,
        _meeting_uuid: &str,
    ) -> Result<Vec<RecordingFile>, ZoomApiError> {
        if self.fail_listing {
            return Err(ZoomApiError::Api {
                status: 404,
                message: "There is no recording meeting".into(),
            });
        }
        match &self.transcript {
            Some(_) => Ok(vec![transcript_file()]),
            None => Ok(vec![]),
        }
    }

    async fn fetch_transcript(&self, _file: &RecordingFile) -> Result<String, ZoomApiError> {
        Ok(self.transcript.clone().unwrap_or_default())
    }

    async fn fetch_audio(&self, _file: &RecordingFile) -> Result<Vec<u8>, ZoomApiError> {
        Err(ZoomApiError::Api {
            status: 500,
            message: "not expected in this test".into(),
        })
    }

    async fn fetch_webhook_artifact(
        &self,
        _file: &RecordingFile,
        _download_token: Option<&str>,
        _passcode: Option<&str>,
    ) -> Result<Vec<u8>, ZoomApiError> {
        Err(ZoomApiError::Api {
            status: 401,
            message: "not expected in this test".into(),
        })
    }
}

struct MockSpeech;

#[async_trait]
impl SpeechToText for MockSpeech {
    async fn transcribe(
        &self,
        _audio: Vec<u8>,
        _participant_hint: Option<String>,
    ) -> Result<String, OpenAiError> {
        Ok("[00:00] mock transcription".into())
    }
}

#[derive(Default)]
struct CapturingGenerator {
    calls: Mutex<Vec<(String, Vec<Participant>)>>,
}

#[async_trait]
impl FeedbackGenerator for CapturingGenerator {
    async fn generate(
        &self,
        transcript: &str,
        participants: &[Participant],
    ) -> Result<FeedbackOutcome, OpenAiError> {
        self.calls
            .lock()
            .unwrap()
            .push((transcript.to_string(), participants.to_vec()));
        Ok(FeedbackOutcome::Generated {
            result: FeedbackResult {
                summary: "A focused meeting.".into(),
                ..Default::default()
            },
        })
    }
}

#[derive(Default)]
struct CapturingSink {
    delivered: Mutex<Vec<String>>,
}

#[async_trait]
impl FeedbackSink for CapturingSink {
    async fn deliver(&self, report: &FeedbackReport) -> anyhow::Result<()> {
        self.delivered
            .lock()
            .unwrap()
            .push(report.meeting_uuid.clone());
        Ok(())
    }
}

struct TestHarness {
    app: Router,
    registry: ParticipantRegistry,
    generator: Arc<CapturingGenerator>,
    sink: Arc<CapturingSink>,
}

fn harness(source: MockSource) -> TestHarness {
    let mut config = Config::default();
    config.zoom.webhook_secret = SECRET.to_string();

    let registry = ParticipantRegistry::default();
    let generator = Arc::new(CapturingGenerator::default());
    let sink = Arc::new(CapturingSink::default());

    let pipeline = RecordingPipeline::new(
        Arc::new(source),
        Arc::new(MockSpeech),
        generator.clone(),
        sink.clone(),
        registry.clone(),
    );
    let events = EventRouter::new(registry.clone(), Arc::new(pipeline));
    let state = AppState {
        config: Arc::new(config),
        events: Arc::new(events),
    };

    TestHarness {
        app: ApiServer::router(state),
        registry,
        generator,
        sink,
    }
}

fn signed_request(body: &str) -> Request<Body> {
    let signature = signature::sign(SECRET, TIMESTAMP, body.as_bytes());
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header("x-zm-signature", signature)
        .header("x-zm-request-timestamp", TIMESTAMP)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn unsigned_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn participant_joined_body(uuid: &str, name: &str) -> String {
    json!({
        "event": "meeting.participant_joined",
        "payload": {
            "object": {
                "uuid": uuid,
                "participant": {
                    "user_id": "16778240",
                    "user_name": name,
                    "email": "alice@example.com",
                    "join_time": "2024-03-01T10:00:00Z"
                }
            }
        }
    })
    .to_string()
}

fn transcript_completed_body(uuid: &str) -> String {
    json!({
        "event": "recording.transcript_completed",
        "payload": {
            "object": {
                "uuid": uuid,
                "topic": "Weekly sync",
                "recording_files": []
            }
        }
    })
    .to_string()
}

#[tokio::test]
async fn test_health_endpoint() {
    let harness = harness(MockSource {
        transcript: None,
        fail_listing: false,
    });

    let response = harness
        .app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "running");
    assert_eq!(body["service"], "meetcoach");
}

#[tokio::test]
async fn test_url_validation_round_trip() {
    let harness = harness(MockSource {
        transcript: None,
        fail_listing: false,
    });

    let body = json!({
        "event": "endpoint.url_validation",
        "payload": { "plainToken": "abc123" }
    })
    .to_string();

    // The validation handshake needs no signature headers.
    let response = harness.app.oneshot(unsigned_request(&body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["plainToken"], "abc123");
    assert_eq!(
        body["encryptedToken"],
        signature::encrypt_validation_token(SECRET, "abc123").as_str()
    );
}

#[tokio::test]
async fn test_url_validation_without_token_is_bad_request() {
    let harness = harness(MockSource {
        transcript: None,
        fail_listing: false,
    });

    let body = json!({ "event": "endpoint.url_validation", "payload": {} }).to_string();
    let response = harness.app.oneshot(unsigned_request(&body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_signature_headers_rejected() {
    let harness = harness(MockSource {
        transcript: None,
        fail_listing: false,
    });

    let body = participant_joined_body("meet-1", "Alice Johnson");
    let response = harness.app.oneshot(unsigned_request(&body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_signature_rejected() {
    let harness = harness(MockSource {
        transcript: None,
        fail_listing: false,
    });

    let body = participant_joined_body("meet-1", "Alice Johnson");
    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header("x-zm-signature", "v0=0000000000000000")
        .header("x-zm-request-timestamp", TIMESTAMP)
        .body(Body::from(body))
        .unwrap();

    let response = harness.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_event_is_acknowledged() {
    let harness = harness(MockSource {
        transcript: None,
        fail_listing: false,
    });

    let body = json!({ "event": "meeting.sharing_started", "payload": {} }).to_string();
    let response = harness.app.oneshot(signed_request(&body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Event received");
}

#[tokio::test]
async fn test_join_then_transcript_runs_pipeline_with_roster() {
    let harness = harness(MockSource {
        transcript: Some(SAMPLE_VTT.to_string()),
        fail_listing: false,
    });

    let join = signed_request(&participant_joined_body("meet-1", "Alice Johnson"));
    let response = harness.app.clone().oneshot(join).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let completed = signed_request(&transcript_completed_body("meet-1"));
    let response = harness.app.clone().oneshot(completed).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The generator ran exactly once, with the tracked roster and the
    // normalized transcript.
    let calls = harness.generator.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (transcript, participants) = &calls[0];
    assert_eq!(transcript, "Alice Johnson: Good morning everyone.");
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0].name, "Alice Johnson");
    drop(calls);

    // Delivery happened and the meeting's registry entry was cleared.
    assert_eq!(*harness.sink.delivered.lock().unwrap(), ["meet-1"]);
    assert!(harness.registry.snapshot("meet-1").await.is_empty());
}

#[tokio::test]
async fn test_transcript_event_without_joins_still_succeeds() {
    let harness = harness(MockSource {
        transcript: Some(SAMPLE_VTT.to_string()),
        fail_listing: false,
    });

    let completed = signed_request(&transcript_completed_body("meet-2"));
    let response = harness.app.clone().oneshot(completed).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let calls = harness.generator.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].1.is_empty(), "roster should be empty, not an error");
}

#[tokio::test]
async fn test_upstream_failure_still_acknowledged() {
    let harness = harness(MockSource {
        transcript: None,
        fail_listing: true,
    });

    let completed = signed_request(&transcript_completed_body("meet-3"));
    let response = harness.app.clone().oneshot(completed).await.unwrap();

    // The listing failed and no fallback files exist, but the webhook
    // sender still gets its acknowledgment.
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Event received");
    assert!(harness.generator.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let harness = harness(MockSource {
        transcript: None,
        fail_listing: false,
    });

    let response = harness
        .app
        .oneshot(unsigned_request("this is not json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
