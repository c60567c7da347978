//! Inbound Zoom webhook endpoint.
//!
//! Verification runs before any event-specific logic: the URL-validation
//! handshake short-circuits on its sentinel event type, and every other
//! event must carry a valid `x-zm-signature`/`x-zm-request-timestamp` pair.
//! Acknowledgment is returned only after dispatch has finished, and pipeline
//! failures are contained below this layer so a bad upstream call never
//! turns into a retry storm from Zoom.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::Json,
    routing::post,
    Router,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::app::AppState;
use crate::events::{event_types, WebhookEvent};
use crate::signature;

pub const SIGNATURE_HEADER: &str = "x-zm-signature";
pub const TIMESTAMP_HEADER: &str = "x-zm-request-timestamp";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(receive_webhook))
        .with_state(state)
}

async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    // The body has to parse first: the validation handshake is identified
    // by event type, not by headers.
    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("malformed webhook body: {e}")))?;

    if event.event == event_types::URL_VALIDATION {
        return handle_url_validation(&state, &event);
    }

    verify_request(&state, &headers, &body)?;

    state.events.dispatch(event).await;

    Ok(Json(json!({ "message": "Event received" })))
}

fn handle_url_validation(state: &AppState, event: &WebhookEvent) -> ApiResult<Json<Value>> {
    let plain_token = event
        .payload
        .get("plainToken")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request("missing plainToken in url_validation payload"))?;

    let encrypted =
        signature::encrypt_validation_token(&state.config.zoom.webhook_secret, plain_token);

    info!("Answered webhook URL validation challenge");
    Ok(Json(json!({
        "plainToken": plain_token,
        "encryptedToken": encrypted,
    })))
}

fn verify_request(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<(), ApiError> {
    let provided = header_str(headers, SIGNATURE_HEADER)
        .ok_or_else(|| ApiError::unauthorized("missing signature header"))?;
    let timestamp = header_str(headers, TIMESTAMP_HEADER)
        .ok_or_else(|| ApiError::unauthorized("missing timestamp header"))?;

    if !signature::verify(&state.config.zoom.webhook_secret, timestamp, body, provided) {
        warn!("Rejected webhook with invalid signature");
        return Err(ApiError::unauthorized("invalid webhook signature"));
    }

    Ok(())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
