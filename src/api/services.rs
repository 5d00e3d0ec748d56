use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use http_body_util::BodyExt;
use tracing::debug;

use super::{
    error::ApiError,
    models::{AcceptedResponse, HealthResponse},
    state::AppState,
    utils::{parse_content_type, validate_body_size},
};

/// Request ingest endpoint (POST /requests)
///
/// The body is not decoded here. It is queued as-is and validated by the
/// worker on delivery, so a malformed request is accepted now and rejected
/// later without a status event.
///
/// ## Flow:
/// 1. Require `Content-Type: application/json`
/// 2. Read the (already decompressed) body and enforce `max_body_bytes`
/// 3. Publish onto the in-process request queue
/// 4. Return 202 Accepted, or 503 when the queue is full or closed
pub async fn submit_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;
    parse_content_type(content_type)?;

    let body = read_body(body, state.server.max_body_bytes).await?;
    let size = body.len();

    state.queue.publish(body)?;
    state.metrics.request_received();

    debug!(queue = state.queue.name(), size, "Request queued");

    let response = AcceptedResponse {
        queue: state.queue.name().to_string(),
        queue_depth: state.queue.depth(),
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

async fn read_body(body: axum::body::Body, limit: usize) -> Result<Vec<u8>, ApiError> {
    let data = body
        .collect()
        .await
        .map_err(|err| ApiError::InvalidPayload(err.to_string()))?
        .to_bytes()
        .to_vec();

    validate_body_size(&data, limit)?;
    Ok(data)
}

/// Health check endpoint (GET /health)
///
/// Answers 200 while the request queue accepts messages and 503 once it has
/// been closed for shutdown. The body carries the worker counters.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let (status, code) = if state.queue.is_closed() {
        debug!("Health check while shutting down");
        ("shutting_down", StatusCode::SERVICE_UNAVAILABLE)
    } else {
        ("ok", StatusCode::OK)
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        queue_depth: state.queue.depth(),
        metrics: state.metrics.snapshot(),
    };

    (code, Json(response))
}
