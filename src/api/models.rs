//! Response bodies of the HTTP surface
//!
//! Request bodies are not modelled here: `POST /requests` forwards the raw
//! bytes to the request queue and the worker validates them on delivery.

use serde::Serialize;

use crate::observability::MetricsSnapshot;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub queue_depth: usize,
    #[serde(flatten)]
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub queue: String,
    pub queue_depth: usize,
}
