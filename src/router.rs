//! Turns raw request messages into pipeline runs and acknowledgment decisions

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::fetchers::{Fetch, Fetcher, FetcherRegistry};
use crate::job::decode_job;
use crate::observability::Metrics;
use crate::pipeline::{Pipeline, PipelineOutcome};

/// What to tell the broker about one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AckDecision {
    /// Processed; drop the message
    Ack,
    /// Unprocessable; drop without requeue
    Reject,
    /// Failed for now; requeue for another attempt
    Nack,
}

impl AckDecision {
    pub fn requeue(&self) -> bool {
        matches!(self, AckDecision::Nack)
    }
}

impl From<PipelineOutcome> for AckDecision {
    fn from(outcome: PipelineOutcome) -> Self {
        match outcome {
            PipelineOutcome::Completed => AckDecision::Ack,
            PipelineOutcome::Rejectable => AckDecision::Reject,
            PipelineOutcome::Retryable => AckDecision::Nack,
        }
    }
}

/// Stateless front door of the pipeline; cheap to clone and share
pub struct Dispatcher<F = Fetcher> {
    registry: Arc<FetcherRegistry<F>>,
    pipeline: Arc<Pipeline>,
    metrics: Arc<Metrics>,
}

impl<F> Clone for Dispatcher<F> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            pipeline: self.pipeline.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<F: Fetch> Dispatcher<F> {
    pub fn new(registry: FetcherRegistry<F>, pipeline: Pipeline, metrics: Arc<Metrics>) -> Self {
        Self {
            registry: Arc::new(registry),
            pipeline: Arc::new(pipeline),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Validate one message and, if it is a job we can run, run it
    ///
    /// Invalid messages never reach the pipeline and produce no status
    /// events.
    pub async fn handle(&self, body: &[u8]) -> AckDecision {
        let job = match decode_job(body) {
            Ok(job) => job,
            Err(e) => {
                warn!(error = %e, "Rejecting invalid request");
                return AckDecision::Reject;
            }
        };

        let fetcher = match self.registry.get(job.kind()) {
            Ok(fetcher) => fetcher,
            Err(e) => {
                warn!(job_id = job.id(), error = %e, "Rejecting request");
                return AckDecision::Reject;
            }
        };

        debug!(job_id = job.id(), kind = %job.kind(), "Dispatching job");

        self.metrics.job_started();
        let outcome = self.pipeline.run(job, fetcher).await;
        self.metrics.job_finished();

        AckDecision::from(outcome)
    }
}
