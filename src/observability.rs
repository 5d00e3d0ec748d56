//! In-process counters for the worker

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::router::AckDecision;

/// Counters shared by the ingest surface, the dispatcher and the status drain
#[derive(Debug, Default)]
pub struct Metrics {
    requests_received: AtomicU64,
    acked: AtomicU64,
    rejected: AtomicU64,
    requeued: AtomicU64,
    in_flight: AtomicU64,
    status_published: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_received(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_started(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_finished(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    /// Count how a message was settled
    pub fn settled(&self, decision: AckDecision) {
        let counter = match decision {
            AckDecision::Ack => &self.acked,
            AckDecision::Reject => &self.rejected,
            AckDecision::Nack => &self.requeued,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(?decision, "Metric incremented");
    }

    pub fn status_published(&self) {
        self.status_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_received: self.requests_received.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            status_published: self.status_published.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_received: u64,
    pub acked: u64,
    pub rejected: u64,
    pub requeued: u64,
    pub in_flight: u64,
    pub status_published: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_counts_by_decision() {
        let metrics = Metrics::new();
        metrics.job_started();
        metrics.job_started();
        metrics.job_finished();
        metrics.settled(AckDecision::Ack);
        metrics.settled(AckDecision::Nack);
        metrics.settled(AckDecision::Reject);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.acked, 1);
        assert_eq!(snapshot.requeued, 1);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.in_flight, 1);
    }
}
