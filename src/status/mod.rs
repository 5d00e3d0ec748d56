//! Status event publishing
//!
//! The pipeline publishes one [`JobSnapshot`] per state transition through a
//! [`StatusPublisher`]. The broker connection itself lives outside this
//! crate; [`ChannelStatusPublisher`] hands encoded events to whatever drains
//! its receiver, and [`MemoryStatusPublisher`] keeps them for inspection.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::job::{JobSnapshot, JobState};
use crate::observability::Metrics;

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Status channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, StatusError>;

/// Publisher for job status events
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    /// Publish one event; events of a single job arrive in call order
    async fn publish(&self, event: &JobSnapshot) -> Result<()>;
}

/// Encoded status event addressed to a status queue
#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub queue: String,
    pub payload: Vec<u8>,
}

/// Publishes JSON-encoded events onto a bounded channel
#[derive(Debug, Clone)]
pub struct ChannelStatusPublisher {
    queue: String,
    tx: mpsc::Sender<StatusMessage>,
}

impl ChannelStatusPublisher {
    pub fn new(
        queue: impl Into<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<StatusMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        let publisher = Self {
            queue: queue.into(),
            tx,
        };
        (publisher, rx)
    }
}

#[async_trait]
impl StatusPublisher for ChannelStatusPublisher {
    async fn publish(&self, event: &JobSnapshot) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        self.tx
            .send(StatusMessage {
                queue: self.queue.clone(),
                payload,
            })
            .await
            .map_err(|_| StatusError::ChannelClosed)?;

        tracing::debug!(
            queue = %self.queue,
            job_id = event.id,
            state = %event.state,
            "Status published"
        );
        Ok(())
    }
}

/// Log every message from a [`ChannelStatusPublisher`] until all senders are gone
///
/// Returns how many messages were drained.
pub async fn drain(mut rx: mpsc::Receiver<StatusMessage>, metrics: Arc<Metrics>) -> usize {
    let mut drained = 0usize;
    while let Some(message) = rx.recv().await {
        metrics.status_published();
        drained += 1;
        tracing::info!(
            queue = %message.queue,
            event = %String::from_utf8_lossy(&message.payload),
            "Status event"
        );
    }
    tracing::debug!(drained, "Status channel closed");
    drained
}

/// Records events in memory, optionally failing on one state
#[derive(Debug, Default)]
pub struct MemoryStatusPublisher {
    events: Mutex<Vec<JobSnapshot>>,
    fail_on: Option<JobState>,
}

impl MemoryStatusPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publisher whose `publish` fails for events in `state`
    pub fn failing_on(state: JobState) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail_on: Some(state),
        }
    }

    pub fn events(&self) -> Vec<JobSnapshot> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// States published for one job, in publish order
    pub fn states_for(&self, job_id: i64) -> Vec<JobState> {
        self.events()
            .into_iter()
            .filter(|event| event.id == job_id)
            .map(|event| event.state)
            .collect()
    }
}

#[async_trait]
impl StatusPublisher for MemoryStatusPublisher {
    async fn publish(&self, event: &JobSnapshot) -> Result<()> {
        if self.fail_on == Some(event.state) {
            return Err(StatusError::PublishFailed(format!(
                "refusing {} event",
                event.state
            )));
        }
        self.events
            .lock()
            .map_err(|_| StatusError::PublishFailed("event log poisoned".to_string()))?
            .push(event.clone());
        Ok(())
    }
}
