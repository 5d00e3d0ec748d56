//! Job model: one dependency request in flight
//!
//! A [`Job`] is created by the router from a decoded [`JobRequest`] and is
//! mutated only by the pipeline. Every state change goes through
//! [`Job::transition`], which enforces the forward-only lifecycle and
//! returns the [`JobSnapshot`] to publish for that transition.

mod request;
mod types;

pub use request::{DecodeError, JobRequest, decode_job};
pub use types::{ArchiveRef, ContentRef, DependencyKind, JobState, UnknownKind};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("illegal transition {from} -> {to}")]
pub struct TransitionError {
    pub from: JobState,
    pub to: JobState,
}

/// Status projection of a job, published once per state transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: i64,
    pub kind: DependencyKind,
    pub reference: String,
    pub state: JobState,
    pub timestamp: DateTime<Utc>,
}

/// One dependency request and its lifecycle state
///
/// Not `Clone`: the content and archive references are exclusively owned
/// by the job until the pipeline disposes of them.
#[derive(Debug)]
pub struct Job {
    id: i64,
    kind: DependencyKind,
    reference: String,
    state: JobState,
    timestamp: DateTime<Utc>,
    content: ContentRef,
    archive: Option<ArchiveRef>,
}

impl Job {
    pub fn new(id: i64, kind: DependencyKind, reference: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            reference: reference.into(),
            state: JobState::Created,
            timestamp: Utc::now(),
            content: ContentRef::NoContent,
            archive: None,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn kind(&self) -> DependencyKind {
        self.kind
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn content(&self) -> &ContentRef {
        &self.content
    }

    pub fn archive(&self) -> Option<&ArchiveRef> {
        self.archive.as_ref()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            kind: self.kind,
            reference: self.reference.clone(),
            state: self.state,
            timestamp: self.timestamp,
        }
    }

    /// Move to `next` and stamp the transition time
    pub(crate) fn transition(&mut self, next: JobState) -> Result<JobSnapshot, TransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(TransitionError {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.timestamp = Utc::now();
        Ok(self.snapshot())
    }

    pub(crate) fn set_content(&mut self, content: ContentRef) {
        self.content = content;
    }

    /// Hand over the fetched content, leaving `NoContent` behind
    pub(crate) fn take_content(&mut self) -> ContentRef {
        std::mem::take(&mut self.content)
    }

    pub(crate) fn set_archive(&mut self, archive: ArchiveRef) {
        self.archive = Some(archive);
    }

    pub(crate) fn take_archive(&mut self) -> Option<ArchiveRef> {
        self.archive.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_new_job_is_created_and_empty() {
        let job = Job::new(7, DependencyKind::File, "https://host/a.bin");
        assert_eq!(job.state(), JobState::Created);
        assert!(job.content().is_empty());
        assert!(job.archive().is_none());
    }

    #[test]
    fn test_transition_updates_state_and_timestamp() {
        let mut job = Job::new(1, DependencyKind::Npm, "left-pad@1.3.0");
        let before = job.timestamp();

        let snapshot = job.transition(JobState::Fetching).unwrap();
        assert_eq!(snapshot.state, JobState::Fetching);
        assert_eq!(snapshot.id, 1);
        assert_eq!(snapshot.reference, "left-pad@1.3.0");
        assert!(job.timestamp() >= before);
        assert_eq!(job.state(), JobState::Fetching);
    }

    #[test]
    fn test_illegal_transition_leaves_job_untouched() {
        let mut job = Job::new(1, DependencyKind::Npm, "left-pad");
        let err = job.transition(JobState::Done).unwrap_err();
        assert_eq!(err.from, JobState::Created);
        assert_eq!(err.to, JobState::Done);
        assert_eq!(job.state(), JobState::Created);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut job = Job::new(1, DependencyKind::Helm, "https://charts/index.yaml");
        job.transition(JobState::Fetching).unwrap();
        job.transition(JobState::Failed).unwrap();
        assert!(job.transition(JobState::Failed).is_err());
        assert!(job.transition(JobState::Packaging).is_err());
    }

    #[test]
    fn test_take_content_resets_to_no_content() {
        let mut job = Job::new(1, DependencyKind::File, "x");
        job.set_content(ContentRef::SingleFile(PathBuf::from("/tmp/x")));
        let taken = job.take_content();
        assert_eq!(taken, ContentRef::SingleFile(PathBuf::from("/tmp/x")));
        assert!(job.content().is_empty());
    }

    #[test]
    fn test_snapshot_serializes_wire_shape() {
        let job = Job::new(42, DependencyKind::Docker, "alpine:3.20");
        let value = serde_json::to_value(job.snapshot()).unwrap();
        assert_eq!(value["id"], 42);
        assert_eq!(value["kind"], "DOCKER");
        assert_eq!(value["reference"], "alpine:3.20");
        assert_eq!(value["state"], "CREATED");
        assert!(value["timestamp"].as_str().unwrap().contains('T'));
    }
}
