use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use crate::job::{ArchiveRef, ContentRef, Job};

/// Classified fetch failures
///
/// `NotFound` means retrying cannot help; everything else is `Transient`.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("dependency not found: {0}")]
    NotFound(String),
    #[error("fetch failed: {0}")]
    Transient(String),
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound(_))
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::Transient(format!("I/O error: {}", err))
    }
}

/// What a fetcher produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    /// Raw content that still needs packaging
    Content(ContentRef),
    /// A ready-to-upload archive; packaging is skipped
    Archive(ArchiveRef),
}

/// Fetch capability implemented by every dependency type
///
/// Implementations write only inside `workspace`, which the pipeline has
/// already created and owns for the duration of the run.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, job: &Job, workspace: &Path) -> Result<Fetched, FetchError>;
}
