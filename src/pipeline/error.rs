use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::fetchers::FetchError;
use crate::job::TransitionError;
use crate::status::StatusError;
use crate::upload::UploadError;

/// Pipeline stage bounded by its own timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Package,
    Upload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Fetch => "fetch",
            Stage::Package => "package",
            Stage::Upload => "upload",
        })
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Packaging failed: {0}")]
    Package(#[from] ArchiveError),

    #[error("Upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("{stage} stage timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },

    #[error("Status publish failed: {0}")]
    Status(#[from] StatusError),

    #[error("Failed to allocate job workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("No archive to upload")]
    MissingArchive,

    #[error("Pipeline panicked: {0}")]
    Panicked(String),
}

impl PipelineError {
    /// Retrying cannot help; only a fetch that found nothing qualifies
    pub fn is_permanent(&self) -> bool {
        matches!(self, PipelineError::Fetch(e) if e.is_not_found())
    }
}
