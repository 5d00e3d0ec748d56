use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Dependency types the worker knows how to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DependencyKind {
    Docker,
    Maven,
    Python,
    Npm,
    File,
    Helm,
    Website,
}

impl DependencyKind {
    pub const ALL: [DependencyKind; 7] = [
        DependencyKind::Docker,
        DependencyKind::Maven,
        DependencyKind::Python,
        DependencyKind::Npm,
        DependencyKind::File,
        DependencyKind::Helm,
        DependencyKind::Website,
    ];

    /// Wire name, as it appears in request and status messages
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKind::Docker => "DOCKER",
            DependencyKind::Maven => "MAVEN",
            DependencyKind::Python => "PYTHON",
            DependencyKind::Npm => "NPM",
            DependencyKind::File => "FILE",
            DependencyKind::Helm => "HELM",
            DependencyKind::Website => "WEBSITE",
        }
    }

    /// Lowercase form used for filesystem paths and storage keys
    pub fn slug(&self) -> &'static str {
        match self {
            DependencyKind::Docker => "docker",
            DependencyKind::Maven => "maven",
            DependencyKind::Python => "python",
            DependencyKind::Npm => "npm",
            DependencyKind::File => "file",
            DependencyKind::Helm => "helm",
            DependencyKind::Website => "website",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown dependency kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for DependencyKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DependencyKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// Lifecycle state of a job
///
/// States only move forward: `CREATED → FETCHING → PACKAGING → UPLOADING → DONE`.
/// `FAILED` is reachable from every non-terminal state. `DONE` and `FAILED`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    Created,
    Fetching,
    Packaging,
    Uploading,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    pub fn can_transition_to(self, next: JobState) -> bool {
        match (self, next) {
            (JobState::Created, JobState::Fetching)
            | (JobState::Fetching, JobState::Packaging)
            | (JobState::Packaging, JobState::Uploading)
            | (JobState::Uploading, JobState::Done) => true,
            (from, JobState::Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Created => "CREATED",
            JobState::Fetching => "FETCHING",
            JobState::Packaging => "PACKAGING",
            JobState::Uploading => "UPLOADING",
            JobState::Done => "DONE",
            JobState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fetched content owned by a job, resolved once by the archiver
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ContentRef {
    #[default]
    NoContent,
    SingleFile(PathBuf),
    DirectoryTree(PathBuf),
}

impl ContentRef {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ContentRef::NoContent => None,
            ContentRef::SingleFile(path) | ContentRef::DirectoryTree(path) => Some(path),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ContentRef::NoContent)
    }
}

/// Packaged artifact awaiting upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRef(PathBuf);

impl ArchiveRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
