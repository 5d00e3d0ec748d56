//! Per-job temporary namespaces under the process-wide temp root

use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::job::Job;

const MAX_LABEL_LEN: usize = 64;

/// Replace anything outside `[A-Za-z0-9_-]` with `_` and cap the length
pub fn sanitize_name(raw: &str) -> String {
    let sanitized: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_LABEL_LEN)
        .collect();

    if sanitized.is_empty() {
        "unnamed".to_string()
    } else {
        sanitized
    }
}

/// Temp root shared by all jobs of the process
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory that holds every namespace of one dependency kind
    pub fn kind_dir(&self, job: &Job) -> PathBuf {
        self.root.join(job.kind().slug())
    }

    /// Allocate a namespace for one pipeline run
    ///
    /// The directory name is `<sanitized-ref>-<sha256 prefix>-<run id>`: the
    /// hash keeps references that sanitize to the same label apart, the run
    /// id keeps concurrent runs of the same reference apart.
    pub fn namespace_for(&self, job: &Job) -> JobNamespace {
        let label = sanitize_name(job.reference());
        let digest = Sha256::digest(job.reference().as_bytes());
        let hash: String = digest.iter().take(6).map(|b| format!("{:02x}", b)).collect();
        let run_id = Uuid::new_v4().simple().to_string();

        let dir = self
            .kind_dir(job)
            .join(format!("{}-{}-{}", label, hash, &run_id[..12]));

        JobNamespace { dir, label }
    }
}

/// One run's private directory
#[derive(Debug, Clone)]
pub struct JobNamespace {
    dir: PathBuf,
    label: String,
}

impl JobNamespace {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Sanitized reference, used to name the artifacts of this run
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Where fetchers write their content
    pub fn content_dir(&self) -> PathBuf {
        self.dir.join("content")
    }

    /// Where the archiver writes the packaged artifact
    pub fn archive_path(&self) -> PathBuf {
        self.dir.join(format!("{}.tar", self.label))
    }

    pub async fn create(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(self.content_dir()).await
    }
}
