//! Scripted collaborators for exercising the pipeline without real
//! registries, tools or upload endpoints

use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::fetchers::{Fetch, FetchError, Fetched};
use crate::job::{ArchiveRef, ContentRef, DependencyKind, Job};
use crate::upload::{ArtifactUploader, UploadError, UploadReceipt};

#[derive(Debug, Clone)]
enum Script {
    File { name: String, bytes: Vec<u8> },
    Delayed { delay: Duration, name: String, bytes: Vec<u8> },
    Tree { files: Vec<(String, Vec<u8>)> },
    Archive { bytes: Vec<u8> },
    Empty,
    NotFound,
    Transient,
    Stall,
    Panic,
}

/// Fetcher that produces a fixed result and counts its calls
#[derive(Debug)]
pub struct ScriptedFetcher {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    /// Writes one file named `name`
    pub fn file(name: &str, bytes: &[u8]) -> Self {
        Self::new(Script::File {
            name: name.to_string(),
            bytes: bytes.to_vec(),
        })
    }

    /// Like [`ScriptedFetcher::file`], after sleeping for `delay`
    pub fn delayed(delay: Duration, name: &str, bytes: &[u8]) -> Self {
        Self::new(Script::Delayed {
            delay,
            name: name.to_string(),
            bytes: bytes.to_vec(),
        })
    }

    /// Writes a `tree/` directory holding `files` (relative paths)
    pub fn tree(files: &[(&str, &[u8])]) -> Self {
        Self::new(Script::Tree {
            files: files
                .iter()
                .map(|(path, bytes)| (path.to_string(), bytes.to_vec()))
                .collect(),
        })
    }

    /// Produces a ready-made archive, like `docker save`
    pub fn archive(bytes: &[u8]) -> Self {
        Self::new(Script::Archive {
            bytes: bytes.to_vec(),
        })
    }

    /// Succeeds without producing anything
    pub fn empty() -> Self {
        Self::new(Script::Empty)
    }

    pub fn not_found() -> Self {
        Self::new(Script::NotFound)
    }

    pub fn transient() -> Self {
        Self::new(Script::Transient)
    }

    /// Never returns; for timeout tests
    pub fn stalled() -> Self {
        Self::new(Script::Stall)
    }

    /// Leaves `partial.bin` in the workspace, then panics
    pub fn panicking() -> Self {
        Self::new(Script::Panic)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetch for ScriptedFetcher {
    async fn fetch(&self, job: &Job, workspace: &Path) -> Result<Fetched, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.script {
            Script::File { name, bytes } => {
                let path = workspace.join(name);
                tokio::fs::write(&path, bytes).await?;
                Ok(Fetched::Content(ContentRef::SingleFile(path)))
            }
            Script::Delayed { delay, name, bytes } => {
                tokio::time::sleep(*delay).await;
                let path = workspace.join(name);
                tokio::fs::write(&path, bytes).await?;
                Ok(Fetched::Content(ContentRef::SingleFile(path)))
            }
            Script::Tree { files } => {
                let root = workspace.join("tree");
                for (relative, bytes) in files {
                    let path = root.join(relative);
                    if let Some(parent) = path.parent() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                    tokio::fs::write(&path, bytes).await?;
                }
                tokio::fs::create_dir_all(&root).await?;
                Ok(Fetched::Content(ContentRef::DirectoryTree(root)))
            }
            Script::Archive { bytes } => {
                let path = workspace.join("native.tar");
                tokio::fs::write(&path, bytes).await?;
                Ok(Fetched::Archive(ArchiveRef::new(path)))
            }
            Script::Empty => Ok(Fetched::Content(ContentRef::NoContent)),
            Script::NotFound => Err(FetchError::NotFound(job.reference().to_string())),
            Script::Transient => Err(FetchError::Transient("scripted failure".to_string())),
            Script::Stall => {
                std::future::pending::<()>().await;
                Err(FetchError::Transient("unreachable".to_string()))
            }
            Script::Panic => {
                tokio::fs::write(workspace.join("partial.bin"), b"half").await?;
                panic!("scripted fetcher panic for {}", job.reference());
            }
        }
    }
}

/// One upload seen by a [`RecordingUploader`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    pub file_name: String,
    pub kind: DependencyKind,
    pub reference: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
enum UploadBehavior {
    Accept,
    Reject(u16),
    Stall,
}

/// Uploader that keeps what it receives, or fails on demand
#[derive(Debug)]
pub struct RecordingUploader {
    behavior: UploadBehavior,
    uploads: Mutex<Vec<RecordedUpload>>,
}

impl RecordingUploader {
    fn with_behavior(behavior: UploadBehavior) -> Self {
        Self {
            behavior,
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn new() -> Self {
        Self::with_behavior(UploadBehavior::Accept)
    }

    /// Answers every upload with HTTP `status`
    pub fn rejecting(status: u16) -> Self {
        Self::with_behavior(UploadBehavior::Reject(status))
    }

    pub fn stalled() -> Self {
        Self::with_behavior(UploadBehavior::Stall)
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads
            .lock()
            .map(|uploads| uploads.clone())
            .unwrap_or_default()
    }
}

impl Default for RecordingUploader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactUploader for RecordingUploader {
    async fn upload(
        &self,
        artifact: &Path,
        kind: DependencyKind,
        reference: &str,
    ) -> Result<UploadReceipt, UploadError> {
        match self.behavior {
            UploadBehavior::Accept => {}
            UploadBehavior::Reject(status) => {
                return Err(UploadError::Rejected {
                    status,
                    body: String::new(),
                });
            }
            UploadBehavior::Stall => std::future::pending::<()>().await,
        }

        let bytes = tokio::fs::read(artifact).await?;
        let file_name = artifact
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let size = bytes.len() as u64;

        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.push(RecordedUpload {
                file_name: file_name.clone(),
                kind,
                reference: reference.to_string(),
                bytes,
            });
        }

        Ok(UploadReceipt {
            location: file_name,
            size,
        })
    }
}
