//! Delivery of packaged artifacts to their final destination

mod http;
mod store;

pub use http::HttpUploader;
pub use store::{StorageClient, StorageError, StoreUploader, UploadMetadata};

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{UploadConfig, UploadProvider};
use crate::job::DependencyKind;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Upload rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Upload transport error: {0}")]
    Transport(String),

    #[error("Artifact has no file name: {0}")]
    InvalidArtifact(String),

    #[error("Failed to read artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Where an artifact ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub location: String,
    pub size: u64,
}

/// Sends one archive together with its dependency kind and reference
#[async_trait]
pub trait ArtifactUploader: Send + Sync {
    async fn upload(
        &self,
        artifact: &Path,
        kind: DependencyKind,
        reference: &str,
    ) -> Result<UploadReceipt, UploadError>;
}

pub(crate) fn artifact_file_name(artifact: &Path) -> Result<String, UploadError> {
    artifact
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| UploadError::InvalidArtifact(artifact.display().to_string()))
}

/// Build the uploader selected by `[upload] provider`
pub fn from_config(config: &UploadConfig) -> Result<Arc<dyn ArtifactUploader>, UploadError> {
    let uploader: Arc<dyn ArtifactUploader> = match config.provider {
        UploadProvider::Http => Arc::new(HttpUploader::new(config)?),
        UploadProvider::Local => Arc::new(StoreUploader::new(
            StorageClient::local(&config.local_root)?,
            config.key_prefix.clone(),
        )),
        UploadProvider::Memory => Arc::new(StoreUploader::new(
            StorageClient::in_memory(),
            config.key_prefix.clone(),
        )),
    };
    tracing::info!(provider = ?config.provider, "Artifact uploader ready");
    Ok(uploader)
}
