//! Object-store backed artifact storage

use async_trait::async_trait;
use futures::StreamExt;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{ObjectStore, WriteMultipart, path::Path as StoragePath};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::io::ReaderStream;

use super::{ArtifactUploader, UploadError, UploadReceipt, artifact_file_name};
use crate::job::DependencyKind;

/// Parts uploaded concurrently per artifact
const MAX_PARTS_IN_FLIGHT: usize = 4;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Metadata returned after upload
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub key: String,
    pub etag: Option<String>,
    pub size: u64,
}

/// Storage client wrapping object_store
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    pub name: String,
}

impl std::fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClient").field("name", &self.name).finish()
    }
}

impl StorageClient {
    pub fn new(store: Arc<dyn ObjectStore>, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    /// In-memory storage for tests and local development
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "memory")
    }

    /// Filesystem storage rooted at `root`, created if missing
    pub fn local(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let store = LocalFileSystem::new_with_prefix(root)?;
        Ok(Self::new(Arc::new(store), format!("local:{}", root.display())))
    }

    /// Stream the file at `source` into `key` as a multipart upload
    ///
    /// Only a few chunks are held in memory at a time. A failed read or
    /// part upload aborts the multipart upload.
    pub async fn upload_file(&self, key: &str, source: &Path) -> Result<UploadMetadata> {
        let file = tokio::fs::File::open(source).await?;
        let path = StoragePath::from(key);

        let mut writer = WriteMultipart::new(self.store.put_multipart(&path).await?);
        let mut chunks = ReaderStream::new(file);
        let mut size = 0u64;

        while let Some(chunk) = chunks.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    if let Err(abort) = writer.abort().await {
                        tracing::warn!(key, error = %abort, "Failed to abort multipart upload");
                    }
                    return Err(e.into());
                }
            };
            writer.wait_for_capacity(MAX_PARTS_IN_FLIGHT).await?;
            size += chunk.len() as u64;
            writer.put(chunk);
        }

        let put_result = writer.finish().await?;
        tracing::info!(store = %self.name, key, size, "Uploaded to storage");

        Ok(UploadMetadata {
            key: key.to_string(),
            etag: put_result.e_tag,
            size,
        })
    }
}

/// Uploads artifacts into a [`StorageClient`]
///
/// Keys are `<key_prefix><kind>/<archive file name>`.
#[derive(Debug, Clone)]
pub struct StoreUploader {
    client: StorageClient,
    key_prefix: String,
}

impl StoreUploader {
    pub fn new(client: StorageClient, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    pub fn client(&self) -> &StorageClient {
        &self.client
    }

    pub fn key_for(&self, kind: DependencyKind, file_name: &str) -> String {
        format!("{}{}/{}", self.key_prefix, kind.slug(), file_name)
    }
}

#[async_trait]
impl ArtifactUploader for StoreUploader {
    async fn upload(
        &self,
        artifact: &Path,
        kind: DependencyKind,
        reference: &str,
    ) -> std::result::Result<UploadReceipt, UploadError> {
        let key = self.key_for(kind, &artifact_file_name(artifact)?);
        let metadata = self.client.upload_file(&key, artifact).await?;
        tracing::debug!(reference, key = %metadata.key, etag = ?metadata.etag, "Artifact stored");

        Ok(UploadReceipt {
            location: metadata.key,
            size: metadata.size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn stored(client: &StorageClient, key: &str) -> Vec<u8> {
        let result = client.store.get(&StoragePath::from(key)).await.unwrap();
        result.bytes().await.unwrap().to_vec()
    }

    #[tokio::test]
    async fn test_upload_file_streams_large_artifact() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("image.tar");
        // Several reader chunks and more than one multipart part
        let data: Vec<u8> = (0..12 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&source, &data).unwrap();

        let client = StorageClient::in_memory();
        let metadata = client.upload_file("docker/image.tar", &source).await.unwrap();

        assert_eq!(metadata.size, data.len() as u64);
        assert_eq!(stored(&client, "docker/image.tar").await, data);
    }

    #[tokio::test]
    async fn test_store_uploader_keys_by_kind() {
        let temp = TempDir::new().unwrap();
        let artifact = temp.path().join("left-pad_1_3_0.tar");
        std::fs::write(&artifact, b"tarball").unwrap();

        let uploader = StoreUploader::new(StorageClient::in_memory(), "artifacts/");
        let receipt = uploader
            .upload(&artifact, DependencyKind::Npm, "left-pad@1.3.0")
            .await
            .unwrap();

        assert_eq!(receipt.location, "artifacts/npm/left-pad_1_3_0.tar");
        assert_eq!(receipt.size, 7);
        assert_eq!(stored(uploader.client(), &receipt.location).await, b"tarball");
    }

    #[tokio::test]
    async fn test_local_store_writes_under_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("store");
        let artifact = temp.path().join("a.tar");
        std::fs::write(&artifact, b"tarball").unwrap();

        let uploader = StoreUploader::new(StorageClient::local(&root).unwrap(), "");
        uploader
            .upload(&artifact, DependencyKind::File, "https://host/a")
            .await
            .unwrap();

        assert_eq!(std::fs::read(root.join("file/a.tar")).unwrap(), b"tarball");
    }

    #[tokio::test]
    async fn test_missing_artifact_fails() {
        let temp = TempDir::new().unwrap();
        let uploader = StoreUploader::new(StorageClient::in_memory(), "");
        let result = uploader
            .upload(&temp.path().join("gone.tar"), DependencyKind::File, "x")
            .await;
        assert!(matches!(result, Err(UploadError::Storage(StorageError::Io(_)))));
    }
}
