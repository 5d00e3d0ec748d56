use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use std::path::Path;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use super::{ArtifactUploader, UploadError, UploadReceipt, artifact_file_name};
use crate::config::UploadConfig;
use crate::job::DependencyKind;

const MAX_ERROR_BODY: usize = 512;

/// Multipart POST of the archive to an HTTP collector
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: Client,
    endpoint: String,
    reference_header: String,
    kind_header: String,
    token: Option<String>,
}

impl HttpUploader {
    pub fn new(config: &UploadConfig) -> Result<Self, UploadError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("depfetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            reference_header: config.reference_header.clone(),
            kind_header: config.kind_header.clone(),
            token: config.token.clone(),
        })
    }
}

#[async_trait]
impl ArtifactUploader for HttpUploader {
    async fn upload(
        &self,
        artifact: &Path,
        kind: DependencyKind,
        reference: &str,
    ) -> Result<UploadReceipt, UploadError> {
        let file_name = artifact_file_name(artifact)?;
        let file = tokio::fs::File::open(artifact).await?;
        let size = file.metadata().await?.len();

        // Streamed from disk, never buffered whole
        let body = Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, size)
            .file_name(file_name)
            .mime_str("application/x-tar")
            .map_err(|e| UploadError::Transport(e.to_string()))?;
        let form = Form::new().part("file", part);

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(self.reference_header.as_str(), reference)
            .header(self.kind_header.as_str(), kind.as_str())
            .multipart(form);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        debug!(endpoint = %self.endpoint, size, "Uploading artifact");

        let response = request
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(MAX_ERROR_BODY);
            warn!(endpoint = %self.endpoint, status = status.as_u16(), "Upload rejected");
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(UploadReceipt {
            location: self.endpoint.clone(),
            size,
        })
    }
}
