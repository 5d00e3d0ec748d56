use async_trait::async_trait;
use std::path::Path;
use tracing::info;
use url::Url;

use super::http::HttpClient;
use super::traits::{Fetch, FetchError, Fetched};
use crate::job::{ContentRef, Job};
use crate::workspace::sanitize_name;

const FALLBACK_NAME: &str = "downloaded_file";

/// Plain HTTP(S) download of a single file
#[derive(Debug, Clone)]
pub struct FileFetcher {
    client: HttpClient,
}

impl FileFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

/// Local file name for a download URL: its last path segment, sanitized
/// with the final extension kept intact
pub(crate) fn file_name_for(reference: &str) -> String {
    let segment = Url::parse(reference)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|segment| !segment.is_empty());

    match segment {
        Some(segment) => match segment.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
                format!("{}.{}", sanitize_name(stem), sanitize_name(ext))
            }
            _ => sanitize_name(&segment),
        },
        None => FALLBACK_NAME.to_string(),
    }
}

#[async_trait]
impl Fetch for FileFetcher {
    async fn fetch(&self, job: &Job, workspace: &Path) -> Result<Fetched, FetchError> {
        let dest = workspace.join(file_name_for(job.reference()));

        let size = self.client.download_to_file(job.reference(), &dest).await?;
        info!(job_id = job.id(), url = %job.reference(), size, "File downloaded");

        Ok(Fetched::Content(ContentRef::SingleFile(dest)))
    }
}
