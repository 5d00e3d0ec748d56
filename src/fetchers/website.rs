use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};
use url::Url;

use super::tool::run_tool;
use super::traits::{Fetch, FetchError, Fetched};
use crate::job::{ContentRef, Job};
use crate::workspace::sanitize_name;

const NOT_FOUND_MARKERS: &[&str] = &["ERR_NAME_NOT_RESOLVED", "ERR_CONNECTION_REFUSED"];

/// Renders a web page to PDF with headless Chromium
#[derive(Debug, Clone)]
pub struct WebsiteFetcher {
    binary: String,
}

impl WebsiteFetcher {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

/// Fail fast with `NotFound` when the URL is unusable or its host does not resolve
async fn ensure_resolvable(reference: &str) -> Result<Url, FetchError> {
    let url = Url::parse(reference)
        .map_err(|e| FetchError::NotFound(format!("invalid URL {}: {}", reference, e)))?;
    let host = url
        .host_str()
        .map(str::to_owned)
        .ok_or_else(|| FetchError::NotFound(format!("URL has no host: {}", reference)))?;
    let port = url.port_or_known_default().unwrap_or(80);

    let mut addrs = tokio::net::lookup_host((host.as_str(), port))
        .await
        .map_err(|e| FetchError::NotFound(format!("cannot resolve {}: {}", host, e)))?;
    if addrs.next().is_none() {
        return Err(FetchError::NotFound(format!("{} resolved to no addresses", host)));
    }
    Ok(url)
}

#[async_trait]
impl Fetch for WebsiteFetcher {
    async fn fetch(&self, job: &Job, workspace: &Path) -> Result<Fetched, FetchError> {
        let url = ensure_resolvable(job.reference()).await?;
        let pdf = workspace.join(format!("{}.pdf", sanitize_name(job.reference())));

        let args = [
            "--headless".to_string(),
            "--disable-gpu".to_string(),
            "--no-sandbox".to_string(),
            format!("--print-to-pdf={}", pdf.display()),
            url.to_string(),
        ];
        let output = run_tool(&self.binary, &args, None).await?;

        // Chromium reports navigation errors on stderr but may still exit 0
        if output.mentions_any(NOT_FOUND_MARKERS) {
            return Err(FetchError::NotFound(format!("website not reachable: {}", url)));
        }
        if !output.success {
            return Err(output.into_error("chromium", url.as_str(), NOT_FOUND_MARKERS));
        }
        if !tokio::fs::try_exists(&pdf).await? {
            debug!(stderr = %output.stderr.trim(), "Chromium produced no PDF");
            return Err(FetchError::Transient(format!("no PDF produced for {}", url)));
        }

        info!(job_id = job.id(), url = %url, "Website rendered to PDF");
        Ok(Fetched::Content(ContentRef::SingleFile(pdf)))
    }
}
