use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info};
use url::Url;

use super::http::HttpClient;
use super::traits::{Fetch, FetchError, Fetched};
use crate::job::{ContentRef, Job};

/// The subset of a Helm repository `index.yaml` we care about
#[derive(Debug, Deserialize)]
pub struct HelmIndex {
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<ChartVersion>>,
}

#[derive(Debug, Deserialize)]
pub struct ChartVersion {
    pub version: String,
    #[serde(default)]
    pub urls: Vec<String>,
}

impl HelmIndex {
    pub fn parse(text: &str) -> Result<Self, FetchError> {
        serde_yaml::from_str(text)
            .map_err(|e| FetchError::Transient(format!("Invalid Helm index: {}", e)))
    }

    /// Latest version of every chart; repositories list newest first
    pub fn latest(&self) -> impl Iterator<Item = (&str, &ChartVersion)> {
        self.entries
            .iter()
            .filter_map(|(name, versions)| versions.first().map(|v| (name.as_str(), v)))
    }
}

/// Mirrors the latest version of every chart in a Helm repository index
#[derive(Debug, Clone)]
pub struct HelmFetcher {
    client: HttpClient,
}

impl HelmFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

/// Keep dots so versions stay readable; anything path-like becomes `_`
fn file_component(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect()
}

fn resolve_chart_url(index_url: &Url, chart_url: &str) -> Result<Url, FetchError> {
    index_url
        .join(chart_url)
        .map_err(|e| FetchError::Transient(format!("Invalid chart URL {}: {}", chart_url, e)))
}

#[async_trait]
impl Fetch for HelmFetcher {
    async fn fetch(&self, job: &Job, workspace: &Path) -> Result<Fetched, FetchError> {
        let index_url = Url::parse(job.reference())
            .map_err(|e| FetchError::NotFound(format!("{}: {}", job.reference(), e)))?;

        let index = HelmIndex::parse(&self.client.get_text(index_url.as_str()).await?)?;

        let charts_dir = workspace.join("charts");
        tokio::fs::create_dir_all(&charts_dir).await?;

        // Run-scoped: two entries pointing at the same tarball download it once
        let mut seen: HashSet<Url> = HashSet::new();
        let mut downloaded = 0usize;

        for (name, chart) in index.latest() {
            let Some(first_url) = chart.urls.first() else {
                debug!(chart = name, "Chart has no download URLs, skipping");
                continue;
            };
            let url = resolve_chart_url(&index_url, first_url)?;
            if !seen.insert(url.clone()) {
                debug!(chart = name, url = %url, "Chart already downloaded in this run");
                continue;
            }

            let file_name = format!("{}-{}.tgz", file_component(name), file_component(&chart.version));
            self.client
                .download_to_file(url.as_str(), &charts_dir.join(file_name))
                .await?;
            downloaded += 1;
        }

        info!(job_id = job.id(), index = %index_url, charts = downloaded, "Helm charts downloaded");
        Ok(Fetched::Content(ContentRef::DirectoryTree(charts_dir)))
    }
}
