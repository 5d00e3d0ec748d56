use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use super::tool::run_tool;
use super::traits::{Fetch, FetchError, Fetched};
use crate::job::{ContentRef, Job};

const NOT_FOUND_MARKERS: &[&str] = &["Could not find artifact", "not found"];

/// Resolves a Maven artifact and its runtime dependencies into a private
/// local repository
#[derive(Debug, Clone)]
pub struct MavenFetcher {
    binary: String,
}

impl MavenFetcher {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

/// `group:artifact:version` with three non-empty parts
pub fn is_coordinate(reference: &str) -> bool {
    let parts: Vec<&str> = reference.split(':').collect();
    parts.len() == 3 && parts.iter().all(|part| !part.trim().is_empty())
}

#[async_trait]
impl Fetch for MavenFetcher {
    async fn fetch(&self, job: &Job, workspace: &Path) -> Result<Fetched, FetchError> {
        let coordinate = job.reference();
        if !is_coordinate(coordinate) {
            return Err(FetchError::NotFound(format!(
                "invalid Maven coordinate {}, expected group:artifact:version",
                coordinate
            )));
        }

        let repository = workspace.join("repository");
        tokio::fs::create_dir_all(&repository).await?;

        let args = [
            "dependency:get".to_string(),
            format!("-Dartifact={}", coordinate),
            format!("-Dmaven.repo.local={}", repository.display()),
            "-DincludeScope=runtime".to_string(),
        ];
        let output = run_tool(&self.binary, &args, None).await?;
        if !output.success {
            return Err(output.into_error("mvn", coordinate, NOT_FOUND_MARKERS));
        }

        info!(job_id = job.id(), coordinate, "Maven artifact resolved");
        Ok(Fetched::Content(ContentRef::DirectoryTree(repository)))
    }
}
