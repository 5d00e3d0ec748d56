use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use super::tool::run_tool;
use super::traits::{Fetch, FetchError, Fetched};
use crate::job::{ContentRef, Job};
use crate::workspace::sanitize_name;

const NOT_FOUND_MARKERS: &[&str] = &["Could not find a version", "No matching distribution"];

/// Downloads binary wheels for a pip requirement and everything it pulls in
#[derive(Debug, Clone)]
pub struct PythonFetcher {
    binary: String,
    python_version: String,
    platform: String,
}

impl PythonFetcher {
    pub fn new(
        binary: impl Into<String>,
        python_version: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            binary: binary.into(),
            python_version: python_version.into(),
            platform: platform.into(),
        }
    }

    fn args(&self, requirement: &str, dest: &Path) -> Vec<String> {
        vec![
            "download".to_string(),
            requirement.to_string(),
            "--python-version".to_string(),
            self.python_version.clone(),
            "--dest".to_string(),
            dest.display().to_string(),
            "--only-binary=:all:".to_string(),
            "--platform".to_string(),
            self.platform.clone(),
        ]
    }
}

#[async_trait]
impl Fetch for PythonFetcher {
    async fn fetch(&self, job: &Job, workspace: &Path) -> Result<Fetched, FetchError> {
        let requirement = job.reference();
        let dest = workspace.join(sanitize_name(requirement));
        tokio::fs::create_dir_all(&dest).await?;

        let output = run_tool(&self.binary, self.args(requirement, &dest), None).await?;
        if !output.success {
            return Err(output.into_error("pip", requirement, NOT_FOUND_MARKERS));
        }

        info!(job_id = job.id(), requirement, "Python package downloaded");
        Ok(Fetched::Content(ContentRef::DirectoryTree(dest)))
    }
}
