use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use super::tool::run_tool;
use super::traits::{Fetch, FetchError, Fetched};
use crate::job::{ContentRef, Job};
use crate::workspace::sanitize_name;

const NOT_FOUND_MARKERS: &[&str] = &["404", "not found"];

/// Packs an npm package spec into its registry tarball
#[derive(Debug, Clone)]
pub struct NpmFetcher {
    binary: String,
}

impl NpmFetcher {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl Fetch for NpmFetcher {
    async fn fetch(&self, job: &Job, workspace: &Path) -> Result<Fetched, FetchError> {
        let spec = job.reference();
        let dest = workspace.join(sanitize_name(spec));
        tokio::fs::create_dir_all(&dest).await?;

        // npm pack writes the tarball into its working directory
        let output = run_tool(&self.binary, ["pack", spec], Some(&dest)).await?;
        if !output.success {
            return Err(output.into_error("npm", spec, NOT_FOUND_MARKERS));
        }

        info!(job_id = job.id(), spec, "npm package packed");
        Ok(Fetched::Content(ContentRef::DirectoryTree(dest)))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::fetchers::tool::fake;
    use crate::job::DependencyKind;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_pack_runs_in_package_dir() {
        let temp = TempDir::new().unwrap();
        let npm = fake::script(temp.path(), "npm", "touch left-pad-1.3.0.tgz");
        let fetcher = NpmFetcher::new(npm.to_string_lossy());
        let job = Job::new(6, DependencyKind::Npm, "left-pad@1.3.0");

        let fetched = fetcher.fetch(&job, temp.path()).await.unwrap();

        let dest = temp.path().join("left-pad_1_3_0");
        assert_eq!(fetched, Fetched::Content(ContentRef::DirectoryTree(dest.clone())));
        assert!(dest.join("left-pad-1.3.0.tgz").exists());
    }

    #[tokio::test]
    async fn test_registry_404_is_not_found() {
        let temp = TempDir::new().unwrap();
        let npm = fake::script(
            temp.path(),
            "npm",
            "echo 'npm ERR! 404 Not Found - GET https://registry.npmjs.org/nope' >&2; exit 1",
        );
        let fetcher = NpmFetcher::new(npm.to_string_lossy());
        let job = Job::new(6, DependencyKind::Npm, "nope");

        let err = fetcher.fetch(&job, temp.path()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_other_failures_are_transient() {
        let temp = TempDir::new().unwrap();
        let npm = fake::script(temp.path(), "npm", "echo 'npm ERR! ETIMEDOUT' >&2; exit 1");
        let fetcher = NpmFetcher::new(npm.to_string_lossy());
        let job = Job::new(6, DependencyKind::Npm, "left-pad");

        let err = fetcher.fetch(&job, temp.path()).await.unwrap_err();
        assert!(!err.is_not_found());
    }
}
