use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use super::tool::run_tool;
use super::traits::{Fetch, FetchError, Fetched};
use crate::job::{ArchiveRef, Job};
use crate::workspace::sanitize_name;

const NOT_FOUND_MARKERS: &[&str] = &[
    "not found",
    "manifest unknown",
    "pull access denied",
    "does not exist",
];

/// Pulls an image and exports it with `docker save`
///
/// The saved tarball is already the final artifact, so this is the one
/// fetcher that skips packaging.
#[derive(Debug, Clone)]
pub struct DockerFetcher {
    binary: String,
}

impl DockerFetcher {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl Fetch for DockerFetcher {
    async fn fetch(&self, job: &Job, workspace: &Path) -> Result<Fetched, FetchError> {
        let image = job.reference();

        let pull = run_tool(&self.binary, ["pull", image], None).await?;
        if !pull.success {
            return Err(pull.into_error("docker pull", image, NOT_FOUND_MARKERS));
        }

        let tarball = workspace.join(format!("{}.tar", sanitize_name(image)));
        let tarball_arg = tarball.display().to_string();
        let save = run_tool(&self.binary, ["save", "-o", tarball_arg.as_str(), image], None).await?;
        if !save.success {
            // The image was just pulled, so a failed save is never "not found"
            return Err(FetchError::Transient(format!(
                "docker save failed for {}: {}",
                image,
                save.stderr.trim()
            )));
        }

        info!(job_id = job.id(), image, tarball = %tarball.display(), "Docker image saved");
        Ok(Fetched::Archive(ArchiveRef::new(tarball)))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::fetchers::tool::fake;
    use crate::job::DependencyKind;
    use tempfile::TempDir;

    const FAKE_DOCKER: &str = r#"case "$1" in
  pull) [ "$2" = "doesnotexist:latest" ] && { echo "Error response from daemon: manifest unknown" >&2; exit 1; }; exit 0 ;;
  save) echo image > "$3" ;;
esac"#;

    #[tokio::test]
    async fn test_saved_image_is_native_archive() {
        let temp = TempDir::new().unwrap();
        let docker = fake::script(temp.path(), "docker", FAKE_DOCKER);
        let fetcher = DockerFetcher::new(docker.to_string_lossy());
        let job = Job::new(2, DependencyKind::Docker, "library/alpine:3.20");

        let fetched = fetcher.fetch(&job, temp.path()).await.unwrap();

        let tarball = temp.path().join("library_alpine_3_20.tar");
        assert_eq!(fetched, Fetched::Archive(ArchiveRef::new(&tarball)));
        assert!(tarball.exists());
    }

    #[tokio::test]
    async fn test_unknown_image_is_not_found() {
        let temp = TempDir::new().unwrap();
        let docker = fake::script(temp.path(), "docker", FAKE_DOCKER);
        let fetcher = DockerFetcher::new(docker.to_string_lossy());
        let job = Job::new(2, DependencyKind::Docker, "doesnotexist:latest");

        let err = fetcher.fetch(&job, temp.path()).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!temp.path().join("doesnotexist_latest.tar").exists());
    }
}
