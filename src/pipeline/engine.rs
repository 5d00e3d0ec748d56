use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::error::{PipelineError, Stage};
use super::outcome::PipelineOutcome;
use crate::archive::Archiver;
use crate::config::TimeoutsConfig;
use crate::fetchers::{Fetch, Fetched};
use crate::job::{Job, JobState};
use crate::reaper::Reaper;
use crate::status::StatusPublisher;
use crate::upload::ArtifactUploader;
use crate::workspace::{JobNamespace, Workspace};

/// Upper bound for each pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub fetch: Duration,
    pub package: Duration,
    pub upload: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            fetch: Duration::from_secs(600),
            package: Duration::from_secs(300),
            upload: Duration::from_secs(300),
        }
    }
}

impl From<&TimeoutsConfig> for StageTimeouts {
    fn from(config: &TimeoutsConfig) -> Self {
        Self {
            fetch: Duration::from_secs(config.fetch_secs),
            package: Duration::from_secs(config.package_secs),
            upload: Duration::from_secs(config.upload_secs),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

async fn bounded<T, E, Fut>(stage: Stage, after: Duration, fut: Fut) -> Result<T, PipelineError>
where
    Fut: Future<Output = Result<T, E>>,
    PipelineError: From<E>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result.map_err(PipelineError::from),
        Err(_) => Err(PipelineError::Timeout { stage, after }),
    }
}

/// Drives one job through fetch, package and upload
///
/// Shared by all concurrent runs; holds no per-job state. Every run ends
/// with exactly one cleanup of its namespace, whatever the outcome.
pub struct Pipeline {
    workspace: Workspace,
    archiver: Archiver,
    reaper: Reaper,
    uploader: Arc<dyn ArtifactUploader>,
    status: Arc<dyn StatusPublisher>,
    timeouts: StageTimeouts,
}

impl Pipeline {
    pub fn new(
        workspace: Workspace,
        uploader: Arc<dyn ArtifactUploader>,
        status: Arc<dyn StatusPublisher>,
        timeouts: StageTimeouts,
    ) -> Self {
        Self {
            workspace,
            archiver: Archiver::new(),
            reaper: Reaper::new(),
            uploader,
            status,
            timeouts,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub async fn run<F: Fetch + ?Sized>(&self, mut job: Job, fetcher: &F) -> PipelineOutcome {
        let namespace = self.workspace.namespace_for(&job);
        let span = info_span!(
            "pipeline",
            job_id = job.id(),
            kind = %job.kind(),
            reference = %job.reference()
        );

        async {
            // A panicking stage is one more transient failure: FAILED, then cleanup
            let executed = AssertUnwindSafe(self.execute(&mut job, fetcher, &namespace))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(PipelineError::Panicked(panic_message(payload))));

            let outcome = match executed {
                Ok(()) => {
                    info!("Job completed");
                    PipelineOutcome::Completed
                }
                Err(e) => {
                    let outcome = PipelineOutcome::from(&e);
                    warn!(error = %e, state = %job.state(), ?outcome, "Job failed");
                    self.fail(&mut job).await;
                    outcome
                }
            };

            self.cleanup(&mut job, &namespace).await;
            outcome
        }
        .instrument(span)
        .await
    }

    async fn execute<F: Fetch + ?Sized>(
        &self,
        job: &mut Job,
        fetcher: &F,
        namespace: &JobNamespace,
    ) -> Result<(), PipelineError> {
        self.fetch(job, fetcher, namespace).await?;
        self.package(job, namespace).await?;
        self.upload(job).await?;
        self.finish(job).await;
        Ok(())
    }

    async fn fetch<F: Fetch + ?Sized>(
        &self,
        job: &mut Job,
        fetcher: &F,
        namespace: &JobNamespace,
    ) -> Result<(), PipelineError> {
        self.advance(job, JobState::Fetching).await?;

        namespace.create().await.map_err(PipelineError::Workspace)?;
        let content_dir = namespace.content_dir();

        let fetched = bounded(
            Stage::Fetch,
            self.timeouts.fetch,
            fetcher.fetch(job, &content_dir),
        )
        .await?;

        match fetched {
            Fetched::Content(content) => {
                debug!(content = ?content, "Content fetched");
                job.set_content(content);
            }
            Fetched::Archive(archive) => {
                debug!(archive = %archive.path().display(), "Native archive fetched");
                job.set_archive(archive);
            }
        }
        Ok(())
    }

    async fn package(&self, job: &mut Job, namespace: &JobNamespace) -> Result<(), PipelineError> {
        self.advance(job, JobState::Packaging).await?;

        if job.archive().is_some() {
            debug!("Archive already present, skipping packaging");
            return Ok(());
        }

        let content = job.take_content();
        let result = bounded(
            Stage::Package,
            self.timeouts.package,
            self.archiver.archive(&content, &namespace.archive_path()),
        )
        .await;

        match result {
            Ok(archive) => {
                if let Some(path) = content.path() {
                    self.reaper.dispose(path).await;
                }
                job.set_archive(archive);
                Ok(())
            }
            Err(e) => {
                // Hand the content back so cleanup still disposes of it
                job.set_content(content);
                Err(e)
            }
        }
    }

    async fn upload(&self, job: &mut Job) -> Result<(), PipelineError> {
        self.advance(job, JobState::Uploading).await?;

        let archive = job.archive().ok_or(PipelineError::MissingArchive)?;
        let receipt = bounded(
            Stage::Upload,
            self.timeouts.upload,
            self.uploader
                .upload(archive.path(), job.kind(), job.reference()),
        )
        .await?;

        info!(location = %receipt.location, size = receipt.size, "Artifact uploaded");

        if let Some(archive) = job.take_archive() {
            self.reaper.dispose(archive.path()).await;
        }
        Ok(())
    }

    /// The artifact is already delivered, so a lost DONE event is only logged
    async fn finish(&self, job: &mut Job) {
        match job.transition(JobState::Done) {
            Ok(snapshot) => {
                if let Err(e) = self.status.publish(&snapshot).await {
                    error!(error = %e, "Failed to publish DONE status");
                }
            }
            Err(e) => error!(error = %e, "Cannot complete job"),
        }
    }

    async fn advance(&self, job: &mut Job, next: JobState) -> Result<(), PipelineError> {
        let snapshot = job.transition(next)?;
        self.status.publish(&snapshot).await?;
        Ok(())
    }

    async fn fail(&self, job: &mut Job) {
        let snapshot = match job.transition(JobState::Failed) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %e, "Cannot mark job as failed");
                return;
            }
        };
        if let Err(e) = self.status.publish(&snapshot).await {
            error!(error = %e, "Failed to publish FAILED status");
        }
    }

    /// Release everything the job still owns, then its namespace
    ///
    /// Never fails; calling it again on the same job is a no-op.
    pub(crate) async fn cleanup(&self, job: &mut Job, namespace: &JobNamespace) {
        let content = job.take_content();
        if let Some(path) = content.path() {
            self.reaper.dispose(path).await;
        }
        if let Some(archive) = job.take_archive() {
            self.reaper.dispose(archive.path()).await;
        }
        self.reaper.dispose(namespace.dir()).await;
    }
}
