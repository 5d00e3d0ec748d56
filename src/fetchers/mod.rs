//! Fetch strategies, one per dependency kind
//!
//! Every strategy implements [`Fetch`]. [`Fetcher`] closes over the
//! built-in strategies so production dispatch is a plain `match`; the
//! [`FetcherRegistry`] maps each [`DependencyKind`](crate::job::DependencyKind)
//! to its strategy.

mod docker;
mod file;
mod helm;
pub mod http;
mod maven;
mod npm;
mod python;
mod registry;
pub mod tool;
mod traits;
mod website;

pub use docker::DockerFetcher;
pub use file::FileFetcher;
pub use helm::{ChartVersion, HelmFetcher, HelmIndex};
pub use http::{HttpClient, HttpConfig, HttpError};
pub use maven::MavenFetcher;
pub use npm::NpmFetcher;
pub use python::PythonFetcher;
pub use registry::{FetcherRegistry, RegistryError};
pub use traits::{Fetch, FetchError, Fetched};
pub use website::WebsiteFetcher;

use async_trait::async_trait;
use std::path::Path;

use crate::job::Job;

/// The built-in fetch strategies
#[derive(Debug, Clone)]
pub enum Fetcher {
    Docker(DockerFetcher),
    Maven(MavenFetcher),
    Python(PythonFetcher),
    Npm(NpmFetcher),
    File(FileFetcher),
    Helm(HelmFetcher),
    Website(WebsiteFetcher),
}

#[async_trait]
impl Fetch for Fetcher {
    async fn fetch(&self, job: &Job, workspace: &Path) -> Result<Fetched, FetchError> {
        match self {
            Fetcher::Docker(f) => f.fetch(job, workspace).await,
            Fetcher::Maven(f) => f.fetch(job, workspace).await,
            Fetcher::Python(f) => f.fetch(job, workspace).await,
            Fetcher::Npm(f) => f.fetch(job, workspace).await,
            Fetcher::File(f) => f.fetch(job, workspace).await,
            Fetcher::Helm(f) => f.fetch(job, workspace).await,
            Fetcher::Website(f) => f.fetch(job, workspace).await,
        }
    }
}
