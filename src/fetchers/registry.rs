use std::collections::BTreeMap;
use thiserror::Error;

use super::Fetcher;
use super::docker::DockerFetcher;
use super::file::FileFetcher;
use super::helm::HelmFetcher;
use super::http::{HttpClient, HttpConfig, HttpError};
use super::maven::MavenFetcher;
use super::npm::NpmFetcher;
use super::python::PythonFetcher;
use super::website::WebsiteFetcher;
use crate::config::FetchersConfig;
use crate::job::DependencyKind;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no fetcher registered for {0}")]
    NotFound(DependencyKind),
}

/// Fetchers keyed by dependency kind, built once at startup
///
/// Generic over the fetcher type so the worker dispatches through
/// [`Fetcher`]'s `match` in production and through scripted fakes in tests.
#[derive(Debug, Clone)]
pub struct FetcherRegistry<F = Fetcher> {
    fetchers: BTreeMap<DependencyKind, F>,
}

impl<F> FetcherRegistry<F> {
    pub fn new() -> Self {
        Self {
            fetchers: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, kind: DependencyKind, fetcher: F) {
        self.fetchers.insert(kind, fetcher);
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, kind: DependencyKind, fetcher: F) -> Self {
        self.register(kind, fetcher);
        self
    }

    pub fn get(&self, kind: DependencyKind) -> Result<&F, RegistryError> {
        self.fetchers.get(&kind).ok_or(RegistryError::NotFound(kind))
    }

    pub fn has_fetcher(&self, kind: DependencyKind) -> bool {
        self.fetchers.contains_key(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = DependencyKind> + '_ {
        self.fetchers.keys().copied()
    }
}

impl<F> Default for FetcherRegistry<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl FetcherRegistry<Fetcher> {
    /// Registry with a fetcher for every dependency kind
    pub fn from_config(config: &FetchersConfig) -> Result<Self, HttpError> {
        let client = HttpClient::new(HttpConfig::from(&config.http))?;

        Ok(Self::new()
            .with(
                DependencyKind::Docker,
                Fetcher::Docker(DockerFetcher::new(&config.docker_bin)),
            )
            .with(
                DependencyKind::Maven,
                Fetcher::Maven(MavenFetcher::new(&config.maven_bin)),
            )
            .with(
                DependencyKind::Python,
                Fetcher::Python(PythonFetcher::new(
                    &config.pip_bin,
                    &config.python_version,
                    &config.python_platform,
                )),
            )
            .with(DependencyKind::Npm, Fetcher::Npm(NpmFetcher::new(&config.npm_bin)))
            .with(
                DependencyKind::File,
                Fetcher::File(FileFetcher::new(client.clone())),
            )
            .with(DependencyKind::Helm, Fetcher::Helm(HelmFetcher::new(client)))
            .with(
                DependencyKind::Website,
                Fetcher::Website(WebsiteFetcher::new(&config.chromium_bin)),
            ))
    }
}
