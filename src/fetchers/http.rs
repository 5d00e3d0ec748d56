//! HTTP client for downloading dependency content

use reqwest::{Client, StatusCode};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::traits::FetchError;
use crate::config::HttpSettings;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to write download: {0}")]
    Io(#[from] std::io::Error),
}

impl HttpError {
    /// Worth another attempt within the same fetch
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::RequestFailed(_) | HttpError::Timeout => true,
            HttpError::Status { status, .. } => {
                *status >= 500 || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
            }
            HttpError::NotFound(_) | HttpError::InvalidUrl(_) | HttpError::Io(_) => false,
        }
    }
}

impl From<HttpError> for FetchError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::NotFound(url) => FetchError::NotFound(url),
            other => FetchError::Transient(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, HttpError>;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(600),
            max_retries: 3,
            retry_backoff: Duration::from_secs(1),
            user_agent: concat!("depfetch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl From<&HttpSettings> for HttpConfig {
    fn from(settings: &HttpSettings) -> Self {
        Self {
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            max_retries: settings.max_retries,
            retry_backoff: Duration::from_millis(settings.retry_backoff_ms),
            user_agent: settings.user_agent.clone(),
        }
    }
}

const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Exponential backoff after the `attempt`-th failure: base, 2x base, 4x base, ...
fn backoff_for(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

/// HTTP downloader with bounded retries
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpConfig,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| HttpError::RequestFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Stream `url` into `dest`, returning the number of bytes written
    pub async fn download_to_file(&self, url: &str, dest: &Path) -> Result<u64> {
        self.with_retry(url, || self.download_once(url, dest)).await
    }

    /// Fetch `url` as text
    pub async fn get_text(&self, url: &str) -> Result<String> {
        self.with_retry(url, || async {
            let response = self.send(url).await?;
            response
                .text()
                .await
                .map_err(|e| HttpError::RequestFailed(format!("Failed to read body: {}", e)))
        })
        .await
    }

    async fn with_retry<T, F, Fut>(&self, url: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match op().await {
                Ok(value) => {
                    if attempts > 1 {
                        debug!(url, attempts, "Download succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() || attempts >= self.config.max_retries => {
                    warn!(url, attempts, error = %e, "Download failed");
                    return Err(e);
                }
                Err(e) => {
                    warn!(url, attempts, error = %e, "Download failed, retrying");
                    tokio::time::sleep(backoff_for(self.config.retry_backoff, attempts)).await;
                }
            }
        }
    }

    async fn download_once(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self.send(url).await?;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| HttpError::RequestFailed(format!("Failed to read body: {}", e)))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(url, size = written, "Download completed");
        Ok(written)
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response> {
        debug!(url, "Starting request");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout
            } else if e.is_builder() {
                HttpError::InvalidUrl(format!("{}: {}", url, e))
            } else {
                HttpError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(HttpError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response)
    }
}
