use super::models::{Config, UploadProvider};
use reqwest::header::HeaderName;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("worker.concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("worker.queue_capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("Queue name {field} must not be empty")]
    EmptyQueueName { field: &'static str },

    #[error("Timeout {field} must be positive")]
    ZeroTimeout { field: &'static str },

    #[error("Invalid upload endpoint '{endpoint}': {reason}")]
    InvalidUploadEndpoint { endpoint: String, reason: String },

    #[error("Invalid header name in {field}: '{value}'")]
    InvalidHeaderName { field: &'static str, value: String },

    #[error("Fetcher binary {field} must not be empty")]
    EmptyBinary { field: &'static str },

    #[error("fetchers.http.max_retries must be at least 1")]
    ZeroRetries,

    #[error("server.max_body_bytes must be positive")]
    ZeroBodyLimit,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_worker(config)?;
    validate_timeouts(config)?;
    validate_upload(config)?;
    validate_fetchers(config)?;
    validate_server(config)?;
    Ok(())
}

fn validate_worker(config: &Config) -> Result<(), ValidationError> {
    let worker = &config.worker;
    if worker.concurrency == 0 {
        return Err(ValidationError::ZeroConcurrency);
    }
    if worker.queue_capacity == 0 {
        return Err(ValidationError::ZeroQueueCapacity);
    }
    for (field, name) in [
        ("worker.request_queue", &worker.request_queue),
        ("worker.status_queue", &worker.status_queue),
    ] {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyQueueName { field });
        }
    }
    Ok(())
}

fn validate_timeouts(config: &Config) -> Result<(), ValidationError> {
    let timeouts = &config.timeouts;
    for (field, secs) in [
        ("timeouts.fetch_secs", timeouts.fetch_secs),
        ("timeouts.package_secs", timeouts.package_secs),
        ("timeouts.upload_secs", timeouts.upload_secs),
    ] {
        if secs == 0 {
            return Err(ValidationError::ZeroTimeout { field });
        }
    }
    Ok(())
}

/// Endpoint and header names only matter to the HTTP provider
fn validate_upload(config: &Config) -> Result<(), ValidationError> {
    let upload = &config.upload;
    if upload.provider != UploadProvider::Http {
        return Ok(());
    }

    let invalid = |reason: String| ValidationError::InvalidUploadEndpoint {
        endpoint: upload.endpoint.clone(),
        reason,
    };
    let url = Url::parse(&upload.endpoint).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }

    for (field, value) in [
        ("upload.reference_header", &upload.reference_header),
        ("upload.kind_header", &upload.kind_header),
    ] {
        if HeaderName::from_bytes(value.as_bytes()).is_err() {
            return Err(ValidationError::InvalidHeaderName {
                field,
                value: value.clone(),
            });
        }
    }
    Ok(())
}

fn validate_fetchers(config: &Config) -> Result<(), ValidationError> {
    let fetchers = &config.fetchers;
    for (field, binary) in [
        ("fetchers.docker_bin", &fetchers.docker_bin),
        ("fetchers.maven_bin", &fetchers.maven_bin),
        ("fetchers.pip_bin", &fetchers.pip_bin),
        ("fetchers.npm_bin", &fetchers.npm_bin),
        ("fetchers.chromium_bin", &fetchers.chromium_bin),
    ] {
        if binary.trim().is_empty() {
            return Err(ValidationError::EmptyBinary { field });
        }
    }
    if fetchers.http.max_retries == 0 {
        return Err(ValidationError::ZeroRetries);
    }
    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    if config.server.max_body_bytes == 0 {
        return Err(ValidationError::ZeroBodyLimit);
    }
    Ok(())
}
