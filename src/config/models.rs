use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub worker: WorkerSettings,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub fetchers: FetchersConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Request consumption and per-job workspace settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerSettings {
    /// Maximum pipelines running at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Process-wide temp root; each job gets a namespace below it
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    #[serde(default = "default_request_queue")]
    pub request_queue: String,
    #[serde(default = "default_status_queue")]
    pub status_queue: String,
    /// Requests buffered before ingest answers 503
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            temp_dir: default_temp_dir(),
            request_queue: default_request_queue(),
            status_queue: default_status_queue(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("/tmp/depfetch")
}

fn default_request_queue() -> String {
    "dependency.download_requests".to_string()
}

fn default_status_queue() -> String {
    "dependency.download_status".to_string()
}

fn default_queue_capacity() -> usize {
    256
}

/// Per-stage time limits, in seconds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_fetch_secs")]
    pub fetch_secs: u64,
    #[serde(default = "default_package_secs")]
    pub package_secs: u64,
    #[serde(default = "default_upload_secs")]
    pub upload_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            fetch_secs: default_fetch_secs(),
            package_secs: default_package_secs(),
            upload_secs: default_upload_secs(),
        }
    }
}

fn default_fetch_secs() -> u64 {
    600
}

fn default_package_secs() -> u64 {
    300
}

fn default_upload_secs() -> u64 {
    300
}

/// Upload destination type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadProvider {
    #[default]
    Http,
    Local,
    Memory,
}

/// Upload configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    #[serde(default)]
    pub provider: UploadProvider,
    /// Collector URL for the `http` provider
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_reference_header")]
    pub reference_header: String,
    #[serde(default = "default_kind_header")]
    pub kind_header: String,
    /// Root directory for the `local` provider
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,
    /// Prepended to object keys for the `local` and `memory` providers
    #[serde(default)]
    pub key_prefix: String,
    /// Bearer token for the collector (loaded from environment, not from config file)
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            provider: UploadProvider::default(),
            endpoint: default_endpoint(),
            reference_header: default_reference_header(),
            kind_header: default_kind_header(),
            local_root: default_local_root(),
            key_prefix: String::new(),
            token: None,
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:9099/artifacts".to_string()
}

fn default_reference_header() -> String {
    "x-dependency-reference".to_string()
}

fn default_kind_header() -> String {
    "x-dependency-kind".to_string()
}

fn default_local_root() -> PathBuf {
    PathBuf::from("data/artifacts")
}

/// External tools and HTTP settings used by the fetchers
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchersConfig {
    #[serde(default = "default_docker_bin")]
    pub docker_bin: String,
    #[serde(default = "default_maven_bin")]
    pub maven_bin: String,
    #[serde(default = "default_pip_bin")]
    pub pip_bin: String,
    #[serde(default = "default_npm_bin")]
    pub npm_bin: String,
    #[serde(default = "default_chromium_bin")]
    pub chromium_bin: String,
    /// Interpreter version wheels are resolved for
    #[serde(default = "default_python_version")]
    pub python_version: String,
    #[serde(default = "default_python_platform")]
    pub python_platform: String,
    #[serde(default)]
    pub http: HttpSettings,
}

impl Default for FetchersConfig {
    fn default() -> Self {
        Self {
            docker_bin: default_docker_bin(),
            maven_bin: default_maven_bin(),
            pip_bin: default_pip_bin(),
            npm_bin: default_npm_bin(),
            chromium_bin: default_chromium_bin(),
            python_version: default_python_version(),
            python_platform: default_python_platform(),
            http: HttpSettings::default(),
        }
    }
}

fn default_docker_bin() -> String {
    "docker".to_string()
}

fn default_maven_bin() -> String {
    "mvn".to_string()
}

fn default_pip_bin() -> String {
    "pip".to_string()
}

fn default_npm_bin() -> String {
    "npm".to_string()
}

fn default_chromium_bin() -> String {
    "chromium".to_string()
}

fn default_python_version() -> String {
    "3.11".to_string()
}

fn default_python_platform() -> String {
    "manylinux2014_x86_64".to_string()
}

/// HTTP client settings for the FILE and HELM fetchers
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpSettings {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    600
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_user_agent() -> String {
    concat!("depfetch/", env!("CARGO_PKG_VERSION")).to_string()
}

/// HTTP surface configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Largest accepted request body on `POST /requests`
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}
