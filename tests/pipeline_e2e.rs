//! End-to-end runs of the download pipeline
//!
//! Each test drives raw request messages through the [`Dispatcher`] with
//! real fetchers and uploaders where an HTTP mock can stand in for the
//! outside world, and scripted ones where a tool binary would be needed.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use depfetch::config::UploadConfig;
use depfetch::fetchers::{Fetch, Fetcher, FetcherRegistry, FileFetcher, HttpClient, HttpConfig};
use depfetch::job::{DependencyKind, JobState};
use depfetch::observability::Metrics;
use depfetch::pipeline::{Pipeline, StageTimeouts};
use depfetch::router::{AckDecision, Dispatcher};
use depfetch::status::MemoryStatusPublisher;
use depfetch::testing::{RecordingUploader, ScriptedFetcher};
use depfetch::upload::{ArtifactUploader, HttpUploader};
use depfetch::workspace::Workspace;
use tempfile::TempDir;
use walkdir::WalkDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn file_fetcher() -> Fetcher {
    let config = HttpConfig {
        retry_backoff: Duration::from_millis(5),
        ..HttpConfig::default()
    };
    Fetcher::File(FileFetcher::new(HttpClient::new(config).unwrap()))
}

fn dispatcher<F: Fetch>(
    root: &Path,
    registry: FetcherRegistry<F>,
    uploader: Arc<dyn ArtifactUploader>,
) -> (Dispatcher<F>, Arc<MemoryStatusPublisher>) {
    let status = Arc::new(MemoryStatusPublisher::new());
    let pipeline = Pipeline::new(
        Workspace::new(root),
        uploader,
        status.clone(),
        StageTimeouts::default(),
    );
    (Dispatcher::new(registry, pipeline, Arc::new(Metrics::new())), status)
}

/// Regular files left anywhere under the temp root
fn leftover_files(root: &Path) -> Vec<String> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path().display().to_string())
        .collect()
}

#[tokio::test]
async fn test_file_request_is_fetched_packaged_and_uploaded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"binary payload".to_vec()))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let uploader = Arc::new(RecordingUploader::new());
    let registry = FetcherRegistry::new().with(DependencyKind::File, file_fetcher());
    let (dispatcher, status) = dispatcher(temp.path(), registry, uploader.clone());

    let reference = format!("{}/a.bin", server.uri());
    let body = serde_json::json!({"id": 1, "kind": "FILE", "reference": reference});
    let decision = dispatcher.handle(body.to_string().as_bytes()).await;

    assert_eq!(decision, AckDecision::Ack);
    assert_eq!(
        status.states_for(1),
        vec![JobState::Fetching, JobState::Packaging, JobState::Uploading, JobState::Done]
    );

    let uploads = uploader.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].kind, DependencyKind::File);
    assert_eq!(uploads[0].reference, reference);
    assert!(uploads[0].file_name.ends_with(".tar"));

    let mut archive = tar::Archive::new(uploads[0].bytes.as_slice());
    let mut entries = archive.entries().unwrap();
    let mut entry = entries.next().unwrap().unwrap();
    assert_eq!(entry.path().unwrap().to_str(), Some("a.bin"));
    let mut content = Vec::new();
    entry.read_to_end(&mut content).unwrap();
    assert_eq!(content, b"binary payload");

    assert!(leftover_files(temp.path()).is_empty());
}

#[tokio::test]
async fn test_missing_docker_image_is_rejected_and_cleaned() {
    let temp = TempDir::new().unwrap();
    let fetcher = ScriptedFetcher::not_found();
    let registry = FetcherRegistry::new().with(DependencyKind::Docker, fetcher);
    let uploader = Arc::new(RecordingUploader::new());
    let (dispatcher, status) = dispatcher(temp.path(), registry, uploader.clone());

    let decision = dispatcher
        .handle(br#"{"id":2,"kind":"DOCKER","reference":"doesnotexist:latest"}"#)
        .await;

    assert_eq!(decision, AckDecision::Reject);
    assert_eq!(status.states_for(2), vec![JobState::Fetching, JobState::Failed]);
    assert!(uploader.uploads().is_empty());

    let docker_dir = temp.path().join("docker");
    let namespaces = std::fs::read_dir(&docker_dir)
        .map(|dir| dir.count())
        .unwrap_or(0);
    assert_eq!(namespaces, 0);
}

#[tokio::test]
async fn test_rejected_upload_is_requeued_and_archive_removed() {
    let files = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lib.jar"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jar".to_vec()))
        .mount(&files)
        .await;

    let collector = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/artifacts"))
        .respond_with(ResponseTemplate::new(503).set_body_string("collector busy"))
        .expect(1)
        .mount(&collector)
        .await;

    let upload_config = UploadConfig {
        endpoint: format!("{}/artifacts", collector.uri()),
        ..UploadConfig::default()
    };
    let uploader: Arc<dyn ArtifactUploader> = Arc::new(HttpUploader::new(&upload_config).unwrap());

    let temp = TempDir::new().unwrap();
    let registry = FetcherRegistry::new().with(DependencyKind::File, file_fetcher());
    let (dispatcher, status) = dispatcher(temp.path(), registry, uploader);

    let body = serde_json::json!({"id": 3, "kind": "FILE", "reference": format!("{}/lib.jar", files.uri())});
    let decision = dispatcher.handle(body.to_string().as_bytes()).await;

    assert_eq!(decision, AckDecision::Nack);
    assert_eq!(
        status.states_for(3),
        vec![JobState::Fetching, JobState::Packaging, JobState::Uploading, JobState::Failed]
    );
    assert!(leftover_files(temp.path()).is_empty());
}

#[tokio::test]
async fn test_unknown_kind_never_reaches_pipeline() {
    let temp = TempDir::new().unwrap();
    let fetcher = ScriptedFetcher::file("a.bin", b"x");
    let registry = FetcherRegistry::new().with(DependencyKind::File, fetcher);
    let (dispatcher, status) = dispatcher(temp.path(), registry, Arc::new(RecordingUploader::new()));

    let decision = dispatcher
        .handle(br#"{"id":9,"kind":"CARGO","reference":"serde"}"#)
        .await;

    assert_eq!(decision, AckDecision::Reject);
    assert!(status.events().is_empty());
    assert!(leftover_files(temp.path()).is_empty());
}

#[tokio::test]
async fn test_legacy_field_names_are_accepted() {
    let temp = TempDir::new().unwrap();
    let fetcher = ScriptedFetcher::tree(&[("left-pad-1.3.0.tgz", b"tgz")]);
    let registry = FetcherRegistry::new().with(DependencyKind::Npm, fetcher);
    let uploader = Arc::new(RecordingUploader::new());
    let (dispatcher, status) = dispatcher(temp.path(), registry, uploader.clone());

    let decision = dispatcher
        .handle(br#"{"id":7,"type":"NPM","dependency":"left-pad@1.3.0","status":"CREATED","date":"2024-05-01T10:00:00Z"}"#)
        .await;

    assert_eq!(decision, AckDecision::Ack);
    assert_eq!(status.states_for(7).last(), Some(&JobState::Done));
    assert_eq!(uploader.uploads()[0].reference, "left-pad@1.3.0");
}

#[tokio::test]
async fn test_transient_fetch_failure_is_requeued() {
    let temp = TempDir::new().unwrap();
    let registry = FetcherRegistry::new().with(DependencyKind::Maven, ScriptedFetcher::transient());
    let (dispatcher, status) = dispatcher(temp.path(), registry, Arc::new(RecordingUploader::new()));

    let decision = dispatcher
        .handle(br#"{"id":8,"kind":"MAVEN","reference":"org.slf4j:slf4j-api:2.0.13"}"#)
        .await;

    assert_eq!(decision, AckDecision::Nack);
    assert_eq!(status.states_for(8), vec![JobState::Fetching, JobState::Failed]);
    assert!(leftover_files(temp.path()).is_empty());
}
