//! Worker loop: pulls deliveries and runs them with bounded concurrency

mod runner;

pub use runner::process_delivery;

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::fetchers::{Fetch, Fetcher};
use crate::router::{AckDecision, Dispatcher};
use crate::transport::MessageTransport;

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

impl From<&crate::config::WorkerSettings> for WorkerConfig {
    fn from(settings: &crate::config::WorkerSettings) -> Self {
        Self {
            concurrency: settings.concurrency,
        }
    }
}

pub struct Worker<T: ?Sized, F = Fetcher> {
    transport: Arc<T>,
    dispatcher: Dispatcher<F>,
    config: WorkerConfig,
}

impl<T, F> Worker<T, F>
where
    T: MessageTransport + ?Sized + 'static,
    F: Fetch + 'static,
{
    pub fn new(transport: Arc<T>, dispatcher: Dispatcher<F>, config: WorkerConfig) -> Self {
        Self {
            transport,
            dispatcher,
            config,
        }
    }

    /// Consume until `shutdown` fires or the transport closes, then drain
    ///
    /// Every delivery taken from the transport is settled before this
    /// returns. Returns the number of deliveries processed.
    pub async fn run(self, shutdown: CancellationToken) -> usize {
        let concurrency = self.config.concurrency.max(1);
        let permits = Arc::new(Semaphore::new(concurrency));
        let mut tasks = JoinSet::new();
        let mut processed = 0usize;

        info!(concurrency, "Worker started");

        loop {
            let permit = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let delivery = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                delivery = self.transport.next() => match delivery {
                    Some(delivery) => delivery,
                    None => {
                        debug!("Transport closed");
                        break;
                    }
                },
            };

            let transport = self.transport.clone();
            let dispatcher = self.dispatcher.clone();
            tasks.spawn(async move {
                let decision = process_delivery(transport, dispatcher, delivery).await;
                drop(permit);
                decision
            });

            while let Some(finished) = tasks.try_join_next() {
                Self::record(finished);
                processed += 1;
            }
        }

        info!(in_flight = tasks.len(), "Worker stopping, draining in-flight jobs");
        while let Some(finished) = tasks.join_next().await {
            Self::record(finished);
            processed += 1;
        }
        info!(processed, "Worker stopped");
        processed
    }

    fn record(finished: Result<AckDecision, JoinError>) {
        // process_delivery contains pipeline panics; this only fires on a settlement bug
        if let Err(e) = finished {
            error!(error = %e, "Delivery task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetchers::FetcherRegistry;
    use crate::job::DependencyKind;
    use crate::observability::Metrics;
    use crate::pipeline::{Pipeline, StageTimeouts};
    use crate::status::MemoryStatusPublisher;
    use crate::testing::{RecordingUploader, ScriptedFetcher};
    use crate::transport::MemoryQueue;
    use crate::workspace::Workspace;
    use std::time::Duration;
    use tempfile::TempDir;

    fn dispatcher(temp: &TempDir, fetcher: ScriptedFetcher) -> Dispatcher<ScriptedFetcher> {
        let pipeline = Pipeline::new(
            Workspace::new(temp.path()),
            Arc::new(RecordingUploader::new()),
            Arc::new(MemoryStatusPublisher::new()),
            StageTimeouts::default(),
        );
        let registry = FetcherRegistry::new().with(DependencyKind::File, fetcher);
        Dispatcher::new(registry, pipeline, Arc::new(Metrics::new()))
    }

    fn request(id: i64) -> String {
        format!(r#"{{"id":{},"kind":"FILE","reference":"https://host/{}.bin"}}"#, id, id)
    }

    #[tokio::test]
    async fn test_worker_processes_until_transport_closes() {
        let temp = TempDir::new().unwrap();
        let dispatcher = dispatcher(&temp, ScriptedFetcher::file("a.bin", b"x"));
        let metrics = dispatcher.metrics().clone();
        let queue = Arc::new(MemoryQueue::new("requests", 16));
        for id in 1..=5 {
            queue.publish(request(id)).unwrap();
        }

        let worker = Worker::new(queue.clone(), dispatcher, WorkerConfig { concurrency: 2 });
        let handle = tokio::spawn(worker.run(CancellationToken::new()));

        tokio::time::timeout(Duration::from_secs(10), async {
            while metrics.snapshot().acked < 5 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        queue.close();

        assert_eq!(handle.await.unwrap(), 5);
        assert_eq!(queue.unsettled(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_drains_in_flight_jobs() {
        let temp = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::delayed(Duration::from_millis(300), "a.bin", b"x");
        let dispatcher = dispatcher(&temp, fetcher);
        let metrics = dispatcher.metrics().clone();
        let queue = Arc::new(MemoryQueue::new("requests", 16));
        queue.publish(request(1)).unwrap();

        let shutdown = CancellationToken::new();
        let worker = Worker::new(queue.clone(), dispatcher, WorkerConfig::default());
        let handle = tokio::spawn(worker.run(shutdown.clone()));

        tokio::time::timeout(Duration::from_secs(10), async {
            while metrics.snapshot().in_flight < 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        // The fetch is still sleeping when shutdown arrives
        assert_eq!(metrics.snapshot().acked, 0);
        shutdown.cancel();

        assert_eq!(handle.await.unwrap(), 1);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.acked, 1);
        assert_eq!(snapshot.in_flight, 0);
        assert_eq!(queue.unsettled(), 0);
        // Nothing is pulled after shutdown
        queue.publish(request(2)).unwrap();
        assert_eq!(queue.depth(), 1);
    }

    #[tokio::test]
    async fn test_invalid_messages_are_rejected() {
        let temp = TempDir::new().unwrap();
        let dispatcher = dispatcher(&temp, ScriptedFetcher::file("a.bin", b"x"));
        let metrics = dispatcher.metrics().clone();
        let queue = Arc::new(MemoryQueue::new("requests", 16));
        queue.publish("garbage").unwrap();
        queue
            .publish(r#"{"id":3,"kind":"HELM","reference":"https://charts/index.yaml"}"#)
            .unwrap();

        let worker = Worker::new(queue.clone(), dispatcher, WorkerConfig::default());
        let handle = tokio::spawn(worker.run(CancellationToken::new()));

        tokio::time::timeout(Duration::from_secs(10), async {
            while metrics.snapshot().rejected < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        queue.close();

        assert_eq!(handle.await.unwrap(), 2);
        assert_eq!(queue.depth(), 0);
    }
}
