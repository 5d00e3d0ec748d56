use std::sync::Arc;

use depfetch::api::{self, AppState};
use depfetch::config::Config;
use depfetch::fetchers::FetcherRegistry;
use depfetch::observability::Metrics;
use depfetch::pipeline::{Pipeline, StageTimeouts};
use depfetch::router::Dispatcher;
use depfetch::status::{self, ChannelStatusPublisher};
use depfetch::transport::MemoryQueue;
use depfetch::upload;
use depfetch::worker::{Worker, WorkerConfig};
use depfetch::workspace::Workspace;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Wire up the worker, the status drain and the HTTP surface, and run them
/// until a shutdown signal arrives
pub async fn run(config: Config) -> Result<(), AnyError> {
    let metrics = Arc::new(Metrics::new());

    let workspace = Workspace::new(&config.worker.temp_dir);
    tokio::fs::create_dir_all(workspace.root()).await?;
    info!(root = %workspace.root().display(), "Workspace root ready");

    let (status, status_rx) = ChannelStatusPublisher::new(
        config.worker.status_queue.clone(),
        config.worker.queue_capacity,
    );
    let drainer = tokio::spawn(status::drain(status_rx, metrics.clone()));

    let uploader = upload::from_config(&config.upload)?;
    let registry = FetcherRegistry::from_config(&config.fetchers)?;
    info!(kinds = ?registry.kinds().collect::<Vec<_>>(), "Fetchers registered");

    let pipeline = Pipeline::new(
        workspace,
        uploader,
        Arc::new(status),
        StageTimeouts::from(&config.timeouts),
    );
    let dispatcher = Dispatcher::new(registry, pipeline, metrics.clone());

    let queue = Arc::new(MemoryQueue::new(
        config.worker.request_queue.clone(),
        config.worker.queue_capacity,
    ));

    let shutdown = CancellationToken::new();
    let worker = Worker::new(queue.clone(), dispatcher, WorkerConfig::from(&config.worker));
    let worker_handle = tokio::spawn(worker.run(shutdown.clone()));

    let listener = TcpListener::bind(config.server.bind_addr).await?;
    let state = AppState::new(config.server.clone(), queue.clone(), metrics.clone());

    let signal_token = shutdown.clone();
    let served = api::serve(listener, state, async move {
        shutdown_signal().await;
        signal_token.cancel();
    })
    .await;

    // The HTTP side may also stop on its own error; drain either way
    shutdown.cancel();
    queue.close();

    match worker_handle.await {
        Ok(processed) => info!(processed, "Worker drained"),
        Err(e) => error!(error = %e, "Worker task failed"),
    }
    // Dropping the worker released the last status publisher
    if let Err(e) = drainer.await {
        error!(error = %e, "Status drain task failed");
    }

    info!(metrics = ?metrics.snapshot(), "depfetch stopped");
    served?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining");
}
