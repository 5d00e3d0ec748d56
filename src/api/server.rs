use std::future::Future;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::info;

use super::{
    services::{health, submit_request},
    state::AppState,
};

/// Routes of the service surface
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/requests", post(submit_request))
        .route("/health", get(health))
        .with_state(state)
        // gzip request bodies are inflated before the size check
        .layer(RequestDecompressionLayer::new())
}

/// Serve until `shutdown` resolves, then finish in-flight HTTP requests
pub async fn serve<S>(listener: TcpListener, state: AppState, shutdown: S) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let address = listener.local_addr()?;
    info!(%address, "depfetch HTTP surface listening");

    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
}
