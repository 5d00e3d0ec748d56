use std::sync::Arc;

use crate::config::ServerConfig;
use crate::observability::Metrics;
use crate::transport::MemoryQueue;

#[derive(Clone)]
pub struct AppState {
    pub server: Arc<ServerConfig>,
    pub queue: Arc<MemoryQueue>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(server: ServerConfig, queue: Arc<MemoryQueue>, metrics: Arc<Metrics>) -> Self {
        Self {
            server: Arc::new(server),
            queue,
            metrics,
        }
    }
}
