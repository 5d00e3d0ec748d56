//! HTTP surface: health check and request ingest

mod error;
pub mod models;
mod server;
pub mod services;
pub mod state;
pub(crate) mod utils;

pub use error::ApiError;
pub use server::{router, serve};
pub use state::AppState;
