pub mod api;
pub mod archive;
pub mod config;
pub mod fetchers;
pub mod job;
pub mod observability;
pub mod pipeline;
pub mod reaper;
pub mod router;
pub mod status;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;
pub mod upload;
pub mod worker;
pub mod workspace;
