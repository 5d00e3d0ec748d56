//! The per-job processing pipeline
//!
//! FETCH → PACKAGE → UPLOAD, then CLEANUP on every path. Each transition is
//! published as a status event before the stage's work starts; a failure
//! anywhere publishes FAILED and maps to a [`PipelineOutcome`].

mod engine;
mod error;
mod outcome;

pub use engine::{Pipeline, StageTimeouts};
pub use error::{PipelineError, Stage};
pub use outcome::PipelineOutcome;
