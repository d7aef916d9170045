//! ep-results: output tables and model checkpoints.

pub mod hash;
pub mod sink;
pub mod store;
pub mod types;

use std::path::PathBuf;

pub use hash::content_digest;
pub use sink::OutputSink;
pub use store::CheckpointStore;
pub use types::*;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Checkpoint not found: {scenario_id} ({tag})")]
    CheckpointNotFound { scenario_id: String, tag: CheckpointTag },

    #[error("Checkpoint digest mismatch (expected={expected}, got={actual})")]
    DigestMismatch { expected: String, actual: String },

    #[error("Header of {path} does not match (existing={existing:?}, new={new:?})")]
    HeaderMismatch {
        path: PathBuf,
        existing: Vec<String>,
        new: Vec<String>,
    },

    #[error("Invalid name: {name}")]
    InvalidName { name: String },
}
