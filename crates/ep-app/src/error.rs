//! Error types for the ep-app service layer.

use std::path::PathBuf;

/// Application error type that wraps errors from the library crates
/// and gives the CLI one error surface.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Precondition violated: {what}")]
    Precondition { what: String },

    #[error("Project error: {0}")]
    Project(String),

    #[error("Scenario not found: {0}")]
    ScenarioNotFound(String),

    #[error("Failed to read fixture: {path}")]
    FixtureRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid fixture {path}: {message}")]
    Fixture { path: PathBuf, message: String },

    #[error("Engine error: {0}")]
    Engine(#[from] crate::engines::EngineError),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Geography error: {0}")]
    Geo(String),

    #[error("Accounting error: {0}")]
    Accounting(String),

    #[error("Results error: {0}")]
    Results(String),

    #[error("Checkpoint not found: {0}")]
    CheckpointNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ep-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<ep_core::EpError> for AppError {
    fn from(err: ep_core::EpError) -> Self {
        AppError::Dataset(err.to_string())
    }
}

impl From<ep_geo::GeoError> for AppError {
    fn from(err: ep_geo::GeoError) -> Self {
        AppError::Geo(err.to_string())
    }
}

impl From<ep_accounting::AccountingError> for AppError {
    fn from(err: ep_accounting::AccountingError) -> Self {
        AppError::Accounting(err.to_string())
    }
}

impl From<ep_project::ProjectError> for AppError {
    fn from(err: ep_project::ProjectError) -> Self {
        match err {
            ep_project::ProjectError::UnknownScenario { id } => AppError::ScenarioNotFound(id),
            other => AppError::Project(other.to_string()),
        }
    }
}

impl From<ep_results::ResultsError> for AppError {
    fn from(err: ep_results::ResultsError) -> Self {
        match err {
            ep_results::ResultsError::CheckpointNotFound { scenario_id, tag } => {
                AppError::CheckpointNotFound(format!("{scenario_id} ({tag})"))
            }
            other => AppError::Results(other.to_string()),
        }
    }
}
