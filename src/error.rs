//! Error types shared across the crate.

use thiserror::Error;

/// Result type for orchestrator operations
pub type E2eResult<T> = Result<T, E2eError>;

/// Errors that can occur while preparing or running a feature.
///
/// Inside a feature run these are turned into data on the
/// [`FeatureResult`](crate::runner::FeatureResult); only the CLI and the
/// loaders surface them as `Err`.
#[derive(Debug, Error)]
pub enum E2eError {
    /// The automation binary is absent and the install attempt did not help
    #[error("dependency not installed")]
    DependencyMissing,

    /// The browser session could not be opened, even after one retry
    #[error("failed to open browser session: {0}")]
    OpenFailure(String),

    /// Every candidate operation for a step failed
    #[error("{0}")]
    StepFailure(String),

    /// No feature with the requested id
    #[error("feature not found: {0}")]
    FeatureNotFound(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON input
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl E2eError {
    pub fn step(reason: impl Into<String>) -> Self {
        E2eError::StepFailure(reason.into())
    }
}
