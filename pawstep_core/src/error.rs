//! Error types for the pawstep_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for session-machine operations
pub type TrackingResult<T> = std::result::Result<T, TrackingError>;

/// Core error type for pawstep_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Breed catalog validation error
    #[error("Catalog validation error: {0}")]
    CatalogValidation(String),

    /// State management error
    #[error("State error: {0}")]
    State(String),

    /// Motion tracking error
    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Outcomes surfaced by the session machine and the motion collaborator.
///
/// Permission and availability failures are terminal for the calling
/// operation; callers decide whether to retry.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TrackingError {
    /// The device has no step counting hardware
    #[error("step counting is not available on this device")]
    NotAvailable,

    #[error("motion permission denied")]
    PermissionDenied,

    /// A range query produced nothing (or timed out)
    #[error("no step data available for the requested range")]
    DataNotAvailable,

    #[error("a walk session is already active")]
    SessionAlreadyActive,

    #[error("no walk session is active")]
    NoActiveSession,

    #[error("unknown tracking error: {0}")]
    Unknown(String),
}
