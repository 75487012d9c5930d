use thiserror::Error;

/// Errors that can occur while building a camera registry
///
/// Once built, registry operations never fail because of a camera; faults
/// stay inside each connection and show up as `AlarmState::Unknown`.
#[derive(Error, Debug)]
pub enum ManagerError {
    /// The stream configuration was rejected
    #[error("Invalid stream configuration: {0}")]
    Configuration(#[from] camwatch_stream::StreamError),

    /// The registry configuration was rejected
    #[error("Invalid registry configuration: {0}")]
    InvalidConfiguration(String),

    /// The tokio runtime for connection tasks could not be created
    #[error("Failed to start connection runtime: {0}")]
    RuntimeInit(#[from] std::io::Error),
}

/// Result type for camera registry operations
pub type Result<T> = std::result::Result<T, ManagerError>;
