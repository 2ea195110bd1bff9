//! Error types for the update checker.

/// Top-level error type for the update check pipeline.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// Transport-level failure talking to the releases API.
    #[error("network error: {0}")]
    Network(String),

    /// The fetch did not complete within the configured deadline.
    #[error("release fetch timed out")]
    Timeout,

    /// The releases payload was malformed or missing required fields.
    #[error("parse error: {0}")]
    Parse(String),

    /// A check was requested while another one is still in flight.
    #[error("an update check is already in progress")]
    CheckInProgress,

    /// Invalid updater configuration (bad project URL, missing host).
    #[error("config error: {0}")]
    Config(String),

    /// Settings store read/write failure.
    #[error("settings error: {0}")]
    Settings(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, UpdateError>;
