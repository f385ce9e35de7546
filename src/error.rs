//! Error types for the rollcall service.

/// Top-level error type for roster intake, export and delivery.
#[derive(Debug, thiserror::Error)]
pub enum RollcallError {
    /// Configuration error (missing credentials, bad schedule, invalid file).
    #[error("config error: {0}")]
    Config(String),

    /// Date expression could not be normalized.
    #[error("date error: {0}")]
    Date(String),

    /// Roster export error (serialization, artifact persistence).
    #[error("export error: {0}")]
    Export(String),

    /// Reply or push delivery error.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Scheduler error (cycle execution, schedule computation).
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, RollcallError>;
