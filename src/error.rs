use thiserror::Error;

/// Convenience result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Error type returned by every pipeline stage.
///
/// Value-level parse failures never appear here: the cleaner turns them into nulls.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Credentials are missing, malformed or rejected (source or store side).
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// The spreadsheet document or worksheet could not be reached.
    #[error("source unavailable: {message}")]
    SourceUnavailable { message: String },

    /// The worksheet header does not cover the required destination columns.
    #[error("missing required columns: {}", missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    /// The worksheet header row is unusable (empty or duplicated names).
    #[error("invalid header: {message}")]
    InvalidHeader { message: String },

    /// The store rejected the batch or the connection was lost.
    #[error("load failed: {message}")]
    Load { message: String },

    /// Configuration is incomplete or inconsistent.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// Underlying I/O error (e.g. export file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV export could not be read.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl SyncError {
    pub(crate) fn source_unavailable(message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            message: message.into(),
        }
    }

    pub(crate) fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub(crate) fn load(message: impl Into<String>) -> Self {
        Self::Load {
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
