use duralog_stream::StorageError;
use thiserror::Error;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The watcher loop has already been started.
    #[error("storage already started")]
    AlreadyStarted,

    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// A single record exceeded the maximum line length.
    #[error("record exceeds maximum length of {0} bytes")]
    LineTooLong(usize),

    /// The stream id could not be resolved to a file.
    #[error("stream not found")]
    NotFound,

    /// A mutating operation was attempted.
    #[error("storage is read-only")]
    ReadOnly,

    /// Failed to set up the filesystem watcher.
    #[error("failed to set up filesystem watcher: {0}")]
    Watch(#[from] notify::Error),
}

impl StorageError for Error {}
