use std::path::PathBuf;

use thiserror::Error;

/// Everything the store can report to its caller.  Nothing is retried; a
/// failed fetch leaves the cache cell empty so the next identical request
/// tries again.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network unreachable, timed out, or an HTTP failure with no envelope.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-empty `err` field.
    #[error("service error: {message}")]
    Service { message: String },

    /// The response body was not the expected JSON.
    #[error("malformed response: {0}")]
    Decode(String),

    #[error("page {page} is outside 1..={total}")]
    InvalidPage { page: u32, total: u32 },

    /// The album/page/index a command referred to no longer resolves.
    #[error("selection no longer available: {0}")]
    StaleSelection(String),

    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state-owning event loop has stopped.
    #[error("store is not running")]
    Closed,
}

impl StoreError {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            StoreError::Decode(e.to_string())
        } else {
            StoreError::Transport(e.to_string())
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
