//! Error types for prin.

use std::path::PathBuf;

use crate::source::http::FetchError;

/// Top-level error type for prin operations.
#[derive(Debug, thiserror::Error)]
pub enum PrinError {
    /// A root token that is neither an existing path, a usable pattern,
    /// nor a resolvable remote location. Aborts that root only.
    #[error("not traversable: {token}")]
    NotTraversable { token: String },

    /// The body of an otherwise-matched entry could not be read.
    #[error("failed to read {path}: {message}")]
    ReadFailure { path: PathBuf, message: String },

    #[error("invalid pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
}

impl PrinError {
    pub fn not_traversable(token: impl Into<String>) -> Self {
        PrinError::NotTraversable {
            token: token.into(),
        }
    }

    pub fn read_failure(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        PrinError::ReadFailure {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Map an error to its exit code.
pub fn exit_code(error: &PrinError) -> i32 {
    match error {
        PrinError::NotTraversable { .. } => 3,
        PrinError::ReadFailure { .. } => 1,
        PrinError::InvalidPattern { .. } => 2,
        PrinError::Config(_) => 2,
        PrinError::Io(_) => 1,
        PrinError::Fetch(_) => 1,
    }
}
