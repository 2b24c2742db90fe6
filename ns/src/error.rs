//! Store error types

use std::path::PathBuf;
use thiserror::Error;

/// Persistence failures
///
/// Missing nodes or users are not errors; see [`crate::Outcome`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} file not found: {}", .path.display())]
    MissingFile { kind: &'static str, path: PathBuf },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid data in {}: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
