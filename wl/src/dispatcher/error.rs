//! Dispatch error types

use std::time::Duration;
use thiserror::Error;

/// Why a delivery attempt failed
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl DispatchError {
    /// Classify a transport error from the HTTP client
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_builder() {
            // The request never left: bad URL or unserializable body
            Self::Unexpected(err.to_string())
        } else {
            Self::Network(err)
        }
    }

    /// True for faults that point at a bug rather than at the network
    pub fn is_unexpected(&self) -> bool {
        matches!(self, Self::Unexpected(_))
    }
}
