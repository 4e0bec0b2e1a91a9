//! Error types for the beacon-watch crate.

use thiserror::Error;

/// Errors that can occur while watching statuses.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The status source failed to produce a result.
    #[error("status source failed: {reason}")]
    SourceFailed {
        /// The reason the fetch failed.
        reason: String,
    },

    /// Registration with the polling scheduler failed.
    #[error("poll registration failed: {0}")]
    Poll(#[from] beacon_poll::PollError),
}

/// Result type for watch operations.
pub type Result<T> = std::result::Result<T, WatchError>;
