//! Error types for the beacon-poll crate.

use thiserror::Error;

/// Errors that can occur when registering with the polling scheduler.
///
/// The scheduler itself performs no I/O; the only failures are invalid
/// registration parameters.
#[derive(Debug, Error)]
pub enum PollError {
    /// Invalid polling key.
    #[error("invalid poll key: {reason}")]
    InvalidKey {
        /// The reason the key is invalid.
        reason: String,
    },

    /// Invalid polling interval.
    #[error("invalid poll interval: {reason}")]
    InvalidInterval {
        /// The reason the interval is invalid.
        reason: String,
    },
}

/// Result type for polling operations.
pub type Result<T> = std::result::Result<T, PollError>;
