//! Core types for the polling scheduler.

use std::fmt;
use std::sync::Arc;

use crate::error::{PollError, Result};

/// A zero-argument, fire-and-forget fetch operation.
///
/// The scheduler invokes the action and moves on; it never awaits
/// completion. An action that needs to do async work should spawn its own
/// future, and an action whose work can outlast its interval is responsible
/// for its own in-flight guard.
pub type FetchAction = Arc<dyn Fn() + Send + Sync + 'static>;

/// Identifier for a logical, shareable periodic-fetch stream.
///
/// Any number of consumers may register under the same key; they are then
/// guaranteed to share exactly one underlying timer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PollKey(String);

impl PollKey {
    /// Maximum allowed length for a poll key.
    pub const MAX_LENGTH: usize = 128;

    /// Creates a new validated poll key.
    ///
    /// # Errors
    ///
    /// Returns `PollError::InvalidKey` if the key is empty, too long,
    /// does not start with an alphanumeric character, or contains a
    /// character outside `[a-zA-Z0-9_.-]`.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();

        if key.is_empty() {
            return Err(PollError::InvalidKey {
                reason: "key cannot be empty".to_string(),
            });
        }

        if key.len() > Self::MAX_LENGTH {
            return Err(PollError::InvalidKey {
                reason: format!(
                    "key exceeds maximum length of {} characters",
                    Self::MAX_LENGTH
                ),
            });
        }

        let first_char = key.chars().next();
        if let Some(c) = first_char {
            if !c.is_ascii_alphanumeric() {
                return Err(PollError::InvalidKey {
                    reason: "key must start with an alphanumeric character".to_string(),
                });
            }
        }

        for c in key.chars() {
            if !c.is_ascii_alphanumeric() && c != '_' && c != '-' && c != '.' {
                return Err(PollError::InvalidKey {
                    reason: format!("invalid character '{c}' in key"),
                });
            }
        }

        Ok(Self(key))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PollKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PollKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Proof of one registration with the scheduler.
///
/// Returned by [`register`](crate::PollController::register) and consumed by
/// [`deregister`](crate::PollController::deregister). Each ticket
/// deregisters at most once; handing a stale or duplicated ticket back to
/// the registry is a logged no-op, so unbalanced stop calls can never push a
/// key's consumer count below zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PollTicket {
    key: PollKey,
    id: u64,
}

impl PollTicket {
    pub(crate) fn new(key: PollKey, id: u64) -> Self {
        Self { key, id }
    }

    /// The key this ticket is registered under.
    #[must_use]
    pub fn key(&self) -> &PollKey {
        &self.key
    }

    /// The process-unique registration id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// How the registry reconciles differing intervals requested for one key.
///
/// A shared key has a single timer, so at most one interval can be in
/// effect. Consumers that genuinely need independent cadences should use
/// distinct keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntervalPolicy {
    /// The interval requested by the first consumer holds until the key's
    /// consumer count returns to zero. Later consumers' intervals are
    /// ignored.
    FirstWins,
    /// The effective interval is the shortest interval among currently
    /// active consumers, recomputed whenever a consumer joins or leaves.
    /// Restarting the timer at a new cadence never re-fires the immediate
    /// first fetch.
    #[default]
    Shortest,
}
