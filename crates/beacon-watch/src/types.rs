//! Status snapshot types.
//!
//! These mirror the JSON payloads a status backend reports for containers
//! and environment readiness, plus a freshness wrapper stamped by the
//! store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a watched container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    /// Created but not yet running.
    Pending,
    /// Running.
    Running,
    /// Paused by the runtime.
    Paused,
    /// Exited (cleanly or not).
    Exited,
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Exited => "exited",
        };
        write!(f, "{s}")
    }
}

/// Point-in-time status of one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    /// Container name as reported by the runtime.
    pub container_name: String,
    /// The project this container belongs to.
    pub project_id: String,
    /// Lifecycle state.
    pub state: ContainerState,
    /// Image the container was created from.
    pub image: String,
    /// Human-readable CPU usage, if the backend reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_info: Option<String>,
    /// Human-readable memory usage, if the backend reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_info: Option<String>,
}

impl ContainerStatus {
    /// Returns `true` if the container is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == ContainerState::Running
    }
}

/// Readiness of the environment the statuses come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessStatus {
    /// The environment accepts work.
    pub ready: bool,
    /// The backing services are installed.
    pub installed: bool,
    /// Optional operator-facing detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A fetched value plus the instant it was fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot<T> {
    /// The fetched value.
    pub value: T,
    /// When the value was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl<T> StatusSnapshot<T> {
    /// Wraps `value` with the current time.
    #[must_use]
    pub fn now(value: T) -> Self {
        Self {
            value,
            fetched_at: Utc::now(),
        }
    }

    /// Time elapsed since the snapshot was taken.
    #[must_use]
    pub fn age(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.fetched_at)
    }
}
