//! Observed instance state
//!
//! The state of an instance is owned by the backend. It is fetched live on
//! every operation and never cached across calls: the backend is eventually
//! consistent and a cached copy goes stale.

use serde::{Deserialize, Serialize};

/// Power/lifecycle state reported by a backend.
///
/// An instance whose identifier is unknown to the backend has no state at
/// all; this is modeled as `Option<InstanceState>::None` at the call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    /// Instance is booting
    Pending,
    /// Instance is up
    Running,
    /// Instance is shutting down toward `Stopped`
    Stopping,
    /// Instance is powered off but still exists
    Stopped,
    /// Instance is shutting down toward `Terminated`
    ShuttingDown,
    /// Instance has been destroyed
    Terminated,
}

impl InstanceState {
    /// `true` when the instance is booting or up
    pub fn runs(self) -> bool {
        matches!(self, InstanceState::Pending | InstanceState::Running)
    }

    /// `true` unless the instance is on its way out or gone
    pub fn lives(self) -> bool {
        !matches!(
            self,
            InstanceState::ShuttingDown | InstanceState::Terminated
        )
    }
}

/// Liveness of an optional (possibly absent) state
pub fn lives(state: Option<InstanceState>) -> bool {
    state.is_some_and(InstanceState::lives)
}

/// Whether an optional (possibly absent) state runs
pub fn runs(state: Option<InstanceState>) -> bool {
    state.is_some_and(InstanceState::runs)
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceState::Pending => write!(f, "pending"),
            InstanceState::Running => write!(f, "running"),
            InstanceState::Stopping => write!(f, "stopping"),
            InstanceState::Stopped => write!(f, "stopped"),
            InstanceState::ShuttingDown => write!(f, "shutting-down"),
            InstanceState::Terminated => write!(f, "terminated"),
        }
    }
}
