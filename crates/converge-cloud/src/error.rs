//! Cloud convergence error types

use crate::state::InstanceState;
use thiserror::Error;

/// Errors raised while converging an instance toward its target
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Duplicate resource '{0}': a collection cannot hold two members with the same identity")]
    DuplicateResource(String),

    #[error("Cannot {operation}: no instance is defined")]
    NoInstance { operation: &'static str },

    #[error("Instance '{instance_id}' does not exist (the identifier is stale or invalid)")]
    InvalidInstanceId { instance_id: String },

    #[error(
        "Cannot {operation} instance '{instance_id}': expected state {expected}, found {}",
        display_state(.actual)
    )]
    WrongState {
        instance_id: String,
        operation: &'static str,
        expected: InstanceState,
        actual: Option<InstanceState>,
    },

    #[error("Cannot start instance '{instance_id}': it is shutting down and will be destroyed")]
    ShuttingDown { instance_id: String },

    #[error("Cannot start instance '{instance_id}': it is terminated")]
    Terminated { instance_id: String },

    #[error("Disk devices of instance '{instance_id}' cannot be updated: {reason}")]
    IncompatibleDisks { instance_id: String, reason: String },

    #[error(
        "Timeout: instance '{instance_id}' did not reach {expected} within {timeout_ms} ms while trying to {operation}"
    )]
    Timeout {
        instance_id: String,
        operation: &'static str,
        expected: InstanceState,
        timeout_ms: u64,
    },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Coarse error categories, used by callers to decide how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Never retried, surfaced immediately
    Configuration,
    /// Fatal for the call, instance state unchanged
    Precondition,
    /// Instance may have partially advanced; re-query and retry
    Timeout,
    /// Wrapped primitive failure
    Backend,
    /// Cooperative cancellation
    Cancelled,
}

impl CloudError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CloudError::InvalidConfig(_) | CloudError::DuplicateResource(_) => {
                ErrorKind::Configuration
            }
            CloudError::NoInstance { .. }
            | CloudError::InvalidInstanceId { .. }
            | CloudError::WrongState { .. }
            | CloudError::ShuttingDown { .. }
            | CloudError::Terminated { .. }
            | CloudError::IncompatibleDisks { .. } => ErrorKind::Precondition,
            CloudError::Timeout { .. } => ErrorKind::Timeout,
            CloudError::Backend(_) => ErrorKind::Backend,
            CloudError::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CloudError::Cancelled)
    }

    /// Wrap any backend failure
    pub fn backend(err: impl std::fmt::Display) -> Self {
        CloudError::Backend(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

fn display_state(state: &Option<InstanceState>) -> String {
    match state {
        Some(s) => s.to_string(),
        None => "none".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            CloudError::InvalidConfig("x".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            CloudError::NoInstance { operation: "start" }.kind(),
            ErrorKind::Precondition
        );
        assert_eq!(CloudError::backend("boom").kind(), ErrorKind::Backend);
        assert!(CloudError::Cancelled.is_cancelled());
    }

    #[test]
    fn test_wrong_state_message() {
        let err = CloudError::WrongState {
            instance_id: "i-1".into(),
            operation: "resize",
            expected: InstanceState::Stopped,
            actual: Some(InstanceState::Running),
        };
        assert_eq!(
            err.to_string(),
            "Cannot resize instance 'i-1': expected state stopped, found running"
        );
    }
}
