//! Bounded polling of the live instance state

use crate::backend::InstanceBackend;
use crate::error::{CloudError, Result};
use crate::instance::{InstanceId, Timeout};
use crate::state::InstanceState;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Polling behaviour of the lifecycle waits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between two state reads
    pub interval: Duration,
    /// Delay before the first state read after a create, letting the backend
    /// register the new instance
    pub create_initial_delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            create_initial_delay: Duration::from_secs(15),
        }
    }
}

/// Sleep for `duration` unless `cancel` fires first
pub(crate) async fn sleep(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(CloudError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Poll until the live state of `instance_id` equals `expected`.
///
/// The deadline starts before `initial_delay`. Returns `Ok(false)` when it
/// passes; with a zero timeout and zero delay the state is read exactly once.
/// A timeout too large to place on the clock never expires.
pub(crate) async fn until_state(
    backend: &dyn InstanceBackend,
    instance_id: &InstanceId,
    expected: InstanceState,
    timeout: Timeout,
    initial_delay: Duration,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<bool> {
    let deadline = Instant::now().checked_add(timeout.as_duration());
    if !initial_delay.is_zero() {
        sleep(initial_delay, cancel).await?;
    }

    loop {
        if cancel.is_cancelled() {
            return Err(CloudError::Cancelled);
        }

        let current = backend.instance_state(instance_id).await?;
        if current == Some(expected) {
            return Ok(true);
        }

        let pause = match deadline {
            None => interval,
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    debug!(
                        instance_id = %instance_id,
                        expected = %expected,
                        current = ?current,
                        "Wait timed out"
                    );
                    return Ok(false);
                }
                interval.min(deadline - now)
            }
        };
        sleep(pause, cancel).await?;
    }
}
