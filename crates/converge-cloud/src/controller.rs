//! Instance lifecycle controller
//!
//! One controller drives one instance. Every `ensure_*` operation observes
//! the live backend state first, then does the least needed to reach its
//! goal; calling it again once the goal is reached changes nothing.
//!
//! ```text
//! (none) --create--> pending --wait--> running
//! running --stop--> stopping --wait--> stopped
//! stopped --start--> pending --wait--> running
//! running|stopped --destroy--> shutting-down --wait--> terminated --> (none)
//! ```
//!
//! Operations take `&mut self`: callers serialize the operations of one
//! instance, independent instances get independent controllers.

use crate::action::PlanSummary;
use crate::backend::InstanceBackend;
use crate::disk::DiskDevices;
use crate::error::{CloudError, Result};
use crate::events::{EventBus, InstanceEvent, InstanceEventKind};
use crate::firewall::FireWallRulesPerDevice;
use crate::instance::{InstanceId, InstanceSpec, InstanceType, Timeout};
use crate::network::NetworkDevices;
use crate::reconcile::Reconciler;
use crate::state::{self, InstanceState};
use crate::wait::{self, PollConfig};
use converge_config::LifecycleSettings;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct InstanceController {
    backend: Arc<dyn InstanceBackend>,
    instance_id: Option<InstanceId>,
    poll: PollConfig,
    events: EventBus,
}

impl InstanceController {
    pub fn new(backend: Arc<dyn InstanceBackend>) -> Self {
        Self {
            backend,
            instance_id: None,
            poll: PollConfig::default(),
            events: EventBus::new(),
        }
    }

    /// Resume control of an instance created earlier
    pub fn with_instance_id(mut self, instance_id: Option<InstanceId>) -> Self {
        self.instance_id = instance_id;
        self
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Poll as configured in the `lifecycle` section of the settings
    pub fn with_settings(self, settings: &LifecycleSettings) -> Self {
        self.with_poll_config(PollConfig::from(settings))
    }

    pub fn instance_id(&self) -> Option<&InstanceId> {
        self.instance_id.as_ref()
    }

    pub fn is_instance_defined(&self) -> bool {
        self.instance_id.is_some()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Receive lifecycle events fired from now on
    pub fn subscribe(&self) -> broadcast::Receiver<InstanceEvent> {
        self.events.subscribe()
    }

    /// Live state of the held instance, `None` if no instance is held or the
    /// backend does not know it
    pub async fn instance_state(&self) -> Result<Option<InstanceState>> {
        match &self.instance_id {
            Some(id) => self.backend.instance_state(id).await,
            None => Ok(None),
        }
    }

    pub async fn instance_lives(&self) -> Result<bool> {
        Ok(state::lives(self.instance_state().await?))
    }

    pub async fn instance_runs(&self) -> Result<bool> {
        Ok(state::runs(self.instance_state().await?))
    }

    /// Create the instance unless a live one is already held.
    ///
    /// The new identifier is stored before waiting for `running`, so a
    /// timeout or a cancellation never loses track of the instance.
    pub async fn ensure_instance_is_created(
        &mut self,
        spec: &InstanceSpec,
        timeout: Timeout,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self.instance_lives().await? {
            if let Some(id) = &self.instance_id {
                warn!("Instance '{}' already lives, not creating another one", id);
            }
        } else {
            info!(
                "Creating {} instance on {} (site {}, image {})",
                spec.instance_type,
                self.backend.name(),
                spec.site,
                spec.image
            );
            let id = self.backend.create(spec).await?;
            self.instance_id = Some(id.clone());
            info!("Instance '{}' created", id);

            if !self
                .wait_for(
                    &id,
                    InstanceState::Running,
                    timeout,
                    self.poll.create_initial_delay,
                    cancel,
                )
                .await?
            {
                self.events.fire(InstanceEventKind::Created, Some(&id));
                return Err(timeout_error(&id, "create", InstanceState::Running, timeout));
            }
        }

        self.events
            .fire(InstanceEventKind::Created, self.instance_id.as_ref());
        if self.instance_runs().await? {
            self.events
                .fire(InstanceEventKind::Started, self.instance_id.as_ref());
        }
        Ok(())
    }

    /// Bring the held instance to `running`
    pub async fn ensure_instance_is_started(
        &mut self,
        timeout: Timeout,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let id = self.require_instance("start")?;

        match self.backend.instance_state(&id).await? {
            Some(InstanceState::Pending) => {
                warn!("Instance '{}' is pending, waiting for it to run", id);
                self.wait_or_timeout(&id, InstanceState::Running, timeout, "start", cancel)
                    .await?;
            }
            Some(InstanceState::Running) => {
                info!("Instance '{}' is already running", id);
            }
            Some(InstanceState::Stopping) => {
                warn!("Instance '{}' is stopping, waiting for it to stop before restarting", id);
                self.wait_or_timeout(&id, InstanceState::Stopped, timeout, "restart", cancel)
                    .await?;
                self.events.fire(InstanceEventKind::Stopped, Some(&id));
                self.start(&id, timeout, cancel).await?;
            }
            Some(InstanceState::ShuttingDown) => {
                self.events.fire(InstanceEventKind::Stopped, Some(&id));
                return Err(CloudError::ShuttingDown {
                    instance_id: id.to_string(),
                });
            }
            Some(InstanceState::Terminated) => {
                self.events.fire(InstanceEventKind::Stopped, Some(&id));
                self.events.fire(InstanceEventKind::Destroyed, Some(&id));
                return Err(CloudError::Terminated {
                    instance_id: id.to_string(),
                });
            }
            None => {
                return Err(CloudError::InvalidInstanceId {
                    instance_id: id.to_string(),
                });
            }
            Some(InstanceState::Stopped) => {
                self.start(&id, timeout, cancel).await?;
            }
        }

        self.events.fire(InstanceEventKind::Started, Some(&id));
        Ok(())
    }

    /// Bring the held instance to `stopped`. Without an instance there is
    /// nothing to stop.
    pub async fn ensure_instance_is_stopped(
        &mut self,
        timeout: Timeout,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(id) = self.instance_id.clone() else {
            self.events.fire(InstanceEventKind::Stopped, None);
            warn!("No instance is defined, nothing to stop");
            return Ok(());
        };

        let current = self.backend.instance_state(&id).await?;
        if current.is_none() {
            self.events.fire(InstanceEventKind::Stopped, Some(&id));
            return Err(CloudError::InvalidInstanceId {
                instance_id: id.to_string(),
            });
        }

        if !state::runs(current) {
            warn!(
                "Instance '{}' does not run ({}), nothing to stop",
                id,
                state_label(current)
            );
        } else {
            info!("Stopping instance '{}'", id);
            self.backend.stop(&id).await?;
            self.wait_or_timeout(&id, InstanceState::Stopped, timeout, "stop", cancel)
                .await?;
        }

        self.events.fire(InstanceEventKind::Stopped, Some(&id));
        Ok(())
    }

    /// Destroy the held instance and forget its identifier.
    ///
    /// An instance that is already dead still gets a destroy call, which
    /// releases what an earlier, timed out destroy may have left behind.
    pub async fn ensure_instance_is_destroyed(
        &mut self,
        timeout: Timeout,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(id) = self.instance_id.clone() else {
            self.events.fire(InstanceEventKind::Stopped, None);
            warn!("No instance is defined, nothing to destroy");
            return Ok(());
        };

        let current = self.backend.instance_state(&id).await?;
        if !state::lives(current) {
            self.backend.destroy(&id).await?;
            self.events.fire(InstanceEventKind::Stopped, Some(&id));
            self.events.fire(InstanceEventKind::Destroyed, Some(&id));
            self.instance_id = None;
            warn!(
                "Instance '{}' was already dead ({}), its identifier has been released",
                id,
                state_label(current)
            );
            return Ok(());
        }

        info!("Destroying instance '{}'", id);
        self.backend.destroy(&id).await?;
        self.wait_or_timeout(&id, InstanceState::Terminated, timeout, "destroy", cancel)
            .await?;
        self.events.fire(InstanceEventKind::Stopped, Some(&id));
        self.events.fire(InstanceEventKind::Destroyed, Some(&id));
        self.instance_id = None;
        info!("Instance '{}' destroyed", id);
        Ok(())
    }

    /// Change the type of the held instance, which must be stopped
    pub async fn ensure_instance_sizing(
        &mut self,
        target: &InstanceType,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(id) = self.instance_id.clone() else {
            warn!("No instance is defined, nothing to resize");
            return Ok(());
        };

        let current = self.backend.instance_state(&id).await?;
        if current.is_none() {
            return Err(CloudError::InvalidInstanceId {
                instance_id: id.to_string(),
            });
        }

        if self.backend.instance_type(&id).await?.as_ref() == Some(target) {
            info!("Instance '{}' is already a {}, no resize needed", id, target);
            return Ok(());
        }
        self.require_stopped(&id, current)?;

        if cancel.is_cancelled() {
            return Err(CloudError::Cancelled);
        }
        // The type check above took time; the state may have moved since.
        let current = self.backend.instance_state(&id).await?;
        self.require_stopped(&id, current)?;

        info!("Resizing instance '{}' to {}", id, target);
        self.backend.resize(&id, target).await
    }

    /// Poll until the held instance reaches `expected`.
    ///
    /// Returns `Ok(false)` on timeout so that the caller decides whether it
    /// is fatal.
    pub async fn wait_until_instance_status_becomes(
        &self,
        expected: InstanceState,
        timeout: Timeout,
        initial_delay: Duration,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let id = self.require_instance("wait for")?;
        self.wait_for(&id, expected, timeout, initial_delay, cancel)
            .await
    }

    pub async fn ensure_disk_devices_are_up_to_date(
        &mut self,
        target: &DiskDevices,
        cancel: &CancellationToken,
    ) -> Result<PlanSummary> {
        let Some(id) = self.existing_instance("update disk devices").await? else {
            return Ok(PlanSummary::default());
        };
        Reconciler::new(self.backend.as_ref(), &id)
            .disk_devices(target, cancel)
            .await
    }

    pub async fn ensure_network_devices_are_up_to_date(
        &mut self,
        target: &NetworkDevices,
        cancel: &CancellationToken,
    ) -> Result<PlanSummary> {
        let Some(id) = self.existing_instance("update network devices").await? else {
            return Ok(PlanSummary::default());
        };
        let summary = Reconciler::new(self.backend.as_ref(), &id)
            .network_devices(target, cancel)
            .await?;

        // Listeners re-apply their network dependent settings on start.
        if self.instance_runs().await? {
            self.events.fire(InstanceEventKind::Started, Some(&id));
        }
        Ok(summary)
    }

    pub async fn ensure_fire_wall_rules_are_up_to_date(
        &mut self,
        target: &FireWallRulesPerDevice,
        cancel: &CancellationToken,
    ) -> Result<PlanSummary> {
        let Some(id) = self.existing_instance("update firewall rules").await? else {
            return Ok(PlanSummary::default());
        };
        Reconciler::new(self.backend.as_ref(), &id)
            .fire_wall_rules(target, cancel)
            .await
    }

    // Helpers

    fn require_instance(&self, operation: &'static str) -> Result<InstanceId> {
        self.instance_id
            .clone()
            .ok_or(CloudError::NoInstance { operation })
    }

    fn require_stopped(&self, id: &InstanceId, current: Option<InstanceState>) -> Result<()> {
        if current == Some(InstanceState::Stopped) {
            return Ok(());
        }
        Err(CloudError::WrongState {
            instance_id: id.to_string(),
            operation: "resize",
            expected: InstanceState::Stopped,
            actual: current,
        })
    }

    /// Held identifier of an instance the backend knows. `None` (with a
    /// warning) when no instance is held.
    async fn existing_instance(&self, operation: &'static str) -> Result<Option<InstanceId>> {
        let Some(id) = self.instance_id.clone() else {
            warn!("No instance is defined, cannot {}", operation);
            return Ok(None);
        };
        if self.backend.instance_state(&id).await?.is_none() {
            return Err(CloudError::InvalidInstanceId {
                instance_id: id.to_string(),
            });
        }
        Ok(Some(id))
    }

    async fn start(
        &self,
        id: &InstanceId,
        timeout: Timeout,
        cancel: &CancellationToken,
    ) -> Result<()> {
        info!("Starting instance '{}'", id);
        self.backend.start(id).await?;
        self.wait_or_timeout(id, InstanceState::Running, timeout, "start", cancel)
            .await
    }

    async fn wait_for(
        &self,
        id: &InstanceId,
        expected: InstanceState,
        timeout: Timeout,
        initial_delay: Duration,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        wait::until_state(
            self.backend.as_ref(),
            id,
            expected,
            timeout,
            initial_delay,
            self.poll.interval,
            cancel,
        )
        .await
    }

    async fn wait_or_timeout(
        &self,
        id: &InstanceId,
        expected: InstanceState,
        timeout: Timeout,
        operation: &'static str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self
            .wait_for(id, expected, timeout, Duration::ZERO, cancel)
            .await?
        {
            Ok(())
        } else {
            Err(timeout_error(id, operation, expected, timeout))
        }
    }
}

fn timeout_error(
    id: &InstanceId,
    operation: &'static str,
    expected: InstanceState,
    timeout: Timeout,
) -> CloudError {
    CloudError::Timeout {
        instance_id: id.to_string(),
        operation,
        expected,
        timeout_ms: timeout.as_millis(),
    }
}

fn state_label(state: Option<InstanceState>) -> String {
    state.map_or_else(|| "unknown".to_string(), |s| s.to_string())
}
