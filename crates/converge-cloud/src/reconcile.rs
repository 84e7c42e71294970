//! Disk, network device and firewall reconciliation against a live instance

use crate::action::{Plan, PlanSummary, ResourceApplier};
use crate::backend::InstanceBackend;
use crate::disk::{self, DiskDevice, DiskDevices};
use crate::error::{CloudError, Result};
use crate::firewall::{FireWallRule, FireWallRulesPerDevice};
use crate::instance::InstanceId;
use crate::network::{NetworkDevice, NetworkDeviceName, NetworkDevices};
use crate::resource::{Resource, ResourceCollection};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Reconciles the resources of one instance
pub struct Reconciler<'a> {
    backend: &'a dyn InstanceBackend,
    instance_id: &'a InstanceId,
}

impl<'a> Reconciler<'a> {
    pub fn new(backend: &'a dyn InstanceBackend, instance_id: &'a InstanceId) -> Self {
        Self {
            backend,
            instance_id,
        }
    }

    /// Compute the edit turning `live` into `target`
    pub fn plan<R: Resource>(
        live: &ResourceCollection<R>,
        target: &ResourceCollection<R>,
    ) -> Plan<R> {
        Plan::between(live, target)
    }

    /// Attach and detach disks until the live set matches `target`.
    ///
    /// The compatibility check runs before any change; when it fails nothing
    /// is applied. The delete-on-termination flags are synchronized from
    /// `target` afterwards, even when no disk changed.
    pub async fn disk_devices(
        &self,
        target: &DiskDevices,
        cancel: &CancellationToken,
    ) -> Result<PlanSummary> {
        if target.is_empty() {
            return Err(CloudError::InvalidConfig(
                "the target disk device list is empty".to_string(),
            ));
        }

        let live = self.backend.disk_devices(self.instance_id).await?;
        disk::check_compatibility(&live, target).map_err(|reason| {
            CloudError::IncompatibleDisks {
                instance_id: self.instance_id.to_string(),
                reason,
            }
        })?;

        let plan = Self::plan(&live, target);
        info!(
            instance_id = %self.instance_id,
            live = %live,
            target = %target,
            summary = %plan.summary(),
            "Updating disk devices"
        );

        let applier = DiskApplier {
            backend: self.backend,
            instance_id: self.instance_id,
        };
        plan.apply(&applier, cancel).await?;

        self.backend
            .sync_delete_on_termination(self.instance_id, target)
            .await?;
        Ok(plan.summary())
    }

    /// Attach and detach network devices until the live set matches `target`
    pub async fn network_devices(
        &self,
        target: &NetworkDevices,
        cancel: &CancellationToken,
    ) -> Result<PlanSummary> {
        if target.is_empty() {
            return Err(CloudError::InvalidConfig(
                "the target network device list is empty".to_string(),
            ));
        }

        let live = self.backend.network_devices(self.instance_id).await?;
        let plan = Self::plan(&live, target);
        info!(
            instance_id = %self.instance_id,
            live = %live,
            target = %target,
            summary = %plan.summary(),
            "Updating network devices"
        );

        let applier = NetworkApplier {
            backend: self.backend,
            instance_id: self.instance_id,
        };
        plan.apply(&applier, cancel).await?;
        Ok(plan.summary())
    }

    /// Authorize and revoke rules, device by device.
    ///
    /// Only live devices named in `target` are touched; rules of any other
    /// device are preserved. Returns the summed summary of every device.
    pub async fn fire_wall_rules(
        &self,
        target: &FireWallRulesPerDevice,
        cancel: &CancellationToken,
    ) -> Result<PlanSummary> {
        let live_devices = self.backend.network_devices(self.instance_id).await?;

        for device in target.devices() {
            if live_devices.get(device).is_none() {
                warn!(
                    instance_id = %self.instance_id,
                    device = %device,
                    "Firewall rules target a network device the instance does not have; ignored"
                );
            }
        }

        let mut total = PlanSummary::default();
        for device in live_devices.iter().map(|d| &d.name) {
            let Some(expected) = target.rules_for(device) else {
                debug!(instance_id = %self.instance_id, device = %device, "Firewall rules left untouched");
                continue;
            };

            let live = self
                .backend
                .fire_wall_rules(self.instance_id, device)
                .await?;
            let plan = Self::plan(&live, expected);
            info!(
                instance_id = %self.instance_id,
                device = %device,
                summary = %plan.summary(),
                "Updating firewall rules"
            );

            let applier = FireWallApplier {
                backend: self.backend,
                instance_id: self.instance_id,
                device,
            };
            plan.apply(&applier, cancel).await?;

            let summary = plan.summary();
            total.add += summary.add;
            total.remove += summary.remove;
            total.unchanged += summary.unchanged;
        }
        Ok(total)
    }
}

struct DiskApplier<'a> {
    backend: &'a dyn InstanceBackend,
    instance_id: &'a InstanceId,
}

#[async_trait]
impl<'a> ResourceApplier<DiskDevice> for DiskApplier<'a> {
    async fn remove(&self, disk: &DiskDevice) -> Result<()> {
        info!(instance_id = %self.instance_id, disk = %disk, "Detaching disk");
        self.backend.detach_disk(self.instance_id, disk).await
    }

    async fn add(&self, disk: &DiskDevice) -> Result<()> {
        info!(instance_id = %self.instance_id, disk = %disk, "Attaching disk");
        self.backend.attach_disk(self.instance_id, disk).await
    }
}

struct NetworkApplier<'a> {
    backend: &'a dyn InstanceBackend,
    instance_id: &'a InstanceId,
}

#[async_trait]
impl<'a> ResourceApplier<NetworkDevice> for NetworkApplier<'a> {
    async fn remove(&self, device: &NetworkDevice) -> Result<()> {
        info!(instance_id = %self.instance_id, device = %device, "Detaching network device");
        self.backend
            .detach_network_device(self.instance_id, device)
            .await
    }

    async fn add(&self, device: &NetworkDevice) -> Result<()> {
        info!(instance_id = %self.instance_id, device = %device, "Attaching network device");
        self.backend
            .attach_network_device(self.instance_id, device)
            .await
    }
}

struct FireWallApplier<'a> {
    backend: &'a dyn InstanceBackend,
    instance_id: &'a InstanceId,
    device: &'a NetworkDeviceName,
}

#[async_trait]
impl<'a> ResourceApplier<FireWallRule> for FireWallApplier<'a> {
    async fn remove(&self, rule: &FireWallRule) -> Result<()> {
        debug!(device = %self.device, rule = %rule, "Revoking");
        self.backend
            .revoke_fire_wall_rule(self.instance_id, self.device, rule)
            .await
    }

    async fn add(&self, rule: &FireWallRule) -> Result<()> {
        debug!(device = %self.device, rule = %rule, "Authorizing");
        self.backend
            .authorize_fire_wall_rule(self.instance_id, self.device, rule)
            .await
    }
}
