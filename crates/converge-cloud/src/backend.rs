//! Instance backend trait definition

use crate::disk::{DiskDevice, DiskDevices};
use crate::error::Result;
use crate::firewall::{FireWallRule, FireWallRules};
use crate::instance::{InstanceId, InstanceSpec, InstanceType};
use crate::network::{NetworkDevice, NetworkDeviceName, NetworkDevices};
use crate::state::InstanceState;
use async_trait::async_trait;

/// Instance backend abstraction trait
///
/// Every cloud or hypervisor provider implements this trait. Primitives only
/// issue the requested action: waiting for the instance to reach the
/// resulting state is the controller's job.
#[async_trait]
pub trait InstanceBackend: Send + Sync {
    /// Returns the backend name (e.g., "aws", "openstack")
    fn name(&self) -> &str;

    /// Create an instance and return its identifier
    async fn create(&self, spec: &InstanceSpec) -> Result<InstanceId>;

    async fn start(&self, id: &InstanceId) -> Result<()>;

    async fn stop(&self, id: &InstanceId) -> Result<()>;

    /// Terminate an instance and release what depends on it.
    ///
    /// Must tolerate an instance that is already gone: it is also called to
    /// clean up after an earlier destroy that timed out.
    async fn destroy(&self, id: &InstanceId) -> Result<()>;

    /// Change the instance type of a stopped instance
    async fn resize(&self, id: &InstanceId, instance_type: &InstanceType) -> Result<()>;

    /// Live state, `None` if the backend does not know the instance
    async fn instance_state(&self, id: &InstanceId) -> Result<Option<InstanceState>>;

    /// Live instance type, `None` if the backend does not know the instance
    async fn instance_type(&self, id: &InstanceId) -> Result<Option<InstanceType>>;

    // Disks

    async fn disk_devices(&self, id: &InstanceId) -> Result<DiskDevices>;

    async fn attach_disk(&self, id: &InstanceId, disk: &DiskDevice) -> Result<()>;

    async fn detach_disk(&self, id: &InstanceId, disk: &DiskDevice) -> Result<()>;

    /// Apply the delete-on-termination flag of every listed disk
    async fn sync_delete_on_termination(&self, id: &InstanceId, disks: &DiskDevices)
    -> Result<()>;

    // Network devices

    async fn network_devices(&self, id: &InstanceId) -> Result<NetworkDevices>;

    async fn attach_network_device(&self, id: &InstanceId, device: &NetworkDevice) -> Result<()>;

    async fn detach_network_device(&self, id: &InstanceId, device: &NetworkDevice) -> Result<()>;

    // Firewall

    async fn fire_wall_rules(
        &self,
        id: &InstanceId,
        device: &NetworkDeviceName,
    ) -> Result<FireWallRules>;

    async fn authorize_fire_wall_rule(
        &self,
        id: &InstanceId,
        device: &NetworkDeviceName,
        rule: &FireWallRule,
    ) -> Result<()>;

    async fn revoke_fire_wall_rule(
        &self,
        id: &InstanceId,
        device: &NetworkDeviceName,
        rule: &FireWallRule,
    ) -> Result<()>;
}
