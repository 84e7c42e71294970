//! In-memory backend used by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use converge_cloud::{
    CloudError, DiskDevice, DiskDevices, FireWallRule, FireWallRules, InstanceBackend, InstanceId,
    InstanceSpec, InstanceState, InstanceType, NetworkDevice, NetworkDeviceName, NetworkDevices,
    PollConfig, Result,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

struct FakeInstance {
    state: InstanceState,
    /// State reached once the transition settles
    settles_to: Option<InstanceState>,
    instance_type: InstanceType,
}

#[derive(Default)]
struct Inner {
    instances: HashMap<String, FakeInstance>,
    next_id: u32,
    calls: Vec<String>,
    state_reads: usize,
    /// Transitions never settle
    stuck: bool,
    disks: DiskDevices,
    networks: NetworkDevices,
    rules: BTreeMap<NetworkDeviceName, FireWallRules>,
}

/// Backend whose transitional states settle on the next state read
#[derive(Default)]
pub struct FakeBackend {
    inner: Mutex<Inner>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instance(self, id: &str, state: InstanceState, instance_type: &str) -> Self {
        self.inner.lock().unwrap().instances.insert(
            id.to_string(),
            FakeInstance {
                state,
                settles_to: settle(state),
                instance_type: instance_type.into(),
            },
        );
        self
    }

    pub fn set_stuck(&self, stuck: bool) {
        self.inner.lock().unwrap().stuck = stuck;
    }

    pub fn set_disks(&self, disks: DiskDevices) {
        self.inner.lock().unwrap().disks = disks;
    }

    pub fn set_networks(&self, networks: NetworkDevices) {
        self.inner.lock().unwrap().networks = networks;
    }

    pub fn set_rules(&self, device: &str, rules: FireWallRules) {
        self.inner.lock().unwrap().rules.insert(device.into(), rules);
    }

    pub fn disks(&self) -> DiskDevices {
        self.inner.lock().unwrap().disks.clone()
    }

    pub fn networks(&self) -> NetworkDevices {
        self.inner.lock().unwrap().networks.clone()
    }

    pub fn rules(&self, device: &str) -> FireWallRules {
        self.inner
            .lock()
            .unwrap()
            .rules
            .get(&NetworkDeviceName::from(device))
            .cloned()
            .unwrap_or_default()
    }

    pub fn state_of(&self, id: &str) -> Option<InstanceState> {
        self.inner.lock().unwrap().instances.get(id).map(|i| i.state)
    }

    /// Mutating calls, in order
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Number of mutating calls whose name is `name`
    pub fn count(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split(' ').next() == Some(name))
            .count()
    }

    pub fn state_reads(&self) -> usize {
        self.inner.lock().unwrap().state_reads
    }

    fn record(&self, call: String) {
        self.inner.lock().unwrap().calls.push(call);
    }

    fn transition(
        &self,
        id: &InstanceId,
        name: &str,
        from: &[InstanceState],
        to: InstanceState,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(format!("{} {}", name, id));
        let instance = inner
            .instances
            .get_mut(id.as_str())
            .ok_or_else(|| CloudError::backend(format!("no such instance {}", id)))?;
        if !from.contains(&instance.state) {
            return Err(CloudError::backend(format!(
                "cannot {} an instance in state {}",
                name, instance.state
            )));
        }
        instance.state = to;
        instance.settles_to = settle(to);
        Ok(())
    }
}

fn settle(state: InstanceState) -> Option<InstanceState> {
    match state {
        InstanceState::Pending => Some(InstanceState::Running),
        InstanceState::Stopping => Some(InstanceState::Stopped),
        InstanceState::ShuttingDown => Some(InstanceState::Terminated),
        _ => None,
    }
}

#[async_trait]
impl InstanceBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create(&self, spec: &InstanceSpec) -> Result<InstanceId> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = format!("i-{}", inner.next_id);
        inner.calls.push(format!("create {}", id));
        inner.instances.insert(
            id.clone(),
            FakeInstance {
                state: InstanceState::Pending,
                settles_to: Some(InstanceState::Running),
                instance_type: spec.instance_type.clone(),
            },
        );
        InstanceId::new(id)
    }

    async fn start(&self, id: &InstanceId) -> Result<()> {
        self.transition(id, "start", &[InstanceState::Stopped], InstanceState::Pending)
    }

    async fn stop(&self, id: &InstanceId) -> Result<()> {
        self.transition(
            id,
            "stop",
            &[InstanceState::Pending, InstanceState::Running],
            InstanceState::Stopping,
        )
    }

    async fn destroy(&self, id: &InstanceId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(format!("destroy {}", id));
        if let Some(instance) = inner.instances.get_mut(id.as_str()) {
            if instance.state.lives() {
                instance.state = InstanceState::ShuttingDown;
                instance.settles_to = Some(InstanceState::Terminated);
            }
        }
        Ok(())
    }

    async fn resize(&self, id: &InstanceId, instance_type: &InstanceType) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(format!("resize {} {}", id, instance_type));
        let instance = inner
            .instances
            .get_mut(id.as_str())
            .ok_or_else(|| CloudError::backend("no such instance"))?;
        instance.instance_type = instance_type.clone();
        Ok(())
    }

    async fn instance_state(&self, id: &InstanceId) -> Result<Option<InstanceState>> {
        let mut inner = self.inner.lock().unwrap();
        inner.state_reads += 1;
        let stuck = inner.stuck;
        Ok(inner.instances.get_mut(id.as_str()).map(|instance| {
            let observed = instance.state;
            if !stuck {
                if let Some(next) = instance.settles_to.take() {
                    instance.state = next;
                }
            }
            observed
        }))
    }

    async fn instance_type(&self, id: &InstanceId) -> Result<Option<InstanceType>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .instances
            .get(id.as_str())
            .map(|i| i.instance_type.clone()))
    }

    async fn disk_devices(&self, _id: &InstanceId) -> Result<DiskDevices> {
        Ok(self.disks())
    }

    async fn attach_disk(&self, _id: &InstanceId, disk: &DiskDevice) -> Result<()> {
        self.record(format!("attach_disk {}", disk.name));
        self.inner.lock().unwrap().disks.insert(disk.clone())
    }

    async fn detach_disk(&self, _id: &InstanceId, disk: &DiskDevice) -> Result<()> {
        self.record(format!("detach_disk {}", disk.name));
        self.inner.lock().unwrap().disks.remove(&disk.name);
        Ok(())
    }

    async fn sync_delete_on_termination(
        &self,
        _id: &InstanceId,
        disks: &DiskDevices,
    ) -> Result<()> {
        self.record(format!("sync_delete_on_termination {}", disks.len()));
        Ok(())
    }

    async fn network_devices(&self, _id: &InstanceId) -> Result<NetworkDevices> {
        Ok(self.networks())
    }

    async fn attach_network_device(&self, _id: &InstanceId, device: &NetworkDevice) -> Result<()> {
        self.record(format!("attach_network_device {}", device));
        self.inner.lock().unwrap().networks.insert(device.clone())
    }

    async fn detach_network_device(&self, _id: &InstanceId, device: &NetworkDevice) -> Result<()> {
        self.record(format!("detach_network_device {}", device));
        self.inner.lock().unwrap().networks.remove(&device.name);
        Ok(())
    }

    async fn fire_wall_rules(
        &self,
        _id: &InstanceId,
        device: &NetworkDeviceName,
    ) -> Result<FireWallRules> {
        Ok(self.rules(device.as_str()))
    }

    async fn authorize_fire_wall_rule(
        &self,
        _id: &InstanceId,
        device: &NetworkDeviceName,
        rule: &FireWallRule,
    ) -> Result<()> {
        self.record(format!("authorize {} {}", device, rule));
        let mut inner = self.inner.lock().unwrap();
        inner.rules.entry(device.clone()).or_default().insert(rule.clone())
    }

    async fn revoke_fire_wall_rule(
        &self,
        _id: &InstanceId,
        device: &NetworkDeviceName,
        rule: &FireWallRule,
    ) -> Result<()> {
        self.record(format!("revoke {} {}", device, rule));
        let mut inner = self.inner.lock().unwrap();
        if let Some(rules) = inner.rules.get_mut(device) {
            rules.remove(rule);
        }
        Ok(())
    }
}

/// One-second polling, no create delay
pub fn fast_poll() -> PollConfig {
    PollConfig {
        interval: Duration::from_secs(1),
        create_initial_delay: Duration::ZERO,
    }
}

pub fn spec() -> InstanceSpec {
    InstanceSpec::new("t3.micro", "eu-west-1a", "ami-0123", "deploy")
}
