//! Network devices

use crate::resource::{Resource, ResourceCollection};
use serde::{Deserialize, Serialize};

string_id!(
    /// Interface name as seen by the instance, e.g. `eth0`
    NetworkDeviceName
);

/// A network interface attached (or to be attached) to an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDevice {
    pub name: NetworkDeviceName,
}

impl NetworkDevice {
    pub fn new(name: impl Into<NetworkDeviceName>) -> Self {
        Self { name: name.into() }
    }
}

impl std::fmt::Display for NetworkDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Resource for NetworkDevice {
    type Id = NetworkDeviceName;

    fn id(&self) -> Self::Id {
        self.name.clone()
    }
}

pub type NetworkDevices = ResourceCollection<NetworkDevice>;
