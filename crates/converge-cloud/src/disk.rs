//! Disk devices

use crate::resource::{Resource, ResourceCollection};
use serde::{Deserialize, Serialize};

string_id!(
    /// Device name as seen by the instance, e.g. `/dev/vda`
    DiskDeviceName
);

/// A disk attached (or to be attached) to an instance.
///
/// `delete_on_termination` cannot be observed on live disks, so it takes no
/// part in equality; it is re-synchronized from the target list after every
/// disk reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskDevice {
    pub name: DiskDeviceName,
    pub size_gb: u32,
    #[serde(default)]
    pub delete_on_termination: bool,
    #[serde(default)]
    pub root: bool,
}

impl DiskDevice {
    pub fn new(name: impl Into<DiskDeviceName>, size_gb: u32) -> Self {
        Self {
            name: name.into(),
            size_gb,
            delete_on_termination: true,
            root: false,
        }
    }

    pub fn root(name: impl Into<DiskDeviceName>, size_gb: u32) -> Self {
        Self {
            root: true,
            ..Self::new(name, size_gb)
        }
    }

    pub fn with_delete_on_termination(mut self, delete: bool) -> Self {
        self.delete_on_termination = delete;
        self
    }
}

impl PartialEq for DiskDevice {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.size_gb == other.size_gb && self.root == other.root
    }
}

impl std::fmt::Display for DiskDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}G", self.name, self.size_gb)?;
        if self.root {
            write!(f, ", root")?;
        }
        write!(f, ")")
    }
}

impl Resource for DiskDevice {
    type Id = DiskDeviceName;

    fn id(&self) -> Self::Id {
        self.name.clone()
    }
}

pub type DiskDevices = ResourceCollection<DiskDevice>;

/// Verify that `live` can be turned into `target` by attaching and
/// detaching non-root disks only.
///
/// The root device can neither be replaced nor resized by a reconciliation:
/// the target must hold exactly one root device, matching the live one.
pub fn check_compatibility(live: &DiskDevices, target: &DiskDevices) -> Result<(), String> {
    let mut target_roots = target.iter().filter(|d| d.root);
    let target_root = match (target_roots.next(), target_roots.next()) {
        (Some(root), None) => root,
        (None, _) => return Err("the target disk list defines no root device".to_string()),
        (Some(_), Some(_)) => {
            return Err("the target disk list defines more than one root device".to_string());
        }
    };

    if let Some(live_root) = live.iter().find(|d| d.root) {
        if live_root.name != target_root.name {
            return Err(format!(
                "the root device is '{}' but the target declares '{}' as root",
                live_root.name, target_root.name
            ));
        }
        if live_root.size_gb != target_root.size_gb {
            return Err(format!(
                "the root device '{}' is {}G and cannot be resized to {}G",
                live_root.name, live_root.size_gb, target_root.size_gb
            ));
        }
    }

    Ok(())
}
