//! Converge Cloud
//!
//! Drives a single compute instance toward a declared target: existence and
//! power state, attached disks, attached network devices and firewall rules.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │            orchestration (caller)                │
//! └─────────────────┬───────────────────────────────┘
//!                   │ ensure_*
//! ┌─────────────────▼───────────────────────────────┐
//! │               converge-cloud                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │          InstanceController               │   │
//! │  │  state machine, waits, events             │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │  Reconciler  │  │ Resource set │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │ trait InstanceBackend
//! ┌───────▼───────┐
//! │   provider    │
//! │ (SDK, CLI...) │
//! └───────────────┘
//! ```

/// Declare a string-backed identifier newtype
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

pub mod action;
pub mod backend;
pub mod controller;
pub mod disk;
pub mod error;
pub mod events;
pub mod firewall;
pub mod instance;
pub mod network;
pub mod reconcile;
pub mod resource;
pub mod settings;
pub mod state;
pub mod wait;

// Re-exports
pub use action::{Action, ActionType, Plan, PlanSummary, ResourceApplier};
pub use backend::InstanceBackend;
pub use controller::InstanceController;
pub use disk::{DiskDevice, DiskDeviceName, DiskDevices, check_compatibility as check_disk_compatibility};
pub use error::{CloudError, ErrorKind, Result};
pub use events::{InstanceEvent, InstanceEventKind};
pub use firewall::{
    Access, Direction, FireWallRule, FireWallRules, FireWallRulesPerDevice, IpRange, PortRange,
    Protocol,
};
pub use instance::{
    ImageId, InstanceId, InstanceSpec, InstanceType, KeyPairName, ProtectedAreaId,
    ProtectedAreaIds, Site, Timeout,
};
pub use network::{NetworkDevice, NetworkDeviceName, NetworkDevices};
pub use reconcile::Reconciler;
pub use resource::{Resource, ResourceCollection};
pub use settings::LifecycleTimeouts;
pub use state::InstanceState;
pub use wait::PollConfig;
