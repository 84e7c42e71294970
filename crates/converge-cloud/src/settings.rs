//! Lifecycle tuning from the `lifecycle` section of the settings file

use crate::instance::Timeout;
use crate::wait::PollConfig;
use converge_config::LifecycleSettings;

impl From<&LifecycleSettings> for PollConfig {
    fn from(settings: &LifecycleSettings) -> Self {
        Self {
            interval: settings.poll_interval(),
            create_initial_delay: settings.create_initial_delay(),
        }
    }
}

/// Upper bound of each lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleTimeouts {
    pub create: Timeout,
    pub start: Timeout,
    pub stop: Timeout,
    pub destroy: Timeout,
}

impl Default for LifecycleTimeouts {
    fn default() -> Self {
        Self::from(&LifecycleSettings::default())
    }
}

impl From<&LifecycleSettings> for LifecycleTimeouts {
    fn from(settings: &LifecycleSettings) -> Self {
        Self {
            create: settings.create_timeout().into(),
            start: settings.start_timeout().into(),
            stop: settings.stop_timeout().into(),
            destroy: settings.destroy_timeout().into(),
        }
    }
}
