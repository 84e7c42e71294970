//! Instance identifiers and creation parameters

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

string_id!(
    /// Backend instance type, e.g. `t3.micro` or `2core-4gb`
    InstanceType
);
string_id!(
    /// Placement (availability zone, hypervisor host, ...)
    Site
);
string_id!(
    /// Image the instance boots from
    ImageId
);
string_id!(
    /// Key pair injected into the instance
    KeyPairName
);
string_id!(
    /// Protected area (security group) identifier
    ProtectedAreaId
);

/// Opaque backend instance identifier. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(CloudError::InvalidConfig(
                "an instance identifier cannot be empty".to_string(),
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for InstanceId {
    type Error = CloudError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<InstanceId> for String {
    fn from(id: InstanceId) -> Self {
        id.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Set of protected areas an instance belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedAreaIds(BTreeSet<ProtectedAreaId>);

impl ProtectedAreaIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: ProtectedAreaId) -> bool {
        self.0.insert(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProtectedAreaId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ProtectedAreaId> for ProtectedAreaIds {
    fn from_iter<T: IntoIterator<Item = ProtectedAreaId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Everything the backend needs to create an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub instance_type: InstanceType,
    pub site: Site,
    pub image: ImageId,
    pub key_pair: KeyPairName,
    #[serde(default)]
    pub protected_areas: ProtectedAreaIds,
}

impl InstanceSpec {
    pub fn new(
        instance_type: impl Into<InstanceType>,
        site: impl Into<Site>,
        image: impl Into<ImageId>,
        key_pair: impl Into<KeyPairName>,
    ) -> Self {
        Self {
            instance_type: instance_type.into(),
            site: site.into(),
            image: image.into(),
            key_pair: key_pair.into(),
            protected_areas: ProtectedAreaIds::new(),
        }
    }

    pub fn with_protected_areas(mut self, protected_areas: ProtectedAreaIds) -> Self {
        self.protected_areas = protected_areas;
        self
    }
}

/// Upper bound of a single wait phase. Non-negative by construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timeout(Duration);

impl Timeout {
    pub const ZERO: Timeout = Timeout(Duration::ZERO);

    /// Build a timeout from a (possibly user supplied) millisecond count
    pub fn from_millis(millis: i64) -> Result<Self> {
        u64::try_from(millis)
            .map(|ms| Self(Duration::from_millis(ms)))
            .map_err(|_| {
                CloudError::InvalidConfig(format!(
                    "timeout must be a positive or zero number of milliseconds, got {}",
                    millis
                ))
            })
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_millis(&self) -> u64 {
        u64::try_from(self.0.as_millis()).unwrap_or(u64::MAX)
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

impl TryFrom<i64> for Timeout {
    type Error = CloudError;

    fn try_from(millis: i64) -> Result<Self> {
        Self::from_millis(millis)
    }
}

impl std::fmt::Display for Timeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ms", self.as_millis())
    }
}
