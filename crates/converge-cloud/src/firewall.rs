//! Firewall rules
//!
//! Rules are decomposed: one rule covers one protocol, one source range, one
//! destination range, one direction. A rule's identity is the whole rule.

use crate::error::{CloudError, Result};
use crate::network::NetworkDeviceName;
use crate::resource::{Resource, ResourceCollection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Allow,
    Deny,
}

/// CIDR address range
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IpRange {
    pub address: IpAddr,
    pub prefix: u8,
}

impl IpRange {
    /// `0.0.0.0/0`
    pub const ALL: IpRange = IpRange {
        address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        prefix: 0,
    };

    pub fn new(address: IpAddr, prefix: u8) -> Result<Self> {
        let max = if address.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(CloudError::InvalidConfig(format!(
                "prefix /{} is too long for {}",
                prefix, address
            )));
        }
        Ok(Self { address, prefix })
    }
}

impl FromStr for IpRange {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "all" {
            return Ok(Self::ALL);
        }
        let invalid = || CloudError::InvalidConfig(format!("invalid address range '{}'", s));
        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s, None),
        };
        let address: IpAddr = addr.parse().map_err(|_| invalid())?;
        let prefix = match prefix {
            Some(p) => p.parse::<u8>().map_err(|_| invalid())?,
            None if address.is_ipv4() => 32,
            None => 128,
        };
        Self::new(address, prefix)
    }
}

impl std::fmt::Display for IpRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix)
    }
}

/// Inclusive port range
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub const ALL: PortRange = PortRange {
        start: 1,
        end: 65535,
    };

    pub fn new(start: u16, end: u16) -> Result<Self> {
        if start == 0 || start > end {
            return Err(CloudError::InvalidConfig(format!(
                "invalid port range {}-{}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn single(port: u16) -> Result<Self> {
        Self::new(port, port)
    }
}

impl FromStr for PortRange {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "all" {
            return Ok(Self::ALL);
        }
        let parse = |p: &str| {
            p.trim()
                .parse::<u16>()
                .map_err(|_| CloudError::InvalidConfig(format!("invalid port range '{}'", s)))
        };
        match s.split_once('-') {
            Some((start, end)) => Self::new(parse(start)?, parse(end)?),
            None => Self::single(parse(s)?),
        }
    }
}

impl std::fmt::Display for PortRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// One decomposed firewall rule
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FireWallRule {
    pub protocol: Protocol,
    pub from: IpRange,
    pub from_ports: PortRange,
    pub to: IpRange,
    pub to_ports: PortRange,
    pub direction: Direction,
    pub access: Access,
}

impl FireWallRule {
    /// Inbound TCP rule from `from` to the given destination ports
    pub fn tcp_in(from: IpRange, to_ports: PortRange, access: Access) -> Self {
        Self {
            protocol: Protocol::Tcp,
            from,
            from_ports: PortRange::ALL,
            to: IpRange::ALL,
            to_ports,
            direction: Direction::In,
            access,
        }
    }
}

impl std::fmt::Display for FireWallRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} {:?} {}:{} -> {}:{} {:?}",
            self.direction,
            self.protocol,
            self.from,
            self.from_ports,
            self.to,
            self.to_ports,
            self.access
        )
    }
}

impl Resource for FireWallRule {
    type Id = FireWallRule;

    fn id(&self) -> Self::Id {
        self.clone()
    }
}

pub type FireWallRules = ResourceCollection<FireWallRule>;

/// Target firewall rules, grouped by network device.
///
/// A device absent from this map is left untouched by a reconciliation; a
/// device mapped to an empty set has all of its rules revoked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FireWallRulesPerDevice {
    devices: BTreeMap<NetworkDeviceName, FireWallRules>,
}

impl FireWallRulesPerDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule to a device. Adding the same rule twice is an error.
    pub fn add(&mut self, device: NetworkDeviceName, rule: FireWallRule) -> Result<()> {
        self.devices.entry(device).or_default().insert(rule)
    }

    /// Declare the complete rule set of a device
    pub fn set(&mut self, device: NetworkDeviceName, rules: FireWallRules) {
        self.devices.insert(device, rules);
    }

    pub fn rules_for(&self, device: &NetworkDeviceName) -> Option<&FireWallRules> {
        self.devices.get(device)
    }

    pub fn devices(&self) -> impl Iterator<Item = &NetworkDeviceName> {
        self.devices.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
