//! Type definitions for VM networking

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use vcshell_common::{VcError, VcResult};

/// Highest VLAN id usable on a distributed port group.
pub const MAX_VLAN_ID: u16 = 4094;

/// VLAN connection mode of a port group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VlanMode {
    /// Single untagged VLAN
    #[serde(alias = "access", alias = "ACCESS")]
    Access,
    /// One or more tagged VLAN ranges
    #[serde(alias = "trunk", alias = "TRUNK")]
    Trunk,
}

impl FromStr for VlanMode {
    type Err = VcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("access") {
            Ok(VlanMode::Access)
        } else if s.eq_ignore_ascii_case("trunk") {
            Ok(VlanMode::Trunk)
        } else {
            Err(VcError::invalid_argument(
                "vlan mode",
                format!("'{}' is neither Access nor Trunk", s),
            ))
        }
    }
}

impl VlanMode {
    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            VlanMode::Access => "Access",
            VlanMode::Trunk => "Trunk",
        }
    }
}

impl fmt::Display for VlanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// VLAN configuration applied to a distributed port group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VlanSpec {
    /// Access port group carrying a single VLAN
    Access(u16),
    /// Trunk port group carrying inclusive VLAN ranges
    Trunk(Vec<(u16, u16)>),
}

impl VlanSpec {
    /// Parses a requested VLAN id (`"100"`, or `"10-20,30"` for trunks).
    pub fn parse(mode: VlanMode, vlan_id: &str) -> VcResult<Self> {
        match mode {
            VlanMode::Access => Ok(VlanSpec::Access(parse_vlan_number(vlan_id.trim(), 1)?)),
            VlanMode::Trunk => {
                let mut ranges = Vec::new();
                for part in vlan_id.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                    let range = match part.split_once('-') {
                        Some((start, end)) => (
                            parse_vlan_number(start.trim(), 0)?,
                            parse_vlan_number(end.trim(), 0)?,
                        ),
                        None => {
                            let id = parse_vlan_number(part, 0)?;
                            (id, id)
                        }
                    };
                    if range.0 > range.1 {
                        return Err(VcError::invalid_argument(
                            "vlan id",
                            format!("range '{}' is reversed", part),
                        ));
                    }
                    ranges.push(range);
                }
                if ranges.is_empty() {
                    return Err(VcError::invalid_argument("vlan id", "empty trunk VLAN list"));
                }
                Ok(VlanSpec::Trunk(ranges))
            }
        }
    }
}

fn parse_vlan_number(value: &str, min: u16) -> VcResult<u16> {
    match value.parse::<u16>() {
        Ok(id) if (min..=MAX_VLAN_ID).contains(&id) => Ok(id),
        _ => Err(VcError::invalid_argument(
            "vlan id",
            format!("'{}' is not in range {}-{}", value, min, MAX_VLAN_ID),
        )),
    }
}

/// Kind of network a vNIC can be attached to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NetworkKind {
    /// Standard (host) network, referenced by name
    Standard,
    /// Distributed virtual port group
    DistributedPortGroup {
        /// Port group key (e.g. `dvportgroup-42`)
        key: String,
        /// Uuid of the owning distributed switch
        switch_uuid: String,
    },
}

/// A vCenter network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// Network name
    pub name: String,
    /// Inventory folder holding the network
    #[serde(default)]
    pub location: String,
    /// Network kind
    pub kind: NetworkKind,
}

impl Network {
    /// Returns true if this network is a distributed port group
    pub fn is_port_group(&self) -> bool {
        matches!(self.kind, NetworkKind::DistributedPortGroup { .. })
    }

    /// Returns `location/name`
    pub fn full_name(&self) -> String {
        if self.location.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.location, self.name)
        }
    }
}

/// Backing of a vNIC device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NicBacking {
    /// Attached to a standard network by name
    Network {
        /// Network name
        network_name: String,
    },
    /// Attached to a port of a distributed port group
    DistributedPort {
        /// Port group key
        portgroup_key: String,
        /// Distributed switch uuid
        switch_uuid: String,
    },
}

impl From<&Network> for NicBacking {
    fn from(network: &Network) -> Self {
        match &network.kind {
            NetworkKind::Standard => NicBacking::Network {
                network_name: network.name.clone(),
            },
            NetworkKind::DistributedPortGroup { key, switch_uuid } => {
                NicBacking::DistributedPort {
                    portgroup_key: key.clone(),
                    switch_uuid: switch_uuid.clone(),
                }
            }
        }
    }
}

/// Virtual network adapter of a VM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualNic {
    /// Device label (e.g. "Network adapter 1")
    pub label: String,
    /// Device key, unique within the VM
    pub key: i32,
    /// MAC address
    pub mac_address: String,
    /// Current backing
    #[serde(default)]
    pub backing: Option<NicBacking>,
    /// Connectable: currently connected
    #[serde(default)]
    pub connected: bool,
    /// Connectable: connect at power on
    #[serde(default)]
    pub start_connected: bool,
}

/// A virtual machine with its network devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachine {
    /// BIOS uuid
    pub uuid: String,
    /// Display name
    pub name: String,
    /// Network adapters
    #[serde(default)]
    pub nics: Vec<VirtualNic>,
    /// Networks the VM is attached to
    #[serde(default)]
    pub networks: Vec<Network>,
}

/// One entry of a VM hardware reconfiguration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceChange {
    /// Replace the existing device carrying the same key
    Edit(VirtualNic),
}

/// Distributed virtual switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DvSwitch {
    /// Inventory path (datacenter / folder)
    pub path: String,
    /// Switch name
    pub name: String,
    /// Switch uuid
    pub uuid: String,
}

/// Specification of a distributed port group to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortGroupSpec {
    /// Port group name
    pub name: String,
    /// Inventory folder the port group is looked up in
    pub location: String,
    /// Inventory path of the switch
    pub switch_path: String,
    /// Switch name
    pub switch_name: String,
    /// VLAN configuration
    pub vlan: VlanSpec,
}
