//! VM networking on top of the vCenter API.
//!
//! This crate wires virtual machine network adapters to VLAN port groups:
//!
//! - [`VirtualSwitchToMachineConnector`]: Connects vNICs to VLANs, creating
//!   the distributed port groups on demand
//! - [`VirtualSwitchToMachineDisconnector`]: Parks vNICs back on the holding
//!   network and erases port groups nobody uses anymore
//! - [`VirtualMachinePortGroupConfigurer`]: Applies vNIC changes in a single
//!   reconfiguration per call
//! - [`InMemoryVCenter`]: vCenter kept in memory, for the command line driver
//!   and for tests
//!
//! Every remote operation goes through the [`VCenterApi`] trait.

mod api;
mod configurer;
mod connector;
mod disconnector;
mod mapper;
mod names;
mod portgroup;
mod sim;
mod types;
mod vnic;

pub use api::{find_network_by_full_name, find_vm, VCenterApi};
pub use configurer::{VirtualMachinePortGroupConfigurer, VnicDeviceMapping};
pub use connector::{ConnectionResult, VirtualSwitchToMachineConnector, VmNetworkMapping};
pub use disconnector::{VirtualSwitchToMachineDisconnector, VmNetworkRemoveMapping};
pub use mapper::{VnicNetworkRequest, VnicToNetworkMapper};
pub use names::{generate_port_group_name, split_full_name, vlan_marker, PORT_GROUP_PREFIX};
pub use portgroup::DvPortGroupCreator;
pub use sim::{InMemoryVCenter, Inventory};
pub use types::{
    DeviceChange, DvSwitch, Network, NetworkKind, NicBacking, PortGroupSpec, VirtualMachine,
    VirtualNic, VlanMode, VlanSpec, MAX_VLAN_ID,
};
pub use vnic::VnicService;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use vcshell_common::SynchronousTaskWaiter;

    use super::*;

    pub const VM_UUID: &str = "4213a1b2-0000-0000-0000-000000000001";
    pub const VM2_UUID: &str = "4213a1b2-0000-0000-0000-000000000002";
    pub const SWITCH_PATH: &str = "QualiSB";
    pub const SWITCH_NAME: &str = "dvSwitch";
    pub const SWITCH_UUID: &str = "50 2a 9f 11 dvs";
    pub const HOLDING_NETWORK: &str = "QualiSB/Anetwork";

    pub fn holding_network() -> Network {
        Network {
            name: "Anetwork".to_string(),
            location: "QualiSB".to_string(),
            kind: NetworkKind::Standard,
        }
    }

    pub fn port_group(name: &str, key: &str) -> Network {
        Network {
            name: name.to_string(),
            location: "QualiSB".to_string(),
            kind: NetworkKind::DistributedPortGroup {
                key: key.to_string(),
                switch_uuid: SWITCH_UUID.to_string(),
            },
        }
    }

    fn vm(uuid: &str, name: &str, mac_prefix: &str) -> VirtualMachine {
        let nics = (1..=2)
            .map(|i| VirtualNic {
                label: format!("Network adapter {}", i),
                key: 4000 + i,
                mac_address: format!("{}:{:02x}", mac_prefix, i),
                backing: Some(NicBacking::Network {
                    network_name: "Anetwork".to_string(),
                }),
                connected: false,
                start_connected: false,
            })
            .collect();
        VirtualMachine {
            uuid: uuid.to_string(),
            name: name.to_string(),
            nics,
            networks: Vec::new(),
        }
    }

    pub fn test_inventory() -> Inventory {
        Inventory {
            switches: vec![DvSwitch {
                path: SWITCH_PATH.to_string(),
                name: SWITCH_NAME.to_string(),
                uuid: SWITCH_UUID.to_string(),
            }],
            networks: vec![
                holding_network(),
                port_group("QS_dvSwitch_VLAN_7_Access", "dvportgroup-7"),
                port_group("QS_dvSwitch_VLAN_9_Access", "dvportgroup-9"),
            ],
            vms: vec![
                vm(VM_UUID, "web-01", "00:50:56:a1:00"),
                vm(VM2_UUID, "db-01", "00:50:56:a2:00"),
            ],
        }
    }

    pub fn configurer_for(sim: &Arc<InMemoryVCenter>) -> Arc<VirtualMachinePortGroupConfigurer> {
        Arc::new(VirtualMachinePortGroupConfigurer::new(
            sim.clone(),
            Arc::new(SynchronousTaskWaiter::new(Duration::from_millis(1))),
            VnicToNetworkMapper::default(),
            VnicService::new(),
        ))
    }

    pub fn connector_for(sim: &Arc<InMemoryVCenter>) -> VirtualSwitchToMachineConnector {
        VirtualSwitchToMachineConnector::new(
            sim.clone(),
            DvPortGroupCreator::new(
                sim.clone(),
                Arc::new(SynchronousTaskWaiter::new(Duration::from_millis(1))),
            ),
            configurer_for(sim),
        )
    }

    pub fn disconnector_for(sim: &Arc<InMemoryVCenter>) -> VirtualSwitchToMachineDisconnector {
        VirtualSwitchToMachineDisconnector::new(sim.clone(), configurer_for(sim), HOLDING_NETWORK)
    }
}
