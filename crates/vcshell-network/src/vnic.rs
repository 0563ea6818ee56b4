//! vNIC inspection and edit-spec construction

use std::collections::BTreeMap;

use crate::types::{DeviceChange, Network, NetworkKind, NicBacking, VirtualMachine, VirtualNic};

/// Stateless helper around the vNIC devices of a VM
#[derive(Debug, Clone, Copy, Default)]
pub struct VnicService;

impl VnicService {
    /// Creates a new VnicService
    pub fn new() -> Self {
        Self
    }

    /// Map of the VM's vNICs keyed by device label, ordered by label
    pub fn map_vnics(&self, vm: &VirtualMachine) -> BTreeMap<String, VirtualNic> {
        vm.nics
            .iter()
            .map(|nic| (nic.label.clone(), nic.clone()))
            .collect()
    }

    /// Returns true if the vNIC is currently connected
    pub fn is_vnic_connected(&self, vnic: &VirtualNic) -> bool {
        vnic.connected
    }

    /// Returns true if the vNIC backing points at `network`
    ///
    /// Distributed port backings are compared by port group key, plain
    /// network backings by network name.
    pub fn is_vnic_attached_to_network(&self, vnic: &VirtualNic, network: &Network) -> bool {
        match (&vnic.backing, &network.kind) {
            (
                Some(NicBacking::DistributedPort { portgroup_key, .. }),
                NetworkKind::DistributedPortGroup { key, .. },
            ) => portgroup_key == key,
            (Some(NicBacking::Network { network_name }), _) => *network_name == network.name,
            _ => false,
        }
    }

    /// The network of `vm` the vNIC is attached to, if known
    pub fn vnic_attached_network(&self, vm: &VirtualMachine, vnic: &VirtualNic) -> Option<Network> {
        vm.networks
            .iter()
            .find(|network| self.is_vnic_attached_to_network(vnic, network))
            .cloned()
    }

    /// Finds the vNIC carrying `mac_address` (case-insensitive)
    pub fn find_vnic_by_mac<'a>(
        &self,
        vm: &'a VirtualMachine,
        mac_address: &str,
    ) -> Option<&'a VirtualNic> {
        vm.nics
            .iter()
            .find(|nic| nic.mac_address.eq_ignore_ascii_case(mac_address.trim()))
    }

    /// Build an edit spec moving the vNIC to `network` and setting its
    /// connected / start-connected flags
    ///
    /// With no network the current backing is kept.
    pub fn compose_edit_spec(
        &self,
        vnic: &VirtualNic,
        network: Option<&Network>,
        connect: bool,
    ) -> DeviceChange {
        let mut device = vnic.clone();
        if let Some(network) = network {
            device.backing = Some(NicBacking::from(network));
        }
        device.connected = connect;
        device.start_connected = connect;
        DeviceChange::Edit(device)
    }
}
