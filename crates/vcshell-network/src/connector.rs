//! Connecting VMs to VLAN port groups

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

use vcshell_common::VcResult;

use crate::api::{find_network_by_full_name, find_vm, VCenterApi};
use crate::configurer::VirtualMachinePortGroupConfigurer;
use crate::mapper::VnicNetworkRequest;
use crate::names::generate_port_group_name;
use crate::portgroup::DvPortGroupCreator;
use crate::types::{VlanMode, VlanSpec};

/// Request to connect one vNIC of a VM to one VLAN
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmNetworkMapping {
    /// Explicit vNIC label, if the request named one
    pub vnic_name: Option<String>,
    /// Requested VLAN id (or trunk ranges)
    pub vlan_id: String,
    /// VLAN mode
    pub vlan_mode: VlanMode,
    /// Inventory path of the distributed switch
    pub dv_switch_path: String,
    /// Name of the distributed switch
    pub dv_switch_name: String,
    /// Inventory folder holding the port groups
    pub port_group_path: String,
}

/// Outcome of connecting or disconnecting one vNIC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionResult {
    /// VM uuid
    pub vm_uuid: String,
    /// Label of the vNIC that changed
    pub vnic_name: String,
    /// MAC address of the vNIC that changed
    pub mac_address: String,
    /// Network the vNIC was connected to (or left, for disconnects)
    pub network_name: Option<String>,
}

/// Connects the vNICs of a VM to VLAN port groups, creating the port groups
/// on demand
pub struct VirtualSwitchToMachineConnector {
    api: Arc<dyn VCenterApi>,
    creator: DvPortGroupCreator,
    configurer: Arc<VirtualMachinePortGroupConfigurer>,
}

impl VirtualSwitchToMachineConnector {
    /// Creates a new connector
    pub fn new(
        api: Arc<dyn VCenterApi>,
        creator: DvPortGroupCreator,
        configurer: Arc<VirtualMachinePortGroupConfigurer>,
    ) -> Self {
        Self {
            api,
            creator,
            configurer,
        }
    }

    /// Connect `vm_uuid` to every VLAN in `mappings` in one reconfiguration
    ///
    /// `default_network` is the full name (`location/name`) of the holding
    /// network free vNICs are parked on.
    #[instrument(skip(self, mappings), fields(count = mappings.len()))]
    pub async fn connect_to_networks(
        &self,
        vm_uuid: &str,
        mappings: &[VmNetworkMapping],
        default_network: &str,
    ) -> VcResult<Vec<ConnectionResult>> {
        let vm = find_vm(self.api.as_ref(), vm_uuid).await?;
        let default_network = find_network_by_full_name(self.api.as_ref(), default_network).await?;

        let mut requests = Vec::with_capacity(mappings.len());
        for mapping in mappings {
            let name = generate_port_group_name(
                &mapping.dv_switch_name,
                &mapping.vlan_id,
                mapping.vlan_mode,
            );
            let vlan = VlanSpec::parse(mapping.vlan_mode, &mapping.vlan_id)?;
            let network = self
                .creator
                .get_or_create_network(
                    &mapping.dv_switch_path,
                    &mapping.dv_switch_name,
                    &mapping.port_group_path,
                    &name,
                    vlan,
                )
                .await?;
            requests.push(VnicNetworkRequest {
                vnic_name: mapping.vnic_name.clone(),
                network,
            });
        }

        let updated = self
            .configurer
            .connect_vnic_to_networks(&vm, &requests, &default_network)
            .await?;

        info!("Connected {} vNIC(s) of VM {}", updated.len(), vm_uuid);
        Ok(updated
            .into_iter()
            .map(|mapping| ConnectionResult {
                vm_uuid: vm_uuid.to_string(),
                vnic_name: mapping.vnic.label,
                mac_address: mapping.mac_address,
                network_name: mapping.network.map(|n| n.name),
            })
            .collect())
    }
}
