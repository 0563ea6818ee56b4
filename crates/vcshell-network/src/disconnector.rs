//! Disconnecting VMs from VLAN port groups

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use vcshell_common::{VcError, VcResult};

use crate::api::{find_network_by_full_name, find_vm, VCenterApi};
use crate::configurer::{VirtualMachinePortGroupConfigurer, VnicDeviceMapping};
use crate::connector::ConnectionResult;
use crate::types::{Network, VirtualMachine, VirtualNic};
use crate::vnic::VnicService;

/// Request to disconnect the vNIC carrying a MAC address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmNetworkRemoveMapping {
    /// VM uuid
    pub vm_uuid: String,
    /// MAC address of the vNIC to disconnect
    pub mac_address: String,
}

/// Moves vNICs back to the holding network and cleans up the port groups
/// they leave behind
pub struct VirtualSwitchToMachineDisconnector {
    api: Arc<dyn VCenterApi>,
    configurer: Arc<VirtualMachinePortGroupConfigurer>,
    vnic_service: VnicService,
    default_network: String,
}

impl VirtualSwitchToMachineDisconnector {
    /// Creates a new disconnector parking vNICs on `default_network`
    /// (`location/name`)
    pub fn new(
        api: Arc<dyn VCenterApi>,
        configurer: Arc<VirtualMachinePortGroupConfigurer>,
        default_network: impl Into<String>,
    ) -> Self {
        Self {
            api,
            configurer,
            vnic_service: VnicService::new(),
            default_network: default_network.into(),
        }
    }

    /// Disconnect the vNICs named by MAC in `mappings`
    #[instrument(skip(self, mappings), fields(count = mappings.len()))]
    pub async fn disconnect_from_networks(
        &self,
        vm_uuid: &str,
        mappings: &[VmNetworkRemoveMapping],
    ) -> VcResult<Vec<ConnectionResult>> {
        let vm = find_vm(self.api.as_ref(), vm_uuid).await?;
        let default_network = self.default_network().await?;

        let mut labels = HashSet::new();
        let mut update_mapping = Vec::with_capacity(mappings.len());
        for mapping in mappings {
            let vnic = self
                .vnic_service
                .find_vnic_by_mac(&vm, &mapping.mac_address)
                .ok_or_else(|| VcError::VnicNotFound {
                    vm: vm_uuid.to_string(),
                    mac: mapping.mac_address.clone(),
                })?;
            if labels.insert(vnic.label.clone()) {
                update_mapping.push(VnicDeviceMapping::new(
                    vnic.clone(),
                    Some(default_network.clone()),
                    false,
                ));
            }
        }

        self.apply_and_cleanup(&vm, update_mapping, &default_network)
            .await
    }

    /// Disconnect every vNIC of the VM
    #[instrument(skip(self))]
    pub async fn disconnect_all(&self, vm_uuid: &str) -> VcResult<Vec<ConnectionResult>> {
        let vm = find_vm(self.api.as_ref(), vm_uuid).await?;
        let default_network = self.default_network().await?;
        let mapping = self
            .configurer
            .create_mappings_for_all_networks(&vm, &default_network);

        self.apply_and_cleanup(&vm, mapping, &default_network).await
    }

    /// Disconnect the vNICs of the VM attached to `network` (`location/name`)
    #[instrument(skip(self))]
    pub async fn disconnect_network(
        &self,
        vm_uuid: &str,
        network: &str,
    ) -> VcResult<Vec<ConnectionResult>> {
        let vm = find_vm(self.api.as_ref(), vm_uuid).await?;
        let default_network = self.default_network().await?;
        let network = find_network_by_full_name(self.api.as_ref(), network).await?;
        let mapping = self
            .configurer
            .create_mapping_for_network(&vm, &network, Some(&default_network));

        self.apply_and_cleanup(&vm, mapping, &default_network).await
    }

    async fn default_network(&self) -> VcResult<Network> {
        find_network_by_full_name(self.api.as_ref(), &self.default_network).await
    }

    async fn apply_and_cleanup(
        &self,
        vm: &VirtualMachine,
        mapping: Vec<VnicDeviceMapping>,
        default_network: &Network,
    ) -> VcResult<Vec<ConnectionResult>> {
        // Remember what every vNIC leaves before it is moved.
        let previous: Vec<(VirtualNic, Option<Network>)> = mapping
            .iter()
            .map(|item| {
                let network = self.vnic_service.vnic_attached_network(vm, &item.vnic);
                (item.vnic.clone(), network)
            })
            .filter(|(_, network)| network.as_ref() != Some(default_network))
            .collect();

        let updated = self.configurer.update_vnic_by_mapping(vm, mapping).await?;
        info!("Disconnected {} vNIC(s) of VM {}", updated.len(), vm.uuid);

        let left: Vec<(VirtualNic, Option<Network>)> = previous
            .iter()
            .filter(|(_, network)| network.is_some())
            .cloned()
            .collect();
        if let Err(e) = self.configurer.erase_network_by_mapping(vm, &left).await {
            warn!("Cleaning up port groups of VM {} failed: {}", vm.uuid, e);
        }

        Ok(updated
            .into_iter()
            .map(|item| {
                let network_name = previous
                    .iter()
                    .find(|(vnic, _)| vnic.label == item.vnic.label)
                    .and_then(|(_, network)| network.as_ref().map(|n| n.name.clone()));
                ConnectionResult {
                    vm_uuid: vm.uuid.clone(),
                    vnic_name: item.vnic.label,
                    mac_address: item.mac_address,
                    network_name,
                }
            })
            .collect())
    }
}
