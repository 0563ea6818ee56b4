//! VirtualMachinePortGroupConfigurer - applies vNIC to network mappings to a VM

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use vcshell_common::{TaskWaiter, VcResult};

use crate::api::VCenterApi;
use crate::mapper::{VnicNetworkRequest, VnicToNetworkMapper};
use crate::portgroup::DvPortGroupCreator;
use crate::types::{Network, VirtualMachine, VirtualNic};
use crate::vnic::VnicService;

/// Desired state of one vNIC
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VnicDeviceMapping {
    /// The vNIC as currently configured
    pub vnic: VirtualNic,
    /// Target network; `None` keeps the current backing
    pub network: Option<Network>,
    /// Desired connected flag
    pub connect: bool,
    /// MAC address of the vNIC
    pub mac_address: String,
}

impl VnicDeviceMapping {
    /// Creates a new mapping for `vnic`
    pub fn new(vnic: VirtualNic, network: Option<Network>, connect: bool) -> Self {
        let mac_address = vnic.mac_address.clone();
        Self {
            vnic,
            network,
            connect,
            mac_address,
        }
    }
}

/// Reconfigures the network adapters of a VM
///
/// Every operation first selects the vNICs to change, then applies all the
/// changes in a single reconfiguration task and waits for it.
pub struct VirtualMachinePortGroupConfigurer {
    api: Arc<dyn VCenterApi>,
    waiter: Arc<dyn TaskWaiter>,
    mapper: VnicToNetworkMapper,
    vnic_service: VnicService,
}

impl VirtualMachinePortGroupConfigurer {
    /// Creates a new configurer
    pub fn new(
        api: Arc<dyn VCenterApi>,
        waiter: Arc<dyn TaskWaiter>,
        mapper: VnicToNetworkMapper,
        vnic_service: VnicService,
    ) -> Self {
        Self {
            api,
            waiter,
            mapper,
            vnic_service,
        }
    }

    /// Connect vNICs of `vm` to the requested networks
    #[instrument(skip_all, fields(vm = %vm.uuid))]
    pub async fn connect_vnic_to_networks(
        &self,
        vm: &VirtualMachine,
        requests: &[VnicNetworkRequest],
        default_network: &Network,
    ) -> VcResult<Vec<VnicDeviceMapping>> {
        let vnics = self.vnic_service.map_vnics(vm);
        let resolved =
            self.mapper
                .map_request_to_vnics(&vm.uuid, requests, &vnics, default_network)?;

        let update_mapping: Vec<VnicDeviceMapping> = resolved
            .into_iter()
            .filter_map(|(label, network)| {
                vnics
                    .get(&label)
                    .map(|vnic| VnicDeviceMapping::new(vnic.clone(), Some(network), true))
            })
            .collect();

        self.update_vnic_by_mapping(vm, update_mapping).await
    }

    /// Move every vNIC of `vm` to `default_network`, disconnected
    pub async fn disconnect_all_networks(
        &self,
        vm: &VirtualMachine,
        default_network: &Network,
    ) -> VcResult<Vec<VnicDeviceMapping>> {
        let mapping = self.create_mappings_for_all_networks(vm, default_network);
        self.update_vnic_by_mapping(vm, mapping).await
    }

    /// Mappings moving every vNIC of `vm` to `default_network`, disconnected
    pub fn create_mappings_for_all_networks(
        &self,
        vm: &VirtualMachine,
        default_network: &Network,
    ) -> Vec<VnicDeviceMapping> {
        self.vnic_service
            .map_vnics(vm)
            .into_values()
            .map(|vnic| VnicDeviceMapping::new(vnic, Some(default_network.clone()), false))
            .collect()
    }

    /// Mappings disconnecting the vNICs attached to `network`
    ///
    /// Without a default network only connected vNICs are selected and they
    /// keep their backing.
    pub fn create_mapping_for_network(
        &self,
        vm: &VirtualMachine,
        network: &Network,
        default_network: Option<&Network>,
    ) -> Vec<VnicDeviceMapping> {
        self.vnic_service
            .map_vnics(vm)
            .into_values()
            .filter(|vnic| self.vnic_service.is_vnic_attached_to_network(vnic, network))
            .filter(|vnic| default_network.is_some() || self.vnic_service.is_vnic_connected(vnic))
            .map(|vnic| VnicDeviceMapping::new(vnic, default_network.cloned(), false))
            .collect()
    }

    /// Disconnect the vNICs of `vm` attached to `network`
    pub async fn disconnect_network(
        &self,
        vm: &VirtualMachine,
        network: &Network,
        default_network: Option<&Network>,
    ) -> VcResult<Vec<VnicDeviceMapping>> {
        let mapping = self.create_mapping_for_network(vm, network, default_network);
        self.update_vnic_by_mapping(vm, mapping).await
    }

    /// Apply `mapping` to `vm` in one reconfiguration
    pub async fn update_vnic_by_mapping(
        &self,
        vm: &VirtualMachine,
        mapping: Vec<VnicDeviceMapping>,
    ) -> VcResult<Vec<VnicDeviceMapping>> {
        if mapping.is_empty() {
            debug!("Nothing to reconfigure on VM {}", vm.uuid);
            return Ok(mapping);
        }

        let changes = mapping
            .iter()
            .map(|item| {
                self.vnic_service
                    .compose_edit_spec(&item.vnic, item.network.as_ref(), item.connect)
            })
            .collect::<Vec<_>>();
        debug!("Reconfiguring VM {} with {:?}", vm.uuid, changes);

        let task = self.api.reconfigure_vm(&vm.uuid, changes).await?;
        info!("Changing network of VM {} ({})", vm.uuid, task);
        let result = self
            .waiter
            .wait_for_task(self.api.tasks(), &task, "Reconfigure VM")
            .await?;
        if let Some(result) = result {
            debug!("Reconfigure task result {}", result);
        }

        Ok(mapping)
    }

    /// Best-effort removal of the port groups a set of vNICs was attached to
    ///
    /// When an entry carries no network, the network currently attached to
    /// the vNIC is used. Port groups still in use are left alone.
    pub async fn erase_network_by_mapping(
        &self,
        vm: &VirtualMachine,
        items: &[(VirtualNic, Option<Network>)],
    ) -> VcResult<()> {
        let mut seen = HashSet::new();
        for (vnic, network) in items {
            let network = network
                .clone()
                .or_else(|| self.vnic_service.vnic_attached_network(vm, vnic));
            let Some(network) = network else {
                continue;
            };
            if !seen.insert(network.full_name()) {
                continue;
            }
            let task =
                DvPortGroupCreator::destroy_port_group_task(self.api.as_ref(), &network).await?;
            let Some(task) = task else {
                continue;
            };

            match self
                .waiter
                .wait_for_task(self.api.tasks(), &task, "Erase dv Port Group")
                .await
            {
                Ok(_) => info!("Port group '{}' erased", network.name),
                Err(e) if e.is_resource_in_use() => {
                    debug!(
                        "Port group '{}' cannot be destroyed because it is in use",
                        network.name
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
