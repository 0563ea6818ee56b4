//! Selection of the vNIC serving each requested network

use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use vcshell_common::{VcError, VcResult};

use crate::types::{Network, VirtualNic};
use crate::vnic::VnicService;

/// Request to connect a vNIC of a VM to a network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VnicNetworkRequest {
    /// Explicit vNIC label; `None` picks the first available vNIC
    pub vnic_name: Option<String>,
    /// Target network
    pub network: Network,
}

/// Decides which vNIC serves which requested network
#[derive(Debug, Clone, Copy, Default)]
pub struct VnicToNetworkMapper {
    vnic_service: VnicService,
}

impl VnicToNetworkMapper {
    /// Creates a new mapper
    pub fn new(vnic_service: VnicService) -> Self {
        Self { vnic_service }
    }

    /// Map each request onto a vNIC label
    ///
    /// Requests naming a vNIC are resolved first and only touch that vNIC;
    /// names the VM does not have are skipped. The remaining requests take
    /// the first vNIC by label that is disconnected or parked on
    /// `default_network`, never handing out the same vNIC twice.
    pub fn map_request_to_vnics(
        &self,
        vm_uuid: &str,
        requests: &[VnicNetworkRequest],
        vnics: &BTreeMap<String, VirtualNic>,
        default_network: &Network,
    ) -> VcResult<Vec<(String, Network)>> {
        let mut mapping = Vec::with_capacity(requests.len());
        let mut claimed = HashSet::new();

        for request in requests {
            let Some(vnic_name) = &request.vnic_name else {
                continue;
            };
            if !vnics.contains_key(vnic_name) {
                warn!("vNIC '{}' not found on VM {}, ignoring request", vnic_name, vm_uuid);
                continue;
            }
            claimed.insert(vnic_name.clone());
            mapping.push((vnic_name.clone(), request.network.clone()));
        }

        for request in requests.iter().filter(|r| r.vnic_name.is_none()) {
            let available = vnics.iter().find(|(label, vnic)| {
                !claimed.contains(*label) && self.is_available(vnic, default_network)
            });
            let Some((label, _)) = available else {
                return Err(VcError::NoAvailableVnic {
                    vm: vm_uuid.to_string(),
                    network: request.network.name.clone(),
                });
            };
            debug!("Selected vNIC '{}' for network '{}'", label, request.network.name);
            claimed.insert(label.clone());
            mapping.push((label.clone(), request.network.clone()));
        }

        Ok(mapping)
    }

    fn is_available(&self, vnic: &VirtualNic, default_network: &Network) -> bool {
        !self.vnic_service.is_vnic_connected(vnic)
            || self
                .vnic_service
                .is_vnic_attached_to_network(vnic, default_network)
    }
}
