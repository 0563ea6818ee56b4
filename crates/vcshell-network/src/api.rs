//! vCenter API surface consumed by the network components.

use async_trait::async_trait;

use vcshell_common::{TaskHandle, TaskSource, VcError, VcResult};

use crate::names::split_full_name;
use crate::types::{DeviceChange, Network, PortGroupSpec, VirtualMachine};

/// Operations on the vCenter inventory used to wire VMs to networks.
///
/// Mutating calls return a [`TaskHandle`]; callers wait on it through a
/// [`vcshell_common::TaskWaiter`] using [`VCenterApi::tasks`].
#[async_trait]
pub trait VCenterApi: Send + Sync {
    /// Looks up a VM by BIOS uuid.
    async fn find_vm_by_uuid(&self, uuid: &str) -> VcResult<Option<VirtualMachine>>;

    /// Looks up a network by inventory folder and name.
    async fn find_network(&self, location: &str, name: &str) -> VcResult<Option<Network>>;

    /// Submits one hardware reconfiguration of a VM.
    async fn reconfigure_vm(&self, vm_uuid: &str, changes: Vec<DeviceChange>)
        -> VcResult<TaskHandle>;

    /// Submits the creation of a distributed port group.
    async fn create_dv_port_group(&self, spec: &PortGroupSpec) -> VcResult<TaskHandle>;

    /// Submits the destruction of a distributed port group.
    async fn destroy_port_group(&self, network: &Network) -> VcResult<TaskHandle>;

    /// Returns the task state source of this connection.
    fn tasks(&self) -> &dyn TaskSource;
}

/// Finds a VM by uuid, failing with [`VcError::VmNotFound`].
pub async fn find_vm(api: &dyn VCenterApi, uuid: &str) -> VcResult<VirtualMachine> {
    api.find_vm_by_uuid(uuid)
        .await?
        .ok_or_else(|| VcError::VmNotFound {
            uuid: uuid.to_string(),
        })
}

/// Finds a network by its `location/name` full name.
pub async fn find_network_by_full_name(api: &dyn VCenterApi, full_name: &str) -> VcResult<Network> {
    let (location, name) = split_full_name(full_name);
    api.find_network(location, name)
        .await?
        .ok_or_else(|| VcError::network_not_found(location, name))
}
