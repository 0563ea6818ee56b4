//! Distributed port group creation and removal

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use vcshell_common::{TaskHandle, TaskWaiter, VcError, VcResult};

use crate::api::VCenterApi;
use crate::types::{Network, PortGroupSpec, VlanSpec};

/// Creates the port groups VMs get connected to
pub struct DvPortGroupCreator {
    api: Arc<dyn VCenterApi>,
    waiter: Arc<dyn TaskWaiter>,
}

impl DvPortGroupCreator {
    /// Creates a new DvPortGroupCreator
    pub fn new(api: Arc<dyn VCenterApi>, waiter: Arc<dyn TaskWaiter>) -> Self {
        Self { api, waiter }
    }

    /// Return the port group `name` under `port_group_path`, creating it on
    /// the switch when it does not exist yet
    #[instrument(skip(self, vlan))]
    pub async fn get_or_create_network(
        &self,
        switch_path: &str,
        switch_name: &str,
        port_group_path: &str,
        name: &str,
        vlan: VlanSpec,
    ) -> VcResult<Network> {
        if let Some(network) = self.api.find_network(port_group_path, name).await? {
            debug!("Port group '{}' already exists", name);
            return Ok(network);
        }

        let spec = PortGroupSpec {
            name: name.to_string(),
            location: port_group_path.to_string(),
            switch_path: switch_path.to_string(),
            switch_name: switch_name.to_string(),
            vlan,
        };
        if let Err(e) = self.create_dv_port_group(&spec).await {
            // Another VM of the same batch may have created it meanwhile.
            warn!("Creating port group '{}' failed: {}", name, e);
            if let Some(network) = self.api.find_network(port_group_path, name).await? {
                return Ok(network);
            }
            return Err(e);
        }

        self.api
            .find_network(port_group_path, name)
            .await?
            .ok_or_else(|| VcError::network_not_found(port_group_path, name))
    }

    /// Create a port group and wait for the task
    pub async fn create_dv_port_group(&self, spec: &PortGroupSpec) -> VcResult<()> {
        let task = self.api.create_dv_port_group(spec).await?;
        self.waiter
            .wait_for_task(self.api.tasks(), &task, "Create dv Port Group")
            .await?;
        info!(
            "Created port group '{}' on {}\\{}",
            spec.name, spec.switch_path, spec.switch_name
        );
        Ok(())
    }

    /// Submit the destruction of `network` if it is a distributed port group
    pub async fn destroy_port_group_task(
        api: &dyn VCenterApi,
        network: &Network,
    ) -> VcResult<Option<TaskHandle>> {
        if !network.is_port_group() {
            return Ok(None);
        }
        api.destroy_port_group(network).await.map(Some)
    }
}
