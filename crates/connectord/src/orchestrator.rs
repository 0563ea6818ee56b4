//! ConnectionCommandOrchestrator - executes bulk VLAN requests.
//!
//! A request is decoded, grouped per (VM, VLAN mode, action type), executed
//! one combined action per worker, and the results are attributed back to
//! the requested actions.

use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use vcshell_common::{ParallelTaskSet, SynchronousTaskWaiter, TaskWaiter, VcResult};
use vcshell_network::{
    ConnectionResult, DvPortGroupCreator, VCenterApi, VirtualMachinePortGroupConfigurer,
    VirtualSwitchToMachineConnector, VirtualSwitchToMachineDisconnector, VmNetworkMapping,
    VmNetworkRemoveMapping, VnicService, VnicToNetworkMapper,
};

use crate::action::{decode_request, ActionResult, ActionType, ConnectionAction};
use crate::combine::group_actions;
use crate::config::{ConnectConfig, DvSwitchPath};
use crate::decombine::decombine_results;
use crate::error::ConnectResult;

/// Location of the port groups and holding network used by one request.
#[derive(Debug, Clone)]
struct Placement {
    switch: DvSwitchPath,
    port_group_path: String,
    default_network: String,
}

/// Executes bulk connect/disconnect requests against vCenter.
pub struct ConnectionCommandOrchestrator {
    config: ConnectConfig,
    connector: Arc<VirtualSwitchToMachineConnector>,
    disconnector: Arc<VirtualSwitchToMachineDisconnector>,
}

impl ConnectionCommandOrchestrator {
    /// Creates a new orchestrator.
    pub fn new(
        config: ConnectConfig,
        connector: Arc<VirtualSwitchToMachineConnector>,
        disconnector: Arc<VirtualSwitchToMachineDisconnector>,
    ) -> Self {
        Self {
            config,
            connector,
            disconnector,
        }
    }

    /// Creates an orchestrator wired to `api`, polling tasks at the
    /// configured interval.
    pub fn from_api(config: ConnectConfig, api: Arc<dyn VCenterApi>) -> Self {
        let waiter: Arc<dyn TaskWaiter> =
            Arc::new(SynchronousTaskWaiter::new(config.task_poll_interval()));
        let configurer = Arc::new(VirtualMachinePortGroupConfigurer::new(
            api.clone(),
            waiter.clone(),
            VnicToNetworkMapper::default(),
            VnicService::new(),
        ));
        let connector = VirtualSwitchToMachineConnector::new(
            api.clone(),
            DvPortGroupCreator::new(api.clone(), waiter),
            configurer.clone(),
        );
        let disconnector = VirtualSwitchToMachineDisconnector::new(
            api,
            configurer,
            config.holding_network.clone(),
        );

        Self::new(config, Arc::new(connector), Arc::new(disconnector))
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ConnectConfig {
        &self.config
    }

    /// Executes a JSON driver request and returns one result per action
    /// outcome.
    pub async fn connect_bulk(&self, request: &str) -> ConnectResult<Vec<ActionResult>> {
        self.connect_bulk_with_cancel(request, CancellationToken::new()).await
    }

    /// Like [`Self::connect_bulk`], stopping early when `cancel` fires.
    ///
    /// Combined actions that have not finished by then come back as failed
    /// results. The token only affects this request.
    pub async fn connect_bulk_with_cancel(
        &self,
        request: &str,
        cancel: CancellationToken,
    ) -> ConnectResult<Vec<ActionResult>> {
        // Reject a bad switch path before even looking at the request.
        self.config.dv_switch()?;
        let actions = decode_request(request)?;
        self.connect_actions(actions, cancel).await
    }

    /// Executes already decoded actions.
    #[instrument(skip_all, fields(actions = actions.len()))]
    pub async fn connect_actions(
        &self,
        actions: Vec<ConnectionAction>,
        cancel: CancellationToken,
    ) -> ConnectResult<Vec<ActionResult>> {
        let placement = Placement {
            switch: self.config.dv_switch()?,
            port_group_path: self.config.default_port_group_location.clone(),
            default_network: self.config.holding_network.clone(),
        };

        let groups = group_actions(actions)?;
        let combined = groups.combined_actions();
        info!(
            "Executing {} combined action(s) with parallelism {}",
            combined.len(),
            self.config.max_parallelism
        );

        // One reconfiguration per VM at a time, across modes and types too.
        let mut vm_locks: HashMap<String, Arc<Mutex<()>>> = HashMap::new();
        let mut set = ParallelTaskSet::new_with_parallelism(self.config.max_parallelism)
            .with_cancellation(cancel);

        for action in combined {
            let lock = vm_locks.entry(action.vm_uuid.clone()).or_default().clone();
            let connector = self.connector.clone();
            let disconnector = self.disconnector.clone();
            let placement = placement.clone();
            let unit = action.clone();
            set.spawn(action, async move {
                let _guard = lock.lock().await;
                match unit.action_type {
                    ActionType::SetVlan => set_vlan_bulk(&connector, &unit, &placement).await,
                    ActionType::RemoveVlan => remove_vlan_bulk(&disconnector, &unit).await,
                }
            });
        }

        let mut results = Vec::new();
        for (action, output) in set.join_all().await {
            match output {
                Ok(action_results) => results.extend(action_results),
                Err(abort) => {
                    error!("Combined action {} did not complete: {}", action.action_id, abort);
                    results.push(ActionResult::failure(
                        &action,
                        format!("Action did not complete: {}", abort),
                    ));
                }
            }
        }

        let results = decombine_results(&results, &groups);
        info!("Request produced {} result(s)", results.len());
        Ok(results)
    }
}

async fn set_vlan_bulk(
    connector: &VirtualSwitchToMachineConnector,
    action: &ConnectionAction,
    placement: &Placement,
) -> Vec<ActionResult> {
    let mappings: Vec<VmNetworkMapping> = action
        .params
        .vlan_ids
        .iter()
        .map(|vlan_id| VmNetworkMapping {
            vnic_name: action.vnic_name.clone(),
            vlan_id: vlan_id.clone(),
            vlan_mode: action.params.mode,
            dv_switch_path: placement.switch.path.clone(),
            dv_switch_name: placement.switch.name.clone(),
            port_group_path: placement.port_group_path.clone(),
        })
        .collect();

    let outcome = connector
        .connect_to_networks(&action.vm_uuid, &mappings, &placement.default_network)
        .await;
    into_results(action, outcome)
}

async fn remove_vlan_bulk(
    disconnector: &VirtualSwitchToMachineDisconnector,
    action: &ConnectionAction,
) -> Vec<ActionResult> {
    let mappings: Vec<VmNetworkRemoveMapping> = action
        .interfaces
        .iter()
        .map(|mac| VmNetworkRemoveMapping {
            vm_uuid: action.vm_uuid.clone(),
            mac_address: mac.clone(),
        })
        .collect();

    let outcome = disconnector
        .disconnect_from_networks(&action.vm_uuid, &mappings)
        .await;
    into_results(action, outcome)
}

fn into_results(
    action: &ConnectionAction,
    outcome: VcResult<Vec<ConnectionResult>>,
) -> Vec<ActionResult> {
    match outcome {
        Ok(connections) => connections
            .iter()
            .map(|connection| ActionResult::success(action, connection))
            .collect(),
        Err(e) => {
            let message = error_message(&e);
            warn!("{} of VM {} failed: {}", action.action_type, action.vm_uuid, message);
            vec![ActionResult::failure(action, message)]
        }
    }
}

/// Renders an error with its whole source chain.
fn error_message(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
