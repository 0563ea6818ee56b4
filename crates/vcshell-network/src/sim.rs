//! In-memory vCenter used by the command line driver and the tests
//!
//! Mutating calls create tasks that stay running for a configurable number of
//! polls and apply their effect when they complete, the way a real vCenter
//! task does.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use vcshell_common::{
    Fault, FaultKind, TaskHandle, TaskInfo, TaskSource, TaskState, VcError, VcResult,
};

use crate::api::VCenterApi;
use crate::types::{DeviceChange, DvSwitch, Network, NetworkKind, PortGroupSpec, VirtualMachine};
use crate::vnic::VnicService;

/// Initial content of an [`InMemoryVCenter`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inventory {
    /// Distributed switches
    pub switches: Vec<DvSwitch>,
    /// Standard networks and port groups
    pub networks: Vec<Network>,
    /// Virtual machines
    pub vms: Vec<VirtualMachine>,
}

impl Inventory {
    /// Parse an inventory from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

enum Operation {
    Reconfigure {
        vm_uuid: String,
        changes: Vec<DeviceChange>,
    },
    CreatePortGroup(PortGroupSpec),
    DestroyPortGroup(Network),
}

struct SimTask {
    operation: Option<Operation>,
    remaining_polls: u32,
    state: TaskState,
}

#[derive(Default)]
struct State {
    inventory: Inventory,
    tasks: HashMap<TaskHandle, SimTask>,
    next_task: u64,
    next_port_group: u64,
    reconfigure_faults: HashMap<String, Fault>,
    reconfigure_count: usize,
    port_groups_created: usize,
    in_flight: HashMap<String, usize>,
    max_in_flight: usize,
    overlapping: usize,
}

/// vCenter backed by an [`Inventory`] held in memory
pub struct InMemoryVCenter {
    state: Mutex<State>,
    running_polls: u32,
    vnic_service: VnicService,
}

impl InMemoryVCenter {
    /// Creates a vCenter whose tasks complete on the first poll
    pub fn new(inventory: Inventory) -> Self {
        let mut state = State {
            inventory,
            next_port_group: 100,
            ..State::default()
        };
        let vnic_service = VnicService::new();
        for index in 0..state.inventory.vms.len() {
            refresh_vm_networks(&mut state.inventory, index, vnic_service);
        }
        Self {
            state: Mutex::new(state),
            running_polls: 0,
            vnic_service,
        }
    }

    /// Keep every task running for `polls` polls before it completes
    pub fn with_running_polls(mut self, polls: u32) -> Self {
        self.running_polls = polls;
        self
    }

    /// Make every later reconfiguration of `vm_uuid` fail with `fault`
    pub fn fail_reconfigure(&self, vm_uuid: &str, fault: Fault) {
        self.lock().reconfigure_faults.insert(vm_uuid.to_string(), fault);
    }

    /// Snapshot of a VM
    pub fn vm(&self, uuid: &str) -> Option<VirtualMachine> {
        self.lock()
            .inventory
            .vms
            .iter()
            .find(|vm| vm.uuid == uuid)
            .cloned()
    }

    /// Snapshot of a network
    pub fn network(&self, location: &str, name: &str) -> Option<Network> {
        self.lock()
            .inventory
            .networks
            .iter()
            .find(|n| n.location == location && n.name == name)
            .cloned()
    }

    /// Number of reconfiguration tasks submitted
    pub fn reconfigure_count(&self) -> usize {
        self.lock().reconfigure_count
    }

    /// Number of port groups created successfully
    pub fn port_groups_created(&self) -> usize {
        self.lock().port_groups_created
    }

    /// Number of reconfigurations submitted while another one of the same VM
    /// was still running
    pub fn overlapping_reconfigurations(&self) -> usize {
        self.lock().overlapping
    }

    /// Highest number of reconfigurations running at the same time, over all
    /// VMs
    pub fn max_concurrent_reconfigurations(&self) -> usize {
        self.lock().max_in_flight
    }

    /// Number of tasks whose terminal state has not been reported yet
    pub fn pending_tasks(&self) -> usize {
        self.lock().tasks.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means a test thread panicked mid-update.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn submit(&self, state: &mut State, operation: Operation) -> TaskHandle {
        state.next_task += 1;
        let handle = TaskHandle::new(format!("task-{}", state.next_task));
        state.tasks.insert(
            handle.clone(),
            SimTask {
                operation: Some(operation),
                remaining_polls: self.running_polls,
                state: TaskState::Running,
            },
        );
        handle
    }

    fn complete(&self, state: &mut State, operation: Operation) -> TaskState {
        match operation {
            Operation::Reconfigure { vm_uuid, changes } => {
                if let Some(count) = state.in_flight.get_mut(&vm_uuid) {
                    *count = count.saturating_sub(1);
                }
                if let Some(fault) = state.reconfigure_faults.get(&vm_uuid) {
                    return TaskState::Error(fault.clone());
                }
                let Some(index) = state.inventory.vms.iter().position(|vm| vm.uuid == vm_uuid)
                else {
                    return TaskState::Error(Fault::new(
                        FaultKind::NotFound,
                        format!("VM {} no longer exists", vm_uuid),
                    ));
                };
                let vm = &mut state.inventory.vms[index];
                for DeviceChange::Edit(device) in changes {
                    match vm.nics.iter_mut().find(|nic| nic.key == device.key) {
                        Some(nic) => *nic = device,
                        None => {
                            return TaskState::Error(Fault::new(
                                FaultKind::InvalidState,
                                format!("Device {} not found on VM {}", device.key, vm_uuid),
                            ));
                        }
                    }
                }
                refresh_vm_networks(&mut state.inventory, index, self.vnic_service);
                TaskState::Success
            }
            Operation::CreatePortGroup(spec) => {
                let exists = state
                    .inventory
                    .networks
                    .iter()
                    .any(|n| n.location == spec.location && n.name == spec.name);
                if exists {
                    return TaskState::Error(Fault::new(
                        FaultKind::DuplicateName,
                        format!("The name '{}' already exists.", spec.name),
                    ));
                }
                let Some(switch) = state
                    .inventory
                    .switches
                    .iter()
                    .find(|s| s.path == spec.switch_path && s.name == spec.switch_name)
                else {
                    return TaskState::Error(Fault::new(
                        FaultKind::NotFound,
                        format!(
                            "Distributed switch '{}' not found under '{}'",
                            spec.switch_name, spec.switch_path
                        ),
                    ));
                };
                state.next_port_group += 1;
                let network = Network {
                    name: spec.name,
                    location: spec.location,
                    kind: NetworkKind::DistributedPortGroup {
                        key: format!("dvportgroup-{}", state.next_port_group),
                        switch_uuid: switch.uuid.clone(),
                    },
                };
                state.inventory.networks.push(network);
                state.port_groups_created += 1;
                TaskState::Success
            }
            Operation::DestroyPortGroup(network) => {
                let in_use = state.inventory.vms.iter().any(|vm| {
                    vm.nics
                        .iter()
                        .any(|nic| self.vnic_service.is_vnic_attached_to_network(nic, &network))
                });
                if in_use {
                    return TaskState::Error(Fault::resource_in_use(format!(
                        "The resource '{}' is in use.",
                        network.name
                    )));
                }
                state
                    .inventory
                    .networks
                    .retain(|n| !(n.location == network.location && n.name == network.name));
                TaskState::Success
            }
        }
    }
}

/// Recompute the networks of a VM from its vNIC backings
fn refresh_vm_networks(inventory: &mut Inventory, index: usize, vnic_service: VnicService) {
    let networks: Vec<Network> = inventory
        .networks
        .iter()
        .filter(|network| {
            inventory.vms[index]
                .nics
                .iter()
                .any(|nic| vnic_service.is_vnic_attached_to_network(nic, network))
        })
        .cloned()
        .collect();
    inventory.vms[index].networks = networks;
}

#[async_trait]
impl VCenterApi for InMemoryVCenter {
    async fn find_vm_by_uuid(&self, uuid: &str) -> VcResult<Option<VirtualMachine>> {
        Ok(self.vm(uuid))
    }

    async fn find_network(&self, location: &str, name: &str) -> VcResult<Option<Network>> {
        Ok(self.network(location, name))
    }

    async fn reconfigure_vm(
        &self,
        vm_uuid: &str,
        changes: Vec<DeviceChange>,
    ) -> VcResult<TaskHandle> {
        let mut state = self.lock();
        if !state.inventory.vms.iter().any(|vm| vm.uuid == vm_uuid) {
            return Err(VcError::VmNotFound {
                uuid: vm_uuid.to_string(),
            });
        }
        state.reconfigure_count += 1;

        let running = state.in_flight.entry(vm_uuid.to_string()).or_insert(0);
        *running += 1;
        let overlaps = *running > 1;
        if overlaps {
            state.overlapping += 1;
        }
        let total: usize = state.in_flight.values().sum();
        state.max_in_flight = state.max_in_flight.max(total);

        let handle = self.submit(
            &mut state,
            Operation::Reconfigure {
                vm_uuid: vm_uuid.to_string(),
                changes,
            },
        );
        debug!("Submitted {} reconfiguring VM {}", handle, vm_uuid);
        Ok(handle)
    }

    async fn create_dv_port_group(&self, spec: &PortGroupSpec) -> VcResult<TaskHandle> {
        let mut state = self.lock();
        Ok(self.submit(&mut state, Operation::CreatePortGroup(spec.clone())))
    }

    async fn destroy_port_group(&self, network: &Network) -> VcResult<TaskHandle> {
        let mut state = self.lock();
        Ok(self.submit(&mut state, Operation::DestroyPortGroup(network.clone())))
    }

    fn tasks(&self) -> &dyn TaskSource {
        self
    }
}

#[async_trait]
impl TaskSource for InMemoryVCenter {
    async fn task_info(&self, task: &TaskHandle) -> VcResult<TaskInfo> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(entry) = state.tasks.get_mut(task) else {
            return Err(VcError::api("task_info", format!("unknown task {}", task)));
        };

        if entry.remaining_polls > 0 {
            entry.remaining_polls -= 1;
        } else if let Some(operation) = entry.operation.take() {
            let outcome = self.complete(state, operation);
            if let Some(entry) = state.tasks.get_mut(task) {
                entry.state = outcome;
            }
        }

        // A terminal state is reported once, then the task is forgotten.
        let done = state.tasks.get(task).map_or(true, |entry| entry.state.is_done());
        let state = if done {
            state.tasks.remove(task).map_or(TaskState::Success, |entry| entry.state)
        } else {
            state.tasks.get(task).map_or(TaskState::Running, |entry| entry.state.clone())
        };
        Ok(TaskInfo {
            task: task.clone(),
            state,
            result: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{port_group, test_inventory, VM_UUID};

    #[tokio::test]
    async fn test_task_runs_for_configured_polls() {
        let sim = InMemoryVCenter::new(test_inventory()).with_running_polls(2);
        let task = sim.reconfigure_vm(VM_UUID, Vec::new()).await.unwrap();

        assert_eq!(sim.task_info(&task).await.unwrap().state, TaskState::Running);
        assert_eq!(sim.task_info(&task).await.unwrap().state, TaskState::Running);
        assert_eq!(sim.task_info(&task).await.unwrap().state, TaskState::Success);
        assert_eq!(sim.max_concurrent_reconfigurations(), 1);
    }

    #[tokio::test]
    async fn test_finished_tasks_are_forgotten() {
        let sim = InMemoryVCenter::new(test_inventory()).with_running_polls(1);
        let task = sim.reconfigure_vm(VM_UUID, Vec::new()).await.unwrap();
        assert_eq!(sim.pending_tasks(), 1);

        assert_eq!(sim.task_info(&task).await.unwrap().state, TaskState::Running);
        assert_eq!(sim.pending_tasks(), 1);
        assert_eq!(sim.task_info(&task).await.unwrap().state, TaskState::Success);
        assert_eq!(sim.pending_tasks(), 0);
        assert!(sim.task_info(&task).await.is_err());
    }

    #[tokio::test]
    async fn test_overlapping_reconfigurations_are_counted() {
        let sim = InMemoryVCenter::new(test_inventory()).with_running_polls(1);
        let first = sim.reconfigure_vm(VM_UUID, Vec::new()).await.unwrap();
        let second = sim.reconfigure_vm(VM_UUID, Vec::new()).await.unwrap();

        assert_eq!(sim.overlapping_reconfigurations(), 1);
        for task in [first, second] {
            while !sim.task_info(&task).await.unwrap().state.is_done() {}
        }
        assert_eq!(sim.max_concurrent_reconfigurations(), 2);
    }

    #[tokio::test]
    async fn test_destroy_in_use_port_group_faults() {
        let sim = InMemoryVCenter::new(test_inventory());
        let vm = sim.vm(VM_UUID).unwrap();
        let pg = port_group("QS_dvSwitch_VLAN_7_Access", "dvportgroup-7");
        let change = VnicService::new().compose_edit_spec(&vm.nics[0], Some(&pg), true);
        let task = sim.reconfigure_vm(VM_UUID, vec![change]).await.unwrap();
        sim.task_info(&task).await.unwrap();
        assert_eq!(sim.vm(VM_UUID).unwrap().networks.len(), 2);

        let task = sim.destroy_port_group(&pg).await.unwrap();
        let info = sim.task_info(&task).await.unwrap();
        assert!(matches!(
            info.state,
            TaskState::Error(Fault {
                kind: FaultKind::ResourceInUse,
                ..
            })
        ));
    }

    #[test]
    fn test_inventory_from_json() {
        let inventory = Inventory::from_json(
            r#"{
                "switches": [{"path": "QualiSB", "name": "dvSwitch", "uuid": "dvs-1"}],
                "networks": [{"name": "Anetwork", "location": "QualiSB", "kind": {"type": "standard"}}]
            }"#,
        )
        .unwrap();
        assert_eq!(inventory.switches.len(), 1);
        assert_eq!(inventory.networks[0].kind, NetworkKind::Standard);
        assert!(inventory.vms.is_empty());
    }
}
