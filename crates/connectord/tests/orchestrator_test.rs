//! Integration tests for bulk connection requests
//!
//! These tests drive the orchestrator end to end against the in-memory
//! vCenter: decoding, grouping, parallel execution, and result attribution.

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use vcshell_common::{Fault, FaultKind};
use vcshell_connectord::{ActionResult, ConnectConfig, ConnectError, ConnectionCommandOrchestrator};
use vcshell_network::{
    DvSwitch, InMemoryVCenter, Inventory, Network, NetworkKind, NicBacking, VirtualMachine,
    VirtualNic,
};

const VM_A: &str = "4213a1b2-aaaa-0000-0000-000000000001";
const VM_B: &str = "4213a1b2-bbbb-0000-0000-000000000002";
const VM_C: &str = "4213a1b2-cccc-0000-0000-000000000003";

fn vm(uuid: &str, index: u8) -> VirtualMachine {
    VirtualMachine {
        uuid: uuid.to_string(),
        name: format!("app-{}", index),
        nics: (1..=2)
            .map(|i| VirtualNic {
                label: format!("Network adapter {}", i),
                key: 4000 + i,
                mac_address: format!("00:50:56:0{}:00:0{}", index, i),
                backing: Some(NicBacking::Network {
                    network_name: "Anetwork".to_string(),
                }),
                connected: false,
                start_connected: false,
            })
            .collect(),
        networks: Vec::new(),
    }
}

fn inventory() -> Inventory {
    Inventory {
        switches: vec![DvSwitch {
            path: "QualiSB".to_string(),
            name: "dvSwitch".to_string(),
            uuid: "50 2a 9f 11".to_string(),
        }],
        networks: vec![Network {
            name: "Anetwork".to_string(),
            location: "QualiSB".to_string(),
            kind: NetworkKind::Standard,
        }],
        vms: vec![vm(VM_A, 1), vm(VM_B, 2), vm(VM_C, 3)],
    }
}

fn config() -> ConnectConfig {
    ConnectConfig {
        default_dvswitch: "QualiSB\\dvSwitch".to_string(),
        default_port_group_location: "QualiSB".to_string(),
        holding_network: "QualiSB/Anetwork".to_string(),
        max_parallelism: 4,
        task_poll_interval_ms: 1,
    }
}

fn orchestrator(sim: &Arc<InMemoryVCenter>) -> ConnectionCommandOrchestrator {
    ConnectionCommandOrchestrator::from_api(config(), sim.clone())
}

fn set_vlan(id: &str, vm: &str, mode: &str, vlans: &[&str]) -> serde_json::Value {
    json!({
        "actionId": id,
        "type": "setVlan",
        "connectionParams": {"mode": mode, "vlanIds": vlans},
        "connectorAttributes": [],
        "customActionAttributes": [{"attributeName": "VM_UUID", "attributeValue": vm}]
    })
}

fn remove_vlan(id: &str, vm: &str, mac: &str) -> serde_json::Value {
    json!({
        "actionId": id,
        "type": "removeVlan",
        "connectionParams": {"mode": "Access", "vlanIds": []},
        "connectorAttributes": [{"attributeName": "Interface", "attributeValue": mac}],
        "customActionAttributes": [{"attributeName": "VM_UUID", "attributeValue": vm}]
    })
}

fn request(actions: Vec<serde_json::Value>) -> String {
    json!({"driverRequest": {"actions": actions}}).to_string()
}

fn by_id(mut results: Vec<ActionResult>) -> Vec<ActionResult> {
    results.sort_by(|a, b| a.action_id.cmp(&b.action_id));
    results
}

#[tokio::test]
async fn test_set_vlan_on_several_vms() {
    let sim = Arc::new(InMemoryVCenter::new(inventory()));

    let results = orchestrator(&sim)
        .connect_bulk(&request(vec![
            set_vlan("a1", VM_A, "Access", &["10"]),
            set_vlan("b1", VM_B, "Access", &["20"]),
        ]))
        .await
        .unwrap();

    let results = by_id(results);
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success));
    assert_eq!(results[0].action_id, "a1");
    assert_eq!(
        results[0].network_name.as_deref(),
        Some("QS_dvSwitch_VLAN_10_Access")
    );
    assert_eq!(results[0].updated_interface.as_deref(), Some("00:50:56:01:00:01"));
    assert_eq!(results[0].info_message, "VLAN successfully set");
    assert_eq!(
        results[1].network_name.as_deref(),
        Some("QS_dvSwitch_VLAN_20_Access")
    );
    assert_eq!(sim.port_groups_created(), 2);
}

#[tokio::test]
async fn test_actions_on_same_vm_share_one_reconfiguration() {
    let sim = Arc::new(InMemoryVCenter::new(inventory()));

    let results = orchestrator(&sim)
        .connect_bulk(&request(vec![
            set_vlan("a7", VM_A, "Access", &["7"]),
            set_vlan("a9", VM_A, "Access", &["9"]),
        ]))
        .await
        .unwrap();

    let results = by_id(results);
    let networks: Vec<_> = results
        .iter()
        .map(|r| (r.action_id.as_str(), r.network_name.as_deref()))
        .collect();
    assert_eq!(
        networks,
        vec![
            ("a7", Some("QS_dvSwitch_VLAN_7_Access")),
            ("a9", Some("QS_dvSwitch_VLAN_9_Access")),
        ]
    );
    assert_eq!(sim.reconfigure_count(), 1);
}

#[tokio::test]
async fn test_trunk_mode() {
    let sim = Arc::new(InMemoryVCenter::new(inventory()));

    let results = orchestrator(&sim)
        .connect_bulk(&request(vec![set_vlan("t1", VM_A, "Trunk", &["10-20"])]))
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].success);
    assert_eq!(
        results[0].network_name.as_deref(),
        Some("QS_dvSwitch_VLAN_10-20_Trunk")
    );
}

#[tokio::test]
async fn test_remove_vlan_fans_out_to_every_matching_action() {
    let sim = Arc::new(InMemoryVCenter::new(inventory()));
    let orchestrator = orchestrator(&sim);
    orchestrator
        .connect_bulk(&request(vec![set_vlan("a1", VM_A, "Access", &["10"])]))
        .await
        .unwrap();

    let results = orchestrator
        .connect_bulk(&request(vec![
            remove_vlan("r1", VM_A, "00:50:56:01:00:01"),
            remove_vlan("r2", VM_A, "00:50:56:01:00:01"),
        ]))
        .await
        .unwrap();

    let results = by_id(results);
    let ids: Vec<_> = results.iter().map(|r| r.action_id.as_str()).collect();
    assert_eq!(ids, vec!["r1", "r2"]);
    assert!(results.iter().all(|r| r.success));
    assert!(sim.network("QualiSB", "QS_dvSwitch_VLAN_10_Access").is_none());
    assert!(!sim.vm(VM_A).unwrap().nics[0].connected);
}

#[tokio::test]
async fn test_failure_is_reported_for_every_member() {
    let sim = Arc::new(InMemoryVCenter::new(inventory()));
    sim.fail_reconfigure(VM_A, Fault::new(FaultKind::InvalidState, "VM is locked"));

    let results = orchestrator(&sim)
        .connect_bulk(&request(vec![
            set_vlan("a7", VM_A, "Access", &["7"]),
            set_vlan("a9", VM_A, "Access", &["9"]),
            set_vlan("b1", VM_B, "Access", &["7"]),
        ]))
        .await
        .unwrap();

    let results = by_id(results);
    assert_eq!(results.len(), 3);
    for failed in &results[..2] {
        assert!(!failed.success);
        assert!(failed.error_message.contains("Task 'Reconfigure VM' failed"));
        assert!(failed.error_message.contains("VM is locked"));
        assert_eq!(failed.updated_interface, None);
    }
    assert_eq!(results[2].action_id, "b1");
    assert!(results[2].success);
}

#[tokio::test]
async fn test_unknown_vm_fails_only_its_actions() {
    let sim = Arc::new(InMemoryVCenter::new(inventory()));

    let results = orchestrator(&sim)
        .connect_bulk(&request(vec![
            set_vlan("x1", "no-such-vm", "Access", &["7"]),
            set_vlan("a1", VM_A, "Access", &["7"]),
        ]))
        .await
        .unwrap();

    let results = by_id(results);
    assert!(results[0].success);
    assert_eq!(results[1].action_id, "x1");
    assert!(!results[1].success);
    assert_eq!(results[1].error_message, "VM having UUID no-such-vm not found");
}

#[tokio::test]
async fn test_malformed_dvswitch_fails_before_dispatch() {
    let sim = Arc::new(InMemoryVCenter::new(inventory()));
    let mut config = config();
    config.default_dvswitch = "dvSwitch".to_string();
    let orchestrator = ConnectionCommandOrchestrator::from_api(config, sim.clone());

    let err = orchestrator
        .connect_bulk(&request(vec![set_vlan("a1", VM_A, "Access", &["7"])]))
        .await
        .unwrap_err();

    assert!(matches!(err, ConnectError::InvalidConfig { .. }));
    assert_eq!(sim.reconfigure_count(), 0);
    assert_eq!(sim.port_groups_created(), 0);
}

#[tokio::test]
async fn test_invalid_request_aborts_batch() {
    let sim = Arc::new(InMemoryVCenter::new(inventory()));
    let orchestrator = orchestrator(&sim);

    let missing_interface = json!({
        "actionId": "r1",
        "type": "removeVlan",
        "connectionParams": {"mode": "Access", "vlanIds": []},
        "connectorAttributes": [],
        "customActionAttributes": [{"attributeName": "VM_UUID", "attributeValue": VM_A}]
    });
    let err = orchestrator
        .connect_bulk(&request(vec![
            set_vlan("a1", VM_A, "Access", &["7"]),
            missing_interface,
        ]))
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectError::MissingInterface { .. }));

    let err = orchestrator.connect_bulk("not json").await.unwrap_err();
    assert!(matches!(err, ConnectError::Decode(_)));
    assert_eq!(sim.reconfigure_count(), 0);
}

#[tokio::test]
async fn test_no_concurrent_reconfiguration_of_one_vm() {
    let sim = Arc::new(InMemoryVCenter::new(inventory()).with_running_polls(5));

    let results = orchestrator(&sim)
        .connect_bulk(&request(vec![
            set_vlan("a1", VM_A, "Access", &["10"]),
            set_vlan("a2", VM_A, "Trunk", &["20-30"]),
            set_vlan("b1", VM_B, "Access", &["11"]),
            set_vlan("c1", VM_C, "Access", &["12"]),
        ]))
        .await
        .unwrap();

    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.success));
    assert_eq!(sim.reconfigure_count(), 4);
    assert_eq!(sim.overlapping_reconfigurations(), 0);
    assert!(sim.max_concurrent_reconfigurations() >= 2);
}

#[tokio::test]
async fn test_cancelled_request_reports_failures() {
    let sim = Arc::new(InMemoryVCenter::new(inventory()));
    let orchestrator = orchestrator(&sim);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let results = orchestrator
        .connect_bulk_with_cancel(
            &request(vec![
                set_vlan("a1", VM_A, "Access", &["7"]),
                set_vlan("a2", VM_A, "Access", &["9"]),
            ]),
            cancel,
        )
        .await
        .unwrap();

    let results = by_id(results);
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| !r.success));
    assert_eq!(results[0].error_message, "Action did not complete: task was cancelled");
    assert_eq!(sim.reconfigure_count(), 0);
}

#[tokio::test]
async fn test_request_after_cancelled_request_runs() {
    let sim = Arc::new(InMemoryVCenter::new(inventory()));
    let orchestrator = orchestrator(&sim);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let cancelled = orchestrator
        .connect_bulk_with_cancel(&request(vec![set_vlan("a1", VM_A, "Access", &["7"])]), cancel)
        .await
        .unwrap();
    assert!(cancelled.iter().all(|r| !r.success));

    let results = orchestrator
        .connect_bulk(&request(vec![set_vlan("a2", VM_A, "Access", &["9"])]))
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].action_id, "a2");
    assert!(results[0].success, "{}", results[0].error_message);
    assert_eq!(sim.reconfigure_count(), 1);
}
