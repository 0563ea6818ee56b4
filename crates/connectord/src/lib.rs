//! Bulk VLAN connection orchestration for vCenter virtual machines.
//!
//! [`ConnectionCommandOrchestrator`] takes a driver request made of
//! `setVlan` / `removeVlan` actions, merges the actions targeting the same VM,
//! runs the merged actions on a bounded worker pool and returns one
//! [`ActionResult`] per requested action outcome.

mod action;
mod combine;
mod config;
mod decombine;
mod error;
mod orchestrator;

pub use action::{
    decode_request, ActionResult, ActionType, Attribute, AttributesExt, ConnectionAction,
    ConnectionParams, DriverRequest, DriverRequestEnvelope, RawAction, RawConnectionParams,
    RawVlanId, INTERFACE_ATTRIBUTE, SUCCESS_MESSAGE, VM_UUID_ATTRIBUTE, VNIC_NAME_ATTRIBUTE,
};
pub use combine::{group_actions, ActionGroup, ActionGroups, GroupKey};
pub use config::{ConnectConfig, DvSwitchPath, DEFAULT_TASK_POLL_INTERVAL_MS};
pub use decombine::decombine_results;
pub use error::{ConnectError, ConnectResult};
pub use orchestrator::ConnectionCommandOrchestrator;
