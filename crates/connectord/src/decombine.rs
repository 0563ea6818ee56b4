//! Mapping combined action results back onto the requested actions.

use tracing::warn;

use vcshell_network::vlan_marker;

use crate::action::{ActionResult, ActionType, ConnectionAction};
use crate::combine::ActionGroups;

/// Expands every result of a combined action into per-member results.
///
/// A `setVlan` success is attributed to the first member whose VLAN appears
/// in the network name; `removeVlan` successes go to every member listing
/// the updated interface. Failures are copied to every member. Results of
/// unknown combined actions are dropped.
pub fn decombine_results(results: &[ActionResult], groups: &ActionGroups) -> Vec<ActionResult> {
    let mut decombined = Vec::with_capacity(results.len());
    for result in results {
        let Some(group) = groups.get(&result.action_id) else {
            warn!("Result for unknown combined action {}", result.action_id);
            continue;
        };

        if !result.success {
            decombined.extend(group.members.iter().map(|m| result.for_action(&m.action_id)));
            continue;
        }

        match group.key.action_type {
            ActionType::SetVlan => {
                let mut matching = group
                    .members
                    .iter()
                    .filter(|member| set_vlan_matches(member, result));
                if let Some(member) = matching.next() {
                    decombined.push(result.for_action(&member.action_id));
                }
                for dropped in matching {
                    warn!(
                        "Action {} also matches network {:?}, result attributed to another action only",
                        dropped.action_id, result.network_name
                    );
                }
            }
            ActionType::RemoveVlan => decombined.extend(
                group
                    .members
                    .iter()
                    .filter(|member| remove_vlan_matches(member, result))
                    .map(|member| result.for_action(&member.action_id)),
            ),
        }
    }
    decombined
}

fn set_vlan_matches(member: &ConnectionAction, result: &ActionResult) -> bool {
    let Some(network_name) = &result.network_name else {
        return false;
    };
    member
        .params
        .vlan_ids
        .iter()
        .any(|vlan_id| network_name.contains(&vlan_marker(vlan_id)))
}

fn remove_vlan_matches(member: &ConnectionAction, result: &ActionResult) -> bool {
    let Some(mac) = &result.updated_interface else {
        return false;
    };
    member
        .interfaces
        .iter()
        .any(|interface| interface.trim().eq_ignore_ascii_case(mac))
}
