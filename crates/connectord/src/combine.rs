//! Grouping of actions targeting the same VM.
//!
//! Actions sharing a VM, a VLAN mode and an action type are merged into one
//! combined action so the VM is reconfigured once per group.

use tracing::debug;
use uuid::Uuid;

use vcshell_network::VlanMode;

use crate::action::{ActionType, ConnectionAction};
use crate::error::{ConnectError, ConnectResult};

/// Key shared by every member of a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    /// Target VM uuid.
    pub vm_uuid: String,
    /// VLAN mode.
    pub mode: VlanMode,
    /// Action type.
    pub action_type: ActionType,
}

impl GroupKey {
    /// Key of `action`.
    pub fn of(action: &ConnectionAction) -> ConnectResult<Self> {
        if action.vm_uuid.trim().is_empty() {
            return Err(ConnectError::MissingVmUuid {
                action_id: action.action_id.clone(),
            });
        }
        Ok(Self {
            vm_uuid: action.vm_uuid.clone(),
            mode: action.params.mode,
            action_type: action.action_type,
        })
    }
}

/// Actions merged into one combined action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionGroup {
    /// Synthetic id of the combined action.
    pub id: String,
    /// Group key.
    pub key: GroupKey,
    /// Members in request order.
    pub members: Vec<ConnectionAction>,
}

impl ActionGroup {
    /// Builds the combined action standing in for every member.
    ///
    /// The first member is the representative; VLAN ids and interfaces of the
    /// remaining members are appended, duplicates preserved.
    pub fn combine(&self) -> Option<ConnectionAction> {
        let (first, rest) = self.members.split_first()?;
        let mut combined = first.clone();
        combined.action_id = self.id.clone();
        for member in rest {
            combined
                .params
                .vlan_ids
                .extend(member.params.vlan_ids.iter().cloned());
            if combined.action_type == ActionType::RemoveVlan {
                combined
                    .interfaces
                    .extend(member.interfaces.iter().cloned());
            }
        }
        Some(combined)
    }
}

/// Every group of one request, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionGroups {
    groups: Vec<ActionGroup>,
}

impl ActionGroups {
    /// Returns the group with synthetic id `id`.
    pub fn get(&self, id: &str) -> Option<&ActionGroup> {
        self.groups.iter().find(|group| group.id == id)
    }

    /// Iterates over the groups.
    pub fn iter(&self) -> impl Iterator<Item = &ActionGroup> {
        self.groups.iter()
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns true if there are no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// One combined action per group.
    pub fn combined_actions(&self) -> Vec<ConnectionAction> {
        self.groups.iter().filter_map(ActionGroup::combine).collect()
    }
}

/// Partitions `actions` by (VM, VLAN mode, action type).
pub fn group_actions(actions: Vec<ConnectionAction>) -> ConnectResult<ActionGroups> {
    let mut groups: Vec<ActionGroup> = Vec::new();
    for action in actions {
        let key = GroupKey::of(&action)?;
        match groups.iter_mut().find(|group| group.key == key) {
            Some(group) => group.members.push(action),
            None => groups.push(ActionGroup {
                id: Uuid::new_v4().to_string(),
                key,
                members: vec![action],
            }),
        }
    }
    debug!("Grouped request into {} combined action(s)", groups.len());
    Ok(ActionGroups { groups })
}
