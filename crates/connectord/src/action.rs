//! Driver request decoding and action results.
//!
//! Requests arrive as JSON:
//!
//! ```text
//! {"driverRequest": {"actions": [{
//!     "actionId": "...",
//!     "type": "setVlan",
//!     "connectionParams": {"mode": "Access", "vlanIds": ["100"]},
//!     "connectorAttributes": [{"attributeName": "Interface", "attributeValue": "00:50:56:..."}],
//!     "customActionAttributes": [{"attributeName": "VM_UUID", "attributeValue": "..."}]
//! }]}}
//! ```
//!
//! Decoding turns every raw action into a typed [`ConnectionAction`] and
//! rejects the whole request on the first invalid action.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use vcshell_network::{ConnectionResult, VlanMode};

use crate::error::{ConnectError, ConnectResult};

/// Custom attribute carrying the VM uuid.
pub const VM_UUID_ATTRIBUTE: &str = "VM_UUID";

/// Custom attribute naming the vNIC to use.
pub const VNIC_NAME_ATTRIBUTE: &str = "Vnic Name";

/// Connector attribute carrying the MAC address of a connected vNIC.
pub const INTERFACE_ATTRIBUTE: &str = "Interface";

/// Info message of successful results.
pub const SUCCESS_MESSAGE: &str = "VLAN successfully set";

/// Name/value attribute of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    /// Attribute name.
    pub attribute_name: String,
    /// Attribute value.
    pub attribute_value: String,
}

impl Attribute {
    /// Creates a new attribute.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute_name: name.into(),
            attribute_value: value.into(),
        }
    }
}

/// Helper trait for attribute lists.
pub trait AttributesExt {
    /// Gets the first value of an attribute, if present.
    fn get_attribute(&self, name: &str) -> Option<&str>;

    /// Gets every value of an attribute, in order.
    fn attribute_values(&self, name: &str) -> Vec<&str>;
}

impl AttributesExt for [Attribute] {
    fn get_attribute(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|a| a.attribute_name == name)
            .map(|a| a.attribute_value.as_str())
    }

    fn attribute_values(&self, name: &str) -> Vec<&str> {
        self.iter()
            .filter(|a| a.attribute_name == name)
            .map(|a| a.attribute_value.as_str())
            .collect()
    }
}

/// Top level request envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverRequestEnvelope {
    /// The request.
    pub driver_request: DriverRequest,
}

/// A batch of raw actions.
#[derive(Debug, Clone, Deserialize)]
pub struct DriverRequest {
    /// Actions in request order.
    #[serde(default)]
    pub actions: Vec<RawAction>,
}

/// A VLAN id given either as a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawVlanId {
    /// `100`
    Number(u64),
    /// `"100"` or `"10-20"`
    Text(String),
}

impl fmt::Display for RawVlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawVlanId::Number(id) => write!(f, "{}", id),
            RawVlanId::Text(id) => f.write_str(id.trim()),
        }
    }
}

/// Raw connection parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConnectionParams {
    /// VLAN mode (`Access` or `Trunk`).
    pub mode: String,
    /// Requested VLAN ids.
    #[serde(default)]
    pub vlan_ids: Vec<RawVlanId>,
}

/// An action as found in the request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAction {
    /// Action id.
    pub action_id: String,
    /// Action type.
    #[serde(rename = "type")]
    pub action_type: String,
    /// Connection parameters.
    #[serde(default)]
    pub connection_params: Option<RawConnectionParams>,
    /// Attributes of the connector.
    #[serde(default)]
    pub connector_attributes: Vec<Attribute>,
    /// Attributes of the action.
    #[serde(default)]
    pub custom_action_attributes: Vec<Attribute>,
}

/// Connection action types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    /// Connect a VM to VLANs.
    #[serde(rename = "setVlan")]
    SetVlan,
    /// Disconnect vNICs of a VM.
    #[serde(rename = "removeVlan")]
    RemoveVlan,
}

impl ActionType {
    /// Convert to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::SetVlan => "setVlan",
            ActionType::RemoveVlan => "removeVlan",
        }
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "setVlan" => Ok(ActionType::SetVlan),
            "removeVlan" => Ok(ActionType::RemoveVlan),
            _ => Err(format!("Unknown action type: {}", s)),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// VLAN mode.
    pub mode: VlanMode,
    /// Requested VLAN ids, duplicates preserved.
    pub vlan_ids: Vec<String>,
}

/// A decoded connection action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionAction {
    /// Action id (synthetic for combined actions).
    pub action_id: String,
    /// Action type.
    pub action_type: ActionType,
    /// Target VM uuid.
    pub vm_uuid: String,
    /// Connection parameters.
    pub params: ConnectionParams,
    /// Explicit vNIC, if requested.
    pub vnic_name: Option<String>,
    /// MAC addresses to disconnect (`removeVlan`).
    pub interfaces: Vec<String>,
}

impl TryFrom<RawAction> for ConnectionAction {
    type Error = ConnectError;

    fn try_from(raw: RawAction) -> Result<Self, Self::Error> {
        let action_type: ActionType =
            raw.action_type
                .parse()
                .map_err(|_| ConnectError::UnsupportedActionType {
                    action_id: raw.action_id.clone(),
                    action_type: raw.action_type.clone(),
                })?;

        let vm_uuid = raw
            .custom_action_attributes
            .get_attribute(VM_UUID_ATTRIBUTE)
            .map(str::trim)
            .filter(|uuid| !uuid.is_empty())
            .ok_or_else(|| ConnectError::MissingVmUuid {
                action_id: raw.action_id.clone(),
            })?
            .to_string();

        let params = match (&raw.connection_params, action_type) {
            (Some(params), _) => ConnectionParams {
                mode: params
                    .mode
                    .parse()
                    .map_err(|e: vcshell_common::VcError| {
                        ConnectError::invalid_action(&raw.action_id, e.to_string())
                    })?,
                vlan_ids: params.vlan_ids.iter().map(ToString::to_string).collect(),
            },
            (None, ActionType::RemoveVlan) => ConnectionParams {
                mode: VlanMode::Access,
                vlan_ids: Vec::new(),
            },
            (None, ActionType::SetVlan) => {
                return Err(ConnectError::invalid_action(
                    &raw.action_id,
                    "connectionParams are missing",
                ));
            }
        };

        if action_type == ActionType::SetVlan && params.vlan_ids.is_empty() {
            return Err(ConnectError::invalid_action(&raw.action_id, "vlanIds are empty"));
        }

        let interfaces: Vec<String> = raw
            .connector_attributes
            .attribute_values(INTERFACE_ATTRIBUTE)
            .into_iter()
            .map(str::to_string)
            .collect();
        if action_type == ActionType::RemoveVlan && interfaces.is_empty() {
            return Err(ConnectError::MissingInterface {
                action_id: raw.action_id,
            });
        }

        let vnic_name = raw
            .custom_action_attributes
            .get_attribute(VNIC_NAME_ATTRIBUTE)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        Ok(Self {
            action_id: raw.action_id,
            action_type,
            vm_uuid,
            params,
            vnic_name,
            interfaces,
        })
    }
}

/// Decodes a JSON driver request into typed actions.
pub fn decode_request(request: &str) -> ConnectResult<Vec<ConnectionAction>> {
    let envelope: DriverRequestEnvelope = serde_json::from_str(request)?;
    envelope
        .driver_request
        .actions
        .into_iter()
        .map(ConnectionAction::try_from)
        .collect()
}

/// Outcome of one action, as returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    /// Action id.
    pub action_id: String,
    /// Action type.
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// True if the action succeeded.
    pub success: bool,
    /// Info message.
    pub info_message: String,
    /// Error message, empty on success.
    pub error_message: String,
    /// MAC address of the vNIC that changed.
    pub updated_interface: Option<String>,
    /// Network the vNIC was connected to (or left).
    pub network_name: Option<String>,
}

impl ActionResult {
    /// Creates a successful result for `action`.
    pub fn success(action: &ConnectionAction, connection: &ConnectionResult) -> Self {
        Self {
            action_id: action.action_id.clone(),
            action_type: action.action_type,
            success: true,
            info_message: SUCCESS_MESSAGE.to_string(),
            error_message: String::new(),
            updated_interface: Some(connection.mac_address.clone()),
            network_name: connection.network_name.clone(),
        }
    }

    /// Creates a failed result for `action`.
    pub fn failure(action: &ConnectionAction, error_message: impl Into<String>) -> Self {
        Self {
            action_id: action.action_id.clone(),
            action_type: action.action_type,
            success: false,
            info_message: String::new(),
            error_message: error_message.into(),
            updated_interface: None,
            network_name: None,
        }
    }

    /// Copy of this result attributed to `action_id`.
    pub fn for_action(&self, action_id: &str) -> Self {
        Self {
            action_id: action_id.to_string(),
            ..self.clone()
        }
    }
}
