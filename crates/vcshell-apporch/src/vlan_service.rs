//! VLAN service driver.
//!
//! Connects every resource visually linked to a VLAN service to that VLAN by
//! running its `Connect` command.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::api::{InputNameValue, SandboxApi};
use crate::error::{ApiError, ApiResult};

/// Command run on every connected resource.
pub const CONNECT_COMMAND: &str = "Connect";

/// Resource attribute holding the VLAN id.
pub const VLAN_ID_ATTRIBUTE: &str = "VLAN Id";

/// Resource attribute holding the VLAN mode.
pub const ACCESS_MODE_ATTRIBUTE: &str = "Access Mode";

/// A VLAN service resource of a reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlanServiceContext {
    /// Reservation id.
    pub reservation_id: String,
    /// VLAN service resource name.
    pub resource_name: String,
    /// VLAN id.
    pub vlan_id: String,
    /// VLAN mode (`Access` or `Trunk`).
    pub access_mode: String,
}

impl VlanServiceContext {
    /// Builds a context from the resource attributes.
    pub fn from_attributes<'a>(
        reservation_id: impl Into<String>,
        resource_name: impl Into<String>,
        attributes: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> ApiResult<Self> {
        let resource_name = resource_name.into();
        let mut vlan_id = None;
        let mut access_mode = None;
        for (name, value) in attributes {
            match name {
                VLAN_ID_ATTRIBUTE => vlan_id = Some(value.to_string()),
                ACCESS_MODE_ATTRIBUTE => access_mode = Some(value.to_string()),
                _ => {}
            }
        }
        let missing = |attribute: &str| ApiError::MissingAttribute {
            resource: resource_name.clone(),
            attribute: attribute.to_string(),
        };
        Ok(Self {
            reservation_id: reservation_id.into(),
            vlan_id: vlan_id.ok_or_else(|| missing(VLAN_ID_ATTRIBUTE))?,
            access_mode: access_mode.ok_or_else(|| missing(ACCESS_MODE_ATTRIBUTE))?,
            resource_name,
        })
    }
}

/// Connects the endpoints of a VLAN service.
pub struct VlanServiceDriver {
    api: Arc<dyn SandboxApi>,
}

impl VlanServiceDriver {
    /// Creates a new driver.
    pub fn new(api: Arc<dyn SandboxApi>) -> Self {
        Self { api }
    }

    /// Runs `Connect` on every resource linked to the service and returns
    /// how many were connected.
    #[instrument(skip_all, fields(service = %context.resource_name))]
    pub async fn connect(&self, context: &VlanServiceContext) -> ApiResult<usize> {
        let connectors = self
            .api
            .reservation_connectors(&context.reservation_id)
            .await?;

        let mut connected = 0;
        for connector in &connectors {
            let Some(endpoint) = connector.other_end(&context.resource_name) else {
                continue;
            };
            info!("Connecting {} to VLAN {}", endpoint, context.vlan_id);
            self.api
                .execute_command(
                    &context.reservation_id,
                    endpoint,
                    "Resource",
                    CONNECT_COMMAND,
                    vec![
                        InputNameValue::new("COMMAND", "connect"),
                        InputNameValue::new("VLAN_ID", context.vlan_id.as_str()),
                        InputNameValue::new("VLAN_SPEC_TYPE", context.access_mode.as_str()),
                    ],
                )
                .await?;
            connected += 1;
        }

        if connected == 0 {
            return Err(ApiError::NoVisualConnectors {
                resource: context.resource_name.clone(),
            });
        }
        Ok(connected)
    }
}
