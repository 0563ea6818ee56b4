//! Sandbox API surface and the records it exchanges.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;

/// Name/value input of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputNameValue {
    /// Input name.
    pub name: String,
    /// Input value.
    pub value: String,
}

impl InputNameValue {
    /// Creates a new input.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Visual connector between two reservation resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connector {
    /// Source endpoint.
    pub source: String,
    /// Target endpoint.
    pub target: String,
}

impl Connector {
    /// Returns the opposite endpoint if `resource` is one of the two ends.
    pub fn other_end(&self, resource: &str) -> Option<&str> {
        if self.source == resource {
            Some(self.target.as_str())
        } else if self.target == resource {
            Some(self.source.as_str())
        } else {
            None
        }
    }
}

/// Outcome of an app deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeployResult {
    /// Name of the deployed resource.
    pub logical_resource_name: String,
    /// Uuid of the deployed VM.
    pub vm_uuid: String,
}

/// Operations of the orchestration platform used by the drivers.
#[async_trait]
pub trait SandboxApi: Send + Sync {
    /// Returns the visual connectors of a reservation.
    async fn reservation_connectors(&self, reservation_id: &str) -> ApiResult<Vec<Connector>>;

    /// Deploys an app of the reservation.
    async fn execute_deploy_app_command(
        &self,
        reservation_id: &str,
        app_name: &str,
        inputs: Vec<InputNameValue>,
    ) -> ApiResult<DeployResult>;

    /// Connects the routes between `endpoints`.
    async fn connect_routes_in_reservation(
        &self,
        reservation_id: &str,
        endpoints: Vec<String>,
        mapping_type: &str,
    ) -> ApiResult<()>;

    /// Runs a connected command (tagged `tag`) on a resource.
    async fn execute_resource_connected_command(
        &self,
        reservation_id: &str,
        resource: &str,
        command: &str,
        tag: &str,
    ) -> ApiResult<()>;

    /// Runs the installation script of an app; returns the script output.
    async fn execute_install_app_command(
        &self,
        reservation_id: &str,
        resource: &str,
        command: &str,
        inputs: Vec<InputNameValue>,
    ) -> ApiResult<String>;

    /// Runs a resource command; returns the command output.
    async fn execute_command(
        &self,
        reservation_id: &str,
        target: &str,
        target_type: &str,
        command: &str,
        inputs: Vec<InputNameValue>,
    ) -> ApiResult<String>;

    /// Sets the live status of a resource.
    async fn set_resource_live_status(
        &self,
        resource: &str,
        status: &str,
        description: &str,
    ) -> ApiResult<()>;
}
