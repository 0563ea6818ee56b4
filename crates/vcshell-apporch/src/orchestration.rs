//! App orchestration driver.
//!
//! Deploys an app and brings it up: connect routes, power on, refresh IP,
//! optional installation script, then live status.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use crate::api::{DeployResult, InputNameValue, SandboxApi};
use crate::error::ApiResult;

/// Live status set once the app is deployed.
pub const LIVE_STATUS_ONLINE: &str = "Online";

/// Description of the live status set once the app is deployed.
pub const LIVE_STATUS_DESCRIPTION: &str = "Active";

/// Route mapping used to connect the app.
pub const ROUTE_MAPPING_BIDIRECTIONAL: &str = "bi";

/// Named service of an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentService {
    /// Service name.
    pub name: String,
}

/// Installation service of an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationService {
    /// Service name.
    pub name: String,
    /// Script command to run.
    pub script_command_name: String,
    /// Script inputs.
    #[serde(default)]
    pub script_inputs: Vec<InputNameValue>,
}

/// App data of the resource context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    /// Deployment service.
    pub deployment_service: DeploymentService,
    /// Installation service, if the app has one.
    #[serde(default)]
    pub installation_service: Option<InstallationService>,
}

/// Resource context of an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppResourceDetails {
    /// App name.
    pub name: String,
    /// App data.
    pub app_data: AppData,
}

/// Everything needed to orchestrate one app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppContext {
    /// Reservation id.
    pub reservation_id: String,
    /// App resource details.
    pub resource: AppResourceDetails,
}

impl AppContext {
    /// Builds a context from the resource details JSON.
    pub fn from_json(reservation_id: impl Into<String>, resource_details: &str) -> ApiResult<Self> {
        Ok(Self {
            reservation_id: reservation_id.into(),
            resource: serde_json::from_str(resource_details)?,
        })
    }
}

/// Drives the deployment of one app.
pub struct AppOrchestrationDriver {
    api: Arc<dyn SandboxApi>,
}

impl AppOrchestrationDriver {
    /// Creates a new driver.
    pub fn new(api: Arc<dyn SandboxApi>) -> Self {
        Self { api }
    }

    /// Deploys the app and brings it online.
    #[instrument(skip_all, fields(app = %context.resource.name))]
    pub async fn execute_app_orchestration(&self, context: &AppContext) -> ApiResult<DeployResult> {
        let reservation_id = &context.reservation_id;
        let app_name = &context.resource.name;
        let app_data = &context.resource.app_data;

        let deployment = self
            .deploy_app(reservation_id, app_name, &app_data.deployment_service.name)
            .await?;
        self.connect_routes_on_deployed_app(reservation_id, &deployment.logical_resource_name)
            .await?;
        self.power_on_deployed_app(reservation_id, app_name, &deployment)
            .await?;
        self.refresh_ip(reservation_id, &deployment).await?;
        self.execute_installation_if_exist(
            reservation_id,
            &deployment,
            app_data.installation_service.as_ref(),
        )
        .await?;

        self.api
            .set_resource_live_status(
                &deployment.logical_resource_name,
                LIVE_STATUS_ONLINE,
                LIVE_STATUS_DESCRIPTION,
            )
            .await?;
        info!("Deployed {} Successfully", app_name);
        Ok(deployment)
    }

    async fn deploy_app(
        &self,
        reservation_id: &str,
        app_name: &str,
        deployment_service: &str,
    ) -> ApiResult<DeployResult> {
        info!("Executing '{}' on app '{}'...", deployment_service, app_name);
        self.api
            .execute_deploy_app_command(
                reservation_id,
                app_name,
                vec![InputNameValue::new("Name", app_name)],
            )
            .await
            .inspect_err(|e| error!("Error deploying app {}. Error: {}", app_name, e))
    }

    /// Connects every route touching `resource_name`.
    pub async fn connect_routes_on_deployed_app(
        &self,
        reservation_id: &str,
        resource_name: &str,
    ) -> ApiResult<()> {
        let connectors = self
            .api
            .reservation_connectors(reservation_id)
            .await
            .inspect_err(|e| error!("Error executing connect all. Error: {}", e))?;

        let endpoints: Vec<String> = connectors
            .iter()
            .filter(|c| c.other_end(resource_name).is_some())
            .flat_map(|c| [c.target.clone(), c.source.clone()])
            .collect();
        if endpoints.is_empty() {
            info!("No routes to connect for app {}", resource_name);
            return Ok(());
        }

        info!("Executing connect for app {}", resource_name);
        self.api
            .connect_routes_in_reservation(reservation_id, endpoints, ROUTE_MAPPING_BIDIRECTIONAL)
            .await
            .inspect_err(|e| error!("Error executing connect all. Error: {}", e))
    }

    async fn power_on_deployed_app(
        &self,
        reservation_id: &str,
        app_name: &str,
        deployment: &DeployResult,
    ) -> ApiResult<()> {
        info!("Powering on deployed app {}", deployment.logical_resource_name);
        debug!(
            "Powering on deployed app {}. VM UUID: {}",
            deployment.logical_resource_name, deployment.vm_uuid
        );
        self.api
            .execute_resource_connected_command(
                reservation_id,
                &deployment.logical_resource_name,
                "PowerOn",
                "power",
            )
            .await
            .inspect_err(|e| error!("Error powering on deployed app {}. Error: {}", app_name, e))
    }

    async fn refresh_ip(&self, reservation_id: &str, deployment: &DeployResult) -> ApiResult<()> {
        let resource = &deployment.logical_resource_name;
        info!("Waiting to get IP for deployed app resource {}...", resource);
        self.api
            .execute_resource_connected_command(
                reservation_id,
                resource,
                "remote_refresh_ip",
                "remote_connectivity",
            )
            .await
            .inspect_err(|e| {
                error!("Error refreshing ip for deployed app {}. Error: {}", resource, e)
            })
    }

    async fn execute_installation_if_exist(
        &self,
        reservation_id: &str,
        deployment: &DeployResult,
        installation: Option<&InstallationService>,
    ) -> ApiResult<()> {
        let Some(installation) = installation else {
            return Ok(());
        };
        let resource = &deployment.logical_resource_name;

        info!(
            "Executing installation script '{}' on installation service '{}' under deployed app resource '{}'...",
            installation.script_command_name, installation.name, resource
        );
        let output = self
            .api
            .execute_install_app_command(
                reservation_id,
                resource,
                &installation.script_command_name,
                installation.script_inputs.clone(),
            )
            .await
            .inspect_err(|e| error!("Error installing deployed app {}. Error: {}", resource, e))?;
        debug!("Installation_result: {}", output);
        Ok(())
    }
}
