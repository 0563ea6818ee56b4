//! Sandbox drivers for vCenter apps.
//!
//! - [`AppOrchestrationDriver`]: Deploys an app and brings it online
//! - [`VlanServiceDriver`]: Connects the resources linked to a VLAN service
//!
//! Both talk to the orchestration platform through [`SandboxApi`].

mod api;
mod error;
mod orchestration;
mod vlan_service;

pub use api::{Connector, DeployResult, InputNameValue, SandboxApi};
pub use error::{ApiError, ApiResult};
pub use orchestration::{
    AppContext, AppData, AppOrchestrationDriver, AppResourceDetails, DeploymentService,
    InstallationService, LIVE_STATUS_DESCRIPTION, LIVE_STATUS_ONLINE, ROUTE_MAPPING_BIDIRECTIONAL,
};
pub use vlan_service::{
    VlanServiceContext, VlanServiceDriver, ACCESS_MODE_ATTRIBUTE, CONNECT_COMMAND,
    VLAN_ID_ATTRIBUTE,
};

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use std::sync::Mutex;

    use super::*;

    /// A sandbox API call as seen by [`RecordingSandbox`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Deploy(String),
        ConnectRoutes(Vec<String>),
        ConnectedCommand(String, String),
        Install(String, String),
        Command(String, String, String),
        LiveStatus(String, String),
    }

    /// Sandbox API recording every call, with optional failing command.
    pub struct RecordingSandbox {
        connectors: Vec<Connector>,
        fail_command: Option<String>,
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingSandbox {
        pub fn new(connectors: Vec<Connector>) -> Self {
            Self {
                connectors,
                fail_command: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing_on(mut self, command: &str) -> Self {
            self.fail_command = Some(command.to_string());
            self
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn check(&self, command: &str) -> ApiResult<()> {
            if self.fail_command.as_deref() == Some(command) {
                return Err(ApiError::api(command, "command failed"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SandboxApi for RecordingSandbox {
        async fn reservation_connectors(&self, _reservation_id: &str) -> ApiResult<Vec<Connector>> {
            Ok(self.connectors.clone())
        }

        async fn execute_deploy_app_command(
            &self,
            _reservation_id: &str,
            app_name: &str,
            _inputs: Vec<InputNameValue>,
        ) -> ApiResult<DeployResult> {
            self.record(Call::Deploy(app_name.to_string()));
            self.check("Deploy")?;
            Ok(DeployResult {
                logical_resource_name: format!("{}_1", app_name),
                vm_uuid: "4213a1b2-0000-0000-0000-000000000001".to_string(),
            })
        }

        async fn connect_routes_in_reservation(
            &self,
            _reservation_id: &str,
            endpoints: Vec<String>,
            _mapping_type: &str,
        ) -> ApiResult<()> {
            self.record(Call::ConnectRoutes(endpoints));
            self.check("ConnectRoutes")
        }

        async fn execute_resource_connected_command(
            &self,
            _reservation_id: &str,
            resource: &str,
            command: &str,
            _tag: &str,
        ) -> ApiResult<()> {
            self.record(Call::ConnectedCommand(resource.to_string(), command.to_string()));
            self.check(command)
        }

        async fn execute_install_app_command(
            &self,
            _reservation_id: &str,
            resource: &str,
            command: &str,
            _inputs: Vec<InputNameValue>,
        ) -> ApiResult<String> {
            self.record(Call::Install(resource.to_string(), command.to_string()));
            self.check(command)?;
            Ok("installed".to_string())
        }

        async fn execute_command(
            &self,
            _reservation_id: &str,
            target: &str,
            _target_type: &str,
            command: &str,
            inputs: Vec<InputNameValue>,
        ) -> ApiResult<String> {
            let vlan = inputs
                .iter()
                .find(|i| i.name == "VLAN_ID")
                .map(|i| i.value.clone())
                .unwrap_or_default();
            self.record(Call::Command(target.to_string(), command.to_string(), vlan));
            self.check(command)?;
            Ok(String::new())
        }

        async fn set_resource_live_status(
            &self,
            resource: &str,
            status: &str,
            _description: &str,
        ) -> ApiResult<()> {
            self.record(Call::LiveStatus(resource.to_string(), status.to_string()));
            self.check("SetResourceLiveStatus")
        }
    }
}
