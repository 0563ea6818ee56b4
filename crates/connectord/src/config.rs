//! Connection orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use vcshell_common::DEFAULT_MAX_PARALLELISM;

use crate::error::{ConnectError, ConnectResult};

/// Separator between the inventory path and the name of the default switch.
pub const DV_SWITCH_PATH_SEPARATOR: char = '\\';

/// Default task poll interval in milliseconds.
pub const DEFAULT_TASK_POLL_INTERVAL_MS: u64 = 1000;

fn default_max_parallelism() -> usize {
    DEFAULT_MAX_PARALLELISM
}

fn default_task_poll_interval_ms() -> u64 {
    DEFAULT_TASK_POLL_INTERVAL_MS
}

/// vCenter data model consumed by the connection orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectConfig {
    /// Default distributed switch as `<path>\<name>`.
    pub default_dvswitch: String,
    /// Inventory folder generated port groups are looked up in.
    pub default_port_group_location: String,
    /// Network free vNICs are parked on, as `<location>/<name>`.
    pub holding_network: String,
    /// Number of combined actions executed at the same time.
    #[serde(default = "default_max_parallelism")]
    pub max_parallelism: usize,
    /// Interval between two task state polls.
    #[serde(default = "default_task_poll_interval_ms")]
    pub task_poll_interval_ms: u64,
}

impl ConnectConfig {
    /// Parses a YAML configuration.
    pub fn from_yaml(yaml: &str) -> ConnectResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> ConnectResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| ConnectError::io(path.display().to_string(), e))?;
        Self::from_yaml(&yaml)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConnectResult<()> {
        DvSwitchPath::parse(&self.default_dvswitch)?;
        if self.default_port_group_location.trim().is_empty() {
            return Err(ConnectError::invalid_config(
                "default_port_group_location",
                "must not be empty",
            ));
        }
        if self.holding_network.trim().is_empty() {
            return Err(ConnectError::invalid_config("holding_network", "must not be empty"));
        }
        if self.max_parallelism == 0 {
            return Err(ConnectError::invalid_config(
                "max_parallelism",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Returns the parsed default switch.
    pub fn dv_switch(&self) -> ConnectResult<DvSwitchPath> {
        DvSwitchPath::parse(&self.default_dvswitch)
    }

    /// Returns the task poll interval.
    pub fn task_poll_interval(&self) -> Duration {
        Duration::from_millis(self.task_poll_interval_ms)
    }
}

/// Inventory path and name of a distributed switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DvSwitchPath {
    /// Inventory path (e.g. the datacenter).
    pub path: String,
    /// Switch name.
    pub name: String,
}

impl DvSwitchPath {
    /// Parses `<path>\<name>`.
    pub fn parse(value: &str) -> ConnectResult<Self> {
        let parts: Vec<&str> = value.split(DV_SWITCH_PATH_SEPARATOR).collect();
        if parts.len() < 2 {
            return Err(ConnectError::invalid_config(
                "default_dvswitch",
                "Default dvSwitch should contain full path to distributed virtual switch",
            ));
        }
        Ok(Self {
            path: parts[0].to_string(),
            name: parts[1].to_string(),
        })
    }
}
