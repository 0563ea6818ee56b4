//! Error types for bulk connection requests.
//!
//! These errors reject a whole request before anything is dispatched. Remote
//! failures of individual actions are reported as failed
//! [`crate::ActionResult`]s instead.

use std::io;
use thiserror::Error;

/// Result type alias for request level operations.
pub type ConnectResult<T> = Result<T, ConnectError>;

/// Errors that abort a bulk connection request.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The request body is not a valid driver request.
    #[error("Failed to decode driver request: {0}")]
    Decode(#[from] serde_json::Error),

    /// An action carries no `VM_UUID` custom attribute.
    #[error("VM_UUID is missing on action attributes of action '{action_id}'")]
    MissingVmUuid {
        /// The offending action.
        action_id: String,
    },

    /// A `removeVlan` action carries no `Interface` connector attribute.
    #[error("Interface attribute is missing on connectorAttributes for removeVlan action '{action_id}'")]
    MissingInterface {
        /// The offending action.
        action_id: String,
    },

    /// The action type is neither `setVlan` nor `removeVlan`.
    #[error("Action type {action_type} is not supported")]
    UnsupportedActionType {
        /// The offending action.
        action_id: String,
        /// The type found in the request.
        action_type: String,
    },

    /// The connection parameters of an action are unusable.
    #[error("Invalid connection parameters of action '{action_id}': {message}")]
    InvalidAction {
        /// The offending action.
        action_id: String,
        /// Error message.
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Reading a configuration or request file failed.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// The file being read.
        path: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The YAML configuration could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConnectError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid action error.
    pub fn invalid_action(action_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAction {
            action_id: action_id.into(),
            message: message.into(),
        }
    }

    /// Creates an IO error for `path`.
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
