//! Error types for sandbox API drivers.

use thiserror::Error;

/// Result type alias for sandbox API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors raised by the sandbox API or the drivers built on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// A sandbox API call failed.
    #[error("Sandbox API call {operation} failed: {message}")]
    Api {
        /// The API operation.
        operation: String,
        /// Error message returned by the API.
        message: String,
    },

    /// A VLAN service has nothing to connect.
    #[error("There is no visual connectors connected to {resource}")]
    NoVisualConnectors {
        /// The VLAN service resource.
        resource: String,
    },

    /// The resource context lacks a required attribute.
    #[error("Attribute '{attribute}' is missing on resource {resource}")]
    MissingAttribute {
        /// The resource.
        resource: String,
        /// The attribute name.
        attribute: String,
    },

    /// The resource context could not be decoded.
    #[error("Invalid resource context: {0}")]
    InvalidContext(String),
}

impl ApiError {
    /// Creates an API error.
    pub fn api(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidContext(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ApiError::api("ExecuteDeployAppCommand", "App not found");
        assert_eq!(
            err.to_string(),
            "Sandbox API call ExecuteDeployAppCommand failed: App not found"
        );
        let err = ApiError::NoVisualConnectors {
            resource: "VLAN 100".to_string(),
        };
        assert_eq!(err.to_string(), "There is no visual connectors connected to VLAN 100");
    }
}
