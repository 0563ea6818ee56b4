//! Error types for vCenter operations.
//!
//! All errors implement `std::error::Error` via `thiserror`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for vCenter operations.
pub type VcResult<T> = Result<T, VcError>;

/// Kind of fault reported by a vCenter task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    /// The managed object is still referenced (e.g. a port group with
    /// attached ports).
    ResourceInUse,
    /// The object is in a state that does not allow the operation.
    InvalidState,
    /// The referenced object does not exist.
    NotFound,
    /// An object with the same name already exists.
    DuplicateName,
    /// Any other fault.
    Other,
}

/// A fault raised by a vCenter task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    /// Fault classification.
    pub kind: FaultKind,
    /// Fault message as reported by vCenter.
    pub message: String,
}

impl Fault {
    /// Creates a new fault.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a `ResourceInUse` fault.
    pub fn resource_in_use(message: impl Into<String>) -> Self {
        Self::new(FaultKind::ResourceInUse, message)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Errors that can occur while talking to vCenter.
#[derive(Debug, Clone, Error)]
pub enum VcError {
    /// No virtual machine has the requested BIOS uuid.
    #[error("VM having UUID {uuid} not found")]
    VmNotFound {
        /// The requested uuid.
        uuid: String,
    },

    /// Network lookup failed.
    #[error("Network '{name}' not found under '{location}'")]
    NetworkNotFound {
        /// Inventory folder the network was looked up in.
        location: String,
        /// Network name.
        name: String,
    },

    /// Distributed virtual switch lookup failed.
    #[error("Distributed virtual switch '{name}' not found under '{path}'")]
    SwitchNotFound {
        /// Inventory path of the switch.
        path: String,
        /// Switch name.
        name: String,
    },

    /// No vNIC of the VM carries the requested MAC address.
    #[error("vNIC with MAC address '{mac}' not found on VM {vm}")]
    VnicNotFound {
        /// VM uuid.
        vm: String,
        /// Requested MAC address.
        mac: String,
    },

    /// Every vNIC of the VM is already connected to a network.
    #[error("No available vNIC on VM {vm} to connect to '{network}'")]
    NoAvailableVnic {
        /// VM uuid.
        vm: String,
        /// Network that needed a vNIC.
        network: String,
    },

    /// A submitted task completed with a fault.
    #[error("Task '{action}' failed")]
    TaskFault {
        /// Human readable task name (e.g. "Reconfigure VM").
        action: String,
        /// The fault reported by vCenter.
        #[source]
        fault: FaultError,
    },

    /// A vCenter API call failed before a task was created.
    #[error("vCenter call {operation} failed: {message}")]
    Api {
        /// The API operation.
        operation: String,
        /// Error message.
        message: String,
    },

    /// An argument could not be turned into a valid vCenter spec.
    #[error("Invalid {field}: {message}")]
    InvalidArgument {
        /// The offending field.
        field: String,
        /// Error message.
        message: String,
    },
}

/// [`Fault`] wrapped as an error source so it shows up in error chains.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct FaultError(pub Fault);

impl VcError {
    /// Creates a task fault error.
    pub fn task_fault(action: impl Into<String>, fault: Fault) -> Self {
        Self::TaskFault {
            action: action.into(),
            fault: FaultError(fault),
        }
    }

    /// Creates an API error.
    pub fn api(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a network not found error.
    pub fn network_not_found(location: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NetworkNotFound {
            location: location.into(),
            name: name.into(),
        }
    }

    /// Returns the task fault carried by this error, if any.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            VcError::TaskFault { fault, .. } => Some(&fault.0),
            _ => None,
        }
    }

    /// Returns true if this error is a `ResourceInUse` task fault.
    pub fn is_resource_in_use(&self) -> bool {
        self.fault()
            .is_some_and(|fault| fault.kind == FaultKind::ResourceInUse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = VcError::VmNotFound {
            uuid: "4213a1b2".to_string(),
        };
        assert_eq!(err.to_string(), "VM having UUID 4213a1b2 not found");
    }

    #[test]
    fn test_task_fault_source_chain() {
        let err = VcError::task_fault(
            "Reconfigure VM",
            Fault::new(FaultKind::InvalidState, "VM is powered off"),
        );
        assert_eq!(err.to_string(), "Task 'Reconfigure VM' failed");
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("InvalidState: VM is powered off"));
    }

    #[test]
    fn test_is_resource_in_use() {
        let busy = VcError::task_fault("Erase dv Port Group", Fault::resource_in_use("in use"));
        assert!(busy.is_resource_in_use());
        assert!(!VcError::api("find", "timeout").is_resource_in_use());
        assert!(VcError::api("find", "timeout").fault().is_none());
    }
}
