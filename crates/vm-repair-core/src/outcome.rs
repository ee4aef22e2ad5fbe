//! Structured results returned by every orchestrated operation.

use serde::{Deserialize, Serialize};

use crate::catalog::ScriptCatalogEntry;
use crate::error::{Operation, RepairError};

/// Overall status of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Success,
    Error,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Success => f.write_str("SUCCESS"),
            Status::Error => f.write_str("ERROR"),
        }
    }
}

/// Result of an operation, serialized as one flat JSON object.
///
/// `status` and `message` are always present. `error_message` carries the
/// diagnostic detail on failure; operation-specific fields come from
/// `details`.
#[derive(Debug, Clone, Serialize)]
pub struct RepairOutcome<T> {
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(flatten)]
    pub details: Option<T>,
}

impl<T: Serialize> RepairOutcome<T> {
    pub fn success(message: impl Into<String>, details: T) -> Self {
        Self {
            status: Status::Success,
            message: message.into(),
            error_message: None,
            details: Some(details),
        }
    }

    /// Outcome with an explicit status and details, e.g. a script that ran
    /// but reported errors.
    pub fn with_status(status: Status, message: impl Into<String>, details: T) -> Self {
        Self {
            status,
            message: message.into(),
            error_message: None,
            details: Some(details),
        }
    }

    pub fn failure(op: Operation, error: &RepairError) -> Self {
        Self {
            status: Status::Error,
            message: error.user_message(op),
            error_message: Some(error.to_string()),
            details: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Serialize for telemetry and printing.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Details returned by a successful `create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateDetails {
    pub repair_vm_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repair_vm_id: Option<String>,
    pub copied_disk_name: String,
    pub copied_disk_uri: String,
    pub repair_resource_group: String,
    pub resource_tag: String,
    pub created_resources: Vec<String>,
}

/// Details returned by a successful `restore`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreDetails {
    /// Disk now serving as the source VM's OS disk
    pub attached_disk: String,
    /// Name or VHD URI of the OS disk that was replaced
    pub previous_os_disk: String,
    pub repair_resource_group: String,
}

/// Details returned by `run` once the script has executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDetails {
    /// Raw stdout captured from the script
    pub logs: String,
    pub log_full_path: String,
    pub log_truncated: bool,
    /// Output-level lines on success, error-level lines on failure
    pub output: String,
    pub vm_name: String,
    pub resource_group: String,
}

/// Details returned by `list_scripts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptListing {
    pub map: Vec<ScriptCatalogEntry>,
}
