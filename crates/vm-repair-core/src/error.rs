//! Error taxonomy for repair operations.
//!
//! Every failure an orchestrated operation can hit is one of these kinds.
//! Orchestrators never return them to callers; each kind is translated
//! into a fixed user-facing message for the operation that failed.

use az_shell::AzError;
use serde::Serialize;

/// The four orchestrated operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Restore,
    Run,
    ListScripts,
}

impl Operation {
    /// Name recorded in telemetry.
    pub fn command_name(&self) -> &'static str {
        match self {
            Operation::Create => "vm repair create",
            Operation::Restore => "vm repair restore",
            Operation::Run => "vm repair run",
            Operation::ListScripts => "vm repair run-list",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.command_name())
    }
}

pub(crate) const SCRIPT_REPOSITORY_URL: &str = "https://github.com/Azure/repair-script-library";

const UNEXPECTED_MESSAGE: &str =
    "An unexpected error occurred. Try running again with the --verbose flag to debug.";
const RESTORE_RETRY_HINT: &str =
    "If the restore command fails at retry, please rerun the repair process from 'vm-repair create'.";

/// Repair operation errors.
#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error("command interrupted by user input")]
    Interrupted,

    #[error(transparent)]
    AzCommand(#[from] AzError),

    #[error("failed to find compatible VM size for source VM's OS disk within given region and subscription")]
    SkuNotAvailable,

    #[error("compatible Windows OS image not available")]
    WindowsOsNotAvailable,

    #[error("unmanaged disk copy failed: copy status is '{status}'")]
    UnmanagedDiskCopy { status: String },

    #[error("run script not found for id '{0}'")]
    RunScriptNotFoundForId(String),

    #[error("failed to fetch run script catalog: {0}")]
    ScriptFetch(#[from] reqwest::Error),

    #[error("disk '{disk}' is not a data disk of repair VM '{vm}'")]
    DiskNotAttached { disk: String, vm: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<serde_json::Error> for RepairError {
    fn from(err: serde_json::Error) -> Self {
        RepairError::Unexpected(format!("malformed az output: {err}"))
    }
}

impl From<std::io::Error> for RepairError {
    fn from(err: std::io::Error) -> Self {
        RepairError::Unexpected(format!("io error: {err}"))
    }
}

impl RepairError {
    /// Whether this error falls outside the classified kinds.
    pub fn is_unexpected(&self) -> bool {
        matches!(
            self,
            RepairError::Unexpected(_) | RepairError::DiskNotAttached { .. }
        )
    }

    /// Fixed human-readable message for this error in the context of `op`.
    pub fn user_message(&self, op: Operation) -> String {
        match (self, op) {
            (RepairError::Interrupted, Operation::Create) => {
                "Command interrupted by user input. Cleaning up resources.".to_string()
            }
            (RepairError::Interrupted, Operation::Restore) => {
                format!("Command interrupted by user input. {RESTORE_RETRY_HINT}")
            }
            (RepairError::Interrupted, Operation::Run) => {
                "Repair run failed. Command interrupted by user input.".to_string()
            }
            (RepairError::Interrupted, Operation::ListScripts) => {
                "Command interrupted by user input.".to_string()
            }
            (RepairError::AzCommand(_), Operation::Create) => {
                "Repair create failed. Cleaning up created resources.".to_string()
            }
            (RepairError::AzCommand(_), Operation::Restore) => {
                format!("Repair restore failed. {RESTORE_RETRY_HINT}")
            }
            (RepairError::AzCommand(_), Operation::Run) => "Repair run failed.".to_string(),
            (RepairError::SkuNotAvailable, _) => {
                "Please check if the current subscription can create more VM resources. Cleaning up created resources.".to_string()
            }
            (RepairError::UnmanagedDiskCopy { .. }, _) => {
                "Repair create failed. Please try again at another time. Cleaning up created resources.".to_string()
            }
            (RepairError::WindowsOsNotAvailable, _) => {
                "A compatible Windows OS image is not available at this time, please check subscription.".to_string()
            }
            (RepairError::ScriptFetch(_), _) => format!(
                "Failed to fetch run script data from GitHub. Please check this repository is reachable: {SCRIPT_REPOSITORY_URL}"
            ),
            (RepairError::RunScriptNotFoundForId(_), _) => {
                "Repair run failed. Run ID not found.".to_string()
            }
            (RepairError::InvalidArgument(reason), _) => {
                format!("Invalid arguments for {op}: {reason}")
            }
            _ => UNEXPECTED_MESSAGE.to_string(),
        }
    }
}

/// Result type for repair operations.
pub type Result<T> = std::result::Result<T, RepairError>;
