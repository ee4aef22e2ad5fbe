//! az-shell: typed invocation of the Azure CLI
//!
//! This crate is the only place that spawns `az`. Callers build an
//! [`AzCommand`] argument vector (marking passwords and connection strings
//! secret) and hand it to an [`AzExecutor`]. The process-backed executor
//! captures stdout and turns a non-zero exit into [`AzError::CommandFailed`]
//! with secrets scrubbed from the rendered command and stderr.

mod command;
mod error;
mod executor;

pub use command::{AzArg, AzCommand};
pub use error::AzError;
pub use executor::{AzExecutor, ProcessAzExecutor};

/// Result type for az-shell operations
pub type Result<T> = std::result::Result<T, AzError>;

/// Check if the az CLI is reachable through `executor`.
pub async fn is_az_available(executor: &dyn AzExecutor) -> bool {
    executor
        .execute(&AzCommand::new(["version"]).json_output())
        .await
        .is_ok()
}
