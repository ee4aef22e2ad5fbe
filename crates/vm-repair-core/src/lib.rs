//! VM Repair Core Library
//!
//! Orchestrates Azure VM OS-disk repair over the az CLI: stand up a repair
//! VM with a copy of the broken disk, run catalog or custom repair scripts
//! on it, and swap the repaired disk back into the source VM.
//!
//! Every operation takes an [`ExecutionContext`] and returns a
//! [`RepairOutcome`]; failures are reported through the outcome, never as
//! `Err`.

pub mod catalog;
pub mod compat;
pub mod config;
pub mod context;
pub mod error;
pub mod fakes;
pub mod obs;
pub mod orchestrator;
pub mod outcome;
pub mod resource_id;
pub mod resources;
pub mod script;
pub mod session;
pub mod telemetry;
pub mod vm;

pub use catalog::{HttpScriptCatalog, ScriptCatalog, ScriptCatalogEntry, ScriptMap};
pub use config::RepairConfig;
pub use context::{ConfirmPrompt, ExecutionContext, LogProgress, ProgressReporter, StdinPrompt};
pub use error::{Operation, RepairError, Result};
pub use obs::{CommandTelemetry, NoopTelemetry, ScriptTelemetry, TelemetrySink, TracingTelemetry};
pub use orchestrator::{
    create, list_scripts, restore, run, CreateRequest, RestoreRequest, RunRequest, ScriptSource,
};
pub use outcome::{
    CreateDetails, RepairOutcome, RestoreDetails, RunDetails, ScriptListing, Status,
};
pub use resource_id::{BlobUri, ResourceId};
pub use resources::CleanupResult;
pub use session::{DiskMode, OsFamily, RepairSession};
pub use telemetry::init_tracing;
pub use vm::VirtualMachine;

pub use az_shell::{AzCommand, AzError, AzExecutor, ProcessAzExecutor};

/// Crate version, reported in telemetry and the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
