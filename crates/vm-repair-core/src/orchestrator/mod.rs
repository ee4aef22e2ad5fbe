//! The four repair operations.
//!
//! Every operation takes an [`ExecutionContext`] and a request, and returns
//! a [`RepairOutcome`] whatever happens. Failures are classified, logged,
//! tracked and folded into the outcome; nothing is returned as `Err`.

mod create;
mod list;
mod restore;
mod run;

pub use create::{create, CreateRequest};
pub use list::list_scripts;
pub use restore::{restore, RestoreRequest};
pub use run::{run, RunRequest, ScriptSource};

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error};

use crate::context::ExecutionContext;
use crate::error::{Operation, RepairError, Result};
use crate::obs::{CommandTelemetry, ScriptTelemetry, REDACTED};
use crate::outcome::RepairOutcome;

/// Run `body` between progress begin/end, abandoning it on interrupt.
pub(crate) async fn run_interruptible<T, F>(ctx: &ExecutionContext, body: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    ctx.progress().begin();
    ctx.progress().update("Running");
    let result = tokio::select! {
        biased;
        _ = ctx.interrupt().cancelled() => Err(RepairError::Interrupted),
        result = body => result,
    };
    ctx.progress().end();
    result
}

/// Log a failed operation. Unclassified errors get their full detail.
pub(crate) fn log_failure(op: Operation, err: &RepairError) {
    if err.is_unexpected() {
        error!(operation = %op, error = ?err, "unexpected failure");
    } else {
        debug!(operation = %op, error = %err, "operation failed");
    }
    error!("{}", err.user_message(op));
}

/// Build the telemetry record for a finished operation and hand it to the sink.
pub(crate) fn track<T: Serialize>(
    ctx: &ExecutionContext,
    op: Operation,
    parameters: BTreeMap<String, String>,
    outcome: &RepairOutcome<T>,
    started: Instant,
    script: Option<ScriptTelemetry>,
) {
    let mut record =
        CommandTelemetry::new(op, parameters).finish(outcome.to_value(), started.elapsed());
    record.subscription_id = ctx.subscription_id().map(str::to_string);
    record.script = script;
    ctx.telemetry().track(&record);
}

/// Telemetry parameter map with secret values replaced.
pub(crate) struct Params(BTreeMap<String, String>);

impl Params {
    pub(crate) fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub(crate) fn plain(mut self, key: &str, value: impl ToString) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    pub(crate) fn secret(mut self, key: &str, value: Option<&str>) -> Self {
        let shown = match value {
            Some(_) => REDACTED.to_string(),
            None => String::new(),
        };
        self.0.insert(key.to_string(), shown);
        self
    }

    pub(crate) fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }
}
