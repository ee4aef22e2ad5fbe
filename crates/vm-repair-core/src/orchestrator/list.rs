//! `list_scripts`: the published run-script catalog.

use std::time::Instant;

use tracing::{info, info_span, Instrument};

use crate::context::ExecutionContext;
use crate::error::Operation;
use crate::outcome::{RepairOutcome, ScriptListing};

use super::{log_failure, run_interruptible, track, Params};

pub async fn list_scripts(ctx: &ExecutionContext) -> RepairOutcome<ScriptListing> {
    let started = Instant::now();

    let result = run_interruptible(ctx, ctx.catalog().fetch_map())
        .instrument(info_span!("vm_repair.list_scripts"))
        .await;

    let outcome = match result {
        Ok(map) => {
            let message = format!("Fetched {} run scripts.", map.len());
            info!("{message}");
            RepairOutcome::success(message, ScriptListing { map: map.map })
        }
        Err(err) => {
            log_failure(Operation::ListScripts, &err);
            RepairOutcome::failure(Operation::ListScripts, &err)
        }
    };

    track(
        ctx,
        Operation::ListScripts,
        Params::new().into_map(),
        &outcome,
        started,
        None,
    );
    outcome
}
