//! `run`: execute a repair script on the source or repair VM.

use std::path::PathBuf;
use std::time::Instant;

use az_shell::AzCommand;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::context::ExecutionContext;
use crate::error::{Operation, RepairError, Result};
use crate::obs::ScriptTelemetry;
use crate::outcome::{RepairOutcome, RunDetails, Status};
use crate::resource_id::ResourceId;
use crate::script::{serialize_parameters, split_run_command_output, DriverScript, ScriptRunResult};
use crate::vm::show_vm;

use super::{log_failure, run_interruptible, track, Params};

const SCRIPT_COMPLETED: &str = "Script completed without error.";
const SCRIPT_POSSIBLE_ERRORS: &str = "Script returned with possible errors.";

/// Which script to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// A catalog entry
    RunId(String),
    /// A local script, uploaded next to the driver
    CustomFile(PathBuf),
}

impl ScriptSource {
    fn run_id(&self) -> Option<&str> {
        match self {
            ScriptSource::RunId(id) => Some(id),
            ScriptSource::CustomFile(_) => None,
        }
    }
}

/// Inputs of `run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub vm_name: String,
    pub resource_group: String,
    pub source: ScriptSource,
    /// `key=value` pairs or bare values handed to the script
    pub parameters: Vec<String>,
    pub run_on_repair: bool,
    /// Required when `run_on_repair` is set
    pub repair_vm_id: Option<String>,
}

impl RunRequest {
    pub fn new(vm_name: &str, resource_group: &str, source: ScriptSource) -> Self {
        Self {
            vm_name: vm_name.to_string(),
            resource_group: resource_group.to_string(),
            source,
            parameters: Vec::new(),
            run_on_repair: false,
            repair_vm_id: None,
        }
    }

    pub fn with_parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = parameters.into_iter().map(Into::into).collect();
        self
    }

    pub fn on_repair_vm(mut self, repair_vm_id: &str) -> Self {
        self.run_on_repair = true;
        self.repair_vm_id = Some(repair_vm_id.to_string());
        self
    }

    fn telemetry_params(&self) -> Params {
        let custom_script_file = match &self.source {
            ScriptSource::CustomFile(path) => path.display().to_string(),
            ScriptSource::RunId(_) => String::new(),
        };
        Params::new()
            .plain("vm_name", &self.vm_name)
            .plain("resource_group_name", &self.resource_group)
            .plain("run_id", self.source.run_id().unwrap_or_default())
            .plain("custom_script_file", custom_script_file)
            .plain("parameters", self.parameters.join(" "))
            .plain("run_on_repair", self.run_on_repair)
            .plain("repair_vm_id", self.repair_vm_id.as_deref().unwrap_or_default())
    }
}

/// Run the requested script and report what it logged.
///
/// A script that runs but does not report success yields an `ERROR`
/// outcome that still carries the run details.
pub async fn run(ctx: &ExecutionContext, request: &RunRequest) -> RepairOutcome<RunDetails> {
    let started = Instant::now();
    let span = info_span!(
        "vm_repair.run",
        vm = %request.vm_name,
        resource_group = %request.resource_group,
        run_id = request.source.run_id().unwrap_or("custom")
    );

    let result = run_interruptible(ctx, run_script(ctx, request))
        .instrument(span)
        .await;

    let run_id = request.source.run_id().map(str::to_string);
    let (outcome, script) = match result {
        Ok((details, script_result)) => {
            let status = script_result.status();
            let message = if script_result.succeeded {
                info!("Script returned with output:\n{}", details.output);
                SCRIPT_COMPLETED
            } else {
                error!("Script returned with error:\n{}", details.output);
                SCRIPT_POSSIBLE_ERRORS
            };
            debug!(stderr = %script_result.stderr, "run-command stderr");
            let script = ScriptTelemetry {
                run_id,
                status,
                output: details.output.clone(),
                duration_ms: Some(script_result.duration.as_millis() as u64),
            };
            (RepairOutcome::with_status(status, message, details), script)
        }
        Err(err) => {
            log_failure(Operation::Run, &err);
            let script = ScriptTelemetry {
                run_id,
                status: Status::Error,
                output: SCRIPT_POSSIBLE_ERRORS.to_string(),
                duration_ms: None,
            };
            (RepairOutcome::failure(Operation::Run, &err), script)
        }
    };

    track(
        ctx,
        Operation::Run,
        request.telemetry_params().into_map(),
        &outcome,
        started,
        Some(script),
    );
    outcome
}

async fn run_script(
    ctx: &ExecutionContext,
    request: &RunRequest,
) -> Result<(RunDetails, ScriptRunResult)> {
    let (target_group, target_vm) = if request.run_on_repair {
        let repair_vm_id = request
            .repair_vm_id
            .as_deref()
            .ok_or_else(|| {
                RepairError::InvalidArgument(
                    "a repair VM id is required to run on the repair VM".to_string(),
                )
            })?
            .parse::<ResourceId>()?;
        (
            repair_vm_id.resource_group().to_string(),
            repair_vm_id.name().to_string(),
        )
    } else {
        (request.resource_group.clone(), request.vm_name.clone())
    };
    if let ScriptSource::CustomFile(path) = &request.source {
        if !path.is_file() {
            return Err(RepairError::InvalidArgument(format!(
                "custom script file '{}' not found",
                path.display()
            )));
        }
    }

    let source_vm = show_vm(ctx, &request.resource_group, &request.vm_name).await?;
    let os = source_vm.os_family();
    let driver = DriverScript::materialize(os)?;

    let mut command = AzCommand::new(["vm", "run-command", "invoke"])
        .opt("-g", &target_group)
        .opt("-n", &target_vm)
        .opt("--command-id", os.run_command_id())
        .opt("--scripts", driver.script_arg());
    let script_path = match &request.source {
        ScriptSource::RunId(run_id) => {
            let path = ctx.catalog().fetch_script_path(run_id).await?;
            format!("script_path=./{path}")
        }
        ScriptSource::CustomFile(file) => {
            command = command.arg(format!("@{}", file.display()));
            "script_path=no-op".to_string()
        }
    };
    command = command.opt("--parameters", script_path);
    if let Some(params) = serialize_parameters(os, &request.parameters) {
        command = command.arg(format!("params={params}"));
    }

    let vm_kind = if request.run_on_repair { "repair VM" } else { "VM" };
    info!("Running script on {vm_kind}: {target_vm}");
    let script_started = Instant::now();
    let raw = ctx.call(&command).await?;
    let duration = script_started.elapsed();
    drop(driver);

    let (stdout, stderr) = split_run_command_output(os, &raw)?;
    let result = ScriptRunResult::from_output(stdout, stderr, duration);
    if result.truncated {
        warn!(
            "Log file is too large and has been cutoff at the start of file. \
Please locate the log file within the {vm_kind} using the log_full_path to check full logs."
        );
    }

    let details = RunDetails {
        logs: result.stdout.clone(),
        log_full_path: result.log_full_path.clone().unwrap_or_default(),
        log_truncated: result.truncated,
        output: result.output(),
        vm_name: target_vm,
        resource_group: target_group,
    };
    Ok((details, result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repair_vm_builder_sets_flag() {
        let request = RunRequest::new("web01", "prod-rg", ScriptSource::RunId("42".into()))
            .on_repair_vm("/subscriptions/s/resourceGroups/r/providers/Microsoft.Compute/virtualMachines/v")
            .with_parameters(["a=1"]);
        assert!(request.run_on_repair);
        assert_eq!(request.parameters, vec!["a=1"]);
        let params = request.telemetry_params().into_map();
        assert_eq!(params["run_id"], "42");
        assert_eq!(params["run_on_repair"], "true");
    }
}
