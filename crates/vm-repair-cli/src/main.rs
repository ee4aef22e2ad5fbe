//! vm-repair - Azure VM repair CLI
//!
//! Repairs a VM whose OS disk no longer boots by working on a copy of the
//! disk attached to a separate repair VM.
//!
//! ## Commands
//!
//! - `create`: Create a repair VM with a copy of the source OS disk attached
//! - `restore`: Swap the repaired disk in as the source VM's OS disk
//! - `run`: Run a catalog or custom repair script on a VM
//! - `list-scripts`: List the published repair scripts
//!
//! Every command prints its outcome as JSON on stdout and exits non-zero
//! when the outcome status is `ERROR`.

use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Level};

use vm_repair_core::config::{ENV_AZ_PATH, ENV_SCRIPT_MAP_URL};
use vm_repair_core::{
    CreateRequest, ExecutionContext, RepairConfig, RepairOutcome, RestoreRequest, RunRequest,
    ScriptSource,
};

/// Exit code after a second Ctrl-C (128 + SIGINT).
const FORCED_EXIT_CODE: i32 = 130;

#[derive(Parser)]
#[command(name = "vm-repair")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Repair Azure VMs through a repair VM and the az CLI", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// az executable to run
    #[arg(long, global = true, env = ENV_AZ_PATH)]
    az_path: Option<String>,

    /// URL of the repair script catalog
    #[arg(long, global = true, env = ENV_SCRIPT_MAP_URL)]
    script_map_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a repair VM with a copy of the source VM's OS disk attached
    Create {
        /// Name of the source VM
        #[arg(short = 'n', long)]
        name: String,

        /// Resource group of the source VM
        #[arg(short = 'g', long)]
        resource_group: String,

        /// Admin username for the repair VM (required for Windows)
        #[arg(long, env = "VM_REPAIR_USERNAME", hide_env_values = true)]
        repair_username: Option<String>,

        /// Admin password for the repair VM
        #[arg(long, env = "VM_REPAIR_PASSWORD", hide_env_values = true)]
        repair_password: String,

        /// Name of the repair VM (default: repair-<name>)
        #[arg(long)]
        repair_vm_name: Option<String>,

        /// Name of the OS disk copy (default: <name>-DiskCopy-<timestamp>)
        #[arg(long)]
        copy_disk_name: Option<String>,

        /// Resource group for the repair VM (default: repair-<name>-<timestamp>)
        #[arg(long)]
        repair_group_name: Option<String>,
    },

    /// Attach the repaired disk to the source VM and delete the repair resources
    Restore {
        /// Name of the source VM
        #[arg(short = 'n', long)]
        name: String,

        /// Resource group of the source VM
        #[arg(short = 'g', long)]
        resource_group: String,

        /// Repaired data disk (default: the repair VM's only data disk)
        #[arg(long)]
        disk_name: Option<String>,

        /// Resource ID of the repair VM (default: found by its repair_source tag)
        #[arg(long)]
        repair_vm_id: Option<String>,

        /// Delete the repair resources without asking
        #[arg(long)]
        yes: bool,
    },

    /// Run a repair script on the source or repair VM
    Run {
        /// Name of the source VM
        #[arg(short = 'n', long)]
        name: String,

        /// Resource group of the source VM
        #[arg(short = 'g', long)]
        resource_group: String,

        /// Catalog id of the script to run
        #[arg(long, required_unless_present = "custom_script_file", conflicts_with = "custom_script_file")]
        run_id: Option<String>,

        /// Local script to run instead of a catalog script
        #[arg(long)]
        custom_script_file: Option<PathBuf>,

        /// Script parameters, as key=value pairs or bare values
        #[arg(long, num_args = 1..)]
        parameters: Vec<String>,

        /// Run on the repair VM instead of the source VM
        #[arg(long, requires = "repair_vm_id")]
        run_on_repair: bool,

        /// Resource ID of the repair VM
        #[arg(long)]
        repair_vm_id: Option<String>,
    },

    /// List the published repair scripts
    ListScripts,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    vm_repair_core::init_tracing(cli.json, level);

    let mut config = RepairConfig::from_env();
    if let Some(path) = &cli.az_path {
        config = config.with_az_path(path);
    }
    if let Some(url) = &cli.script_map_url {
        config = config.with_script_map_url(url);
    }

    let interrupt = CancellationToken::new();
    let on_interrupt = interrupt.clone();
    tokio::spawn(async move {
        if watch_interrupts(on_interrupt, tokio::signal::ctrl_c).await {
            warn!("Second interrupt received, exiting without clean-up.");
            std::process::exit(FORCED_EXIT_CODE);
        }
    });

    let ctx = ExecutionContext::from_config(&config)
        .context("Failed to set up the repair context")?
        .with_interrupt(interrupt);
    if !ctx.az_available().await {
        warn!(
            "The az CLI could not be run as '{}'. Install it or point --az-path at it.",
            config.az_path
        );
    }
    let subscription_id = ctx.detect_subscription_id().await;
    debug!(subscription_id = subscription_id.as_deref().unwrap_or(""), "context ready");
    let ctx = ctx.with_subscription_id(subscription_id);

    let succeeded = match cli.command {
        Commands::Create {
            name,
            resource_group,
            repair_username,
            repair_password,
            repair_vm_name,
            copy_disk_name,
            repair_group_name,
        } => {
            let mut request = CreateRequest::new(&name, &resource_group, &repair_password);
            request.repair_username = repair_username;
            if let Some(vm_name) = repair_vm_name {
                request = request.with_repair_vm_name(vm_name);
            }
            if let Some(disk) = copy_disk_name {
                request = request.with_copy_disk_name(disk);
            }
            if let Some(group) = repair_group_name {
                request = request.with_repair_group_name(group);
            }
            print_outcome(&vm_repair_core::create(&ctx, &request).await)?
        }
        Commands::Restore {
            name,
            resource_group,
            disk_name,
            repair_vm_id,
            yes,
        } => {
            let request = RestoreRequest {
                disk_name,
                repair_vm_id,
                yes,
                ..RestoreRequest::new(&name, &resource_group)
            };
            print_outcome(&vm_repair_core::restore(&ctx, &request).await)?
        }
        Commands::Run {
            name,
            resource_group,
            run_id,
            custom_script_file,
            parameters,
            run_on_repair,
            repair_vm_id,
        } => {
            let source = match (run_id, custom_script_file) {
                (_, Some(file)) => ScriptSource::CustomFile(file),
                (Some(id), None) => ScriptSource::RunId(id),
                (None, None) => anyhow::bail!("either --run-id or --custom-script-file is required"),
            };
            let request = RunRequest {
                parameters,
                run_on_repair,
                repair_vm_id,
                ..RunRequest::new(&name, &resource_group, source)
            };
            print_outcome(&vm_repair_core::run(&ctx, &request).await)?
        }
        Commands::ListScripts => print_outcome(&vm_repair_core::list_scripts(&ctx).await)?,
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

/// First interrupt cancels the running operation so it can clean up.
/// Returns true when a second interrupt arrives, during cleanup or a prompt.
async fn watch_interrupts<S, F>(interrupt: CancellationToken, mut next_signal: S) -> bool
where
    S: FnMut() -> F,
    F: Future<Output = std::io::Result<()>>,
{
    if next_signal().await.is_err() {
        return false;
    }
    warn!("Interrupt received, stopping... Press Ctrl-C again to exit now.");
    interrupt.cancel();
    next_signal().await.is_ok()
}

/// Print the outcome as pretty JSON and report whether it succeeded.
fn print_outcome<T: Serialize>(outcome: &RepairOutcome<T>) -> Result<bool> {
    let rendered =
        serde_json::to_string_pretty(&outcome.to_value()).context("Failed to render outcome")?;
    println!("{rendered}");
    Ok(outcome.is_success())
}
