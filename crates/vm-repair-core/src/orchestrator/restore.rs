//! `restore`: swap the repaired disk in as the source VM's OS disk.

use std::time::Instant;

use az_shell::AzCommand;
use tracing::{info, info_span, Instrument};

use crate::context::ExecutionContext;
use crate::error::{Operation, RepairError, Result};
use crate::outcome::{RepairOutcome, RestoreDetails};
use crate::resource_id::ResourceId;
use crate::resources::clean_up_resources;
use crate::session::{DiskMode, RepairSession};
use crate::vm::{show_vm, VirtualMachine};

use super::{log_failure, run_interruptible, track, Params};

/// Inputs of `restore`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreRequest {
    pub vm_name: String,
    pub resource_group: String,
    /// Repaired data disk on the repair VM. Defaults to its only data disk.
    pub disk_name: Option<String>,
    /// Repair VM resource ID. Defaults to the VM tagged for this source VM.
    pub repair_vm_id: Option<String>,
    /// Skip the clean-up confirmation
    pub yes: bool,
}

impl RestoreRequest {
    pub fn new(vm_name: &str, resource_group: &str) -> Self {
        Self {
            vm_name: vm_name.to_string(),
            resource_group: resource_group.to_string(),
            ..Default::default()
        }
    }

    fn telemetry_params(&self) -> Params {
        Params::new()
            .plain("vm_name", &self.vm_name)
            .plain("resource_group_name", &self.resource_group)
            .plain("disk_name", self.disk_name.as_deref().unwrap_or_default())
            .plain("repair_vm_id", self.repair_vm_id.as_deref().unwrap_or_default())
            .plain("yes", self.yes)
    }
}

/// Attach the repaired disk to the source VM and clean up the repair group.
///
/// Failures leave the repair resources in place so the restore can be retried.
pub async fn restore(
    ctx: &ExecutionContext,
    request: &RestoreRequest,
) -> RepairOutcome<RestoreDetails> {
    let started = Instant::now();
    let span = info_span!(
        "vm_repair.restore",
        vm = %request.vm_name,
        resource_group = %request.resource_group
    );

    let result = run_interruptible(ctx, restore_os_disk(ctx, request))
        .instrument(span)
        .await;

    let outcome = match result {
        Ok(details) => {
            let message = format!(
                "'{disk}' successfully attached to '{vm}' as an OS disk. Please test your repairs and once confirmed, \
you may choose to delete the source OS disk '{previous}' within resource group '{rg}' manually if you no longer need it, \
to avoid any undesired costs.",
                disk = details.attached_disk,
                vm = request.vm_name,
                previous = details.previous_os_disk,
                rg = request.resource_group,
            );
            info!("{message}");
            RepairOutcome::success(message, details)
        }
        Err(err) => {
            log_failure(Operation::Restore, &err);
            RepairOutcome::failure(Operation::Restore, &err)
        }
    };

    track(
        ctx,
        Operation::Restore,
        request.telemetry_params().into_map(),
        &outcome,
        started,
        None,
    );
    outcome
}

async fn restore_os_disk(ctx: &ExecutionContext, request: &RestoreRequest) -> Result<RestoreDetails> {
    let source_vm = show_vm(ctx, &request.resource_group, &request.vm_name).await?;
    let repair_vm_id = match &request.repair_vm_id {
        Some(id) => id.parse::<ResourceId>()?,
        None => find_repair_vm(ctx, request).await?,
    };
    let session = RepairSession::from_source_vm(
        &source_vm,
        &request.resource_group,
        repair_vm_id.name(),
        repair_vm_id.resource_group(),
    );

    let mut repair_vm: Option<VirtualMachine> = None;
    let disk_name = match &request.disk_name {
        Some(name) => name.clone(),
        None => {
            let vm = show_vm(ctx, session.repair_resource_group(), session.repair_vm()).await?;
            let name = single_data_disk(&vm)?;
            repair_vm = Some(vm);
            name
        }
    };

    match session.disk_mode() {
        DiskMode::Managed => {
            let detach = AzCommand::new(["vm", "disk", "detach"])
                .opt("-g", session.repair_resource_group())
                .opt("--vm-name", session.repair_vm())
                .opt("--name", &disk_name);
            let swap = AzCommand::new(["vm", "update"])
                .opt("-g", session.source_resource_group())
                .opt("-n", session.source_vm())
                .opt("--os-disk", &disk_name);

            info!("Detaching repaired data disk from repair VM...");
            ctx.call(&detach).await?;
            info!("Attaching repaired data disk to source VM as an OS disk...");
            ctx.call(&swap).await?;
        }
        DiskMode::Unmanaged => {
            let repair_vm = match repair_vm {
                Some(vm) => vm,
                None => show_vm(ctx, session.repair_resource_group(), session.repair_vm()).await?,
            };
            let disk_uri = repair_vm
                .data_disk_uri(&disk_name)
                .ok_or_else(|| RepairError::DiskNotAttached {
                    disk: disk_name.clone(),
                    vm: session.repair_vm().to_string(),
                })?
                .to_string();
            let detach = AzCommand::new(["vm", "unmanaged-disk", "detach"])
                .opt("-g", session.repair_resource_group())
                .opt("--vm-name", session.repair_vm())
                .opt("--name", &disk_name);
            let swap = AzCommand::new(["vm", "update"])
                .opt("-g", session.source_resource_group())
                .opt("-n", session.source_vm())
                .opt("--set", format!("storageProfile.osDisk.vhd.uri={disk_uri}"));

            info!("Detaching repaired data disk from repair VM...");
            ctx.call(&detach).await?;
            info!("Attaching repaired data disk to source VM as an OS disk...");
            ctx.call(&swap).await?;
        }
    }

    clean_up_resources(ctx, session.repair_resource_group(), !request.yes).await;

    Ok(RestoreDetails {
        attached_disk: disk_name,
        previous_os_disk: session.source_disk_ref().to_string(),
        repair_resource_group: session.repair_resource_group().to_string(),
    })
}

/// The repair VM carrying the `repair_source` tag of this source VM.
async fn find_repair_vm(ctx: &ExecutionContext, request: &RestoreRequest) -> Result<ResourceId> {
    let tag = format!("{}/{}", request.resource_group, request.vm_name);
    let list = AzCommand::new(["vm", "list"])
        .tsv_query(&format!("[?tags.repair_source=='{tag}'].id"));
    let raw = ctx.call_trimmed(&list).await?;
    let ids: Vec<&str> = raw.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    match ids.as_slice() {
        [id] => id.parse(),
        [] => Err(RepairError::InvalidArgument(format!(
            "no repair VM found for '{tag}'; pass the repair VM id"
        ))),
        _ => Err(RepairError::InvalidArgument(format!(
            "more than one repair VM found for '{tag}'; pass the repair VM id"
        ))),
    }
}

fn single_data_disk(repair_vm: &VirtualMachine) -> Result<String> {
    match repair_vm.storage_profile.data_disks.as_slice() {
        [disk] => Ok(disk.name.clone()),
        [] => Err(RepairError::InvalidArgument(format!(
            "repair VM '{}' has no data disks",
            repair_vm.name
        ))),
        _ => Err(RepairError::InvalidArgument(format!(
            "repair VM '{}' has more than one data disk; pass the disk name",
            repair_vm.name
        ))),
    }
}
