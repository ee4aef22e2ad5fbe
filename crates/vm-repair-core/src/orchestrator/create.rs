//! `create`: stand up a repair VM with a copy of the source OS disk attached.

use std::time::Instant;

use az_shell::AzCommand;
use chrono::Utc;
use tracing::{info, info_span, warn, Instrument};

use crate::compat::{fetch_compatible_sku, fetch_disk_sku, fetch_repair_image};
use crate::context::ExecutionContext;
use crate::error::{Operation, RepairError, Result};
use crate::outcome::{CreateDetails, RepairOutcome};
use crate::resource_id::{BlobUri, ResourceId};
use crate::resources::{clean_up_resources, list_resource_ids_in_rg};
use crate::session::{DiskMode, OsFamily, RepairSession};
use crate::vm::{show_vm, VirtualMachine};

use super::{log_failure, run_interruptible, track, Params};

/// Inputs of `create`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
    pub vm_name: String,
    pub resource_group: String,
    /// Admin username of the repair VM. Required for Windows.
    pub repair_username: Option<String>,
    pub repair_password: String,
    pub repair_vm_name: String,
    pub copy_disk_name: String,
    pub repair_group_name: String,
}

impl CreateRequest {
    /// Request with generated names for the repair VM, disk copy and group.
    pub fn new(vm_name: &str, resource_group: &str, repair_password: &str) -> Self {
        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        Self {
            vm_name: vm_name.to_string(),
            resource_group: resource_group.to_string(),
            repair_username: None,
            repair_password: repair_password.to_string(),
            repair_vm_name: format!("repair-{vm_name}"),
            copy_disk_name: format!("{vm_name}-DiskCopy-{stamp}"),
            repair_group_name: format!("repair-{vm_name}-{stamp}"),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.repair_username = Some(username.into());
        self
    }

    pub fn with_repair_vm_name(mut self, name: impl Into<String>) -> Self {
        self.repair_vm_name = name.into();
        self
    }

    pub fn with_copy_disk_name(mut self, name: impl Into<String>) -> Self {
        self.copy_disk_name = name.into();
        self
    }

    pub fn with_repair_group_name(mut self, name: impl Into<String>) -> Self {
        self.repair_group_name = name.into();
        self
    }

    fn telemetry_params(&self) -> Params {
        Params::new()
            .plain("vm_name", &self.vm_name)
            .plain("resource_group_name", &self.resource_group)
            .secret("repair_username", self.repair_username.as_deref())
            .secret("repair_password", Some(&self.repair_password))
            .plain("repair_vm_name", &self.repair_vm_name)
            .plain("copy_disk_name", &self.copy_disk_name)
            .plain("repair_group_name", &self.repair_group_name)
    }
}

/// Create a repair VM for `request.vm_name`.
///
/// On any failure the repair resource group is deleted, unconfirmed, once.
pub async fn create(ctx: &ExecutionContext, request: &CreateRequest) -> RepairOutcome<CreateDetails> {
    let started = Instant::now();
    let span = info_span!(
        "vm_repair.create",
        vm = %request.vm_name,
        resource_group = %request.resource_group
    );

    let result = run_interruptible(ctx, create_repair_vm(ctx, request))
        .instrument(span)
        .await;

    let outcome = match result {
        Ok(details) => {
            let message = success_message(request, &details);
            info!("{message}");
            RepairOutcome::success(message, details)
        }
        Err(err) => {
            log_failure(Operation::Create, &err);
            clean_up_resources(ctx, &request.repair_group_name, false).await;
            RepairOutcome::failure(Operation::Create, &err)
        }
    };

    track(
        ctx,
        Operation::Create,
        request.telemetry_params().into_map(),
        &outcome,
        started,
        None,
    );
    outcome
}

fn success_message(request: &CreateRequest, details: &CreateDetails) -> String {
    format!(
        "Your repair VM '{vm}' has been created in the resource group '{repair_rg}' with disk '{disk}' attached as data disk. \
Please use this VM to troubleshoot and repair. Once the repairs are complete use the command \
'vm-repair restore -n {source} -g {rg} --verbose' to restore disk to the source VM. \
Note that the copied disk is created within the original resource group '{rg}'.",
        vm = details.repair_vm_name,
        repair_rg = details.repair_resource_group,
        disk = details.copied_disk_name,
        source = request.vm_name,
        rg = request.resource_group,
    )
}

async fn create_repair_vm(ctx: &ExecutionContext, request: &CreateRequest) -> Result<CreateDetails> {
    let source_vm = show_vm(ctx, &request.resource_group, &request.vm_name).await?;
    let mut session = RepairSession::from_source_vm(
        &source_vm,
        &request.resource_group,
        &request.repair_vm_name,
        &request.repair_group_name,
    );

    if session.os_family() == OsFamily::Windows && request.repair_username.is_none() {
        return Err(RepairError::InvalidArgument(
            "a repair username is required for Windows VMs".to_string(),
        ));
    }

    let image = fetch_repair_image(ctx, &source_vm).await?;
    let size = fetch_compatible_sku(ctx, &source_vm)
        .await?
        .ok_or(RepairError::SkuNotAvailable)?;
    let vm_create = repair_vm_command(&session, request, &image, &size);

    info!("Creating resource group for repair VM and its resources...");
    let group_create = AzCommand::new(["group", "create"])
        .opt("-l", session.location())
        .opt("-n", session.repair_resource_group());
    ctx.call(&group_create).await?;

    match session.disk_mode() {
        DiskMode::Managed => {
            copy_managed_disk(ctx, &source_vm, &mut session, request, vm_create).await?
        }
        DiskMode::Unmanaged => copy_unmanaged_disk(ctx, &mut session, request, vm_create).await?,
    }

    // The repair VM is up at this point; a failed listing must not tear it down.
    let mut created = match list_resource_ids_in_rg(ctx, session.repair_resource_group()).await {
        Ok(ids) => ids,
        Err(e) => {
            warn!(error = %e, "Could not list the created repair resources.");
            Vec::new()
        }
    };
    if let Some(copy_id) = session.copied_disk_id() {
        created.push(copy_id.to_string());
    }
    session.record_created_resources(created);

    let repair_vm_id = source_vm
        .id
        .as_deref()
        .and_then(|id| id.parse::<ResourceId>().ok())
        .map(|source| {
            ResourceId::virtual_machine(
                source.subscription(),
                session.repair_resource_group(),
                session.repair_vm(),
            )
            .to_string()
        });

    Ok(CreateDetails {
        repair_vm_name: session.repair_vm().to_string(),
        repair_vm_id,
        copied_disk_name: session.copied_disk_name().unwrap_or_default().to_string(),
        copied_disk_uri: session.copied_disk_id().unwrap_or_default().to_string(),
        repair_resource_group: session.repair_resource_group().to_string(),
        resource_tag: session.resource_tag(),
        created_resources: session.created_resources().to_vec(),
    })
}

/// `az vm create` for the repair VM. Credentials are secret arguments.
fn repair_vm_command(
    session: &RepairSession,
    request: &CreateRequest,
    image: &str,
    size: &str,
) -> AzCommand {
    let mut command = AzCommand::new(["vm", "create"])
        .opt("-g", session.repair_resource_group())
        .opt("-n", session.repair_vm())
        .opt("--tag", session.resource_tag())
        .opt("--image", image)
        .secret_opt("--admin-password", &request.repair_password);
    if let Some(username) = &request.repair_username {
        command = command.secret_opt("--admin-username", username);
    }
    command.opt("--size", size)
}

async fn copy_managed_disk(
    ctx: &ExecutionContext,
    source_vm: &VirtualMachine,
    session: &mut RepairSession,
    request: &CreateRequest,
    vm_create: AzCommand,
) -> Result<()> {
    info!("Source VM uses managed disks. Creating repair VM with managed disks.");
    let disk_sku = match source_vm.os_disk_sku() {
        Some(sku) => sku.to_string(),
        // deallocated VMs do not report the disk SKU
        None => {
            fetch_disk_sku(ctx, session.source_resource_group(), session.source_disk_name()).await?
        }
    };

    info!("Validating VM template before continuing...");
    ctx.call(&vm_create.clone().arg("--validate")).await?;

    info!("Copying OS disk of source VM...");
    let copy_disk = AzCommand::new(["disk", "create"])
        .opt("-g", session.source_resource_group())
        .opt("-n", &request.copy_disk_name)
        .opt("--source", session.source_disk_name())
        .opt("--sku", disk_sku)
        .opt("--location", session.location())
        .tsv_query("id");
    let copy_id = ctx.call_trimmed(&copy_disk).await?;
    if copy_id.is_empty() {
        return Err(RepairError::Unexpected(format!(
            "disk copy '{}' reported no id",
            request.copy_disk_name
        )));
    }
    session.record_copied_disk(&request.copy_disk_name, &copy_id);

    info!("Creating repair VM...");
    ctx.call(&vm_create).await?;

    info!("Attaching copied disk to repair VM...");
    let attach = AzCommand::new(["vm", "disk", "attach"])
        .opt("-g", session.repair_resource_group())
        .opt("--vm-name", session.repair_vm())
        .opt("--name", copy_id);
    ctx.call(&attach).await?;
    Ok(())
}

async fn copy_unmanaged_disk(
    ctx: &ExecutionContext,
    session: &mut RepairSession,
    request: &CreateRequest,
    vm_create: AzCommand,
) -> Result<()> {
    info!("Source VM uses unmanaged disks. Creating repair VM with unmanaged disks.");
    let os_disk_uri = session
        .source_disk_uri()
        .ok_or_else(|| RepairError::Unexpected("unmanaged OS disk has no VHD URI".to_string()))?
        .to_string();
    let source_blob = BlobUri::parse(&os_disk_uri)?;
    let copy_name = format!("{}.vhd", request.copy_disk_name);

    info!("Validating VM template before continuing...");
    ctx.call(&vm_create.clone().arg("--validate")).await?;

    tracing::debug!("Fetching storage account connection string...");
    let connection_string = AzCommand::new(["storage", "account", "show-connection-string"])
        .opt("-g", session.source_resource_group())
        .opt("-n", source_blob.account_name())
        .tsv_query("connectionString");
    let connection_string = ctx.call_trimmed(&connection_string).await?;

    info!("Creating snapshot of OS disk...");
    let snapshot = AzCommand::new(["storage", "blob", "snapshot"])
        .opt("-c", source_blob.container())
        .opt("-n", source_blob.blob())
        .secret_opt("--connection-string", &connection_string)
        .tsv_query("snapshot");
    let snapshot_timestamp = ctx.call_trimmed(&snapshot).await?;
    let snapshot_uri = format!("{os_disk_uri}?snapshot={snapshot_timestamp}");

    info!("Creating a copy disk from the snapshot...");
    let copy_start = AzCommand::new(["storage", "blob", "copy", "start"])
        .opt("-c", source_blob.container())
        .opt("-b", &copy_name)
        .opt("--source-uri", snapshot_uri)
        .secret_opt("--connection-string", &connection_string);
    ctx.call(&copy_start).await?;
    let copy_uri = source_blob.sibling(&copy_name);
    session.record_copied_disk(&copy_name, &copy_uri);

    info!("Creating repair VM while disk copy is in progress...");
    ctx.call(&vm_create.arg("--use-unmanaged-disk")).await?;

    info!("Checking if disk copy is done...");
    let copy_status = AzCommand::new(["storage", "blob", "show"])
        .opt("-c", source_blob.container())
        .opt("-n", &copy_name)
        .secret_opt("--connection-string", &connection_string)
        .tsv_query("properties.copy.status");
    let status = ctx.call_trimmed(&copy_status).await?;
    if status != "success" {
        return Err(RepairError::UnmanagedDiskCopy { status });
    }

    info!("Attaching copied disk to repair VM as data disk...");
    let attach = AzCommand::new(["vm", "unmanaged-disk", "attach"])
        .opt("-g", session.repair_resource_group())
        .opt("-n", &copy_name)
        .opt("--vm-name", session.repair_vm())
        .opt("--vhd-uri", copy_uri);
    ctx.call(&attach).await?;
    Ok(())
}
