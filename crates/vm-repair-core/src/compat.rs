//! Compatibility lookups for the repair VM: size, image and disk SKU.

use az_shell::AzCommand;
use tracing::{debug, info};

use crate::context::ExecutionContext;
use crate::error::{RepairError, Result};
use crate::session::OsFamily;
use crate::vm::VirtualMachine;

/// Image used for every Linux repair VM.
pub const LINUX_REPAIR_IMAGE: &str = "UbuntuLTS";

/// Windows Server SKU used for Windows repair VMs.
pub const WINDOWS_IMAGE_SKU: &str = "2016-Datacenter";

/// Fallback sizes: at most 4 vCPUs and 16 GB, at least one data disk, premium IO.
const COMPATIBLE_SKU_QUERY: &str = "[?capabilities[?name=='vCPUs' && to_number(value) <= to_number('4')] \
&& capabilities[?name=='MemoryGB' && to_number(value) <= to_number('16')] \
&& capabilities[?name=='MaxDataDiskCount' && to_number(value) > to_number('0')] \
&& capabilities[?name=='PremiumIO' && value=='True']].name";

fn parse_json_list(raw: &str) -> Result<Vec<String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(raw)?)
}

/// Image URN (or alias) for the repair VM.
pub async fn fetch_repair_image(ctx: &ExecutionContext, source_vm: &VirtualMachine) -> Result<String> {
    match source_vm.os_family() {
        OsFamily::Linux => Ok(LINUX_REPAIR_IMAGE.to_string()),
        OsFamily::Windows => fetch_compatible_windows_os_urn(ctx, source_vm).await,
    }
}

/// Newest Windows Server image that will not collide with the source disk.
pub async fn fetch_compatible_windows_os_urn(
    ctx: &ExecutionContext,
    source_vm: &VirtualMachine,
) -> Result<String> {
    let command = AzCommand::new(["vm", "image", "list"])
        .opt("-s", WINDOWS_IMAGE_SKU)
        .opt("-f", "WindowsServer")
        .opt("-p", "MicrosoftWindowsServer")
        .opt("-l", &source_vm.location)
        .arg("--all")
        .opt(
            "--query",
            format!("[?sku=='{WINDOWS_IMAGE_SKU}'].urn | reverse(sort(@))"),
        )
        .json_output();

    info!("Fetching compatible Windows OS images from Azure...");
    let urns = parse_json_list(&ctx.call(&command).await?)?;
    select_windows_urn(&urns, source_vm.image_version())
}

/// Pick the newest URN, skipping it when it carries the source image version.
///
/// A repair VM created from the exact image of the source disk gets the
/// same disk signature, which keeps the copied disk offline once attached.
pub fn select_windows_urn(urns: &[String], source_version: Option<&str>) -> Result<String> {
    let newest = urns.first().ok_or(RepairError::WindowsOsNotAvailable)?;
    match source_version {
        Some(version) if !version.is_empty() && newest.contains(version) => urns
            .get(1)
            .cloned()
            .ok_or(RepairError::WindowsOsNotAvailable),
        _ => Ok(newest.clone()),
    }
}

/// VM size for the repair VM, or `None` when nothing suitable is offered.
///
/// Keeps the source VM's size when the region still offers it.
pub async fn fetch_compatible_sku(
    ctx: &ExecutionContext,
    source_vm: &VirtualMachine,
) -> Result<Option<String>> {
    let location = &source_vm.location;

    if let Some(size) = source_vm.vm_size() {
        let check = AzCommand::new(["vm", "list-skus"])
            .opt("-s", size)
            .opt("-l", location)
            .tsv_query("[].name");
        info!("Checking if source VM size is available...");
        let offered = ctx.call_trimmed(&check).await?;
        if offered.lines().any(|l| l.trim().eq_ignore_ascii_case(size)) {
            debug!(size, "source VM size available");
            return Ok(Some(size.to_string()));
        }
    }

    let list = AzCommand::new(["vm", "list-skus"])
        .opt("-s", "standard_d")
        .opt("-l", location)
        .opt("--query", COMPATIBLE_SKU_QUERY)
        .json_output();
    info!("Source VM size is not available. Fetching a compatible VM size...");
    let sizes = parse_json_list(&ctx.call(&list).await?)?;
    Ok(sizes.into_iter().next())
}

/// Storage SKU of a managed disk, read from the disk itself.
pub async fn fetch_disk_sku(
    ctx: &ExecutionContext,
    resource_group: &str,
    disk_name: &str,
) -> Result<String> {
    let command = AzCommand::new(["disk", "show"])
        .opt("-g", resource_group)
        .opt("-n", disk_name)
        .tsv_query("sku.name");
    let sku = ctx.call_trimmed(&command).await?;
    if sku.is_empty() {
        return Err(RepairError::Unexpected(format!(
            "disk '{disk_name}' reported no SKU"
        )));
    }
    Ok(sku)
}
