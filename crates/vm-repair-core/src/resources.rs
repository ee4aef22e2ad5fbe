//! Tracking and cleanup of resources in a repair resource group.

use az_shell::AzCommand;
use tracing::{error, info, warn};

use crate::context::ExecutionContext;
use crate::error::Result;

/// How a cleanup attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupResult {
    /// Deletion of the resource group was requested
    Deleted,
    /// The user declined the confirmation prompt
    Skipped,
    /// An az command failed; the group may still exist
    Failed,
}

/// IDs of every resource in `resource_group`.
pub async fn list_resource_ids_in_rg(
    ctx: &ExecutionContext,
    resource_group: &str,
) -> Result<Vec<String>> {
    let command = AzCommand::new(["resource", "list"])
        .opt("-g", resource_group)
        .tsv_query("[].id");
    let raw = ctx.call(&command).await?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Delete `resource_group` and everything in it. Never fails.
///
/// With `confirm`, the resources are listed and the user is asked first;
/// if they cannot be listed nothing is deleted.
/// Deletion is requested with `--no-wait`.
pub async fn clean_up_resources(
    ctx: &ExecutionContext,
    resource_group: &str,
    confirm: bool,
) -> CleanupResult {
    if confirm {
        let resources = match list_resource_ids_in_rg(ctx, resource_group).await {
            Ok(resources) => resources,
            Err(e) => {
                error!(error = %e, "Clean up failed.");
                return CleanupResult::Failed;
            }
        };
        warn!(
            "The clean-up will remove the resource group '{}' and all repair resources within:\n\n{}",
            resource_group,
            resources.join("\n")
        );
        if !ctx
            .prompt()
            .confirm("Continue with clean-up and delete resources?")
            .await
        {
            warn!("Skipping clean-up");
            return CleanupResult::Skipped;
        }
    }

    let command = AzCommand::new(["group", "delete"])
        .opt("--name", resource_group)
        .arg("--yes")
        .arg("--no-wait");
    info!(
        "Cleaning up resources by deleting repair resource group '{}'...",
        resource_group
    );
    match ctx.call(&command).await {
        Ok(_) => CleanupResult::Deleted,
        Err(e) => {
            error!(error = %e, "Clean up failed.");
            CleanupResult::Failed
        }
    }
}
