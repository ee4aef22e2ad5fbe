//! End-to-end tests for `create` against a scripted az executor.

use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use vm_repair_core::fakes::{RecordingTelemetry, ScriptedAz, StaticCatalog, VmFixture};
use vm_repair_core::obs::REDACTED;
use vm_repair_core::{create, CreateRequest, ExecutionContext, Status};

const COPY_ID: &str =
    "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/prod-rg/providers/Microsoft.Compute/disks/web01-copy";

fn context(az: &Arc<ScriptedAz>) -> (ExecutionContext, Arc<RecordingTelemetry>) {
    let telemetry = RecordingTelemetry::new();
    let ctx = ExecutionContext::new(az.clone(), Arc::new(StaticCatalog::default()))
        .with_telemetry(telemetry.clone());
    (ctx, telemetry)
}

fn request() -> CreateRequest {
    CreateRequest::new("web01", "prod-rg", "Hunter2!Secret")
        .with_repair_vm_name("repair-web01")
        .with_copy_disk_name("web01-copy")
        .with_repair_group_name("repair-rg")
}

fn managed_az() -> ScriptedAz {
    ScriptedAz::new()
        .on("vm show", VmFixture::new("prod-rg", "web01").to_json())
        .on("list-skus -s Standard_D2s_v3", "Standard_D2s_v3\n")
        .on("disk create", format!("{COPY_ID}\n"))
        .on(
            "resource list",
            "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/repair-rg/providers/Microsoft.Compute/virtualMachines/repair-web01\n",
        )
}

fn position(calls: &[String], pattern: &str) -> usize {
    calls
        .iter()
        .position(|c| c.contains(pattern))
        .unwrap_or_else(|| panic!("no call matching '{pattern}' in {calls:#?}"))
}

#[tokio::test]
async fn managed_disk_happy_path() {
    let az = Arc::new(managed_az());
    let (ctx, telemetry) = context(&az);

    let outcome = create(&ctx, &request()).await;

    assert_eq!(outcome.status, Status::Success, "{:?}", outcome.error_message);
    let details = outcome.details.clone().unwrap();
    assert_eq!(details.repair_vm_name, "repair-web01");
    assert_eq!(details.copied_disk_name, "web01-copy");
    assert_eq!(details.copied_disk_uri, COPY_ID);
    assert_eq!(details.repair_resource_group, "repair-rg");
    assert_eq!(details.resource_tag, "repair_source=prod-rg/web01");
    assert_eq!(details.created_resources.len(), 2);
    assert_eq!(details.created_resources.last().map(String::as_str), Some(COPY_ID));
    assert_eq!(
        details.repair_vm_id.as_deref(),
        Some("/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/repair-rg/providers/Microsoft.Compute/virtualMachines/repair-web01")
    );
    assert!(outcome.message.contains("vm-repair restore -n web01 -g prod-rg"));

    let calls = az.rendered_calls();
    assert!(position(&calls, "group create") < position(&calls, "--validate"));
    assert!(position(&calls, "--validate") < position(&calls, "disk create"));
    assert!(position(&calls, "disk create") < position(&calls, "vm disk attach"));
    assert_eq!(az.count_matching("az vm create"), 2);
    assert_eq!(az.count_matching("group delete"), 0);
    assert!(calls.iter().all(|c| !c.contains("Hunter2!Secret")));

    let copy = az.find("disk create").unwrap();
    assert_eq!(copy.value_of("-g"), Some("prod-rg"));
    assert_eq!(copy.value_of("--source"), Some("web01-osdisk"));
    assert_eq!(copy.value_of("--sku"), Some("Premium_LRS"));
    let attach = az.find("vm disk attach").unwrap();
    assert_eq!(attach.value_of("--name"), Some(COPY_ID));
    assert_eq!(attach.value_of("--vm-name"), Some("repair-web01"));

    let vm_create = az.find("az vm create").unwrap();
    assert_eq!(vm_create.value_of("--admin-password"), Some("Hunter2!Secret"));
    assert_eq!(vm_create.value_of("--image"), Some("UbuntuLTS"));
    assert!(!vm_create.has_arg("--admin-username"));

    let records = telemetry.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].command, "vm repair create");
    assert_eq!(records[0].status, Status::Success);
    assert_eq!(records[0].parameters["repair_password"], REDACTED);
}

#[tokio::test]
async fn deallocated_vm_reads_disk_sku_from_disk() {
    let az = Arc::new(
        ScriptedAz::new()
            .on(
                "vm show",
                VmFixture::new("prod-rg", "web01").deallocated().to_json(),
            )
            .on("list-skus -s Standard_D2s_v3", "Standard_D2s_v3")
            .on("disk show", "StandardSSD_LRS\n")
            .on("disk create", COPY_ID),
    );
    let (ctx, _) = context(&az);

    let outcome = create(&ctx, &request()).await;

    assert!(outcome.is_success());
    let copy = az.find("disk create").unwrap();
    assert_eq!(copy.value_of("--sku"), Some("StandardSSD_LRS"));
    assert_eq!(az.find("disk show").unwrap().value_of("-n"), Some("web01-osdisk"));
}

#[tokio::test]
async fn failed_resource_listing_keeps_repair_vm() {
    let az = Arc::new(
        ScriptedAz::new()
            .on("vm show", VmFixture::new("prod-rg", "web01").to_json())
            .on("list-skus -s Standard_D2s_v3", "Standard_D2s_v3\n")
            .on("disk create", format!("{COPY_ID}\n"))
            .fail_on("resource list", "TooManyRequests: throttled"),
    );
    let (ctx, _telemetry) = context(&az);

    let outcome = create(&ctx, &request()).await;

    assert_eq!(outcome.status, Status::Success, "{:?}", outcome.error_message);
    assert_eq!(az.count_matching("vm disk attach"), 1);
    assert_eq!(az.count_matching("group delete"), 0);
    let details = outcome.details.unwrap();
    assert_eq!(details.created_resources, vec![COPY_ID.to_string()]);
}

#[tokio::test]
async fn disk_copy_failure_cleans_up_exactly_once() {
    let az = Arc::new(
        ScriptedAz::new()
            .on("vm show", VmFixture::new("prod-rg", "web01").to_json())
            .on("list-skus -s Standard_D2s_v3", "Standard_D2s_v3")
            .fail_on("disk create", "QuotaExceeded"),
    );
    let (ctx, telemetry) = context(&az);

    let outcome = create(&ctx, &request()).await;

    assert_eq!(outcome.status, Status::Error);
    assert_eq!(
        outcome.message,
        "Repair create failed. Cleaning up created resources."
    );
    assert!(outcome.error_message.unwrap().contains("QuotaExceeded"));
    assert_eq!(az.count_matching("az group delete --name repair-rg --yes --no-wait"), 1);
    assert_eq!(az.count_matching("vm disk attach"), 0);

    let value = telemetry.records()[0].result.clone();
    assert_eq!(value["status"], json!("ERROR"));
}

#[tokio::test]
async fn no_compatible_size_fails_before_creating_anything() {
    let az = Arc::new(
        ScriptedAz::new()
            .on("vm show", VmFixture::new("prod-rg", "web01").size("Standard_M128").to_json())
            .on("list-skus", "[]"),
    );
    let (ctx, _) = context(&az);

    let outcome = create(&ctx, &request()).await;

    assert_eq!(outcome.status, Status::Error);
    assert!(outcome.message.starts_with("Please check if the current subscription"));
    assert_eq!(az.count_matching("group create"), 0);
    assert_eq!(az.count_matching("group delete"), 1);
}

#[tokio::test]
async fn fallback_size_used_when_source_size_unavailable() {
    let az = Arc::new(
        ScriptedAz::new()
            .on("vm show", VmFixture::new("prod-rg", "web01").size("Standard_M128").to_json())
            .on("list-skus -s Standard_M128", "")
            .on("list-skus -s standard_d", "[\"Standard_D2s_v3\", \"Standard_D4s_v3\"]")
            .on("disk create", COPY_ID),
    );
    let (ctx, _) = context(&az);

    let outcome = create(&ctx, &request()).await;

    assert!(outcome.is_success());
    let vm_create = az.find("az vm create").unwrap();
    assert_eq!(vm_create.value_of("--size"), Some("Standard_D2s_v3"));
}

fn unmanaged_az(copy_status: &str) -> ScriptedAz {
    ScriptedAz::new()
        .on(
            "vm show",
            VmFixture::new("prod-rg", "web01").unmanaged().to_json(),
        )
        .on("list-skus -s Standard_D2s_v3", "Standard_D2s_v3")
        .on(
            "show-connection-string",
            "DefaultEndpointsProtocol=https;AccountName=prodrgstore;AccountKey=TOPSECRETKEY\n",
        )
        .on("blob snapshot", "2024-05-01T10:00:00.0000000Z\n")
        .on("properties.copy.status", format!("{copy_status}\n"))
}

#[tokio::test]
async fn unmanaged_disk_happy_path() {
    let az = Arc::new(unmanaged_az("success"));
    let (ctx, _) = context(&az);

    let outcome = create(&ctx, &request()).await;

    assert!(outcome.is_success(), "{:?}", outcome.error_message);
    let details = outcome.details.unwrap();
    assert_eq!(details.copied_disk_name, "web01-copy.vhd");
    assert_eq!(
        details.copied_disk_uri,
        "https://prodrgstore.blob.core.windows.net/vhds/web01-copy.vhd"
    );

    let snapshot = az.find("blob snapshot").unwrap();
    assert_eq!(snapshot.value_of("-c"), Some("vhds"));
    assert_eq!(snapshot.value_of("-n"), Some("web01-osdisk.vhd"));
    let copy = az.find("blob copy start").unwrap();
    assert_eq!(copy.value_of("-b"), Some("web01-copy.vhd"));
    assert_eq!(
        copy.value_of("--source-uri"),
        Some("https://prodrgstore.blob.core.windows.net/vhds/web01-osdisk.vhd?snapshot=2024-05-01T10:00:00.0000000Z")
    );
    let attach = az.find("unmanaged-disk attach").unwrap();
    assert_eq!(
        attach.value_of("--vhd-uri"),
        Some("https://prodrgstore.blob.core.windows.net/vhds/web01-copy.vhd")
    );

    let calls = az.rendered_calls();
    assert!(calls.iter().all(|c| !c.contains("TOPSECRETKEY")));
    assert!(position(&calls, "blob copy start") < position(&calls, "--use-unmanaged-disk"));
    assert!(position(&calls, "--use-unmanaged-disk") < position(&calls, "properties.copy.status"));
}

#[tokio::test]
async fn pending_copy_is_an_error() {
    let az = Arc::new(unmanaged_az("pending"));
    let (ctx, _) = context(&az);

    let outcome = create(&ctx, &request()).await;

    assert_eq!(outcome.status, Status::Error);
    assert_eq!(
        outcome.message,
        "Repair create failed. Please try again at another time. Cleaning up created resources."
    );
    assert!(outcome.error_message.unwrap().contains("pending"));
    assert_eq!(az.count_matching("unmanaged-disk attach"), 0);
    assert_eq!(az.count_matching("group delete"), 1);
}

#[tokio::test]
async fn windows_requires_username() {
    let az = Arc::new(ScriptedAz::new().on(
        "vm show",
        VmFixture::new("prod-rg", "web01").windows().to_json(),
    ));
    let (ctx, _) = context(&az);

    let outcome = create(&ctx, &request()).await;

    assert_eq!(outcome.status, Status::Error);
    assert!(outcome.message.contains("Invalid arguments"));
    assert_eq!(az.count_matching("group create"), 0);
}

#[tokio::test]
async fn windows_skips_image_matching_source_version() {
    let az = Arc::new(
        ScriptedAz::new()
            .on(
                "vm show",
                VmFixture::new("prod-rg", "web01")
                    .windows()
                    .image_version("14393.3000.1906")
                    .to_json(),
            )
            .on(
                "vm image list",
                json!([
                    "MicrosoftWindowsServer:WindowsServer:2016-Datacenter:14393.3000.1906",
                    "MicrosoftWindowsServer:WindowsServer:2016-Datacenter:14393.2999.1905"
                ])
                .to_string(),
            )
            .on("list-skus -s Standard_D2s_v3", "Standard_D2s_v3")
            .on("disk create", COPY_ID),
    );
    let (ctx, _) = context(&az);

    let outcome = create(&ctx, &request().with_username("fixer")).await;

    assert!(outcome.is_success(), "{:?}", outcome.error_message);
    let vm_create = az.find("az vm create").unwrap();
    assert_eq!(
        vm_create.value_of("--image"),
        Some("MicrosoftWindowsServer:WindowsServer:2016-Datacenter:14393.2999.1905")
    );
    assert_eq!(vm_create.value_of("--admin-username"), Some("fixer"));
    assert!(az.rendered_calls().iter().all(|c| !c.contains("fixer")));
}

#[tokio::test]
async fn no_windows_image_is_reported() {
    let az = Arc::new(
        ScriptedAz::new()
            .on("vm show", VmFixture::new("prod-rg", "web01").windows().to_json())
            .on("vm image list", "[]"),
    );
    let (ctx, _) = context(&az);

    let outcome = create(&ctx, &request().with_username("fixer")).await;

    assert_eq!(outcome.status, Status::Error);
    assert!(outcome.message.starts_with("A compatible Windows OS image is not available"));
}

#[tokio::test]
async fn interrupt_cleans_up_once() {
    let az = Arc::new(managed_az());
    let (ctx, _) = context(&az);
    let token = CancellationToken::new();
    token.cancel();
    let ctx = ctx.with_interrupt(token);

    let outcome = create(&ctx, &request()).await;

    assert_eq!(outcome.status, Status::Error);
    assert_eq!(
        outcome.message,
        "Command interrupted by user input. Cleaning up resources."
    );
    assert_eq!(az.count_matching("group delete"), 1);
    assert_eq!(az.count_matching("group create"), 0);
}

#[tokio::test]
async fn outcome_always_has_status() {
    let az = Arc::new(ScriptedAz::new().on("vm show", "not json"));
    let (ctx, _) = context(&az);

    let value = create(&ctx, &request()).await.to_value();

    assert_eq!(value["status"], json!("ERROR"));
    assert_eq!(
        value["message"],
        json!("An unexpected error occurred. Try running again with the --verbose flag to debug.")
    );
}
