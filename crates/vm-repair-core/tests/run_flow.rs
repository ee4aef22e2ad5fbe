//! End-to-end tests for `run` against a scripted az executor.

use std::io::Write;
use std::sync::Arc;

use serde_json::json;
use vm_repair_core::fakes::{RecordingTelemetry, ScriptedAz, StaticCatalog, VmFixture};
use vm_repair_core::{
    run, ExecutionContext, RunRequest, ScriptCatalogEntry, ScriptMap, ScriptSource, Status,
};

const REPAIR_VM_ID: &str =
    "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/repair-rg/providers/Microsoft.Compute/virtualMachines/repair-web01";

const LINUX_SUCCESS_LOG: &str = "[Log-Start 2024-05-01 10:00:00]\n\
[Output 2024-05-01 10:00:01] checking fstab\n\
[Output 2024-05-01 10:00:02] fstab ok\n\
[STATUS]::SUCCESS\n\
[Log-End 2024-05-01 10:00:03] /var/log/vmrepair/run-20240501100000.log";

fn catalog() -> StaticCatalog {
    StaticCatalog::new(ScriptMap::new(vec![
        ScriptCatalogEntry::new("42", "scripts/diag.sh"),
        ScriptCatalogEntry::new("win-chkdsk", "src/windows/win-chkdsk.ps1"),
    ]))
}

fn context(az: &Arc<ScriptedAz>) -> (ExecutionContext, Arc<RecordingTelemetry>) {
    let telemetry = RecordingTelemetry::new();
    let ctx = ExecutionContext::new(az.clone(), Arc::new(catalog()))
        .with_telemetry(telemetry.clone());
    (ctx, telemetry)
}

fn linux_output(stdout: &str, stderr: &str) -> String {
    json!({
        "value": [{
            "code": "ProvisioningState/succeeded",
            "message": format!("Enable succeeded: \n[stdout]\n{stdout}\n[stderr]\n{stderr}\n"),
        }]
    })
    .to_string()
}

fn linux_az(output: String) -> ScriptedAz {
    ScriptedAz::new()
        .on("vm show", VmFixture::new("prod-rg", "web01").to_json())
        .on("run-command invoke", output)
}

#[tokio::test]
async fn catalog_script_runs_with_relative_path() {
    let az = Arc::new(linux_az(linux_output(LINUX_SUCCESS_LOG, "")));
    let (ctx, telemetry) = context(&az);

    let outcome = run(
        &ctx,
        &RunRequest::new("web01", "prod-rg", ScriptSource::RunId("42".into())),
    )
    .await;

    assert_eq!(outcome.status, Status::Success, "{:?}", outcome.error_message);
    assert_eq!(outcome.message, "Script completed without error.");
    let details = outcome.details.clone().unwrap();
    assert_eq!(details.output, "checking fstab\nfstab ok");
    assert_eq!(details.log_full_path, "/var/log/vmrepair/run-20240501100000.log");
    assert!(!details.log_truncated);
    assert_eq!(details.logs, LINUX_SUCCESS_LOG);
    assert_eq!(details.vm_name, "web01");
    assert_eq!(details.resource_group, "prod-rg");

    let invoke = az.find("run-command invoke").unwrap();
    assert_eq!(invoke.value_of("-g"), Some("prod-rg"));
    assert_eq!(invoke.value_of("-n"), Some("web01"));
    assert_eq!(invoke.value_of("--command-id"), Some("RunShellScript"));
    assert_eq!(
        invoke.values_of("--parameters"),
        vec!["script_path=./scripts/diag.sh"]
    );
    let scripts = invoke.values_of("--scripts");
    assert_eq!(scripts.len(), 1);
    assert!(scripts[0].starts_with('@') && scripts[0].ends_with(".sh"));
    // driver file only lives for the call
    assert!(!std::path::Path::new(&scripts[0][1..]).exists());

    let records = telemetry.records();
    assert_eq!(records.len(), 1);
    let script = records[0].script.clone().unwrap();
    assert_eq!(script.run_id.as_deref(), Some("42"));
    assert_eq!(script.status, Status::Success);
    assert!(script.duration_ms.is_some());
}

#[tokio::test]
async fn parameter_spaces_are_percent_encoded() {
    let az = Arc::new(linux_az(linux_output(LINUX_SUCCESS_LOG, "")));
    let (ctx, _) = context(&az);

    let request = RunRequest::new("web01", "prod-rg", ScriptSource::RunId("42".into()))
        .with_parameters(["greeting=hello world", "verbose"]);
    let outcome = run(&ctx, &request).await;

    assert!(outcome.is_success());
    let invoke = az.find("run-command invoke").unwrap();
    assert_eq!(
        invoke.values_of("--parameters"),
        vec![
            "script_path=./scripts/diag.sh",
            "params=greeting=hello%20world%20verbose"
        ]
    );
}

#[tokio::test]
async fn windows_uses_powershell_driver_and_parameters() {
    let output = json!({
        "value": [
            {"message": "[Log-Start 2024-05-01 10:00:00]\r\n[Output 2024-05-01 10:00:01] disk clean\r\n[STATUS]::SUCCESS\r\n[Log-End 2024-05-01 10:00:02] C:\\Windows\\Temp\\vmrepair\\run.log"},
            {"message": ""}
        ]
    })
    .to_string();
    let az = Arc::new(
        ScriptedAz::new()
            .on("vm show", VmFixture::new("prod-rg", "web01").windows().to_json())
            .on("run-command invoke", output),
    );
    let (ctx, _) = context(&az);

    let request = RunRequest::new("web01", "prod-rg", ScriptSource::RunId("win-chkdsk".into()))
        .with_parameters(["drive=C:"]);
    let outcome = run(&ctx, &request).await;

    assert!(outcome.is_success(), "{:?}", outcome.error_message);
    assert_eq!(outcome.details.unwrap().output, "disk clean");
    let invoke = az.find("run-command invoke").unwrap();
    assert_eq!(invoke.value_of("--command-id"), Some("RunPowerShellScript"));
    assert!(invoke.values_of("--scripts")[0].ends_with(".ps1"));
    assert_eq!(
        invoke.values_of("--parameters"),
        vec!["script_path=./src/windows/win-chkdsk.ps1", "params=-drive%20C:"]
    );
}

#[tokio::test]
async fn failed_script_reports_error_lines_with_details() {
    let log = "[Log-Start 2024-05-01 10:00:00]\n\
[Output 2024-05-01 10:00:01] checking fstab\n\
[Error 2024-05-01 10:00:02] /dev/sdc1 not found\n\
[STATUS]::ERROR\n\
[Log-End 2024-05-01 10:00:03] /var/log/vmrepair/run.log";
    let az = Arc::new(linux_az(linux_output(log, "mount: failure")));
    let (ctx, telemetry) = context(&az);

    let outcome = run(
        &ctx,
        &RunRequest::new("web01", "prod-rg", ScriptSource::RunId("42".into())),
    )
    .await;

    assert_eq!(outcome.status, Status::Error);
    assert_eq!(outcome.message, "Script returned with possible errors.");
    assert_eq!(outcome.details.clone().unwrap().output, "/dev/sdc1 not found");
    let value = outcome.to_value();
    assert_eq!(value["status"], json!("ERROR"));
    assert_eq!(value["log_full_path"], json!("/var/log/vmrepair/run.log"));

    let script = telemetry.records()[0].script.clone().unwrap();
    assert_eq!(script.status, Status::Error);
    assert_eq!(script.output, "/dev/sdc1 not found");
}

#[tokio::test]
async fn missing_log_start_marks_truncation() {
    let log = "tail of an earlier line\n\
[Output 2024-05-01 10:00:09] done\n\
[STATUS]::SUCCESS\n\
[Log-End 2024-05-01 10:00:10] /var/log/vmrepair/run.log";
    let az = Arc::new(linux_az(linux_output(log, "")));
    let (ctx, _) = context(&az);

    let outcome = run(
        &ctx,
        &RunRequest::new("web01", "prod-rg", ScriptSource::RunId("42".into())),
    )
    .await;

    assert!(outcome.is_success());
    let details = outcome.details.unwrap();
    assert!(details.log_truncated);
    assert_eq!(details.log_full_path, "/var/log/vmrepair/run.log");
}

#[tokio::test]
async fn unknown_run_id_is_reported() {
    let az = Arc::new(linux_az(linux_output(LINUX_SUCCESS_LOG, "")));
    let (ctx, telemetry) = context(&az);

    let outcome = run(
        &ctx,
        &RunRequest::new("web01", "prod-rg", ScriptSource::RunId("nope".into())),
    )
    .await;

    assert_eq!(outcome.status, Status::Error);
    assert_eq!(outcome.message, "Repair run failed. Run ID not found.");
    assert_eq!(az.count_matching("run-command invoke"), 0);

    let script = telemetry.records()[0].script.clone().unwrap();
    assert_eq!(script.output, "Script returned with possible errors.");
    assert!(script.duration_ms.is_none());
}

#[tokio::test]
async fn custom_script_is_uploaded_after_driver() {
    let mut custom = tempfile::Builder::new().suffix(".sh").tempfile().unwrap();
    writeln!(custom, "echo custom").unwrap();
    let az = Arc::new(linux_az(linux_output(LINUX_SUCCESS_LOG, "")));
    let (ctx, _) = context(&az);

    let request = RunRequest::new(
        "web01",
        "prod-rg",
        ScriptSource::CustomFile(custom.path().to_path_buf()),
    );
    let outcome = run(&ctx, &request).await;

    assert!(outcome.is_success(), "{:?}", outcome.error_message);
    let invoke = az.find("run-command invoke").unwrap();
    let scripts = invoke.values_of("--scripts");
    assert_eq!(scripts.len(), 2);
    assert_eq!(scripts[1], format!("@{}", custom.path().display()));
    assert_eq!(invoke.values_of("--parameters"), vec!["script_path=no-op"]);
}

#[tokio::test]
async fn missing_custom_script_is_invalid() {
    let az = Arc::new(linux_az(linux_output(LINUX_SUCCESS_LOG, "")));
    let (ctx, _) = context(&az);

    let request = RunRequest::new(
        "web01",
        "prod-rg",
        ScriptSource::CustomFile("/nonexistent/fix.sh".into()),
    );
    let outcome = run(&ctx, &request).await;

    assert_eq!(outcome.status, Status::Error);
    assert!(outcome.message.contains("Invalid arguments"));
    assert!(az.calls().is_empty());
}

#[tokio::test]
async fn run_on_repair_targets_repair_vm() {
    let az = Arc::new(linux_az(linux_output(LINUX_SUCCESS_LOG, "")));
    let (ctx, _) = context(&az);

    let request = RunRequest::new("web01", "prod-rg", ScriptSource::RunId("42".into()))
        .on_repair_vm(REPAIR_VM_ID);
    let outcome = run(&ctx, &request).await;

    assert!(outcome.is_success());
    let details = outcome.details.unwrap();
    assert_eq!(details.vm_name, "repair-web01");
    assert_eq!(details.resource_group, "repair-rg");
    // OS family still comes from the source VM
    assert_eq!(
        az.find("vm show").unwrap().value_of("-n"),
        Some("web01")
    );
    let invoke = az.find("run-command invoke").unwrap();
    assert_eq!(invoke.value_of("-g"), Some("repair-rg"));
    assert_eq!(invoke.value_of("-n"), Some("repair-web01"));
}

#[tokio::test]
async fn run_on_repair_without_id_is_invalid() {
    let az = Arc::new(linux_az(linux_output(LINUX_SUCCESS_LOG, "")));
    let (ctx, _) = context(&az);

    let mut request = RunRequest::new("web01", "prod-rg", ScriptSource::RunId("42".into()));
    request.run_on_repair = true;
    let outcome = run(&ctx, &request).await;

    assert_eq!(outcome.status, Status::Error);
    assert!(outcome.message.contains("Invalid arguments"));
    assert!(az.calls().is_empty());
}

#[tokio::test]
async fn az_failure_is_repair_run_failed() {
    let az = Arc::new(
        ScriptedAz::new()
            .on("vm show", VmFixture::new("prod-rg", "web01").to_json())
            .fail_on("run-command invoke", "Conflict: VM agent is not ready"),
    );
    let (ctx, _) = context(&az);

    let outcome = run(
        &ctx,
        &RunRequest::new("web01", "prod-rg", ScriptSource::RunId("42".into())),
    )
    .await;

    assert_eq!(outcome.status, Status::Error);
    assert_eq!(outcome.message, "Repair run failed.");
    assert!(outcome.error_message.unwrap().contains("VM agent is not ready"));
    assert_eq!(az.count_matching("group delete"), 0);
}
