//! In-memory fakes for the execution context (testing only)
//!
//! Provides `ScriptedAz`, `StaticCatalog`, `RecordingTelemetry` and
//! `ScriptedPrompt` so orchestrated operations can be driven without the az
//! binary, the network or a terminal. `VmFixture` renders `az vm show`
//! documents.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use az_shell::{AzCommand, AzError, AzExecutor};
use serde_json::{json, Value};

use crate::catalog::{ScriptCatalog, ScriptMap};
use crate::context::ConfirmPrompt;
use crate::error::Result;
use crate::obs::{CommandTelemetry, TelemetrySink};
use crate::session::{DiskMode, OsFamily};

// ---------------------------------------------------------------------------
// ScriptedAz
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    response: std::result::Result<String, String>,
}

/// az executor answering from a list of rules.
///
/// A rule matches when its pattern is a substring of the rendered command
/// (secrets masked). The first matching rule wins; commands no rule matches
/// succeed with empty output. Every command is recorded.
#[derive(Debug, Default)]
pub struct ScriptedAz {
    rules: Vec<Rule>,
    calls: Mutex<Vec<AzCommand>>,
}

impl ScriptedAz {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands containing `pattern` with `stdout`.
    pub fn on(mut self, pattern: &str, stdout: impl Into<String>) -> Self {
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            response: Ok(stdout.into()),
        });
        self
    }

    /// Fail commands containing `pattern` with exit code 1 and `stderr`.
    pub fn fail_on(mut self, pattern: &str, stderr: impl Into<String>) -> Self {
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            response: Err(stderr.into()),
        });
        self
    }

    pub fn calls(&self) -> Vec<AzCommand> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls rendered as `az ...` strings, in order.
    pub fn rendered_calls(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.to_string()).collect()
    }

    pub fn count_matching(&self, pattern: &str) -> usize {
        self.rendered_calls()
            .iter()
            .filter(|c| c.contains(pattern))
            .count()
    }

    /// First recorded call whose rendering contains `pattern`.
    pub fn find(&self, pattern: &str) -> Option<AzCommand> {
        self.calls()
            .into_iter()
            .find(|c| c.to_string().contains(pattern))
    }
}

#[async_trait]
impl AzExecutor for ScriptedAz {
    async fn execute(&self, command: &AzCommand) -> az_shell::Result<String> {
        self.calls.lock().unwrap().push(command.clone());
        let rendered = command.to_string();
        match self.rules.iter().find(|r| rendered.contains(&r.pattern)) {
            Some(Rule {
                response: Ok(stdout),
                ..
            }) => Ok(stdout.clone()),
            Some(Rule {
                response: Err(stderr),
                ..
            }) => Err(AzError::CommandFailed {
                command: rendered,
                exit_code: Some(1),
                stderr: command.redact(stderr),
            }),
            None => Ok(String::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// StaticCatalog
// ---------------------------------------------------------------------------

/// Catalog serving a fixed script map.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    map: ScriptMap,
}

impl StaticCatalog {
    pub fn new(map: ScriptMap) -> Self {
        Self { map }
    }
}

#[async_trait]
impl ScriptCatalog for StaticCatalog {
    async fn fetch_map(&self) -> Result<ScriptMap> {
        Ok(self.map.clone())
    }
}

// ---------------------------------------------------------------------------
// RecordingTelemetry
// ---------------------------------------------------------------------------

/// Sink keeping every record it receives.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    records: Mutex<Vec<CommandTelemetry>>,
}

impl RecordingTelemetry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<CommandTelemetry> {
        self.records.lock().unwrap().clone()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn track(&self, record: &CommandTelemetry) {
        self.records.lock().unwrap().push(record.clone());
    }
}

// ---------------------------------------------------------------------------
// ScriptedPrompt
// ---------------------------------------------------------------------------

/// Prompt with a fixed answer that remembers the questions asked.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answer: bool,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn answering(answer: bool) -> Arc<Self> {
        Arc::new(Self {
            answer,
            asked: Mutex::new(Vec::new()),
        })
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfirmPrompt for ScriptedPrompt {
    async fn confirm(&self, question: &str) -> bool {
        self.asked.lock().unwrap().push(question.to_string());
        self.answer
    }
}

// ---------------------------------------------------------------------------
// VmFixture
// ---------------------------------------------------------------------------

/// Builder for `az vm show -o json` documents.
#[derive(Debug, Clone)]
pub struct VmFixture {
    subscription: String,
    resource_group: String,
    name: String,
    location: String,
    os: OsFamily,
    disk_mode: DiskMode,
    size: String,
    disk_sku: Option<String>,
    image_version: Option<String>,
    data_disks: Vec<(String, String)>,
}

impl VmFixture {
    pub fn new(resource_group: &str, name: &str) -> Self {
        Self {
            subscription: "00000000-0000-0000-0000-000000000000".to_string(),
            resource_group: resource_group.to_string(),
            name: name.to_string(),
            location: "westus2".to_string(),
            os: OsFamily::Linux,
            disk_mode: DiskMode::Managed,
            size: "Standard_D2s_v3".to_string(),
            disk_sku: Some("Premium_LRS".to_string()),
            image_version: None,
            data_disks: Vec::new(),
        }
    }

    pub fn windows(mut self) -> Self {
        self.os = OsFamily::Windows;
        self
    }

    pub fn unmanaged(mut self) -> Self {
        self.disk_mode = DiskMode::Unmanaged;
        self
    }

    pub fn location(mut self, location: &str) -> Self {
        self.location = location.to_string();
        self
    }

    pub fn size(mut self, size: &str) -> Self {
        self.size = size.to_string();
        self
    }

    /// Drop the OS disk SKU, as `az vm show` does for a deallocated VM.
    pub fn deallocated(mut self) -> Self {
        self.disk_sku = None;
        self
    }

    pub fn image_version(mut self, version: &str) -> Self {
        self.image_version = Some(version.to_string());
        self
    }

    pub fn data_disk(mut self, name: &str, uri: &str) -> Self {
        self.data_disks.push((name.to_string(), uri.to_string()));
        self
    }

    pub fn id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/virtualMachines/{}",
            self.subscription, self.resource_group, self.name
        )
    }

    pub fn os_disk_name(&self) -> String {
        format!("{}-osdisk", self.name)
    }

    /// VHD URI of the OS disk when unmanaged.
    pub fn os_disk_uri(&self) -> String {
        format!(
            "https://{}store.blob.core.windows.net/vhds/{}.vhd",
            self.resource_group.replace('-', ""),
            self.os_disk_name()
        )
    }

    pub fn to_value(&self) -> Value {
        let os_type = match self.os {
            OsFamily::Linux => "Linux",
            OsFamily::Windows => "Windows",
        };
        let mut os_disk = json!({
            "name": self.os_disk_name(),
            "osType": os_type,
        });
        match self.disk_mode {
            DiskMode::Managed => {
                os_disk["managedDisk"] = json!({
                    "id": format!(
                        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/disks/{}",
                        self.subscription,
                        self.resource_group,
                        self.os_disk_name()
                    ),
                    "storageAccountType": self.disk_sku,
                });
            }
            DiskMode::Unmanaged => {
                os_disk["vhd"] = json!({ "uri": self.os_disk_uri() });
            }
        }
        let data_disks: Vec<Value> = self
            .data_disks
            .iter()
            .enumerate()
            .map(|(lun, (name, uri))| json!({"name": name, "lun": lun, "vhd": {"uri": uri}}))
            .collect();

        json!({
            "id": self.id(),
            "name": self.name,
            "location": self.location,
            "hardwareProfile": { "vmSize": self.size },
            "storageProfile": {
                "osDisk": os_disk,
                "dataDisks": data_disks,
                "imageReference": {
                    "publisher": "Canonical",
                    "offer": "UbuntuServer",
                    "sku": "18.04-LTS",
                    "version": self.image_version,
                },
            },
        })
    }

    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }
}
