//! In-memory state of one repair workflow invocation.
//!
//! A session is rebuilt from a live VM query at the start of every
//! operation. Its disk mode is captured once and drives every command
//! template the operation issues.

use serde::{Deserialize, Serialize};

use crate::vm::VirtualMachine;

/// Operating system family of a VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Linux,
    Windows,
}

impl OsFamily {
    /// `az vm run-command` command id for this family.
    pub fn run_command_id(&self) -> &'static str {
        match self {
            OsFamily::Linux => "RunShellScript",
            OsFamily::Windows => "RunPowerShellScript",
        }
    }
}

impl std::fmt::Display for OsFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OsFamily::Linux => f.write_str("linux"),
            OsFamily::Windows => f.write_str("windows"),
        }
    }
}

/// How the OS disk is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskMode {
    /// Managed disk resource, addressed by name or ID
    Managed,
    /// Page blob VHD, addressed by URI
    Unmanaged,
}

/// State of a repair workflow for one source VM.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairSession {
    source_vm: String,
    source_resource_group: String,
    location: String,
    os_family: OsFamily,
    disk_mode: DiskMode,
    source_disk_name: String,
    source_disk_uri: Option<String>,
    repair_vm: String,
    repair_resource_group: String,
    copied_disk_name: Option<String>,
    copied_disk_id: Option<String>,
    created_resources: Vec<String>,
}

impl RepairSession {
    pub fn from_source_vm(
        vm: &VirtualMachine,
        source_resource_group: &str,
        repair_vm: &str,
        repair_resource_group: &str,
    ) -> Self {
        Self {
            source_vm: vm.name.clone(),
            source_resource_group: source_resource_group.to_string(),
            location: vm.location.clone(),
            os_family: vm.os_family(),
            disk_mode: vm.disk_mode(),
            source_disk_name: vm.os_disk_name().to_string(),
            source_disk_uri: vm.os_disk_vhd_uri().map(str::to_string),
            repair_vm: repair_vm.to_string(),
            repair_resource_group: repair_resource_group.to_string(),
            copied_disk_name: None,
            copied_disk_id: None,
            created_resources: Vec::new(),
        }
    }

    pub fn source_vm(&self) -> &str {
        &self.source_vm
    }

    pub fn source_resource_group(&self) -> &str {
        &self.source_resource_group
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn os_family(&self) -> OsFamily {
        self.os_family
    }

    pub fn disk_mode(&self) -> DiskMode {
        self.disk_mode
    }

    pub fn source_disk_name(&self) -> &str {
        &self.source_disk_name
    }

    pub fn source_disk_uri(&self) -> Option<&str> {
        self.source_disk_uri.as_deref()
    }

    /// How the source OS disk is referred to: name if managed, URI otherwise.
    pub fn source_disk_ref(&self) -> &str {
        match (self.disk_mode, self.source_disk_uri.as_deref()) {
            (DiskMode::Unmanaged, Some(uri)) => uri,
            _ => &self.source_disk_name,
        }
    }

    pub fn repair_vm(&self) -> &str {
        &self.repair_vm
    }

    pub fn repair_resource_group(&self) -> &str {
        &self.repair_resource_group
    }

    pub fn copied_disk_name(&self) -> Option<&str> {
        self.copied_disk_name.as_deref()
    }

    /// Managed disk ID or VHD URI of the copy.
    pub fn copied_disk_id(&self) -> Option<&str> {
        self.copied_disk_id.as_deref()
    }

    pub fn created_resources(&self) -> &[String] {
        &self.created_resources
    }

    /// Tag placed on the repair VM linking it to its source.
    pub fn resource_tag(&self) -> String {
        format!(
            "repair_source={}/{}",
            self.source_resource_group, self.source_vm
        )
    }

    pub fn record_copied_disk(&mut self, name: &str, id: &str) {
        self.copied_disk_name = Some(name.to_string());
        self.copied_disk_id = Some(id.to_string());
    }

    pub fn record_created_resources(&mut self, resources: Vec<String>) {
        self.created_resources = resources;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::{OsDisk, StorageProfile, Vhd};

    fn unmanaged_vm() -> VirtualMachine {
        VirtualMachine {
            name: "legacy01".to_string(),
            location: "eastus".to_string(),
            storage_profile: StorageProfile {
                os_disk: OsDisk {
                    name: "legacy01-os".to_string(),
                    os_type: Some("Windows".to_string()),
                    managed_disk: None,
                    vhd: Some(Vhd {
                        uri: "https://acct.blob.core.windows.net/vhds/legacy01-os.vhd".to_string(),
                    }),
                },
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn session_captures_disk_mode_and_tag() {
        let session = RepairSession::from_source_vm(&unmanaged_vm(), "prod-rg", "fixer", "repair-rg");
        assert_eq!(session.disk_mode(), DiskMode::Unmanaged);
        assert_eq!(session.os_family(), OsFamily::Windows);
        assert_eq!(session.resource_tag(), "repair_source=prod-rg/legacy01");
        assert_eq!(
            session.source_disk_ref(),
            "https://acct.blob.core.windows.net/vhds/legacy01-os.vhd"
        );
        assert_eq!(session.location(), "eastus");
    }

    #[test]
    fn records_copy_and_resources() {
        let mut session =
            RepairSession::from_source_vm(&unmanaged_vm(), "prod-rg", "fixer", "repair-rg");
        assert!(session.copied_disk_id().is_none());
        session.record_copied_disk("copy.vhd", "https://acct.blob.core.windows.net/vhds/copy.vhd");
        session.record_created_resources(vec!["/subscriptions/s/resourceGroups/repair-rg/x".into()]);
        assert_eq!(session.copied_disk_name(), Some("copy.vhd"));
        assert_eq!(session.created_resources().len(), 1);
    }

    #[test]
    fn run_command_ids() {
        assert_eq!(OsFamily::Linux.run_command_id(), "RunShellScript");
        assert_eq!(OsFamily::Windows.run_command_id(), "RunPowerShellScript");
    }
}
