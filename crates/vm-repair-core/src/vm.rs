//! Typed view of `az vm show` output.
//!
//! Only the fields the repair workflow reads are modelled; everything else
//! in the document is ignored.

use az_shell::AzCommand;
use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::session::{DiskMode, OsFamily};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachine {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub hardware_profile: HardwareProfile,
    #[serde(default)]
    pub storage_profile: StorageProfile,
    #[serde(default)]
    pub os_profile: Option<OsProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareProfile {
    #[serde(default)]
    pub vm_size: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageProfile {
    #[serde(default)]
    pub os_disk: OsDisk,
    #[serde(default)]
    pub data_disks: Vec<DataDisk>,
    #[serde(default)]
    pub image_reference: Option<ImageReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsDisk {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub os_type: Option<String>,
    #[serde(default)]
    pub managed_disk: Option<ManagedDisk>,
    #[serde(default)]
    pub vhd: Option<Vhd>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedDisk {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub storage_account_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vhd {
    pub uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataDisk {
    pub name: String,
    #[serde(default)]
    pub lun: Option<i32>,
    #[serde(default)]
    pub vhd: Option<Vhd>,
    #[serde(default)]
    pub managed_disk: Option<ManagedDisk>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageReference {
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub offer: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsProfile {
    #[serde(default)]
    pub linux_configuration: Option<serde_json::Value>,
    #[serde(default)]
    pub windows_configuration: Option<serde_json::Value>,
}

impl VirtualMachine {
    /// OS family, from the OS disk type or, failing that, the OS profile.
    pub fn os_family(&self) -> OsFamily {
        match self.storage_profile.os_disk.os_type.as_deref() {
            Some(t) if t.eq_ignore_ascii_case("linux") => OsFamily::Linux,
            Some(t) if t.eq_ignore_ascii_case("windows") => OsFamily::Windows,
            _ => match &self.os_profile {
                Some(profile) if profile.linux_configuration.is_some() => OsFamily::Linux,
                _ => OsFamily::Windows,
            },
        }
    }

    pub fn disk_mode(&self) -> DiskMode {
        if self.storage_profile.os_disk.managed_disk.is_some() {
            DiskMode::Managed
        } else {
            DiskMode::Unmanaged
        }
    }

    pub fn os_disk_name(&self) -> &str {
        &self.storage_profile.os_disk.name
    }

    /// Storage SKU of the managed OS disk. Absent while the VM is deallocated.
    pub fn os_disk_sku(&self) -> Option<&str> {
        self.storage_profile
            .os_disk
            .managed_disk
            .as_ref()
            .and_then(|m| m.storage_account_type.as_deref())
            .filter(|s| !s.is_empty())
    }

    pub fn os_disk_vhd_uri(&self) -> Option<&str> {
        self.storage_profile
            .os_disk
            .vhd
            .as_ref()
            .map(|v| v.uri.as_str())
    }

    /// VHD URI of the data disk called `name`.
    pub fn data_disk_uri(&self, name: &str) -> Option<&str> {
        self.storage_profile
            .data_disks
            .iter()
            .find(|d| d.name == name)
            .and_then(|d| d.vhd.as_ref())
            .map(|v| v.uri.as_str())
    }

    pub fn vm_size(&self) -> Option<&str> {
        self.hardware_profile.vm_size.as_deref()
    }

    pub fn image_version(&self) -> Option<&str> {
        self.storage_profile
            .image_reference
            .as_ref()
            .and_then(|i| i.version.as_deref())
    }
}

/// Query a VM with `az vm show`.
pub async fn show_vm(
    ctx: &ExecutionContext,
    resource_group: &str,
    name: &str,
) -> Result<VirtualMachine> {
    let command = AzCommand::new(["vm", "show"])
        .opt("-g", resource_group)
        .opt("-n", name)
        .json_output();
    let raw = ctx.call(&command).await?;
    Ok(serde_json::from_str(&raw)?)
}
