//! Driver scripts shipped with the toolkit.
//!
//! run-command executes a local file, so the driver for the target OS is
//! written to a temporary file that lives as long as the invocation. The
//! driver fetches the catalog script named by `script_path`, runs it with
//! the decoded `params`, and frames the output as log records.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::Result;
use crate::session::OsFamily;

const LINUX_DRIVER: &str = include_str!("../../scripts/linux-run-driver.sh");
const WINDOWS_DRIVER: &str = include_str!("../../scripts/win-run-driver.ps1");

/// Source text of the driver for `os`.
pub fn driver_source(os: OsFamily) -> &'static str {
    match os {
        OsFamily::Linux => LINUX_DRIVER,
        OsFamily::Windows => WINDOWS_DRIVER,
    }
}

/// A driver script written to disk.
#[derive(Debug)]
pub struct DriverScript {
    file: NamedTempFile,
}

impl DriverScript {
    pub fn materialize(os: OsFamily) -> Result<Self> {
        let suffix = match os {
            OsFamily::Linux => ".sh",
            OsFamily::Windows => ".ps1",
        };
        let mut file = tempfile::Builder::new()
            .prefix("vm-repair-driver-")
            .suffix(suffix)
            .tempfile()?;
        file.write_all(driver_source(os).as_bytes())?;
        file.flush()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// `@<path>` as accepted by `--scripts`.
    pub fn script_arg(&self) -> String {
        format!("@{}", self.path().display())
    }
}
