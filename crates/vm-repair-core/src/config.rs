//! Runtime configuration.
//!
//! Values come from the environment with fixed fallbacks; the CLI can
//! override each of them with a flag.

use serde::{Deserialize, Serialize};

/// Catalog document listing every published repair script.
pub const DEFAULT_SCRIPT_MAP_URL: &str =
    "https://raw.githubusercontent.com/Azure/repair-script-library/master/map.json";

/// Default HTTP timeout for catalog requests.
pub const DEFAULT_CATALOG_TIMEOUT_SECS: u64 = 30;

pub const ENV_SCRIPT_MAP_URL: &str = "VM_REPAIR_SCRIPT_MAP_URL";
pub const ENV_AZ_PATH: &str = "VM_REPAIR_AZ_PATH";
pub const ENV_CATALOG_TIMEOUT_SECS: &str = "VM_REPAIR_CATALOG_TIMEOUT_SECS";

/// Repair toolkit configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepairConfig {
    /// URL of the script catalog document
    pub script_map_url: String,
    /// az executable to spawn
    pub az_path: String,
    /// Timeout applied to catalog HTTP requests
    pub catalog_timeout_secs: u64,
}

impl Default for RepairConfig {
    fn default() -> Self {
        let az_default = if cfg!(windows) { "az.cmd" } else { "az" };
        RepairConfig {
            script_map_url: std::env::var(ENV_SCRIPT_MAP_URL)
                .unwrap_or_else(|_| DEFAULT_SCRIPT_MAP_URL.to_string()),
            az_path: std::env::var(ENV_AZ_PATH).unwrap_or_else(|_| az_default.to_string()),
            catalog_timeout_secs: std::env::var(ENV_CATALOG_TIMEOUT_SECS)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CATALOG_TIMEOUT_SECS),
        }
    }
}

impl RepairConfig {
    /// Create a config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Point the catalog at a different document
    pub fn with_script_map_url(mut self, url: &str) -> Self {
        self.script_map_url = url.to_string();
        self
    }

    /// Spawn a different az executable
    pub fn with_az_path(mut self, path: &str) -> Self {
        self.az_path = path.to_string();
        self
    }

    pub fn catalog_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.catalog_timeout_secs)
    }
}
