//! Client for the remote repair-script catalog.
//!
//! The catalog is a JSON document `{"map": [{"id": .., "path": .., ...}]}`
//! published alongside the scripts. It is fetched on every use and never
//! cached.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RepairConfig;
use crate::error::{RepairError, Result};

/// One published repair script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptCatalogEntry {
    /// Run identifier passed as `--run-id`
    pub id: String,
    /// Script path relative to the repository root
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Any further metadata published with the entry
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ScriptCatalogEntry {
    pub fn new(id: &str, path: &str) -> Self {
        Self {
            id: id.to_string(),
            path: path.to_string(),
            description: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// The catalog document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptMap {
    #[serde(default)]
    pub map: Vec<ScriptCatalogEntry>,
}

impl ScriptMap {
    pub fn new(entries: Vec<ScriptCatalogEntry>) -> Self {
        Self { map: entries }
    }

    /// Script path for `run_id`.
    pub fn resolve(&self, run_id: &str) -> Result<&str> {
        self.map
            .iter()
            .find(|e| e.id == run_id)
            .map(|e| e.path.as_str())
            .ok_or_else(|| RepairError::RunScriptNotFoundForId(run_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Source of the script catalog.
#[async_trait]
pub trait ScriptCatalog: Send + Sync {
    /// Fetch the whole catalog.
    async fn fetch_map(&self) -> Result<ScriptMap>;

    /// Fetch the catalog and resolve `run_id` to a script path.
    async fn fetch_script_path(&self, run_id: &str) -> Result<String> {
        let map = self.fetch_map().await?;
        map.resolve(run_id).map(str::to_string)
    }
}

/// Catalog fetched over HTTP.
#[derive(Debug, Clone)]
pub struct HttpScriptCatalog {
    url: String,
    client: reqwest::Client,
}

impl HttpScriptCatalog {
    pub fn new(url: &str, timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("vm-repair/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    pub fn from_config(config: &RepairConfig) -> Result<Self> {
        Self::new(&config.script_map_url, config.catalog_timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ScriptCatalog for HttpScriptCatalog {
    async fn fetch_map(&self) -> Result<ScriptMap> {
        debug!(url = %self.url, "fetching run script catalog");
        let map = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<ScriptMap>()
            .await?;
        debug!(entries = map.len(), "run script catalog fetched");
        Ok(map)
    }
}
