//! Execution context injected into every orchestrated operation.
//!
//! Carries the collaborators an operation talks to: the az executor, the
//! script catalog, telemetry, progress reporting, the confirmation prompt
//! and the interrupt token.

use std::sync::Arc;

use async_trait::async_trait;
use az_shell::{AzCommand, AzExecutor, ProcessAzExecutor};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::catalog::{HttpScriptCatalog, ScriptCatalog};
use crate::config::RepairConfig;
use crate::error::Result;
use crate::obs::{TelemetrySink, TracingTelemetry};

/// Reports progress of a long-running operation.
pub trait ProgressReporter: Send + Sync {
    fn begin(&self);
    fn update(&self, message: &str);
    fn end(&self);
}

/// Progress reporter that writes through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn begin(&self) {
        debug!("operation running");
    }

    fn update(&self, message: &str) {
        info!("{message}");
    }

    fn end(&self) {
        debug!("operation finished");
    }
}

/// Asks the user a yes/no question.
#[async_trait]
pub trait ConfirmPrompt: Send + Sync {
    async fn confirm(&self, question: &str) -> bool;
}

/// Prompt on stderr, answer read from stdin. Anything but y/yes is a no.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

#[async_trait]
impl ConfirmPrompt for StdinPrompt {
    async fn confirm(&self, question: &str) -> bool {
        let mut stderr = tokio::io::stderr();
        if stderr
            .write_all(format!("{question} (y/n): ").as_bytes())
            .await
            .is_err()
        {
            return false;
        }
        let _ = stderr.flush().await;

        let mut answer = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        match reader.read_line(&mut answer).await {
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

/// Collaborators for one operation invocation.
#[derive(Clone)]
pub struct ExecutionContext {
    az: Arc<dyn AzExecutor>,
    catalog: Arc<dyn ScriptCatalog>,
    telemetry: Arc<dyn TelemetrySink>,
    progress: Arc<dyn ProgressReporter>,
    prompt: Arc<dyn ConfirmPrompt>,
    interrupt: CancellationToken,
    subscription_id: Option<String>,
}

impl ExecutionContext {
    /// Context with logging progress, tracing telemetry and a stdin prompt.
    pub fn new(az: Arc<dyn AzExecutor>, catalog: Arc<dyn ScriptCatalog>) -> Self {
        Self {
            az,
            catalog,
            telemetry: Arc::new(TracingTelemetry),
            progress: Arc::new(LogProgress),
            prompt: Arc::new(StdinPrompt),
            interrupt: CancellationToken::new(),
            subscription_id: None,
        }
    }

    /// Context backed by the real az binary and HTTP catalog.
    pub fn from_config(config: &RepairConfig) -> Result<Self> {
        let az = Arc::new(ProcessAzExecutor::new(config.az_path.clone()));
        let catalog = Arc::new(HttpScriptCatalog::from_config(config)?);
        Ok(Self::new(az, catalog))
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn ConfirmPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_interrupt(mut self, interrupt: CancellationToken) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn with_subscription_id(mut self, subscription_id: Option<String>) -> Self {
        self.subscription_id = subscription_id;
        self
    }

    pub fn catalog(&self) -> &dyn ScriptCatalog {
        self.catalog.as_ref()
    }

    pub fn telemetry(&self) -> &dyn TelemetrySink {
        self.telemetry.as_ref()
    }

    pub fn progress(&self) -> &dyn ProgressReporter {
        self.progress.as_ref()
    }

    pub fn prompt(&self) -> &dyn ConfirmPrompt {
        self.prompt.as_ref()
    }

    pub fn interrupt(&self) -> &CancellationToken {
        &self.interrupt
    }

    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription_id.as_deref()
    }

    /// Run an az command and return its stdout.
    pub async fn call(&self, command: &AzCommand) -> Result<String> {
        Ok(self.az.execute(command).await?)
    }

    /// Run an az command and return its stdout without surrounding whitespace.
    pub async fn call_trimmed(&self, command: &AzCommand) -> Result<String> {
        Ok(self.call(command).await?.trim().to_string())
    }

    /// Whether the az CLI answers at all.
    pub async fn az_available(&self) -> bool {
        az_shell::is_az_available(self.az.as_ref()).await
    }

    /// Best-effort lookup of the active subscription for telemetry.
    pub async fn detect_subscription_id(&self) -> Option<String> {
        let command = AzCommand::new(["account", "show"]).tsv_query("id");
        match self.call_trimmed(&command).await {
            Ok(id) if !id.is_empty() => Some(id),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "could not determine subscription id");
                None
            }
        }
    }
}
