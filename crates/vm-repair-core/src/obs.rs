//! Operation telemetry.
//!
//! Each orchestrated operation produces one [`CommandTelemetry`] record
//! handed to a [`TelemetrySink`]. Tracking is fire-and-forget: sinks must not
//! fail the operation. The default sink emits a structured `tracing` event.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::Operation;
use crate::outcome::Status;

/// Placeholder recorded instead of secret parameter values.
pub const REDACTED: &str = "<redacted>";

/// Script-specific fields tracked for `run`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptTelemetry {
    pub run_id: Option<String>,
    pub status: Status,
    pub output: String,
    pub duration_ms: Option<u64>,
}

/// One telemetry record per operation invocation.
#[derive(Debug, Clone, Serialize)]
pub struct CommandTelemetry {
    pub invocation_id: Uuid,
    pub command: &'static str,
    pub parameters: BTreeMap<String, String>,
    pub status: Status,
    pub message: String,
    pub error_detail: String,
    pub elapsed_ms: u64,
    pub subscription_id: Option<String>,
    pub result: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<ScriptTelemetry>,
}

impl CommandTelemetry {
    pub fn new(op: Operation, parameters: BTreeMap<String, String>) -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            command: op.command_name(),
            parameters,
            status: Status::Error,
            message: String::new(),
            error_detail: String::new(),
            elapsed_ms: 0,
            subscription_id: None,
            result: serde_json::Value::Null,
            recorded_at: Utc::now(),
            script: None,
        }
    }

    pub fn finish(mut self, result: serde_json::Value, elapsed: Duration) -> Self {
        self.status = match result.get("status").and_then(|s| s.as_str()) {
            Some("SUCCESS") => Status::Success,
            _ => Status::Error,
        };
        self.message = result
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string();
        self.error_detail = result
            .get("error_message")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string();
        self.elapsed_ms = elapsed.as_millis() as u64;
        self.result = result;
        self
    }
}

/// Receives operation telemetry.
pub trait TelemetrySink: Send + Sync {
    fn track(&self, record: &CommandTelemetry);
}

/// Sink that logs each record as a `telemetry.command` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn track(&self, record: &CommandTelemetry) {
        let parameters = serde_json::to_string(&record.parameters).unwrap_or_default();
        match &record.script {
            Some(script) => info!(
                event = "telemetry.command",
                invocation_id = %record.invocation_id,
                command = record.command,
                status = %record.status,
                elapsed_ms = record.elapsed_ms,
                subscription_id = record.subscription_id.as_deref().unwrap_or(""),
                parameters = %parameters,
                error_detail = %record.error_detail,
                run_id = script.run_id.as_deref().unwrap_or(""),
                script_status = %script.status,
                script_duration_ms = script.duration_ms.unwrap_or(0),
            ),
            None => info!(
                event = "telemetry.command",
                invocation_id = %record.invocation_id,
                command = record.command,
                status = %record.status,
                elapsed_ms = record.elapsed_ms,
                subscription_id = record.subscription_id.as_deref().unwrap_or(""),
                parameters = %parameters,
                error_detail = %record.error_detail,
            ),
        }
    }
}

/// Sink that drops every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn track(&self, _record: &CommandTelemetry) {}
}
