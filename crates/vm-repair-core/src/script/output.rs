//! Interpretation of `az vm run-command invoke` output.
//!
//! The driver scripts emit one log record per line:
//!
//! ```text
//! [Log-Start 2024-05-01 10:00:00]
//! [Output 2024-05-01 10:00:01] checking fstab
//! [Error 2024-05-01 10:00:02] /dev/sdc1 not found
//! [STATUS]::SUCCESS
//! [Log-End 2024-05-01 10:00:03] /var/log/vmrepair/run.log
//! ```
//!
//! Output longer than the run-command limit is cut at the head, which is
//! detected by the missing `Log-Start` record. The `Log-End` record carries
//! the path of the full log on the VM.

use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{RepairError, Result};
use crate::outcome::Status;
use crate::session::OsFamily;

pub const STDOUT_MARKER: &str = "[stdout]";
pub const STDERR_MARKER: &str = "[stderr]";
/// Printed by a script that completed without error.
pub const SUCCESS_MARKER: &str = "[STATUS]::SUCCESS";
const STATUS_PREFIX: &str = "[STATUS]::";

#[derive(Debug, Deserialize)]
struct RunCommandResult {
    #[serde(default)]
    value: Vec<InstanceViewStatus>,
}

#[derive(Debug, Deserialize)]
struct InstanceViewStatus {
    #[serde(default)]
    message: Option<String>,
}

/// Split the JSON returned by run-command into (stdout, stderr).
///
/// Linux returns one message with `[stdout]` and `[stderr]` sections;
/// Windows returns stdout and stderr as separate entries.
pub fn split_run_command_output(os: OsFamily, raw: &str) -> Result<(String, String)> {
    let result: RunCommandResult = serde_json::from_str(raw)?;
    let message = |i: usize| {
        result
            .value
            .get(i)
            .and_then(|v| v.message.clone())
    };

    let first = message(0).ok_or_else(|| {
        RepairError::Unexpected("run-command returned no output messages".to_string())
    })?;

    match os {
        OsFamily::Linux => {
            let (_, rest) = first.split_once(STDOUT_MARKER).ok_or_else(|| {
                RepairError::Unexpected(format!(
                    "run-command output has no {STDOUT_MARKER} section"
                ))
            })?;
            let (stdout, stderr) = rest.split_once(STDERR_MARKER).unwrap_or((rest, ""));
            Ok((
                stdout.trim_matches('\n').to_string(),
                stderr.trim_matches('\n').to_string(),
            ))
        }
        OsFamily::Windows => Ok((first, message(1).unwrap_or_default())),
    }
}

/// Level tag of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Output,
    Error,
    Warning,
    #[serde(rename = "Log-Start")]
    LogStart,
    #[serde(rename = "Log-End")]
    LogEnd,
}

impl FromStr for LogLevel {
    type Err = RepairError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "output" => Ok(LogLevel::Output),
            "error" => Ok(LogLevel::Error),
            "warning" => Ok(LogLevel::Warning),
            "log-start" => Ok(LogLevel::LogStart),
            "log-end" => Ok(LogLevel::LogEnd),
            _ => Err(RepairError::Unexpected(format!("unknown log level '{s}'"))),
        }
    }
}

impl LogLevel {
    fn is_marker(&self) -> bool {
        matches!(self, LogLevel::LogStart | LogLevel::LogEnd)
    }
}

/// One record of script output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub timestamp: Option<String>,
    pub message: String,
}

fn log_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\[(?P<level>output|error|warning|log-start|log-end)(?:[ \t]+(?P<ts>[^\]]*))?\][ \t]?(?P<msg>.*)$",
        )
        .expect("log line pattern is valid")
    })
}

/// Parse script stdout into log records.
///
/// Untagged lines continue the previous Output/Error/Warning record.
/// Lines before the first record (the cut-off head of a truncated log) and
/// `[STATUS]::` markers are dropped.
pub fn parse_run_script_logs(stdout: &str) -> Vec<LogRecord> {
    let mut records: Vec<LogRecord> = Vec::new();

    for line in stdout.lines() {
        let line = line.trim_end_matches('\r');
        if line.starts_with(STATUS_PREFIX) {
            continue;
        }
        if let Some(caps) = log_line_regex().captures(line) {
            let Ok(level) = caps["level"].parse::<LogLevel>() else {
                continue;
            };
            let timestamp = caps
                .name("ts")
                .map(|m| m.as_str().trim().to_string())
                .filter(|t| !t.is_empty());
            records.push(LogRecord {
                level,
                timestamp,
                message: caps["msg"].trim_end().to_string(),
            });
        } else if let Some(last) = records.last_mut().filter(|r| !r.level.is_marker()) {
            last.message.push('\n');
            last.message.push_str(line);
        }
    }

    records
}

/// Whether the script reported success.
pub fn script_succeeded(stdout: &str) -> bool {
    stdout.contains(SUCCESS_MARKER)
}

/// Interpreted result of one script execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptRunResult {
    pub stdout: String,
    pub stderr: String,
    pub logs: Vec<LogRecord>,
    pub succeeded: bool,
    pub duration: Duration,
    /// The log was cut off at its head
    pub truncated: bool,
    /// Path of the complete log on the VM
    pub log_full_path: Option<String>,
}

impl ScriptRunResult {
    pub fn from_output(stdout: String, stderr: String, duration: Duration) -> Self {
        let logs = parse_run_script_logs(&stdout);
        let truncated = !logs.iter().any(|r| r.level == LogLevel::LogStart);
        let log_full_path = logs
            .iter()
            .rev()
            .find(|r| r.level == LogLevel::LogEnd)
            .map(|r| r.message.trim().to_string())
            .filter(|p| !p.is_empty());
        let succeeded = script_succeeded(&stdout);

        Self {
            stdout,
            stderr,
            logs,
            succeeded,
            duration,
            truncated,
            log_full_path,
        }
    }

    pub fn status(&self) -> Status {
        if self.succeeded {
            Status::Success
        } else {
            Status::Error
        }
    }

    /// Output records on success, error records on failure, one per line.
    pub fn output(&self) -> String {
        let wanted = if self.succeeded {
            LogLevel::Output
        } else {
            LogLevel::Error
        };
        self.logs
            .iter()
            .filter(|r| r.level == wanted)
            .map(|r| r.message.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
