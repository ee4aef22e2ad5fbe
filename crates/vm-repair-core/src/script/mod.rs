//! Everything about running a repair script on a VM: driver scripts,
//! parameter encoding and interpretation of the captured output.

mod driver;
mod output;
mod params;

pub use driver::{driver_source, DriverScript};
pub use output::{
    parse_run_script_logs, script_succeeded, split_run_command_output, LogLevel, LogRecord,
    ScriptRunResult, STDERR_MARKER, STDOUT_MARKER, SUCCESS_MARKER,
};
pub use params::{encode_spaces, process_bash_parameters, process_ps_parameters, serialize_parameters};
