//! Script parameter encoding.
//!
//! Parameters arrive as `key=value` strings (bare values are allowed) and
//! are rendered in the calling convention of the target interpreter.

use crate::session::OsFamily;

/// `key=value key2=value2`
pub fn process_bash_parameters(parameters: &[String]) -> String {
    parameters
        .iter()
        .map(|p| match p.split_once('=') {
            Some((name, value)) => format!("{name}={value}"),
            None => p.clone(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `-key value -key2 value2`
pub fn process_ps_parameters(parameters: &[String]) -> String {
    parameters
        .iter()
        .map(|p| match p.split_once('=') {
            Some((name, value)) => format!("-{name} {value}"),
            None => p.clone(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Replace every space with `%20`.
///
/// `az vm run-command invoke` splits parameter values on spaces; the
/// driver scripts decode `%20` back before handing parameters on.
pub fn encode_spaces(param_string: &str) -> String {
    param_string.replace(' ', "%20")
}

/// Encoded parameter string for `os`, or `None` when there are none.
pub fn serialize_parameters(os: OsFamily, parameters: &[String]) -> Option<String> {
    if parameters.is_empty() {
        return None;
    }
    let rendered = match os {
        OsFamily::Linux => process_bash_parameters(parameters),
        OsFamily::Windows => process_ps_parameters(parameters),
    };
    Some(encode_spaces(&rendered))
}
