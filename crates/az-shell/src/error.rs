//! Error types for az-shell

use thiserror::Error;

/// Errors that can occur while invoking the az CLI
#[derive(Error, Debug)]
pub enum AzError {
    /// The executable could not be started
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited non-zero
    #[error("az command failed: `{command}` exited with {exit_code:?}: {stderr}")]
    CommandFailed {
        /// Rendered command line, secrets masked
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The command was empty
    #[error("az command has no arguments")]
    EmptyCommand,
}

impl AzError {
    /// Stderr of a failed command, if it ran at all.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            AzError::CommandFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}
