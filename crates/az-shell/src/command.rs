//! Typed argument lists for az invocations.
//!
//! Commands are built as an argument vector and handed to the process
//! executor unchanged, so values never pass through a shell. Arguments
//! marked secret are masked whenever the command is rendered for logs or
//! error messages.

use std::fmt;

const MASK: &str = "********";

/// A single argument in an az command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzArg {
    value: String,
    secret: bool,
}

impl AzArg {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_secret(&self) -> bool {
        self.secret
    }
}

/// An az command line, without the leading `az`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AzCommand {
    args: Vec<AzArg>,
}

impl AzCommand {
    /// Start a command from its subcommand path, e.g. `["vm", "show"]`.
    pub fn new<I, S>(subcommand: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args = subcommand
            .into_iter()
            .map(|s| AzArg {
                value: s.into(),
                secret: false,
            })
            .collect();
        Self { args }
    }

    /// Append a plain argument.
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(AzArg {
            value: value.into(),
            secret: false,
        });
        self
    }

    /// Append an argument that must never be logged.
    pub fn secret_arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(AzArg {
            value: value.into(),
            secret: true,
        });
        self
    }

    /// Append `flag value`.
    pub fn opt(self, flag: &str, value: impl Into<String>) -> Self {
        self.arg(flag).arg(value)
    }

    /// Append `flag value` with the value masked in logs.
    pub fn secret_opt(self, flag: &str, value: impl Into<String>) -> Self {
        self.arg(flag).secret_arg(value)
    }

    /// Append `--query <query> -o tsv`.
    pub fn tsv_query(self, query: &str) -> Self {
        self.opt("--query", query).opt("-o", "tsv")
    }

    /// Append `-o json`.
    pub fn json_output(self) -> Self {
        self.opt("-o", "json")
    }

    /// Raw argument values, in order.
    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(|a| a.value.as_str())
    }

    /// Values of arguments marked secret.
    pub fn secrets(&self) -> impl Iterator<Item = &str> {
        self.args
            .iter()
            .filter(|a| a.secret)
            .map(|a| a.value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Whether any argument equals `value` exactly.
    pub fn has_arg(&self, value: &str) -> bool {
        self.args.iter().any(|a| a.value == value)
    }

    /// The argument following the first occurrence of `flag`.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a.value == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(|a| a.value.as_str())
    }

    /// All arguments following `flag` up to the next `--option`.
    pub fn values_of(&self, flag: &str) -> Vec<&str> {
        match self.args.iter().position(|a| a.value == flag) {
            Some(i) => self.args[i + 1..]
                .iter()
                .take_while(|a| !a.value.starts_with("--"))
                .map(|a| a.value.as_str())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Replace every secret value found in `text` with a mask.
    pub fn redact(&self, text: &str) -> String {
        self.secrets()
            .filter(|s| !s.is_empty())
            .fold(text.to_string(), |acc, secret| acc.replace(secret, MASK))
    }
}

impl fmt::Display for AzCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("az")?;
        for arg in &self.args {
            if arg.secret {
                write!(f, " {MASK}")?;
            } else if arg.value.is_empty() || arg.value.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg.value)?;
            } else {
                write!(f, " {}", arg.value)?;
            }
        }
        Ok(())
    }
}
