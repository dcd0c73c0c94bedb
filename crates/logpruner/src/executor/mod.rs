//! External command execution
//!
//! Every interaction with the outside world (alarm queries and index deletion)
//! goes through the [`MaintenanceExecutor`] trait so the decision logic can be
//! exercised without spawning real processes.

pub mod container;
pub mod process;

pub use container::ContainerRunner;
pub use process::ProcessExecutor;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::{Error, Result};

lazy_static! {
    static ref SHELL_SAFE: Regex =
        Regex::new(r"^[A-Za-z0-9_@%+=:,./-]+$").expect("shell-safe pattern is valid");
}

/// Quote a single word for `/bin/sh`, leaving plain words untouched.
pub fn shell_quote(word: &str) -> String {
    if SHELL_SAFE.is_match(word) {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub program: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// True if `needle` appears as a contiguous run of arguments.
    #[cfg(test)]
    pub(crate) fn contains_args(&self, needle: &[&str]) -> bool {
        !needle.is_empty()
            && self
                .args
                .windows(needle.len())
                .any(|w| w.iter().zip(needle).all(|(a, b)| a == b))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// The complete environment handed to a child process.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EnvironmentBindings {
    vars: BTreeMap<String, String>,
}

impl EnvironmentBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Capture the named variables from this process.
    ///
    /// Every variable must be present and non-empty; the error lists all of
    /// the missing ones at once.
    pub fn from_process_env(names: &[&str]) -> Result<Self> {
        Self::from_lookup(names, |name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(names: &[&str], lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut bindings = Self::new();
        let mut missing = Vec::new();

        for name in names {
            match lookup(name).filter(|v| !v.trim().is_empty()) {
                Some(value) => bindings = bindings.with(*name, value),
                None => missing.push(*name),
            }
        }

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "required environment variables not set: {}",
                missing.join(", ")
            )));
        }
        Ok(bindings)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

// Values are credentials.
impl fmt::Debug for EnvironmentBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.vars.keys()).finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
}

/// Runs a command to completion within `timeout`.
///
/// Implementations fail with [`Error::Timeout`] when the bound is exceeded and
/// with [`Error::ExternalTool`] on a non-zero exit or on any stderr output.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MaintenanceExecutor: Send + Sync {
    async fn run(
        &self,
        command: &Command,
        env: &EnvironmentBindings,
        timeout: Duration,
    ) -> Result<CapturedOutput>;
}
