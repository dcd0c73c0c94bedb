pub mod alarm;
pub mod config;
pub mod curator;
pub mod executor;
pub mod metrics;
pub mod prune;
pub mod report;

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("External tool error running `{command}`: {diagnostic}")]
    ExternalTool { command: String, diagnostic: String },
    #[error("Malformed alarm response: {0}")]
    MalformedResponse(String),
    #[error("No alarm data returned for alarm '{alarm}'")]
    NoAlarmData { alarm: String },
    #[error("Unknown alarm state '{observed}', refusing to decide")]
    UnknownAlarmState { observed: String },
    #[error("Command `{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
