use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/logpruner/logpruner_config.yaml";

/// Image providing both the aws cli and curator. Its entrypoint is `/bin/sh`.
pub const DEFAULT_IMAGE: &str = "my/logpruner:2016-09-12";

pub const QUERY_TIMEOUT: Duration = Duration::from_secs(30);
pub const DELETE_TIMEOUT: Duration = Duration::from_secs(120);

/// Credentials and region every run needs before touching any index.
pub const REQUIRED_ENV_VARS: [&str; 3] = [
    "AWS_DEFAULT_REGION",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
];

/// Retention policy of a single index.
///
/// Unknown keys are rejected, so a misspelt TLS flag cannot silently fall back
/// to plain HTTP.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Filled from the map key, never read from the record itself.
    #[serde(skip)]
    pub index: String,
    pub alarm_name: String,
    pub host: String,
    pub port: u16,
    pub older_than_days: u32,
    #[serde(default, rename = "use_SSL", alias = "use_tls", alias = "use_ssl")]
    pub use_tls: bool,
    /// Only meaningful together with `use_tls`.
    #[serde(default, rename = "ssl_validation", alias = "tls_validate")]
    pub tls_validate: bool,
}

impl RetentionConfig {
    fn validate(&self) -> Result<()> {
        if self.alarm_name.trim().is_empty() {
            return Err(Error::Config(format!(
                "index '{}': alarm_name must not be empty",
                self.index
            )));
        }
        if self.host.trim().is_empty() {
            return Err(Error::Config(format!(
                "index '{}': host must not be empty",
                self.index
            )));
        }
        if self.port == 0 {
            return Err(Error::Config(format!(
                "index '{}': port must be between 1 and 65535",
                self.index
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct IndexFile {
    #[serde(default)]
    es_indexes: BTreeMap<String, RetentionConfig>,
}

/// Parse the YAML index document into a validated map keyed by index name.
pub fn parse_indices(yaml: &str) -> Result<BTreeMap<String, RetentionConfig>> {
    let file: IndexFile = serde_yaml::from_str(yaml)?;

    if file.es_indexes.is_empty() {
        return Err(Error::Config(
            "no indices configured under 'es_indexes'".to_string(),
        ));
    }

    let mut indices = BTreeMap::new();
    for (name, mut cfg) in file.es_indexes {
        if name.trim().is_empty() {
            return Err(Error::Config("index name must not be empty".to_string()));
        }
        cfg.index = name.clone();
        cfg.validate()?;
        indices.insert(name, cfg);
    }
    Ok(indices)
}

pub fn load_indices(path: &Path) -> Result<BTreeMap<String, RetentionConfig>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "unable to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;
    parse_indices(&raw)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub image: String,
    pub query_timeout: Duration,
    pub delete_timeout: Duration,
    /// Log the deletion command instead of running it.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            query_timeout: QUERY_TIMEOUT,
            delete_timeout: DELETE_TIMEOUT,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: PathBuf,
    pub indices: BTreeMap<String, RetentionConfig>,
    pub execution: ExecutionConfig,
}

impl Config {
    pub fn load(config_path: &Path) -> Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        let indices = load_indices(config_path)?;

        let execution = ExecutionConfig {
            image: std::env::var("LOGPRUNER_IMAGE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
            ..ExecutionConfig::default()
        };

        Ok(Config {
            config_path: config_path.to_path_buf(),
            indices,
            execution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
es_indexes:
  logstash:
    alarm_name: es-free-storage-space
    host: search.internal
    port: 9200
    older_than_days: 14
    use_SSL: true
    ssl_validation: false
  metrics:
    alarm_name: es-metrics-storage
    host: metrics.internal
    port: 9243
    older_than_days: 0
"#;

    #[test]
    fn test_parse_indices() {
        let indices = parse_indices(SAMPLE).unwrap();
        assert_eq!(indices.len(), 2);

        let logstash = &indices["logstash"];
        assert_eq!(logstash.index, "logstash");
        assert_eq!(logstash.alarm_name, "es-free-storage-space");
        assert_eq!(logstash.port, 9200);
        assert_eq!(logstash.older_than_days, 14);
        assert!(logstash.use_tls);
        assert!(!logstash.tls_validate);

        let metrics = &indices["metrics"];
        assert_eq!(metrics.older_than_days, 0);
        assert!(!metrics.use_tls, "use_SSL defaults to false");
        assert!(!metrics.tls_validate, "ssl_validation defaults to false");
    }

    #[test]
    fn test_tls_aliases() {
        let yaml = r#"
es_indexes:
  audit:
    alarm_name: a
    host: h
    port: 9200
    older_than_days: 3
    use_tls: true
    tls_validate: true
"#;
        let indices = parse_indices(yaml).unwrap();
        assert!(indices["audit"].use_tls);
        assert!(indices["audit"].tls_validate);
    }

    #[test]
    fn test_lowercase_use_ssl_is_accepted() {
        let yaml = "es_indexes:\n  i:\n    alarm_name: a\n    host: h\n    port: 9200\n    older_than_days: 1\n    use_ssl: true\n";
        assert!(parse_indices(yaml).unwrap()["i"].use_tls);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let typo = "es_indexes:\n  i:\n    alarm_name: a\n    host: h\n    port: 9200\n    older_than_days: 1\n    use_SLL: true\n";
        let err = parse_indices(typo).unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
        assert!(err.to_string().contains("use_SLL"));
    }

    #[test]
    fn test_empty_config_is_rejected() {
        let err = parse_indices("es_indexes: {}\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_records_are_rejected() {
        let port_zero = "es_indexes:\n  i:\n    alarm_name: a\n    host: h\n    port: 0\n    older_than_days: 1\n";
        assert!(matches!(parse_indices(port_zero), Err(Error::Config(_))));

        let port_too_large = "es_indexes:\n  i:\n    alarm_name: a\n    host: h\n    port: 70000\n    older_than_days: 1\n";
        assert!(matches!(parse_indices(port_too_large), Err(Error::Yaml(_))));

        let negative_days = "es_indexes:\n  i:\n    alarm_name: a\n    host: h\n    port: 9200\n    older_than_days: -1\n";
        assert!(matches!(parse_indices(negative_days), Err(Error::Yaml(_))));

        let blank_alarm = "es_indexes:\n  i:\n    alarm_name: ''\n    host: h\n    port: 9200\n    older_than_days: 1\n";
        assert!(matches!(parse_indices(blank_alarm), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_indices_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let indices = load_indices(file.path()).unwrap();
        assert!(indices.contains_key("logstash"));
    }

    #[test]
    fn test_missing_file_is_a_config_error() {
        let err = load_indices(Path::new("/nonexistent/logpruner_config.yaml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_execution_defaults() {
        let execution = ExecutionConfig::default();
        assert_eq!(execution.image, DEFAULT_IMAGE);
        assert_eq!(execution.query_timeout, Duration::from_secs(30));
        assert_eq!(execution.delete_timeout, Duration::from_secs(120));
        assert!(!execution.dry_run);
    }
}
