//! Curator command rendering
//!
//! Builds the `curator` invocation that deletes day-partitioned indices older
//! than the retention window.

use crate::config::RetentionConfig;
use crate::executor::Command;

/// Index names carry their day as `<prefix>YYYY.MM.DD`.
pub const TIMESTRING: &str = "%Y.%m.%d";

pub const TLS_FLAG: &str = "--use_ssl";
pub const NO_VALIDATE_FLAG: &str = "--ssl-no-validate";

pub struct RetentionCommandBuilder;

impl RetentionCommandBuilder {
    pub fn build(cfg: &RetentionConfig) -> Command {
        let mut cmd = Command::new("curator")
            .arg("--host")
            .arg(cfg.host.as_str())
            .arg("--port")
            .arg(cfg.port.to_string());

        if cfg.use_tls {
            cmd = cmd.arg(TLS_FLAG);
            // Insecure on purpose: operators opt in via `ssl_validation: false`.
            if !cfg.tls_validate {
                cmd = cmd.arg(NO_VALIDATE_FLAG);
            }
        }

        cmd.args(["delete", "indices", "--older-than"])
            .arg(cfg.older_than_days.to_string())
            .args(["--time-unit", "days", "--timestring", TIMESTRING, "--prefix"])
            .arg(cfg.index.as_str())
    }
}
