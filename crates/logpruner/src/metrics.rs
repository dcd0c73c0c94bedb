use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::path::Path;

use crate::prune::ExecutionResult;
use crate::Result;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref INDICES_EVALUATED_TOTAL: IntCounter = IntCounter::new(
        "logpruner_indices_evaluated_total",
        "Total number of indices whose alarm was evaluated."
    )
    .expect("metric can be created");
    pub static ref DELETIONS_TOTAL: IntCounter = IntCounter::new(
        "logpruner_deletions_total",
        "Total number of successful curator deletions."
    )
    .expect("metric can be created");
    pub static ref FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("logpruner_failures_total", "Per-index failures by stage."),
        &["stage"]
    )
    .expect("metric can be created");
    pub static ref LAST_RUN_TIMESTAMP_SECONDS: IntGauge = IntGauge::new(
        "logpruner_last_run_timestamp_seconds",
        "Unix time the last run finished."
    )
    .expect("metric can be created");
}

/// Register all collectors with [`REGISTRY`]. Calling it twice is harmless.
pub fn register_metrics() -> Result<()> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(INDICES_EVALUATED_TOTAL.clone()),
        Box::new(DELETIONS_TOTAL.clone()),
        Box::new(FAILURES_TOTAL.clone()),
        Box::new(LAST_RUN_TIMESTAMP_SECONDS.clone()),
    ];
    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

pub fn record_result(result: &ExecutionResult) {
    INDICES_EVALUATED_TOTAL.inc();
    if result.action_taken {
        DELETIONS_TOTAL.inc();
    }
    if let Some(failure) = &result.failure {
        FAILURES_TOTAL
            .with_label_values(&[failure.stage.as_str()])
            .inc();
    }
}

pub fn mark_run_finished(unix_seconds: i64) {
    LAST_RUN_TIMESTAMP_SECONDS.set(unix_seconds);
}

// Function to gather metrics for exposition
pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Write the exposition for the node-exporter textfile collector.
///
/// Written to a sibling temp file first so the collector never reads a
/// partial file.
pub fn write_textfile(path: &Path) -> Result<()> {
    let body = gather_metrics()?;
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prune::{ExecutionResult, Stage};
    use crate::Error;

    #[test]
    fn test_register_twice_is_ok() {
        register_metrics().unwrap();
        register_metrics().unwrap();
    }

    #[test]
    fn test_record_result_and_write_textfile() {
        register_metrics().unwrap();

        let before = FAILURES_TOTAL.with_label_values(&["querying"]).get();
        let failed = ExecutionResult::new("idx1").failed(
            Stage::Querying,
            Error::NoAlarmData {
                alarm: "a1".to_string(),
            },
        );
        record_result(&failed);
        // Other tests record into the same global registry concurrently.
        assert!(FAILURES_TOTAL.with_label_values(&["querying"]).get() >= before + 1);

        mark_run_finished(1_473_667_200);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logpruner.prom");
        write_textfile(&path).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("logpruner_indices_evaluated_total"));
        assert!(body.contains("logpruner_failures_total{stage=\"querying\"}"));
        assert!(body.contains("logpruner_last_run_timestamp_seconds"));
    }
}
