use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::str::FromStr;
use uuid::Uuid;

use crate::prune::ExecutionResult;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Text,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "text" => Ok(ReportFormat::Text),
            other => Err(format!(
                "Invalid report format: {}. Must be 'json' or 'text'",
                other
            )),
        }
    }
}

/// Summary of one run, printed once every index has been processed.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub results: Vec<ExecutionResult>,
}

impl RunReport {
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.succeeded()).count()
    }

    pub fn pruned_count(&self) -> usize {
        self.results.iter().filter(|r| r.action_taken).count()
    }

    /// Process exit status once the run has completed.
    ///
    /// Failed indices take precedence over a failure to publish the report or
    /// metrics afterwards. Precondition failures never produce a report and
    /// exit with 1 before reaching this point.
    pub fn exit_code(&self, published: bool) -> u8 {
        if self.failed_count() > 0 {
            2
        } else if !published {
            3
        } else {
            0
        }
    }

    pub fn to_json(&self) -> Value {
        let results: Vec<Value> = self.results.iter().map(result_json).collect();
        json!({
            "run_id": self.run_id,
            "started_at": self.started_at,
            "finished_at": self.finished_at,
            "dry_run": self.dry_run,
            "indices": self.results.len(),
            "pruned": self.pruned_count(),
            "failed": self.failed_count(),
            "results": results,
        })
    }

    pub fn render_text(&self) -> String {
        let mut out = format!(
            "run {} finished at {}: {} indices, {} pruned, {} failed{}\n",
            self.run_id,
            self.finished_at.to_rfc3339(),
            self.results.len(),
            self.pruned_count(),
            self.failed_count(),
            if self.dry_run { " (dry run)" } else { "" }
        );

        for r in &self.results {
            let state = r
                .alarm_state
                .as_ref()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string());
            let outcome = match &r.failure {
                Some(f) => format!("FAILED at {}: {}", f.stage, f.error),
                None if r.action_taken => "pruned".to_string(),
                None if r.command.is_some() => "would prune".to_string(),
                None => "nothing to do".to_string(),
            };
            out.push_str(&format!("{}\tstate={}\t{}\n", r.index, state, outcome));
        }
        out
    }

    pub fn render(&self, format: ReportFormat, pretty: bool) -> Result<String> {
        match format {
            ReportFormat::Text => Ok(self.render_text()),
            ReportFormat::Json if pretty => Ok(serde_json::to_string_pretty(&self.to_json())?),
            ReportFormat::Json => Ok(self.to_json().to_string()),
        }
    }
}

fn result_json(r: &ExecutionResult) -> Value {
    json!({
        "index": r.index,
        "alarm_state": r.alarm_state,
        "action_taken": r.action_taken,
        "command": r.command,
        "stage": r.failure.as_ref().map(|f| f.stage.as_str()),
        "error": r.failure.as_ref().map(|f| f.error.to_string()),
    })
}
