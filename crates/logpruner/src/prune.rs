use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, info_span, warn, Instrument};

use crate::{
    alarm::{decide_action, AlarmState, AlarmStateClient},
    config::{ExecutionConfig, RetentionConfig},
    curator::RetentionCommandBuilder,
    executor::ContainerRunner,
    metrics, Error,
};

/// The step an index was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Querying,
    Deciding,
    Deleting,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Querying => "querying",
            Stage::Deciding => "deciding",
            Stage::Deleting => "deleting",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: Error,
}

/// Outcome of one index within a run.
#[derive(Debug)]
pub struct ExecutionResult {
    pub index: String,
    pub alarm_state: Option<AlarmState>,
    pub action_taken: bool,
    /// Rendered deletion command, set whenever the alarm demanded pruning.
    pub command: Option<String>,
    pub failure: Option<StageFailure>,
}

impl ExecutionResult {
    pub fn new(index: &str) -> Self {
        Self {
            index: index.to_string(),
            alarm_state: None,
            action_taken: false,
            command: None,
            failure: None,
        }
    }

    pub fn failed(mut self, stage: Stage, error: Error) -> Self {
        error!(index = %self.index, %stage, error = %error, "Index failed");
        self.failure = Some(StageFailure { stage, error });
        self
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    pub fn error(&self) -> Option<&Error> {
        self.failure.as_ref().map(|f| &f.error)
    }
}

/// Evaluates every configured index in turn.
///
/// Each index runs query, decide and (maybe) delete to completion before the
/// next one starts. Errors end the current index only.
pub struct PruneOrchestrator {
    indices: BTreeMap<String, RetentionConfig>,
    client: AlarmStateClient,
    runner: Arc<ContainerRunner>,
    delete_timeout: Duration,
    dry_run: bool,
}

impl PruneOrchestrator {
    pub fn new(
        indices: BTreeMap<String, RetentionConfig>,
        runner: Arc<ContainerRunner>,
        execution: &ExecutionConfig,
    ) -> Self {
        Self {
            indices,
            client: AlarmStateClient::new(runner.clone(), execution.query_timeout),
            runner,
            delete_timeout: execution.delete_timeout,
            dry_run: execution.dry_run,
        }
    }

    pub async fn run_all(&self) -> Vec<ExecutionResult> {
        let mut results = Vec::with_capacity(self.indices.len());

        for cfg in self.indices.values() {
            let span = info_span!("index", index = %cfg.index);
            let result = self.prune_index(cfg).instrument(span).await;
            metrics::record_result(&result);
            results.push(result);
        }

        results
    }

    async fn prune_index(&self, cfg: &RetentionConfig) -> ExecutionResult {
        let mut result = ExecutionResult::new(&cfg.index);
        info!(alarm = %cfg.alarm_name, "Retrieving alarm state");

        let description = match self.client.query(&cfg.alarm_name).await {
            Ok(description) => description,
            Err(e) => return result.failed(Stage::Querying, e),
        };

        let state = description.state();
        result.alarm_state = Some(state.clone());

        let delete = match decide_action(&state) {
            Ok(delete) => delete,
            Err(e) => return result.failed(Stage::Deciding, e),
        };
        info!(%state, delete, "Delete action required?");

        if !delete {
            return result;
        }

        let command = RetentionCommandBuilder::build(cfg);
        result.command = Some(command.to_string());

        if self.dry_run {
            warn!(command = %command, "Dry run, skipping deletion");
            return result;
        }

        info!(
            command = %command,
            older_than_days = cfg.older_than_days,
            "Deleting indices"
        );
        match self.runner.run(&command, self.delete_timeout).await {
            Ok(_) => {
                result.action_taken = true;
                info!("Deletion finished");
                result
            }
            Err(e) => result.failed(Stage::Deleting, e),
        }
    }
}
