use async_trait::async_trait;
use logpruner::{
    alarm::AlarmState,
    config::{parse_indices, ExecutionConfig},
    executor::{CapturedOutput, Command, ContainerRunner, EnvironmentBindings, MaintenanceExecutor},
    prune::{PruneOrchestrator, Stage},
    report::{ReportFormat, RunReport},
    Error, Result,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Answers describe-alarms from a table and records every curator call.
#[derive(Default)]
struct FakeExecutor {
    states: HashMap<String, String>,
    deletions: Mutex<Vec<String>>,
}

impl FakeExecutor {
    fn with_state(mut self, alarm: &str, state: &str) -> Self {
        self.states.insert(alarm.to_string(), state.to_string());
        self
    }
}

#[async_trait]
impl MaintenanceExecutor for FakeExecutor {
    async fn run(
        &self,
        command: &Command,
        env: &EnvironmentBindings,
        _timeout: Duration,
    ) -> Result<CapturedOutput> {
        assert_eq!(command.program, "docker");
        assert!(!env.is_empty());

        let line = command.args.last().cloned().unwrap_or_default();
        if let Some(alarm) = line.strip_prefix("aws cloudwatch describe-alarms --alarm-names ") {
            return match self.states.get(alarm) {
                Some(state) => Ok(CapturedOutput {
                    stdout: serde_json::json!({
                        "MetricAlarms": [{
                            "AlarmName": alarm,
                            "AlarmArn": format!("arn:aws:cloudwatch:eu-central-1:123456789012:alarm:{}", alarm),
                            "StateValue": state,
                        }]
                    })
                    .to_string(),
                }),
                None => Err(Error::ExternalTool {
                    command: command.to_string(),
                    diagnostic: format!("An error occurred (ResourceNotFound): {}", alarm),
                }),
            };
        }

        self.deletions.lock().unwrap().push(line);
        Ok(CapturedOutput::default())
    }
}

const CONFIG: &str = r#"
es_indexes:
  logstash:
    alarm_name: logs-storage
    host: logs.internal
    port: 9200
    older_than_days: 14
    use_SSL: true
    ssl_validation: false
  metrics:
    alarm_name: metrics-storage
    host: metrics.internal
    port: 9200
    older_than_days: 30
  audit:
    alarm_name: missing-alarm
    host: audit.internal
    port: 9200
    older_than_days: 90
  traces:
    alarm_name: traces-storage
    host: traces.internal
    port: 9200
    older_than_days: 7
"#;

#[tokio::test]
async fn test_run_all_from_config() {
    let executor = Arc::new(
        FakeExecutor::default()
            .with_state("logs-storage", "ALARM")
            .with_state("metrics-storage", "OK")
            .with_state("traces-storage", "INSUFFICIENT_DATA"),
    );
    let runner = Arc::new(ContainerRunner::new(
        executor.clone(),
        "my/logpruner:2016-09-12",
        EnvironmentBindings::new().with("AWS_DEFAULT_REGION", "eu-central-1"),
    ));

    let indices = parse_indices(CONFIG).expect("valid config");
    let orchestrator = PruneOrchestrator::new(indices, runner, &ExecutionConfig::default());
    let results = orchestrator.run_all().await;

    assert_eq!(results.len(), 4);
    let by_index: HashMap<&str, _> = results.iter().map(|r| (r.index.as_str(), r)).collect();

    let logstash = by_index["logstash"];
    assert!(logstash.action_taken);
    assert_eq!(logstash.alarm_state, Some(AlarmState::Alarm));

    let metrics = by_index["metrics"];
    assert!(!metrics.action_taken);
    assert!(metrics.succeeded());

    let audit = by_index["audit"];
    assert_eq!(audit.failure.as_ref().map(|f| f.stage), Some(Stage::Querying));

    let traces = by_index["traces"];
    assert!(matches!(traces.error(), Some(Error::UnknownAlarmState { .. })));

    let deletions = executor.deletions.lock().unwrap().clone();
    assert_eq!(deletions.len(), 1);
    assert_eq!(
        deletions[0],
        "curator --host logs.internal --port 9200 --use_ssl --ssl-no-validate delete indices \
         --older-than 14 --time-unit days --timestring %Y.%m.%d --prefix logstash"
    );

    let report = RunReport {
        run_id: uuid::Uuid::new_v4(),
        started_at: chrono::Utc::now(),
        finished_at: chrono::Utc::now(),
        dry_run: false,
        results,
    };
    assert_eq!(report.failed_count(), 2);
    assert_eq!(report.pruned_count(), 1);
    let text = report.render(ReportFormat::Text, false).unwrap();
    assert!(text.contains("logstash\tstate=ALARM\tpruned"));
}
