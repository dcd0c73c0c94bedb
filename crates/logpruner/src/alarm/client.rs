use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::AlarmDescription;
use crate::executor::{Command, ContainerRunner};
use crate::{Error, Result};

/// Looks up CloudWatch alarms through the aws cli inside the maintenance image.
pub struct AlarmStateClient {
    runner: Arc<ContainerRunner>,
    timeout: Duration,
}

impl AlarmStateClient {
    pub fn new(runner: Arc<ContainerRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    pub fn query_command(alarm_name: &str) -> Command {
        Command::new("aws")
            .args(["cloudwatch", "describe-alarms", "--alarm-names"])
            .arg(alarm_name)
    }

    /// Describe exactly one alarm.
    pub async fn query(&self, alarm_name: &str) -> Result<AlarmDescription> {
        if alarm_name.trim().is_empty() {
            return Err(Error::Config("alarm name must not be empty".to_string()));
        }

        let output = self
            .runner
            .run(&Self::query_command(alarm_name), self.timeout)
            .await?;
        debug!(alarm = %alarm_name, response = %output.stdout, "describe-alarms response");

        let description = AlarmDescription::parse(alarm_name, &output.stdout)?;
        if description.alarms().len() > 1 {
            warn!(
                alarm = %alarm_name,
                records = description.alarms().len(),
                "Query matched several alarms, using the first"
            );
        }

        let primary = description.primary();
        info!(
            alarm = %primary.display_name(),
            arn = primary.alarm_arn.as_deref().unwrap_or("-"),
            state = %primary.state(),
            "Retrieved alarm"
        );
        Ok(description)
    }
}
