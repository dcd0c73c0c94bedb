//! CloudWatch alarm state and the prune decision derived from it.

pub mod client;

pub use client::AlarmStateClient;

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmState {
    Ok,
    Alarm,
    InsufficientData,
    /// Any value CloudWatch may add in the future, kept verbatim.
    Unknown(String),
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlarmState::Ok => write!(f, "OK"),
            AlarmState::Alarm => write!(f, "ALARM"),
            AlarmState::InsufficientData => write!(f, "INSUFFICIENT_DATA"),
            AlarmState::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

impl From<&str> for AlarmState {
    fn from(s: &str) -> Self {
        match s {
            "OK" => AlarmState::Ok,
            "ALARM" => AlarmState::Alarm,
            "INSUFFICIENT_DATA" => AlarmState::InsufficientData,
            other => AlarmState::Unknown(other.to_string()),
        }
    }
}

impl Serialize for AlarmState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Whether indices must be pruned for the given alarm state.
///
/// Only `ALARM` and `OK` are actionable. Everything else is refused rather
/// than guessed, in either direction.
pub fn decide_action(state: &AlarmState) -> Result<bool> {
    match state {
        AlarmState::Ok => Ok(false),
        AlarmState::Alarm => Ok(true),
        AlarmState::InsufficientData | AlarmState::Unknown(_) => Err(Error::UnknownAlarmState {
            observed: state.to_string(),
        }),
    }
}

/// One entry of the `MetricAlarms` list. Fields not listed here are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricAlarm {
    #[serde(default)]
    pub alarm_name: Option<String>,
    #[serde(default)]
    pub alarm_arn: Option<String>,
    pub state_value: String,
    #[serde(default)]
    pub state_reason: Option<String>,
    #[serde(default)]
    pub state_updated_timestamp: Option<String>,
}

impl MetricAlarm {
    pub fn state(&self) -> AlarmState {
        AlarmState::from(self.state_value.as_str())
    }

    pub fn display_name(&self) -> &str {
        self.alarm_name
            .as_deref()
            .or(self.alarm_arn.as_deref())
            .unwrap_or("<unnamed>")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeAlarmsResponse {
    metric_alarms: Vec<MetricAlarm>,
}

/// Parsed `describe-alarms` output holding at least one alarm record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmDescription {
    alarms: Vec<MetricAlarm>,
}

impl AlarmDescription {
    pub fn parse(alarm_name: &str, json: &str) -> Result<Self> {
        let response: DescribeAlarmsResponse = serde_json::from_str(json)
            .map_err(|e| Error::MalformedResponse(format!("alarm '{}': {}", alarm_name, e)))?;

        if response.metric_alarms.is_empty() {
            return Err(Error::NoAlarmData {
                alarm: alarm_name.to_string(),
            });
        }

        if let Some(pos) = response
            .metric_alarms
            .iter()
            .position(|a| a.alarm_name.is_none() && a.alarm_arn.is_none())
        {
            return Err(Error::MalformedResponse(format!(
                "alarm '{}': record {} has neither AlarmName nor AlarmArn",
                alarm_name, pos
            )));
        }

        Ok(Self {
            alarms: response.metric_alarms,
        })
    }

    /// The record the decision is based on.
    pub fn primary(&self) -> &MetricAlarm {
        &self.alarms[0]
    }

    pub fn alarms(&self) -> &[MetricAlarm] {
        &self.alarms
    }

    pub fn state(&self) -> AlarmState {
        self.primary().state()
    }
}
