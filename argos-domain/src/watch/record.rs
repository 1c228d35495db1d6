use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::rule::{ActionBindings, ComparisonOperator, Statistic, WatchRule, WatchRuleError};
use super::sample::MetricSample;
use super::state::{WatchRuntime, WatchState};

/// Wire representation of a watch, using the key names of the upstream
/// watch-submission tooling. Numeric fields accept both native numbers
/// and string-encoded numbers; unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchRecord {
    #[serde(rename = "AlarmName")]
    pub name: String,
    #[serde(rename = "MetricName")]
    pub metric_name: String,
    #[serde(rename = "Namespace", default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(rename = "Period", deserialize_with = "de_u64_flexible")]
    pub period_seconds: u64,
    #[serde(
        rename = "EvaluationPeriods",
        default = "default_one",
        deserialize_with = "de_u32_flexible"
    )]
    pub evaluation_periods: u32,
    #[serde(rename = "Statistic")]
    pub statistic: String,
    #[serde(rename = "ComparisonOperator")]
    pub comparison_operator: String,
    #[serde(rename = "Threshold", deserialize_with = "de_f64_flexible")]
    pub threshold: f64,
    #[serde(rename = "AlarmActions", default, skip_serializing_if = "Vec::is_empty")]
    pub alarm_actions: Vec<String>,
    #[serde(rename = "OKActions", default, skip_serializing_if = "Vec::is_empty")]
    pub ok_actions: Vec<String>,
    #[serde(
        rename = "InsufficientDataActions",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub insufficient_data_actions: Vec<String>,
    #[serde(
        rename = "ActionsEnabled",
        default = "default_true",
        deserialize_with = "de_bool_flexible"
    )]
    pub actions_enabled: bool,
    #[serde(
        rename = "AlarmDescription",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(rename = "AlarmArn", default, skip_serializing_if = "Option::is_none")]
    pub alarm_arn: Option<String>,
    #[serde(rename = "Dimensions", default, skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<Dimension>,
    #[serde(rename = "Unit", default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(rename = "StackName", default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(rename = "StateValue", default, skip_serializing_if = "Option::is_none")]
    pub state_value: Option<String>,
    #[serde(rename = "StateReason", default, skip_serializing_if = "Option::is_none")]
    pub state_reason: Option<String>,
    #[serde(
        rename = "StateReasonData",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub state_reason_data: Option<String>,
    #[serde(
        rename = "StateUpdatedTimestamp",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub state_updated_timestamp: Option<DateTime<Utc>>,
    #[serde(
        rename = "AlarmConfigurationUpdatedTimestamp",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub configuration_updated_timestamp: Option<DateTime<Utc>>,
}

/// A metric selector dimension, carried through for round-trip fidelity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl WatchRecord {
    /// Parses and validates the record into a typed rule.
    ///
    /// # Errors
    /// Unknown statistic or comparison operator, a zero period, or a
    /// non-finite threshold reject the record.
    pub fn to_rule(&self) -> Result<WatchRule, WatchRuleError> {
        let statistic = Statistic::parse(&self.statistic)?;
        let comparison = ComparisonOperator::parse(&self.comparison_operator)?;
        if self.period_seconds == 0 {
            return Err(WatchRuleError::InvalidPeriod(
                self.period_seconds.to_string(),
            ));
        }
        if !self.threshold.is_finite() {
            return Err(WatchRuleError::InvalidThreshold(self.threshold.to_string()));
        }

        Ok(WatchRule {
            name: self.name.clone(),
            stack: self.stack.clone(),
            metric_name: self.metric_name.clone(),
            namespace: self.namespace.clone(),
            period: Duration::from_secs(self.period_seconds),
            evaluation_periods: self.evaluation_periods,
            statistic,
            comparison,
            threshold: self.threshold,
            actions: ActionBindings {
                alarm: self.alarm_actions.clone(),
                ok: self.ok_actions.clone(),
                insufficient_data: self.insufficient_data_actions.clone(),
            },
            description: self.description.clone(),
            actions_enabled: self.actions_enabled,
            unit: self.unit.clone(),
        })
    }

    /// Builds the runtime for a watch created from this record at `now`.
    ///
    /// State fields in the record (present when re-registering an existing
    /// watch) are honored; otherwise the watch starts NORMAL.
    pub fn initial_runtime(&self, now: DateTime<Utc>) -> Result<WatchRuntime, WatchRuleError> {
        let state = match &self.state_value {
            Some(s) => WatchState::parse(s)?,
            None => WatchState::Normal,
        };
        Ok(WatchRuntime {
            state,
            state_reason: self.state_reason.clone().unwrap_or_default(),
            state_reason_data: self.state_reason_data.clone(),
            last_evaluated: now,
            state_updated_time: self.state_updated_timestamp.unwrap_or(now),
        })
    }

    /// Re-assembles the wire representation from a rule and its runtime.
    pub fn from_parts(rule: &WatchRule, runtime: &WatchRuntime) -> Self {
        Self {
            name: rule.name.clone(),
            metric_name: rule.metric_name.clone(),
            namespace: rule.namespace.clone(),
            period_seconds: rule.period.as_secs(),
            evaluation_periods: rule.evaluation_periods,
            statistic: rule.statistic.name().to_string(),
            comparison_operator: rule.comparison.name().to_string(),
            threshold: rule.threshold,
            alarm_actions: rule.actions.alarm.clone(),
            ok_actions: rule.actions.ok.clone(),
            insufficient_data_actions: rule.actions.insufficient_data.clone(),
            actions_enabled: rule.actions_enabled,
            description: rule.description.clone(),
            alarm_arn: None,
            dimensions: Vec::new(),
            unit: rule.unit.clone(),
            stack: rule.stack.clone(),
            state_value: Some(runtime.state.as_str().to_string()),
            state_reason: if runtime.state_reason.is_empty() {
                None
            } else {
                Some(runtime.state_reason.clone())
            },
            state_reason_data: runtime.state_reason_data.clone(),
            state_updated_timestamp: Some(runtime.state_updated_time),
            configuration_updated_timestamp: None,
        }
    }
}

/// One ingested observation, as submitted by upstream metric tooling.
///
/// The actual reading lives in `data`, keyed by metric name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub watch_name: String,
    pub metric_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub data: HashMap<String, MetricDatum>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDatum {
    #[serde(rename = "Value", deserialize_with = "de_f64_flexible")]
    pub value: f64,
    #[serde(rename = "Unit", default)]
    pub unit: String,
}

impl SampleRecord {
    /// Extracts the sample for `metric`, or `None` when the data map does
    /// not carry that metric.
    pub fn to_sample(&self, metric: &str) -> Option<MetricSample> {
        self.data.get(metric).map(|datum| MetricSample {
            metric_name: metric.to_string(),
            timestamp: self.timestamp,
            value: datum.value,
            unit: datum.unit.clone(),
        })
    }
}

fn default_one() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn de_u64_flexible<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(v) => Ok(v),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid integer: {s:?}"))),
    }
}

fn de_u32_flexible<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(v) => Ok(v),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid integer: {s:?}"))),
    }
}

fn de_f64_flexible<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(v) => Ok(v),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid number: {s:?}"))),
    }
}

fn de_bool_flexible<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Flag(bool),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Flag(v) => Ok(v),
        Raw::Text(s) => match s.trim().to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "invalid boolean: {other:?}"
            ))),
        },
    }
}
