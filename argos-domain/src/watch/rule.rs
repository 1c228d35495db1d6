use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use super::state::WatchState;

#[derive(Debug, Error)]
pub enum WatchRuleError {
    #[error("Unknown statistic: {0}")]
    UnknownStatistic(String),
    #[error("Unknown comparison operator: {0}")]
    UnknownComparison(String),
    #[error("Unknown state: {0}")]
    UnknownState(String),
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
}

/// Statistics that can be applied to a window of samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Statistic {
    Sum,
    Average,
    Minimum,
    Maximum,
    SampleCount,
}

impl Statistic {
    pub fn name(&self) -> &str {
        match self {
            Statistic::Sum => "Sum",
            Statistic::Average => "Average",
            Statistic::Minimum => "Minimum",
            Statistic::Maximum => "Maximum",
            Statistic::SampleCount => "SampleCount",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Statistic::Sum => "Sum of sample values",
            Statistic::Average => "Arithmetic mean of sample values",
            Statistic::Minimum => "Smallest sample value",
            Statistic::Maximum => "Largest sample value",
            Statistic::SampleCount => "Number of samples",
        }
    }

    pub fn parse(s: &str) -> Result<Self, WatchRuleError> {
        match s {
            "Sum" => Ok(Statistic::Sum),
            "Average" => Ok(Statistic::Average),
            "Minimum" => Ok(Statistic::Minimum),
            "Maximum" => Ok(Statistic::Maximum),
            "SampleCount" => Ok(Statistic::SampleCount),
            other => Err(WatchRuleError::UnknownStatistic(other.to_string())),
        }
    }

    /// Reduces a window of values to a single number.
    ///
    /// Returns `None` for an empty window; every statistic is total on
    /// non-empty input and invariant under permutation of it.
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let total: f64 = values.iter().sum();
        Some(match self {
            Statistic::Sum => total,
            Statistic::Average => total / values.len() as f64,
            Statistic::Minimum => values.iter().cloned().fold(f64::INFINITY, f64::min),
            Statistic::Maximum => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            Statistic::SampleCount => values.len() as f64,
        })
    }
}

impl std::fmt::Display for Statistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComparisonOperator {
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl ComparisonOperator {
    pub fn name(&self) -> &str {
        match self {
            ComparisonOperator::GreaterThan => "GreaterThanThreshold",
            ComparisonOperator::GreaterThanOrEqual => "GreaterThanOrEqualToThreshold",
            ComparisonOperator::LessThan => "LessThanThreshold",
            ComparisonOperator::LessThanOrEqual => "LessThanOrEqualToThreshold",
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::GreaterThanOrEqual => ">=",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::LessThanOrEqual => "<=",
        }
    }

    /// Strict operators are false on equality; non-strict are true.
    pub fn evaluate(&self, actual: f64, threshold: f64) -> bool {
        match self {
            ComparisonOperator::GreaterThan => actual > threshold,
            ComparisonOperator::GreaterThanOrEqual => actual >= threshold,
            ComparisonOperator::LessThan => actual < threshold,
            ComparisonOperator::LessThanOrEqual => actual <= threshold,
        }
    }

    pub fn parse(s: &str) -> Result<Self, WatchRuleError> {
        match s {
            "GreaterThanThreshold" => Ok(ComparisonOperator::GreaterThan),
            "GreaterThanOrEqualToThreshold" => Ok(ComparisonOperator::GreaterThanOrEqual),
            "LessThanThreshold" => Ok(ComparisonOperator::LessThan),
            "LessThanOrEqualToThreshold" => Ok(ComparisonOperator::LessThanOrEqual),
            other => Err(WatchRuleError::UnknownComparison(other.to_string())),
        }
    }
}

impl std::fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Ordered action identifier lists, keyed by the state a watch enters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionBindings {
    pub alarm: Vec<String>,
    pub ok: Vec<String>,
    pub insufficient_data: Vec<String>,
}

impl ActionBindings {
    /// The identifiers bound to `state`, in configured order.
    /// Duplicates are preserved; collapsing them is the resolver's concern.
    pub fn for_state(&self, state: WatchState) -> &[String] {
        match state {
            WatchState::Alarm => &self.alarm,
            WatchState::Normal => &self.ok,
            WatchState::NoData => &self.insufficient_data,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.alarm.is_empty() && self.ok.is_empty() && self.insufficient_data.is_empty()
    }
}

/// A named threshold condition over a statistic of a metric.
///
/// All fields are already parsed and validated; construction from the
/// external wire representation lives in [`super::record::WatchRecord`].
#[derive(Debug, Clone, Serialize)]
pub struct WatchRule {
    pub name: String,
    pub stack: Option<String>,
    pub metric_name: String,
    pub namespace: Option<String>,
    pub period: Duration,
    pub evaluation_periods: u32,
    pub statistic: Statistic,
    pub comparison: ComparisonOperator,
    pub threshold: f64,
    pub actions: ActionBindings,
    pub description: Option<String>,
    pub actions_enabled: bool,
    pub unit: Option<String>,
}

impl WatchRule {
    /// Creates a bare threshold rule with no actions bound.
    pub fn threshold_rule(
        name: impl Into<String>,
        metric_name: impl Into<String>,
        statistic: Statistic,
        comparison: ComparisonOperator,
        threshold: f64,
        period: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            stack: None,
            metric_name: metric_name.into(),
            namespace: None,
            period,
            evaluation_periods: 1,
            statistic,
            comparison,
            threshold,
            actions: ActionBindings::default(),
            description: None,
            actions_enabled: true,
            unit: None,
        }
    }

    /// Decides the state implied by a window of values.
    ///
    /// Empty window -> NODATA regardless of the comparison; otherwise the
    /// aggregate is compared against the threshold.
    pub fn assess(&self, values: &[f64]) -> (WatchState, Option<f64>) {
        match self.statistic.apply(values) {
            None => (WatchState::NoData, None),
            Some(v) if self.comparison.evaluate(v, self.threshold) => {
                (WatchState::Alarm, Some(v))
            }
            Some(v) => (WatchState::Normal, Some(v)),
        }
    }

    /// Human-readable explanation of an assessment, used as the state reason.
    pub fn reason_for(&self, value: Option<f64>) -> String {
        match value {
            Some(v) => format!(
                "{} {:.2} {} {:.2}",
                self.statistic.name(),
                v,
                self.comparison.symbol(),
                self.threshold
            ),
            None => format!(
                "no {} samples within {}s",
                self.metric_name,
                self.period.as_secs()
            ),
        }
    }

    /// Returns a human-readable description of the condition.
    pub fn describe(&self) -> String {
        format!(
            "{}({}) {} {} over {}s",
            self.statistic.name(),
            self.metric_name,
            self.comparison.symbol(),
            self.threshold,
            self.period.as_secs()
        )
    }

    /// The period as a chrono duration, for timestamp arithmetic.
    pub fn period_chrono(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.period.as_secs() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistic_parse() {
        assert_eq!(Statistic::parse("Sum").unwrap(), Statistic::Sum);
        assert_eq!(Statistic::parse("Average").unwrap(), Statistic::Average);
        assert_eq!(Statistic::parse("Minimum").unwrap(), Statistic::Minimum);
        assert_eq!(Statistic::parse("Maximum").unwrap(), Statistic::Maximum);
        assert_eq!(
            Statistic::parse("SampleCount").unwrap(),
            Statistic::SampleCount
        );
        assert!(Statistic::parse("Median").is_err());
        assert!(Statistic::parse("sum").is_err());
    }

    #[test]
    fn test_statistic_apply() {
        let values = [17.0, 23.0, 85.0];
        assert_eq!(Statistic::Sum.apply(&values), Some(125.0));
        assert_eq!(Statistic::Minimum.apply(&values), Some(17.0));
        assert_eq!(Statistic::Maximum.apply(&values), Some(85.0));
        assert_eq!(Statistic::SampleCount.apply(&values), Some(3.0));
        let avg = Statistic::Average.apply(&values).unwrap();
        assert!((avg - 125.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_statistic_apply_empty() {
        for stat in [
            Statistic::Sum,
            Statistic::Average,
            Statistic::Minimum,
            Statistic::Maximum,
            Statistic::SampleCount,
        ] {
            assert_eq!(stat.apply(&[]), None);
        }
    }

    #[test]
    fn test_statistic_apply_permutation_invariant() {
        let forward = [7.0, 23.0, 35.0, 11.0];
        let mut reversed = forward;
        reversed.reverse();
        for stat in [
            Statistic::Sum,
            Statistic::Average,
            Statistic::Minimum,
            Statistic::Maximum,
            Statistic::SampleCount,
        ] {
            assert_eq!(stat.apply(&forward), stat.apply(&reversed));
        }
    }

    #[test]
    fn test_operator_evaluate() {
        assert!(ComparisonOperator::GreaterThan.evaluate(90.0, 80.0));
        assert!(!ComparisonOperator::GreaterThan.evaluate(80.0, 80.0));
        assert!(ComparisonOperator::GreaterThanOrEqual.evaluate(80.0, 80.0));
        assert!(ComparisonOperator::LessThan.evaluate(70.0, 80.0));
        assert!(!ComparisonOperator::LessThan.evaluate(80.0, 80.0));
        assert!(ComparisonOperator::LessThanOrEqual.evaluate(80.0, 80.0));
    }

    #[test]
    fn test_operator_parse_roundtrip() {
        for op in [
            ComparisonOperator::GreaterThan,
            ComparisonOperator::GreaterThanOrEqual,
            ComparisonOperator::LessThan,
            ComparisonOperator::LessThanOrEqual,
        ] {
            assert_eq!(ComparisonOperator::parse(op.name()).unwrap(), op);
        }
        assert!(ComparisonOperator::parse(">").is_err());
    }

    #[test]
    fn test_assess_states() {
        let rule = WatchRule::threshold_rule(
            "testwatch",
            "test_metric",
            Statistic::Maximum,
            ComparisonOperator::GreaterThanOrEqual,
            30.0,
            Duration::from_secs(300),
        );

        let (state, value) = rule.assess(&[7.0, 23.0]);
        assert_eq!(state, WatchState::Normal);
        assert_eq!(value, Some(23.0));

        let (state, value) = rule.assess(&[7.0, 23.0, 35.0]);
        assert_eq!(state, WatchState::Alarm);
        assert_eq!(value, Some(35.0));

        let (state, value) = rule.assess(&[]);
        assert_eq!(state, WatchState::NoData);
        assert_eq!(value, None);
    }

    #[test]
    fn test_actions_for_state() {
        let actions = ActionBindings {
            alarm: vec!["restart".into(), "notify".into()],
            ok: vec!["clear".into()],
            insufficient_data: vec![],
        };
        assert_eq!(
            actions.for_state(WatchState::Alarm),
            ["restart".to_string(), "notify".to_string()]
        );
        assert_eq!(actions.for_state(WatchState::Normal), ["clear".to_string()]);
        assert!(actions.for_state(WatchState::NoData).is_empty());
    }

    #[test]
    fn test_describe() {
        let rule = WatchRule::threshold_rule(
            "testwatch",
            "ServiceFailure",
            Statistic::SampleCount,
            ComparisonOperator::GreaterThan,
            2.0,
            Duration::from_secs(300),
        );
        assert_eq!(rule.describe(), "SampleCount(ServiceFailure) > 2 over 300s");
    }
}
