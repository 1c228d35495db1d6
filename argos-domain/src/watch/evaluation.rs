use chrono::{DateTime, Utc};
use serde::Serialize;

use super::rule::WatchRule;
use super::state::WatchState;

/// How an evaluation concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Disposition {
    /// The watch moved to a different state; bound actions were emitted.
    Transition,
    /// The watch stayed in its current state.
    Steady,
    /// Less than one period since the previous evaluation; nothing ran.
    Deferred,
    /// The evaluation was cancelled before committing; nothing changed.
    Cancelled,
    /// The runtime could not be persisted; the previous state stands.
    StoreUnavailable,
}

/// Result of evaluating one watch.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub watch_name: String,
    pub previous_state: WatchState,
    pub state: WatchState,
    pub actions: Vec<String>,
    pub value: Option<f64>,
    pub disposition: Disposition,
    pub evaluated_at: DateTime<Utc>,
    pub message: String,
}

impl Evaluation {
    /// A committed state change. `actions` is the list bound to the new
    /// state, already filtered for `actions_enabled`.
    pub fn transition(
        rule: &WatchRule,
        previous: WatchState,
        state: WatchState,
        value: Option<f64>,
        actions: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let message = format!(
            "{} -> {}: {} (watch={})",
            previous,
            state,
            rule.reason_for(value),
            rule.name
        );
        Self {
            watch_name: rule.name.clone(),
            previous_state: previous,
            state,
            actions,
            value,
            disposition: Disposition::Transition,
            evaluated_at: now,
            message,
        }
    }

    /// An evaluation that confirmed the current state. Never carries actions.
    pub fn steady(
        rule: &WatchRule,
        state: WatchState,
        value: Option<f64>,
        now: DateTime<Utc>,
    ) -> Self {
        let message = format!(
            "{}: {} (watch={})",
            state,
            rule.reason_for(value),
            rule.name
        );
        Self {
            watch_name: rule.name.clone(),
            previous_state: state,
            state,
            actions: Vec::new(),
            value,
            disposition: Disposition::Steady,
            evaluated_at: now,
            message,
        }
    }

    /// A no-op: the period has not elapsed since the last evaluation.
    pub fn deferred(rule: &WatchRule, state: WatchState, now: DateTime<Utc>) -> Self {
        let message = format!(
            "{}: period of {}s not yet elapsed (watch={})",
            state,
            rule.period.as_secs(),
            rule.name
        );
        Self {
            watch_name: rule.name.clone(),
            previous_state: state,
            state,
            actions: Vec::new(),
            value: None,
            disposition: Disposition::Deferred,
            evaluated_at: now,
            message,
        }
    }

    /// Cancelled before commit; the stored runtime was not touched.
    pub fn cancelled(rule: &WatchRule, state: WatchState, now: DateTime<Utc>) -> Self {
        Self {
            watch_name: rule.name.clone(),
            previous_state: state,
            state,
            actions: Vec::new(),
            value: None,
            disposition: Disposition::Cancelled,
            evaluated_at: now,
            message: format!("{}: evaluation cancelled (watch={})", state, rule.name),
        }
    }

    /// The new runtime could not be persisted; callers see the previous
    /// state and should retry on the next tick.
    pub fn store_unavailable(rule: &WatchRule, state: WatchState, now: DateTime<Utc>) -> Self {
        Self {
            watch_name: rule.name.clone(),
            previous_state: state,
            state,
            actions: Vec::new(),
            value: None,
            disposition: Disposition::StoreUnavailable,
            evaluated_at: now,
            message: format!(
                "{}: state not persisted, store unavailable (watch={})",
                state, rule.name
            ),
        }
    }

    pub fn transitioned(&self) -> bool {
        self.disposition == Disposition::Transition
    }

    /// Returns a short status line.
    pub fn status_line(&self) -> String {
        if self.transitioned() {
            format!(
                "[{} -> {}] {} actions: {:?}",
                self.previous_state,
                self.state,
                self.watch_name,
                self.actions
            )
        } else {
            format!("[{}] {}", self.state, self.watch_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::rule::{ComparisonOperator, Statistic};
    use std::time::Duration;

    fn make_rule() -> WatchRule {
        WatchRule::threshold_rule(
            "testwatch",
            "test_metric",
            Statistic::Maximum,
            ComparisonOperator::GreaterThanOrEqual,
            30.0,
            Duration::from_secs(300),
        )
    }

    #[test]
    fn test_transition_carries_actions_in_order() {
        let rule = make_rule();
        let eval = Evaluation::transition(
            &rule,
            WatchState::Normal,
            WatchState::Alarm,
            Some(35.0),
            vec!["RestartPolicy".into(), "NotifyPolicy".into()],
            Utc::now(),
        );
        assert!(eval.transitioned());
        assert_eq!(
            eval.actions,
            ["RestartPolicy".to_string(), "NotifyPolicy".to_string()]
        );
        assert!(eval.message.contains("NORMAL -> ALARM"));
        assert!(eval.message.contains("Maximum 35.00 >= 30.00"));
    }

    #[test]
    fn test_steady_and_deferred_carry_no_actions() {
        let rule = make_rule();
        let now = Utc::now();

        let steady = Evaluation::steady(&rule, WatchState::Normal, Some(23.0), now);
        assert!(!steady.transitioned());
        assert!(steady.actions.is_empty());

        let deferred = Evaluation::deferred(&rule, WatchState::Alarm, now);
        assert_eq!(deferred.disposition, Disposition::Deferred);
        assert!(deferred.actions.is_empty());
        assert_eq!(deferred.state, deferred.previous_state);
    }
}
