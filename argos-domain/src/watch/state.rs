use chrono::{DateTime, Utc};
use serde::Serialize;

use super::rule::WatchRuleError;

/// Evaluation verdict of a watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WatchState {
    Normal,
    Alarm,
    NoData,
}

impl WatchState {
    pub fn as_str(&self) -> &str {
        match self {
            WatchState::Normal => "NORMAL",
            WatchState::Alarm => "ALARM",
            WatchState::NoData => "NODATA",
        }
    }

    pub fn parse(s: &str) -> Result<Self, WatchRuleError> {
        match s {
            "NORMAL" => Ok(WatchState::Normal),
            "ALARM" => Ok(WatchState::Alarm),
            "NODATA" => Ok(WatchState::NoData),
            other => Err(WatchRuleError::UnknownState(other.to_string())),
        }
    }
}

impl std::fmt::Display for WatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable evaluation state of a watch.
///
/// `state_updated_time <= last_evaluated` holds at all times: a transition
/// is only ever recorded by the evaluation that observed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchRuntime {
    pub state: WatchState,
    pub state_reason: String,
    pub state_reason_data: Option<String>,
    pub last_evaluated: DateTime<Utc>,
    pub state_updated_time: DateTime<Utc>,
}

impl WatchRuntime {
    /// Initial runtime for a freshly created watch.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            state: WatchState::Normal,
            state_reason: String::new(),
            state_reason_data: None,
            last_evaluated: now,
            state_updated_time: now,
        }
    }

    /// Records that an evaluation ran at `now` without changing state.
    pub fn mark_evaluated(&mut self, now: DateTime<Utc>) {
        self.last_evaluated = now;
    }

    /// Commits a state change observed at `now`.
    pub fn transition(&mut self, state: WatchState, reason: String, now: DateTime<Utc>) {
        self.state = state;
        self.state_reason = reason;
        self.state_updated_time = now;
        self.last_evaluated = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_parse_roundtrip() {
        for state in [WatchState::Normal, WatchState::Alarm, WatchState::NoData] {
            assert_eq!(WatchState::parse(state.as_str()).unwrap(), state);
        }
        assert!(WatchState::parse("INSUFFICIENT_DATA").is_err());
        assert!(WatchState::parse("normal").is_err());
    }

    #[test]
    fn test_runtime_initial() {
        let now = Utc::now();
        let runtime = WatchRuntime::new(now);
        assert_eq!(runtime.state, WatchState::Normal);
        assert_eq!(runtime.last_evaluated, now);
        assert_eq!(runtime.state_updated_time, now);
    }

    #[test]
    fn test_runtime_transition_updates_both_timestamps() {
        let created = Utc::now();
        let mut runtime = WatchRuntime::new(created);

        let later = created + chrono::Duration::seconds(300);
        runtime.transition(WatchState::Alarm, "Maximum 35.00 >= 30.00".into(), later);

        assert_eq!(runtime.state, WatchState::Alarm);
        assert_eq!(runtime.state_updated_time, later);
        assert_eq!(runtime.last_evaluated, later);
    }

    #[test]
    fn test_runtime_mark_evaluated_leaves_state_timestamp() {
        let created = Utc::now();
        let mut runtime = WatchRuntime::new(created);

        let later = created + chrono::Duration::seconds(300);
        runtime.mark_evaluated(later);

        assert_eq!(runtime.state_updated_time, created);
        assert_eq!(runtime.last_evaluated, later);
        assert!(runtime.state_updated_time <= runtime.last_evaluated);
    }
}
