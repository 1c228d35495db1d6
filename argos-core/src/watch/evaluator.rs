use chrono::{DateTime, Utc};

use argos_domain::watch::evaluation::Evaluation;
use argos_domain::watch::rule::WatchRule;
use argos_domain::watch::sample::MetricSample;
use argos_domain::watch::state::WatchRuntime;

/// Runs one evaluation pass for a rule, mutating `runtime` in place.
///
/// The pass is a pure function of `(rule, runtime, samples, now)`:
///
/// 1. Cadence: if less than one period has elapsed since
///    `runtime.last_evaluated`, nothing runs and `runtime` is untouched.
/// 2. Window: samples with timestamps in
///    `[last_evaluated, last_evaluated + period)` feed the statistic.
/// 3. Decide: empty window -> NODATA; aggregate breaching the threshold ->
///    ALARM; otherwise NORMAL.
/// 4. Commit: `last_evaluated` moves to `now`; a state change additionally
///    stamps `state_updated_time` and rewrites the state reason.
///
/// Actions appear on the returned [`Evaluation`] only for a transition, and
/// only when the rule has actions enabled. Callers own persistence; handing
/// in a scratch copy of the stored runtime makes the pass abortable.
pub fn evaluate(
    rule: &WatchRule,
    runtime: &mut WatchRuntime,
    samples: &[MetricSample],
    now: DateTime<Utc>,
) -> Evaluation {
    if now - runtime.last_evaluated < rule.period_chrono() {
        return Evaluation::deferred(rule, runtime.state, now);
    }

    let window_start = runtime.last_evaluated;
    let window_end = window_start + rule.period_chrono();
    let values: Vec<f64> = samples
        .iter()
        .filter(|s| s.within(window_start, window_end))
        .map(|s| s.value)
        .collect();

    let (new_state, value) = rule.assess(&values);
    let previous = runtime.state;

    if new_state == previous {
        runtime.mark_evaluated(now);
        return Evaluation::steady(rule, new_state, value, now);
    }

    runtime.transition(new_state, rule.reason_for(value), now);
    runtime.state_reason_data = Some(
        serde_json::json!({
            "statistic": rule.statistic.name(),
            "value": value,
            "threshold": rule.threshold,
        })
        .to_string(),
    );

    let actions = if rule.actions_enabled {
        rule.actions.for_state(new_state).to_vec()
    } else {
        Vec::new()
    };
    Evaluation::transition(rule, previous, new_state, value, actions, now)
}
