use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;

use argos_domain::config::ArgosConfig;
use argos_domain::watch::sample::MetricSample;

/// History of timestamped samples, keyed by watch name.
///
/// Appends and queries are safe under concurrent access; the map shards its
/// locks per key. Samples are retained at least `retention`, and in any case
/// until the owning watch's period has passed them by (pruning is driven by
/// the engine with a per-watch cutoff).
pub struct SampleStore {
    history: DashMap<String, Vec<MetricSample>>,
    retention: Duration,
}

impl SampleStore {
    /// Creates a store with the given minimum retention.
    pub fn new(retention: Duration) -> Self {
        Self {
            history: DashMap::new(),
            retention,
        }
    }

    /// Creates a store with the configured retention.
    pub fn with_default_retention() -> Self {
        Self::new(ArgosConfig::get().sample_retention())
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Appends a sample to a watch's history. O(1) amortized; ordering is
    /// imposed at query time so out-of-order ingestion is fine.
    pub fn append(&self, watch_name: &str, sample: MetricSample) {
        self.history
            .entry(watch_name.to_string())
            .or_default()
            .push(sample);
    }

    /// Returns the samples whose timestamps lie in `[start, end)`, ascending
    /// by timestamp. Unknown watch names yield an empty vector, not an error.
    pub fn query(&self, watch_name: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<MetricSample> {
        let mut window: Vec<MetricSample> = match self.history.get(watch_name) {
            Some(samples) => samples
                .iter()
                .filter(|s| s.within(start, end))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        window.sort_by_key(|s| s.timestamp);
        window
    }

    /// Drops samples recorded before `cutoff`.
    pub fn prune(&self, watch_name: &str, cutoff: DateTime<Utc>) {
        if let Some(mut samples) = self.history.get_mut(watch_name) {
            samples.retain(|s| s.timestamp >= cutoff);
        }
    }

    /// Forgets a watch's history entirely.
    pub fn clear(&self, watch_name: &str) {
        self.history.remove(watch_name);
    }

    /// Number of retained samples for a watch.
    pub fn len(&self, watch_name: &str) -> usize {
        self.history.get(watch_name).map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, watch_name: &str) -> bool {
        self.len(watch_name) == 0
    }
}
