use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single metric observation at a point in time.
///
/// Samples carry no identity; two samples with equal fields are the same
/// observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    pub metric_name: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub unit: String,
}

impl MetricSample {
    pub fn new(
        metric_name: impl Into<String>,
        timestamp: DateTime<Utc>,
        value: f64,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            metric_name: metric_name.into(),
            timestamp,
            value,
            unit: unit.into(),
        }
    }

    /// True when the timestamp falls inside the half-open window
    /// `[start, end)`.
    pub fn within(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.timestamp >= start && self.timestamp < end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_structural_equality() {
        let now = Utc::now();
        let a = MetricSample::new("test_metric", now, 35.0, "Count");
        let b = MetricSample::new("test_metric", now, 35.0, "Count");
        assert_eq!(a, b);

        let c = MetricSample::new("test_metric", now, 36.0, "Count");
        assert_ne!(a, c);
    }

    #[test]
    fn test_within_half_open_window() {
        let start = Utc::now();
        let end = start + Duration::seconds(300);

        let at_start = MetricSample::new("m", start, 1.0, "Count");
        let inside = MetricSample::new("m", start + Duration::seconds(150), 1.0, "Count");
        let at_end = MetricSample::new("m", end, 1.0, "Count");
        let before = MetricSample::new("m", start - Duration::seconds(1), 1.0, "Count");

        assert!(at_start.within(start, end));
        assert!(inside.within(start, end));
        assert!(!at_end.within(start, end));
        assert!(!before.within(start, end));
    }
}
