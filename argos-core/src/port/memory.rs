use std::collections::HashMap;
use std::sync::RwLock;

use argos_domain::watch::record::WatchRecord;
use argos_domain::watch::state::WatchRuntime;

use super::{StoreError, StoredWatch, WatchStore};

/// In-memory adapter for the persistence port.
///
/// Backs tests, the CLI, and deployments where watch definitions are
/// re-registered on startup. Operations are in-process and therefore always
/// within the store timeout.
pub struct MemoryWatchStore {
    watches: RwLock<HashMap<String, StoredWatch>>,
}

impl MemoryWatchStore {
    pub fn new() -> Self {
        Self {
            watches: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryWatchStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchStore for MemoryWatchStore {
    fn create(&self, record: &WatchRecord, runtime: &WatchRuntime) -> Result<(), StoreError> {
        let mut watches = self.watches.write().unwrap();
        if watches.contains_key(&record.name) {
            return Err(StoreError::AlreadyExists(record.name.clone()));
        }
        watches.insert(
            record.name.clone(),
            StoredWatch {
                record: record.clone(),
                runtime: runtime.clone(),
            },
        );
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        let mut watches = self.watches.write().unwrap();
        watches
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn load(&self, name: &str) -> Result<StoredWatch, StoreError> {
        let watches = self.watches.read().unwrap();
        watches
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn list(&self) -> Result<Vec<StoredWatch>, StoreError> {
        let watches = self.watches.read().unwrap();
        let mut all: Vec<StoredWatch> = watches.values().cloned().collect();
        all.sort_by(|a, b| a.record.name.cmp(&b.record.name));
        Ok(all)
    }

    fn save_runtime(&self, name: &str, runtime: &WatchRuntime) -> Result<(), StoreError> {
        let mut watches = self.watches.write().unwrap();
        match watches.get_mut(name) {
            Some(stored) => {
                stored.runtime = runtime.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argos_domain::watch::state::WatchState;
    use chrono::Utc;

    fn make_record(name: &str) -> WatchRecord {
        serde_yaml::from_str(&format!(
            r#"
AlarmName: {name}
MetricName: test_metric
Period: '300'
Statistic: Maximum
ComparisonOperator: GreaterThanOrEqualToThreshold
Threshold: '30'
"#
        ))
        .unwrap()
    }

    #[test]
    fn test_create_and_load() {
        let store = MemoryWatchStore::new();
        let now = Utc::now();
        store
            .create(&make_record("testwatch"), &WatchRuntime::new(now))
            .unwrap();

        let stored = store.load("testwatch").unwrap();
        assert_eq!(stored.record.name, "testwatch");
        assert_eq!(stored.runtime.state, WatchState::Normal);
        assert_eq!(stored.runtime.last_evaluated, now);
    }

    #[test]
    fn test_create_duplicate_rejected() {
        let store = MemoryWatchStore::new();
        let runtime = WatchRuntime::new(Utc::now());
        store.create(&make_record("testwatch"), &runtime).unwrap();
        assert!(matches!(
            store.create(&make_record("testwatch"), &runtime),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_load_unknown() {
        let store = MemoryWatchStore::new();
        assert!(matches!(
            store.load("missing"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_save_runtime_roundtrip() {
        let store = MemoryWatchStore::new();
        let now = Utc::now();
        store
            .create(&make_record("testwatch"), &WatchRuntime::new(now))
            .unwrap();

        let later = now + chrono::Duration::seconds(300);
        let mut runtime = WatchRuntime::new(now);
        runtime.transition(WatchState::Alarm, "Maximum 35.00 >= 30.00".into(), later);
        store.save_runtime("testwatch", &runtime).unwrap();

        let stored = store.load("testwatch").unwrap();
        assert_eq!(stored.runtime.state, WatchState::Alarm);
        assert_eq!(stored.runtime.last_evaluated, later);

        assert!(matches!(
            store.save_runtime("missing", &runtime),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_sorted_by_name() {
        let store = MemoryWatchStore::new();
        let runtime = WatchRuntime::new(Utc::now());
        store.create(&make_record("zeta"), &runtime).unwrap();
        store.create(&make_record("alpha"), &runtime).unwrap();

        let names: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|w| w.record.name)
            .collect();
        assert_eq!(names, ["alpha".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn test_delete() {
        let store = MemoryWatchStore::new();
        store
            .create(&make_record("testwatch"), &WatchRuntime::new(Utc::now()))
            .unwrap();
        store.delete("testwatch").unwrap();
        assert!(matches!(
            store.load("testwatch"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("testwatch"),
            Err(StoreError::NotFound(_))
        ));
    }
}
