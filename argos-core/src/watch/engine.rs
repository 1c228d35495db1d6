use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use argos_domain::config::ArgosConfig;
use argos_domain::watch::evaluation::{Disposition, Evaluation};
use argos_domain::watch::record::{SampleRecord, WatchRecord};
use argos_domain::watch::rule::{WatchRule, WatchRuleError};
use argos_domain::watch::state::WatchRuntime;

use crate::port::{StoreError, StoredWatch, WatchStore};

use super::evaluator;
use super::sample_store::SampleStore;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Watch not found: {0}")]
    NotFound(String),
    #[error("Invalid watch definition: {0}")]
    Invalid(#[from] WatchRuleError),
    #[error("Watch {0} is quarantined: {1}")]
    Quarantined(String, String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Cooperative cancellation signal carried by an evaluation.
///
/// Cancellation observed before the commit point leaves the stored runtime
/// untouched and emits no actions.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Main service for watch evaluation.
///
/// Wires the sample history, the pure evaluator, and the persistence port.
/// Evaluations of the same watch are serialized through a per-name gate;
/// distinct watches may evaluate concurrently.
pub struct WatchEngine {
    store: Arc<dyn WatchStore>,
    samples: SampleStore,
    gates: DashMap<String, Arc<Mutex<()>>>,
    quarantined: DashMap<String, String>,
}

impl WatchEngine {
    /// Creates an engine backed by the given store, with the configured
    /// sample retention.
    pub fn new(store: Arc<dyn WatchStore>) -> Self {
        Self::with_retention(store, ArgosConfig::get().sample_retention())
    }

    /// Creates an engine with a custom sample retention floor.
    pub fn with_retention(store: Arc<dyn WatchStore>, retention: Duration) -> Self {
        Self {
            store,
            samples: SampleStore::new(retention),
            gates: DashMap::new(),
            quarantined: DashMap::new(),
        }
    }

    // ── Watch management ───────────────────────────────────────────────

    /// Validates and persists a new watch. Nothing is stored when
    /// validation fails.
    pub fn create_watch(
        &self,
        record: &WatchRecord,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let rule = record.to_rule()?;
        let runtime = record.initial_runtime(now)?;
        self.store.create(record, &runtime)?;
        self.quarantined.remove(&record.name);
        info!(watch = %record.name, condition = %rule.describe(), "watch created");
        Ok(())
    }

    /// Removes a watch, its sample history, and any quarantine mark.
    pub fn delete_watch(&self, name: &str) -> Result<(), EngineError> {
        self.store
            .delete(name)
            .map_err(|e| Self::map_store(name, e))?;
        self.samples.clear(name);
        self.gates.remove(name);
        self.quarantined.remove(name);
        info!(watch = name, "watch deleted");
        Ok(())
    }

    /// Loads one watch as a typed rule plus its runtime.
    pub fn watch(&self, name: &str) -> Result<(WatchRule, WatchRuntime), EngineError> {
        let stored = self
            .store
            .load(name)
            .map_err(|e| Self::map_store(name, e))?;
        self.parse_stored(stored)
    }

    /// Lists every schedulable watch. Stored records that no longer parse
    /// are quarantined and skipped.
    pub fn list_watches(&self) -> Result<Vec<(WatchRule, WatchRuntime)>, EngineError> {
        let mut watches = Vec::new();
        for stored in self.store.list()? {
            match self.parse_stored(stored) {
                Ok(parsed) => watches.push(parsed),
                Err(EngineError::Quarantined(..)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(watches)
    }

    pub fn is_quarantined(&self, name: &str) -> bool {
        self.quarantined.contains_key(name)
    }

    /// Quarantined watch names with the parse failure that caused each.
    pub fn quarantined_watches(&self) -> Vec<(String, String)> {
        self.quarantined
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    // ── Ingestion ──────────────────────────────────────────────────────

    /// Routes an ingested sample record into its watch's history.
    ///
    /// A record whose data map does not carry the watch's configured
    /// metric is skipped, not an error.
    pub fn ingest(&self, record: &SampleRecord) -> Result<(), EngineError> {
        let (rule, _) = self.watch(&record.watch_name)?;
        match record.to_sample(&rule.metric_name) {
            Some(sample) => {
                self.samples.append(&record.watch_name, sample);
                Ok(())
            }
            None => {
                debug!(
                    watch = %record.watch_name,
                    metric = %rule.metric_name,
                    "sample record carries no data for the configured metric, skipping"
                );
                Ok(())
            }
        }
    }

    // ── Evaluation ─────────────────────────────────────────────────────

    /// Evaluates one watch at `now`.
    pub fn evaluate(&self, name: &str, now: DateTime<Utc>) -> Result<Evaluation, EngineError> {
        self.evaluate_with_cancel(name, now, &CancelFlag::new())
    }

    /// Evaluates one watch, honoring a cancellation signal.
    ///
    /// Actions appear on the result only once the new runtime has been
    /// persisted; a store failure at commit time keeps the previous state
    /// and flags the result for retry on the next tick.
    pub fn evaluate_with_cancel(
        &self,
        name: &str,
        now: DateTime<Utc>,
        cancel: &CancelFlag,
    ) -> Result<Evaluation, EngineError> {
        if let Some(reason) = self.quarantined.get(name) {
            return Err(EngineError::Quarantined(
                name.to_string(),
                reason.value().clone(),
            ));
        }

        let gate = self
            .gates
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _serialized = gate.lock().unwrap();

        let stored = self
            .store
            .load(name)
            .map_err(|e| Self::map_store(name, e))?;
        let (rule, runtime) = self.parse_stored(stored)?;

        let window_start = runtime.last_evaluated;
        let window_end = window_start + rule.period_chrono();
        let samples = self.samples.query(name, window_start, window_end);

        let mut next = runtime.clone();
        let evaluation = evaluator::evaluate(&rule, &mut next, &samples, now);

        if cancel.is_cancelled() {
            debug!(watch = name, "evaluation cancelled before commit");
            return Ok(Evaluation::cancelled(&rule, runtime.state, now));
        }

        if evaluation.disposition == Disposition::Deferred {
            return Ok(evaluation);
        }

        if let Err(e) = self.store.save_runtime(name, &next) {
            match e {
                StoreError::Unavailable(detail) => {
                    warn!(
                        watch = name,
                        error = %detail,
                        "runtime not persisted, keeping previous state"
                    );
                    return Ok(Evaluation::store_unavailable(&rule, runtime.state, now));
                }
                other => return Err(Self::map_store(name, other)),
            }
        }

        let horizon = rule.period.max(self.samples.retention());
        self.samples
            .prune(name, now - chrono::Duration::seconds(horizon.as_secs() as i64));

        if evaluation.transitioned() {
            info!(
                watch = name,
                from = %evaluation.previous_state,
                to = %evaluation.state,
                actions = ?evaluation.actions,
                "watch transitioned"
            );
        } else {
            debug!(watch = name, state = %evaluation.state, "watch evaluated");
        }
        Ok(evaluation)
    }

    // ── Internal helpers ───────────────────────────────────────────────

    fn parse_stored(&self, stored: StoredWatch) -> Result<(WatchRule, WatchRuntime), EngineError> {
        let name = stored.record.name.clone();
        match stored.record.to_rule() {
            Ok(rule) => Ok((rule, stored.runtime)),
            Err(e) => {
                let reason = e.to_string();
                if self
                    .quarantined
                    .insert(name.clone(), reason.clone())
                    .is_none()
                {
                    warn!(
                        watch = %name,
                        error = %reason,
                        "stored watch no longer parses, quarantined until recreated"
                    );
                }
                Err(EngineError::Quarantined(name, reason))
            }
        }
    }

    fn map_store(name: &str, e: StoreError) -> EngineError {
        match e {
            StoreError::NotFound(_) => EngineError::NotFound(name.to_string()),
            other => EngineError::Store(other),
        }
    }
}
