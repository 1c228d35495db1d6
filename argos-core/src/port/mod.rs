pub mod memory;

use argos_domain::watch::record::WatchRecord;
use argos_domain::watch::state::WatchRuntime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Watch not found: {0}")]
    NotFound(String),
    #[error("Watch already exists: {0}")]
    AlreadyExists(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A watch as persisted: its raw record plus the mutable runtime.
///
/// The record is kept in wire form on purpose; a stored definition that no
/// longer parses must surface at load time so the engine can quarantine it.
#[derive(Debug, Clone)]
pub struct StoredWatch {
    pub record: WatchRecord,
    pub runtime: WatchRuntime,
}

/// Persistence port for watch definitions and their runtimes.
///
/// Implementations must be safe for concurrent use, and must bound every
/// blocking operation by `ArgosConfig::store_timeout()`; an operation that
/// cannot complete within that timeout fails with [`StoreError::Unavailable`]
/// rather than blocking the evaluator.
pub trait WatchStore: Send + Sync {
    /// Persists a new watch. Fails if the name is already taken.
    fn create(&self, record: &WatchRecord, runtime: &WatchRuntime) -> Result<(), StoreError>;

    /// Removes a watch and its runtime.
    fn delete(&self, name: &str) -> Result<(), StoreError>;

    /// Loads one watch by name.
    fn load(&self, name: &str) -> Result<StoredWatch, StoreError>;

    /// Lists every stored watch.
    fn list(&self) -> Result<Vec<StoredWatch>, StoreError>;

    /// Overwrites the runtime of an existing watch.
    fn save_runtime(&self, name: &str, runtime: &WatchRuntime) -> Result<(), StoreError>;
}
