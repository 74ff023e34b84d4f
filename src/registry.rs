//! DNS registry abstraction and the in-process backend.
//!
//! The [`RecordRegistry`] trait is the seam between the sync engine and
//! whatever stores the records. Backends must make `register`/`remove`
//! idempotent and must scope `list` to records tagged as owned by this
//! instance's hostname.

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::SyncError;
use crate::record::RecordIntent;

/// Lock name shared by every replica of this tool; taking it serializes
/// reconciliation system-wide.
pub const GLOBAL_LOCK_KEY: &str = "__global__";

/// A task to run while holding registry locks.
pub type LockedTask = BoxFuture<'static, Result<(), SyncError>>;

/// The DNS backend collaborator.
#[async_trait]
pub trait RecordRegistry: Send + Sync {
    /// Records currently registered and tagged as owned by this instance.
    async fn list(&self) -> Result<Vec<RecordIntent>, SyncError>;

    /// Register a record. Idempotent.
    async fn register(&self, intent: &RecordIntent) -> Result<(), SyncError>;

    /// Remove a record. Idempotent.
    async fn remove(&self, intent: &RecordIntent) -> Result<(), SyncError>;

    /// Acquire the named locks, run `task`, and release them on every exit
    /// path. Only acquisition itself may fail.
    async fn lock_transaction(&self, keys: &[String], task: LockedTask)
        -> Result<(), SyncError>;

    /// Release backend resources.
    async fn close(&self) -> Result<(), SyncError>;
}

/// In-process [`RecordRegistry`].
///
/// Records live in a map keyed by record key; named locks are per-key
/// async mutexes, acquired in sorted order. The lock is process-wide
/// rather than distributed, which is exactly what a single-instance
/// deployment and the test suite need.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    hostname: String,
    records: Mutex<HashMap<String, RecordIntent>>,
    locks: SyncMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MemoryRegistry {
    /// Create an empty registry listing records owned by `hostname`.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            records: Mutex::new(HashMap::new()),
            locks: SyncMutex::new(HashMap::new()),
        }
    }

    /// Every stored record regardless of owner.
    pub async fn snapshot(&self) -> Vec<RecordIntent> {
        self.records.lock().await.values().cloned().collect()
    }

    /// Seed a record directly, bypassing the sync path.
    pub async fn seed(&self, intent: RecordIntent) {
        self.records.lock().await.insert(intent.key(), intent);
    }
}

#[async_trait]
impl RecordRegistry for MemoryRegistry {
    async fn list(&self) -> Result<Vec<RecordIntent>, SyncError> {
        Ok(self
            .records
            .lock()
            .await
            .values()
            .filter(|intent| intent.hostname == self.hostname)
            .cloned()
            .collect())
    }

    async fn register(&self, intent: &RecordIntent) -> Result<(), SyncError> {
        debug!(record = %intent.render(), "registering record");
        self.records
            .lock()
            .await
            .insert(intent.key(), intent.clone());
        Ok(())
    }

    async fn remove(&self, intent: &RecordIntent) -> Result<(), SyncError> {
        debug!(record = %intent.render(), "removing record");
        self.records.lock().await.remove(&intent.key());
        Ok(())
    }

    async fn lock_transaction(
        &self,
        keys: &[String],
        task: LockedTask,
    ) -> Result<(), SyncError> {
        let mut sorted: Vec<String> = keys.to_vec();
        sorted.sort();
        sorted.dedup();

        let mutexes: Vec<Arc<Mutex<()>>> = {
            let mut locks = self.locks.lock();
            sorted
                .iter()
                .map(|key| locks.entry(key.clone()).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in &mutexes {
            guards.push(mutex.lock().await);
        }

        task.await
    }

    async fn close(&self) -> Result<(), SyncError> {
        Ok(())
    }
}
