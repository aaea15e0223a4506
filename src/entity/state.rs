//! Cached entity state and per-entity serialization
//!
//! Multiple messages may touch the same entity concurrently; the dispatcher
//! holds that entity's lock from the prior-state read through the optimistic
//! flush so concurrent units cannot lose updates.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Flat attribute/value map, the unit of published and cached state
pub type StateMap = serde_json::Map<String, serde_json::Value>;

/// Access to the last known state of entities. External collaborator.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Last known state for the identifier, if any
    async fn get(&self, id: &str) -> Option<StateMap>;

    /// Merge a delta into the cached state for the identifier
    async fn merge(&self, id: &str, delta: &StateMap);
}

/// In-memory [`StateStore`]. State does not survive a restart.
#[derive(Default)]
pub struct MemoryStateStore {
    entries: RwLock<HashMap<String, StateMap>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, id: &str) -> Option<StateMap> {
        self.entries.read().await.get(id).cloned()
    }

    async fn merge(&self, id: &str, delta: &StateMap) {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(id.to_string()).or_default();
        for (key, value) in delta {
            entry.insert(key.clone(), value.clone());
        }
    }
}

/// Keyed mutex serializing state-cache access per entity identifier
#[derive(Default)]
pub struct EntityLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for an entity, creating it on first use
    pub async fn acquire(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
