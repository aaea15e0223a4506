//! Optimistic state aggregation
//!
//! Per-entity and per-member deltas accumulate across the whole dispatch
//! loop and flush exactly once per identifier at the end of the message.

use crate::entity::{StateMap, StateStore};
use crate::publish::StatePublisher;
use std::collections::HashMap;
use tracing::{debug, error};

/// Accumulated optimistic deltas keyed by entity or member identifier
#[derive(Default)]
pub struct PublishBuffer {
    entries: HashMap<String, StateMap>,
}

impl PublishBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a delta into the entry for the identifier
    pub fn merge(&mut self, id: &str, delta: StateMap) {
        let entry = self.entries.entry(id.to_string()).or_default();
        for (key, value) in delta {
            entry.insert(key, value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flush every non-empty entry: merge it into the state cache, then
    /// publish it. Consumes the buffer, so each identifier flushes once.
    pub async fn flush(self, state: &dyn StateStore, publisher: &dyn StatePublisher) {
        for (id, delta) in self.entries {
            if delta.is_empty() {
                continue;
            }
            state.merge(&id, &delta).await;
            debug!("Publishing optimistic state for '{}' ({} keys)", id, delta.len());
            if let Err(e) = publisher.publish_state(&id, &delta).await {
                error!("Failed to publish optimistic state for '{}': {:#}", id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::MemoryStateStore;
    use crate::publish::DiagnosticRecord;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<(String, StateMap)>>,
    }

    #[async_trait]
    impl StatePublisher for RecordingPublisher {
        async fn publish_state(&self, id: &str, state: &StateMap) -> anyhow::Result<()> {
            self.published
                .lock()
                .await
                .push((id.to_string(), state.clone()));
            Ok(())
        }

        async fn publish_diagnostic(&self, _record: &DiagnosticRecord) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn map(value: serde_json::Value) -> StateMap {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_merges_accumulate_per_identifier() {
        let mut buffer = PublishBuffer::new();
        buffer.merge("lamp1", map(json!({"state": "ON"})));
        buffer.merge("lamp1", map(json!({"brightness": 200})));
        buffer.merge("lamp2", map(json!({"state": "OFF"})));

        let store = MemoryStateStore::new();
        let publisher = RecordingPublisher::default();
        buffer.flush(&store, &publisher).await;

        let mut published = publisher.published.lock().await.clone();
        published.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].0, "lamp1");
        assert_eq!(published[0].1["state"], json!("ON"));
        assert_eq!(published[0].1["brightness"], json!(200));
        assert_eq!(published[1].0, "lamp2");
    }

    #[tokio::test]
    async fn test_flush_updates_state_cache() {
        let mut buffer = PublishBuffer::new();
        buffer.merge("lamp1", map(json!({"state": "ON"})));

        let store = MemoryStateStore::new();
        let publisher = RecordingPublisher::default();
        buffer.flush(&store, &publisher).await;

        assert_eq!(store.get("lamp1").await.unwrap()["state"], json!("ON"));
    }

    #[test]
    fn test_is_empty_reflects_merged_entries() {
        let mut buffer = PublishBuffer::new();
        assert!(buffer.is_empty());
        buffer.merge("lamp1", map(json!({"state": "ON"})));
        assert!(!buffer.is_empty());
    }

    #[tokio::test]
    async fn test_empty_entries_are_not_published() {
        let mut buffer = PublishBuffer::new();
        buffer.merge("lamp1", StateMap::new());

        let store = MemoryStateStore::new();
        let publisher = RecordingPublisher::default();
        buffer.flush(&store, &publisher).await;

        assert!(publisher.published.lock().await.is_empty());
        assert!(store.get("lamp1").await.is_none());
    }
}
