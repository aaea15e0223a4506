//! Deferred confirmatory reads
//!
//! A write that cannot self-report is confirmed by reading the attribute
//! back after a delay. Each scheduled read is an abortable task tracked per
//! entity id, so entity removal or reconfiguration can cancel reads that
//! have not fired yet.

use crate::convert::{Converter, DispatchContext};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Handle to one scheduled confirmatory read
pub struct ConfirmHandle {
    task: JoinHandle<()>,
}

impl ConfirmHandle {
    /// Cancel the read if it has not fired yet
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Schedules deferred reads, keyed by entity id for cancellation
#[derive(Default)]
pub struct ConfirmScheduler {
    handles: Mutex<HashMap<String, Vec<ConfirmHandle>>>,
}

impl ConfirmScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a read of `key` through `converter` after `delay`. The task
    /// outlives the originating message.
    pub async fn schedule(
        &self,
        entity_id: &str,
        delay: Duration,
        converter: Arc<dyn Converter>,
        key: String,
        ctx: DispatchContext,
    ) {
        let id = entity_id.to_string();
        debug!(
            "Scheduling confirmatory read of '{}' on '{}' in {:?}",
            key, id, delay
        );

        let task_id = id.clone();
        let task = tokio::spawn(async move {
            sleep(delay).await;
            if let Err(e) = converter.read(&key, &ctx).await {
                warn!(
                    "Confirmatory read of '{}' on '{}' failed: {:#}",
                    key, task_id, e
                );
            }
        });

        let mut handles = self.handles.lock().await;
        let entry = handles.entry(id).or_default();
        entry.retain(|handle| !handle.is_finished());
        entry.push(ConfirmHandle { task });
    }

    /// Cancel every pending read for an entity. Returns how many handles
    /// were dropped (fired or not).
    pub async fn cancel_entity(&self, entity_id: &str) -> usize {
        let mut handles = self.handles.lock().await;
        match handles.remove(entity_id) {
            Some(pending) => {
                for handle in &pending {
                    handle.cancel();
                }
                pending.len()
            }
            None => 0,
        }
    }

    /// Pending (unfired) reads for an entity
    pub async fn pending_count(&self, entity_id: &str) -> usize {
        let handles = self.handles.lock().await;
        handles
            .get(entity_id)
            .map(|pending| pending.iter().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }
}
