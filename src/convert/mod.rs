//! Converter abstraction and per-attribute dispatch context
//!
//! A converter translates one or more named attributes into device-protocol
//! write/read operations. Implementations live in the protocol layer and are
//! shared, stateless trait objects; the core only selects and invokes them.

use crate::entity::{Definition, StateMap};
use crate::settings::EntityOptions;
use anyhow::bail;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Protocol-level write/read target resolved for one attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Device { network_address: u16, endpoint: u8 },
    Group { group_id: u16 },
}

/// Transient per-attribute bundle handed to converter operations
#[derive(Clone)]
pub struct DispatchContext {
    /// Endpoint name in effect for this attribute, if any
    pub endpoint_name: Option<String>,
    pub target: Target,
    pub options: EntityOptions,
    /// Full decoded message with endpoint-suffixed keys rewritten bare, so
    /// converters see attribute names as if no endpoint were involved
    pub message: StateMap,
    /// Cached prior state of the addressed entity
    pub prior_state: StateMap,
    /// Cached prior state per group member (groups only)
    pub member_states: HashMap<String, StateMap>,
    pub definition: Option<Arc<Definition>>,
}

/// Outcome of a successful write operation
#[derive(Debug, Default)]
pub struct ConversionResult {
    /// Predicted state delta for the addressed entity
    pub state: StateMap,
    /// Predicted state deltas per group member (fan-out)
    pub members: HashMap<String, StateMap>,
    /// When set, the write does not self-report and should be confirmed by
    /// a deferred read after this delay
    pub confirm_read_after: Option<Duration>,
}

/// Capability handler for a set of named attributes.
///
/// Write and read are both optional; the defaults reject the operation so an
/// implementation only overrides what the device actually supports.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Attribute names this converter handles
    fn keys(&self) -> &[&str];

    /// Issue a device write for the attribute. Returning `Ok(None)` means
    /// the write happened but no optimistic update is possible.
    async fn write(
        &self,
        key: &str,
        _value: &Value,
        _ctx: &DispatchContext,
    ) -> anyhow::Result<Option<ConversionResult>> {
        bail!("attribute '{key}' is not writable")
    }

    /// Issue a device read for the attribute
    async fn read(&self, key: &str, _ctx: &DispatchContext) -> anyhow::Result<()> {
        bail!("attribute '{key}' is not readable")
    }
}

/// Attribute-name lookup table, precomputed once per capability set.
///
/// The first converter claiming a key wins; definitions are expected not to
/// declare overlapping keys within one capability set.
pub struct ConverterIndex {
    by_key: HashMap<String, Arc<dyn Converter>>,
}

impl ConverterIndex {
    pub fn build(capability_set: &[Arc<dyn Converter>]) -> Self {
        let mut by_key = HashMap::new();
        for converter in capability_set {
            for key in converter.keys() {
                by_key
                    .entry((*key).to_string())
                    .or_insert_with(|| converter.clone());
            }
        }
        Self { by_key }
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn Converter>> {
        self.by_key.get(key)
    }
}
