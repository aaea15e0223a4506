//! Error taxonomy for the dispatch core
//!
//! Only resolution-phase failures abort a message; everything that happens
//! per attribute is collected as an [`AttributeOutcome`] instead and never
//! propagates out of the dispatch loop.
//!
//! [`AttributeOutcome`]: crate::dispatch::AttributeOutcome

use thiserror::Error;

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

/// Failures that stop processing of the whole message.
///
/// A topic that simply does not match the bridge grammar is not represented
/// here: the dispatcher returns `Ok(None)` for those.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The addressed entity is unknown to the resolver
    #[error("entity '{0}' is not known")]
    EntityNotFound(String),
    /// The device resolved but has no capability definition
    #[error("device '{0}' is not supported (no definition)")]
    UnsupportedEntity(String),
    /// The payload is neither structured data nor a bare state word
    #[error("invalid payload on '{topic}': {reason}")]
    InvalidPayload { topic: String, reason: String },
}
