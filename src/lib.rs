//! meshbridge — attribute dispatch and optimistic-state core
//!
//! This crate is the command-dispatch core of a bridge between a pub/sub
//! messaging layer and a low-power mesh device network. It accepts
//! topic-addressed commands for devices and device groups, translates each
//! requested attribute into device-protocol operations through pluggable
//! converters, and republishes the predicted ("optimistic") state without
//! waiting for network confirmation.
//!
//! The pub/sub client, the mesh transport, protocol-specific converters,
//! discovery, and persistence all live outside this crate and are injected
//! as trait objects into [`CommandDispatcher`].

pub mod convert;
pub mod dispatch;
pub mod entity;
pub mod error;
pub mod logging;
pub mod publish;
pub mod settings;
pub mod topic;

pub use convert::{ConversionResult, Converter, DispatchContext, Target};
pub use dispatch::{AttributeOutcome, CommandDispatcher, ConfirmScheduler, MessageReport};
pub use entity::{
    DefinitionRegistry, Entity, EntityResolver, MemoryStateStore, StateMap, StateStore,
};
pub use error::{BridgeError, Result};
pub use publish::{DiagnosticKind, DiagnosticRecord, StatePublisher};
pub use settings::{EntityOptions, Settings};
pub use topic::{Action, CommandDescriptor};
