//! Entity model and resolution
//!
//! An entity is the addressable target of a command: a single device or a
//! group of devices. Resolution is delegated to an external collaborator;
//! this module owns the tagged union and the capability-set rules.

mod state;

pub use state::{EntityLocks, MemoryStateStore, StateMap, StateStore};

use crate::convert::Converter;
use crate::settings::EntityOptions;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Capability definition of a supported device model
#[derive(Debug, Clone)]
pub struct Definition {
    pub model: String,
    pub vendor: String,
    pub description: String,
}

/// A single mesh device
#[derive(Clone)]
pub struct Device {
    /// Friendly identifier used in topics and publishes
    pub id: String,
    /// Network address on the mesh
    pub network_address: u16,
    /// Declared endpoint names mapped to endpoint ids
    pub endpoints: HashMap<String, u8>,
    /// Converters declared by the device's definition
    pub converters: Vec<Arc<dyn Converter>>,
    pub options: EntityOptions,
    /// `None` when the device type is unsupported
    pub definition: Option<Arc<Definition>>,
}

/// One member of a group, with its own capability set and cached state id
#[derive(Clone)]
pub struct GroupMember {
    pub id: String,
    pub converters: Vec<Arc<dyn Converter>>,
}

/// A device group addressed as one logical entity
#[derive(Clone)]
pub struct Group {
    pub id: String,
    /// Group address on the mesh
    pub group_id: u16,
    pub members: Vec<GroupMember>,
    pub options: EntityOptions,
}

/// Device-or-group target of a command. Exactly one variant per resolution.
#[derive(Clone)]
pub enum Entity {
    Device(Device),
    Group(Group),
}

impl Entity {
    pub fn id(&self) -> &str {
        match self {
            Entity::Device(device) => &device.id,
            Entity::Group(group) => &group.id,
        }
    }

    pub fn options(&self) -> &EntityOptions {
        match self {
            Entity::Device(device) => &device.options,
            Entity::Group(group) => &group.options,
        }
    }

    pub fn as_device(&self) -> Option<&Device> {
        match self {
            Entity::Device(device) => Some(device),
            Entity::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Entity::Device(_) => None,
            Entity::Group(group) => Some(group),
        }
    }
}

/// Maps entity identifiers to resolved entities. External collaborator.
#[async_trait]
pub trait EntityResolver: Send + Sync {
    /// Look up an entity by its friendly identifier.
    ///
    /// `Ok(None)` means the identifier is unknown; `Err` is a lookup
    /// infrastructure failure and is treated the same way by the dispatcher.
    async fn resolve(&self, id: &str) -> anyhow::Result<Option<Entity>>;
}

/// Opaque registry of capability definitions. External collaborator.
pub trait DefinitionRegistry: Send + Sync {
    /// Generic fallback converters covering common lighting, cover,
    /// thermostat, and scene operations. Used for groups whose members
    /// declare no capabilities of their own.
    fn default_converters(&self) -> Vec<Arc<dyn Converter>>;
}

/// Compute the capability set the dispatcher works against.
///
/// Devices use their declared converters. Groups use the deduplicated union
/// of member converters; an empty union falls back to the registry's default
/// set, because a heterogeneous or empty group with no reachable behavior
/// would be worse than generic defaults.
pub fn capability_set(entity: &Entity, registry: &dyn DefinitionRegistry) -> Vec<Arc<dyn Converter>> {
    match entity {
        Entity::Device(device) => device.converters.clone(),
        Entity::Group(group) => {
            let mut set: Vec<Arc<dyn Converter>> = Vec::new();
            for member in &group.members {
                for converter in &member.converters {
                    if !set.iter().any(|known| Arc::ptr_eq(known, converter)) {
                        set.push(converter.clone());
                    }
                }
            }
            if set.is_empty() {
                registry.default_converters()
            } else {
                set
            }
        }
    }
}
