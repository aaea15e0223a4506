//! Per-message command dispatch pipeline
//!
//! One inbound message is one asynchronous unit of work: parse the topic,
//! resolve the entity, decode and order the attributes, run each attribute
//! through its converter strictly in order, then flush the accumulated
//! optimistic state exactly once. A failure on any single attribute never
//! aborts the rest of the message.

mod buffer;
mod confirm;
mod ordering;
mod payload;
mod report;

pub use buffer::PublishBuffer;
pub use confirm::{ConfirmHandle, ConfirmScheduler};
pub use report::{AttributeOutcome, ErrorReporter, MessageReport};

use crate::convert::{ConversionResult, Converter, ConverterIndex, DispatchContext, Target};
use crate::entity::{
    capability_set, DefinitionRegistry, Device, Entity, EntityLocks, EntityResolver, StateMap,
    StateStore,
};
use crate::error::{BridgeError, Result};
use crate::publish::StatePublisher;
use crate::settings::Settings;
use crate::topic::{parse_topic, Action, CommandDescriptor};
use bytes::Bytes;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Endpoint id used when neither the topic nor the attribute names one
const DEFAULT_ENDPOINT: u8 = 1;

/// Dispatches topic-addressed commands to converters and publishes the
/// resulting optimistic state
pub struct CommandDispatcher {
    settings: Settings,
    resolver: Arc<dyn EntityResolver>,
    registry: Arc<dyn DefinitionRegistry>,
    state: Arc<dyn StateStore>,
    publisher: Arc<dyn StatePublisher>,
    reporter: ErrorReporter,
    confirm: ConfirmScheduler,
    locks: EntityLocks,
}

impl CommandDispatcher {
    pub fn new(
        settings: Settings,
        resolver: Arc<dyn EntityResolver>,
        registry: Arc<dyn DefinitionRegistry>,
        state: Arc<dyn StateStore>,
        publisher: Arc<dyn StatePublisher>,
    ) -> Self {
        let reporter = ErrorReporter::new(&settings, publisher.clone());
        Self {
            settings,
            resolver,
            registry,
            state,
            publisher,
            reporter,
            confirm: ConfirmScheduler::new(),
            locks: EntityLocks::new(),
        }
    }

    /// Scheduler for deferred confirmatory reads. Hosts hook entity removal
    /// into [`ConfirmScheduler::cancel_entity`] through this.
    pub fn confirm_scheduler(&self) -> &ConfirmScheduler {
        &self.confirm
    }

    /// Process one inbound message.
    ///
    /// `Ok(None)` means the topic was not a command for this bridge.
    /// `Ok(Some(report))` carries the per-attribute outcomes. `Err` is a
    /// resolution-phase failure: unknown entity, unsupported device, or an
    /// undecodable payload.
    pub async fn handle_message(
        &self,
        topic: &str,
        payload: Bytes,
    ) -> Result<Option<MessageReport>> {
        let Some(descriptor) = parse_topic(&self.settings, topic) else {
            return Ok(None);
        };
        debug!(
            "Command for '{}' ({}{})",
            descriptor.entity_id,
            descriptor.action,
            descriptor
                .attribute
                .as_deref()
                .map(|a| format!(", attribute '{a}'"))
                .unwrap_or_default()
        );

        let entity = match self.resolver.resolve(&descriptor.entity_id).await {
            Ok(Some(entity)) => entity,
            Ok(None) => {
                self.reporter.entity_not_found(&descriptor.entity_id).await;
                return Err(BridgeError::EntityNotFound(descriptor.entity_id));
            }
            Err(e) => {
                warn!(
                    "Lookup of entity '{}' failed: {:#}",
                    descriptor.entity_id, e
                );
                self.reporter.entity_not_found(&descriptor.entity_id).await;
                return Err(BridgeError::EntityNotFound(descriptor.entity_id));
            }
        };
        if let Entity::Device(device) = &entity {
            if device.definition.is_none() {
                warn!(
                    "Device '{}' has no capability definition, cannot handle commands",
                    device.id
                );
                return Err(BridgeError::UnsupportedEntity(device.id.clone()));
            }
        }

        // Hold this entity's lock from the prior-state read through the
        // optimistic flush; concurrent messages for the same entity must not
        // interleave their cache updates.
        let _guard = self.locks.acquire(entity.id()).await;

        let prior_state = self.state.get(entity.id()).await.unwrap_or_default();
        let mut member_states = HashMap::new();
        if let Entity::Group(group) = &entity {
            for member in &group.members {
                let state = self.state.get(&member.id).await.unwrap_or_default();
                member_states.insert(member.id.clone(), state);
            }
        }

        let mut message = match payload::decode(&descriptor, topic, &payload) {
            Ok(message) => message,
            Err(e) => {
                warn!("{}", e);
                return Err(e);
            }
        };
        payload::drop_redundant_state(&mut message, &prior_state, &self.settings);
        let ordered = ordering::order_attributes(&message);

        let capability = capability_set(&entity, self.registry.as_ref());
        let index = ConverterIndex::build(&capability);

        let mut used: HashSet<(String, usize)> = HashSet::new();
        let mut buffer = PublishBuffer::new();
        let mut report = MessageReport::new(entity.id(), descriptor.action);

        for (key, value) in ordered {
            let outcome = self
                .dispatch_attribute(
                    &descriptor,
                    &entity,
                    &message,
                    &prior_state,
                    &member_states,
                    &index,
                    &mut used,
                    &mut buffer,
                    &key,
                    &value,
                )
                .await;
            report.record(key, outcome);
        }

        if !buffer.is_empty() {
            buffer
                .flush(self.state.as_ref(), self.publisher.as_ref())
                .await;
        }
        self.reporter.report(&report).await;

        Ok(Some(report))
    }

    /// Run one (attribute, value) pair through its converter. Everything
    /// that can go wrong here is contained in the returned outcome.
    #[allow(clippy::too_many_arguments)]
    async fn dispatch_attribute(
        &self,
        descriptor: &CommandDescriptor,
        entity: &Entity,
        message: &StateMap,
        prior_state: &StateMap,
        member_states: &HashMap<String, StateMap>,
        index: &ConverterIndex,
        used: &mut HashSet<(String, usize)>,
        buffer: &mut PublishBuffer,
        key: &str,
        value: &Value,
    ) -> AttributeOutcome {
        // A declared-endpoint suffix on the attribute key overrides the
        // endpoint named in the topic, for this attribute only.
        let (bare_key, endpoint_name) = match entity.as_device() {
            Some(device) => match split_endpoint_suffix(device, key) {
                Some((bare, endpoint)) => (bare.to_string(), Some(endpoint.to_string())),
                None => (key.to_string(), descriptor.endpoint_name.clone()),
            },
            None => (key.to_string(), None),
        };

        let (target, target_id) = match entity {
            Entity::Device(device) => {
                let endpoint = match &endpoint_name {
                    Some(name) => match device.endpoints.get(name) {
                        Some(id) => *id,
                        None => return AttributeOutcome::EndpointNotFound(name.clone()),
                    },
                    None => DEFAULT_ENDPOINT,
                };
                let target = Target::Device {
                    network_address: device.network_address,
                    endpoint,
                };
                (target, format!("{}/{}", device.id, endpoint))
            }
            Entity::Group(group) => {
                let target = Target::Group {
                    group_id: group.group_id,
                };
                (target, group.id.clone())
            }
        };

        let Some(converter) = index.get(&bare_key).cloned() else {
            return AttributeOutcome::NoConverter;
        };
        let converter_id = Arc::as_ptr(&converter) as *const () as usize;

        if descriptor.action == Action::Set && used.contains(&(target_id.clone(), converter_id)) {
            return AttributeOutcome::SkippedDuplicate;
        }

        let ctx = DispatchContext {
            endpoint_name: endpoint_name.clone(),
            target,
            options: entity.options().clone(),
            message: strip_suffix_from_keys(message, endpoint_name.as_deref()),
            prior_state: prior_state.clone(),
            member_states: member_states.clone(),
            definition: entity.as_device().and_then(|d| d.definition.clone()),
        };

        match descriptor.action {
            Action::Get => match converter.read(&bare_key, &ctx).await {
                Ok(()) => AttributeOutcome::Applied,
                Err(e) => AttributeOutcome::Failed(e),
            },
            Action::Set => {
                // Invocation counts toward single-use even when the write
                // fails: a failed write may have partially executed on the
                // device, so retrying it for a later attribute could
                // double-apply effects.
                used.insert((target_id, converter_id));
                match converter.write(&bare_key, value, &ctx).await {
                    Ok(result) => {
                        if let Some(result) = result {
                            self.apply_result(
                                entity,
                                endpoint_name.as_deref(),
                                result,
                                buffer,
                                &converter,
                                &bare_key,
                                &ctx,
                            )
                            .await;
                        }
                        AttributeOutcome::Applied
                    }
                    Err(e) => AttributeOutcome::Failed(e),
                }
            }
        }
    }

    /// Fold a conversion result into the publish buffer and schedule a
    /// confirmatory read when the write does not self-report
    #[allow(clippy::too_many_arguments)]
    async fn apply_result(
        &self,
        entity: &Entity,
        endpoint_name: Option<&str>,
        result: ConversionResult,
        buffer: &mut PublishBuffer,
        converter: &Arc<dyn Converter>,
        key: &str,
        ctx: &DispatchContext,
    ) {
        let ConversionResult {
            state,
            members,
            confirm_read_after,
        } = result;
        let options = entity.options();

        if options.optimistic {
            let mut delta: StateMap = match endpoint_name {
                Some(endpoint) => state
                    .into_iter()
                    .map(|(k, v)| (format!("{k}_{endpoint}"), v))
                    .collect(),
                None => state,
            };
            for excluded in &options.filtered_optimistic {
                delta.shift_remove(excluded);
            }
            if !delta.is_empty() {
                buffer.merge(entity.id(), delta);
            }
            for (member_id, member_delta) in members {
                if !member_delta.is_empty() {
                    buffer.merge(&member_id, member_delta);
                }
            }
        }

        if let Some(delay) = confirm_read_after {
            if options.state_retrieval {
                self.confirm
                    .schedule(
                        entity.id(),
                        delay,
                        converter.clone(),
                        key.to_string(),
                        ctx.clone(),
                    )
                    .await;
            }
        }
    }
}

/// Split a declared endpoint-name suffix off an attribute key. The longest
/// declared name wins when several match.
fn split_endpoint_suffix<'a>(device: &'a Device, key: &'a str) -> Option<(&'a str, &'a str)> {
    device
        .endpoints
        .keys()
        .filter_map(|name| {
            key.strip_suffix(name.as_str())
                .and_then(|rest| rest.strip_suffix('_'))
                .filter(|bare| !bare.is_empty())
                .map(|bare| (bare, name.as_str()))
        })
        .max_by_key(|(_, name)| name.len())
}

/// Rewrite the decoded message copy so every key carrying the endpoint
/// suffix appears bare, the way converters expect to see it
fn strip_suffix_from_keys(message: &StateMap, endpoint: Option<&str>) -> StateMap {
    let Some(endpoint) = endpoint else {
        return message.clone();
    };
    let suffix = format!("_{endpoint}");
    message
        .iter()
        .map(|(key, value)| match key.strip_suffix(&suffix) {
            Some(bare) if !bare.is_empty() => (bare.to_string(), value.clone()),
            _ => (key.clone(), value.clone()),
        })
        .collect()
}
