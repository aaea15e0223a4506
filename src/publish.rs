//! Outbound publication seams
//!
//! The actual pub/sub client lives outside this crate; the dispatcher talks
//! to it through [`StatePublisher`].

use crate::entity::StateMap;
use crate::settings::Settings;
use async_trait::async_trait;
use serde::Serialize;

/// Accepts flat-map state publishes and diagnostic records. External
/// collaborator backed by the pub/sub transport.
#[async_trait]
pub trait StatePublisher: Send + Sync {
    /// Publish accumulated optimistic state for one entity or group member
    async fn publish_state(&self, id: &str, state: &StateMap) -> anyhow::Result<()>;

    /// Mirror a structured error record to the legacy diagnostic topic
    async fn publish_diagnostic(&self, record: &DiagnosticRecord) -> anyhow::Result<()>;
}

/// Record kinds understood by legacy diagnostic consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    EntityNotFound,
    ZigbeePublishError,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticMeta {
    pub friendly_name: String,
}

/// Structured record published on the legacy diagnostic topic
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticRecord {
    #[serde(rename = "type")]
    pub kind: DiagnosticKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<DiagnosticMeta>,
}

/// Fixed topic the legacy diagnostic channel lives on
pub fn diagnostic_topic(settings: &Settings) -> String {
    format!("{}/{}/log", settings.base_topic, settings.admin_namespace)
}
