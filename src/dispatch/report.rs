//! Per-message outcome report and centralized error reporting
//!
//! Each attribute's fate is recorded as an explicit outcome value during the
//! dispatch loop; the reporter consumes the finished report in one place
//! instead of logging from deep inside call sites.

use crate::publish::{DiagnosticKind, DiagnosticMeta, DiagnosticRecord, StatePublisher};
use crate::settings::Settings;
use crate::topic::Action;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Fate of one attribute in the dispatch loop. None of these abort the
/// remaining attributes.
#[derive(Debug)]
pub enum AttributeOutcome {
    /// The converter operation ran successfully
    Applied,
    /// The selected converter already ran for this target in this message
    SkippedDuplicate,
    /// No converter in the capability set handles the attribute
    NoConverter,
    /// The attribute addressed an endpoint the device does not declare
    EndpointNotFound(String),
    /// The converter operation raised an error
    Failed(anyhow::Error),
}

/// Collected outcomes for one processed message
#[derive(Debug)]
pub struct MessageReport {
    pub entity_id: String,
    pub action: Action,
    pub outcomes: Vec<(String, AttributeOutcome)>,
}

impl MessageReport {
    pub fn new(entity_id: impl Into<String>, action: Action) -> Self {
        Self {
            entity_id: entity_id.into(),
            action,
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, attribute: impl Into<String>, outcome: AttributeOutcome) {
        self.outcomes.push((attribute.into(), outcome));
    }

    pub fn applied(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, AttributeOutcome::Applied))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, AttributeOutcome::Failed(_)))
            .count()
    }
}

/// Logs recoverable errors and mirrors selected failures to the legacy
/// diagnostic channel when that mode is enabled
pub struct ErrorReporter {
    legacy_diagnostics: bool,
    publisher: Arc<dyn StatePublisher>,
}

impl ErrorReporter {
    pub fn new(settings: &Settings, publisher: Arc<dyn StatePublisher>) -> Self {
        Self {
            legacy_diagnostics: settings.legacy_diagnostics,
            publisher,
        }
    }

    /// Report an unresolved entity identifier
    pub async fn entity_not_found(&self, id: &str) {
        info!("Entity '{}' is not known", id);
        self.mirror(DiagnosticRecord {
            kind: DiagnosticKind::EntityNotFound,
            message: format!("Entity '{}' is unknown", id),
            meta: Some(DiagnosticMeta {
                friendly_name: id.to_string(),
            }),
        })
        .await;
    }

    /// Consume a finished report: log every non-applied outcome and mirror
    /// converter failures
    pub async fn report(&self, report: &MessageReport) {
        for (attribute, outcome) in &report.outcomes {
            match outcome {
                AttributeOutcome::Applied => {}
                AttributeOutcome::SkippedDuplicate => {
                    debug!(
                        "'{}' on '{}' already satisfied by an earlier converter call",
                        attribute, report.entity_id
                    );
                }
                AttributeOutcome::NoConverter => {
                    warn!(
                        "No converter available for '{}' on '{}'",
                        attribute, report.entity_id
                    );
                }
                AttributeOutcome::EndpointNotFound(endpoint) => {
                    warn!(
                        "Device '{}' has no endpoint '{}' (attribute '{}')",
                        report.entity_id, endpoint, attribute
                    );
                }
                AttributeOutcome::Failed(e) => {
                    let message = format!(
                        "Publish '{}' '{}' to '{}' failed: '{:#}'",
                        report.action, attribute, report.entity_id, e
                    );
                    error!("{}", message);
                    self.mirror(DiagnosticRecord {
                        kind: DiagnosticKind::ZigbeePublishError,
                        message,
                        meta: Some(DiagnosticMeta {
                            friendly_name: report.entity_id.clone(),
                        }),
                    })
                    .await;
                }
            }
        }
    }

    async fn mirror(&self, record: DiagnosticRecord) {
        if !self.legacy_diagnostics {
            return;
        }
        if let Err(e) = self.publisher.publish_diagnostic(&record).await {
            error!("Failed to publish diagnostic record: {:#}", e);
        }
    }
}
