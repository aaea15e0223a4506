//! Bridge settings and per-entity options

/// Global bridge settings, injected into the dispatcher at construction
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base topic all bridge traffic lives under
    pub base_topic: String,
    /// Reserved namespace for administrative topics (never a valid entity id)
    pub admin_namespace: String,
    /// Mirror selected failures to the legacy diagnostic topic
    pub legacy_diagnostics: bool,
    /// Companion automation-integration mode (drops redundant `state` writes
    /// on color-only changes)
    pub automation_integration: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_topic: "meshbridge".into(),
            admin_namespace: "bridge".into(),
            legacy_diagnostics: false,
            automation_integration: false,
        }
    }
}

/// Per-entity configuration options, supplied by the resolver
#[derive(Debug, Clone)]
pub struct EntityOptions {
    /// Publish predicted state immediately after a write
    pub optimistic: bool,
    /// Attribute keys excluded from optimistic reporting
    pub filtered_optimistic: Vec<String>,
    /// Issue a confirmatory read when a write does not self-report
    pub state_retrieval: bool,
}

impl Default for EntityOptions {
    fn default() -> Self {
        Self {
            optimistic: true,
            filtered_optimistic: Vec::new(),
            state_retrieval: false,
        }
    }
}
