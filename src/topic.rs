//! Topic parsing for inbound command messages
//!
//! Grammar: `<base>/<entityId>[/<endpointName>]/<get|set>[/<attribute>]`.
//! Topics outside the grammar are not errors, they are simply not for us.

use crate::settings::Settings;

/// Requested action extracted from the topic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Get,
    Set,
}

impl Action {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "get" => Some(Action::Get),
            "set" => Some(Action::Set),
            _ => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Get => write!(f, "get"),
            Action::Set => write!(f, "set"),
        }
    }
}

/// Structured form of a command topic, produced once per message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub entity_id: String,
    pub endpoint_name: Option<String>,
    pub action: Action,
    pub attribute: Option<String>,
}

/// Parse a raw topic into a [`CommandDescriptor`].
///
/// Returns `None` when the topic does not carry the configured base prefix,
/// addresses the reserved administrative namespace, or does not match the
/// command grammar. `None` means "ignore the message", not failure.
pub fn parse_topic(settings: &Settings, topic: &str) -> Option<CommandDescriptor> {
    let prefix = format!("{}/", settings.base_topic);
    let remainder = topic.strip_prefix(&prefix)?;

    let segments: Vec<&str> = remainder.split('/').collect();
    if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    if segments[0] == settings.admin_namespace {
        return None;
    }

    // The action segment sits right after the entity id, or one segment
    // later when an endpoint name is addressed.
    let (endpoint_name, action, rest) = if let Some(action) = Action::from_segment(segments[1]) {
        (None, action, &segments[2..])
    } else if segments.len() >= 3 {
        let action = Action::from_segment(segments[2])?;
        (Some(segments[1].to_string()), action, &segments[3..])
    } else {
        return None;
    };

    let attribute = match rest {
        [] => None,
        [attribute] => Some((*attribute).to_string()),
        _ => return None,
    };

    Some(CommandDescriptor {
        entity_id: segments[0].to_string(),
        endpoint_name,
        action,
        attribute,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            base_topic: "base".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_plain_set() {
        let descriptor = parse_topic(&settings(), "base/lamp1/set").unwrap();
        assert_eq!(descriptor.entity_id, "lamp1");
        assert_eq!(descriptor.endpoint_name, None);
        assert_eq!(descriptor.action, Action::Set);
        assert_eq!(descriptor.attribute, None);
    }

    #[test]
    fn test_get_with_attribute() {
        let descriptor = parse_topic(&settings(), "base/lamp1/get/brightness").unwrap();
        assert_eq!(descriptor.action, Action::Get);
        assert_eq!(descriptor.attribute.as_deref(), Some("brightness"));
    }

    #[test]
    fn test_endpoint_suffix() {
        let descriptor = parse_topic(&settings(), "base/switch1/left/set").unwrap();
        assert_eq!(descriptor.entity_id, "switch1");
        assert_eq!(descriptor.endpoint_name.as_deref(), Some("left"));
    }

    #[test]
    fn test_endpoint_and_attribute() {
        let descriptor = parse_topic(&settings(), "base/switch1/left/set/state").unwrap();
        assert_eq!(descriptor.endpoint_name.as_deref(), Some("left"));
        assert_eq!(descriptor.attribute.as_deref(), Some("state"));
    }

    #[test]
    fn test_wrong_base_ignored() {
        assert!(parse_topic(&settings(), "other/lamp1/set").is_none());
        // a topic that merely contains the base somewhere does not count
        assert!(parse_topic(&settings(), "prefix/base/lamp1/set").is_none());
    }

    #[test]
    fn test_admin_namespace_ignored() {
        assert!(parse_topic(&settings(), "base/bridge/set").is_none());
        assert!(parse_topic(&settings(), "base/bridge/request/restart").is_none());
    }

    #[test]
    fn test_non_command_shapes_ignored() {
        assert!(parse_topic(&settings(), "base/lamp1").is_none());
        assert!(parse_topic(&settings(), "base/lamp1/state").is_none());
        assert!(parse_topic(&settings(), "base/lamp1/left/right/set").is_none());
        assert!(parse_topic(&settings(), "base/lamp1/set/a/b").is_none());
        assert!(parse_topic(&settings(), "base//set").is_none());
    }
}
