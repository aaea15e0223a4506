//! Payload decoding into a flat attribute/value map

use crate::entity::StateMap;
use crate::error::BridgeError;
use crate::settings::Settings;
use crate::topic::CommandDescriptor;
use bytes::Bytes;
use serde_json::Value;

/// Bare payload words accepted in place of a structured body
const STATE_WORDS: [&str; 8] = [
    "on", "off", "toggle", "open", "close", "stop", "lock", "unlock",
];

/// Decode the raw payload into a flat attribute map.
///
/// With an explicit attribute in the topic, the payload is the value for
/// exactly that attribute (structured parse, raw-string fallback). Otherwise
/// the payload must be a structured object, or a bare state word which is
/// synthesized into `{state: <word>}`.
pub fn decode(
    descriptor: &CommandDescriptor,
    topic: &str,
    payload: &Bytes,
) -> Result<StateMap, BridgeError> {
    let raw = String::from_utf8_lossy(payload);

    if let Some(attribute) = &descriptor.attribute {
        let value = serde_json::from_str::<Value>(&raw)
            .unwrap_or_else(|_| Value::String(raw.trim().to_string()));
        let mut map = StateMap::new();
        map.insert(attribute.clone(), value);
        return Ok(map);
    }

    // Bare JSON strings and unquoted words both count as state words.
    let candidate = match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => return Ok(map),
        Ok(Value::String(word)) => word,
        _ => raw.trim().to_string(),
    };

    if STATE_WORDS
        .iter()
        .any(|word| candidate.eq_ignore_ascii_case(word))
    {
        let mut map = StateMap::new();
        map.insert("state".into(), Value::String(candidate));
        return Ok(map);
    }

    Err(BridgeError::InvalidPayload {
        topic: topic.to_string(),
        reason: "not structured data and not a known state word".into(),
    })
}

/// Companion automation-integration adjustment: a color or color-temperature
/// change on an already-on entity does not need the redundant `state` write,
/// which would force two device operations where one suffices.
pub fn drop_redundant_state(message: &mut StateMap, prior_state: &StateMap, settings: &Settings) {
    if !settings.automation_integration {
        return;
    }
    let changes_color = message.contains_key("color") || message.contains_key("color_temp");
    if !changes_color || message.contains_key("brightness") {
        return;
    }
    let was_on = prior_state
        .get("state")
        .and_then(Value::as_str)
        .is_some_and(|state| state.eq_ignore_ascii_case("on"));
    if was_on {
        message.shift_remove("state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topic::Action;
    use serde_json::json;

    fn descriptor(attribute: Option<&str>) -> CommandDescriptor {
        CommandDescriptor {
            entity_id: "lamp1".into(),
            endpoint_name: None,
            action: Action::Set,
            attribute: attribute.map(Into::into),
        }
    }

    fn decode_str(descriptor: &CommandDescriptor, payload: &str) -> Result<StateMap, BridgeError> {
        decode(descriptor, "base/lamp1/set", &Bytes::from(payload.to_string()))
    }

    #[test]
    fn test_structured_object() {
        let map = decode_str(&descriptor(None), r#"{"state":"ON","brightness":200}"#).unwrap();
        assert_eq!(map["state"], json!("ON"));
        assert_eq!(map["brightness"], json!(200));
    }

    #[test]
    fn test_bare_state_word_any_case() {
        for payload in ["ON", "off", "Toggle", "OPEN", "close", "STOP", "lock", "UnLoCk"] {
            let map = decode_str(&descriptor(None), payload).unwrap();
            assert_eq!(map["state"], json!(payload), "payload {payload}");
        }
    }

    #[test]
    fn test_quoted_state_word() {
        let map = decode_str(&descriptor(None), r#""ON""#).unwrap();
        assert_eq!(map["state"], json!("ON"));
    }

    #[test]
    fn test_unparseable_payload_is_invalid() {
        let result = decode_str(&descriptor(None), "not json and not a state word");
        assert!(matches!(result, Err(BridgeError::InvalidPayload { .. })));
    }

    #[test]
    fn test_non_object_json_is_invalid() {
        assert!(decode_str(&descriptor(None), "42").is_err());
        assert!(decode_str(&descriptor(None), "true").is_err());
    }

    #[test]
    fn test_attribute_topic_takes_structured_value() {
        let map = decode_str(&descriptor(Some("brightness")), "128").unwrap();
        assert_eq!(map["brightness"], json!(128));
    }

    #[test]
    fn test_attribute_topic_falls_back_to_raw_string() {
        let map = decode_str(&descriptor(Some("effect")), "blink fast").unwrap();
        assert_eq!(map["effect"], json!("blink fast"));
    }

    fn state_map(value: serde_json::Value) -> StateMap {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_redundant_state_dropped_for_color_only_change() {
        let settings = Settings {
            automation_integration: true,
            ..Default::default()
        };
        let mut message = state_map(json!({"state": "ON", "color_temp": 350}));
        let prior = state_map(json!({"state": "ON"}));

        drop_redundant_state(&mut message, &prior, &settings);
        assert!(!message.contains_key("state"));
        assert!(message.contains_key("color_temp"));
    }

    #[test]
    fn test_state_kept_when_brightness_also_set() {
        let settings = Settings {
            automation_integration: true,
            ..Default::default()
        };
        let mut message = state_map(json!({"state": "ON", "color": {"x": 0.3}, "brightness": 80}));
        let prior = state_map(json!({"state": "ON"}));

        drop_redundant_state(&mut message, &prior, &settings);
        assert!(message.contains_key("state"));
    }

    #[test]
    fn test_state_kept_when_entity_was_off() {
        let settings = Settings {
            automation_integration: true,
            ..Default::default()
        };
        let mut message = state_map(json!({"state": "ON", "color_temp": 350}));
        let prior = state_map(json!({"state": "OFF"}));

        drop_redundant_state(&mut message, &prior, &settings);
        assert!(message.contains_key("state"));
    }

    #[test]
    fn test_adjustment_requires_integration_mode() {
        let settings = Settings::default();
        let mut message = state_map(json!({"state": "ON", "color_temp": 350}));
        let prior = state_map(json!({"state": "ON"}));

        drop_redundant_state(&mut message, &prior, &settings);
        assert!(message.contains_key("state"));
    }
}
