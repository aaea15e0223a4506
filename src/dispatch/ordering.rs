//! Attribute ordering for interdependent device writes
//!
//! Some firmwares reject color or temperature writes while powered off, and
//! power and color cannot always go out in one operation. The decoded map is
//! therefore split into two ranks: the power cluster (`state`, `brightness`,
//! `brightness_percent`) and everything else. Turning on puts the power
//! cluster first so later writes hit a powered device; turning off inverts
//! the ranks so the remaining writes land before power drops.

use crate::entity::StateMap;
use serde_json::Value;

const POWER_CLUSTER: [&str; 3] = ["state", "brightness", "brightness_percent"];

/// Reorder decoded attributes into dispatch order. Stable within each rank.
pub fn order_attributes(message: &StateMap) -> Vec<(String, Value)> {
    let sorter: i8 = match message.get("state").and_then(Value::as_str) {
        Some(state) if state.eq_ignore_ascii_case("off") => 1,
        _ => -1,
    };

    let mut entries: Vec<(String, Value)> = message
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    entries.sort_by_key(|(key, _)| {
        if POWER_CLUSTER.contains(&key.as_str()) {
            sorter
        } else {
            -sorter
        }
    });
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(value: serde_json::Value) -> StateMap {
        value.as_object().unwrap().clone()
    }

    fn keys(entries: &[(String, Value)]) -> Vec<&str> {
        entries.iter().map(|(key, _)| key.as_str()).collect()
    }

    #[test]
    fn test_turning_on_powers_before_color() {
        let ordered = order_attributes(&message(json!({
            "color_temp": 350,
            "state": "ON",
            "brightness": 128,
        })));
        assert_eq!(keys(&ordered), ["state", "brightness", "color_temp"]);
    }

    #[test]
    fn test_turning_off_powers_last() {
        let ordered = order_attributes(&message(json!({
            "state": "OFF",
            "color_temp": 350,
            "transition": 2,
        })));
        assert_eq!(keys(&ordered), ["color_temp", "transition", "state"]);
    }

    #[test]
    fn test_off_comparison_is_case_insensitive() {
        let ordered = order_attributes(&message(json!({
            "state": "Off",
            "color_temp": 350,
        })));
        assert_eq!(keys(&ordered), ["color_temp", "state"]);
    }

    #[test]
    fn test_missing_state_behaves_like_on() {
        let ordered = order_attributes(&message(json!({
            "color": {"x": 0.3, "y": 0.4},
            "brightness": 10,
        })));
        assert_eq!(keys(&ordered), ["brightness", "color"]);
    }

    #[test]
    fn test_stable_within_equal_rank() {
        let ordered = order_attributes(&message(json!({
            "color_temp": 350,
            "transition": 2,
            "effect": "blink",
            "state": "ON",
        })));
        // Non-power keys keep their decoded relative order.
        assert_eq!(keys(&ordered), ["state", "color_temp", "transition", "effect"]);
    }

    #[test]
    fn test_non_string_state_behaves_like_on() {
        let ordered = order_attributes(&message(json!({
            "state": 1,
            "color_temp": 350,
        })));
        assert_eq!(keys(&ordered), ["state", "color_temp"]);
    }
}
