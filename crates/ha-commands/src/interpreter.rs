//! Command validation and decoding

use ha_core::{coerce_on_off, scalar_to_string, Domain, EntityId, EntityIdError};
use serde_json::Value;
use thiserror::Error;

use crate::request::CommandRequest;

/// Why a command was rejected before dispatch
///
/// The `Display` text is sent back to the platform as the acknowledgment
/// message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandRejected {
    #[error("Not implemented")]
    UnknownCommand(String),

    #[error("Expected: entity_id, state[, brightness]")]
    MissingArguments { given: usize },

    #[error(transparent)]
    InvalidEntityId(#[from] EntityIdError),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// An interpreted command: drive one entity on or off
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub entity_id: EntityId,
    pub domain: Domain,
    pub turn_on: bool,
    /// Requested brightness as given; clamped at dispatch
    pub brightness: Option<i64>,
}

impl Action {
    /// "on" or "off"
    pub fn state_label(&self) -> &'static str {
        if self.turn_on {
            "on"
        } else {
            "off"
        }
    }
}

/// Validate and decode a command request.
///
/// Arguments are `entity_id, state[, brightness]`. A brightness that is not an
/// integer is dropped rather than failing the command.
pub fn interpret(request: &CommandRequest) -> Result<Action, CommandRejected> {
    if !request.is_known() {
        return Err(CommandRejected::UnknownCommand(request.name.clone()));
    }

    let [entity_arg, state_arg, rest @ ..] = request.args.as_slice() else {
        return Err(CommandRejected::MissingArguments {
            given: request.args.len(),
        });
    };

    let entity_id: EntityId = scalar_to_string(entity_arg).parse()?;

    let turn_on = coerce_on_off(state_arg)
        .ok_or_else(|| CommandRejected::InvalidState(scalar_to_string(state_arg)))?;

    let brightness = rest.first().and_then(parse_brightness);

    Ok(Action {
        domain: entity_id.kind(),
        entity_id,
        turn_on,
        brightness,
    })
}

/// Integer conversion with the leniency of a plain `int()`: trimmed decimal
/// strings, truncated floats and booleans are accepted.
fn parse_brightness(value: &Value) -> Option<i64> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|_| i64::MAX))
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            }),
        Value::String(s) => s.trim().parse().ok(),
        Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::AckHandle;
    use serde_json::json;

    fn request(name: &str, args: Vec<Value>) -> CommandRequest {
        CommandRequest::new(name, args, Some(AckHandle::new("ack-1")))
    }

    #[test]
    fn test_switch_on() {
        let action = interpret(&request("set-ha-light", vec![json!("switch.bar_lamp"), json!("on")]))
            .unwrap();

        assert_eq!(action.entity_id.to_string(), "switch.bar_lamp");
        assert_eq!(action.entity_id.object_id(), "bar_lamp");
        assert_eq!(action.domain, Domain::Switch);
        assert!(action.turn_on);
        assert_eq!(action.brightness, None);
    }

    #[test]
    fn test_light_on_with_brightness() {
        let action = interpret(&request(
            "set-ha-light",
            vec![json!("light.kitchen_lights"), json!("on"), json!("128")],
        ))
        .unwrap();

        assert_eq!(action.domain, Domain::Light);
        assert_eq!(action.entity_id.object_id(), "kitchen_lights");
        assert!(action.turn_on);
        assert_eq!(action.brightness, Some(128));
    }

    #[test]
    fn test_entity_alias_and_off() {
        let action = interpret(&request(
            "set-ha-entity",
            vec![json!(" switch.bar_lamp "), json!(0)],
        ))
        .unwrap();

        assert_eq!(action.entity_id.to_string(), "switch.bar_lamp");
        assert!(!action.turn_on);
        assert_eq!(action.state_label(), "off");
    }

    #[test]
    fn test_unknown_command() {
        let err = interpret(&request("foo", vec![])).unwrap_err();
        assert_eq!(err, CommandRejected::UnknownCommand("foo".to_string()));
        assert_eq!(err.to_string(), "Not implemented");
    }

    #[test]
    fn test_missing_arguments() {
        let err = interpret(&request("set-ha-entity", vec![json!("switch.bar_lamp")])).unwrap_err();
        assert_eq!(err, CommandRejected::MissingArguments { given: 1 });
        assert_eq!(err.to_string(), "Expected: entity_id, state[, brightness]");

        let err = interpret(&request("set-ha-light", vec![])).unwrap_err();
        assert_eq!(err, CommandRejected::MissingArguments { given: 0 });
    }

    #[test]
    fn test_invalid_entity_id() {
        let err = interpret(&request("set-ha-entity", vec![json!("bad_id"), json!("on")])).unwrap_err();
        assert!(matches!(err, CommandRejected::InvalidEntityId(_)));
        assert!(err.to_string().starts_with("Invalid entity_id"));
    }

    #[test]
    fn test_entity_checked_before_state() {
        let err = interpret(&request("set-ha-light", vec![json!("bad_id"), json!("maybe")])).unwrap_err();
        assert!(matches!(err, CommandRejected::InvalidEntityId(_)));
    }

    #[test]
    fn test_invalid_state() {
        let err = interpret(&request(
            "set-ha-light",
            vec![json!("switch.bar_lamp"), json!("maybe")],
        ))
        .unwrap_err();
        assert_eq!(err.to_string(), "Invalid state: maybe");

        let err = interpret(&request("set-ha-light", vec![json!("switch.bar_lamp"), json!(2)]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid state: 2");
    }

    #[test]
    fn test_malformed_brightness_is_dropped() {
        for brightness in [json!("bright"), json!("12.5"), json!(null), json!([1]), json!("")] {
            let action = interpret(&request(
                "set-ha-light",
                vec![json!("light.kitchen_lights"), json!("on"), brightness],
            ))
            .unwrap();
            assert_eq!(action.brightness, None);
        }
    }

    #[test]
    fn test_brightness_forms() {
        assert_eq!(parse_brightness(&json!(" 64 ")), Some(64));
        assert_eq!(parse_brightness(&json!("+7")), Some(7));
        assert_eq!(parse_brightness(&json!(-5)), Some(-5));
        assert_eq!(parse_brightness(&json!(99.9)), Some(99));
        assert_eq!(parse_brightness(&json!(true)), Some(1));
        assert_eq!(parse_brightness(&json!(u64::MAX)), Some(i64::MAX));
    }

    #[test]
    fn test_extra_arguments_ignored() {
        let action = interpret(&request(
            "set-ha-light",
            vec![json!("light.kitchen_lights"), json!("off"), json!("10"), json!("extra")],
        ))
        .unwrap();
        assert_eq!(action.brightness, Some(10));
    }

    #[test]
    fn test_interpretation_is_repeatable() {
        let req = request(
            "set-ha-light",
            vec![json!("light.kitchen_lights"), json!("on"), json!("128")],
        );
        assert_eq!(interpret(&req), interpret(&req));
    }
}
