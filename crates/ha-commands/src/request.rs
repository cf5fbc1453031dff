//! Inbound command requests

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Command name accepted for setting a light or switch
pub const COMMAND_SET_HA_LIGHT: &str = "set-ha-light";

/// Alias of [`COMMAND_SET_HA_LIGHT`]
pub const COMMAND_SET_HA_ENTITY: &str = "set-ha-entity";

/// Correlation handle for acknowledging a command
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AckHandle(String);

impl AckHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AckHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A command as delivered by the remote platform
///
/// Built once per received command and consumed by one interpretation. When
/// `ack` is `None` the platform expects no acknowledgment.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    /// Command name (e.g., "set-ha-light")
    pub name: String,
    /// Positional arguments, untyped
    pub args: Vec<Value>,
    /// Handle to acknowledge with, if the platform asked for one
    pub ack: Option<AckHandle>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>, args: Vec<Value>, ack: Option<AckHandle>) -> Self {
        Self {
            name: name.into(),
            args,
            ack,
        }
    }

    /// Whether the command name is one of the accepted aliases
    pub fn is_known(&self) -> bool {
        self.name == COMMAND_SET_HA_LIGHT || self.name == COMMAND_SET_HA_ENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_aliases() {
        assert!(CommandRequest::new("set-ha-light", vec![], None).is_known());
        assert!(CommandRequest::new("set-ha-entity", vec![], None).is_known());
        assert!(!CommandRequest::new("set-ha-lights", vec![], None).is_known());
        assert!(!CommandRequest::new("SET-HA-LIGHT", vec![], None).is_known());
    }

    #[test]
    fn test_ack_handle_serializes_as_string() {
        let handle = AckHandle::new("a1b2");
        assert_eq!(serde_json::to_value(&handle).unwrap(), json!("a1b2"));
        assert_eq!(handle.to_string(), "a1b2");
    }
}
