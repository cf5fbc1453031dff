//! Entity ID type representing a domain.object_id pair

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::Domain;

/// Error type for invalid entity IDs
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntityIdError {
    #[error("Invalid entity_id (expected domain.object_id)")]
    MissingSeparator,
}

/// Represents a Home Assistant entity ID (e.g., "light.kitchen_lights")
///
/// Remote commands carry free-form identifiers, so parsing is deliberately
/// lenient: surrounding whitespace is trimmed and the only requirement is a
/// `.` separator. The domain is everything before the first `.`, the
/// object_id everything after it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    domain: String,
    object_id: String,
}

impl EntityId {
    /// Create a new EntityId from domain and object_id parts
    pub fn new(domain: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            object_id: object_id.into(),
        }
    }

    /// Get the domain part of the entity ID
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Get the object_id part of the entity ID
    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// Classify the domain for dispatch
    pub fn kind(&self) -> Domain {
        Domain::from(self.domain.as_str())
    }
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (domain, object_id) = s
            .trim()
            .split_once('.')
            .ok_or(EntityIdError::MissingSeparator)?;
        Ok(Self::new(domain, object_id))
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> String {
        id.to_string()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.object_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entity_id() {
        let id: EntityId = "switch.bar_lamp".parse().unwrap();
        assert_eq!(id.domain(), "switch");
        assert_eq!(id.object_id(), "bar_lamp");
        assert_eq!(id.kind(), Domain::Switch);
        assert_eq!(id.to_string(), "switch.bar_lamp");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let id: EntityId = "  light.kitchen_lights \n".parse().unwrap();
        assert_eq!(id.to_string(), "light.kitchen_lights");
        assert_eq!(id.kind(), Domain::Light);
    }

    #[test]
    fn test_missing_separator() {
        assert_eq!(
            "bad_id".parse::<EntityId>().unwrap_err(),
            EntityIdError::MissingSeparator
        );
        assert_eq!(
            "".parse::<EntityId>().unwrap_err(),
            EntityIdError::MissingSeparator
        );
    }

    #[test]
    fn test_split_on_first_separator() {
        let id: EntityId = "sensor.outdoor.temp".parse().unwrap();
        assert_eq!(id.domain(), "sensor");
        assert_eq!(id.object_id(), "outdoor.temp");
        assert_eq!(id.kind(), Domain::Other("sensor".to_string()));
    }

    #[test]
    fn test_only_separator_required() {
        for (raw, domain, object_id) in [(".", "", ""), (".x", "", "x"), ("switch.", "switch", "")] {
            let id: EntityId = raw.parse().unwrap();
            assert_eq!(id.domain(), domain);
            assert_eq!(id.object_id(), object_id);
        }
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            EntityIdError::MissingSeparator.to_string(),
            "Invalid entity_id (expected domain.object_id)"
        );
    }

    #[test]
    fn test_serde_roundtrip() {
        let id = EntityId::new("switch", "bar_lamp");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"switch.bar_lamp\"");

        let parsed: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
        assert!(serde_json::from_str::<EntityId>("\"no_separator\"").is_err());
    }
}
