//! Static entity registry and per-entity key derivation

use std::collections::HashMap;

use ha_core::coerce_on_off;
use serde_json::Value;

use crate::record::{TelemetryRecord, SOURCE, VALUE};

/// Outcome of [`EntityRegistry::apply`] for one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyDerivation {
    /// Neither `source` nor the topic is registered; record left as is
    Unresolved,
    /// The registered key was set to `0` or `1`
    Set { key: String, value: u8 },
    /// The entity is registered but its value is not an on/off form
    Uncoercible { key: String },
}

/// Maps controller entity IDs and bus topics to dedicated telemetry keys
///
/// Read-only after construction. A registered key is only ever driven to
/// `0` or `1`, or left absent.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    /// `switch.bar_lamp` -> `bar_lamp`
    entities: HashMap<String, String>,
    /// `ha/lights/bar_lamp` -> `bar_lamp`
    topics: HashMap<String, String>,
}

impl EntityRegistry {
    /// Create a registry from entity and topic mappings
    pub fn new<E, T, K1, V1, K2, V2>(entities: E, topics: T) -> Self
    where
        E: IntoIterator<Item = (K1, V1)>,
        T: IntoIterator<Item = (K2, V2)>,
        K1: Into<String>,
        V1: Into<String>,
        K2: Into<String>,
        V2: Into<String>,
    {
        Self {
            entities: entities
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            topics: topics
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Key registered for an entity ID
    pub fn key_for_entity(&self, entity_id: &str) -> Option<&str> {
        self.entities.get(entity_id).map(String::as_str)
    }

    /// Key registered for a bus topic
    pub fn key_for_topic(&self, topic: &str) -> Option<&str> {
        self.topics.get(topic).map(String::as_str)
    }

    /// Number of registered entities and topics
    pub fn len(&self) -> usize {
        self.entities.len() + self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.topics.is_empty()
    }

    /// Resolve the registered key for a record
    ///
    /// A string `source` field is checked first; the origin topic is only
    /// consulted when the source is missing or unregistered.
    pub fn resolve(&self, record: &TelemetryRecord) -> Option<&str> {
        record
            .get_str(SOURCE)
            .and_then(|source| self.key_for_entity(source))
            .or_else(|| record.topic().and_then(|topic| self.key_for_topic(topic)))
    }

    /// Add the per-entity `0`/`1` key to a record when its entity is registered
    pub fn apply(&self, record: &mut TelemetryRecord) -> KeyDerivation {
        let Some(key) = self.resolve(record).map(str::to_string) else {
            return KeyDerivation::Unresolved;
        };

        let value = record.get(VALUE).cloned().unwrap_or(Value::Null);
        let derived = match coerce_on_off(&value) {
            Some(on) => Some(u8::from(on)),
            // numeric 0/1 the on/off rule did not accept
            None => value.as_f64().and_then(|v| {
                if v == 0.0 {
                    Some(0)
                } else if v == 1.0 {
                    Some(1)
                } else {
                    None
                }
            }),
        };

        match derived {
            Some(bit) => {
                record.insert(key.clone(), Value::from(bit));
                KeyDerivation::Set { key, value: bit }
            }
            None => KeyDerivation::Uncoercible { key },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> EntityRegistry {
        EntityRegistry::new(
            [
                ("switch.bar_lamp", "bar_lamp"),
                ("light.kitchen_lights", "kitchen_lights"),
            ],
            [
                ("ha/lights/bar_lamp", "bar_lamp"),
                ("ha/lights/kitchen_lights", "kitchen_lights"),
            ],
        )
    }

    fn record(topic: &str, fields: serde_json::Value) -> TelemetryRecord {
        let mut record = TelemetryRecord::new(topic, &fields.to_string());
        if let serde_json::Value::Object(map) = fields {
            for (k, v) in map {
                record.insert(k, v);
            }
        }
        record
    }

    #[test]
    fn test_source_on_sets_key() {
        let mut rec = record(
            "ha/metrics/anything",
            json!({"source": "switch.bar_lamp", "value": "on"}),
        );
        let outcome = registry().apply(&mut rec);

        assert_eq!(
            outcome,
            KeyDerivation::Set {
                key: "bar_lamp".to_string(),
                value: 1
            }
        );
        assert_eq!(rec.get("bar_lamp"), Some(&json!(1)));
    }

    #[test]
    fn test_topic_fallback() {
        let mut rec = record("ha/lights/kitchen_lights", json!({"value": false}));
        registry().apply(&mut rec);

        assert_eq!(rec.get("kitchen_lights"), Some(&json!(0)));
    }

    #[test]
    fn test_source_wins_over_topic() {
        let mut rec = record(
            "ha/lights/kitchen_lights",
            json!({"source": "switch.bar_lamp", "value": 1}),
        );
        registry().apply(&mut rec);

        assert_eq!(rec.get("bar_lamp"), Some(&json!(1)));
        assert!(!rec.contains_key("kitchen_lights"));
    }

    #[test]
    fn test_unregistered_source_falls_back_to_topic() {
        let mut rec = record(
            "ha/lights/bar_lamp",
            json!({"source": "switch.unknown", "value": "off"}),
        );
        registry().apply(&mut rec);

        assert_eq!(rec.get("bar_lamp"), Some(&json!(0)));
    }

    #[test]
    fn test_non_string_source_is_ignored() {
        let mut rec = record("ha/metrics/x", json!({"source": 7, "value": "on"}));
        let before = rec.clone();

        assert_eq!(registry().apply(&mut rec), KeyDerivation::Unresolved);
        assert_eq!(rec, before);
    }

    #[test]
    fn test_unregistered_leaves_record_unchanged() {
        let mut rec = record(
            "ha/metrics/power",
            json!({"source": "sensor.power", "value": 1}),
        );
        let before = rec.clone();

        assert_eq!(registry().apply(&mut rec), KeyDerivation::Unresolved);
        assert_eq!(rec, before);
    }

    #[test]
    fn test_uncoercible_value_adds_no_key() {
        for value in [json!("dim"), json!(null), json!(0.5), json!(42)] {
            let mut rec = record(
                "ha/lights/bar_lamp",
                json!({"source": "switch.bar_lamp", "value": value}),
            );
            let before = rec.clone();

            assert_eq!(
                registry().apply(&mut rec),
                KeyDerivation::Uncoercible {
                    key: "bar_lamp".to_string()
                }
            );
            assert_eq!(rec, before);
        }
    }

    #[test]
    fn test_missing_value_adds_no_key() {
        let mut rec = record("ha/lights/bar_lamp", json!({"source": "switch.bar_lamp"}));

        assert!(matches!(
            registry().apply(&mut rec),
            KeyDerivation::Uncoercible { .. }
        ));
        assert!(!rec.contains_key("bar_lamp"));
    }

    #[test]
    fn test_numeric_float_forms() {
        let mut rec = record("ha/lights/bar_lamp", json!({"value": 1.0}));
        registry().apply(&mut rec);
        assert_eq!(rec.get("bar_lamp"), Some(&json!(1)));
    }

    #[test]
    fn test_lookups() {
        let reg = registry();
        assert_eq!(reg.key_for_entity("switch.bar_lamp"), Some("bar_lamp"));
        assert_eq!(reg.key_for_topic("ha/lights/kitchen_lights"), Some("kitchen_lights"));
        assert_eq!(reg.key_for_entity("ha/lights/bar_lamp"), None);
        assert_eq!(reg.len(), 4);
        assert!(EntityRegistry::default().is_empty());
    }
}
