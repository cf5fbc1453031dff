//! Telemetry record assembly

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::normalizer::{normalize_payload, Fields};
use crate::registry::{EntityRegistry, KeyDerivation};

/// Key holding the MQTT topic the message arrived on
pub const HA_TOPIC: &str = "ha_topic";

/// Key holding the payload exactly as received (after UTF-8 decoding)
pub const PAYLOAD_RAW: &str = "payload_raw";

/// Key naming the entity that produced the message
pub const SOURCE: &str = "source";

/// Key holding the reported value
pub const VALUE: &str = "value";

/// A telemetry record as handed to the outbound transport
///
/// An insertion-ordered mapping that always starts with `ha_topic` and
/// `payload_raw`, followed by the normalized payload fields and at most one
/// derived per-entity key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TelemetryRecord(IndexMap<String, Value>);

impl TelemetryRecord {
    /// Start a record with the transport metadata only
    pub fn new(topic: &str, payload_raw: &str) -> Self {
        let mut fields = IndexMap::new();
        fields.insert(HA_TOPIC.to_string(), Value::String(topic.to_string()));
        fields.insert(PAYLOAD_RAW.to_string(), Value::String(payload_raw.to_string()));
        Self(fields)
    }

    /// Build the full record for one bus message
    ///
    /// Payload fields named `ha_topic` or `payload_raw` are dropped so the
    /// metadata always describes the message that was actually received.
    pub fn assemble(topic: &str, payload_raw: &str, registry: &EntityRegistry) -> Self {
        let mut record = Self::new(topic, payload_raw);
        record.merge(normalize_payload(payload_raw));

        match registry.apply(&mut record) {
            KeyDerivation::Set { key, value } => {
                debug!(topic = %topic, key = %key, value, "Added per-entity key");
            }
            KeyDerivation::Uncoercible { key } => {
                debug!(topic = %topic, key = %key, "Registered entity value is not on/off");
            }
            KeyDerivation::Unresolved => {}
        }

        record
    }

    fn merge(&mut self, fields: Fields) {
        for (key, value) in fields {
            if key == HA_TOPIC || key == PAYLOAD_RAW {
                debug!(key = %key, "Ignoring payload field that shadows record metadata");
                continue;
            }
            self.0.insert(key, value);
        }
    }

    /// The topic the message arrived on
    pub fn topic(&self) -> Option<&str> {
        self.get_str(HA_TOPIC)
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get a field value if it is a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Check whether a field is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub(crate) fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Field names in record order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

}
