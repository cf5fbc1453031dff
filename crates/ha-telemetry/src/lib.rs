//! Telemetry translation for the Home Assistant IoTConnect bridge
//!
//! Turns a `(topic, payload)` pair from the local MQTT bus into the record
//! sent upstream:
//!
//! 1. [`normalize_payload`] parses the payload into fields, falling back to
//!    `{"value": <raw>}` when it is not JSON.
//! 2. [`TelemetryRecord::assemble`] prefixes the transport metadata
//!    (`ha_topic`, `payload_raw`) and merges the fields.
//! 3. [`EntityRegistry::apply`] adds a dedicated `0`/`1` key for registered
//!    entities such as `bar_lamp`.
//!
//! Each record is built from scratch per message; nothing is carried over
//! between messages.

mod normalizer;
mod record;
mod registry;

pub use normalizer::{decode_payload, normalize_payload, parse_payload, Fields, ParseFallback};
pub use record::{TelemetryRecord, HA_TOPIC, PAYLOAD_RAW, SOURCE, VALUE};
pub use registry::{EntityRegistry, KeyDerivation};
