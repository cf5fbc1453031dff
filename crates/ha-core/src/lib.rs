//! Core types for the Home Assistant IoTConnect bridge
//!
//! This crate provides the types shared by the telemetry and command paths:
//! EntityId, Domain, ServiceCall, and the on/off coercion rule used both when
//! deriving per-entity telemetry keys and when interpreting remote commands.

mod coerce;
mod domains;
mod entity_id;
mod service_call;

pub use coerce::{coerce_on_off, FALSY_STRINGS, TRUTHY_STRINGS};
pub use domains::{Domain, SERVICE_TURN_OFF, SERVICE_TURN_ON};
pub use entity_id::{EntityId, EntityIdError};
pub use service_call::ServiceCall;

/// Render an untyped scalar the way it is shown to users in log lines and
/// acknowledgment messages: strings verbatim, everything else as JSON text.
pub fn scalar_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
