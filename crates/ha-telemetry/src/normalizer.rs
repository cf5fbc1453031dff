//! Payload normalization

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use crate::record::VALUE;

/// Ordered field mapping extracted from a payload
pub type Fields = IndexMap<String, Value>;

/// A payload that could not be parsed as JSON
///
/// Carries the fields to use instead (`{"value": <raw string>}`), so the
/// caller can recover without losing the message.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("payload is not JSON ({reason}), sending it as a raw value")]
pub struct ParseFallback {
    fields: Fields,
    reason: String,
}

impl ParseFallback {
    fn new(raw: &str, reason: impl Into<String>) -> Self {
        Self {
            fields: wrap_value(Value::String(raw.to_string())),
            reason: reason.into(),
        }
    }

    /// Why parsing failed
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// The fallback fields, `{"value": <raw string>}`
    pub fn into_fields(self) -> Fields {
        self.fields
    }
}

fn wrap_value(value: Value) -> Fields {
    let mut fields = Fields::new();
    fields.insert(VALUE.to_string(), value);
    fields
}

/// Parse a raw payload into fields.
///
/// JSON objects are returned field for field in their original order. Any
/// other JSON value (number, bool, string, null, array) is wrapped as
/// `{"value": <parsed>}`. Non-JSON input yields a [`ParseFallback`].
pub fn parse_payload(raw: &str) -> Result<Fields, ParseFallback> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
        Ok(other) => Ok(wrap_value(other)),
        Err(e) => Err(ParseFallback::new(raw, e.to_string())),
    }
}

/// Parse a raw payload into fields, never failing.
///
/// Same as [`parse_payload`] but resolves the fallback to
/// `{"value": <raw string>}` so telemetry is always sent.
pub fn normalize_payload(raw: &str) -> Fields {
    parse_payload(raw).unwrap_or_else(|fallback| {
        tracing::debug!(reason = %fallback.reason(), "Payload is not JSON, using raw value");
        fallback.into_fields()
    })
}

/// Decode payload bytes as UTF-8, dropping invalid sequences.
pub fn decode_payload(bytes: &[u8]) -> String {
    let mut decoded = String::with_capacity(bytes.len());
    let mut rest = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                decoded.push_str(valid);
                return decoded;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                // valid_up_to guarantees this prefix is UTF-8
                decoded.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match e.error_len() {
                    Some(len) => rest = &after[len..],
                    None => return decoded,
                }
            }
        }
    }
}
