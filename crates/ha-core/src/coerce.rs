//! On/off coercion shared by telemetry key derivation and command parsing

use serde_json::Value;

/// String forms accepted as "on" (compared after trimming and lowercasing)
pub const TRUTHY_STRINGS: &[&str] = &["on", "true", "1", "yes"];

/// String forms accepted as "off" (compared after trimming and lowercasing)
pub const FALSY_STRINGS: &[&str] = &["off", "false", "0", "no"];

/// Convert common on/off representations into a bool.
///
/// Booleans map to themselves, numbers equal to `1`/`0` map to true/false and
/// strings are matched case-insensitively against [`TRUTHY_STRINGS`] and
/// [`FALSY_STRINGS`]. Anything else (null, arrays, objects, other numbers,
/// unrecognised strings) yields `None`.
pub fn coerce_on_off(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(v) if v == 1.0 => Some(true),
            Some(v) if v == 0.0 => Some(false),
            _ => None,
        },
        Value::String(s) => {
            let normalized = s.trim().to_lowercase();
            if TRUTHY_STRINGS.contains(&normalized.as_str()) {
                Some(true)
            } else if FALSY_STRINGS.contains(&normalized.as_str()) {
                Some(false)
            } else {
                None
            }
        }
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
