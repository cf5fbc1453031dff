//! IoTConnect 2.1 message formats
//!
//! - Telemetry: `{"d":[{"d": <record>}]}`
//! - Cloud-to-device command: `{"v":"2.1","ct":0,"cmd":"<name> <args...>","ack":"<id>"}`
//! - Acknowledgment: `{"d":{"ack":"<id>","type":0,"st":<status>,"msg":"<message>"}}`

use ha_commands::{AckHandle, CommandRequest, Verdict};
use ha_telemetry::TelemetryRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// `ct` of a device command
pub const MESSAGE_TYPE_COMMAND: i64 = 0;

/// Acknowledgment status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    Failed,
    SuccessWithAck,
}

impl AckStatus {
    pub fn code(self) -> u8 {
        match self {
            AckStatus::Failed => 4,
            AckStatus::SuccessWithAck => 7,
        }
    }
}

impl From<&Verdict> for AckStatus {
    fn from(verdict: &Verdict) -> Self {
        if verdict.is_success() {
            AckStatus::SuccessWithAck
        } else {
            AckStatus::Failed
        }
    }
}

#[derive(Serialize)]
struct TelemetryEnvelope<'a> {
    d: [TelemetryEntry<'a>; 1],
}

#[derive(Serialize)]
struct TelemetryEntry<'a> {
    d: &'a TelemetryRecord,
}

/// Encode a record for the report topic
pub fn encode_telemetry(record: &TelemetryRecord) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&TelemetryEnvelope {
        d: [TelemetryEntry { d: record }],
    })
}

#[derive(Serialize)]
struct AckEnvelope<'a> {
    d: AckBody<'a>,
}

#[derive(Serialize)]
struct AckBody<'a> {
    ack: &'a str,
    #[serde(rename = "type")]
    kind: u8,
    st: u8,
    msg: &'a str,
}

/// Encode an acknowledgment for the ack topic
pub fn encode_ack(handle: &AckHandle, verdict: &Verdict) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&AckEnvelope {
        d: AckBody {
            ack: handle.as_str(),
            kind: MESSAGE_TYPE_COMMAND as u8,
            st: AckStatus::from(verdict).code(),
            msg: verdict.message(),
        },
    })
}

#[derive(Debug, Deserialize)]
struct C2dMessage {
    #[serde(default)]
    ct: Option<i64>,
    #[serde(default)]
    cmd: Option<String>,
    #[serde(default)]
    ack: Option<String>,
}

/// Decode a cloud-to-device message
///
/// Returns `Ok(None)` for messages that are not device commands. A blank
/// command line with an ack id decodes to a request with an empty name.
pub fn decode_command(payload: &[u8]) -> Result<Option<CommandRequest>, ProtocolError> {
    let message: C2dMessage = serde_json::from_slice(payload)?;

    if message.ct.unwrap_or(MESSAGE_TYPE_COMMAND) != MESSAGE_TYPE_COMMAND {
        return Ok(None);
    }

    let ack = message
        .ack
        .filter(|id| !id.is_empty())
        .map(AckHandle::new);

    let line = message.cmd.unwrap_or_default();
    let mut tokens = line.split_whitespace();
    // a blank command line is still answered when the sender awaits an ack
    let name = match (tokens.next(), &ack) {
        (Some(name), _) => name,
        (None, Some(_)) => "",
        (None, None) => return Err(ProtocolError::EmptyCommand),
    };
    let args = tokens.map(|t| Value::String(t.to_string())).collect();

    Ok(Some(CommandRequest::new(name, args, ack)))
}
