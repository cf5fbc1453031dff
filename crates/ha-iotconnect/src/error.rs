//! Transport and protocol errors

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the IoTConnect transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Not connected to IoTConnect")]
    NotConnected,

    #[error("Unable to connect to IoTConnect: {0}")]
    Connect(String),

    #[error("No IoTConnect broker host configured")]
    MissingHost,

    #[error("Message of {size} bytes exceeds the {max} byte packet limit")]
    PacketTooLarge { size: usize, max: usize },

    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("Failed to encode message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid device config {path}: {reason}")]
    DeviceConfig { path: PathBuf, reason: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A cloud-to-device message that could not be turned into a command
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed cloud-to-device message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Command message carries no command line")]
    EmptyCommand,
}
