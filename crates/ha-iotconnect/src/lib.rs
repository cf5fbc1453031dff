//! IoTConnect device transport
//!
//! Connects the bridge to the Avnet IoTConnect platform as a device:
//!
//! - [`DeviceConfig`] - device identity from `iotcDeviceConfig.json`
//! - [`protocol`] - telemetry, command and acknowledgment wire formats
//! - [`CloudTransport`] - the outbound operations the bridge relies on
//! - [`IotcClient`] - the MQTT/TLS implementation over rumqttc

mod client;
mod device_config;
mod error;
pub mod protocol;

pub use client::{CloudTransport, IotcClient, IotcOptions};
pub use device_config::{DeviceConfig, DeviceTopics, TopicOverrides};
pub use error::{ProtocolError, TransportError};
pub use protocol::AckStatus;
