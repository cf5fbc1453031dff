//! IoTConnect device identity (`iotcDeviceConfig.json`)

use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::TransportError;

/// Device configuration as downloaded from the IoTConnect portal
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceConfig {
    /// Device unique ID
    pub uid: String,
    /// Company ID
    pub cpid: String,
    /// Environment name
    pub env: String,
    /// Cloud platform, "aws" or "az"
    #[serde(default = "default_platform")]
    pub pf: String,
    /// Protocol version
    #[serde(default = "default_version")]
    pub ver: String,
    /// MQTT broker host
    #[serde(default)]
    pub host: Option<String>,
    /// Per-topic overrides of the derived topics
    #[serde(default)]
    pub topics: TopicOverrides,
}

fn default_platform() -> String {
    "aws".to_string()
}

fn default_version() -> String {
    "2.1".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TopicOverrides {
    pub report: Option<String>,
    pub ack: Option<String>,
    pub command: Option<String>,
}

/// The three topics a device uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTopics {
    /// Device-to-cloud telemetry
    pub report: String,
    /// Command acknowledgments
    pub ack: String,
    /// Cloud-to-device commands
    pub command: String,
}

impl DeviceConfig {
    /// Load and validate a device config file
    pub fn load(path: &Path) -> Result<Self, TransportError> {
        let content = fs::read_to_string(path).map_err(|e| TransportError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = Self::from_json(&content).map_err(|reason| TransportError::DeviceConfig {
            path: path.to_path_buf(),
            reason,
        })?;

        debug!(uid = %config.uid, cpid = %config.cpid, env = %config.env, "Loaded device config");
        Ok(config)
    }

    fn from_json(content: &str) -> Result<Self, String> {
        let config: Self = serde_json::from_str(content).map_err(|e| e.to_string())?;
        if config.uid.trim().is_empty() {
            return Err("uid must not be empty".to_string());
        }
        if config.cpid.trim().is_empty() {
            return Err("cpid must not be empty".to_string());
        }
        Ok(config)
    }

    /// MQTT client ID the broker expects for this device
    pub fn client_id(&self) -> String {
        if self.pf == "az" {
            format!("{}-{}", self.cpid, self.uid)
        } else {
            self.uid.clone()
        }
    }

    pub fn topics(&self) -> DeviceTopics {
        let uid = &self.uid;
        DeviceTopics {
            report: self
                .topics
                .report
                .clone()
                .unwrap_or_else(|| format!("$aws/rules/msg_d2c_rpt/{uid}/2.1/0")),
            ack: self
                .topics
                .ack
                .clone()
                .unwrap_or_else(|| format!("$aws/rules/msg_d2c_ack/{uid}/2.1/6")),
            command: self
                .topics
                .command
                .clone()
                .unwrap_or_else(|| format!("iot/{uid}/cmd")),
        }
    }
}
