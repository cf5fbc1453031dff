//! Typed bridge configuration
//!
//! Everything the bridge needs at startup: local MQTT bus connection, Home
//! Assistant REST endpoint and token, IoTConnect device files, and the entity
//! registry. Read once and never modified afterwards.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ha_core::EntityId;
use serde::Deserialize;
use tracing::info;

use crate::error::{ConfigError, ConfigResult};
use crate::loader::YamlLoader;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "bridge.yaml";

/// Root of the bridge configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub mqtt: MqttConfig,

    pub home_assistant: HomeAssistantConfig,

    #[serde(default)]
    pub iotconnect: IotConnectConfig,

    /// Entity ID -> telemetry key
    #[serde(default = "default_entities")]
    pub entities: BTreeMap<String, String>,

    /// Bus topic -> telemetry key
    #[serde(default = "default_entity_topics")]
    pub entity_topics: BTreeMap<String, String>,
}

/// Local MQTT bus connection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// Subscriptions, wildcards allowed
    pub topics: Vec<String>,
    pub qos: u8,
    /// Largest MQTT packet accepted or sent, in bytes
    pub max_packet_size: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "homeassistant.local".to_string(),
            port: 1883,
            username: None,
            password: None,
            client_id: "ha-iotc-bridge".to_string(),
            keep_alive_secs: 60,
            topics: vec![
                "ha/lights/#".to_string(),
                "ha/metrics/#".to_string(),
                "homeassistant/status".to_string(),
            ],
            qos: 0,
            max_packet_size: 1024 * 1024,
        }
    }
}

impl MqttConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

/// Home Assistant REST API access
#[derive(Debug, Clone, Deserialize)]
pub struct HomeAssistantConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Long-lived access token
    pub token: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl HomeAssistantConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://homeassistant.local:8123".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// IoTConnect device identity and broker access
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IotConnectConfig {
    /// iotcDeviceConfig.json as downloaded from the IoTConnect portal
    pub device_config: PathBuf,
    pub device_cert: PathBuf,
    pub device_pkey: PathBuf,
    pub ca_cert: PathBuf,
    /// Overrides the broker host from the device config
    pub host: Option<String>,
    pub port: u16,
    pub connect_timeout_secs: u64,
    /// Broker packet limit in bytes; AWS IoT Core rejects anything above 128 KiB
    pub max_packet_size: usize,
}

impl Default for IotConnectConfig {
    fn default() -> Self {
        Self {
            device_config: PathBuf::from("iotcDeviceConfig.json"),
            device_cert: PathBuf::from("device-cert.pem"),
            device_pkey: PathBuf::from("device-pkey.pem"),
            ca_cert: PathBuf::from("AmazonRootCA1.pem"),
            host: None,
            port: 8883,
            connect_timeout_secs: 10,
            max_packet_size: 128 * 1024,
        }
    }
}

impl IotConnectConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_entities() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("switch.bar_lamp".to_string(), "bar_lamp".to_string()),
        ("light.kitchen_lights".to_string(), "kitchen_lights".to_string()),
    ])
}

fn default_entity_topics() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("ha/lights/bar_lamp".to_string(), "bar_lamp".to_string()),
        ("ha/lights/kitchen_lights".to_string(), "kitchen_lights".to_string()),
    ])
}

impl BridgeConfig {
    /// Load, resolve and validate the configuration file at `path`
    ///
    /// `secrets.yaml` and relative file paths are resolved against the
    /// directory containing the configuration file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let config_dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file = path.file_name().ok_or_else(|| ConfigError::InvalidValue {
            key: "config".to_string(),
            reason: format!("{} is not a file path", path.display()),
        })?;

        let mut loader = YamlLoader::new(&config_dir)?;
        let value = loader.load_file(file)?;
        let mut config: Self =
            serde_yaml::from_value(value).map_err(|e| ConfigError::Schema {
                path: path.to_path_buf(),
                source: e,
            })?;

        config.resolve_paths(&config_dir);
        config.validate()?;

        info!(
            path = %path.display(),
            entities = config.entities.len(),
            entity_topics = config.entity_topics.len(),
            "Loaded bridge configuration"
        );
        Ok(config)
    }

    fn resolve_paths(&mut self, config_dir: &Path) {
        let iotc = &mut self.iotconnect;
        for file in [
            &mut iotc.device_config,
            &mut iotc.device_cert,
            &mut iotc.device_pkey,
            &mut iotc.ca_cert,
        ] {
            if file.is_relative() {
                *file = config_dir.join(&*file);
            }
        }
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if self.home_assistant.token.trim().is_empty() {
            return Err(invalid("home_assistant.token", "must not be empty"));
        }
        if self.mqtt.qos > 2 {
            return Err(invalid("mqtt.qos", "must be 0, 1 or 2"));
        }
        if self.mqtt.max_packet_size == 0 {
            return Err(invalid("mqtt.max_packet_size", "must be greater than 0"));
        }
        if self.iotconnect.max_packet_size == 0 {
            return Err(invalid("iotconnect.max_packet_size", "must be greater than 0"));
        }
        if self.mqtt.topics.is_empty() {
            return Err(invalid("mqtt.topics", "at least one topic is required"));
        }

        for (entity, key) in &self.entities {
            entity.parse::<EntityId>().map_err(|e| {
                invalid(&format!("entities.{entity}"), &e.to_string())
            })?;
            if key.trim().is_empty() {
                return Err(invalid(&format!("entities.{entity}"), "key must not be empty"));
            }
        }
        for (topic, key) in &self.entity_topics {
            if key.trim().is_empty() {
                return Err(invalid(&format!("entity_topics.{topic}"), "key must not be empty"));
            }
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
