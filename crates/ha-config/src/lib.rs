//! Configuration loading for the Home Assistant IoTConnect bridge
//!
//! The bridge is configured from a single YAML file (`bridge.yaml` by
//! default) with support for a few custom tags:
//!
//! - `!include path` - Include another YAML file
//! - `!secret key` - Substitute from secrets.yaml
//! - `!env_var VAR` - Environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use ha_config::BridgeConfig;
//!
//! let config = BridgeConfig::load("/etc/ha-iotc-bridge/bridge.yaml")?;
//! println!("{}", config.mqtt.host);
//! ```

mod bridge_config;
mod error;
mod loader;
mod secrets;

pub use bridge_config::{
    BridgeConfig, HomeAssistantConfig, IotConnectConfig, MqttConfig, DEFAULT_CONFIG_FILE,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, YamlLoader};
pub use secrets::{Secrets, SECRETS_FILE};
