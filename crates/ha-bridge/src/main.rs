//! Home Assistant to IoTConnect bridge
//!
//! Forwards Home Assistant MQTT events to IoTConnect as telemetry and turns
//! IoTConnect commands into Home Assistant service calls.

mod bridge;
mod bus;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use ha_commands::{Dispatcher, RestClient};
use ha_config::{BridgeConfig, DEFAULT_CONFIG_FILE};
use ha_iotconnect::{DeviceConfig, IotcClient, IotcOptions};
use ha_telemetry::EntityRegistry;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::bridge::{Bridge, BridgeError};
use crate::bus::Bus;

#[derive(Debug, Parser)]
#[command(name = "ha-iotc-bridge", version, about = "Bridge Home Assistant to Avnet IoTConnect")]
struct Cli {
    /// Path to the bridge configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            match e.downcast_ref::<BridgeError>() {
                Some(fatal) => ExitCode::from(fatal.exit_code()),
                None => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Starting Home Assistant IoTConnect bridge");

    let config = BridgeConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    let registry = EntityRegistry::new(config.entities.clone(), config.entity_topics.clone());
    info!(entries = registry.len(), "Loaded entity registry");

    let iotc = &config.iotconnect;
    let device = DeviceConfig::load(&iotc.device_config)?;
    let mut transport = IotcClient::new(IotcOptions {
        device,
        host: iotc.host.clone(),
        port: iotc.port,
        ca_cert: iotc.ca_cert.clone(),
        device_cert: iotc.device_cert.clone(),
        device_pkey: iotc.device_pkey.clone(),
        keep_alive: config.mqtt.keep_alive(),
        connect_timeout: iotc.connect_timeout(),
        max_packet_size: iotc.max_packet_size,
    })?;
    let commands = transport
        .take_commands()
        .ok_or_else(|| anyhow!("IoTConnect command stream already taken"))?;

    let ha = &config.home_assistant;
    let rest = RestClient::new(&ha.base_url, ha.token.clone(), ha.timeout())?;

    let mut bridge = Bridge::new(transport, Dispatcher::new(rest), registry);
    bridge.start().await?;

    let (bus, messages) = Bus::start(&config.mqtt);
    info!("Bridge is running");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    let outcome = bridge.run(messages, commands, shutdown).await;

    bus.stop().await;
    info!("Shutting down...");
    outcome.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["ha-iotc-bridge"]);
        assert_eq!(cli.config, PathBuf::from("bridge.yaml"));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from(["ha-iotc-bridge", "--config", "/etc/bridge.yaml", "-v"]);
        assert_eq!(cli.config, PathBuf::from("/etc/bridge.yaml"));
        assert!(cli.verbose);
    }
}
