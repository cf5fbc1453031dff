//! IoTConnect MQTT client
//!
//! [`IotcClient`] owns one TLS MQTT session with the IoTConnect broker. A
//! driver task polls the rumqttc event loop, tracks the link state and
//! forwards decoded commands over an mpsc channel. A lost connection stays
//! lost until [`CloudTransport::connect`] is called again.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use ha_commands::{AckHandle, CommandRequest, Verdict};
use ha_telemetry::TelemetryRecord;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::device_config::{DeviceConfig, DeviceTopics};
use crate::error::TransportError;
use crate::protocol::{decode_command, encode_ack, encode_telemetry};

const REQUEST_CAPACITY: usize = 64;

/// Fixed header, topic length prefix and packet id of a QoS 1 publish
const PUBLISH_OVERHEAD: usize = 9;

/// Outbound side of the remote platform
///
/// Owned exclusively by the bridge; every operation is sequential.
#[async_trait]
pub trait CloudTransport: Send {
    fn is_connected(&self) -> bool;

    /// Establish (or re-establish) the session
    async fn connect(&mut self) -> Result<(), TransportError>;

    async fn send_telemetry(&mut self, record: &TelemetryRecord) -> Result<(), TransportError>;

    async fn send_ack(&mut self, handle: &AckHandle, verdict: &Verdict)
        -> Result<(), TransportError>;

    /// Close the session; a no-op when not connected
    async fn disconnect(&mut self) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LinkState {
    Connecting,
    Connected,
    Lost(String),
}

/// Settings for [`IotcClient`]
#[derive(Debug, Clone)]
pub struct IotcOptions {
    pub device: DeviceConfig,
    /// Broker host, overriding the device config
    pub host: Option<String>,
    pub port: u16,
    pub ca_cert: PathBuf,
    pub device_cert: PathBuf,
    pub device_pkey: PathBuf,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    /// Largest packet sent or accepted, in bytes
    pub max_packet_size: usize,
}

/// IoTConnect device client over MQTT/TLS
pub struct IotcClient {
    options: MqttOptions,
    host: String,
    topics: DeviceTopics,
    connect_timeout: Duration,
    max_packet_size: usize,
    client: Option<AsyncClient>,
    driver: Option<JoinHandle<()>>,
    state: watch::Receiver<LinkState>,
    commands_tx: mpsc::UnboundedSender<CommandRequest>,
    commands_rx: Option<mpsc::UnboundedReceiver<CommandRequest>>,
}

impl IotcClient {
    /// Build a client from device identity and certificate files
    ///
    /// Reads the certificates eagerly; nothing is connected yet.
    pub fn new(opts: IotcOptions) -> Result<Self, TransportError> {
        let host = opts
            .host
            .clone()
            .or_else(|| opts.device.host.clone())
            .ok_or(TransportError::MissingHost)?;

        let ca = read_file(&opts.ca_cert)?;
        let cert = read_file(&opts.device_cert)?;
        let key = read_file(&opts.device_pkey)?;

        let mut options = MqttOptions::new(opts.device.client_id(), &host, opts.port);
        options.set_keep_alive(opts.keep_alive);
        options.set_clean_session(true);
        options.set_transport(Transport::tls(ca, Some((cert, key)), None));
        options.set_max_packet_size(opts.max_packet_size, opts.max_packet_size);

        // the driver must keep polling while the bridge works through a backlog
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (_, state) = watch::channel(LinkState::Lost("not connected yet".to_string()));

        Ok(Self {
            options,
            host,
            topics: opts.device.topics(),
            connect_timeout: opts.connect_timeout,
            max_packet_size: opts.max_packet_size,
            client: None,
            driver: None,
            state,
            commands_tx,
            commands_rx: Some(commands_rx),
        })
    }

    /// Take the stream of received commands; `None` after the first call
    pub fn take_commands(&mut self) -> Option<mpsc::UnboundedReceiver<CommandRequest>> {
        self.commands_rx.take()
    }

    pub fn topics(&self) -> &DeviceTopics {
        &self.topics
    }

    fn stop_driver(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }

    /// Reject a publish the event loop would fail on, which would drop the link
    fn check_size(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        check_packet_size(topic, payload, self.max_packet_size)
    }

    fn connected_client(&self) -> Result<&AsyncClient, TransportError> {
        match &self.client {
            Some(client) if self.is_connected() => Ok(client),
            _ => Err(TransportError::NotConnected),
        }
    }
}

impl Drop for IotcClient {
    fn drop(&mut self) {
        self.stop_driver();
    }
}

#[async_trait]
impl CloudTransport for IotcClient {
    fn is_connected(&self) -> bool {
        *self.state.borrow() == LinkState::Connected
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.is_connected() {
            return Ok(());
        }
        self.stop_driver();
        info!("Connecting to IoTConnect");

        let (client, eventloop) = AsyncClient::new(self.options.clone(), REQUEST_CAPACITY);
        let (state_tx, mut state_rx) = watch::channel(LinkState::Connecting);
        self.driver = Some(tokio::spawn(drive(
            eventloop,
            client.clone(),
            self.topics.command.clone(),
            state_tx,
            self.commands_tx.clone(),
        )));
        self.client = Some(client);
        self.state = state_rx.clone();

        let waited = tokio::time::timeout(
            self.connect_timeout,
            state_rx.wait_for(|s| *s != LinkState::Connecting),
        )
        .await;

        let result = match waited {
            Ok(Ok(state)) => match (*state).clone() {
                LinkState::Connected => Ok(()),
                LinkState::Lost(reason) => Err(TransportError::Connect(reason)),
                LinkState::Connecting => Err(TransportError::Connect("still connecting".into())),
            },
            Ok(Err(_)) => Err(TransportError::Connect("connection task ended".into())),
            Err(_) => Err(TransportError::Connect(format!(
                "timed out after {:?}",
                self.connect_timeout
            ))),
        };

        if result.is_err() {
            self.stop_driver();
            self.client = None;
        }
        result
    }

    async fn send_telemetry(&mut self, record: &TelemetryRecord) -> Result<(), TransportError> {
        let client = self.connected_client()?;
        let payload = encode_telemetry(record)?;
        self.check_size(&self.topics.report, &payload)?;
        debug!(
            topic = %self.topics.report,
            payload = %String::from_utf8_lossy(&payload),
            "Sending telemetry"
        );
        client
            .publish(&self.topics.report, QoS::AtLeastOnce, false, payload)
            .await?;
        Ok(())
    }

    async fn send_ack(
        &mut self,
        handle: &AckHandle,
        verdict: &Verdict,
    ) -> Result<(), TransportError> {
        let client = self.connected_client()?;
        let payload = encode_ack(handle, verdict)?;
        self.check_size(&self.topics.ack, &payload)?;
        client
            .publish(&self.topics.ack, QoS::AtLeastOnce, false, payload)
            .await?;
        debug!(ack = %handle, success = verdict.is_success(), "Sent command acknowledgment");
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.disconnect().await {
                debug!(error = %e, "IoTConnect disconnect request not delivered");
            }
        }
        self.stop_driver();
        info!("Disconnected from IoTConnect");
    }
}

fn check_packet_size(topic: &str, payload: &[u8], max: usize) -> Result<(), TransportError> {
    let size = PUBLISH_OVERHEAD + topic.len() + payload.len();
    if size > max {
        return Err(TransportError::PacketTooLarge { size, max });
    }
    Ok(())
}

/// Hand a received command to the bridge without waiting
///
/// Returns `false` once the receiving side is gone.
fn forward_command(payload: &[u8], commands: &mpsc::UnboundedSender<CommandRequest>) -> bool {
    match decode_command(payload) {
        Ok(Some(request)) => {
            info!(
                command = %request.name,
                args = ?request.args,
                ack = ?request.ack,
                "Received command"
            );
            commands.send(request).is_ok()
        }
        Ok(None) => {
            debug!("Ignoring cloud-to-device message that is not a command");
            true
        }
        Err(e) => {
            warn!(error = %e, "Dropping cloud-to-device message");
            true
        }
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, TransportError> {
    fs::read(path).map_err(|e| TransportError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Poll the event loop until the connection drops
async fn drive(
    mut eventloop: EventLoop,
    client: AsyncClient,
    command_topic: String,
    state: watch::Sender<LinkState>,
    commands: mpsc::UnboundedSender<CommandRequest>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Connected to IoTConnect");
                // the poller must not block on its own request queue
                if let Err(e) = client.try_subscribe(&command_topic, QoS::AtLeastOnce) {
                    error!(topic = %command_topic, error = %e, "Failed to subscribe to commands");
                }
                state.send_replace(LinkState::Connected);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) if publish.topic == command_topic => {
                if !forward_command(&publish.payload, &commands) {
                    debug!("Command receiver dropped, stopping IoTConnect driver");
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Disconnected from server. Reason: {e}");
                state.send_replace(LinkState::Lost(e.to_string()));
                break;
            }
        }
    }
}
