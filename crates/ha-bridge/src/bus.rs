//! Local MQTT bus subscription
//!
//! Home Assistant publishes entity events on a local broker. The event loop
//! runs in its own task and forwards every publish to the bridge; topics are
//! re-subscribed on each (re)connect since rumqttc does not restore them.

use std::time::Duration;

use ha_config::MqttConfig;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// One message received from the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Handle on the running bus connection
pub struct Bus {
    client: AsyncClient,
    driver: JoinHandle<()>,
}

impl Bus {
    /// Connect to the broker in the background and start forwarding messages
    pub fn start(config: &MqttConfig) -> (Self, mpsc::Receiver<BusMessage>) {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(config.keep_alive());
        options.set_max_packet_size(config.max_packet_size, config.max_packet_size);
        if let Some(username) = &config.username {
            options.set_credentials(username, config.password.clone().unwrap_or_default());
        }

        info!(host = %config.host, port = config.port, "Awaiting MQTT connection establishment...");
        let (client, eventloop) = AsyncClient::new(options, 64);
        let (tx, rx) = mpsc::channel(256);

        let driver = tokio::spawn(drive(
            eventloop,
            client.clone(),
            config.topics.clone(),
            qos_level(config.qos),
            tx,
        ));

        (Self { client, driver }, rx)
    }

    pub async fn stop(self) {
        if let Err(e) = self.client.disconnect().await {
            debug!(error = %e, "MQTT disconnect request not delivered");
        }
        self.driver.abort();
    }
}

pub fn qos_level(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

async fn drive(
    mut eventloop: EventLoop,
    client: AsyncClient,
    topics: Vec<String>,
    qos: QoS,
    tx: mpsc::Sender<BusMessage>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("MQTT connected");
                for topic in &topics {
                    match client.try_subscribe(topic, qos) {
                        Ok(()) => info!(topic = %topic, "Subscribed"),
                        Err(e) => error!(topic = %topic, error = %e, "Failed to subscribe"),
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = BusMessage {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                };
                if tx.send(message).await.is_err() {
                    debug!("Bus receiver dropped, stopping MQTT event loop");
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!("MQTT connection error: {e}, reconnecting");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
