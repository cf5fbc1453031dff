//! Bridge between the local bus, Home Assistant and IoTConnect
//!
//! Bus messages become telemetry records sent to IoTConnect; IoTConnect
//! commands become Home Assistant service calls answered with at most one
//! acknowledgment. Each message or command is handled to completion before
//! the next one.

use std::future::Future;

use ha_commands::{CommandRequest, Dispatcher, ServiceCaller};
use ha_iotconnect::{CloudTransport, TransportError};
use ha_telemetry::{decode_payload, EntityRegistry, TelemetryRecord};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::bus::BusMessage;

/// Exit code when IoTConnect cannot be reached
pub const EXIT_TRANSPORT_FATAL: u8 = 2;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// Still disconnected after the single reconnect attempt
    #[error("Unable to connect to IoTConnect: {0}")]
    TransportFatal(#[source] TransportError),
}

impl BridgeError {
    pub fn exit_code(&self) -> u8 {
        match self {
            BridgeError::TransportFatal(_) => EXIT_TRANSPORT_FATAL,
        }
    }
}

pub struct Bridge<T, C> {
    transport: T,
    dispatcher: Dispatcher<C>,
    registry: EntityRegistry,
}

impl<T: CloudTransport, C: ServiceCaller> Bridge<T, C> {
    pub fn new(transport: T, dispatcher: Dispatcher<C>, registry: EntityRegistry) -> Self {
        Self {
            transport,
            dispatcher,
            registry,
        }
    }

    /// Connect if needed, once; failure is fatal
    async fn ensure_connected(&mut self) -> Result<(), BridgeError> {
        if self.transport.is_connected() {
            return Ok(());
        }

        info!("(re)connecting to IoTConnect...");
        let outcome = self.transport.connect().await;
        if self.transport.is_connected() {
            return Ok(());
        }

        let err = outcome
            .err()
            .unwrap_or_else(|| TransportError::Connect("still disconnected".to_string()));
        error!(error = %err, "Unable to connect to IoTConnect");
        Err(BridgeError::TransportFatal(err))
    }

    /// Connect to IoTConnect before anything else is started
    pub async fn start(&mut self) -> Result<(), BridgeError> {
        self.ensure_connected().await
    }

    /// Turn one bus message into telemetry and send it
    #[instrument(skip(self, payload), fields(len = payload.len()))]
    pub async fn handle_bus_message(&mut self, topic: &str, payload: &[u8]) -> Result<(), BridgeError> {
        let payload_raw = decode_payload(payload);
        debug!(payload = %payload_raw, "Bus message");
        let record = TelemetryRecord::assemble(topic, &payload_raw, &self.registry);

        self.ensure_connected().await?;
        match self.transport.send_telemetry(&record).await {
            Ok(()) => debug!(keys = record.keys().count(), "Telemetry sent"),
            Err(e) => warn!(error = %e, "Failed to send telemetry"),
        }
        Ok(())
    }

    /// Execute one command and acknowledge it if a handle was given
    #[instrument(skip(self, request), fields(command = %request.name))]
    pub async fn handle_command(&mut self, request: CommandRequest) {
        let verdict = self.dispatcher.execute(&request).await;
        info!(verdict = %verdict, success = verdict.is_success(), "Command handled");

        let Some(handle) = &request.ack else {
            debug!("No acknowledgment requested");
            return;
        };
        if let Err(e) = self.transport.send_ack(handle, &verdict).await {
            warn!(ack = %handle, error = %e, "Failed to send acknowledgment");
        }
    }

    /// Process bus messages and commands until `shutdown` resolves
    pub async fn run(
        &mut self,
        mut bus: mpsc::Receiver<BusMessage>,
        mut commands: mpsc::UnboundedReceiver<CommandRequest>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), BridgeError> {
        tokio::pin!(shutdown);
        let mut bus_open = true;
        let mut commands_open = true;

        while bus_open || commands_open {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Received shutdown signal");
                    break;
                }
                message = bus.recv(), if bus_open => match message {
                    Some(message) => {
                        self.handle_bus_message(&message.topic, &message.payload).await?;
                    }
                    None => {
                        warn!("Message bus closed");
                        bus_open = false;
                    }
                },
                request = commands.recv(), if commands_open => match request {
                    Some(request) => self.handle_command(request).await,
                    None => {
                        warn!("IoTConnect command stream closed");
                        commands_open = false;
                    }
                },
            }
        }

        self.transport.disconnect().await;
        Ok(())
    }

    #[cfg(test)]
    fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ha_commands::{
        AckHandle, ServiceCall, ServiceCallError, ServiceResponse, Verdict, COMMAND_SET_HA_LIGHT,
    };
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MockTransport {
        connected: bool,
        connect_succeeds: bool,
        connect_calls: usize,
        disconnected: bool,
        telemetry: Vec<TelemetryRecord>,
        acks: Vec<(AckHandle, Verdict)>,
    }

    impl MockTransport {
        fn connected() -> Self {
            Self {
                connected: true,
                connect_succeeds: true,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl CloudTransport for MockTransport {
        fn is_connected(&self) -> bool {
            self.connected
        }

        async fn connect(&mut self) -> Result<(), TransportError> {
            self.connect_calls += 1;
            if self.connect_succeeds {
                self.connected = true;
                Ok(())
            } else {
                Err(TransportError::Connect("connection refused".to_string()))
            }
        }

        async fn send_telemetry(&mut self, record: &TelemetryRecord) -> Result<(), TransportError> {
            self.telemetry.push(record.clone());
            Ok(())
        }

        async fn send_ack(
            &mut self,
            handle: &AckHandle,
            verdict: &Verdict,
        ) -> Result<(), TransportError> {
            self.acks.push((handle.clone(), verdict.clone()));
            Ok(())
        }

        async fn disconnect(&mut self) {
            self.disconnected = true;
        }
    }

    #[derive(Clone)]
    struct MockCaller {
        calls: Arc<Mutex<Vec<(String, Value)>>>,
        status: u16,
    }

    impl MockCaller {
        fn with_status(status: u16) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                status,
            }
        }
    }

    #[async_trait]
    impl ServiceCaller for MockCaller {
        async fn call_service(&self, call: &ServiceCall) -> Result<ServiceResponse, ServiceCallError> {
            self.calls
                .lock()
                .unwrap()
                .push((call.service_id(), call.service_data.clone()));
            Ok(ServiceResponse::new(self.status, "[]"))
        }
    }

    fn bridge(transport: MockTransport, caller: MockCaller) -> Bridge<MockTransport, MockCaller> {
        let registry = EntityRegistry::new(
            [("switch.bar_lamp", "bar_lamp"), ("light.kitchen_lights", "kitchen_lights")],
            [("ha/lights/bar_lamp", "bar_lamp")],
        );
        Bridge::new(transport, Dispatcher::new(caller), registry)
    }

    fn command(args: &[&str], ack: Option<&str>) -> CommandRequest {
        CommandRequest::new(
            COMMAND_SET_HA_LIGHT,
            args.iter().map(|a| json!(a)).collect(),
            ack.map(AckHandle::new),
        )
    }

    #[tokio::test]
    async fn test_bus_message_becomes_telemetry() {
        let mut bridge = bridge(MockTransport::connected(), MockCaller::with_status(200));

        bridge
            .handle_bus_message(
                "ha/lights/kitchen",
                br#"{"source":"switch.bar_lamp","value":"on"}"#,
            )
            .await
            .unwrap();

        let sent = &bridge.transport().telemetry;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].get_str("ha_topic"), Some("ha/lights/kitchen"));
        assert_eq!(sent[0].get("bar_lamp"), Some(&json!(1)));
        assert_eq!(bridge.transport().connect_calls, 0);
    }

    #[tokio::test]
    async fn test_malformed_payload_still_sent() {
        let mut bridge = bridge(MockTransport::connected(), MockCaller::with_status(200));

        bridge
            .handle_bus_message("ha/metrics/power", b"{not json")
            .await
            .unwrap();

        let sent = &bridge.transport().telemetry;
        assert_eq!(sent[0].get("value"), Some(&json!("{not json")));
    }

    #[tokio::test]
    async fn test_reconnects_once_before_sending() {
        let transport = MockTransport {
            connect_succeeds: true,
            ..Default::default()
        };
        let mut bridge = bridge(transport, MockCaller::with_status(200));

        bridge.handle_bus_message("ha/metrics/x", b"1").await.unwrap();

        assert_eq!(bridge.transport().connect_calls, 1);
        assert_eq!(bridge.transport().telemetry.len(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_failure_is_fatal() {
        let mut bridge = bridge(MockTransport::default(), MockCaller::with_status(200));

        let err = bridge.handle_bus_message("ha/metrics/x", b"1").await.unwrap_err();

        assert!(matches!(err, BridgeError::TransportFatal(_)));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(bridge.transport().connect_calls, 1);
        assert!(bridge.transport().telemetry.is_empty());
    }

    #[tokio::test]
    async fn test_command_acknowledged_once() {
        let caller = MockCaller::with_status(200);
        let mut bridge = bridge(MockTransport::connected(), caller.clone());

        bridge
            .handle_command(command(&["light.kitchen_lights", "on", "300"], Some("a1")))
            .await;

        let acks = &bridge.transport().acks;
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].0, AckHandle::new("a1"));
        assert_eq!(
            acks[0].1,
            Verdict::SuccessWithNote("Set light.kitchen_lights to on".to_string())
        );

        let calls = caller.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "light.turn_on");
        assert_eq!(
            calls[0].1,
            json!({"entity_id": "light.kitchen_lights", "brightness": 255})
        );
    }

    #[tokio::test]
    async fn test_rejected_command_acknowledged_as_failed() {
        let caller = MockCaller::with_status(200);
        let mut bridge = bridge(MockTransport::connected(), caller.clone());

        bridge.handle_command(command(&["switch.bar_lamp"], Some("a2"))).await;

        assert_eq!(
            bridge.transport().acks,
            vec![(
                AckHandle::new("a2"),
                Verdict::Failed("Expected: entity_id, state[, brightness]".to_string())
            )]
        );
        assert!(caller.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_http_failure_acknowledged() {
        let mut bridge = bridge(MockTransport::connected(), MockCaller::with_status(500));

        bridge.handle_command(command(&["switch.bar_lamp", "off"], Some("a3"))).await;

        let (_, verdict) = &bridge.transport().acks[0];
        assert_eq!(verdict, &Verdict::Failed("HTTP 500: []".to_string()));
    }

    #[tokio::test]
    async fn test_no_ack_without_handle() {
        let caller = MockCaller::with_status(200);
        let mut bridge = bridge(MockTransport::connected(), caller.clone());

        bridge.handle_command(command(&["switch.bar_lamp", "on"], None)).await;
        bridge.handle_command(command(&["bad"], None)).await;

        assert!(bridge.transport().acks.is_empty());
        assert_eq!(caller.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_command_acknowledged_as_failed() {
        let caller = MockCaller::with_status(200);
        let mut bridge = bridge(MockTransport::connected(), caller.clone());
        let request = ha_iotconnect::protocol::decode_command(br#"{"ct":0,"cmd":"","ack":"a5"}"#)
            .unwrap()
            .unwrap();

        bridge.handle_command(request).await;

        assert_eq!(
            bridge.transport().acks,
            vec![(
                AckHandle::new("a5"),
                Verdict::Failed("Not implemented".to_string())
            )]
        );
        assert!(caller.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let mut bridge = bridge(MockTransport::connected(), MockCaller::with_status(200));
        let (bus_tx, bus_rx) = mpsc::channel(8);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        bus_tx
            .send(BusMessage {
                topic: "ha/lights/bar_lamp".to_string(),
                payload: b"off".to_vec(),
            })
            .await
            .unwrap();
        cmd_tx
            .send(command(&["switch.bar_lamp", "on"], Some("a4")))
            .unwrap();
        drop(bus_tx);
        drop(cmd_tx);

        bridge
            .run(bus_rx, cmd_rx, std::future::pending::<()>())
            .await
            .unwrap();

        let transport = bridge.transport();
        assert_eq!(transport.telemetry.len(), 1);
        assert_eq!(transport.telemetry[0].get("bar_lamp"), Some(&json!(0)));
        assert_eq!(transport.acks.len(), 1);
        assert!(transport.disconnected);
    }
}
