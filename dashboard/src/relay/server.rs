use crate::driver::config::RelaySettings;
use crate::relay::metrics::{RelayMetrics, RelayStatus};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use log::{info, warn};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tunnelcore::measurement::{ConfigUpdate, Measurement};
use tunnelcore::prelude::{TunnelError, TunnelResult};
use tunnelcore::protocol::{CommandPayload, ConfigPayload, Envelope, RelayMessage};
use warp::ws::{Message, WebSocket};
use warp::Filter;

static NEXT_CLIENT_ID: AtomicUsize = AtomicUsize::new(1);

type Clients = Arc<Mutex<HashMap<usize, mpsc::UnboundedSender<Message>>>>;

/// Control traffic surfaced to the dashboard host.
///
/// The relay never acts on commands or config updates itself; it
/// acknowledges them on the wire and hands them over for the host to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    Command(CommandPayload),
    ConfigUpdate(ConfigUpdate),
}

struct RunningServer {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
    addr: SocketAddr,
}

/// WebSocket relay fanning live measurements out to every viewer.
pub struct TelemetryRelay {
    settings: RelaySettings,
    clients: Clients,
    metrics: Arc<RelayMetrics>,
    control_tx: mpsc::UnboundedSender<ControlEvent>,
    control_rx: Mutex<Option<mpsc::UnboundedReceiver<ControlEvent>>>,
    running: Mutex<Option<RunningServer>>,
}

impl TelemetryRelay {
    pub fn new(settings: RelaySettings) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        Self {
            settings,
            clients: Arc::new(Mutex::new(HashMap::new())),
            metrics: Arc::new(RelayMetrics::new()),
            control_tx,
            control_rx: Mutex::new(Some(control_rx)),
            running: Mutex::new(None),
        }
    }

    /// Hands out the inbound control stream; only the first caller gets it.
    pub fn take_control_events(&self) -> Option<mpsc::UnboundedReceiver<ControlEvent>> {
        self.control_rx.lock().ok().and_then(|mut slot| slot.take())
    }

    pub fn metrics(&self) -> Arc<RelayMetrics> {
        self.metrics.clone()
    }

    /// Binds the listener and starts serving connections.
    ///
    /// A bind failure is returned as a transport error and never retried.
    pub async fn start(&self) -> TunnelResult<SocketAddr> {
        let mut slot = self
            .running
            .lock()
            .map_err(|_| TunnelError::Internal("relay state lock poisoned".to_string()))?;
        if let Some(server) = slot.as_ref() {
            warn!("relay already running on {}", server.addr);
            return Ok(server.addr);
        }

        let ip: IpAddr = self.settings.host.parse().map_err(|_| {
            TunnelError::Validation(format!("invalid relay host: {}", self.settings.host))
        })?;
        let requested = SocketAddr::new(ip, self.settings.port);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (addr, server) = warp::serve(self.routes())
            .try_bind_with_graceful_shutdown(requested, async move {
                let _ = shutdown_rx.await;
            })
            .map_err(|e| TunnelError::Transport(format!("binding relay on {}: {}", requested, e)))?;

        let task = tokio::spawn(server);
        info!("relay listening on {}", addr);

        *slot = Some(RunningServer {
            shutdown: shutdown_tx,
            task,
            addr,
        });
        Ok(addr)
    }

    /// Closes every client connection and stops the listener. Idempotent.
    pub async fn stop(&self) {
        let running = match self.running.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        let server = match running {
            Some(server) => server,
            None => return,
        };

        if let Ok(mut registry) = self.clients.lock() {
            for tx in registry.values() {
                let _ = tx.send(Message::close());
            }
            registry.clear();
        }

        let _ = server.shutdown.send(());
        if let Err(err) = server.task.await {
            warn!("relay task ended abnormally: {}", err);
        }
        info!("relay stopped");
    }

    /// Sends one envelope to every open connection.
    ///
    /// Clients receive frames in call order; peers whose channel is gone
    /// are pruned here rather than eagerly on disconnect.
    pub fn broadcast(&self, envelope: &Envelope) {
        let text = match envelope.to_json() {
            Ok(text) => text,
            Err(err) => {
                warn!("failed to encode {} frame: {}", envelope.message.kind(), err);
                return;
            }
        };

        if let Ok(mut registry) = self.clients.lock() {
            registry.retain(|_, tx| tx.send(Message::text(text.clone())).is_ok());
        }
        self.metrics.record_broadcast();
    }

    /// Publishes one measurement to every open connection.
    pub fn broadcast_data(&self, measurement: &Measurement) {
        self.broadcast(&Envelope::data(measurement.clone(), Utc::now()));
    }

    pub fn status(&self) -> RelayStatus {
        let client_count = self.clients.lock().map(|c| c.len()).unwrap_or(0);
        let (running, port) = match self.running.lock() {
            Ok(slot) => match slot.as_ref() {
                Some(server) => (true, server.addr.port()),
                None => (false, self.settings.port),
            },
            Err(_) => (false, self.settings.port),
        };
        RelayStatus {
            running,
            client_count,
            port,
        }
    }

    fn routes(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let clients = self.clients.clone();
        let metrics = self.metrics.clone();
        let control_tx = self.control_tx.clone();

        warp::path::end().and(warp::ws()).map(move |ws: warp::ws::Ws| {
            let clients = clients.clone();
            let metrics = metrics.clone();
            let control_tx = control_tx.clone();
            ws.on_upgrade(move |socket| handle_connection(socket, clients, metrics, control_tx))
        })
    }
}

async fn handle_connection(
    socket: WebSocket,
    clients: Clients,
    metrics: Arc<RelayMetrics>,
    control_tx: mpsc::UnboundedSender<ControlEvent>,
) {
    let client_id = NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed);
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    // Everything sent to this client flows through one writer task.
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if ws_tx.send(message).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    // Greeting and registration share the registry lock, so a broadcast can
    // neither precede the greeting nor miss this client.
    if let Ok(mut registry) = clients.lock() {
        if let Ok(text) = Envelope::connected(Utc::now()).to_json() {
            let _ = tx.send(Message::text(text));
        }
        registry.insert(client_id, tx.clone());
    }
    metrics.record_connection();
    info!("relay client {} connected", client_id);

    while let Some(result) = ws_rx.next().await {
        let message = match result {
            Ok(message) => message,
            Err(err) => {
                warn!("relay client {} transport error: {}", client_id, err);
                break;
            }
        };
        if message.is_close() {
            break;
        }
        if message.is_ping() || message.is_pong() {
            continue;
        }

        let inbound = match message.to_str() {
            Ok(text) => Envelope::from_json(text),
            Err(()) => Err(TunnelError::Decode("non-text frame".to_string())),
        };
        match inbound {
            Ok(envelope) => handle_envelope(client_id, envelope, &tx, &control_tx),
            Err(err) => {
                warn!("relay client {} sent a malformed frame: {}", client_id, err);
                metrics.record_decode_error();
                if let Ok(text) = Envelope::error("Invalid message format", Utc::now()).to_json() {
                    let _ = tx.send(Message::text(text));
                }
            }
        }
    }

    if let Ok(mut registry) = clients.lock() {
        registry.remove(&client_id);
    }
    drop(tx);
    let _ = writer.await;
    info!("relay client {} disconnected", client_id);
}

fn handle_envelope(
    client_id: usize,
    envelope: Envelope,
    reply_tx: &mpsc::UnboundedSender<Message>,
    control_tx: &mpsc::UnboundedSender<ControlEvent>,
) {
    match envelope.message {
        RelayMessage::Command(command) => {
            if let Ok(text) = Envelope::command_ack(command, Utc::now()).to_json() {
                let _ = reply_tx.send(Message::text(text));
            }
            let _ = control_tx.send(ControlEvent::Command(command));
        }
        RelayMessage::Config(ConfigPayload::Update(update)) => {
            if let Ok(text) = Envelope::config_ack(update.clone(), Utc::now()).to_json() {
                let _ = reply_tx.send(Message::text(text));
            }
            let _ = control_tx.send(ControlEvent::ConfigUpdate(update));
        }
        other => {
            warn!(
                "relay client {} sent an unexpected {} message",
                client_id,
                other.kind()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::TelemetryGenerator;
    use tunnelcore::measurement::GeneratorConfig;
    use tunnelcore::protocol::StatusPayload;

    fn sample_pair() -> (Measurement, Measurement) {
        let mut generator = TelemetryGenerator::with_seed(GeneratorConfig::default(), 11);
        (generator.tick(0.0, Utc::now()), generator.tick(0.1, Utc::now()))
    }

    async fn recv_envelope(client: &mut warp::test::WsClient) -> Envelope {
        let frame = client.recv().await.expect("frame");
        Envelope::from_json(frame.to_str().expect("text frame")).expect("valid envelope")
    }

    #[tokio::test]
    async fn greeting_is_the_first_frame() {
        let relay = TelemetryRelay::new(RelaySettings::default());
        let mut client = warp::test::ws()
            .handshake(relay.routes())
            .await
            .expect("handshake");

        let greeting = recv_envelope(&mut client).await;
        match greeting.message {
            RelayMessage::Status(StatusPayload::Connected { connected, .. }) => {
                assert!(connected)
            }
            other => panic!("expected greeting, got {:?}", other),
        }
        assert_eq!(relay.status().client_count, 1);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_client_in_order() {
        let relay = TelemetryRelay::new(RelaySettings::default());
        let routes = relay.routes();
        let (first, second) = sample_pair();

        let mut alice = warp::test::ws().handshake(routes.clone()).await.expect("handshake");
        let mut bob = warp::test::ws().handshake(routes.clone()).await.expect("handshake");
        recv_envelope(&mut alice).await;
        recv_envelope(&mut bob).await;

        relay.broadcast_data(&first);
        relay.broadcast_data(&second);

        for client in [&mut alice, &mut bob] {
            for expected in [&first, &second] {
                match recv_envelope(client).await.message {
                    RelayMessage::Data(measurement) => assert_eq!(&measurement, expected),
                    other => panic!("expected data, got {:?}", other),
                }
            }
        }
        assert_eq!(relay.metrics().snapshot().1, 2);
    }

    #[tokio::test]
    async fn malformed_frame_errors_only_the_offender() {
        let relay = TelemetryRelay::new(RelaySettings::default());
        let routes = relay.routes();
        let (first, _) = sample_pair();

        let mut offender = warp::test::ws().handshake(routes.clone()).await.expect("handshake");
        let mut bystander = warp::test::ws().handshake(routes.clone()).await.expect("handshake");
        recv_envelope(&mut offender).await;
        recv_envelope(&mut bystander).await;

        offender.send_text("this is not json").await;
        match recv_envelope(&mut offender).await.message {
            RelayMessage::Error(payload) => {
                assert_eq!(payload.message, "Invalid message format")
            }
            other => panic!("expected error, got {:?}", other),
        }

        // Both stay connected and the bystander never saw the error.
        relay.broadcast_data(&first);
        for client in [&mut offender, &mut bystander] {
            match recv_envelope(client).await.message {
                RelayMessage::Data(measurement) => assert_eq!(measurement, first),
                other => panic!("expected data, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn command_is_acked_and_surfaced() {
        let relay = TelemetryRelay::new(RelaySettings::default());
        let mut control = relay.take_control_events().expect("control stream");
        let mut client = warp::test::ws()
            .handshake(relay.routes())
            .await
            .expect("handshake");
        recv_envelope(&mut client).await;

        client
            .send_text(r#"{"type":"command","payload":"stop-simulation","timestamp":"2024-05-14T12:00:00Z"}"#)
            .await;

        match recv_envelope(&mut client).await.message {
            RelayMessage::Status(StatusPayload::CommandAck {
                command_received,
                command,
            }) => {
                assert!(command_received);
                assert_eq!(command, CommandPayload::StopSimulation);
            }
            other => panic!("expected command ack, got {:?}", other),
        }
        assert_eq!(
            control.recv().await,
            Some(ControlEvent::Command(CommandPayload::StopSimulation))
        );
    }

    #[tokio::test]
    async fn config_update_is_acked_and_surfaced() {
        let relay = TelemetryRelay::new(RelaySettings::default());
        let mut control = relay.take_control_events().expect("control stream");
        let mut client = warp::test::ws()
            .handshake(relay.routes())
            .await
            .expect("handshake");
        recv_envelope(&mut client).await;

        client
            .send_text(r#"{"type":"config","payload":{"windSpeed":35.0},"timestamp":"2024-05-14T12:00:00Z"}"#)
            .await;

        match recv_envelope(&mut client).await.message {
            RelayMessage::Config(ConfigPayload::Ack {
                config_received,
                config,
            }) => {
                assert!(config_received);
                assert_eq!(config.wind_speed, Some(35.0));
            }
            other => panic!("expected config ack, got {:?}", other),
        }
        match control.recv().await {
            Some(ControlEvent::ConfigUpdate(update)) => {
                assert_eq!(update.wind_speed, Some(35.0))
            }
            other => panic!("expected config event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn inbound_data_frames_are_ignored() {
        let relay = TelemetryRelay::new(RelaySettings::default());
        let mut control = relay.take_control_events().expect("control stream");
        let (first, _) = sample_pair();

        let mut client = warp::test::ws()
            .handshake(relay.routes())
            .await
            .expect("handshake");
        recv_envelope(&mut client).await;

        let rogue = Envelope::data(first.clone(), Utc::now()).to_json().unwrap();
        client.send_text(rogue).await;

        // No reply and no control event; the next frame is a real broadcast.
        relay.broadcast_data(&first);
        match recv_envelope(&mut client).await.message {
            RelayMessage::Data(measurement) => assert_eq!(measurement, first),
            other => panic!("expected data, got {:?}", other),
        }
        assert!(control.try_recv().is_err());
    }

    #[tokio::test]
    async fn start_binds_and_stop_is_idempotent() {
        let relay = TelemetryRelay::new(RelaySettings {
            host: "127.0.0.1".to_string(),
            port: 0,
        });

        let addr = relay.start().await.expect("bind");
        assert_ne!(addr.port(), 0);
        assert!(relay.status().running);
        assert_eq!(relay.status().port, addr.port());

        relay.stop().await;
        assert!(!relay.status().running);
        relay.stop().await;
    }

    #[tokio::test]
    async fn bind_conflict_is_a_transport_error() {
        let first = TelemetryRelay::new(RelaySettings {
            host: "127.0.0.1".to_string(),
            port: 0,
        });
        let addr = first.start().await.expect("bind");

        let second = TelemetryRelay::new(RelaySettings {
            host: "127.0.0.1".to_string(),
            port: addr.port(),
        });
        match second.start().await {
            Err(TunnelError::Transport(_)) => {}
            other => panic!("expected transport error, got {:?}", other),
        }

        first.stop().await;
    }

    #[tokio::test]
    async fn control_stream_is_taken_once() {
        let relay = TelemetryRelay::new(RelaySettings::default());
        assert!(relay.take_control_events().is_some());
        assert!(relay.take_control_events().is_none());
    }
}
