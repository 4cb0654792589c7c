use crate::driver::config::ViewerSettings;
use futures::{SinkExt, StreamExt};
use log::{info, warn};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tunnelcore::prelude::{TunnelError, TunnelResult};
use tunnelcore::protocol::Envelope;

/// Inbound traffic surfaced by the relay client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected,
    Message(Envelope),
}

/// WebSocket client for viewing a remote relay.
///
/// Reconnects at a fixed interval up to the configured attempt limit, then
/// gives up with a transport error. A successful connection resets the
/// attempt counter. Undecodable inbound frames are logged and skipped.
pub struct RelayClient {
    settings: ViewerSettings,
}

impl RelayClient {
    pub fn new(settings: ViewerSettings) -> Self {
        Self { settings }
    }

    /// Drives the connect/receive/reconnect cycle until cancelled.
    pub async fn run(
        &self,
        events: mpsc::UnboundedSender<ClientEvent>,
        mut outbound: mpsc::UnboundedReceiver<Envelope>,
        cancel: CancellationToken,
    ) -> TunnelResult<()> {
        let mut attempts: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            match connect_async(self.settings.url.as_str()).await {
                Ok((stream, _)) => {
                    info!("connected to relay at {}", self.settings.url);
                    attempts = 0;
                    let _ = events.send(ClientEvent::Connected);
                    if self.drive(stream, &events, &mut outbound, &cancel).await {
                        return Ok(());
                    }
                }
                Err(err) => {
                    warn!("relay connection to {} failed: {}", self.settings.url, err);
                }
            }

            // Send while closed is a drop, not a deferred delivery.
            while let Ok(dropped) = outbound.try_recv() {
                warn!(
                    "not connected to {}, dropping outbound {} frame",
                    self.settings.url,
                    dropped.message.kind()
                );
            }

            attempts += 1;
            if attempts > self.settings.max_reconnect_attempts {
                return Err(TunnelError::Transport(format!(
                    "giving up on {} after {} reconnect attempts",
                    self.settings.url, self.settings.max_reconnect_attempts
                )));
            }

            info!(
                "reconnecting to {} (attempt {}/{})",
                self.settings.url, attempts, self.settings.max_reconnect_attempts
            );
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(self.settings.reconnect_interval_ms)) => {}
                _ = cancel.cancelled() => return Ok(()),
            }
        }
    }

    /// Pumps one live connection; returns true when cancelled for good.
    async fn drive(
        &self,
        stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
        events: &mpsc::UnboundedSender<ClientEvent>,
        outbound: &mut mpsc::UnboundedReceiver<Envelope>,
        cancel: &CancellationToken,
    ) -> bool {
        let (mut ws_tx, mut ws_rx) = stream.split();
        let mut outbound_open = true;

        loop {
            tokio::select! {
                frame = ws_rx.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => match Envelope::from_json(&text) {
                            Ok(envelope) => {
                                let _ = events.send(ClientEvent::Message(envelope));
                            }
                            Err(err) => warn!("undecodable relay frame: {}", err),
                        },
                        Some(Ok(Message::Close(_))) | None => {
                            warn!("relay connection closed");
                            return false;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            warn!("relay transport error: {}", err);
                            return false;
                        }
                    }
                }
                envelope = outbound.recv(), if outbound_open => {
                    match envelope {
                        Some(envelope) => match envelope.to_json() {
                            Ok(text) => {
                                if let Err(err) = ws_tx.send(Message::Text(text)).await {
                                    warn!("relay send failed: {}", err);
                                    return false;
                                }
                            }
                            Err(err) => warn!("failed to encode outbound frame: {}", err),
                        },
                        None => outbound_open = false,
                    }
                }
                _ = cancel.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return true;
                }
            }
        }
    }
}
