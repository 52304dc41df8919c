//! WebSocket pumps: a reader dispatching frames to the controller and a writer
//! draining the outbound queue and sending keepalive pings.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::config::WebSocketConfig;
use crate::session::client::SessionClient;
use crate::session::controller::SessionController;
use crate::session::messages::Envelope;

/// Liveness and sizing limits for one socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketSettings {
    /// Time allowed to write a frame
    pub write_wait: Duration,
    /// Time allowed between pongs before the peer is considered dead
    pub pong_wait: Duration,
    /// Must be shorter than `pong_wait`
    pub ping_period: Duration,
    pub max_message_size: usize,
    pub send_queue: usize,
}

impl SocketSettings {
    pub fn new(write_wait: Duration, pong_wait: Duration) -> Self {
        Self {
            write_wait,
            pong_wait,
            ping_period: pong_wait * 9 / 10,
            ..Self::default()
        }
    }

    pub fn from_config(config: &WebSocketConfig) -> Self {
        Self {
            max_message_size: config.max_message_size,
            send_queue: config.send_queue.max(1),
            ..Self::new(
                Duration::from_secs(config.write_wait_secs),
                Duration::from_secs(config.pong_wait_secs),
            )
        }
    }
}

impl Default for SocketSettings {
    fn default() -> Self {
        let pong_wait = Duration::from_secs(60);
        Self {
            write_wait: Duration::from_secs(10),
            pong_wait,
            ping_period: pong_wait * 9 / 10,
            max_message_size: 4096,
            send_queue: 256,
        }
    }
}

/// Serves an upgraded socket until either side goes away
pub async fn serve_socket(
    socket: WebSocket,
    controller: Arc<SessionController>,
    settings: SocketSettings,
) {
    let (tx, rx) = mpsc::channel(settings.send_queue);
    let client = Arc::new(SessionClient::websocket(tx));
    controller.registry().register_client(client.clone());
    info!(client = %client.id(), "WebSocket connected");

    let (sink, stream) = socket.split();
    let cancel = CancellationToken::new();

    let writer = tokio::spawn(write_pump(sink, rx, settings, cancel.clone()));
    read_pump(stream, &client, &controller, settings, &cancel).await;

    controller.disconnect(&client);
    cancel.cancel();
    if let Err(e) = writer.await {
        error!(client = %client.id(), "Writer task failed: {e:?}");
    }
    info!(client = %client.id(), dropped = client.dropped(), "WebSocket disconnected");
}

async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    client: &Arc<SessionClient>,
    controller: &SessionController,
    settings: SocketSettings,
    cancel: &CancellationToken,
) {
    let mut deadline = Instant::now() + settings.pong_wait;
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = timeout_at(deadline, stream.next()) => frame,
        };
        let message = match frame {
            Err(_) => {
                debug!(client = %client.id(), "No pong within deadline");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                debug!(client = %client.id(), "WebSocket read failed: {e}");
                break;
            }
            Ok(Some(Ok(message))) => message,
        };

        match message {
            WsMessage::Text(text) => {
                let reply = controller.handle_socket(client, text.as_str().as_bytes()).await;
                client.send(reply);
            }
            WsMessage::Binary(bytes) => {
                let reply = controller.handle_socket(client, &bytes).await;
                client.send(reply);
            }
            WsMessage::Pong(_) => {
                deadline = Instant::now() + settings.pong_wait;
                trace!(client = %client.id(), "Received pong");
            }
            // axum answers pings itself
            WsMessage::Ping(_) => {}
            WsMessage::Close(_) => break,
        }
    }
}

async fn write_pump(
    mut sink: SplitSink<WebSocket, WsMessage>,
    mut rx: mpsc::Receiver<Envelope>,
    settings: SocketSettings,
    cancel: CancellationToken,
) {
    let mut ping = tokio::time::interval(settings.ping_period);
    ping.tick().await;

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                match envelope.to_json() {
                    Ok(text) => WsMessage::Text(text.into()),
                    Err(e) => {
                        error!("Failed to serialize envelope: {e:?}");
                        continue;
                    }
                }
            }
            _ = ping.tick() => WsMessage::Ping(Bytes::new()),
        };

        match timeout(settings.write_wait, sink.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!("WebSocket write failed: {e}");
                break;
            }
            Err(_) => {
                debug!("WebSocket write timed out");
                break;
            }
        }
    }

    // stop the reader too if the write side failed first
    cancel.cancel();
    let _ = timeout(settings.write_wait, sink.send(WsMessage::Close(None))).await;
}
