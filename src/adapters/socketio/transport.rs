//! Socket.IO transport over tokio-tungstenite.
//!
//! `open` performs the Engine.IO handshake and the namespace connect with
//! the bearer token as auth payload, then hands the socket to a background
//! task that:
//!
//! - answers server pings
//! - decodes event frames into [`ChatEvent`]s
//! - writes submitted actions as event frames
//! - ends the link when the server goes silent past the ping deadline
//!
//! The link's event receiver closes when that task ends.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::domain::chat::ChatEvent;
use crate::domain::foundation::AuthToken;
use crate::ports::{ActionSink, ClientAction, Transport, TransportError, TransportLink};

use super::events::{decode_event, encode_action};
use super::packet::{decode, encode, Handshake, Packet};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Live transport speaking Socket.IO v4 over WebSocket.
#[derive(Debug, Clone)]
pub struct SocketIoTransport {
    endpoint: Url,
    handshake_timeout: Duration,
}

impl SocketIoTransport {
    pub fn new(endpoint: Url, handshake_timeout: Duration) -> Self {
        Self {
            endpoint,
            handshake_timeout,
        }
    }

    /// Builds the WebSocket endpoint from the backend's HTTP base URL.
    ///
    /// `http://host:5000` with path `/socket.io/` becomes
    /// `ws://host:5000/socket.io/?EIO=4&transport=websocket`.
    pub fn endpoint_for(base_url: &str, socket_path: &str) -> Result<Url, TransportError> {
        let mut url = Url::parse(base_url)
            .map_err(|e| TransportError::Unreachable(format!("invalid base url: {}", e)))?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(TransportError::Unreachable(format!(
                    "unsupported scheme: {}",
                    other
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| TransportError::Unreachable("cannot set websocket scheme".to_string()))?;
        url.set_path(socket_path);
        url.query_pairs_mut()
            .clear()
            .append_pair("EIO", "4")
            .append_pair("transport", "websocket");
        Ok(url)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn handshake(&self, token: &AuthToken) -> Result<(WsStream, Handshake), TransportError> {
        let (mut ws, _response) = tokio_tungstenite::connect_async(self.endpoint.as_str())
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;

        let handshake = match next_packet(&mut ws).await? {
            Packet::Open(handshake) => handshake,
            other => {
                return Err(TransportError::Handshake(format!(
                    "expected open packet, got {:?}",
                    other
                )))
            }
        };

        let connect = Packet::Connect(Some(json!({ "token": token.expose() })));
        send_packet(&mut ws, &connect).await?;

        loop {
            match next_packet(&mut ws).await? {
                Packet::Connect(_) => break,
                Packet::ConnectError(payload) => {
                    return Err(TransportError::Rejected(Packet::connect_error_message(
                        &payload,
                    )))
                }
                Packet::Ping => send_packet(&mut ws, &Packet::Pong).await?,
                Packet::Close | Packet::Disconnect => {
                    return Err(TransportError::Handshake(
                        "server closed during handshake".to_string(),
                    ))
                }
                _ => {}
            }
        }

        Ok((ws, handshake))
    }
}

#[async_trait]
impl Transport for SocketIoTransport {
    async fn open(&self, token: &AuthToken) -> Result<TransportLink, TransportError> {
        let (ws, handshake) = tokio::time::timeout(self.handshake_timeout, self.handshake(token))
            .await
            .map_err(|_| TransportError::Timeout {
                timeout_secs: self.handshake_timeout.as_secs(),
            })??;

        tracing::debug!(sid = %handshake.sid, endpoint = %self.endpoint, "Socket.IO link open");

        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        tokio::spawn(drive_link(
            ws,
            action_rx,
            event_tx,
            handshake.heartbeat_deadline(),
        ));

        Ok(TransportLink::new(Box::new(SocketSink::new(action_tx)), event_rx))
    }
}

/// Write half handed to the connection manager.
struct SocketSink {
    actions: Mutex<Option<mpsc::UnboundedSender<ClientAction>>>,
}

impl SocketSink {
    fn new(actions: mpsc::UnboundedSender<ClientAction>) -> Self {
        Self {
            actions: Mutex::new(Some(actions)),
        }
    }
}

impl ActionSink for SocketSink {
    fn submit(&self, action: ClientAction) -> Result<(), TransportError> {
        let guard = self.actions.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(tx) => tx.send(action).map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    fn close(&self) {
        // Dropping the sender tells the io task to disconnect
        self.actions.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}

async fn drive_link(
    mut ws: WsStream,
    mut actions: mpsc::UnboundedReceiver<ClientAction>,
    events: mpsc::UnboundedSender<ChatEvent>,
    heartbeat: Duration,
) {
    let watchdog = tokio::time::sleep(heartbeat);
    tokio::pin!(watchdog);

    loop {
        tokio::select! {
            action = actions.recv() => match action {
                Some(action) => {
                    let chat_id = action.chat_id().clone();
                    if let Err(e) = send_packet(&mut ws, &encode_action(&action)).await {
                        tracing::warn!(chat_id = %chat_id, error = %e, "Failed to write action");
                        break;
                    }
                }
                None => {
                    let _ = send_packet(&mut ws, &Packet::Disconnect).await;
                    let _ = ws.close(None).await;
                    tracing::debug!("Socket.IO link closed by client");
                    return;
                }
            },
            frame = ws.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    watchdog.as_mut().reset(Instant::now() + heartbeat);
                    if !handle_frame(&mut ws, text.as_str(), &events).await {
                        break;
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "WebSocket read failed");
                    break;
                }
            },
            _ = &mut watchdog => {
                tracing::warn!(deadline_ms = heartbeat.as_millis() as u64, "Server ping timeout");
                break;
            }
        }
    }

    let _ = ws.close(None).await;
    tracing::debug!("Socket.IO link closed");
}

/// Returns false when the link should end.
async fn handle_frame(
    ws: &mut WsStream,
    frame: &str,
    events: &mpsc::UnboundedSender<ChatEvent>,
) -> bool {
    match decode(frame) {
        Ok(Packet::Ping) => send_packet(ws, &Packet::Pong).await.is_ok(),
        Ok(Packet::Event { name, data }) => match decode_event(&name, data) {
            Ok(Some(event)) => events.send(event).is_ok(),
            Ok(None) => {
                tracing::debug!(event = %name, "Ignoring unhandled event");
                true
            }
            Err(e) => {
                tracing::warn!(event = %name, error = %e, "Undecodable event payload");
                true
            }
        },
        Ok(Packet::Close) | Ok(Packet::Disconnect) => false,
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Undecodable frame");
            true
        }
    }
}

async fn next_packet(ws: &mut WsStream) -> Result<Packet, TransportError> {
    loop {
        match ws.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                return decode(text.as_str()).map_err(|e| TransportError::Handshake(e.to_string()))
            }
            Some(Ok(WsMessage::Close(_))) | None => return Err(TransportError::Closed),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(TransportError::Handshake(e.to_string())),
        }
    }
}

async fn send_packet(ws: &mut WsStream, packet: &Packet) -> Result<(), TransportError> {
    ws.send(WsMessage::Text(encode(packet).into()))
        .await
        .map_err(|e| TransportError::Handshake(e.to_string()))
}
