//! Socket.IO transport against a scripted local WebSocket server.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;

use market_chat::adapters::{EventRegistry, SocketIoTransport};
use market_chat::application::ConnectionManager;
use market_chat::domain::chat::{ChatEvent, ConnectionState};
use market_chat::domain::foundation::{AuthToken, ChatId, CredentialStore};
use market_chat::ports::{ClientAction, Transport, TransportError};

type ServerWs = WebSocketStream<TcpStream>;

const OPEN: &str =
    r#"0{"sid":"eio-1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

// =============================================================================
// Scripted server
// =============================================================================

/// Accepts one WebSocket connection and runs `script` on it.
async fn serve_once<F, Fut, T>(script: F) -> (SocketIoTransport, JoinHandle<T>)
where
    F: FnOnce(ServerWs) -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    serve_once_with_timeout(Duration::from_secs(2), script).await
}

async fn serve_once_with_timeout<F, Fut, T>(
    handshake_timeout: Duration,
    script: F,
) -> (SocketIoTransport, JoinHandle<T>)
where
    F: FnOnce(ServerWs) -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        script(ws).await
    });

    let endpoint =
        SocketIoTransport::endpoint_for(&format!("http://{}", addr), "/socket.io/").unwrap();
    (SocketIoTransport::new(endpoint, handshake_timeout), handle)
}

async fn recv_text(ws: &mut ServerWs) -> Option<String> {
    while let Some(frame) = ws.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => return Some(text.as_str().to_string()),
            Ok(WsMessage::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}

async fn send_text(ws: &mut ServerWs, frame: &str) {
    ws.send(WsMessage::Text(frame.to_string().into()))
        .await
        .unwrap();
}

/// Plays the server side of the namespace handshake. Returns the client's
/// connect frame.
async fn accept_namespace(ws: &mut ServerWs, open: &str) -> String {
    send_text(ws, open).await;
    let connect = recv_text(ws).await.unwrap();
    send_text(ws, r#"40{"sid":"sock-1"}"#).await;
    connect
}

fn token() -> AuthToken {
    AuthToken::new("jwt-123").unwrap()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn handshake_events_and_actions_flow_over_the_link() {
    let (transport, server) = serve_once(|mut ws| async move {
        let connect = accept_namespace(&mut ws, OPEN).await;

        send_text(
            &mut ws,
            r#"42["new_message",{"chatId":"c-1","message":{"_id":"m-1","sender":{"_id":"farmer-1","name":"Ravi"},"content":"hi","type":"text","timestamp":"2024-03-01T09:05:00.000Z"}}]"#,
        )
        .await;

        let join = recv_text(&mut ws).await.unwrap();

        send_text(&mut ws, "2").await;
        let pong = recv_text(&mut ws).await.unwrap();

        send_text(&mut ws, r#"42["messages_read",{"chatId":"c-1","readBy":"farmer-1"}]"#).await;
        let goodbye = recv_text(&mut ws).await;

        (connect, join, pong, goodbye)
    })
    .await;

    let mut link = transport.open(&token()).await.unwrap();

    match link.events.recv().await.unwrap() {
        ChatEvent::NewMessage(e) => {
            assert_eq!(e.chat_id.as_str(), "c-1");
            assert_eq!(e.message.content, "hi");
        }
        other => panic!("unexpected event {:?}", other),
    }

    link.sink
        .submit(ClientAction::JoinChat {
            chat_id: ChatId::new("c-1").unwrap(),
        })
        .unwrap();

    assert!(matches!(
        link.events.recv().await.unwrap(),
        ChatEvent::MessagesRead(_)
    ));
    link.sink.close();

    let (connect, join, pong, goodbye) = server.await.unwrap();
    assert_eq!(connect, r#"40{"token":"jwt-123"}"#);
    assert_eq!(join, r#"42["join_chat","c-1"]"#);
    assert_eq!(pong, "3");
    assert_eq!(goodbye.as_deref(), Some("41"));
}

#[tokio::test]
async fn connect_error_is_a_rejection() {
    let (transport, _server) = serve_once(|mut ws| async move {
        send_text(&mut ws, OPEN).await;
        let _connect = recv_text(&mut ws).await;
        send_text(&mut ws, r#"44{"message":"Authentication failed"}"#).await;
        // Keep the socket open until the client goes away
        let _ = recv_text(&mut ws).await;
    })
    .await;

    let err = transport.open(&token()).await.unwrap_err();

    assert_eq!(err, TransportError::Rejected("Authentication failed".to_string()));
}

#[tokio::test]
async fn silent_server_times_out_the_handshake() {
    let (transport, _server) =
        serve_once_with_timeout(Duration::from_millis(200), |mut ws| async move {
            let _ = recv_text(&mut ws).await;
        })
        .await;

    let err = transport.open(&token()).await.unwrap_err();

    assert!(matches!(err, TransportError::Timeout { .. }));
}

#[tokio::test]
async fn missed_heartbeat_closes_the_link() {
    let short_heartbeat =
        r#"0{"sid":"eio-1","upgrades":[],"pingInterval":100,"pingTimeout":100,"maxPayload":1000000}"#;
    let (transport, _server) = serve_once(move |mut ws| async move {
        accept_namespace(&mut ws, short_heartbeat).await;
        // Never ping
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(ws);
    })
    .await;

    let mut link = transport.open(&token()).await.unwrap();

    let ended = tokio::time::timeout(Duration::from_secs(2), link.events.recv()).await;
    assert!(matches!(ended, Ok(None)));
}

#[tokio::test]
async fn server_disconnect_moves_manager_to_disconnected() {
    let (transport, _server) = serve_once(|mut ws| async move {
        accept_namespace(&mut ws, OPEN).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        send_text(&mut ws, "41").await;
        let _ = recv_text(&mut ws).await;
    })
    .await;

    let manager = ConnectionManager::new(
        Arc::new(transport),
        EventRegistry::new(),
        Arc::new(CredentialStore::new()),
    );
    let mut states = manager.watch();

    let state = manager.connect(token()).await;
    assert_eq!(state, ConnectionState::Connected);

    let reached = tokio::time::timeout(
        Duration::from_secs(2),
        states.wait_for(|s| *s == ConnectionState::Disconnected),
    )
    .await;
    assert!(matches!(reached, Ok(Ok(_))));
    assert!(!manager.is_connected());
}
