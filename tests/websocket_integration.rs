//! End-to-end tests against an in-process WebSocket server

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{header, StatusCode};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

use ara_realtime_client::auth::MemorySessionProvider;
use ara_realtime_client::config::{AuthMode, RealtimeConfig, ReconnectConfig};
use ara_realtime_client::{CloseReason, ConnectionState, RealtimeClient};

const WAIT: Duration = Duration::from_secs(5);

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}/ws", listener.local_addr().unwrap());
    (listener, endpoint)
}

fn client_for(endpoint: String, auth_mode: AuthMode, max_attempts: u32) -> RealtimeClient {
    let sessions = Arc::new(MemorySessionProvider::default());
    sessions.login("t1", "u1");
    RealtimeClient::new(
        &RealtimeConfig {
            endpoint,
            auth_mode,
        },
        &ReconnectConfig {
            max_attempts,
            delay_ms: 50,
        },
        sessions,
    )
}

/// Accept one connection, echoing the token sub-protocol back. Returns the
/// socket and the handshake headers the client sent.
async fn accept(
    listener: &TcpListener,
) -> (WebSocketStream<TcpStream>, Option<String>, Option<String>) {
    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();

    let mut protocol = None;
    let mut authorization = None;
    let callback = |request: &Request, mut response: Response| {
        let headers = request.headers();
        protocol = headers
            .get(header::SEC_WEBSOCKET_PROTOCOL)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Some(value) = headers.get(header::SEC_WEBSOCKET_PROTOCOL) {
            response
                .headers_mut()
                .insert(header::SEC_WEBSOCKET_PROTOCOL, value.clone());
        }
        Ok::<Response, ErrorResponse>(response)
    };

    let socket = accept_hdr_async(stream, callback).await.unwrap();
    (socket, protocol, authorization)
}

async fn wait_for_state(client: &RealtimeClient, state: ConnectionState) {
    let mut status = client.watch_status();
    timeout(WAIT, status.wait_for(|s| s.state == state))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {:?}", state))
        .unwrap();
}

#[tokio::test]
async fn test_session_over_websocket() {
    let (listener, endpoint) = bind().await;
    let client = client_for(endpoint, AuthMode::Subprotocol, 0);

    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on("signal", move |event| {
        let _ = tx.send(event.get("value").cloned());
    });
    client.connect().unwrap();

    let (mut server, protocol, authorization) = accept(&listener).await;
    assert_eq!(protocol.as_deref(), Some("t1"));
    assert!(authorization.is_none());
    wait_for_state(&client, ConnectionState::Open).await;

    for message in [
        json!({ "type": "signal", "accountId": "u1", "value": 1 }),
        json!({ "type": "signal", "accountId": "u2", "value": 2 }),
        json!({ "type": "signal", "value": 3 }),
    ] {
        server
            .send(Message::Text(message.to_string().into()))
            .await
            .unwrap();
    }
    server
        .send(Message::Binary(b"ignored".to_vec().into()))
        .await
        .unwrap();

    let first = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    let second = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(first, Some(json!(1)));
    assert_eq!(second, Some(json!(3)));

    client.send(&json!({ "type": "ack", "value": 3 })).unwrap();
    match timeout(WAIT, server.next()).await.unwrap() {
        Some(Ok(Message::Text(text))) => {
            let sent: Value = serde_json::from_str(text.as_str()).unwrap();
            assert_eq!(sent, json!({ "type": "ack", "value": 3 }));
        }
        other => panic!("expected a text frame, got {:?}", other),
    }

    server
        .send(Message::Close(Some(CloseFrame {
            code: CloseCode::from(4001),
            reason: "token expired".into(),
        })))
        .await
        .unwrap();

    wait_for_state(&client, ConnectionState::Closed(CloseReason::AuthRejected)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_http_unauthorized_handshake_is_auth_rejection() {
    let (listener, endpoint) = bind().await;
    let client = client_for(endpoint, AuthMode::Subprotocol, 5);
    client.connect().unwrap();

    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    let reject = |_: &Request, _: Response| {
        let mut response = ErrorResponse::new(Some("invalid token".to_string()));
        *response.status_mut() = StatusCode::UNAUTHORIZED;
        Err::<Response, ErrorResponse>(response)
    };
    assert!(accept_hdr_async(stream, reject).await.is_err());

    wait_for_state(&client, ConnectionState::Closed(CloseReason::AuthRejected)).await;

    // No retry reaches the server
    assert!(timeout(Duration::from_millis(300), listener.accept())
        .await
        .is_err());
}

#[tokio::test]
async fn test_header_auth_and_reconnect_after_drop() {
    let (listener, endpoint) = bind().await;
    let client = client_for(endpoint, AuthMode::Header, 1);
    client.connect().unwrap();

    let (server, protocol, authorization) = accept(&listener).await;
    assert!(protocol.is_none());
    assert_eq!(authorization.as_deref(), Some("Bearer t1"));
    wait_for_state(&client, ConnectionState::Open).await;

    // Vanish without a close frame
    drop(server);

    let (mut server, _, authorization) = accept(&listener).await;
    assert_eq!(authorization.as_deref(), Some("Bearer t1"));
    wait_for_state(&client, ConnectionState::Open).await;

    client.disconnect().unwrap();
    loop {
        match timeout(WAIT, server.next()).await.unwrap() {
            Some(Ok(Message::Close(frame))) => {
                let frame = frame.unwrap();
                assert_eq!(frame.code, CloseCode::Normal);
                break;
            }
            Some(Ok(_)) => continue,
            other => panic!("expected a close frame, got {:?}", other),
        }
    }
    wait_for_state(&client, ConnectionState::Closed(CloseReason::Disconnected)).await;
}
