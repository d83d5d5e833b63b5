use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::Instrument;

use crate::config::AuthMode;
use crate::error::RealtimeError;

use super::{
    Frame, OpenRequest, Transport, TransportCommand, TransportEvent, TransportLink,
    CLOSE_ABNORMAL, CLOSE_FORBIDDEN, CLOSE_NO_STATUS, CLOSE_UNAUTHORIZED,
};

/// WebSocket transport over tokio-tungstenite.
///
/// Each `open` spawns one task that owns the socket for its whole life.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, request: OpenRequest) -> TransportLink {
        let (link, commands, events) = TransportLink::pair();
        let span = tracing::info_span!(
            "ws.transport",
            identity_id = %request.identity_id,
            endpoint = %request.endpoint
        );
        tokio::spawn(run_socket(request, commands, events).instrument(span));
        link
    }
}

/// Build the handshake request, carrying the token as configured.
pub(crate) fn build_request(request: &OpenRequest) -> Result<Request, RealtimeError> {
    let mut ws_request = request
        .endpoint
        .as_str()
        .into_client_request()
        .map_err(|e| RealtimeError::Transport(format!("Invalid endpoint: {}", e)))?;

    let (name, value) = match request.auth_mode {
        AuthMode::Subprotocol => (header::SEC_WEBSOCKET_PROTOCOL, request.token.clone()),
        AuthMode::Header => (header::AUTHORIZATION, format!("Bearer {}", request.token)),
    };
    let value = HeaderValue::from_str(&value)
        .map_err(|_| RealtimeError::Transport("Token is not a valid header value".to_string()))?;
    ws_request.headers_mut().insert(name, value);

    Ok(ws_request)
}

/// Close code to report for a failed handshake.
///
/// An HTTP 401/403 answer is the handshake-time equivalent of an auth
/// rejection close, so it maps onto the same codes.
fn handshake_close_code(error: &WsError) -> u16 {
    match error {
        WsError::Http(response) => match response.status() {
            StatusCode::UNAUTHORIZED => CLOSE_UNAUTHORIZED,
            StatusCode::FORBIDDEN => CLOSE_FORBIDDEN,
            _ => CLOSE_ABNORMAL,
        },
        _ => CLOSE_ABNORMAL,
    }
}

fn report_closed(events: &mpsc::UnboundedSender<TransportEvent>, code: u16, reason: String) {
    // The client may already have released this link
    let _ = events.send(TransportEvent::Closed {
        code: Some(code),
        reason,
    });
}

async fn run_socket(
    request: OpenRequest,
    mut commands: mpsc::UnboundedReceiver<TransportCommand>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let ws_request = match build_request(&request) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "Cannot build WebSocket request");
            report_closed(&events, CLOSE_ABNORMAL, e.to_string());
            return;
        }
    };

    let connect = connect_async(ws_request);
    tokio::pin!(connect);

    // A Close command (or the link being dropped) abandons the handshake
    let socket = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok((socket, _response)) => break socket,
                Err(e) => {
                    let code = handshake_close_code(&e);
                    tracing::warn!(error = %e, code, "WebSocket handshake failed");
                    report_closed(&events, code, e.to_string());
                    return;
                }
            },
            command = commands.recv() => match command {
                Some(TransportCommand::Send(_)) => {
                    tracing::debug!("Dropping outbound message sent before open");
                }
                Some(TransportCommand::Close) | None => {
                    tracing::debug!("Handshake abandoned by client");
                    return;
                }
            },
        }
    };

    tracing::debug!("WebSocket handshake completed");
    if events.send(TransportEvent::Opened).is_err() {
        return;
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(TransportCommand::Send(text)) => {
                    if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                        tracing::warn!(error = %e, "WebSocket send failed");
                        report_closed(&events, CLOSE_ABNORMAL, e.to_string());
                        return;
                    }
                }
                Some(TransportCommand::Close) | None => {
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: "client closing".into(),
                    };
                    if let Err(e) = ws_sender.send(Message::Close(Some(frame))).await {
                        tracing::debug!(error = %e, "Close frame not delivered");
                    }
                    return;
                }
            },
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(TransportEvent::Frame(Frame::Text(text.as_str().to_owned())));
                }
                Some(Ok(Message::Binary(data))) => {
                    let _ = events.send(TransportEvent::Frame(Frame::Binary(data.to_vec())));
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(f) => (u16::from(f.code), f.reason.as_str().to_owned()),
                        None => (CLOSE_NO_STATUS, String::new()),
                    };
                    tracing::debug!(code, reason = %reason, "Received close frame");
                    report_closed(&events, code, reason);
                    return;
                }
                // Ping/pong are answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "WebSocket receive error");
                    report_closed(&events, CLOSE_ABNORMAL, e.to_string());
                    return;
                }
                None => {
                    report_closed(&events, CLOSE_ABNORMAL, "stream ended".to_string());
                    return;
                }
            },
        }
    }
}
