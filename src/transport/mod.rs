//! Transport seam between the connection state machine and the network.
//!
//! A [`Transport`] opens one connection per [`OpenRequest`] and hands back a
//! [`TransportLink`]: a command channel into the connection and an event
//! channel out of it. Dropping the link releases the connection; events for a
//! dropped link are never observed.

mod websocket;

pub use websocket::WebSocketTransport;

use std::fmt;

use tokio::sync::mpsc;

use crate::config::AuthMode;

/// Normal closure
pub const CLOSE_NORMAL: u16 = 1000;
/// No status code in the close frame
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Connection lost without a close frame
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Standard "policy violation"
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
/// Vendor code: token missing, invalid or expired
pub const CLOSE_UNAUTHORIZED: u16 = 4001;
/// Vendor code: identity not allowed on this endpoint
pub const CLOSE_FORBIDDEN: u16 = 4003;

/// Close codes after which reconnecting with the same session is pointless
pub const AUTH_REJECTION_CODES: [u16; 3] =
    [CLOSE_UNAUTHORIZED, CLOSE_FORBIDDEN, CLOSE_POLICY_VIOLATION];

pub fn is_auth_rejection(code: u16) -> bool {
    AUTH_REJECTION_CODES.contains(&code)
}

/// Everything needed to open one authenticated connection.
#[derive(Clone)]
pub struct OpenRequest {
    pub endpoint: String,
    pub token: String,
    pub identity_id: String,
    pub auth_mode: AuthMode,
}

impl fmt::Debug for OpenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenRequest")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .field("identity_id", &self.identity_id)
            .field("auth_mode", &self.auth_mode)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed
    Opened,
    Frame(Frame),
    /// Terminal. `code` is `None` when the connection ended without one.
    Closed { code: Option<u16>, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    Send(String),
    Close,
}

/// Both ends of one connection, as seen by the client.
#[derive(Debug)]
pub struct TransportLink {
    pub commands: mpsc::UnboundedSender<TransportCommand>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl TransportLink {
    /// Create a link and the transport-side ends that drive it.
    pub fn pair() -> (
        Self,
        mpsc::UnboundedReceiver<TransportCommand>,
        mpsc::UnboundedSender<TransportEvent>,
    ) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                commands: commands_tx,
                events: events_rx,
            },
            commands_rx,
            events_tx,
        )
    }
}

/// Opens connections. `open` must not block; the handshake runs in the
/// background and reports through the link.
pub trait Transport: Send + Sync + 'static {
    fn open(&self, request: OpenRequest) -> TransportLink;
}
