//! Connection handle and related types

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::transport::{TransportCommand, TransportEvent, TransportLink};

/// The live transport plus the identity it was opened for.
///
/// Owned exclusively by the event loop. A handle is ended either by the
/// transport (its events report `Closed`) or by [`close_by_client`], which
/// consumes it so that nothing it emits afterwards is ever observed. That is
/// what keeps a self-initiated close from reaching the reconnect logic.
///
/// [`close_by_client`]: ConnectionHandle::close_by_client
pub(crate) struct ConnectionHandle {
    pub id: Uuid,
    pub identity_id: String,
    pub created_at: DateTime<Utc>,
    pub opened_at: Option<DateTime<Utc>>,
    commands: mpsc::UnboundedSender<TransportCommand>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl ConnectionHandle {
    pub fn new(identity_id: String, link: TransportLink) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity_id,
            created_at: Utc::now(),
            opened_at: None,
            commands: link.commands,
            events: link.events,
        }
    }

    pub fn is_bound_to(&self, identity_id: &str) -> bool {
        self.identity_id == identity_id
    }

    pub fn mark_opened(&mut self) {
        self.opened_at = Some(Utc::now());
    }

    /// Next transport event. A transport that went away without reporting
    /// counts as an abnormal close.
    pub async fn next_event(&mut self) -> TransportEvent {
        match self.events.recv().await {
            Some(event) => event,
            None => TransportEvent::Closed {
                code: None,
                reason: "transport dropped".to_string(),
            },
        }
    }

    /// Hand a serialized message to the transport. Returns false if the
    /// transport is already gone.
    pub fn send(&self, text: String) -> bool {
        self.commands.send(TransportCommand::Send(text)).is_ok()
    }

    /// Close as self-initiated.
    pub fn close_by_client(self) {
        let _ = self.commands.send(TransportCommand::Close);
        tracing::debug!(
            connection_id = %self.id,
            identity_id = %self.identity_id,
            "Connection closed by client"
        );
    }
}
