//! The connection event loop.
//!
//! One task owns all connection state: the current handle, the reconnect
//! timer and the reconnect budget. Caller commands, session lookups, transport
//! events and the timer are all serialized through it, so every transition in
//! `state.rs` runs to completion before the next one starts.

use std::future::pending;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, Sleep};

use crate::auth::{Credentials, Session, SessionProvider};
use crate::config::{AuthMode, RealtimeConfig, ReconnectConfig};
use crate::error::FrameError;
use crate::events::{InboundEnvelope, SubscriptionRegistry, CONNECTED, DISCONNECTED};
use crate::metrics::{ConnectionMetrics, FrameMetrics};
use crate::tenant;
use crate::transport::{
    is_auth_rejection, Frame, OpenRequest, Transport, TransportEvent, CLOSE_ABNORMAL,
    CLOSE_NORMAL,
};

use super::handle::ConnectionHandle;
use super::reconnect::ReconnectState;
use super::state::{ClientStatus, CloseReason, ConnectionState};

#[derive(Debug)]
pub(crate) enum Command {
    Connect,
    Disconnect,
    Send(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LookupOrigin {
    /// `connect()` from outside
    Caller,
    /// The reconnect timer
    Retry,
}

struct ResolvedSession {
    seq: u64,
    origin: LookupOrigin,
    session: Session,
}

enum Phase {
    Unauthenticated,
    Connecting(ConnectionHandle),
    Open(ConnectionHandle),
    /// `None` once the timer has fired and the follow-up lookup is in flight
    Reconnecting(Option<Pin<Box<Sleep>>>),
    Closed(CloseReason),
}

impl Phase {
    fn state(&self) -> ConnectionState {
        match self {
            Phase::Unauthenticated => ConnectionState::Unauthenticated,
            Phase::Connecting(_) => ConnectionState::Connecting,
            Phase::Open(_) => ConnectionState::Open,
            Phase::Reconnecting(_) => ConnectionState::Reconnecting,
            Phase::Closed(reason) => ConnectionState::Closed(*reason),
        }
    }

    fn handle(&self) -> Option<&ConnectionHandle> {
        match self {
            Phase::Connecting(handle) | Phase::Open(handle) => Some(handle),
            _ => None,
        }
    }
}

enum Wakeup {
    Transport(TransportEvent),
    ReconnectDue,
}

/// Resolves with whatever the current phase is waiting on.
async fn next_wakeup(phase: &mut Phase) -> Wakeup {
    match phase {
        Phase::Connecting(handle) | Phase::Open(handle) => {
            Wakeup::Transport(handle.next_event().await)
        }
        Phase::Reconnecting(Some(timer)) => {
            timer.as_mut().await;
            Wakeup::ReconnectDue
        }
        _ => pending().await,
    }
}

enum Step {
    Command(Command),
    Resolved(ResolvedSession),
    Wakeup(Wakeup),
}

pub(crate) struct Driver {
    endpoint: String,
    auth_mode: AuthMode,
    transport: Arc<dyn Transport>,
    provider: Arc<dyn SessionProvider>,
    registry: Arc<SubscriptionRegistry>,
    commands: mpsc::UnboundedReceiver<Command>,
    lookups_tx: mpsc::UnboundedSender<ResolvedSession>,
    lookups_rx: mpsc::UnboundedReceiver<ResolvedSession>,
    status: watch::Sender<ClientStatus>,
    phase: Phase,
    reconnect: ReconnectState,
    /// Sequence number of the last lookup started
    lookups_started: u64,
    /// Lookups at or below this sequence number are stale
    lookups_settled: u64,
}

impl Driver {
    pub fn new(
        config: &RealtimeConfig,
        reconnect: &ReconnectConfig,
        transport: Arc<dyn Transport>,
        provider: Arc<dyn SessionProvider>,
        registry: Arc<SubscriptionRegistry>,
        commands: mpsc::UnboundedReceiver<Command>,
        status: watch::Sender<ClientStatus>,
    ) -> Self {
        let (lookups_tx, lookups_rx) = mpsc::unbounded_channel();
        Self {
            endpoint: config.endpoint.clone(),
            auth_mode: config.auth_mode,
            transport,
            provider,
            registry,
            commands,
            lookups_tx,
            lookups_rx,
            status,
            phase: Phase::Closed(CloseReason::NeverConnected),
            reconnect: ReconnectState::new(reconnect),
            lookups_started: 0,
            lookups_settled: 0,
        }
    }

    /// Run until every `RealtimeClient` clone has been dropped.
    pub async fn run(mut self) {
        loop {
            let step = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => Step::Command(command),
                    None => break,
                },
                Some(resolved) = self.lookups_rx.recv() => Step::Resolved(resolved),
                wakeup = next_wakeup(&mut self.phase) => Step::Wakeup(wakeup),
            };

            match step {
                Step::Command(Command::Connect) => self.begin_lookup(LookupOrigin::Caller),
                Step::Command(Command::Disconnect) => self.disconnect(),
                Step::Command(Command::Send(text)) => self.send(text),
                Step::Resolved(resolved) => self.apply_session(resolved),
                Step::Wakeup(Wakeup::Transport(event)) => self.on_transport_event(event),
                Step::Wakeup(Wakeup::ReconnectDue) => self.on_reconnect_due(),
            }
        }

        if self.teardown_current() {
            tracing::debug!("Connection released with the last client handle");
        }
        tracing::debug!("Realtime event loop stopped");
    }

    /// Query the session provider off the loop; the answer comes back as a
    /// `ResolvedSession` and is validated against the state at that time.
    fn begin_lookup(&mut self, origin: LookupOrigin) {
        self.lookups_started += 1;
        let seq = self.lookups_started;
        let provider = self.provider.clone();
        let lookups_tx = self.lookups_tx.clone();

        tokio::spawn(async move {
            let session = provider.get_session().await;
            let _ = lookups_tx.send(ResolvedSession {
                seq,
                origin,
                session,
            });
        });
    }

    #[tracing::instrument(
        name = "realtime.session",
        skip_all,
        fields(seq = resolved.seq, origin = ?resolved.origin)
    )]
    fn apply_session(&mut self, resolved: ResolvedSession) {
        // A newer lookup already ran, or disconnect() came after this started
        if resolved.seq <= self.lookups_settled {
            tracing::debug!("Discarding superseded session lookup");
            return;
        }
        self.lookups_settled = resolved.seq;

        let credentials = match resolved.session.credentials() {
            Ok(credentials) => credentials,
            Err(_) => {
                self.enter_unauthenticated();
                return;
            }
        };

        if let Some(handle) = self.phase.handle() {
            if handle.is_bound_to(&credentials.identity_id) {
                tracing::debug!(
                    connection_id = %handle.id,
                    "Connection already active for this identity"
                );
                return;
            }
            tracing::info!(
                from = %handle.identity_id,
                to = %credentials.identity_id,
                "Session identity changed, replacing connection"
            );
        }

        // The budget survives caller connects; only a successful open restores it
        self.open(credentials);
    }

    fn enter_unauthenticated(&mut self) {
        if !matches!(self.phase, Phase::Unauthenticated) {
            tracing::info!("No authenticated session, realtime connection not attempted");
        }
        self.reconnect.reset();
        self.set_phase(Phase::Unauthenticated);
    }

    fn open(&mut self, credentials: Credentials) {
        let closed_previous = self.teardown_current();

        let Credentials { token, identity_id } = credentials;
        let link = self.transport.open(OpenRequest {
            endpoint: self.endpoint.clone(),
            token,
            identity_id: identity_id.clone(),
            auth_mode: self.auth_mode,
        });
        let handle = ConnectionHandle::new(identity_id, link);

        tracing::info!(
            connection_id = %handle.id,
            identity_id = %handle.identity_id,
            endpoint = %self.endpoint,
            "Opening realtime connection"
        );

        self.phase = Phase::Connecting(handle);
        self.publish();
        if closed_previous {
            self.emit_local(DISCONNECTED);
        }
    }

    fn disconnect(&mut self) {
        // Lookups still in flight must not reopen anything
        self.lookups_settled = self.lookups_started;
        self.reconnect.reset();
        self.set_phase(Phase::Closed(CloseReason::Disconnected));
        tracing::info!("Realtime client disconnected by caller");
    }

    fn send(&mut self, text: String) {
        match &self.phase {
            Phase::Open(handle) => {
                if handle.send(text) {
                    FrameMetrics::record_sent();
                } else {
                    FrameMetrics::record_discarded();
                    tracing::debug!(
                        connection_id = %handle.id,
                        "Transport gone, outbound message discarded"
                    );
                }
            }
            other => {
                FrameMetrics::record_discarded();
                tracing::debug!(
                    state = ?other.state(),
                    "Connection not open, outbound message discarded"
                );
            }
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.on_opened(),
            TransportEvent::Frame(frame) => self.on_frame(frame),
            TransportEvent::Closed { code, reason } => self.on_closed(code, reason),
        }
    }

    fn on_opened(&mut self) {
        if !matches!(self.phase, Phase::Connecting(_)) {
            tracing::debug!("Ignoring open notification outside of connecting state");
            return;
        }
        let previous = mem::replace(&mut self.phase, Phase::Closed(CloseReason::NeverConnected));
        if let Phase::Connecting(mut handle) = previous {
            handle.mark_opened();
            let handshake_ms = (chrono::Utc::now() - handle.created_at).num_milliseconds();
            tracing::info!(
                connection_id = %handle.id,
                identity_id = %handle.identity_id,
                handshake_ms,
                "Realtime connection established"
            );

            self.phase = Phase::Open(handle);
            self.reconnect.reset();
            ConnectionMetrics::record_opened();
            self.publish();
            self.emit_local(CONNECTED);
        }
    }

    fn on_frame(&mut self, frame: Frame) {
        let Phase::Open(handle) = &self.phase else {
            tracing::debug!("Ignoring frame received before open");
            return;
        };

        let parsed = match frame {
            Frame::Text(text) => InboundEnvelope::parse(&text),
            Frame::Binary(_) => Err(FrameError::Binary),
        };
        let envelope = match parsed {
            Ok(envelope) => envelope,
            Err(e) => {
                FrameMetrics::record_dropped(e.reason());
                tracing::warn!(
                    connection_id = %handle.id,
                    reason = e.reason(),
                    error = %e,
                    "Dropping inbound frame"
                );
                return;
            }
        };

        if !tenant::admit(&envelope, &handle.identity_id).is_admitted() {
            FrameMetrics::record_cross_tenant();
            tracing::warn!(
                connection_id = %handle.id,
                identity_id = %handle.identity_id,
                event_type = %envelope.event_type(),
                account_id = ?envelope.account_id(),
                "Dropping event addressed to another account"
            );
            return;
        }

        let delivered = self.registry.emit(&envelope);
        tracing::trace!(
            event_type = %envelope.event_type(),
            delivered,
            "Event dispatched"
        );
    }

    #[tracing::instrument(name = "realtime.closed", skip_all, fields(code = ?code))]
    fn on_closed(&mut self, code: Option<u16>, reason: String) {
        let previous = mem::replace(&mut self.phase, Phase::Closed(CloseReason::NeverConnected));
        let handle = match previous {
            Phase::Connecting(handle) | Phase::Open(handle) => handle,
            other => {
                self.phase = other;
                return;
            }
        };
        let code = code.unwrap_or(CLOSE_ABNORMAL);
        ConnectionMetrics::record_closed_by_server();

        let next = if is_auth_rejection(code) {
            ConnectionMetrics::record_auth_rejected();
            tracing::warn!(
                connection_id = %handle.id,
                identity_id = %handle.identity_id,
                reason = %reason,
                "Server rejected the session, re-authentication required"
            );
            Phase::Closed(CloseReason::AuthRejected)
        } else if code == CLOSE_NORMAL {
            tracing::info!(
                connection_id = %handle.id,
                reason = %reason,
                "Server closed the connection"
            );
            Phase::Closed(CloseReason::ServerClosed)
        } else if let Some(delay) = self.reconnect.next_delay() {
            ConnectionMetrics::record_reconnect_scheduled();
            tracing::info!(
                connection_id = %handle.id,
                reason = %reason,
                attempt = self.reconnect.attempts(),
                delay_ms = delay.as_millis() as u64,
                "Connection lost, scheduling reconnect"
            );
            Phase::Reconnecting(Some(Box::pin(sleep(delay))))
        } else {
            ConnectionMetrics::record_reconnects_exhausted();
            tracing::warn!(
                connection_id = %handle.id,
                attempts = self.reconnect.attempts(),
                "Reconnect attempts exhausted, waiting for connect()"
            );
            Phase::Closed(CloseReason::RetriesExhausted)
        };

        self.phase = next;
        self.publish();
        self.emit_local(DISCONNECTED);
    }

    fn on_reconnect_due(&mut self) {
        tracing::debug!(attempt = self.reconnect.attempts(), "Reconnect timer fired");
        self.phase = Phase::Reconnecting(None);
        self.begin_lookup(LookupOrigin::Retry);
    }

    /// Swap in `next`, closing the current handle as self-initiated and
    /// cancelling any pending timer.
    fn set_phase(&mut self, next: Phase) {
        let closed_previous = self.teardown_current();
        self.phase = next;
        self.publish();
        if closed_previous {
            self.emit_local(DISCONNECTED);
        }
    }

    /// Release whatever the current phase holds. Returns true if a handle was
    /// closed, in which case the caller owes subscribers a `disconnected`.
    fn teardown_current(&mut self) -> bool {
        match mem::replace(&mut self.phase, Phase::Closed(CloseReason::Disconnected)) {
            Phase::Connecting(handle) | Phase::Open(handle) => {
                handle.close_by_client();
                ConnectionMetrics::record_closed_by_client();
                true
            }
            Phase::Reconnecting(Some(_)) => {
                tracing::debug!("Pending reconnect cancelled");
                false
            }
            _ => false,
        }
    }

    fn emit_local(&self, event_type: &str) {
        self.registry.emit(&InboundEnvelope::local(event_type));
    }

    fn publish(&self) {
        let state = self.phase.state();
        ConnectionMetrics::set_state(state.as_gauge());

        let handle = self.phase.handle();
        self.status.send_replace(ClientStatus {
            state,
            identity_id: handle.map(|h| h.identity_id.clone()),
            connection_id: handle.map(|h| h.id),
            reconnect_attempts: self.reconnect.attempts(),
            connected_at: handle.and_then(|h| h.opened_at),
        });
    }
}
