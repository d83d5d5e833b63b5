use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::Instrument;

use crate::auth::SessionProvider;
use crate::config::{RealtimeConfig, ReconnectConfig, Settings};
use crate::error::{RealtimeError, Result};
use crate::events::{InboundEnvelope, Listener, SubscriptionRegistry};
use crate::transport::{Transport, WebSocketTransport};

use super::driver::{Command, Driver};
use super::state::{ClientStatus, ConnectionState};

/// Realtime event client for one process.
///
/// Keeps at most one connection open for the identity the [`SessionProvider`]
/// reports, reconnects after transport failures, drops events addressed to
/// other accounts and fans the rest out to listeners registered with
/// [`on`](Self::on).
///
/// Cloning is cheap; all clones drive the same connection. The connection is
/// released when the last clone is dropped.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use ara_realtime_client::auth::MemorySessionProvider;
/// use ara_realtime_client::client::RealtimeClient;
/// use ara_realtime_client::config::{RealtimeConfig, ReconnectConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let sessions = Arc::new(MemorySessionProvider::default());
/// sessions.login("token", "account-1");
///
/// let client = RealtimeClient::new(
///     &RealtimeConfig::default(),
///     &ReconnectConfig::default(),
///     sessions.clone(),
/// );
/// client.on("signal", |event| println!("{:?}", event.get("value")));
/// client.connect()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RealtimeClient {
    commands: mpsc::UnboundedSender<Command>,
    registry: Arc<SubscriptionRegistry>,
    status: watch::Receiver<ClientStatus>,
}

impl RealtimeClient {
    /// Create a client using the WebSocket transport.
    ///
    /// Must be called from within a tokio runtime. Nothing is opened until
    /// [`connect`](Self::connect).
    pub fn new(
        config: &RealtimeConfig,
        reconnect: &ReconnectConfig,
        provider: Arc<dyn SessionProvider>,
    ) -> Self {
        Self::with_transport(config, reconnect, provider, Arc::new(WebSocketTransport::new()))
    }

    pub fn from_settings(settings: &Settings, provider: Arc<dyn SessionProvider>) -> Self {
        Self::new(&settings.realtime, &settings.reconnect, provider)
    }

    pub fn with_transport(
        config: &RealtimeConfig,
        reconnect: &ReconnectConfig,
        provider: Arc<dyn SessionProvider>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ClientStatus::default());

        let driver = Driver::new(
            config,
            reconnect,
            transport,
            provider,
            registry.clone(),
            commands_rx,
            status_tx,
        );
        tokio::spawn(driver.run().instrument(tracing::info_span!("realtime.client")));

        Self {
            commands: commands_tx,
            registry,
            status: status_rx,
        }
    }

    /// Ensure a connection for the current session.
    ///
    /// Idempotent: the session is looked up again and nothing changes if a
    /// connection for the same identity is already open or opening. With no
    /// authenticated session any existing connection is closed instead.
    pub fn connect(&self) -> Result<()> {
        self.dispatch(Command::Connect)
    }

    /// Close the connection and stop reconnecting until the next `connect()`.
    pub fn disconnect(&self) -> Result<()> {
        self.dispatch(Command::Disconnect)
    }

    /// Serialize `data` as JSON and send it if the connection is open.
    ///
    /// Messages sent while not connected are discarded, not queued.
    pub fn send<T: Serialize + ?Sized>(&self, data: &T) -> Result<()> {
        let text = serde_json::to_string(data)?;
        self.dispatch(Command::Send(text))
    }

    /// Register `callback` for `event_type`. Keep the returned listener to
    /// remove it with [`off`](Self::off).
    pub fn on<F>(&self, event_type: impl Into<String>, callback: F) -> Listener
    where
        F: Fn(&InboundEnvelope) + Send + Sync + 'static,
    {
        let listener = Listener::new(callback);
        self.registry.on(event_type, listener.clone());
        listener
    }

    /// Register an existing listener again, possibly for another type.
    pub fn add_listener(&self, event_type: impl Into<String>, listener: &Listener) {
        self.registry.on(event_type, listener.clone());
    }

    /// Remove the first registration of `listener` for `event_type`.
    pub fn off(&self, event_type: &str, listener: &Listener) -> bool {
        self.registry.off(event_type, listener)
    }

    pub fn is_connected(&self) -> bool {
        self.status.borrow().state.is_open()
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    pub fn status(&self) -> ClientStatus {
        self.status.borrow().clone()
    }

    /// Receiver that observes every status change.
    pub fn watch_status(&self) -> watch::Receiver<ClientStatus> {
        self.status.clone()
    }

    fn dispatch(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| RealtimeError::ClientStopped)
    }
}
