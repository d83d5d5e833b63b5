use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;

use ara_realtime_client::auth::{MemorySessionProvider, Session, SessionProvider, TokenSessionProvider};
use ara_realtime_client::config::{SessionConfig, Settings};
use ara_realtime_client::events::{CONNECTED, DISCONNECTED, ERROR};
use ara_realtime_client::telemetry::init_tracing;
use ara_realtime_client::{install, ConnectionState, InboundEnvelope, RealtimeClient};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;
    init_tracing(&settings.logging);
    tracing::info!(endpoint = %settings.realtime.endpoint, "Configuration loaded");

    let provider = session_provider(&settings.session);
    let client = install(RealtimeClient::from_settings(&settings, provider))?;

    for event_type in [CONNECTED, DISCONNECTED, ERROR]
        .into_iter()
        .map(str::to_string)
        .chain(settings.tail.events.iter().cloned())
    {
        client.on(event_type, log_event);
    }

    // Mirror state transitions into the log
    let mut status = client.watch_status();
    let status_task = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = status.borrow_and_update().clone();
            tracing::info!(
                state = ?current.state,
                identity_id = ?current.identity_id,
                reconnect_attempts = current.reconnect_attempts,
                "Realtime status changed"
            );
        }
    });

    client.connect()?;
    shutdown_signal().await;

    client.disconnect()?;
    let mut closed = client.watch_status();
    let _ = tokio::time::timeout(
        Duration::from_secs(1),
        closed.wait_for(|status| matches!(status.state, ConnectionState::Closed(_))),
    )
    .await;
    status_task.abort();

    tracing::info!("realtime-tail stopped");
    Ok(())
}

fn session_provider(config: &SessionConfig) -> Arc<dyn SessionProvider> {
    match (&config.token, &config.identity_id) {
        (Some(token), Some(identity_id)) => Arc::new(MemorySessionProvider::new(
            Session::authenticated(token.clone(), identity_id.clone()),
        )),
        (token, _) => Arc::new(TokenSessionProvider::new(token.clone())),
    }
}

fn log_event(event: &InboundEnvelope) {
    tracing::info!(
        event_type = %event.event_type(),
        account_id = ?event.account_id(),
        body = %serde_json::Value::Object(event.body().clone()),
        "Event received"
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, disconnecting");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, disconnecting");
        }
    }
}
