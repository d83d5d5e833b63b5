//! Observable connection state.
//!
//! Transition table (driven by the event loop in `driver.rs`):
//!
//! | from                       | trigger                              | to                          |
//! |----------------------------|--------------------------------------|-----------------------------|
//! | any                        | lookup: no token/identity            | `Unauthenticated`           |
//! | `Connecting`/`Open` (same) | lookup: same identity                | unchanged                   |
//! | any other                  | lookup: credentials                  | `Connecting`                |
//! | `Connecting`               | transport opened                     | `Open`                      |
//! | `Connecting`/`Open`        | close, auth-rejection code           | `Closed(AuthRejected)`      |
//! | `Connecting`/`Open`        | close, code 1000                     | `Closed(ServerClosed)`      |
//! | `Connecting`/`Open`        | close, other code, budget left       | `Reconnecting`              |
//! | `Connecting`/`Open`        | close, other code, budget spent      | `Closed(RetriesExhausted)`  |
//! | `Reconnecting`             | timer fired                          | `Reconnecting` (lookup)     |
//! | any                        | `disconnect()`                       | `Closed(Disconnected)`      |

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// `connect()` has not opened anything yet
    NeverConnected,
    /// Caller invoked `disconnect()`
    Disconnected,
    /// Server refused the session; needs re-authentication and `connect()`
    AuthRejected,
    /// Reconnect budget spent; needs `connect()`
    RetriesExhausted,
    /// Server closed normally (1000)
    ServerClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum ConnectionState {
    Unauthenticated,
    Connecting,
    Open,
    Reconnecting,
    Closed(CloseReason),
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Numeric value for the state gauge
    pub fn as_gauge(&self) -> i64 {
        match self {
            ConnectionState::Unauthenticated => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Open => 2,
            ConnectionState::Reconnecting => 3,
            ConnectionState::Closed(_) => 4,
        }
    }
}

/// Snapshot published after every transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientStatus {
    pub state: ConnectionState,
    /// Identity the current connection is bound to
    pub identity_id: Option<String>,
    pub connection_id: Option<Uuid>,
    /// Consecutive reconnect attempts since the last successful open
    pub reconnect_attempts: u32,
    pub connected_at: Option<DateTime<Utc>>,
}

impl Default for ClientStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Closed(CloseReason::NeverConnected),
            identity_id: None,
            connection_id: None,
            reconnect_attempts: 0,
            connected_at: None,
        }
    }
}
