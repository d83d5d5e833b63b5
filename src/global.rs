//! Process-wide client accessor.
//!
//! Application code that has no handle threaded through to it can reach the
//! installed client here. Installing is a one-time startup step.

use std::sync::OnceLock;

use crate::client::RealtimeClient;
use crate::error::{RealtimeError, Result};

static CLIENT: OnceLock<RealtimeClient> = OnceLock::new();

/// Make `client` the process-wide instance.
pub fn install(client: RealtimeClient) -> Result<&'static RealtimeClient> {
    CLIENT
        .set(client)
        .map_err(|_| RealtimeError::AlreadyInstalled)?;
    realtime().ok_or(RealtimeError::AlreadyInstalled)
}

/// The installed client, if any.
pub fn realtime() -> Option<&'static RealtimeClient> {
    CLIENT.get()
}
