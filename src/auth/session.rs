use std::fmt;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::RealtimeError;

/// Snapshot of the caller's authentication state.
///
/// May change between two lookups (login, logout, identity switch).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub identity_id: Option<String>,
}

impl Session {
    pub fn authenticated(token: impl Into<String>, identity_id: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            identity_id: Some(identity_id.into()),
        }
    }

    pub fn unauthenticated() -> Self {
        Self::default()
    }

    /// Validated token and identity, or `MissingCredentials` if either is
    /// absent or empty.
    pub fn credentials(&self) -> Result<Credentials, RealtimeError> {
        match (self.token.as_deref(), self.identity_id.as_deref()) {
            (Some(token), Some(identity_id)) if !token.is_empty() && !identity_id.is_empty() => {
                Ok(Credentials {
                    token: token.to_string(),
                    identity_id: identity_id.to_string(),
                })
            }
            _ => Err(RealtimeError::MissingCredentials),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("identity_id", &self.identity_id)
            .finish()
    }
}

/// A session that is allowed to open a connection.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub identity_id: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("identity_id", &self.identity_id)
            .finish()
    }
}

/// Source of the current session, queried at every connect attempt.
#[async_trait]
pub trait SessionProvider: Send + Sync + 'static {
    async fn get_session(&self) -> Session;
}

/// Settable in-memory session, for wiring a login flow to the client.
#[derive(Debug, Default)]
pub struct MemorySessionProvider {
    session: RwLock<Session>,
}

impl MemorySessionProvider {
    pub fn new(session: Session) -> Self {
        Self {
            session: RwLock::new(session),
        }
    }

    pub fn set(&self, session: Session) {
        let mut current = self.session.write().unwrap_or_else(|e| e.into_inner());
        *current = session;
    }

    pub fn login(&self, token: impl Into<String>, identity_id: impl Into<String>) {
        self.set(Session::authenticated(token, identity_id));
    }

    pub fn logout(&self) {
        self.set(Session::unauthenticated());
    }

    pub fn current(&self) -> Session {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl SessionProvider for MemorySessionProvider {
    async fn get_session(&self) -> Session {
        self.current()
    }
}
