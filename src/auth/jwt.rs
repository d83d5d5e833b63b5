use std::sync::RwLock;

use async_trait::async_trait;
use jsonwebtoken::{decode, DecodingKey, Validation};

use super::{Claims, Session, SessionProvider};

/// Session provider that derives the identity from the bearer token itself.
///
/// The signature is not checked here: the server verifies the token during the
/// handshake. The token is only read for its identity and expiry, and an
/// expired or undecodable token yields an unauthenticated session so that no
/// connection is attempted with it.
pub struct TokenSessionProvider {
    token: RwLock<Option<String>>,
    validation: Validation,
}

impl TokenSessionProvider {
    pub fn new(token: Option<String>) -> Self {
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_aud = false;

        Self {
            token: RwLock::new(token),
            validation,
        }
    }

    pub fn set_token(&self, token: Option<String>) {
        let mut current = self.token.write().unwrap_or_else(|e| e.into_inner());
        *current = token;
    }

    pub fn inspect(&self, token: &str) -> Option<Claims> {
        match decode::<Claims>(token, &DecodingKey::from_secret(&[]), &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(error = %e, "Bearer token rejected locally");
                None
            }
        }
    }
}

#[async_trait]
impl SessionProvider for TokenSessionProvider {
    async fn get_session(&self) -> Session {
        let token = self
            .token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let Some(token) = token else {
            return Session::unauthenticated();
        };

        match self.inspect(&token) {
            Some(claims) => {
                let identity_id = claims.identity_id().to_string();
                Session::authenticated(token, identity_id)
            }
            None => Session::unauthenticated(),
        }
    }
}
