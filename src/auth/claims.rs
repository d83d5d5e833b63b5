use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: i64,
    /// Tenant the token was issued for
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Additional custom claims
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Claims {
    /// Identity that inbound `accountId` values are compared against.
    ///
    /// Tokens scoped to a tenant use the tenant; otherwise the subject.
    pub fn identity_id(&self) -> &str {
        match self.tenant_id.as_deref() {
            Some(tenant) if !tenant.is_empty() => tenant,
            _ => &self.sub,
        }
    }
}
