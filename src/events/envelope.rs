use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::FrameError;

/// Locally synthesized once a connection is open.
pub const CONNECTED: &str = "connected";
/// Locally synthesized whenever the active connection closes.
pub const DISCONNECTED: &str = "disconnected";
/// Server-side error report.
pub const ERROR: &str = "error";

const TYPE_FIELD: &str = "type";
const ACCOUNT_FIELD: &str = "accountId";

/// Tenant marker carried by an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantTag {
    /// No `accountId` (absent, null or empty)
    Unscoped,
    Account(String),
    /// `accountId` present but not a string; never matches an identity
    Invalid,
}

/// A parsed inbound message: `{ "type": ..., "accountId"?: ..., ..payload }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct InboundEnvelope {
    body: Map<String, Value>,
    #[serde(skip)]
    event_type: String,
    #[serde(skip)]
    tenant: TenantTag,
}

impl InboundEnvelope {
    /// Parse a text frame. Anything but a JSON object with a non-empty string
    /// `type` is rejected.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text).map_err(FrameError::InvalidJson)?;
        match value {
            Value::Object(body) => Self::from_object(body),
            _ => Err(FrameError::NotAnObject),
        }
    }

    pub fn from_object(body: Map<String, Value>) -> Result<Self, FrameError> {
        let event_type = match body.get(TYPE_FIELD) {
            Some(Value::String(t)) if !t.is_empty() => t.clone(),
            _ => return Err(FrameError::MissingType),
        };

        let tenant = match body.get(ACCOUNT_FIELD) {
            None | Some(Value::Null) => TenantTag::Unscoped,
            Some(Value::String(id)) if id.is_empty() => TenantTag::Unscoped,
            Some(Value::String(id)) => TenantTag::Account(id.clone()),
            Some(_) => TenantTag::Invalid,
        };

        Ok(Self {
            body,
            event_type,
            tenant,
        })
    }

    /// Event that never came from the wire, e.g. `connected`.
    pub fn local(event_type: &str) -> Self {
        let mut body = Map::new();
        body.insert(TYPE_FIELD.to_string(), Value::String(event_type.to_string()));
        Self {
            body,
            event_type: event_type.to_string(),
            tenant: TenantTag::Unscoped,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn tenant(&self) -> &TenantTag {
        &self.tenant
    }

    pub fn account_id(&self) -> Option<&str> {
        match &self.tenant {
            TenantTag::Account(id) => Some(id),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.body.get(field)
    }

    /// The full message, including `type` and `accountId`.
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }
}
