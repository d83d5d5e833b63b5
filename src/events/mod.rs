//! Inbound message model and the subscriber registry.

mod envelope;
mod registry;

pub use envelope::{InboundEnvelope, TenantTag, CONNECTED, DISCONNECTED, ERROR};
pub use registry::{Listener, SubscriptionRegistry};
