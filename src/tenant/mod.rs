//! Client-side tenant isolation.
//!
//! Every inbound event that names an account must name the identity the
//! current connection was opened for. This is a second line of defense for a
//! server that may fan some event types out across tenants; it does not make
//! the connection an isolation boundary, which has to be enforced upstream.
//!
//! Locally synthesized lifecycle events and server error reports are global
//! and pass unconditionally.

use crate::events::{InboundEnvelope, TenantTag, CONNECTED, DISCONNECTED, ERROR};

/// Event types exempt from tenant filtering
pub const GLOBAL_EVENT_TYPES: [&str; 3] = [CONNECTED, DISCONNECTED, ERROR];

pub fn is_global(event_type: &str) -> bool {
    GLOBAL_EVENT_TYPES.contains(&event_type)
}

/// Outcome of checking an event against the bound identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Global,
    Unscoped,
    SameAccount,
    ForeignAccount,
}

impl Admission {
    pub fn is_admitted(self) -> bool {
        !matches!(self, Admission::ForeignAccount)
    }
}

/// Decide whether `envelope` may reach subscribers of a connection bound to
/// `bound_identity`.
pub fn admit(envelope: &InboundEnvelope, bound_identity: &str) -> Admission {
    if is_global(envelope.event_type()) {
        return Admission::Global;
    }

    match envelope.tenant() {
        TenantTag::Unscoped => Admission::Unscoped,
        TenantTag::Account(id) if id == bound_identity => Admission::SameAccount,
        TenantTag::Account(_) | TenantTag::Invalid => Admission::ForeignAccount,
    }
}
