use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use dashmap::DashMap;

use crate::metrics::DispatchMetrics;

use super::InboundEnvelope;

type Callback = dyn Fn(&InboundEnvelope) + Send + Sync;

/// A registered callback.
///
/// Equality is identity: clones of one `Listener` are equal, two listeners
/// built from identical closures are not. Keep the value returned by
/// `RealtimeClient::on` (or the one you registered) to remove it later.
#[derive(Clone)]
pub struct Listener(Arc<Callback>);

impl Listener {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&InboundEnvelope) + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    fn call(&self, envelope: &InboundEnvelope) {
        (self.0)(envelope)
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Arc::as_ptr(&self.0))
    }
}

/// Event type -> callbacks, in registration order.
#[derive(Default)]
pub struct SubscriptionRegistry {
    listeners: DashMap<String, Vec<Listener>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener. Registering the same listener twice delivers twice.
    pub fn on(&self, event_type: impl Into<String>, listener: Listener) {
        self.listeners
            .entry(event_type.into())
            .or_default()
            .push(listener);
    }

    /// Remove the first registration of `listener` for `event_type`.
    ///
    /// Returns whether anything was removed.
    pub fn off(&self, event_type: &str, listener: &Listener) -> bool {
        let removed = match self.listeners.get_mut(event_type) {
            Some(mut entries) => match entries.iter().position(|l| l == listener) {
                Some(index) => {
                    entries.remove(index);
                    true
                }
                None => false,
            },
            None => false,
        };

        if removed {
            self.listeners
                .remove_if(event_type, |_, entries| entries.is_empty());
        }
        removed
    }

    /// Deliver `envelope` to every listener for its type, in order.
    ///
    /// Listeners run on the caller's thread. The registry lock is released
    /// before the first call, so a listener may register or remove listeners;
    /// such changes apply from the next event. A panicking listener is logged
    /// and the remaining listeners still run.
    ///
    /// Returns the number of listeners that returned without panicking.
    pub fn emit(&self, envelope: &InboundEnvelope) -> usize {
        let snapshot = match self.listeners.get(envelope.event_type()) {
            Some(entries) => entries.value().clone(),
            None => return 0,
        };

        let mut delivered = 0;
        for listener in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener.call(envelope))).is_ok() {
                delivered += 1;
            } else {
                DispatchMetrics::record_listener_panic();
                tracing::error!(
                    event_type = %envelope.event_type(),
                    listener = ?listener,
                    "Listener panicked while handling event"
                );
            }
        }

        DispatchMetrics::record_dispatched(delivered);
        delivered
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.listeners
            .get(event_type)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }
}
