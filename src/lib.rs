pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod global;
pub mod metrics;
pub mod telemetry;
pub mod tenant;
pub mod transport;

pub use client::{ClientStatus, CloseReason, ConnectionState, RealtimeClient};
pub use error::{RealtimeError, Result};
pub use events::{InboundEnvelope, Listener};
pub use global::{install, realtime};
