mod core;
mod driver;
mod handle;
mod reconnect;
mod state;

pub use core::RealtimeClient;
pub use state::{ClientStatus, CloseReason, ConnectionState};
