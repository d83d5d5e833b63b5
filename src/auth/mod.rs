mod claims;
mod jwt;
mod session;

pub use claims::Claims;
pub use jwt::TokenSessionProvider;
pub use session::{Credentials, MemorySessionProvider, Session, SessionProvider};
