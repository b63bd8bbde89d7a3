//! Connection and relay session state

pub mod context;
pub mod stream;

pub use context::ConnectionContext;
pub use stream::{RelaySession, RelayState, SessionKey};
