//! Frame relay gateway
//!
//! Tracks which frame sources (remote webcams) are reachable, lets viewers
//! pair with them by a shared code, and relays frames from a source to each
//! viewer that asked for its stream.
//!
//! # Example
//!
//! ```no_run
//! use frame_relay::{RelayServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> frame_relay::Result<()> {
//!     let server = RelayServer::new(ServerConfig::default());
//!     server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! }
//! ```

pub mod error;
pub mod gateway;
pub mod registry;
pub mod relay;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use gateway::Gateway;
pub use registry::{ConnectionRegistry, RegistryConfig};
pub use relay::RelayHub;
pub use server::{RelayServer, ServerConfig};
