//! Relay server
//!
//! HTTP listing/registration endpoints and the WebSocket transport.

pub mod config;
pub mod http;
pub mod listener;
pub mod websocket;

pub use config::ServerConfig;
pub use http::{router, AppError, AppState};
pub use listener::RelayServer;
