//! Connection context
//!
//! Per-connection information handed to the gateway with every event.

use std::net::SocketAddr;
use std::time::Instant;

use crate::registry::ConnectionId;

#[derive(Debug, Clone)]
pub struct ConnectionContext {
    /// Transport session id
    pub connection: ConnectionId,

    /// Remote peer address, when the transport exposes it
    pub peer_addr: Option<SocketAddr>,

    /// When the connection was accepted
    pub connected_at: Instant,
}

impl ConnectionContext {
    /// Create a context for a freshly accepted connection
    pub fn new(peer_addr: Option<SocketAddr>) -> Self {
        Self {
            connection: ConnectionId::generate(),
            peer_addr,
            connected_at: Instant::now(),
        }
    }

    /// Connection age
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}
