//! Source records and listing rows
//!
//! This module defines the per-source state stored in the registry.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::identity::{ConnectionId, SourceId};

/// Reachability of a source as shown in listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    /// A live connection is registered for the source
    Online,
    /// Known, but no live connection
    Offline,
}

/// A source with a live transport connection
#[derive(Debug, Clone)]
pub struct ConnectedSource {
    /// Addressable identity (durable id when reconciled, else the connection id)
    pub identity: SourceId,

    /// Transport session currently serving this identity
    pub connection: ConnectionId,

    /// Name shown to viewers
    pub display_name: String,

    /// Remote peer address
    pub address: Option<SocketAddr>,

    /// Capabilities announced at registration (e.g. "webcam" → true)
    pub capabilities: HashMap<String, bool>,

    /// Code presented at registration, if any
    pub pairing_code: Option<String>,

    /// When the source registered
    pub connected_at: Instant,

    /// Last frame or heartbeat (monotonic, for liveness)
    pub last_seen: Instant,

    /// Last frame or heartbeat (wall clock, for listings)
    pub last_seen_at: DateTime<Utc>,
}

impl ConnectedSource {
    /// Refresh liveness
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
        self.last_seen_at = Utc::now();
    }

    /// Check if the source has been silent longer than `window` at `now`
    pub fn is_stale(&self, now: Instant, window: std::time::Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > window
    }
}

/// A durably registered source
#[derive(Debug, Clone)]
pub struct RegisteredSource {
    pub durable_id: SourceId,
    pub display_name: String,
    pub pairing_code: String,
    pub status: SourceStatus,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
}

impl RegisteredSource {
    pub(super) fn new(durable_id: SourceId, display_name: String, pairing_code: String) -> Self {
        Self {
            durable_id,
            display_name,
            pairing_code,
            status: SourceStatus::Offline,
            last_seen_at: None,
            registered_at: Utc::now(),
        }
    }

    pub(super) fn mark_online(&mut self) {
        self.status = SourceStatus::Online;
        self.last_seen_at = Some(Utc::now());
    }

    pub(super) fn mark_offline(&mut self) {
        self.status = SourceStatus::Offline;
        self.last_seen_at = Some(Utc::now());
    }
}

/// One row of the registry listing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub id: SourceId,
    pub name: String,
    pub ip: Option<String>,
    pub status: SourceStatus,
    pub last_seen: Option<DateTime<Utc>>,
}

impl From<&ConnectedSource> for RegistryEntry {
    fn from(source: &ConnectedSource) -> Self {
        Self {
            id: source.identity.clone(),
            name: source.display_name.clone(),
            ip: source.address.map(|addr| addr.ip().to_string()),
            status: SourceStatus::Online,
            last_seen: Some(source.last_seen_at),
        }
    }
}

impl From<&RegisteredSource> for RegistryEntry {
    fn from(source: &RegisteredSource) -> Self {
        Self {
            id: source.durable_id.clone(),
            name: source.display_name.clone(),
            ip: None,
            status: source.status,
            last_seen: source.last_seen_at,
        }
    }
}

/// Outcome of a live registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Identity the connection is now addressable by
    pub identity: SourceId,

    /// Name the source is listed under
    pub display_name: String,

    /// Whether the connection took over a durable identity
    pub reconciled: bool,

    /// Previous live connection for the same identity, now replaced
    pub superseded: Option<ConnectionId>,

    /// Identity this connection served before re-registering, if any
    pub previous_identity: Option<SourceId>,
}

/// A source removed from the live set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub identity: SourceId,
    pub connection: ConnectionId,
}
