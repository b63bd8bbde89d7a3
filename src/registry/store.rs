//! Connection registry implementation
//!
//! The central registry of live and durably registered sources.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};

use super::config::RegistryConfig;
use super::entry::{
    ConnectedSource, Departure, RegisteredSource, Registration, RegistryEntry,
};
use super::error::RegistryError;
use super::identity::{ConnectionId, SourceId};
use super::pairing::PairingDirectory;

/// Signal broadcast whenever the set of listed sources changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryChanged;

/// Everything guarded by the registry lock
#[derive(Debug, Default)]
struct RegistryState {
    /// Live sources by identity
    connected: HashMap<SourceId, ConnectedSource>,

    /// Live connection → identity it serves
    connections: HashMap<ConnectionId, SourceId>,

    /// Durable records by durable id
    registered: HashMap<SourceId, RegisteredSource>,

    pairing: PairingDirectory,
}

impl RegistryState {
    /// Drop the live source served by `connection`, if any
    fn detach(&mut self, connection: &ConnectionId) -> Option<Departure> {
        let identity = self.connections.remove(connection)?;
        self.connected.remove(&identity);

        if let Some(record) = self.registered.get_mut(&identity) {
            record.mark_offline();
        }

        Some(Departure {
            identity,
            connection: connection.clone(),
        })
    }
}

/// Registry of connected and registered sources
///
/// All state sits behind one `RwLock`: every mutation takes the write lock,
/// so register, remove and reaper sweeps never interleave for an identity.
/// Listings take the read lock and copy rows out.
pub struct ConnectionRegistry {
    state: RwLock<RegistryState>,

    changes: broadcast::Sender<RegistryChanged>,

    config: RegistryConfig,
}

impl ConnectionRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        let (changes, _) = broadcast::channel(config.change_capacity);

        Self {
            state: RwLock::new(RegistryState::default()),
            changes,
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Subscribe to "registry changed" signals
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryChanged> {
        self.changes.subscribe()
    }

    fn notify(&self) {
        // No receivers is fine
        let _ = self.changes.send(RegistryChanged);
    }

    /// Register a live source on `connection`
    ///
    /// A pairing code bound to a durable identity makes the connection take
    /// over that identity; the durable display name wins over `display_name`
    /// and any other live connection serving the identity is superseded.
    /// Without a known code the connection id itself becomes the identity.
    pub async fn register(
        &self,
        connection: &ConnectionId,
        address: Option<SocketAddr>,
        display_name: &str,
        capabilities: HashMap<String, bool>,
        pairing_code: Option<&str>,
    ) -> Registration {
        let mut state = self.state.write().await;

        // Re-registering on the same connection replaces the old registration
        let previous_identity = state.detach(connection).map(|departure| departure.identity);

        let durable = pairing_code.and_then(|code| state.pairing.resolve(code).ok());

        let (identity, name, reconciled) = match durable {
            Some(id) => {
                let name = match state.registered.get_mut(&id) {
                    Some(record) => {
                        record.mark_online();
                        record.display_name.clone()
                    }
                    None => display_name.to_owned(),
                };
                (id, name, true)
            }
            None => (SourceId::from(connection), display_name.to_owned(), false),
        };

        let superseded = state.connected.remove(&identity).map(|previous| {
            state.connections.remove(&previous.connection);
            previous.connection
        });

        let now = Instant::now();
        state.connected.insert(
            identity.clone(),
            ConnectedSource {
                identity: identity.clone(),
                connection: connection.clone(),
                display_name: name.clone(),
                address,
                capabilities,
                pairing_code: pairing_code.map(str::to_owned),
                connected_at: now,
                last_seen: now,
                last_seen_at: Utc::now(),
            },
        );
        state
            .connections
            .insert(connection.clone(), identity.clone());

        drop(state);

        if let Some(ref previous) = superseded {
            tracing::info!(
                source = %identity,
                connection = %connection,
                superseded = %previous,
                "Source reconnected, previous session superseded"
            );
        } else {
            tracing::info!(
                source = %identity,
                connection = %connection,
                name = %name,
                reconciled = reconciled,
                "Source registered"
            );
        }

        self.notify();

        Registration {
            identity,
            display_name: name,
            reconciled,
            superseded,
            previous_identity,
        }
    }

    /// Refresh the liveness of a live source; unknown identities are ignored
    pub async fn touch(&self, identity: &SourceId) {
        let mut state = self.state.write().await;

        if let Some(source) = state.connected.get_mut(identity) {
            source.touch();
        }
    }

    /// Remove the live source served by `connection`
    ///
    /// Marks its durable record offline. Returns `None` when the connection
    /// never registered or was superseded by a newer connection.
    pub async fn remove(&self, connection: &ConnectionId) -> Option<Departure> {
        let departure = self.state.write().await.detach(connection)?;

        tracing::info!(
            source = %departure.identity,
            connection = %connection,
            "Source disconnected"
        );
        self.notify();

        Some(departure)
    }

    /// Snapshot of every known source
    ///
    /// Live sources come first in connect order, followed by offline durable
    /// records in registration order. A durable id is listed at most once.
    pub async fn list_all(&self) -> Vec<RegistryEntry> {
        let state = self.state.read().await;

        let mut live: Vec<&ConnectedSource> = state.connected.values().collect();
        live.sort_by_key(|source| source.connected_at);

        let mut offline: Vec<&RegisteredSource> = state
            .registered
            .values()
            .filter(|record| !state.connected.contains_key(&record.durable_id))
            .collect();
        offline.sort_by_key(|record| record.registered_at);

        live.into_iter()
            .map(RegistryEntry::from)
            .chain(offline.into_iter().map(RegistryEntry::from))
            .collect()
    }

    /// Create a durable registration bound to `pairing_code`
    pub async fn register_durable(
        &self,
        display_name: &str,
        pairing_code: &str,
    ) -> Result<SourceId, RegistryError> {
        let display_name = display_name.trim();
        let pairing_code = pairing_code.trim();

        if display_name.is_empty() {
            return Err(RegistryError::Validation("name"));
        }
        if pairing_code.is_empty() {
            return Err(RegistryError::Validation("connectionCode"));
        }

        let durable_id = SourceId::durable();
        {
            let mut state = self.state.write().await;
            state.pairing.bind(pairing_code, durable_id.clone())?;
            state.registered.insert(
                durable_id.clone(),
                RegisteredSource::new(
                    durable_id.clone(),
                    display_name.to_owned(),
                    pairing_code.to_owned(),
                ),
            );
        }

        tracing::info!(source = %durable_id, name = %display_name, "Durable source registered");
        self.notify();

        Ok(durable_id)
    }

    /// Resolve a pairing code to the durable identity it is bound to
    pub async fn pair(&self, pairing_code: &str) -> Result<SourceId, RegistryError> {
        self.state.read().await.pairing.resolve(pairing_code.trim())
    }

    /// Identity served by a live connection
    pub async fn identity_of(&self, connection: &ConnectionId) -> Option<SourceId> {
        self.state.read().await.connections.get(connection).cloned()
    }

    /// Whether `connection` is the live connection serving `identity`
    pub async fn is_served_by(&self, identity: &SourceId, connection: &ConnectionId) -> bool {
        self.state.read().await.connections.get(connection) == Some(identity)
    }

    /// Live record for an identity
    pub async fn live_source(&self, identity: &SourceId) -> Option<ConnectedSource> {
        self.state.read().await.connected.get(identity).cloned()
    }

    /// Durable record for an identity
    pub async fn registered_source(&self, identity: &SourceId) -> Option<RegisteredSource> {
        self.state.read().await.registered.get(identity).cloned()
    }

    /// Number of live sources
    pub async fn connected_count(&self) -> usize {
        self.state.read().await.connected.len()
    }

    /// Number of durable records
    pub async fn registered_count(&self) -> usize {
        self.state.read().await.registered.len()
    }

    /// Evict every live source silent for longer than the liveness window
    ///
    /// Runs under the write lock like `register`/`remove`. Emits a single
    /// change signal when anything was evicted.
    pub async fn sweep_at(&self, now: Instant) -> Vec<Departure> {
        let window = self.config.liveness_window;

        let evicted: Vec<Departure> = {
            let mut state = self.state.write().await;

            let stale: Vec<ConnectionId> = state
                .connected
                .values()
                .filter(|source| source.is_stale(now, window))
                .map(|source| source.connection.clone())
                .collect();

            stale
                .iter()
                .filter_map(|connection| state.detach(connection))
                .collect()
        };

        for departure in &evicted {
            tracing::info!(
                source = %departure.identity,
                connection = %departure.connection,
                window_secs = window.as_secs(),
                "Stale source evicted"
            );
        }

        if !evicted.is_empty() {
            self.notify();
        }

        evicted
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
