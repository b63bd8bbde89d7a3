//! Source registry and pairing
//!
//! The registry tracks which sources are live and which are durably known,
//! reconciling a reconnecting source with its durable identity through a
//! pairing code.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<ConnectionRegistry>
//!                 ┌──────────────────────────────┐
//!                 │ RwLock<RegistryState {       │
//!                 │   connected:   id → live     │
//!                 │   connections: conn → id     │
//!                 │   registered:  id → durable  │
//!                 │   pairing:     code → id     │
//!                 │ }>                           │
//!                 │ changes: broadcast::Sender   │
//!                 └──────────────┬───────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//!   register()/remove()     list_all()           StaleConnectionReaper
//!   (gateway)               (HTTP listing)       sweep_at() every 30s
//! ```
//!
//! Durable records are never deleted; a disconnect or eviction only flips
//! them offline.

pub mod config;
pub mod entry;
pub mod error;
pub mod identity;
pub mod pairing;
pub mod reaper;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{
    ConnectedSource, Departure, RegisteredSource, Registration, RegistryEntry, SourceStatus,
};
pub use error::RegistryError;
pub use identity::{ConnectionId, SourceId};
pub use pairing::PairingDirectory;
pub use reaper::{EvictionHandler, StaleConnectionReaper};
pub use store::{ConnectionRegistry, RegistryChanged};
