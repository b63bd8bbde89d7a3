//! Stale connection reaper
//!
//! Periodically evicts sources that stopped sending frames or heartbeats.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use super::entry::Departure;
use super::store::ConnectionRegistry;

/// Callback for sources evicted by a sweep
///
/// Eviction removes the source from the registry only; the implementor tears
/// down whatever else referenced it (relay sessions, for instance).
pub trait EvictionHandler: Send + Sync + 'static {
    fn on_evicted(&self, departures: Vec<Departure>) -> impl Future<Output = ()> + Send;
}

impl EvictionHandler for () {
    async fn on_evicted(&self, _departures: Vec<Departure>) {}
}

/// Background sweep over the connection registry
pub struct StaleConnectionReaper<H: EvictionHandler> {
    registry: Arc<ConnectionRegistry>,
    handler: Arc<H>,
}

impl<H: EvictionHandler> StaleConnectionReaper<H> {
    pub fn new(registry: Arc<ConnectionRegistry>, handler: Arc<H>) -> Self {
        Self { registry, handler }
    }

    /// Run one sweep now
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Instant::now()).await
    }

    /// Run one sweep as if the current time were `now`
    pub async fn sweep_at(&self, now: Instant) -> usize {
        let departures = self.registry.sweep_at(now).await;
        let count = departures.len();

        if count > 0 {
            self.handler.on_evicted(departures).await;
        }

        count
    }

    /// Spawn the periodic sweep task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        let interval = self.registry.config().sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = self.sweep().await;
                if evicted > 0 {
                    tracing::debug!(evicted = evicted, "Reaper sweep finished");
                }
            }
        })
    }
}
