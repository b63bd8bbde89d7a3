//! Relay server listener
//!
//! Binds the HTTP/WebSocket listener and runs the reaper alongside it.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::error::Result;
use crate::gateway::Gateway;
use crate::registry::{ConnectionRegistry, StaleConnectionReaper};
use crate::server::config::ServerConfig;
use crate::server::http::{router, AppState};

/// Frame relay server
pub struct RelayServer {
    config: ServerConfig,
    gateway: Arc<Gateway>,
}

impl RelayServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::with_config(config.registry.clone()));
        let gateway = Arc::new(Gateway::with_capacity(registry, config.outbound_capacity));

        Self { config, gateway }
    }

    /// Get a reference to the gateway
    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Build the HTTP router, CORS open for browser viewers
    pub fn router(&self) -> axum::Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let state = AppState::new(
            Arc::clone(&self.gateway),
            self.config.max_connections,
            self.config.max_message_size,
        );

        router(state).layer(cors)
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Relay server listening");

        let reaper_handle = StaleConnectionReaper::new(
            Arc::clone(self.gateway.registry()),
            Arc::clone(&self.gateway),
        )
        .spawn();

        let app = self.router();
        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
        })
        .await;

        // Stop the reaper on shutdown
        reaper_handle.abort();

        result.map_err(Into::into)
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
