//! Frame relay server binary
//!
//! Configuration comes from the environment: `PORT` (default 3000),
//! `MAX_CONNECTIONS`, `LIVENESS_WINDOW_SECS`, `SWEEP_INTERVAL_SECS`.
//! Log verbosity follows `RUST_LOG`.

use frame_relay::{RelayServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("frame_relay=debug".parse()?),
        )
        .init();

    let config = ServerConfig::from_env()?;

    tracing::info!(
        addr = %config.bind_addr,
        liveness_window_secs = config.registry.liveness_window.as_secs(),
        sweep_interval_secs = config.registry.sweep_interval.as_secs(),
        "Starting frame relay"
    );

    let server = RelayServer::new(config);
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
