//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::gateway::DEFAULT_OUTBOUND_CAPACITY;
use crate::registry::RegistryConfig;

/// Port used when `PORT` is not set
pub const DEFAULT_PORT: u16 = 3000;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent WebSocket connections (0 = unlimited)
    pub max_connections: usize,

    /// Outbound event queue length per connection
    pub outbound_capacity: usize,

    /// Largest accepted WebSocket message (frames included)
    pub max_message_size: usize,

    /// Registry and reaper settings
    pub registry: RegistryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            max_message_size: 8 * 1024 * 1024, // 8MB, a large JPEG in Base64
            registry: RegistryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Build a config from process environment variables
    ///
    /// Recognised: `PORT`, `MAX_CONNECTIONS`, `LIVENESS_WINDOW_SECS`,
    /// `SWEEP_INTERVAL_SECS`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = parse_var::<u16, _>(&lookup, "PORT")? {
            config.bind_addr.set_port(port);
        }
        if let Some(max) = parse_var(&lookup, "MAX_CONNECTIONS")? {
            config.max_connections = max;
        }
        if let Some(secs) = parse_var(&lookup, "LIVENESS_WINDOW_SECS")? {
            config.registry = config.registry.liveness_window(Duration::from_secs(secs));
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "SWEEP_INTERVAL_SECS")? {
            if secs == 0 {
                return Err(Error::Config("SWEEP_INTERVAL_SECS must be positive".into()));
            }
            config.registry = config.registry.sweep_interval(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the port, keeping the bind IP
    pub fn port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the outbound queue length per connection
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    /// Set the maximum WebSocket message size
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set registry configuration
    pub fn registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{key}={raw:?}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.outbound_capacity, DEFAULT_OUTBOUND_CAPACITY);
        assert_eq!(config.registry.liveness_window, Duration::from_secs(60));
    }

    #[test]
    fn test_from_lookup_empty_keeps_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.registry.sweep_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("MAX_CONNECTIONS", "200"),
            ("LIVENESS_WINDOW_SECS", "90"),
            ("SWEEP_INTERVAL_SECS", "10"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.max_connections, 200);
        assert_eq!(config.registry.liveness_window, Duration::from_secs(90));
        assert_eq!(config.registry.sweep_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "http")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = ServerConfig::from_lookup(lookup(&[("SWEEP_INTERVAL_SECS", "0")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .port(4001)
            .max_connections(50)
            .outbound_capacity(0)
            .max_message_size(1024);

        assert_eq!(config.bind_addr, "127.0.0.1:4001".parse().unwrap());
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.outbound_capacity, 1);
        assert_eq!(config.max_message_size, 1024);
    }
}
