//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::config::Config;
use crate::error::{MarketError, Result};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub addr: SocketAddr,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
    /// Enable request logging
    pub logging: bool,
    /// CORS enabled
    pub cors_enabled: bool,
    /// Advance expired rounds in the background
    pub auto_advance: bool,
    /// How often the round timer is checked
    pub tick_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
            max_body_size: 64 * 1024,
            logging: true,
            cors_enabled: true,
            auto_advance: false,
            tick_interval: Duration::from_secs(1),
        }
    }
}

impl ServerConfig {
    /// Build from the `[http]` and `[game]` sections
    pub fn from_market(config: &Config) -> Result<Self> {
        let addr = config
            .http
            .listen_addr()
            .parse()
            .map_err(|e| MarketError::Config(format!("Invalid listen address: {e}")))?;

        Ok(Self {
            addr,
            max_body_size: config.http.max_body_size,
            cors_enabled: config.http.cors_enabled,
            auto_advance: config.game.auto_advance,
            ..Self::default()
        })
    }

    /// Create with custom port
    pub fn with_port(mut self, port: u16) -> Self {
        self.addr.set_port(port);
        self
    }

    /// Bind to all interfaces
    pub fn bind_all(mut self) -> Self {
        self.addr.set_ip(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        self
    }

    /// Advance expired rounds automatically
    pub fn with_auto_advance(mut self, every: Duration) -> Self {
        self.auto_advance = true;
        self.tick_interval = every;
        self
    }

    /// Disable logging
    pub fn without_logging(mut self) -> Self {
        self.logging = false;
        self
    }
}
