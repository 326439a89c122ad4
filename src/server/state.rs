//! Server state shared across handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::config::ServerConfig;
use crate::config::Config;
use crate::engine::GameEngine;
use crate::error::Result;

/// Application state shared across handlers
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Market configuration the engine was built from
    pub market: Config,
    /// The game
    pub engine: Arc<GameEngine>,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Wrap an existing engine
    pub fn new(config: ServerConfig, market: Config, engine: Arc<GameEngine>) -> Self {
        Self {
            config,
            market,
            engine,
            start_time: Instant::now(),
        }
    }

    /// Build the engine and its in-memory roster from `market`
    pub fn from_config(config: ServerConfig, market: Config) -> Result<Self> {
        let engine = Arc::new(GameEngine::from_config(&market)?);
        Ok(Self::new(config, market, engine))
    }

    /// Get server uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
