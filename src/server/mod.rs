//! Belief Market HTTP server.
//!
//! Exposes the game to agents and observers:
//! - Round control (start, advance) and game info
//! - NPC listings and persuasion
//! - History, the observer feed and the leaderboard
//!
//! # Example
//!
//! ```rust,ignore
//! use belief_market::server::{AppState, Server, ServerConfig};
//!
//! let state = AppState::from_config(ServerConfig::default().with_port(8080), market)?;
//! Server::new(state).run().await?;
//! ```

mod config;
mod handlers;
mod skill;
mod state;

pub use config::ServerConfig;
pub use handlers::{create_router, health_check, ApiError, ErrorBody};
pub use skill::render as render_skill;
pub use state::AppState;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::task::JoinHandle;

use crate::engine::{now_ms, GameEngine};
use crate::error::Result;
use crate::round::Phase;

/// HTTP server around one game
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    /// Create a server
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Shared state
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Get the router
    pub fn router(&self) -> Router {
        create_router(self.state())
    }

    /// Bind and serve until Ctrl-C
    pub async fn run(self) -> Result<()> {
        let config = &self.state.config;
        let listener = tokio::net::TcpListener::bind(config.addr).await?;
        tracing::info!("Belief Market listening on {}", config.addr);

        let ticker = config
            .auto_advance
            .then(|| spawn_auto_advance(Arc::clone(&self.state.engine), config.tick_interval));
        if ticker.is_some() {
            tracing::info!(
                "Auto-advance enabled: rounds last {}s",
                self.state.market.game.round_secs
            );
        }

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        if let Some(ticker) = ticker {
            ticker.abort();
        }
        tracing::info!("Server stopped");
        Ok(())
    }
}

/// Check the round timer every `every` and advance expired rounds.
///
/// Exits once the game has ended or on an invariant violation.
pub fn spawn_auto_advance(engine: Arc<GameEngine>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match engine.tick(now_ms()) {
                Ok(Some(t)) => tracing::info!("Round timer expired: {} -> {}", t.from, t.to),
                Ok(None) => {},
                Err(e) if e.is_fatal() => {
                    tracing::error!("Auto-advance stopped: {e}");
                    break;
                },
                Err(e) => tracing::warn!("Auto-advance failed: {e}"),
            }
            if matches!(engine.round_state().map(|s| s.phase), Ok(Phase::Ended)) {
                break;
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
