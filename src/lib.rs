//! # Belief Market - persuasion and conviction engine
//!
//! Agents found competing belief systems and spend tokens trying to win
//! over a population of NPCs. Each NPC has hidden psychological biases;
//! how well a message lands depends on those biases, on the belief's
//! messaging style and on how well the message echoes the belief's
//! stated values.
//!
//! ## Features
//!
//! - **Three timed rounds**: cohorts of 50, 30 and 20 NPCs join as the game goes on
//! - **Resonance scoring**: style/bias alignment plus value matching, damped per round
//! - **Conviction ledger**: conversion, reinforcement and flips behind a loyalty bar
//! - **Round-priced economy**: attempts cost more each round, flips cost double
//! - **Append-only history**: every attempt audited; leaderboard derived from it
//!
//! ## Game Overview
//!
//! ```text
//! Agent                         GameEngine                          NPC
//!   |                               |                                 |
//!   |-- persuade(npc, message) ---->|                                 |
//!   |                               |-- price, debit ---------------->|
//!   |                               |-- score(message, biases) ------>|
//!   |                               |-- convert / reinforce / flip -->|
//!   |<----- receipt (outcome) ------|                                 |
//! ```
//!
//! ### Phases
//!
//! ```text
//!   start()          advance()         advance()         advance()
//! [NotStarted] ───> [Round1] ──────> [Round2] ──────> [Round3] ──────> [Ended]
//! ```
//!
//! ### Attempt Costs
//!
//! | Round | Cost | Flip cost | Resonance damping |
//! |-------|------|-----------|-------------------|
//! | 1     | 100  | 200       | 1.00              |
//! | 2     | 250  | 500       | 0.85              |
//! | 3     | 500  | 1000      | 0.70              |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use belief_market::{Config, GameEngine, PersuasionRequest};
//!
//! let engine = GameEngine::from_config(&Config::load(None)?)?;
//! engine.start()?;
//!
//! let receipt = engine.persuade(&PersuasionRequest::new(
//!     "alice",
//!     "order",
//!     0,
//!     "Discipline and strong leadership keep us safe",
//! ))?;
//! println!("{} (resonance {})", receipt.outcome, receipt.resonance_score);
//! ```

pub mod config;
pub mod economy;
pub mod engine;
pub mod error;
pub mod history;
pub mod ledger;
pub mod npc;
pub mod resonance;
pub mod roster;
pub mod round;
pub mod server;

// Re-exports for convenience
pub use config::Config;
pub use economy::Economy;
pub use engine::{GameEngine, GameInfo, LeaderboardView, PersuasionReceipt, PersuasionRequest};
pub use error::{MarketError, RejectionCode, Result};
pub use history::{FeedEntry, FeedKind, History, HistoryQuery, PersuasionAttempt, Standing};
pub use ledger::{ConvictionLedger, Outcome};
pub use npc::{Biases, Npc, NpcFilter, NpcId, NpcView};
pub use resonance::{Resonance, ResonanceEngine};
pub use roster::{Belief, BeliefRegistry, InMemoryAccounts, InMemoryBeliefs, MessagingStyle, TokenAccounts};
pub use round::{Phase, RoundScheduler, RoundState};
pub use server::{AppState, Server, ServerConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
