//! Collaborator seams: the agents and belief systems the engine consumes.
//!
//! Agent registration and belief CRUD live outside the engine. The engine
//! only needs to look beliefs up by id and to debit an agent's token
//! balance, so both collaborators are reached through the traits below
//! and injected as `Arc<dyn …>`.
//!
//! The in-memory implementations back the HTTP server and the tests.

mod agent;
mod belief;

pub use agent::{AgentAccount, InMemoryAccounts};
pub use belief::{Belief, InMemoryBeliefs, MessagingStyle};

use crate::error::Result;

/// Belief identity
pub type BeliefId = String;

/// Agent identity
pub type AgentId = String;

/// Read access to belief systems.
///
/// Beliefs are immutable for the duration of a round; the engine never
/// writes through this trait.
pub trait BeliefRegistry: Send + Sync {
    /// Look a belief up by id
    fn get(&self, id: &str) -> Option<Belief>;

    /// All beliefs in creation order
    fn list(&self) -> Vec<Belief>;
}

/// Token balances, debited by the economy and never credited by the engine.
pub trait TokenAccounts: Send + Sync {
    /// Current balance, `None` for unknown agents
    fn balance(&self, agent: &str) -> Option<u64>;

    /// Atomically check and subtract `amount`, returning the new balance.
    ///
    /// Fails with `InsufficientFunds` when the balance is strictly below
    /// `amount`, leaving it untouched.
    fn debit(&self, agent: &str, amount: u64) -> Result<u64>;
}
