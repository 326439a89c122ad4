//! Persuasion economics.
//!
//! Every attempt has a fixed per-round price, multiplied when the target
//! already follows a rival belief:
//!
//! | Round | Base | Flip (x2) |
//! |-------|------|-----------|
//! | 1     | 100  | 200       |
//! | 2     | 250  | 500       |
//! | 3     | 500  | 1000      |
//!
//! Payment is taken before the message is scored. An attempt the agent
//! cannot afford is refused whole: no score, no NPC change, no debit.

use std::sync::Arc;

use crate::config::EconomyConfig;
use crate::error::Result;
use crate::roster::TokenAccounts;

/// Prices attempts and debits the agents' token accounts
pub struct Economy {
    config: EconomyConfig,
    accounts: Arc<dyn TokenAccounts>,
}

impl Economy {
    /// Create an economy over an account book
    pub fn new(config: EconomyConfig, accounts: Arc<dyn TokenAccounts>) -> Self {
        Self { config, accounts }
    }

    /// Active price list
    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    /// Price of one attempt in `round` (1-based).
    ///
    /// Rounds outside 1..=3 are priced as the nearest configured round.
    pub fn cost(&self, round: u8, is_flip: bool) -> u64 {
        let costs = &self.config.round_costs;
        let idx = usize::from(round.max(1) - 1).min(costs.len() - 1);
        let base = costs[idx];
        if is_flip {
            base.saturating_mul(self.config.flip_multiplier)
        } else {
            base
        }
    }

    /// Atomically take `amount` from `agent`, returning the new balance.
    pub fn debit(&self, agent: &str, amount: u64) -> Result<u64> {
        self.accounts.debit(agent, amount)
    }

    /// Current balance of `agent`
    pub fn balance(&self, agent: &str) -> Option<u64> {
        self.accounts.balance(agent)
    }
}

impl std::fmt::Debug for Economy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Economy")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
