//! Agent token accounts.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::{AgentId, TokenAccounts};
use crate::error::{MarketError, Result};

/// An agent's wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentAccount {
    /// Agent id
    pub id: AgentId,
    /// Spendable tokens
    pub balance: u64,
    /// Tokens spent on persuasion so far
    pub spent: u64,
}

/// Concurrent in-memory accounts.
///
/// Each agent is its own map entry, so a debit holds that agent's entry
/// lock only and unrelated agents never contend.
#[derive(Debug, Default)]
pub struct InMemoryAccounts {
    accounts: DashMap<AgentId, AgentAccount>,
}

impl InMemoryAccounts {
    /// Create an empty account book
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an account with a starting balance.
    ///
    /// Opening an existing account leaves it unchanged and returns it.
    pub fn open(&self, agent: &str, balance: u64) -> AgentAccount {
        self.accounts
            .entry(agent.to_string())
            .or_insert_with(|| AgentAccount {
                id: agent.to_string(),
                balance,
                spent: 0,
            })
            .clone()
    }

    /// Snapshot of one account
    pub fn account(&self, agent: &str) -> Option<AgentAccount> {
        self.accounts.get(agent).map(|a| a.clone())
    }

    /// Snapshot of all accounts, ordered by id
    pub fn accounts(&self) -> Vec<AgentAccount> {
        let mut all: Vec<_> = self.accounts.iter().map(|a| a.clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

impl TokenAccounts for InMemoryAccounts {
    fn balance(&self, agent: &str) -> Option<u64> {
        self.accounts.get(agent).map(|a| a.balance)
    }

    fn debit(&self, agent: &str, amount: u64) -> Result<u64> {
        let mut account = self
            .accounts
            .get_mut(agent)
            .ok_or_else(|| MarketError::UnknownAgent(agent.to_string()))?;

        if account.balance < amount {
            return Err(MarketError::InsufficientFunds {
                required: amount,
                available: account.balance,
            });
        }

        account.balance -= amount;
        account.spent += amount;
        Ok(account.balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debit_exact_balance_succeeds() {
        let accounts = InMemoryAccounts::new();
        accounts.open("alice", 250);

        assert_eq!(accounts.debit("alice", 250).unwrap(), 0);
        let account = accounts.account("alice").unwrap();
        assert_eq!(account.balance, 0);
        assert_eq!(account.spent, 250);
    }

    #[test]
    fn test_debit_fails_closed() {
        let accounts = InMemoryAccounts::new();
        accounts.open("alice", 99);

        let err = accounts.debit("alice", 100).unwrap_err();
        assert!(matches!(
            err,
            MarketError::InsufficientFunds {
                required: 100,
                available: 99
            }
        ));
        assert_eq!(accounts.balance("alice"), Some(99));
    }

    #[test]
    fn test_unknown_agent() {
        let accounts = InMemoryAccounts::new();
        assert!(matches!(
            accounts.debit("ghost", 1),
            Err(MarketError::UnknownAgent(_))
        ));
        assert_eq!(accounts.balance("ghost"), None);
    }

    #[test]
    fn test_open_is_idempotent() {
        let accounts = InMemoryAccounts::new();
        accounts.open("alice", 1000);
        accounts.debit("alice", 100).unwrap();
        let again = accounts.open("alice", 1000);
        assert_eq!(again.balance, 900);
    }
}
