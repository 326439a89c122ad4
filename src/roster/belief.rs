//! Belief systems and an in-memory registry.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::{AgentId, BeliefId, BeliefRegistry};

/// How a belief pitches itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagingStyle {
    /// Evidence and outcomes
    Rational,
    /// Feelings and hope
    Emotional,
    /// Order and strong leadership
    Authoritarian,
    /// Equality and belonging
    Inclusive,
}

impl std::fmt::Display for MessagingStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessagingStyle::Rational => write!(f, "rational"),
            MessagingStyle::Emotional => write!(f, "emotional"),
            MessagingStyle::Authoritarian => write!(f, "authoritarian"),
            MessagingStyle::Inclusive => write!(f, "inclusive"),
        }
    }
}

/// A belief system published by an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Belief {
    /// Belief id
    pub id: BeliefId,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Ticker-style symbol
    #[serde(default)]
    pub symbol: String,
    /// Founding agent
    pub founder: AgentId,
    /// Core values, matched against persuasion messages
    #[serde(default)]
    pub core_values: Vec<String>,
    /// Promises, matched against persuasion messages
    #[serde(default)]
    pub promises: Vec<String>,
    /// Declared tradeoffs
    #[serde(default)]
    pub tradeoffs: Vec<String>,
    /// Messaging style
    pub messaging_style: MessagingStyle,
    /// Registration order, used for leaderboard tie-breaks
    #[serde(default)]
    pub created_seq: u64,
}

impl Belief {
    /// Create a belief with no declared values
    pub fn new(id: &str, founder: &str, style: MessagingStyle) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            symbol: id.to_uppercase(),
            founder: founder.to_string(),
            core_values: Vec::new(),
            promises: Vec::new(),
            tradeoffs: Vec::new(),
            messaging_style: style,
            created_seq: 0,
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Set core values
    pub fn with_core_values(mut self, values: &[&str]) -> Self {
        self.core_values = values.iter().map(|v| (*v).to_string()).collect();
        self
    }

    /// Set promises
    pub fn with_promises(mut self, promises: &[&str]) -> Self {
        self.promises = promises.iter().map(|p| (*p).to_string()).collect();
        self
    }

    /// Set tradeoffs
    pub fn with_tradeoffs(mut self, tradeoffs: &[&str]) -> Self {
        self.tradeoffs = tradeoffs.iter().map(|t| (*t).to_string()).collect();
        self
    }
}

/// Concurrent in-memory belief registry
#[derive(Debug, Default)]
pub struct InMemoryBeliefs {
    beliefs: DashMap<BeliefId, Belief>,
    seq: AtomicU64,
}

impl InMemoryBeliefs {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a belief, stamping its creation order.
    ///
    /// An empty id is replaced by a fresh UUID. Re-inserting an existing id
    /// replaces the record but keeps its original creation order.
    pub fn insert(&self, mut belief: Belief) -> Belief {
        if belief.id.is_empty() {
            belief.id = uuid::Uuid::new_v4().to_string();
        }
        belief.created_seq = match self.beliefs.get(&belief.id) {
            Some(existing) => existing.created_seq,
            None => self.seq.fetch_add(1, Ordering::SeqCst),
        };
        self.beliefs.insert(belief.id.clone(), belief.clone());
        belief
    }

    /// Number of registered beliefs
    pub fn len(&self) -> usize {
        self.beliefs.len()
    }

    /// True when no belief is registered
    pub fn is_empty(&self) -> bool {
        self.beliefs.is_empty()
    }
}

impl BeliefRegistry for InMemoryBeliefs {
    fn get(&self, id: &str) -> Option<Belief> {
        self.beliefs.get(id).map(|b| b.clone())
    }

    fn list(&self) -> Vec<Belief> {
        let mut all: Vec<Belief> = self.beliefs.iter().map(|b| b.clone()).collect();
        all.sort_by_key(|b| b.created_seq);
        all
    }
}
