//! Append-only persuasion history and the observer feed.
//!
//! Every resolved attempt (and every attempt refused for lack of funds) is
//! written once and never changed. The leaderboard is recomputed from this
//! log plus the NPC snapshot; nothing here keeps running totals.

mod leaderboard;

pub use leaderboard::{Leaderboard, Standing};

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{MarketError, Result};
use crate::ledger::Outcome;
use crate::npc::NpcId;
use crate::roster::{AgentId, BeliefId};
use crate::round::Phase;

/// Default page size for history queries
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest page a query may ask for
pub const MAX_PAGE_SIZE: usize = 500;

/// One persuasion attempt, immutable once written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersuasionAttempt {
    /// Sequential attempt id
    pub id: u64,
    /// Round the attempt was made in
    pub round: u8,
    /// Persuading agent
    pub agent_id: AgentId,
    /// Belief pitched
    pub belief_id: BeliefId,
    /// Target NPC
    pub npc_id: NpcId,
    /// Message text
    pub message: String,
    /// Resonance score; `None` when the attempt was never scored
    pub resonance_score: Option<u8>,
    /// Tokens debited
    pub cost: u64,
    /// Outcome
    pub outcome: Outcome,
    /// Belief the NPC followed before the attempt
    pub previous_belief: Option<BeliefId>,
    /// NPC conviction after the attempt
    pub conviction_after: u8,
    /// Epoch millis
    pub timestamp: i64,
}

/// Attempt fields before an id is assigned
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptDraft {
    /// Round the attempt was made in
    pub round: u8,
    /// Persuading agent
    pub agent_id: AgentId,
    /// Belief pitched
    pub belief_id: BeliefId,
    /// Target NPC
    pub npc_id: NpcId,
    /// Message text
    pub message: String,
    /// Resonance score
    pub resonance_score: Option<u8>,
    /// Tokens debited
    pub cost: u64,
    /// Outcome
    pub outcome: Outcome,
    /// Belief followed before
    pub previous_belief: Option<BeliefId>,
    /// Conviction after
    pub conviction_after: u8,
    /// Epoch millis
    pub timestamp: i64,
}

/// Round-level events shown in the feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemEvent {
    /// Sequential event id
    pub id: u64,
    /// Phase entered
    pub phase: Phase,
    /// Human-readable line
    pub message: String,
    /// Epoch millis
    pub timestamp: i64,
}

/// Filters and paging for history reads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    /// Page size (default 50, capped at 500)
    pub limit: Option<usize>,
    /// Records to skip, newest first
    pub offset: Option<usize>,
    /// Only this agent's attempts
    pub agent_id: Option<AgentId>,
    /// Only attempts on this NPC
    pub npc_id: Option<NpcId>,
    /// Only attempts with this belief
    pub belief_id: Option<BeliefId>,
}

impl HistoryQuery {
    fn matches(&self, attempt: &PersuasionAttempt) -> bool {
        self.agent_id.as_ref().map_or(true, |a| *a == attempt.agent_id)
            && self.npc_id.map_or(true, |n| n == attempt.npc_id)
            && self.belief_id.as_ref().map_or(true, |b| *b == attempt.belief_id)
    }

    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE)
    }
}

/// A page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Total matching records
    pub total: usize,
    /// Offset used
    pub offset: usize,
    /// Limit used
    pub limit: usize,
}

/// Feed classification of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    /// Reinforcement or resisted pitch
    Persuasion,
    /// Neutral NPC converted
    Conversion,
    /// Follower flipped to a rival
    Defection,
    /// Attempt refused for lack of funds
    Rejected,
    /// Round change
    System,
}

/// One line of the observer feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    /// Feed-unique id
    pub id: String,
    /// Classification
    #[serde(rename = "type")]
    pub kind: FeedKind,
    /// Agent, for attempts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    /// Belief, for attempts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub belief_id: Option<BeliefId>,
    /// Target, for attempts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_npc_id: Option<NpcId>,
    /// Text
    pub message: String,
    /// Resonance, for scored attempts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resonance: Option<u8>,
    /// Whether the attempt changed the NPC, for attempts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Epoch millis
    pub timestamp: i64,
}

impl From<&PersuasionAttempt> for FeedEntry {
    fn from(attempt: &PersuasionAttempt) -> Self {
        let kind = match attempt.outcome {
            Outcome::Converted => FeedKind::Conversion,
            Outcome::Flipped => FeedKind::Defection,
            Outcome::Rejected => FeedKind::Rejected,
            Outcome::Reinforced | Outcome::Resisted => FeedKind::Persuasion,
        };
        Self {
            id: format!("attempt-{}", attempt.id),
            kind,
            agent_id: Some(attempt.agent_id.clone()),
            belief_id: Some(attempt.belief_id.clone()),
            target_npc_id: Some(attempt.npc_id),
            message: attempt.message.clone(),
            resonance: attempt.resonance_score,
            success: Some(attempt.outcome.mutated()),
            timestamp: attempt.timestamp,
        }
    }
}

impl From<&SystemEvent> for FeedEntry {
    fn from(event: &SystemEvent) -> Self {
        Self {
            id: format!("event-{}", event.id),
            kind: FeedKind::System,
            agent_id: None,
            belief_id: None,
            target_npc_id: None,
            message: event.message.clone(),
            resonance: None,
            success: None,
            timestamp: event.timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Entry {
    Attempt(usize),
    Event(usize),
}

#[derive(Debug, Default)]
struct Log {
    attempts: Vec<PersuasionAttempt>,
    events: Vec<SystemEvent>,
    // write order across both lists
    entries: Vec<Entry>,
}

/// Append-only log of attempts and round events
#[derive(Debug, Default)]
pub struct History {
    log: RwLock<Log>,
}

impl History {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attempt, assigning the next id
    pub fn record(&self, draft: AttemptDraft) -> Result<PersuasionAttempt> {
        let mut log = self.log.write().map_err(|_| MarketError::poisoned("history"))?;
        let attempt = PersuasionAttempt {
            id: log.attempts.len() as u64,
            round: draft.round,
            agent_id: draft.agent_id,
            belief_id: draft.belief_id,
            npc_id: draft.npc_id,
            message: draft.message,
            resonance_score: draft.resonance_score,
            cost: draft.cost,
            outcome: draft.outcome,
            previous_belief: draft.previous_belief,
            conviction_after: draft.conviction_after,
            timestamp: draft.timestamp,
        };
        let idx = log.attempts.len();
        log.attempts.push(attempt.clone());
        log.entries.push(Entry::Attempt(idx));
        Ok(attempt)
    }

    /// Append a round event
    pub fn record_event(&self, phase: Phase, message: String, timestamp: i64) -> Result<SystemEvent> {
        let mut log = self.log.write().map_err(|_| MarketError::poisoned("history"))?;
        let event = SystemEvent {
            id: log.events.len() as u64,
            phase,
            message,
            timestamp,
        };
        let idx = log.events.len();
        log.events.push(event.clone());
        log.entries.push(Entry::Event(idx));
        Ok(event)
    }

    /// Matching attempts, newest first
    pub fn query(&self, query: &HistoryQuery) -> Result<Page<PersuasionAttempt>> {
        let log = self.log.read().map_err(|_| MarketError::poisoned("history"))?;
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit();

        let matching: Vec<&PersuasionAttempt> =
            log.attempts.iter().rev().filter(|a| query.matches(a)).collect();

        Ok(Page {
            total: matching.len(),
            items: matching
                .into_iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect(),
            offset,
            limit,
        })
    }

    /// Attempts and round events merged, newest first
    pub fn feed(&self, limit: usize) -> Result<Vec<FeedEntry>> {
        let log = self.log.read().map_err(|_| MarketError::poisoned("history"))?;
        let limit = limit.min(MAX_PAGE_SIZE);

        let mut entries: Vec<(i64, usize, FeedEntry)> = log
            .entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| match *entry {
                Entry::Attempt(i) => (log.attempts[i].timestamp, pos, FeedEntry::from(&log.attempts[i])),
                Entry::Event(i) => (log.events[i].timestamp, pos, FeedEntry::from(&log.events[i])),
            })
            .collect();

        // newest first; equal timestamps fall back to write order
        entries.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));
        Ok(entries.into_iter().take(limit).map(|(_, _, e)| e).collect())
    }

    /// Copy of every attempt in write order
    pub fn attempts(&self) -> Result<Vec<PersuasionAttempt>> {
        let log = self.log.read().map_err(|_| MarketError::poisoned("history"))?;
        Ok(log.attempts.clone())
    }

    /// Number of recorded attempts
    pub fn len(&self) -> Result<usize> {
        let log = self.log.read().map_err(|_| MarketError::poisoned("history"))?;
        Ok(log.attempts.len())
    }
}
