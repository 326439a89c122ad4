//! The game engine: one owner for rounds, NPCs, costs and history.
//!
//! # Persuasion pipeline
//!
//! ```text
//! request ─> round check ─> belief/agent check ─> lock NPC ─> price ─> debit
//!                                                                │
//!            history <─ invariants <─ apply result <─ score <────┘
//! ```
//!
//! An attempt holds the round-state read lock from the round check until
//! its history record is written, so it is priced, scored and resolved
//! against one round, and a round transition waits for it. Inside that,
//! the target NPC's entry is held exclusively; the agent's account is
//! locked only for the debit itself. Lock order is always round, NPC,
//! agent.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::economy::Economy;
use crate::error::{MarketError, Result};
use crate::history::{
    AttemptDraft, FeedEntry, History, HistoryQuery, Leaderboard, Page, PersuasionAttempt, Standing,
};
use crate::ledger::{ConvictionLedger, Outcome};
use crate::npc::{BiasModel, NpcFilter, NpcId, NpcView};
use crate::resonance::ResonanceEngine;
use crate::roster::{
    AgentId, Belief, BeliefId, BeliefRegistry, InMemoryAccounts, InMemoryBeliefs, TokenAccounts,
};
use crate::round::{Cohort, Phase, RoundScheduler, RoundState, Transition};

/// A persuasion request from an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersuasionRequest {
    /// Persuading agent
    pub agent_id: AgentId,
    /// Belief to pitch; must be founded by the agent
    pub belief_id: BeliefId,
    /// Target NPC
    pub npc_id: NpcId,
    /// Free-form message
    pub message: String,
}

impl PersuasionRequest {
    /// Build a request
    pub fn new(agent: &str, belief: &str, npc: NpcId, message: &str) -> Self {
        Self {
            agent_id: agent.to_string(),
            belief_id: belief.to_string(),
            npc_id: npc,
            message: message.to_string(),
        }
    }
}

/// What a resolved attempt returns to the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersuasionReceipt {
    /// History record id
    pub attempt_id: u64,
    /// Outcome
    pub outcome: Outcome,
    /// Resonance score
    pub resonance_score: u8,
    /// Tokens debited
    pub cost_paid: u64,
    /// NPC conviction after the attempt
    pub updated_conviction: u8,
    /// Belief the NPC follows after the attempt
    pub current_belief: Option<BeliefId>,
    /// Agent balance after the debit
    pub balance: u64,
}

/// Game status for observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameInfo {
    /// Current phase
    pub phase: Phase,
    /// Round number while a round runs
    pub round: Option<u8>,
    /// Round start (epoch millis)
    pub round_start_time: Option<i64>,
    /// Round end (epoch millis)
    pub round_end_time: Option<i64>,
    /// NPCs spawned so far
    pub npc_count: usize,
    /// Registered beliefs
    pub belief_count: usize,
    /// Price of an ordinary attempt this round
    pub attempt_cost: Option<u64>,
    /// Price of a flip attempt this round
    pub flip_cost: Option<u64>,
    /// Spawned cohorts
    pub cohorts: Vec<Cohort>,
}

/// Leaderboard with the winner once the game is over
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardView {
    /// Phase the standings were computed in
    pub phase: Phase,
    /// Ranked beliefs
    pub standings: Vec<Standing>,
    /// Rank 1, only when the game has ended
    pub winner: Option<Standing>,
}

/// The conviction engine
pub struct GameEngine {
    scheduler: RoundScheduler,
    ledger: ConvictionLedger,
    resonance: ResonanceEngine,
    economy: Economy,
    history: History,
    beliefs: Arc<dyn BeliefRegistry>,
}

impl GameEngine {
    /// Create an engine over external belief and account collaborators
    pub fn new(
        config: &Config,
        beliefs: Arc<dyn BeliefRegistry>,
        accounts: Arc<dyn TokenAccounts>,
    ) -> Self {
        Self {
            scheduler: RoundScheduler::new(&config.game, BiasModel::seeded(config.game.seed)),
            ledger: ConvictionLedger::new(config.conviction.clone()),
            resonance: ResonanceEngine::new(config.resonance.clone()),
            economy: Economy::new(config.economy.clone(), accounts),
            history: History::new(),
            beliefs,
        }
    }

    /// Create an engine with in-memory collaborators seeded from the
    /// `[roster]` section.
    ///
    /// Belief founders missing from `roster.agents` get an account with the
    /// default starting balance. The config is validated first.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let beliefs = InMemoryBeliefs::new();
        let accounts = InMemoryAccounts::new();
        let starting = config.game.starting_balance;

        for agent in &config.roster.agents {
            accounts.open(&agent.id, agent.balance.unwrap_or(starting));
        }
        for belief in &config.roster.beliefs {
            if belief.founder.is_empty() {
                return Err(MarketError::Config(format!(
                    "belief {} has no founder",
                    belief.id
                )));
            }
            accounts.open(&belief.founder, starting);
            beliefs.insert(belief.clone());
        }

        tracing::info!(
            "Roster loaded: {} agents, {} beliefs",
            accounts.accounts().len(),
            beliefs.len()
        );

        Ok(Self::new(config, Arc::new(beliefs), Arc::new(accounts)))
    }

    /// Resolve a persuasion attempt now
    pub fn persuade(&self, request: &PersuasionRequest) -> Result<PersuasionReceipt> {
        self.persuade_at(request, now_ms())
    }

    /// Resolve a persuasion attempt at `now_ms`.
    ///
    /// Only `insufficientFunds` leaves a history record; every other
    /// rejection returns before anything is written.
    pub fn persuade_at(&self, request: &PersuasionRequest, now_ms: i64) -> Result<PersuasionReceipt> {
        self.scheduler.with_state(|state| {
            let round = state.playable_round()?;

            let belief = self
                .beliefs
                .get(&request.belief_id)
                .ok_or_else(|| MarketError::UnknownBelief(request.belief_id.clone()))?;
            if belief.founder != request.agent_id {
                return Err(MarketError::BeliefNotOwned {
                    agent: request.agent_id.clone(),
                    belief: belief.id,
                });
            }
            if self.economy.balance(&request.agent_id).is_none() {
                return Err(MarketError::UnknownAgent(request.agent_id.clone()));
            }

            self.ledger.resolve(request.npc_id, |npc| {
                if npc.spawn_round > round {
                    return Err(MarketError::UnknownTarget(npc.id));
                }

                let is_flip = npc.follows_other_than(&belief.id);
                let cost = self.economy.cost(round, is_flip);
                let balance = match self.economy.debit(&request.agent_id, cost) {
                    Ok(balance) => balance,
                    Err(e @ MarketError::InsufficientFunds { .. }) => {
                        self.history.record(AttemptDraft {
                            round,
                            agent_id: request.agent_id.clone(),
                            belief_id: belief.id.clone(),
                            npc_id: npc.id,
                            message: request.message.clone(),
                            resonance_score: None,
                            cost: 0,
                            outcome: Outcome::Rejected,
                            previous_belief: npc.current_belief().map(str::to_string),
                            conviction_after: npc.conviction(),
                            timestamp: now_ms,
                        })?;
                        tracing::warn!(
                            agent = %request.agent_id,
                            npc = npc.id,
                            "Attempt rejected: {e}"
                        );
                        return Err(e);
                    },
                    Err(e) => return Err(e),
                };

                let score = self.resonance.score(&request.message, &belief, npc, round);
                let resolution = self.ledger.apply_result(npc, &belief.id, score);
                npc.check_invariants(round)?;

                let attempt = self.history.record(AttemptDraft {
                    round,
                    agent_id: request.agent_id.clone(),
                    belief_id: belief.id.clone(),
                    npc_id: npc.id,
                    message: request.message.clone(),
                    resonance_score: Some(score),
                    cost,
                    outcome: resolution.outcome,
                    previous_belief: resolution.previous_belief,
                    conviction_after: resolution.conviction_after,
                    timestamp: now_ms,
                })?;

                tracing::debug!(
                    agent = %request.agent_id,
                    belief = %belief.id,
                    npc = npc.id,
                    round,
                    score,
                    cost,
                    outcome = %attempt.outcome,
                    "Persuasion resolved"
                );

                Ok(PersuasionReceipt {
                    attempt_id: attempt.id,
                    outcome: attempt.outcome,
                    resonance_score: score,
                    cost_paid: cost,
                    updated_conviction: npc.conviction(),
                    current_belief: npc.current_belief().map(str::to_string),
                    balance,
                })
            })
        })
    }

    /// Start the game now
    pub fn start(&self) -> Result<Transition> {
        self.start_at(now_ms())
    }

    /// Start the game at `now_ms`
    pub fn start_at(&self, now_ms: i64) -> Result<Transition> {
        let transition = self.scheduler.start(now_ms, &self.ledger)?;
        self.announce(&transition)?;
        Ok(transition)
    }

    /// Advance one phase now
    pub fn advance(&self, expected: Option<Phase>) -> Result<Transition> {
        self.advance_at(expected, now_ms())
    }

    /// Advance one phase at `now_ms`, if still in `expected`
    pub fn advance_at(&self, expected: Option<Phase>, now_ms: i64) -> Result<Transition> {
        let transition = self.scheduler.advance(expected, now_ms, &self.ledger)?;
        self.announce(&transition)?;
        Ok(transition)
    }

    /// Advance if the current round has expired at `now_ms`.
    ///
    /// Losing a race against another advance is not an error.
    pub fn tick(&self, now_ms: i64) -> Result<Option<Transition>> {
        let Some(phase) = self.scheduler.expired(now_ms)? else {
            return Ok(None);
        };
        match self.advance_at(Some(phase), now_ms) {
            Ok(transition) => Ok(Some(transition)),
            Err(MarketError::InvalidTransition { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn announce(&self, transition: &Transition) -> Result<()> {
        let message = match transition.cohort {
            Some(cohort) => format!(
                "Round {} started: {} new NPCs joined",
                cohort.round, cohort.count
            ),
            None => "Game over".to_string(),
        };
        tracing::info!("{} -> {}: {}", transition.from, transition.to, message);

        let timestamp = match transition.cohort {
            Some(_) => transition.round_start_time,
            None => transition.round_end_time,
        }
        .unwrap_or_else(now_ms);
        self.history.record_event(transition.to, message, timestamp)?;
        Ok(())
    }

    /// Current round state
    pub fn round_state(&self) -> Result<RoundState> {
        self.scheduler.snapshot()
    }

    /// Game status
    pub fn info(&self) -> Result<GameInfo> {
        self.scheduler.with_state(|state| {
            let round = state.round();
            Ok(GameInfo {
                phase: state.phase,
                round,
                round_start_time: state.round_start_time,
                round_end_time: state.round_end_time,
                npc_count: self.ledger.len(),
                belief_count: self.beliefs.list().len(),
                attempt_cost: round.map(|r| self.economy.cost(r, false)),
                flip_cost: round.map(|r| self.economy.cost(r, true)),
                cohorts: state.cohorts.clone(),
            })
        })
    }

    /// NPCs passing `filter`, ordered by id
    pub fn npcs(&self, filter: &NpcFilter) -> Vec<NpcView> {
        self.ledger.snapshot(filter).iter().map(|n| n.view()).collect()
    }

    /// One NPC
    pub fn npc(&self, id: NpcId) -> Result<NpcView> {
        self.ledger
            .get(id)
            .map(|n| n.view())
            .ok_or(MarketError::UnknownTarget(id))
    }

    /// Attempt history, newest first
    pub fn history(&self, query: &HistoryQuery) -> Result<Page<PersuasionAttempt>> {
        self.history.query(query)
    }

    /// Observer feed, newest first
    pub fn conversation(&self, limit: usize) -> Result<Vec<FeedEntry>> {
        self.history.feed(limit)
    }

    /// Standings, with the winner once the game has ended
    pub fn leaderboard(&self) -> Result<LeaderboardView> {
        self.scheduler.with_state(|state| {
            let standings = Leaderboard::compute(
                &self.beliefs.list(),
                &self.ledger.snapshot(&NpcFilter::All),
                &self.history.attempts()?,
            )?;
            let winner = (state.phase == Phase::Ended)
                .then(|| standings.first().cloned())
                .flatten();
            Ok(LeaderboardView {
                phase: state.phase,
                standings,
                winner,
            })
        })
    }

    /// Registered beliefs in creation order
    pub fn beliefs(&self) -> Vec<Belief> {
        self.beliefs.list()
    }

    /// An agent's balance
    pub fn balance(&self, agent: &str) -> Option<u64> {
        self.economy.balance(agent)
    }

    /// Persuasion prices
    pub fn economy(&self) -> &Economy {
        &self.economy
    }

    /// Resonance scorer
    pub fn resonance(&self) -> &ResonanceEngine {
        &self.resonance
    }

    /// NPC state owner
    pub fn ledger(&self) -> &ConvictionLedger {
        &self.ledger
    }
}

impl std::fmt::Debug for GameEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameEngine")
            .field("scheduler", &self.scheduler)
            .field("economy", &self.economy)
            .field("npcs", &self.ledger.len())
            .finish_non_exhaustive()
    }
}

/// Current time in epoch millis
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentSeed;
    use crate::roster::MessagingStyle;

    fn config() -> Config {
        let mut config = Config::default();
        config.game.cohort_sizes = [5, 3, 2];
        config.roster.agents = vec![AgentSeed {
            id: "poor".into(),
            balance: Some(150),
        }];
        config.roster.beliefs = vec![
            Belief::new("order", "alice", MessagingStyle::Authoritarian)
                .with_core_values(&["order", "discipline"])
                .with_promises(&["safety"]),
            Belief::new("commons", "bob", MessagingStyle::Inclusive)
                .with_core_values(&["community", "fairness"]),
            Belief::new("thrift", "poor", MessagingStyle::Rational),
        ];
        config
    }

    fn engine() -> GameEngine {
        GameEngine::from_config(&config()).unwrap()
    }

    #[test]
    fn test_from_config_validates() {
        let mut bad = config();
        bad.conviction.flip_retention = 2.0;
        assert!(matches!(
            GameEngine::from_config(&bad),
            Err(MarketError::Config(_))
        ));

        let mut bad = config();
        bad.conviction.reinforce_gain = f64::NAN;
        assert!(matches!(
            GameEngine::from_config(&bad),
            Err(MarketError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_before_start_and_after_end() {
        let engine = engine();
        let req = PersuasionRequest::new("alice", "order", 0, "order");
        assert!(matches!(
            engine.persuade_at(&req, 0),
            Err(MarketError::GameNotStarted)
        ));

        engine.start_at(0).unwrap();
        for _ in 0..3 {
            engine.advance_at(None, 1).unwrap();
        }
        assert!(matches!(
            engine.persuade_at(&req, 2),
            Err(MarketError::GameEnded)
        ));
        assert_eq!(engine.history(&HistoryQuery::default()).unwrap().total, 0);
    }

    #[test]
    fn test_validation_order_and_no_side_effects() {
        let engine = engine();
        engine.start_at(0).unwrap();

        let unknown_belief = PersuasionRequest::new("alice", "nope", 0, "hi");
        assert!(matches!(
            engine.persuade_at(&unknown_belief, 1),
            Err(MarketError::UnknownBelief(_))
        ));

        let not_owned = PersuasionRequest::new("alice", "commons", 0, "hi");
        assert!(matches!(
            engine.persuade_at(&not_owned, 1),
            Err(MarketError::BeliefNotOwned { .. })
        ));

        let unknown_npc = PersuasionRequest::new("alice", "order", 99, "hi");
        assert!(matches!(
            engine.persuade_at(&unknown_npc, 1),
            Err(MarketError::UnknownTarget(99))
        ));

        assert_eq!(engine.balance("alice"), Some(5_000));
        assert_eq!(engine.history(&HistoryQuery::default()).unwrap().total, 0);
        assert!(!engine.npc(0).unwrap().biases_revealed);
    }

    #[test]
    fn test_attempt_debits_and_records() {
        let engine = engine();
        engine.start_at(0).unwrap();

        let req = PersuasionRequest::new("alice", "order", 0, "order and discipline bring safety");
        let receipt = engine.persuade_at(&req, 10).unwrap();

        assert_eq!(receipt.cost_paid, 100);
        assert_eq!(receipt.balance, 4_900);
        assert_eq!(receipt.attempt_id, 0);
        assert!(engine.npc(0).unwrap().biases_revealed);

        let page = engine.history(&HistoryQuery::default()).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].resonance_score, Some(receipt.resonance_score));
        assert_eq!(page.items[0].outcome, receipt.outcome);
    }

    #[test]
    fn test_insufficient_funds_is_audited_without_mutation() {
        let engine = engine();
        engine.start_at(0).unwrap();

        let req = PersuasionRequest::new("poor", "thrift", 1, "evidence");
        engine.persuade_at(&req, 1).unwrap();
        let before = engine.npc(2).unwrap();

        let req = PersuasionRequest::new("poor", "thrift", 2, "evidence");
        assert!(matches!(
            engine.persuade_at(&req, 2),
            Err(MarketError::InsufficientFunds {
                required: 100,
                available: 50
            })
        ));

        assert_eq!(engine.balance("poor"), Some(50));
        assert_eq!(engine.npc(2).unwrap(), before);

        let page = engine.history(&HistoryQuery::default()).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].outcome, Outcome::Rejected);
        assert_eq!(page.items[0].resonance_score, None);
        assert_eq!(page.items[0].cost, 0);
    }

    #[test]
    fn test_info_tracks_rounds_and_costs() {
        let engine = engine();
        let info = engine.info().unwrap();
        assert_eq!(info.phase, Phase::NotStarted);
        assert_eq!(info.npc_count, 0);
        assert_eq!(info.belief_count, 3);
        assert_eq!(info.attempt_cost, None);

        engine.start_at(1_000).unwrap();
        engine.advance_at(Some(Phase::Round1), 2_000).unwrap();
        let info = engine.info().unwrap();
        assert_eq!(info.round, Some(2));
        assert_eq!(info.npc_count, 8);
        assert_eq!(info.attempt_cost, Some(250));
        assert_eq!(info.flip_cost, Some(500));
        assert_eq!(info.round_start_time, Some(2_000));
    }

    #[test]
    fn test_tick_advances_only_expired_rounds() {
        let engine = engine();
        engine.start_at(0).unwrap();

        assert!(engine.tick(1_000).unwrap().is_none());
        let t = engine.tick(600_000).unwrap().unwrap();
        assert_eq!(t.to, Phase::Round2);
        assert!(engine.tick(600_001).unwrap().is_none());
    }

    #[test]
    fn test_winner_only_after_end() {
        let engine = engine();
        engine.start_at(0).unwrap();
        assert!(engine.leaderboard().unwrap().winner.is_none());

        for _ in 0..3 {
            engine.advance_at(None, 1).unwrap();
        }
        let board = engine.leaderboard().unwrap();
        assert_eq!(board.phase, Phase::Ended);
        assert_eq!(board.winner.map(|w| w.rank), Some(1));
    }

    #[test]
    fn test_feed_includes_round_events() {
        let engine = engine();
        engine.start_at(0).unwrap();
        let feed = engine.conversation(10).unwrap();
        assert_eq!(feed.len(), 1);
        assert!(feed[0].message.contains("Round 1"));
    }
}
