//! Round scheduling.
//!
//! ## State Machine
//!
//! ```text
//!   start()          advance()         advance()         advance()
//! [NotStarted] ───> [Round1] ──────> [Round2] ──────> [Round3] ──────> [Ended]
//!                   +50 NPCs         +30 NPCs         +20 NPCs         (terminal)
//! ```
//!
//! | Phase        | Narrative     | Persuasion            |
//! |--------------|---------------|-----------------------|
//! | `NotStarted` | waiting       | `gameNotStarted`      |
//! | `Round1`     | seeding       | allowed               |
//! | `Round2`     | adaptation    | allowed               |
//! | `Round3`     | polarization  | allowed               |
//! | `Ended`      | frozen        | `gameEnded`           |
//!
//! The scheduler is the only writer of round state. Transitions take the
//! write lock, spawn the next cohort and publish the new phase in one
//! step; persuasion attempts hold the read lock for their whole duration,
//! so every attempt sees one consistent `(phase, cohort)` pair and a
//! transition waits for in-flight attempts to finish.

use std::sync::{RwLock, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::error::{MarketError, Result};
use crate::ledger::ConvictionLedger;
use crate::npc::{BiasModel, NpcId};

/// Game phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for the start command
    NotStarted,
    /// Seeding round
    Round1,
    /// Adaptation round
    Round2,
    /// Polarization round
    Round3,
    /// Game over
    Ended,
}

impl Phase {
    /// Position in the linear phase order
    pub fn ordinal(self) -> u8 {
        match self {
            Phase::NotStarted => 0,
            Phase::Round1 => 1,
            Phase::Round2 => 2,
            Phase::Round3 => 3,
            Phase::Ended => 4,
        }
    }

    /// Round number for playable phases
    pub fn round(self) -> Option<u8> {
        match self {
            Phase::Round1 | Phase::Round2 | Phase::Round3 => Some(self.ordinal()),
            Phase::NotStarted | Phase::Ended => None,
        }
    }

    /// The phase after this one; `Ended` has none
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::NotStarted => Some(Phase::Round1),
            Phase::Round1 => Some(Phase::Round2),
            Phase::Round2 => Some(Phase::Round3),
            Phase::Round3 => Some(Phase::Ended),
            Phase::Ended => None,
        }
    }

    /// Narrative label shown to observers
    pub fn label(self) -> &'static str {
        match self {
            Phase::NotStarted => "waiting",
            Phase::Round1 => "seeding",
            Phase::Round2 => "adaptation",
            Phase::Round3 => "polarization",
            Phase::Ended => "game over",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::NotStarted => write!(f, "not_started"),
            Phase::Round1 => write!(f, "round1"),
            Phase::Round2 => write!(f, "round2"),
            Phase::Round3 => write!(f, "round3"),
            Phase::Ended => write!(f, "ended"),
        }
    }
}

/// One spawned cohort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cohort {
    /// Round the cohort was spawned for
    pub round: u8,
    /// First NPC id in the cohort
    pub first_id: NpcId,
    /// Number of NPCs
    pub count: usize,
}

impl Cohort {
    /// Whether `id` belongs to this cohort
    pub fn contains(&self, id: NpcId) -> bool {
        id >= self.first_id && id < self.first_id + self.count as u64
    }
}

/// Process-wide round state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundState {
    /// Current phase
    pub phase: Phase,
    /// Start of the current round (epoch millis)
    pub round_start_time: Option<i64>,
    /// End of the current round (epoch millis)
    pub round_end_time: Option<i64>,
    /// Cohort boundaries, one per started round
    pub cohorts: Vec<Cohort>,
}

impl Default for RoundState {
    fn default() -> Self {
        Self {
            phase: Phase::NotStarted,
            round_start_time: None,
            round_end_time: None,
            cohorts: Vec::new(),
        }
    }
}

impl RoundState {
    /// Round number (1-based) while a round is running
    pub fn round(&self) -> Option<u8> {
        self.phase.round()
    }

    /// Round number for a playable phase, or the matching rejection
    pub fn playable_round(&self) -> Result<u8> {
        match self.phase {
            Phase::NotStarted => Err(MarketError::GameNotStarted),
            Phase::Ended => Err(MarketError::GameEnded),
            phase => phase.round().ok_or_else(|| {
                MarketError::InternalInconsistency(format!("phase {phase} has no round"))
            }),
        }
    }

    /// Whether the current round's timer has run out
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.phase.round().is_some() && self.round_end_time.is_some_and(|end| now_ms >= end)
    }
}

/// A completed phase change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    /// Phase before
    pub from: Phase,
    /// Phase after
    pub to: Phase,
    /// Cohort spawned by this transition
    pub cohort: Option<Cohort>,
    /// New round start (epoch millis)
    pub round_start_time: Option<i64>,
    /// New round end (epoch millis)
    pub round_end_time: Option<i64>,
}

struct Inner {
    state: RoundState,
    bias: BiasModel,
}

/// Single writer for round state
pub struct RoundScheduler {
    cohort_sizes: [usize; 3],
    round_ms: i64,
    inner: RwLock<Inner>,
}

impl RoundScheduler {
    /// Create a scheduler; bias draws come from `bias`
    pub fn new(config: &GameConfig, bias: BiasModel) -> Self {
        Self {
            cohort_sizes: config.cohort_sizes,
            round_ms: i64::try_from(config.round_secs.saturating_mul(1000)).unwrap_or(i64::MAX),
            inner: RwLock::new(Inner {
                state: RoundState::default(),
                bias,
            }),
        }
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> Result<RoundState> {
        self.with_state(|state| Ok(state.clone()))
    }

    /// Run `f` against the current state, blocking transitions until it
    /// returns.
    pub fn with_state<T>(&self, f: impl FnOnce(&RoundState) -> Result<T>) -> Result<T> {
        let inner = self
            .inner
            .read()
            .map_err(|_| MarketError::poisoned("round state"))?;
        f(&inner.state)
    }

    /// `not_started -> round1`, spawning the first cohort
    pub fn start(&self, now_ms: i64, ledger: &ConvictionLedger) -> Result<Transition> {
        let mut inner = self.write()?;
        if inner.state.phase != Phase::NotStarted {
            return Err(MarketError::InvalidTransition {
                command: "start",
                phase: inner.state.phase,
            });
        }
        self.transition(&mut inner, now_ms, ledger)
    }

    /// Move one phase forward from a running round.
    ///
    /// With `expected` set, the advance only happens if the game is still
    /// in that phase, so two racing callers produce one transition.
    pub fn advance(
        &self,
        expected: Option<Phase>,
        now_ms: i64,
        ledger: &ConvictionLedger,
    ) -> Result<Transition> {
        let mut inner = self.write()?;
        let phase = inner.state.phase;
        let stale = expected.is_some_and(|e| e != phase);
        if stale || phase.round().is_none() {
            return Err(MarketError::InvalidTransition {
                command: "advance",
                phase,
            });
        }
        self.transition(&mut inner, now_ms, ledger)
    }

    /// Phase whose timer has expired, if any
    pub fn expired(&self, now_ms: i64) -> Result<Option<Phase>> {
        self.with_state(|state| Ok(state.is_expired(now_ms).then_some(state.phase)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| MarketError::poisoned("round state"))
    }

    fn transition(&self, inner: &mut Inner, now_ms: i64, ledger: &ConvictionLedger) -> Result<Transition> {
        let from = inner.state.phase;
        let to = from.next().ok_or(MarketError::GameEnded)?;

        let cohort = match to.round() {
            Some(round) => {
                let count = self.cohort_sizes[usize::from(round - 1)];
                let first_id = inner.bias.next_id();
                ledger.admit(inner.bias.spawn_cohort(round, count))?;
                Some(Cohort {
                    round,
                    first_id,
                    count,
                })
            },
            None => None,
        };

        let state = &mut inner.state;
        state.phase = to;
        if let Some(cohort) = cohort {
            state.cohorts.push(cohort);
            state.round_start_time = Some(now_ms);
            state.round_end_time = Some(now_ms.saturating_add(self.round_ms));
        } else {
            state.round_end_time = Some(now_ms);
        }

        Ok(Transition {
            from,
            to,
            cohort,
            round_start_time: state.round_start_time,
            round_end_time: state.round_end_time,
        })
    }
}

impl std::fmt::Debug for RoundScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundScheduler")
            .field("cohort_sizes", &self.cohort_sizes)
            .field("round_ms", &self.round_ms)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConvictionConfig;
    use crate::npc::NpcFilter;

    fn scheduler() -> (RoundScheduler, ConvictionLedger) {
        let config = GameConfig {
            round_secs: 60,
            ..GameConfig::default()
        };
        (
            RoundScheduler::new(&config, BiasModel::seeded(1)),
            ConvictionLedger::new(ConvictionConfig::default()),
        )
    }

    #[test]
    fn test_phase_order() {
        assert_eq!(Phase::NotStarted.next(), Some(Phase::Round1));
        assert_eq!(Phase::Round3.next(), Some(Phase::Ended));
        assert_eq!(Phase::Ended.next(), None);
        assert!(Phase::Round1 < Phase::Round2);
        assert_eq!(Phase::Round2.round(), Some(2));
        assert_eq!(Phase::Ended.round(), None);
        assert_eq!(
            serde_json::to_string(&Phase::NotStarted).unwrap(),
            "\"not_started\""
        );
        assert_eq!(serde_json::to_string(&Phase::Round1).unwrap(), "\"round1\"");
    }

    #[test]
    fn test_full_lifecycle_spawns_cohorts() {
        let (scheduler, ledger) = scheduler();

        let t = scheduler.start(1_000, &ledger).unwrap();
        assert_eq!((t.from, t.to), (Phase::NotStarted, Phase::Round1));
        assert_eq!(t.round_start_time, Some(1_000));
        assert_eq!(t.round_end_time, Some(61_000));
        assert_eq!(ledger.len(), 50);

        let t = scheduler.advance(None, 2_000, &ledger).unwrap();
        assert_eq!(t.to, Phase::Round2);
        assert_eq!(
            t.cohort,
            Some(Cohort {
                round: 2,
                first_id: 50,
                count: 30
            })
        );
        assert_eq!(ledger.len(), 80);

        scheduler.advance(None, 3_000, &ledger).unwrap();
        assert_eq!(ledger.len(), 100);
        assert_eq!(ledger.snapshot(&NpcFilter::Cohort(3)).len(), 20);

        let t = scheduler.advance(None, 4_000, &ledger).unwrap();
        assert_eq!(t.to, Phase::Ended);
        assert!(t.cohort.is_none());
        assert_eq!(ledger.len(), 100);

        let state = scheduler.snapshot().unwrap();
        assert_eq!(state.cohorts.len(), 3);
        assert!(state.cohorts[1].contains(79));
        assert!(!state.cohorts[1].contains(80));
    }

    #[test]
    fn test_no_skipping_or_rewinding() {
        let (scheduler, ledger) = scheduler();

        assert!(matches!(
            scheduler.advance(None, 0, &ledger),
            Err(MarketError::InvalidTransition {
                command: "advance",
                phase: Phase::NotStarted
            })
        ));

        scheduler.start(0, &ledger).unwrap();
        assert!(matches!(
            scheduler.start(0, &ledger),
            Err(MarketError::InvalidTransition { command: "start", .. })
        ));

        for _ in 0..3 {
            scheduler.advance(None, 0, &ledger).unwrap();
        }
        assert!(scheduler.advance(None, 0, &ledger).is_err());
        assert_eq!(scheduler.snapshot().unwrap().phase, Phase::Ended);
    }

    #[test]
    fn test_expected_phase_guards_races() {
        let (scheduler, ledger) = scheduler();
        scheduler.start(0, &ledger).unwrap();

        scheduler.advance(Some(Phase::Round1), 0, &ledger).unwrap();
        // a second caller that also saw round1 must not advance again
        assert!(scheduler.advance(Some(Phase::Round1), 0, &ledger).is_err());
        assert_eq!(scheduler.snapshot().unwrap().phase, Phase::Round2);
        assert_eq!(ledger.len(), 80);
    }

    #[test]
    fn test_expiry() {
        let (scheduler, ledger) = scheduler();
        assert_eq!(scheduler.expired(i64::MAX).unwrap(), None);

        scheduler.start(0, &ledger).unwrap();
        assert_eq!(scheduler.expired(59_999).unwrap(), None);
        assert_eq!(scheduler.expired(60_000).unwrap(), Some(Phase::Round1));
    }

    #[test]
    fn test_playable_round() {
        let mut state = RoundState::default();
        assert!(matches!(
            state.playable_round(),
            Err(MarketError::GameNotStarted)
        ));
        state.phase = Phase::Round3;
        assert_eq!(state.playable_round().unwrap(), 3);
        state.phase = Phase::Ended;
        assert!(matches!(state.playable_round(), Err(MarketError::GameEnded)));
    }
}
