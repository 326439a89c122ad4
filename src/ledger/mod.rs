//! Conviction ledger: per-NPC affiliation state and the rules that change it.
//!
//! # State Machine
//!
//! ```text
//!                     r >= convert
//!     [Neutral] ──────────────────────> [Affiliated(B, c = r)]
//!         │ r < convert                        │
//!         └──> resisted                        │
//!                                              │ same belief B, r >= reinforce
//!                                              ├──> reinforced, c = min(100, c + gain·r)
//!                                              │
//!                                              │ rival belief B', r >= flip AND r > loyalty(c)
//!                                              ├──> flipped, Affiliated(B', c = retention·r)
//!                                              │
//!                                              └──> resisted (otherwise)
//! ```
//!
//! `loyalty(c) = loyalty_base + loyalty_per_conviction · c`.
//!
//! Thresholds are inclusive (`>=`); the loyalty bar is strict (`>`).
//! Resisted attempts never touch affiliation or conviction. Any
//! resolution, whatever its outcome, reveals the NPC's biases for good.
//!
//! NPC records live in a concurrent map keyed by id; [`ConvictionLedger::resolve`]
//! holds that NPC's entry exclusively for the duration of one attempt.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::config::ConvictionConfig;
use crate::error::{MarketError, Result};
use crate::npc::{Affiliation, Npc, NpcFilter, NpcId, CONVICTION_MAX};
use crate::roster::BeliefId;

/// Result of a persuasion attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Neutral NPC adopted the belief
    Converted,
    /// Existing follower grew more convinced
    Reinforced,
    /// Rival's follower switched sides
    Flipped,
    /// Message did not land; nothing changed
    Resisted,
    /// Attempt refused before scoring (could not be paid for)
    Rejected,
}

impl Outcome {
    /// True when the attempt changed affiliation or conviction
    pub fn mutated(self) -> bool {
        matches!(
            self,
            Outcome::Converted | Outcome::Reinforced | Outcome::Flipped
        )
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Converted => write!(f, "converted"),
            Outcome::Reinforced => write!(f, "reinforced"),
            Outcome::Flipped => write!(f, "flipped"),
            Outcome::Resisted => write!(f, "resisted"),
            Outcome::Rejected => write!(f, "rejected"),
        }
    }
}

/// What one resolution did to an NPC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    /// Outcome label
    pub outcome: Outcome,
    /// Belief followed before the attempt
    pub previous_belief: Option<BeliefId>,
    /// Conviction before the attempt (0 when neutral)
    pub conviction_before: u8,
    /// Conviction after the attempt (0 when neutral)
    pub conviction_after: u8,
    /// Loyalty bar the attempt had to beat, for flip attempts
    pub loyalty_bar: Option<f64>,
}

/// Owner of all NPC state
#[derive(Debug, Default)]
pub struct ConvictionLedger {
    config: ConvictionConfig,
    npcs: DashMap<NpcId, Npc>,
}

impl ConvictionLedger {
    /// Create an empty ledger
    pub fn new(config: ConvictionConfig) -> Self {
        Self {
            config,
            npcs: DashMap::new(),
        }
    }

    /// Active thresholds
    pub fn config(&self) -> &ConvictionConfig {
        &self.config
    }

    /// Resonance a flip must strictly exceed against a follower at `conviction`
    pub fn loyalty_bar(&self, conviction: u8) -> f64 {
        self.config.loyalty_base + self.config.loyalty_per_conviction * f64::from(conviction)
    }

    /// Apply a scored attempt to an NPC and report what changed.
    pub fn apply_result(&self, npc: &mut Npc, belief: &str, resonance: u8) -> Resolution {
        let c = &self.config;
        let previous_belief = npc.current_belief().map(str::to_string);
        let conviction_before = npc.conviction();
        let mut loyalty_bar = None;

        let outcome = match npc.affiliation.as_mut() {
            None if resonance >= c.convert_threshold => {
                npc.affiliation = Some(Affiliation {
                    belief: belief.to_string(),
                    conviction: resonance.min(CONVICTION_MAX),
                });
                Outcome::Converted
            },
            None => Outcome::Resisted,
            Some(current) if current.belief == belief => {
                if resonance >= c.reinforce_threshold {
                    let gain = (c.reinforce_gain * f64::from(resonance)).round() as u8;
                    current.conviction = current.conviction.saturating_add(gain).min(CONVICTION_MAX);
                    Outcome::Reinforced
                } else {
                    Outcome::Resisted
                }
            },
            Some(current) => {
                let bar = self.loyalty_bar(current.conviction);
                loyalty_bar = Some(bar);
                if resonance >= c.flip_threshold && f64::from(resonance) > bar {
                    let retained = (c.flip_retention * f64::from(resonance)).round() as u8;
                    *current = Affiliation {
                        belief: belief.to_string(),
                        conviction: retained.min(CONVICTION_MAX),
                    };
                    Outcome::Flipped
                } else {
                    Outcome::Resisted
                }
            },
        };

        npc.biases_revealed = true;

        Resolution {
            outcome,
            previous_belief,
            conviction_before,
            conviction_after: npc.conviction(),
            loyalty_bar,
        }
    }

    /// Add a freshly spawned cohort.
    ///
    /// Fails if any id is already present; ids are never reused.
    pub fn admit(&self, cohort: Vec<Npc>) -> Result<()> {
        if let Some(dup) = cohort.iter().find(|n| self.npcs.contains_key(&n.id)) {
            return Err(MarketError::InternalInconsistency(format!(
                "NPC id {} spawned twice",
                dup.id
            )));
        }
        for npc in cohort {
            self.npcs.insert(npc.id, npc);
        }
        Ok(())
    }

    /// Run `f` with exclusive access to one NPC.
    ///
    /// Concurrent callers for the same NPC are serialised; other NPCs are
    /// unaffected. `f` must not call back into the ledger.
    pub fn resolve<T>(&self, id: NpcId, f: impl FnOnce(&mut Npc) -> Result<T>) -> Result<T> {
        let mut entry = self
            .npcs
            .get_mut(&id)
            .ok_or(MarketError::UnknownTarget(id))?;
        f(entry.value_mut())
    }

    /// Snapshot of one NPC
    pub fn get(&self, id: NpcId) -> Option<Npc> {
        self.npcs.get(&id).map(|n| n.clone())
    }

    /// Snapshot of NPCs passing `filter`, ordered by id
    pub fn snapshot(&self, filter: &NpcFilter) -> Vec<Npc> {
        let mut npcs: Vec<Npc> = self
            .npcs
            .iter()
            .filter(|n| filter.matches(n.value()))
            .map(|n| n.value().clone())
            .collect();
        npcs.sort_by_key(|n| n.id);
        npcs
    }

    /// Number of spawned NPCs
    pub fn len(&self) -> usize {
        self.npcs.len()
    }

    /// True before the first cohort
    pub fn is_empty(&self) -> bool {
        self.npcs.is_empty()
    }
}
