//! Non-player characters: the persuasion targets.
//!
//! Each NPC carries five hidden bias traits drawn once at spawn, an optional
//! affiliation (belief + conviction) and the round it was spawned in.
//!
//! Affiliation and conviction are a single `Option<Affiliation>`, so
//! "conviction without a belief" cannot be represented. A neutral NPC
//! reports conviction 0 on the wire; an affiliated NPC at conviction 0 is
//! still affiliated, just about to defect.

mod bias;

pub use bias::{BiasModel, BIAS_MAX};

use serde::{Deserialize, Serialize};

use crate::error::{MarketError, Result};
use crate::roster::BeliefId;

/// Stable NPC identity, assigned at spawn and never reused
pub type NpcId = u64;

/// Maximum conviction
pub const CONVICTION_MAX: u8 = 100;

/// Hidden psychological profile, each trait in [0,100]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Biases {
    /// Preference for strong leadership
    pub authority: u8,
    /// Value placed on equality
    pub fairness: u8,
    /// Tolerance for change (low = risk averse)
    pub risk: u8,
    /// Hopeful outlook
    pub optimism: u8,
    /// Self over collective
    pub individualism: u8,
}

impl Biases {
    /// Build a profile, failing if any trait is out of range.
    pub fn new(authority: u8, fairness: u8, risk: u8, optimism: u8, individualism: u8) -> Result<Self> {
        let biases = Self {
            authority,
            fairness,
            risk,
            optimism,
            individualism,
        };
        biases.check()?;
        Ok(biases)
    }

    /// Risk aversion, the complement of risk tolerance.
    pub fn risk_aversion(&self) -> u8 {
        BIAS_MAX - self.risk
    }

    fn check(&self) -> Result<()> {
        let traits = [
            self.authority,
            self.fairness,
            self.risk,
            self.optimism,
            self.individualism,
        ];
        if traits.iter().any(|t| *t > BIAS_MAX) {
            return Err(MarketError::InternalInconsistency(format!(
                "bias out of range: {self:?}"
            )));
        }
        Ok(())
    }
}

/// An NPC's current allegiance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affiliation {
    /// Belief the NPC follows
    pub belief: BeliefId,
    /// Strength of the allegiance, [0,100]
    pub conviction: u8,
}

/// A persuasion target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Npc {
    /// Stable identity
    pub id: NpcId,
    /// Hidden traits, fixed for life
    pub biases: Biases,
    /// Whether the biases are visible through the API
    pub biases_revealed: bool,
    /// Current belief and conviction, `None` when neutral
    pub affiliation: Option<Affiliation>,
    /// Round (1-based) whose cohort this NPC belongs to
    pub spawn_round: u8,
}

impl Npc {
    /// Current belief id, if affiliated
    pub fn current_belief(&self) -> Option<&str> {
        self.affiliation.as_ref().map(|a| a.belief.as_str())
    }

    /// Conviction as reported on the wire (0 when neutral)
    pub fn conviction(&self) -> u8 {
        self.affiliation.as_ref().map_or(0, |a| a.conviction)
    }

    /// True when unaffiliated
    pub fn is_neutral(&self) -> bool {
        self.affiliation.is_none()
    }

    /// True when affiliated with a belief other than `belief`
    pub fn follows_other_than(&self, belief: &str) -> bool {
        self.current_belief().is_some_and(|b| b != belief)
    }

    /// Verify the per-NPC invariants against the current round.
    pub fn check_invariants(&self, current_round: u8) -> Result<()> {
        self.biases.check()?;
        if let Some(affiliation) = &self.affiliation {
            if affiliation.conviction > CONVICTION_MAX {
                return Err(MarketError::InternalInconsistency(format!(
                    "NPC {} conviction {} above {CONVICTION_MAX}",
                    self.id, affiliation.conviction
                )));
            }
        }
        if self.spawn_round > current_round {
            return Err(MarketError::InternalInconsistency(format!(
                "NPC {} spawned in round {} but current round is {current_round}",
                self.id, self.spawn_round
            )));
        }
        Ok(())
    }

    /// Public view, with biases hidden until revealed
    pub fn view(&self) -> NpcView {
        NpcView {
            id: self.id,
            current_belief: self.current_belief().map(str::to_string),
            conviction: self.conviction(),
            biases: self.biases_revealed.then_some(self.biases),
            biases_revealed: self.biases_revealed,
            spawn_round: self.spawn_round,
        }
    }
}

/// NPC as exposed through the read API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcView {
    /// NPC id
    pub id: NpcId,
    /// Followed belief, `null` when neutral
    pub current_belief: Option<BeliefId>,
    /// Conviction (0 when neutral)
    pub conviction: u8,
    /// Biases, present only once revealed
    pub biases: Option<Biases>,
    /// Reveal flag
    pub biases_revealed: bool,
    /// Cohort round
    pub spawn_round: u8,
}

/// Selector for NPC listings
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NpcFilter {
    /// Every spawned NPC
    #[default]
    All,
    /// Unaffiliated NPCs
    Neutral,
    /// NPCs following any belief
    Affiliated,
    /// Followers of one belief
    Belief(BeliefId),
    /// Members of one cohort
    Cohort(u8),
}

impl NpcFilter {
    /// Check whether an NPC passes this filter
    pub fn matches(&self, npc: &Npc) -> bool {
        match self {
            NpcFilter::All => true,
            NpcFilter::Neutral => npc.is_neutral(),
            NpcFilter::Affiliated => !npc.is_neutral(),
            NpcFilter::Belief(id) => npc.current_belief() == Some(id.as_str()),
            NpcFilter::Cohort(round) => npc.spawn_round == *round,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn npc(affiliation: Option<Affiliation>) -> Npc {
        Npc {
            id: 3,
            biases: Biases::new(10, 20, 30, 40, 50).unwrap(),
            biases_revealed: false,
            affiliation,
            spawn_round: 1,
        }
    }

    #[test]
    fn test_biases_rejects_out_of_range() {
        assert!(Biases::new(101, 0, 0, 0, 0).is_err());
        assert_eq!(Biases::new(0, 0, 30, 0, 0).unwrap().risk_aversion(), 70);
    }

    #[test]
    fn test_view_hides_biases_until_revealed() {
        let mut n = npc(None);
        assert!(n.view().biases.is_none());
        assert_eq!(n.view().conviction, 0);

        n.biases_revealed = true;
        assert_eq!(n.view().biases, Some(n.biases));
    }

    #[test]
    fn test_zero_conviction_is_still_affiliated() {
        let n = npc(Some(Affiliation {
            belief: "order".into(),
            conviction: 0,
        }));
        assert!(!n.is_neutral());
        assert_eq!(n.view().current_belief.as_deref(), Some("order"));
        assert!(n.follows_other_than("chaos"));
        assert!(!n.follows_other_than("order"));
    }

    #[test]
    fn test_future_cohort_is_inconsistent() {
        let mut n = npc(None);
        n.spawn_round = 2;
        assert!(n.check_invariants(2).is_ok());
        assert!(n.check_invariants(1).unwrap_err().is_fatal());
    }

    #[test]
    fn test_filters() {
        let neutral = npc(None);
        let follower = npc(Some(Affiliation {
            belief: "order".into(),
            conviction: 50,
        }));

        assert!(NpcFilter::Neutral.matches(&neutral));
        assert!(!NpcFilter::Neutral.matches(&follower));
        assert!(NpcFilter::Affiliated.matches(&follower));
        assert!(NpcFilter::Belief("order".into()).matches(&follower));
        assert!(!NpcFilter::Belief("chaos".into()).matches(&follower));
        assert!(NpcFilter::Cohort(1).matches(&neutral));
        assert!(!NpcFilter::Cohort(2).matches(&neutral));
    }
}
