//! Belief standings derived from NPC state and the attempt log.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{MarketError, Result};
use crate::ledger::Outcome;
use crate::npc::Npc;
use crate::roster::{AgentId, Belief, BeliefId};

use super::PersuasionAttempt;

/// One belief's row on the leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    /// 1-based rank
    pub rank: usize,
    /// Belief id
    pub belief_id: BeliefId,
    /// Display name
    pub name: String,
    /// Ticker symbol
    pub symbol: String,
    /// Founding agent
    pub founder: AgentId,
    /// NPCs currently following
    pub followers: usize,
    /// Mean conviction of followers, 0 with no followers
    pub average_conviction: f64,
    /// Paid attempts made with this belief; refused attempts are not counted
    pub attempts: usize,
    /// Neutral NPCs converted
    pub conversions: usize,
    /// Rival followers flipped
    pub flips: usize,
    /// Tokens spent on this belief
    pub tokens_spent: u64,
    #[serde(skip)]
    created_seq: u64,
}

/// Ranking over all registered beliefs
pub struct Leaderboard;

impl Leaderboard {
    /// Rank `beliefs` by followers, then average conviction, then age.
    ///
    /// An NPC following a belief missing from `beliefs` is an
    /// inconsistency, not something to skip.
    pub fn compute(
        beliefs: &[Belief],
        npcs: &[Npc],
        attempts: &[PersuasionAttempt],
    ) -> Result<Vec<Standing>> {
        let mut rows: HashMap<&str, Standing> = beliefs
            .iter()
            .map(|b| {
                (
                    b.id.as_str(),
                    Standing {
                        rank: 0,
                        belief_id: b.id.clone(),
                        name: b.name.clone(),
                        symbol: b.symbol.clone(),
                        founder: b.founder.clone(),
                        followers: 0,
                        average_conviction: 0.0,
                        attempts: 0,
                        conversions: 0,
                        flips: 0,
                        tokens_spent: 0,
                        created_seq: b.created_seq,
                    },
                )
            })
            .collect();

        let mut conviction_sum: HashMap<&str, u64> = HashMap::new();
        for npc in npcs {
            let Some(belief) = npc.current_belief() else {
                continue;
            };
            let row = rows.get_mut(belief).ok_or_else(|| {
                MarketError::InternalInconsistency(format!(
                    "npc {} follows unregistered belief {belief}",
                    npc.id
                ))
            })?;
            row.followers += 1;
            *conviction_sum.entry(belief).or_default() += u64::from(npc.conviction());
        }

        for attempt in attempts {
            // attempts against since-removed beliefs don't affect standings
            let Some(row) = rows.get_mut(attempt.belief_id.as_str()) else {
                continue;
            };
            if attempt.outcome == Outcome::Rejected {
                continue;
            }
            row.attempts += 1;
            row.tokens_spent += attempt.cost;
            match attempt.outcome {
                Outcome::Converted => row.conversions += 1,
                Outcome::Flipped => row.flips += 1,
                _ => {},
            }
        }

        let mut standings: Vec<Standing> = rows
            .into_iter()
            .map(|(id, mut row)| {
                if row.followers > 0 {
                    let sum = conviction_sum.get(id).copied().unwrap_or(0);
                    row.average_conviction = sum as f64 / row.followers as f64;
                }
                row
            })
            .collect();

        standings.sort_by(|a, b| {
            b.followers
                .cmp(&a.followers)
                .then(b.average_conviction.total_cmp(&a.average_conviction))
                .then(a.created_seq.cmp(&b.created_seq))
        });
        for (i, row) in standings.iter_mut().enumerate() {
            row.rank = i + 1;
        }

        Ok(standings)
    }
}
