//! Bias generation for freshly spawned cohorts.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{Biases, Npc, NpcId};

/// Upper bound of every bias trait
pub const BIAS_MAX: u8 = 100;

/// Draws hidden bias profiles and hands out NPC ids.
///
/// Each trait is the mean of two uniform draws in `[0, 100]`, a mild skew
/// towards the centre so extreme profiles are rarer than moderate ones.
/// Given the same random source the model produces the same cohorts.
#[derive(Debug, Clone)]
pub struct BiasModel<R = ChaCha8Rng> {
    rng: R,
    next_id: NpcId,
}

impl BiasModel<ChaCha8Rng> {
    /// Create a model backed by a seeded ChaCha generator
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> BiasModel<R> {
    /// Create a model from an injected random source
    pub fn with_rng(rng: R) -> Self {
        Self { rng, next_id: 0 }
    }

    /// Next id that will be assigned
    pub fn next_id(&self) -> NpcId {
        self.next_id
    }

    /// Spawn `count` neutral, unrevealed NPCs for `round`.
    ///
    /// Ids continue from the previous cohort and are never reused.
    pub fn spawn_cohort(&mut self, round: u8, count: usize) -> Vec<Npc> {
        (0..count)
            .map(|_| {
                let id = self.next_id;
                self.next_id += 1;
                Npc {
                    id,
                    biases: self.draw(),
                    biases_revealed: false,
                    affiliation: None,
                    spawn_round: round,
                }
            })
            .collect()
    }

    fn draw(&mut self) -> Biases {
        Biases {
            authority: self.trait_value(),
            fairness: self.trait_value(),
            risk: self.trait_value(),
            optimism: self.trait_value(),
            individualism: self.trait_value(),
        }
    }

    fn trait_value(&mut self) -> u8 {
        let a = u16::from(self.rng.gen_range(0..=BIAS_MAX));
        let b = u16::from(self.rng.gen_range(0..=BIAS_MAX));
        // mean of two u8 in range fits back into u8
        ((a + b) / 2) as u8
    }
}
