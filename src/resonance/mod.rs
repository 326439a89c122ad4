//! Resonance scoring: how well a persuasion message lands on one NPC.
//!
//! A score is a convex blend of two components, damped by the round:
//!
//! ```text
//! alignment = style response to the NPC's biases        [0,100]
//! content   = message coverage of core values/promises  [0,100]
//!
//! resonance = clamp((w_a * alignment + w_c * content) * damping[round], 0, 100)
//! ```
//!
//! | Round | Phase        | Damping |
//! |-------|--------------|---------|
//! | 1     | Seeding      | 1.00    |
//! | 2     | Adaptation   | 0.85    |
//! | 3     | Polarization | 0.70    |
//!
//! Scoring is a pure function of `(message, belief, npc biases, round)`:
//! no state is read or written, so it runs outside every lock.

pub mod lexicon;
pub mod style;

use serde::{Deserialize, Serialize};

use crate::config::ResonanceConfig;
use crate::npc::Npc;
use crate::roster::Belief;

/// Score with its components, for explanations and tests
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resonance {
    /// Style alignment component, [0,100]
    pub alignment: f64,
    /// Content match component, [0,100]
    pub content: f64,
    /// Whether the message pitched change
    pub signals_change: bool,
    /// Round damping factor applied
    pub damping: f64,
    /// Final integer score, [0,100]
    pub score: u8,
}

/// Stateless resonance scorer
#[derive(Debug, Clone, Default)]
pub struct ResonanceEngine {
    config: ResonanceConfig,
}

impl ResonanceEngine {
    /// Create an engine with the given weights
    pub fn new(config: ResonanceConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    pub fn config(&self) -> &ResonanceConfig {
        &self.config
    }

    /// Damping factor for a round (1-based); out-of-range rounds use the
    /// nearest configured one.
    pub fn damping(&self, round: u8) -> f64 {
        let damping = &self.config.round_damping;
        let idx = usize::from(round.max(1) - 1).min(damping.len() - 1);
        damping[idx]
    }

    /// Resonance score in [0,100]
    pub fn score(&self, message: &str, belief: &Belief, npc: &Npc, round: u8) -> u8 {
        self.explain(message, belief, npc, round).score
    }

    /// Resonance with its components
    pub fn explain(&self, message: &str, belief: &Belief, npc: &Npc, round: u8) -> Resonance {
        let words = lexicon::tokens(message);
        let signals_change = lexicon::signals_change(&words);

        let alignment = style::alignment(belief.messaging_style, &npc.biases, signals_change);
        let content = lexicon::content_match(
            &words,
            &belief.core_values,
            &belief.promises,
            self.config.core_value_weight,
        );

        let damping = self.damping(round);
        let blended =
            self.config.alignment_weight * alignment + self.config.content_weight() * content;
        let score = (blended * damping).clamp(0.0, 100.0).round() as u8;

        Resonance {
            alignment,
            content,
            signals_change,
            damping,
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npc::Biases;
    use crate::roster::MessagingStyle;

    fn deferent_npc() -> Npc {
        Npc {
            id: 0,
            biases: Biases::new(90, 10, 50, 50, 50).unwrap(),
            biases_revealed: false,
            affiliation: None,
            spawn_round: 1,
        }
    }

    fn order() -> Belief {
        Belief::new("order", "alice", MessagingStyle::Authoritarian)
            .with_core_values(&["order", "hierarchy", "tradition"])
            .with_promises(&["security", "clear purpose"])
    }

    fn commons() -> Belief {
        Belief::new("commons", "bob", MessagingStyle::Inclusive)
            .with_core_values(&["equality", "diversity", "openness"])
            .with_promises(&["shared prosperity"])
    }

    const PITCH: &str = "Order, hierarchy and tradition keep this city standing.";

    #[test]
    fn test_matching_style_scores_high() {
        let engine = ResonanceEngine::default();
        let r = engine.explain(PITCH, &order(), &deferent_npc(), 1);

        assert!((r.alignment - 98.0).abs() < 1e-9);
        assert!((r.content - 60.0).abs() < 1e-9);
        // 0.6 * 98 + 0.4 * 60 = 82.8
        assert_eq!(r.score, 83);
        assert!(r.score >= 70);
    }

    #[test]
    fn test_clashing_style_scores_low() {
        let engine = ResonanceEngine::default();
        let score = engine.score(PITCH, &commons(), &deferent_npc(), 1);
        // 0.6 * 2 + 0.4 * 0 = 1.2
        assert_eq!(score, 1);
        assert!(score <= 40);
    }

    #[test]
    fn test_round_damping_ramp() {
        let engine = ResonanceEngine::default();
        let npc = deferent_npc();
        let r1 = engine.score(PITCH, &order(), &npc, 1);
        let r2 = engine.score(PITCH, &order(), &npc, 2);
        let r3 = engine.score(PITCH, &order(), &npc, 3);

        // 82.8 * 0.85 = 70.38, 82.8 * 0.7 = 57.96
        assert_eq!((r1, r2, r3), (83, 70, 58));
    }

    #[test]
    fn test_damping_out_of_range_rounds() {
        let engine = ResonanceEngine::default();
        assert!((engine.damping(0) - 1.0).abs() < 1e-9);
        assert!((engine.damping(9) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_score_is_deterministic() {
        let engine = ResonanceEngine::default();
        let npc = deferent_npc();
        let first = engine.explain(PITCH, &order(), &npc, 2);
        for _ in 0..10 {
            assert_eq!(engine.explain(PITCH, &order(), &npc, 2), first);
        }
    }

    #[test]
    fn test_empty_message_is_style_only() {
        let engine = ResonanceEngine::default();
        let r = engine.explain("", &order(), &deferent_npc(), 1);
        assert!(r.content.abs() < 1e-9);
        // 0.6 * 98 = 58.8
        assert_eq!(r.score, 59);
    }
}
