//! Messaging-style alignment against an NPC's bias profile.
//!
//! Each style is a linear response around a neutral profile (every trait
//! at 50): a positive weight means the style lands better the higher that
//! trait, a negative weight means the trait pushes back.

use crate::npc::Biases;
use crate::roster::MessagingStyle;

/// Linear response of one messaging style
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleWeights {
    /// Alignment for a perfectly neutral profile
    pub base: f64,
    /// Weight on authority
    pub authority: f64,
    /// Weight on fairness
    pub fairness: f64,
    /// Weight on risk tolerance
    pub risk: f64,
    /// Weight on optimism
    pub optimism: f64,
    /// Weight on individualism
    pub individualism: f64,
}

/// Authoritarian: loves authority, resented by fairness and individualism
pub const AUTHORITARIAN: StyleWeights = StyleWeights {
    base: 50.0,
    authority: 0.9,
    fairness: -0.3,
    risk: 0.0,
    optimism: 0.0,
    individualism: -0.3,
};

/// Inclusive: fairness and individualism, resented by authority
pub const INCLUSIVE: StyleWeights = StyleWeights {
    base: 50.0,
    authority: -0.6,
    fairness: 0.6,
    risk: 0.0,
    optimism: 0.0,
    individualism: 0.4,
};

/// Rational: low risk aversion and high optimism
pub const RATIONAL: StyleWeights = StyleWeights {
    base: 50.0,
    authority: 0.0,
    fairness: 0.0,
    risk: 0.5,
    optimism: 0.5,
    individualism: 0.0,
};

/// Emotional: broad appeal, nudged by optimism
pub const EMOTIONAL: StyleWeights = StyleWeights {
    base: 60.0,
    authority: 0.0,
    fairness: 0.0,
    risk: 0.0,
    optimism: 0.2,
    individualism: 0.0,
};

/// Emotional pitches for change lose this much per point of risk
/// aversion above 50.
pub const EMOTIONAL_CHANGE_PENALTY: f64 = 0.6;

/// Weights for a style
pub fn weights(style: MessagingStyle) -> StyleWeights {
    match style {
        MessagingStyle::Authoritarian => AUTHORITARIAN,
        MessagingStyle::Inclusive => INCLUSIVE,
        MessagingStyle::Rational => RATIONAL,
        MessagingStyle::Emotional => EMOTIONAL,
    }
}

/// Alignment in [0,100] between a style and a bias profile.
///
/// `signals_change` is whether the message pitches change; it only
/// matters for the emotional style.
pub fn alignment(style: MessagingStyle, biases: &Biases, signals_change: bool) -> f64 {
    let w = weights(style);
    let centred = |v: u8| f64::from(v) - 50.0;

    let mut score = w.base
        + w.authority * centred(biases.authority)
        + w.fairness * centred(biases.fairness)
        + w.risk * centred(biases.risk)
        + w.optimism * centred(biases.optimism)
        + w.individualism * centred(biases.individualism);

    if style == MessagingStyle::Emotional && signals_change {
        let excess_aversion = (f64::from(biases.risk_aversion()) - 50.0).max(0.0);
        score -= EMOTIONAL_CHANGE_PENALTY * excess_aversion;
    }

    score.clamp(0.0, 100.0)
}
