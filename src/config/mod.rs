//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables
//! - CLI arguments (applied by the binary)
//!
//! Every section has defaults, so a config file only needs the keys it
//! changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MarketError, Result};
use crate::roster::Belief;

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Round and cohort configuration
    #[serde(default)]
    pub game: GameConfig,

    /// Resonance weighting
    #[serde(default)]
    pub resonance: ResonanceConfig,

    /// Conviction thresholds
    #[serde(default)]
    pub conviction: ConvictionConfig,

    /// Persuasion costs
    #[serde(default)]
    pub economy: EconomyConfig,

    /// Agents and beliefs loaded at startup
    #[serde(default)]
    pub roster: RosterConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| MarketError::Config(format!("Failed to read config file: {e}")))?;

        Ok(toml::from_str(&content)?)
    }

    /// Default config file location (`$CONFIG_DIR/belief-market/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("belief-market").join("config.toml"))
    }

    /// Load from `path`, or the default location if it exists, then apply
    /// environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(path)?,
                None => Self::default(),
            },
        };

        let config = config.with_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn with_env(mut self) -> Self {
        if let Ok(host) = std::env::var("BELIEF_MARKET_HOST") {
            self.http.host = host;
        }
        if let Ok(port) = std::env::var("BELIEF_MARKET_PORT") {
            if let Ok(port) = port.parse() {
                self.http.port = port;
            }
        }
        if let Ok(seed) = std::env::var("BELIEF_MARKET_SEED") {
            if let Ok(seed) = seed.parse() {
                self.game.seed = seed;
            }
        }
        if let Ok(secs) = std::env::var("BELIEF_MARKET_ROUND_SECS") {
            if let Ok(secs) = secs.parse() {
                self.game.round_secs = secs;
            }
        }
        if let Ok(flag) = std::env::var("BELIEF_MARKET_AUTO_ADVANCE") {
            self.game.auto_advance = matches!(flag.as_str(), "1" | "true" | "yes");
        }

        self
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let r = &self.resonance;
        if !(0.0..=1.0).contains(&r.alignment_weight) {
            return Err(MarketError::Config(format!(
                "resonance.alignment_weight must be in [0,1], got {}",
                r.alignment_weight
            )));
        }
        if !(0.0..=1.0).contains(&r.core_value_weight) {
            return Err(MarketError::Config(format!(
                "resonance.core_value_weight must be in [0,1], got {}",
                r.core_value_weight
            )));
        }
        if let Some(d) = r.round_damping.iter().find(|d| !(**d > 0.0 && **d <= 1.0)) {
            return Err(MarketError::Config(format!(
                "resonance.round_damping values must be in (0,1], got {d}"
            )));
        }

        let c = &self.conviction;
        for (name, value) in [
            ("convert_threshold", c.convert_threshold),
            ("reinforce_threshold", c.reinforce_threshold),
            ("flip_threshold", c.flip_threshold),
        ] {
            if value > 100 {
                return Err(MarketError::Config(format!(
                    "conviction.{name} must be at most 100, got {value}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&c.flip_retention) {
            return Err(MarketError::Config(format!(
                "conviction.flip_retention must be in [0,1], got {}",
                c.flip_retention
            )));
        }

        for (name, value) in [
            ("reinforce_gain", c.reinforce_gain),
            ("loyalty_base", c.loyalty_base),
            ("loyalty_per_conviction", c.loyalty_per_conviction),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(MarketError::Config(format!(
                    "conviction.{name} must be a non-negative number, got {value}"
                )));
            }
        }

        if self.economy.round_costs.contains(&0) {
            return Err(MarketError::Config(
                "economy.round_costs must all be positive".to_string(),
            ));
        }
        if self.economy.flip_multiplier == 0 {
            return Err(MarketError::Config(
                "economy.flip_multiplier must be positive".to_string(),
            ));
        }
        if self.game.cohort_sizes.contains(&0) {
            return Err(MarketError::Config(
                "game.cohort_sizes must all be positive".to_string(),
            ));
        }
        if self.game.round_secs == 0 {
            return Err(MarketError::Config(
                "game.round_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allow cross-origin reads (dashboard)
    pub cors_enabled: bool,

    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            cors_enabled: true,
            max_body_size: 64 * 1024,
        }
    }
}

impl HttpConfig {
    /// Get the full listen address
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Round scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Seed for NPC bias draws
    pub seed: u64,

    /// NPCs spawned at the start of rounds 1, 2 and 3
    pub cohort_sizes: [usize; 3],

    /// Round length in seconds
    pub round_secs: u64,

    /// Advance automatically when a round expires
    pub auto_advance: bool,

    /// Balance for roster agents that do not set one
    pub starting_balance: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            seed: 0x00be_11ef,
            cohort_sizes: [50, 30, 20],
            round_secs: 600,
            auto_advance: false,
            starting_balance: 5_000,
        }
    }
}

/// Resonance weighting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResonanceConfig {
    /// Share of the score from style alignment; content takes the rest
    pub alignment_weight: f64,

    /// Share of content match from core values; promises take the rest
    pub core_value_weight: f64,

    /// Multiplicative damping for rounds 1, 2 and 3
    pub round_damping: [f64; 3],
}

impl Default for ResonanceConfig {
    fn default() -> Self {
        Self {
            alignment_weight: 0.6,
            core_value_weight: 0.6,
            round_damping: [1.0, 0.85, 0.70],
        }
    }
}

impl ResonanceConfig {
    /// Share of the score from content match
    pub fn content_weight(&self) -> f64 {
        1.0 - self.alignment_weight
    }
}

/// Conviction thresholds and transfer rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvictionConfig {
    /// Minimum resonance to convert a neutral NPC
    pub convert_threshold: u8,

    /// Minimum resonance to reinforce an existing follower
    pub reinforce_threshold: u8,

    /// Minimum resonance to flip a rival's follower
    pub flip_threshold: u8,

    /// Conviction gained per point of resonance on reinforcement
    pub reinforce_gain: f64,

    /// Share of resonance kept as conviction after a flip
    pub flip_retention: f64,

    /// Loyalty bar intercept
    pub loyalty_base: f64,

    /// Loyalty bar slope per point of current conviction
    pub loyalty_per_conviction: f64,
}

impl Default for ConvictionConfig {
    fn default() -> Self {
        Self {
            convert_threshold: 60,
            reinforce_threshold: 50,
            flip_threshold: 65,
            reinforce_gain: 0.25,
            flip_retention: 0.6,
            loyalty_base: 30.0,
            loyalty_per_conviction: 0.6,
        }
    }
}

/// Persuasion costs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Base cost in rounds 1, 2 and 3
    pub round_costs: [u64; 3],

    /// Cost multiplier for targeting a rival's follower
    pub flip_multiplier: u64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            round_costs: [100, 250, 500],
            flip_multiplier: 2,
        }
    }
}

/// Agents and beliefs registered at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    /// Agents to open accounts for
    pub agents: Vec<AgentSeed>,

    /// Beliefs to register, in creation order
    pub beliefs: Vec<Belief>,
}

/// One roster agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSeed {
    /// Agent id
    pub id: String,

    /// Starting balance, defaults to `game.starting_balance`
    #[serde(default)]
    pub balance: Option<u64>,
}
