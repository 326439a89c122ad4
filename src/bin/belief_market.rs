//! Belief Market CLI binary.
//!
//! # Commands
//!
//! - `serve` - Start the HTTP game server
//! - `simulate` - Play a complete offline game with scripted agents
//! - `config` - Print the effective configuration

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use belief_market::{
    server::{AppState, Server, ServerConfig},
    Belief, Config, GameEngine, MarketError, MessagingStyle, NpcFilter, NpcId, Outcome,
    PersuasionRequest, VERSION,
};

#[derive(Parser)]
#[command(name = "belief-market")]
#[command(version = VERSION)]
#[command(about = "Belief Market - persuasion and conviction engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP game server
    Serve {
        /// Listen port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Listen host (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Bind to all interfaces
        #[arg(long)]
        bind_all: bool,

        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seed for NPC biases
        #[arg(long)]
        seed: Option<u64>,

        /// Advance rounds automatically when they expire
        #[arg(long)]
        auto_advance: bool,

        /// Round length in seconds
        #[arg(long)]
        round_secs: Option<u64>,

        /// Verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Play a complete offline game with scripted agents
    Simulate {
        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seed for NPC biases
        #[arg(long)]
        seed: Option<u64>,

        /// Attempts per agent per round
        #[arg(short, long, default_value = "12")]
        attempts: usize,

        /// Print the final leaderboard as JSON
        #[arg(long)]
        json: bool,

        /// Verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            host,
            bind_all,
            config,
            seed,
            auto_advance,
            round_secs,
            verbose,
        } => cmd_serve(
            port,
            host,
            bind_all,
            config,
            seed,
            auto_advance,
            round_secs,
            verbose,
        ),

        Commands::Simulate {
            config,
            seed,
            attempts,
            json,
            verbose,
        } => cmd_simulate(config, seed, attempts, json, verbose),

        Commands::Config { config } => cmd_config(config),
    }
}

fn init_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();
}

#[allow(clippy::too_many_arguments, clippy::fn_params_excessive_bools)]
fn cmd_serve(
    port: Option<u16>,
    host: Option<String>,
    bind_all: bool,
    config_path: Option<PathBuf>,
    seed: Option<u64>,
    auto_advance: bool,
    round_secs: Option<u64>,
    verbose: bool,
) -> anyhow::Result<()> {
    init_logging(verbose);

    let mut market = Config::load(config_path.as_deref())?;
    if let Some(host) = host {
        market.http.host = host;
    }
    if let Some(port) = port {
        market.http.port = port;
    }
    if let Some(seed) = seed {
        market.game.seed = seed;
    }
    if let Some(secs) = round_secs {
        market.game.round_secs = secs;
    }
    if auto_advance {
        market.game.auto_advance = true;
    }
    if market.roster.beliefs.is_empty() {
        tracing::warn!("No beliefs configured; loading the demo roster");
        market.roster.beliefs = demo_beliefs();
    }
    market.validate()?;

    let mut config = ServerConfig::from_market(&market)?;
    if bind_all {
        config = config.bind_all();
    }
    if market.game.auto_advance {
        config = config.with_auto_advance(Duration::from_secs(1));
    }

    tracing::info!(
        "Seed {:#x}, cohorts {:?}, rounds of {}s",
        market.game.seed,
        market.game.cohort_sizes,
        market.game.round_secs
    );

    let state = AppState::from_config(config, market)?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async { Server::new(state).run().await })?;
    Ok(())
}

fn cmd_simulate(
    config_path: Option<PathBuf>,
    seed: Option<u64>,
    attempts: usize,
    json: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    if verbose {
        init_logging(true);
    }

    let mut market = Config::load(config_path.as_deref())?;
    if let Some(seed) = seed {
        market.game.seed = seed;
    }
    if market.roster.beliefs.is_empty() {
        market.roster.beliefs = demo_beliefs();
    }

    let engine = GameEngine::from_config(&market)?;
    let beliefs = engine.beliefs();

    engine.start()?;
    loop {
        let info = engine.info()?;
        let Some(round) = info.round else {
            break;
        };

        let mut tally = [0usize; 4];
        for turn in 0..attempts {
            for belief in &beliefs {
                let Some(target) = pick_target(&engine, belief, turn) else {
                    continue;
                };
                let request =
                    PersuasionRequest::new(&belief.founder, &belief.id, target, &pitch(belief));
                match engine.persuade(&request) {
                    Ok(receipt) => match receipt.outcome {
                        Outcome::Converted => tally[0] += 1,
                        Outcome::Reinforced => tally[1] += 1,
                        Outcome::Flipped => tally[2] += 1,
                        Outcome::Resisted | Outcome::Rejected => tally[3] += 1,
                    },
                    Err(MarketError::InsufficientFunds { .. }) => tally[3] += 1,
                    Err(e) => return Err(e.into()),
                }
            }
        }

        if !json {
            println!(
                "Round {round}: {} converted, {} reinforced, {} flipped, {} missed",
                tally[0], tally[1], tally[2], tally[3]
            );
            print_standings(&engine)?;
        }
        engine.advance(Some(info.phase))?;
    }

    let board = engine.leaderboard()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&board)?);
    } else if let Some(winner) = board.winner {
        println!(
            "\nWinner: {} ({}) with {} followers",
            winner.name, winner.founder, winner.followers
        );
    }
    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = Config::load(config_path.as_deref())?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn print_standings(engine: &GameEngine) -> anyhow::Result<()> {
    for row in engine.leaderboard()?.standings {
        println!(
            "  #{} {:<14} followers {:>3}  conviction {:>5.1}  spent {:>5}",
            row.rank, row.name, row.followers, row.average_conviction, row.tokens_spent
        );
    }
    Ok(())
}

/// Scripted strategy: neutrals first, then rivals' weakest followers,
/// rotating through candidates by turn.
fn pick_target(engine: &GameEngine, belief: &Belief, turn: usize) -> Option<NpcId> {
    let neutrals = engine.npcs(&NpcFilter::Neutral);
    if !neutrals.is_empty() {
        return Some(neutrals[(turn * 7 + belief.created_seq as usize) % neutrals.len()].id);
    }
    let mut rivals: Vec<_> = engine
        .npcs(&NpcFilter::Affiliated)
        .into_iter()
        .filter(|n| n.current_belief.as_deref() != Some(belief.id.as_str()))
        .collect();
    rivals.sort_by_key(|n| n.conviction);
    rivals.first().map(|n| n.id)
}

fn pitch(belief: &Belief) -> String {
    let opener = match belief.messaging_style {
        MessagingStyle::Authoritarian => "Strong leadership brings order.",
        MessagingStyle::Inclusive => "Together we build a fair community.",
        MessagingStyle::Rational => "The evidence is clear.",
        MessagingStyle::Emotional => "Imagine a brighter tomorrow.",
    };
    format!(
        "{opener} We stand for {}. We promise {}.",
        belief.core_values.join(", "),
        belief.promises.join(", ")
    )
}

fn demo_beliefs() -> Vec<Belief> {
    vec![
        Belief::new("iron-order", "warden", MessagingStyle::Authoritarian)
            .with_name("Iron Order")
            .with_core_values(&["order", "discipline", "security"])
            .with_promises(&["safe streets", "stable leadership"])
            .with_tradeoffs(&["less dissent"]),
        Belief::new("commons", "weaver", MessagingStyle::Inclusive)
            .with_name("The Commons")
            .with_core_values(&["fairness", "community", "equality"])
            .with_promises(&["shared prosperity", "a voice for everyone"])
            .with_tradeoffs(&["slower decisions"]),
        Belief::new("ledger", "auditor", MessagingStyle::Rational)
            .with_name("The Ledger")
            .with_core_values(&["evidence", "efficiency", "progress"])
            .with_promises(&["measurable results"])
            .with_tradeoffs(&["cold calculus"]),
        Belief::new("dawn", "dreamer", MessagingStyle::Emotional)
            .with_name("Dawn")
            .with_core_values(&["hope", "belonging", "joy"])
            .with_promises(&["a brighter future"])
            .with_tradeoffs(&["uncertain plans"]),
    ]
}
