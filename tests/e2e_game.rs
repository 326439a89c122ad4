//! End-to-end game tests.
//!
//! These drive a full engine through its rounds and check the rules an
//! agent observes: pricing, outcomes, cohorts, history and standings.

use std::io::Write;

use belief_market::config::AgentSeed;
use belief_market::npc::Affiliation;
use belief_market::{
    Belief, Biases, Config, GameEngine, HistoryQuery, MarketError, MessagingStyle, Npc, NpcFilter,
    Outcome, Phase, PersuasionRequest,
};

const ORDER_PITCH: &str = "Order and discipline bring security and stable leadership.";
const COMMONS_PITCH: &str = "Fairness and community mean shared prosperity for everyone.";

fn market() -> Config {
    let mut config = Config::default();
    config.roster.beliefs = vec![
        Belief::new("order", "alice", MessagingStyle::Authoritarian)
            .with_name("Iron Order")
            .with_core_values(&["order", "discipline", "security"])
            .with_promises(&["stable leadership"]),
        Belief::new("commons", "bob", MessagingStyle::Inclusive)
            .with_name("The Commons")
            .with_core_values(&["fairness", "community"])
            .with_promises(&["shared prosperity"]),
    ];
    config
}

fn belief(engine: &GameEngine, id: &str) -> Belief {
    engine.beliefs().into_iter().find(|b| b.id == id).unwrap()
}

fn hidden(engine: &GameEngine, id: u64) -> Npc {
    engine.ledger().get(id).unwrap()
}

/// First neutral NPC that `pitch` is predicted to convert
fn convertible(engine: &GameEngine, belief: &Belief, pitch: &str, round: u8) -> Npc {
    let threshold = engine.ledger().config().convert_threshold;
    engine
        .ledger()
        .snapshot(&NpcFilter::Neutral)
        .into_iter()
        .find(|n| engine.resonance().score(pitch, belief, n, round) >= threshold)
        .expect("some neutral NPC should be convertible")
}

#[test]
fn test_cohorts_spawn_per_round() {
    let engine = GameEngine::from_config(&market()).unwrap();
    assert!(engine.npcs(&NpcFilter::All).is_empty());

    engine.start_at(0).unwrap();
    assert_eq!(engine.npcs(&NpcFilter::All).len(), 50);
    assert!(matches!(engine.npc(50), Err(MarketError::UnknownTarget(50))));

    engine.advance_at(Some(Phase::Round1), 1).unwrap();
    assert_eq!(engine.npcs(&NpcFilter::Cohort(2)).len(), 30);

    engine.advance_at(Some(Phase::Round2), 2).unwrap();
    let all = engine.npcs(&NpcFilter::All);
    assert_eq!(all.len(), 100);
    assert_eq!(engine.npcs(&NpcFilter::Cohort(3)).len(), 20);

    let ids: Vec<u64> = all.iter().map(|n| n.id).collect();
    assert_eq!(ids, (0..100).collect::<Vec<_>>());
    assert!(all.iter().all(|n| n.current_belief.is_none() && !n.biases_revealed));

    engine.advance_at(Some(Phase::Round3), 3).unwrap();
    assert_eq!(engine.info().unwrap().phase, Phase::Ended);
    assert_eq!(engine.npcs(&NpcFilter::All).len(), 100);
    assert!(engine.advance_at(None, 4).is_err());
}

#[test]
fn test_conversion_then_flip_pricing() {
    let engine = GameEngine::from_config(&market()).unwrap();
    engine.start_at(0).unwrap();

    let order = belief(&engine, "order");
    let target = convertible(&engine, &order, ORDER_PITCH, 1);
    let expected = engine.resonance().score(ORDER_PITCH, &order, &target, 1);

    let receipt = engine
        .persuade_at(&PersuasionRequest::new("alice", "order", target.id, ORDER_PITCH), 1)
        .unwrap();
    assert_eq!(receipt.outcome, Outcome::Converted);
    assert_eq!(receipt.resonance_score, expected);
    assert_eq!(receipt.updated_conviction, expected);
    assert_eq!(receipt.current_belief.as_deref(), Some("order"));
    assert_eq!(receipt.cost_paid, 100);

    let view = engine.npc(target.id).unwrap();
    assert!(view.biases_revealed);
    assert_eq!(view.biases, Some(target.biases));

    // a rival follower costs double in round 1
    let receipt = engine
        .persuade_at(&PersuasionRequest::new("bob", "commons", target.id, COMMONS_PITCH), 2)
        .unwrap();
    assert_eq!(receipt.cost_paid, 200);
    assert_eq!(receipt.balance, 4_800);
    assert!(matches!(receipt.outcome, Outcome::Flipped | Outcome::Resisted));
}

fn order_follower(id: u64, biases: Biases, conviction: u8) -> Npc {
    Npc {
        id,
        biases,
        biases_revealed: false,
        affiliation: Some(Affiliation {
            belief: "order".into(),
            conviction,
        }),
        spawn_round: 1,
    }
}

#[test]
fn test_round_two_flips_against_loyalty() {
    let engine = GameEngine::from_config(&market()).unwrap();
    engine.start_at(0).unwrap();
    engine.advance_at(Some(Phase::Round1), 1).unwrap();

    // commons pitch fully matches its values; alignment comes from the biases
    let deferent = Biases::new(80, 50, 50, 50, 50).unwrap();
    let egalitarian = Biases::new(10, 90, 50, 50, 90).unwrap();
    engine
        .ledger()
        .admit(vec![
            order_follower(1_000, deferent, 80),
            order_follower(1_001, egalitarian, 50),
            order_follower(1_002, egalitarian, 95),
        ])
        .unwrap();

    let pitch = |id| PersuasionRequest::new("bob", "commons", id, COMMONS_PITCH);

    // (0.6 * 32 + 0.4 * 100) * 0.85 rounds to 50: below the flip threshold
    let receipt = engine.persuade_at(&pitch(1_000), 2).unwrap();
    assert_eq!(receipt.cost_paid, 500);
    assert_eq!(receipt.resonance_score, 50);
    assert_eq!(receipt.outcome, Outcome::Resisted);
    assert_eq!(receipt.current_belief.as_deref(), Some("order"));
    assert_eq!(receipt.updated_conviction, 80);
    assert_eq!(receipt.balance, 4_500);

    // 85 clears the threshold and the loyalty bar of 30 + 0.6 * 50
    let receipt = engine.persuade_at(&pitch(1_001), 3).unwrap();
    assert_eq!(receipt.cost_paid, 500);
    assert_eq!(receipt.resonance_score, 85);
    assert_eq!(receipt.outcome, Outcome::Flipped);
    assert_eq!(receipt.current_belief.as_deref(), Some("commons"));
    assert_eq!(receipt.updated_conviction, 51);

    // same 85 against conviction 95 stays under the bar of 87
    let receipt = engine.persuade_at(&pitch(1_002), 4).unwrap();
    assert_eq!(receipt.cost_paid, 500);
    assert_eq!(receipt.resonance_score, 85);
    assert_eq!(receipt.outcome, Outcome::Resisted);
    assert_eq!(receipt.updated_conviction, 95);
    assert_eq!(receipt.balance, 3_500);

    assert_eq!(hidden(&engine, 1_000).current_belief(), Some("order"));
    assert_eq!(hidden(&engine, 1_001).current_belief(), Some("commons"));
    assert!(hidden(&engine, 1_002).biases_revealed);
}

#[test]
fn test_reinforcement_costs_base_price() {
    let engine = GameEngine::from_config(&market()).unwrap();
    engine.start_at(0).unwrap();

    let order = belief(&engine, "order");
    let target = convertible(&engine, &order, ORDER_PITCH, 1);
    let request = PersuasionRequest::new("alice", "order", target.id, ORDER_PITCH);

    let first = engine.persuade_at(&request, 1).unwrap();
    let second = engine.persuade_at(&request, 2).unwrap();

    assert_eq!(second.cost_paid, 100);
    assert_eq!(second.outcome, Outcome::Reinforced);
    let gain = (0.25 * f64::from(second.resonance_score)).round() as u8;
    assert_eq!(
        second.updated_conviction,
        first.updated_conviction.saturating_add(gain).min(100)
    );
}

#[test]
fn test_later_rounds_cost_more_and_damp() {
    let engine = GameEngine::from_config(&market()).unwrap();
    engine.start_at(0).unwrap();
    engine.advance_at(Some(Phase::Round1), 1).unwrap();

    let order = belief(&engine, "order");
    let target = hidden(&engine, 60);
    assert_eq!(target.spawn_round, 2);

    let round1 = engine.resonance().score(ORDER_PITCH, &order, &target, 1);
    let round2 = engine.resonance().score(ORDER_PITCH, &order, &target, 2);
    assert!(round2 <= round1);

    let receipt = engine
        .persuade_at(&PersuasionRequest::new("alice", "order", 60, ORDER_PITCH), 2)
        .unwrap();
    assert_eq!(receipt.cost_paid, 250);
    assert_eq!(receipt.resonance_score, round2);
}

#[test]
fn test_tokens_are_conserved() {
    let engine = GameEngine::from_config(&market()).unwrap();
    engine.start_at(0).unwrap();

    for id in 0..20 {
        let (agent, belief, pitch) = if id % 2 == 0 {
            ("alice", "order", ORDER_PITCH)
        } else {
            ("bob", "commons", COMMONS_PITCH)
        };
        engine
            .persuade_at(&PersuasionRequest::new(agent, belief, id, pitch), id as i64)
            .unwrap();
    }

    let history = engine
        .history(&HistoryQuery {
            limit: Some(500),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(history.total, 20);

    for agent in ["alice", "bob"] {
        let spent: u64 = history
            .items
            .iter()
            .filter(|a| a.agent_id == agent)
            .map(|a| a.cost)
            .sum();
        assert_eq!(engine.balance(agent).unwrap() + spent, 5_000);
    }
}

#[test]
fn test_leaderboard_matches_npc_state() {
    let engine = GameEngine::from_config(&market()).unwrap();
    engine.start_at(0).unwrap();
    let target = convertible(&engine, &belief(&engine, "order"), ORDER_PITCH, 1);

    for id in 0..50 {
        let request = PersuasionRequest::new("alice", "order", id, ORDER_PITCH);
        engine.persuade_at(&request, 1).unwrap();
    }

    let affiliated = engine.npcs(&NpcFilter::Belief("order".into()));
    let board = engine.leaderboard().unwrap();
    let order = board
        .standings
        .iter()
        .find(|s| s.belief_id == "order")
        .unwrap();

    assert_eq!(order.followers, affiliated.len());
    assert_eq!(order.attempts, 50);
    assert_eq!(order.conversions, affiliated.len());
    assert_eq!(order.tokens_spent, 5_000);
    assert!(affiliated.iter().any(|n| n.id == target.id));
    assert_eq!(board.standings[0].belief_id, "order");

    // alice is now broke; the next attempt is refused and audited
    let request = PersuasionRequest::new("alice", "order", 0, ORDER_PITCH);
    assert!(matches!(
        engine.persuade_at(&request, 2),
        Err(MarketError::InsufficientFunds { .. })
    ));
    let rejected = engine
        .history(&HistoryQuery {
            agent_id: Some("alice".into()),
            limit: Some(1),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(rejected.items[0].outcome, Outcome::Rejected);

    // the refused attempt is audited but not counted as played
    let board = engine.leaderboard().unwrap();
    let order = board
        .standings
        .iter()
        .find(|s| s.belief_id == "order")
        .unwrap();
    assert_eq!(order.attempts, 50);
}

#[test]
fn test_game_ends_frozen_with_winner() {
    let engine = GameEngine::from_config(&market()).unwrap();
    engine.start_at(0).unwrap();

    let order = belief(&engine, "order");
    let target = convertible(&engine, &order, ORDER_PITCH, 1);
    engine
        .persuade_at(&PersuasionRequest::new("alice", "order", target.id, ORDER_PITCH), 1)
        .unwrap();

    for phase in [Phase::Round1, Phase::Round2, Phase::Round3] {
        engine.advance_at(Some(phase), 10).unwrap();
    }

    let before = engine.npcs(&NpcFilter::All);
    let request = PersuasionRequest::new("bob", "commons", target.id, COMMONS_PITCH);
    assert!(matches!(
        engine.persuade_at(&request, 11),
        Err(MarketError::GameEnded)
    ));
    assert_eq!(engine.npcs(&NpcFilter::All), before);
    assert_eq!(engine.balance("bob"), Some(5_000));

    let board = engine.leaderboard().unwrap();
    let winner = board.winner.unwrap();
    assert_eq!(winner.belief_id, "order");
    assert_eq!(winner.followers, 1);

    let feed = engine.conversation(10).unwrap();
    assert!(feed[0].message.contains("Game over"));
}

#[test]
fn test_roster_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[game]
seed = 7
cohort_sizes = [4, 2, 1]
starting_balance = 300

[[roster.agents]]
id = "carol"
balance = 1000

[[roster.beliefs]]
id = "dawn"
name = "Dawn"
founder = "carol"
messagingStyle = "emotional"
coreValues = ["hope"]
promises = ["a brighter future"]

[[roster.beliefs]]
id = "ledger"
founder = "dave"
messagingStyle = "rational"
"#
    )
    .unwrap();

    let config = Config::load(Some(file.path())).unwrap();
    let engine = GameEngine::from_config(&config).unwrap();

    assert_eq!(engine.balance("carol"), Some(1_000));
    assert_eq!(engine.balance("dave"), Some(300));
    assert_eq!(engine.beliefs().len(), 2);

    engine.start_at(0).unwrap();
    assert_eq!(engine.info().unwrap().npc_count, 4);
}

#[test]
fn test_agents_without_beliefs_cannot_persuade() {
    let mut config = market();
    config.roster.agents.push(AgentSeed {
        id: "mallory".into(),
        balance: Some(1_000),
    });
    let engine = GameEngine::from_config(&config).unwrap();
    engine.start_at(0).unwrap();

    let request = PersuasionRequest::new("mallory", "order", 0, ORDER_PITCH);
    assert!(matches!(
        engine.persuade_at(&request, 1),
        Err(MarketError::BeliefNotOwned { .. })
    ));

    let request = PersuasionRequest::new("ghost", "ghost-belief", 0, ORDER_PITCH);
    assert!(matches!(
        engine.persuade_at(&request, 1),
        Err(MarketError::UnknownBelief(_))
    ));
    assert_eq!(engine.balance("mallory"), Some(1_000));
}
