// Engine facade: assembles the configured policy and runs one decision per round
//
// `decide` runs synchronously on the caller's thread. `get_action` runs the
// same decision on the blocking pool and polls for the result, so an async
// caller always gets an answer within the budget.

use log::{debug, info};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::conditions::{CompositeCondition, Condition, HeuristicCondition};
use crate::config::{Config, HeuristicsConfig};
use crate::error::ConfigError;
use crate::heuristics::{
    CompositeHeuristic, Heuristic, IsolationHeuristic, OpponentDistanceHeuristic,
    PathLengthHeuristic, RegionHeuristic, VoronoiHeuristic,
};
use crate::policies::{
    CirclePolicy, ConditionalPolicy, EndgamePolicy, FutureStepsPolicy, HeuristicPolicy,
    MazeWalkerPolicy, Policy, RandomPolicy, RandomProbingPolicy, SpiralPolicy,
};
use crate::search::{ActionSearchPolicy, DepthSearchPolicy, MaximinSearchPolicy};
use crate::types::{Action, Grid, Player};

/// Lock-free shared state between the async poller and the decision task
#[derive(Debug)]
struct SharedDecisionState {
    /// Chosen action, encoded as its index in `Action::ALL`
    action: AtomicU8,
    complete: AtomicBool,
}

impl SharedDecisionState {
    fn new() -> Self {
        SharedDecisionState {
            action: AtomicU8::new(0), // change_nothing
            complete: AtomicBool::new(false),
        }
    }

    fn store(&self, action: Action) {
        let index = Action::ALL.iter().position(|&a| a == action).unwrap_or(0);
        self.action.store(index as u8, Ordering::Release);
        self.complete.store(true, Ordering::Release);
    }

    fn load(&self) -> Action {
        Action::ALL
            .get(self.action.load(Ordering::Acquire) as usize)
            .copied()
            .unwrap_or(Action::ChangeNothing)
    }
}

/// Weighted composite of the heuristics with a positive weight
pub fn build_heuristic(config: &HeuristicsConfig) -> Result<Box<dyn Heuristic>, ConfigError> {
    let mut heuristics: Vec<Box<dyn Heuristic>> = Vec::new();
    let mut weights = Vec::new();

    if config.region_weight > 0.0 {
        heuristics.push(Box::new(RegionHeuristic::new(
            config.region_closing_iterations,
            config.include_opponent_regions,
        )));
        weights.push(config.region_weight);
    }
    if config.voronoi_weight > 0.0 {
        heuristics.push(Box::new(VoronoiHeuristic::new(
            config.voronoi_max_steps,
            config.voronoi_opening_iterations,
            config.voronoi_minimize_opponents,
        )));
        weights.push(config.voronoi_weight);
    }
    if config.path_length_weight > 0.0 {
        heuristics.push(Box::new(PathLengthHeuristic::new(
            config.path_length_steps,
            config.path_length_node_limit,
        )?));
        weights.push(config.path_length_weight);
    }
    if config.opponent_distance_weight > 0.0 {
        heuristics.push(Box::new(OpponentDistanceHeuristic::new(
            config.opponent_distance_threshold,
        )));
        weights.push(config.opponent_distance_weight);
    }

    Ok(Box::new(CompositeHeuristic::new(heuristics, Some(weights))?))
}

/// Builds a policy by name
///
/// # Arguments
/// * `name` - One of `config::POLICY_NAMES`
/// * `seed` - Seed for policies that draw random numbers
pub fn build_policy(name: &str, config: &Config, seed: u64) -> Result<Box<dyn Policy>, ConfigError> {
    let occupancy = &config.occupancy;
    let policy: Box<dyn Policy> = match name {
        "maximin" => Box::new(MaximinSearchPolicy::new(
            build_heuristic(&config.heuristics)?,
            config.search.depth_limit,
            occupancy.depth,
            occupancy.death_discount,
            None,
        )?),
        "action_search" => Box::new(ActionSearchPolicy::new(
            build_heuristic(&config.heuristics)?,
            config.search.depth_limit,
            config.search.expanded_node_limit,
            occupancy.depth,
            occupancy.death_discount,
            None,
        )?),
        "depth_search" => Box::new(DepthSearchPolicy::new(
            build_heuristic(&config.heuristics)?,
            config.search.depth_limit,
            config.search.expanded_node_limit,
            occupancy.depth,
            occupancy.death_discount,
            config.search.iterative_deepening,
            Some(seed),
        )?),
        "heuristic" => Box::new(HeuristicPolicy::new(
            build_heuristic(&config.heuristics)?,
            occupancy.depth,
            None,
        )?),
        "endgame" => Box::new(EndgamePolicy::new(
            None,
            config.endgame.path_length_steps,
            config.endgame.path_length_node_limit,
        )?),
        "random" => Box::new(RandomPolicy::new(Some(seed), None)?),
        "circle" => Box::new(CirclePolicy),
        "spiral" => Box::new(SpiralPolicy::new()),
        "maze_walker" => Box::new(MazeWalkerPolicy),
        "future_steps" => Box::new(FutureStepsPolicy::new(3)),
        "random_probing" => Box::new(RandomProbingPolicy::new(10, 3, Some(seed))?),
        other => {
            return Err(ConfigError::UnknownName {
                kind: "policy",
                name: other.to_string(),
            })
        }
    };
    Ok(policy)
}

/// Builds a game-phase condition by name
///
/// # Arguments
/// * `name` - One of `config::CONDITION_NAMES`
pub fn build_condition(name: &str) -> Result<Box<dyn Condition>, ConfigError> {
    let condition: Box<dyn Condition> = match name {
        "isolation" => Box::new(HeuristicCondition::new(Box::new(IsolationHeuristic))),
        "endgame" => Box::new(CompositeCondition::endgame()),
        "midgame" => Box::new(CompositeCondition::midgame()),
        "lategame" => Box::new(CompositeCondition::lategame()),
        other => {
            return Err(ConfigError::UnknownName {
                kind: "condition",
                name: other.to_string(),
            })
        }
    };
    Ok(condition)
}

/// The configured search policy, switching to space filling once the endgame condition holds
pub fn build_engine_policy(config: &Config) -> Result<Box<dyn Policy>, ConfigError> {
    let main = build_policy(&config.search.policy, config, config.game.seed)?;
    let endgame = &config.endgame;
    if !endgame.enabled {
        return Ok(main);
    }

    let fill: Box<dyn Policy> = match endgame.policy.as_str() {
        "path_length" => Box::new(HeuristicPolicy::new(
            Box::new(PathLengthHeuristic::new(
                endgame.path_length_steps,
                endgame.path_length_node_limit,
            )?),
            0,
            None,
        )?),
        "endgame" => Box::new(EndgamePolicy::new(
            None,
            endgame.path_length_steps,
            endgame.path_length_node_limit,
        )?),
        other => {
            return Err(ConfigError::UnknownName {
                kind: "endgame policy",
                name: other.to_string(),
            })
        }
    };
    let policy = ConditionalPolicy::new(
        vec![fill, main],
        vec![build_condition(&endgame.condition)?],
        vec![endgame.threshold],
    )?;
    Ok(Box::new(policy))
}

/// spe_ed engine with static configuration
pub struct Bot {
    config: Config,
    policy: Arc<Mutex<Box<dyn Policy>>>,
    name: String,
}

impl Bot {
    /// Creates a new Bot from the given configuration
    ///
    /// # Arguments
    /// * `config` - Static configuration that does not change during the bot's lifetime
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let policy = build_engine_policy(&config)?;
        let name = policy.name();
        info!("Engine policy: {}", name);
        Ok(Bot {
            config,
            policy: Arc::new(Mutex::new(policy)),
            name,
        })
    }

    /// Engine metadata
    pub fn info(&self) -> Value {
        json!({
            "engine": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "policy": self.config.search.policy,
            "depth_limit": self.config.search.depth_limit,
            "budget_ms": self.config.timing.effective_budget_ms(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn budget(&self) -> Duration {
        Duration::from_millis(self.config.timing.effective_budget_ms())
    }

    /// Decides on the caller's thread within the configured budget
    pub fn decide(&self, grid: &Grid, you: &Player, opponents: &[Player], round: u32) -> Action {
        let start = Instant::now();
        let action = self
            .policy
            .lock()
            .act(grid, you, opponents, round, start + self.budget());
        info!(
            "Round {}: Chose {} (time: {}ms)",
            round,
            action,
            start.elapsed().as_millis()
        );
        action
    }

    /// Decides on the blocking pool and polls until the result or the budget arrives
    ///
    /// Falls back to `change_nothing` if the decision is not ready in time.
    pub async fn get_action(&self, grid: &Grid, you: &Player, opponents: &[Player], round: u32) -> Action {
        let start = Instant::now();
        let deadline = start + self.budget();

        let shared = Arc::new(SharedDecisionState::new());
        let shared_clone = shared.clone();
        let policy = self.policy.clone();
        let grid = grid.clone();
        let you = you.clone();
        let opponents = opponents.to_vec();

        tokio::task::spawn_blocking(move || {
            let action = policy.lock().act(&grid, &you, &opponents, round, deadline);
            shared_clone.store(action);
        });

        let hard_limit = Duration::from_millis(self.config.timing.decision_budget_ms);
        let polling_interval = Duration::from_millis(self.config.timing.polling_interval_ms.max(1));
        loop {
            tokio::time::sleep(polling_interval).await;
            if shared.complete.load(Ordering::Acquire) {
                break;
            }
            if start.elapsed() >= hard_limit {
                debug!("Round {}: decision not ready after {}ms", round, hard_limit.as_millis());
                break;
            }
        }

        let action = shared.load();
        info!(
            "Round {}: Chose {} (time: {}ms)",
            round,
            action,
            start.elapsed().as_millis()
        );
        action
    }
}

impl Policy for Bot {
    fn act(&mut self, grid: &Grid, you: &Player, opponents: &[Player], round: u32, deadline: Instant) -> Action {
        let deadline = deadline.min(Instant::now() + self.budget());
        self.policy.lock().act(grid, you, opponents, round, deadline)
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Coord, Direction};

    fn fast_config(policy: &str) -> Config {
        let mut config = Config::default_hardcoded();
        config.search.policy = policy.to_string();
        config.search.depth_limit = 2;
        config.heuristics.path_length_steps = 3;
        config.timing.decision_budget_ms = 300;
        config
    }

    fn corridor() -> (Grid, Player) {
        // only turning right keeps the player alive
        let mut grid = Grid::new(5, 5);
        grid.set(Coord::new(4, 2), 1);
        grid.set(Coord::new(4, 1), -1);
        (grid, Player::new(1, 4, 2, Direction::Right, 1))
    }

    #[test]
    fn test_shared_state_round_trip() {
        let shared = SharedDecisionState::new();
        assert_eq!(shared.load(), Action::ChangeNothing);
        shared.store(Action::SlowDown);
        assert_eq!(shared.load(), Action::SlowDown);
        assert!(shared.complete.load(Ordering::Acquire));
    }

    #[test]
    fn test_every_named_policy_builds() {
        let config = Config::default_hardcoded();
        for name in crate::config::POLICY_NAMES {
            assert!(build_policy(name, &config, 1).is_ok(), "{} should build", name);
        }
        assert!(matches!(
            build_policy("teleporter", &config, 1),
            Err(ConfigError::UnknownName { .. })
        ));
    }

    #[test]
    fn test_every_endgame_switch_builds() {
        let mut config = fast_config("maximin");
        for condition in crate::config::CONDITION_NAMES {
            for policy in crate::config::ENDGAME_POLICY_NAMES {
                config.endgame.condition = condition.to_string();
                config.endgame.policy = policy.to_string();
                assert!(build_engine_policy(&config).is_ok(), "{} / {}", condition, policy);
            }
        }
        config.endgame.condition = "overtime".to_string();
        assert!(matches!(
            build_engine_policy(&config),
            Err(ConfigError::UnknownName { kind: "condition", .. })
        ));
    }

    #[test]
    fn test_isolated_engine_uses_endgame_policy() {
        // no opponent on the board, so the endgame condition holds from the start
        let mut config = fast_config("random");
        config.endgame.condition = "endgame".to_string();
        config.endgame.policy = "endgame".to_string();
        config.endgame.path_length_steps = 5;
        let bot = Bot::new(config).unwrap();
        let (grid, you) = corridor();
        for round in 1..5 {
            assert_eq!(bot.decide(&grid, &you, &[], round), Action::TurnRight);
        }
    }

    #[test]
    fn test_zero_weights_are_rejected() {
        let mut config = Config::default_hardcoded();
        config.heuristics.region_weight = 0.0;
        config.heuristics.voronoi_weight = 0.0;
        config.heuristics.path_length_weight = 0.0;
        assert!(matches!(
            build_heuristic(&config.heuristics),
            Err(ConfigError::NoHeuristics)
        ));
    }

    #[test]
    fn test_decide_takes_only_surviving_action() {
        for policy in [
            "maximin",
            "action_search",
            "depth_search",
            "heuristic",
            "endgame",
            "future_steps",
            "random_probing",
        ] {
            let bot = Bot::new(fast_config(policy)).unwrap();
            let (grid, you) = corridor();
            let opponent = Player::new(2, 0, 0, Direction::Down, 1);
            assert_eq!(bot.decide(&grid, &you, &[opponent], 1), Action::TurnRight, "{}", policy);
        }
    }

    #[tokio::test]
    async fn test_get_action_returns_within_budget() {
        let bot = Bot::new(fast_config("maximin")).unwrap();
        let (grid, you) = corridor();
        let start = Instant::now();
        let action = bot.get_action(&grid, &you, &[], 1).await;
        assert_eq!(action, Action::TurnRight);
        assert!(start.elapsed() < Duration::from_millis(1000));
    }

    #[test]
    fn test_info_reports_policy() {
        let bot = Bot::new(fast_config("action_search")).unwrap();
        assert_eq!(bot.info()["policy"], "action_search");
    }
}
