// Configuration module for reading Engine.toml
// Every tunable of the decision engine and the local game runner lives here

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// Main configuration structure containing all tunable parameters
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    pub timing: TimingConfig,
    pub search: SearchConfig,
    pub occupancy: OccupancyConfig,
    pub heuristics: HeuristicsConfig,
    pub endgame: EndgameConfig,
    pub game: GameConfig,
    pub debug: DebugConfig,
    pub profiling: ProfilingConfig,
}

/// Per-decision time budget
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TimingConfig {
    pub decision_budget_ms: u64,
    pub safety_margin_ms: u64,
    pub polling_interval_ms: u64,
}

impl TimingConfig {
    /// Time the search may actually spend
    pub fn effective_budget_ms(&self) -> u64 {
        self.decision_budget_ms.saturating_sub(self.safety_margin_ms)
    }
}

/// Which policy drives the controlled player, and its search limits
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SearchConfig {
    /// One of `POLICY_NAMES`
    pub policy: String,
    pub depth_limit: usize,
    /// Expanded nodes for action_search, heuristic evaluations for depth_search
    pub expanded_node_limit: usize,
    /// depth_search scores every visited node instead of diving to leaves
    pub iterative_deepening: bool,
}

/// Opponent forecast used by the search policies
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct OccupancyConfig {
    /// 0 disables the forecast
    pub depth: usize,
    pub death_discount: f64,
}

/// Weights and parameters of the composite evaluation
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct HeuristicsConfig {
    pub region_weight: f64,
    pub voronoi_weight: f64,
    pub path_length_weight: f64,
    pub opponent_distance_weight: f64,

    pub region_closing_iterations: usize,
    pub include_opponent_regions: bool,

    pub voronoi_max_steps: usize,
    pub voronoi_opening_iterations: usize,
    pub voronoi_minimize_opponents: bool,

    pub path_length_steps: usize,
    pub path_length_node_limit: usize,

    pub opponent_distance_threshold: i32,
}

/// Switch to a space-filling policy once no opponent can reach us
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EndgameConfig {
    pub enabled: bool,
    /// One of `CONDITION_NAMES`
    pub condition: String,
    pub threshold: f64,
    /// One of `ENDGAME_POLICY_NAMES`
    pub policy: String,
    pub path_length_steps: usize,
    pub path_length_node_limit: usize,
}

/// Local self-play game settings
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GameConfig {
    pub width: usize,
    pub height: usize,
    pub max_rounds: u32,
    pub seed: u64,
    /// Policies of the other players, by name
    pub opponent_policies: Vec<String>,
}

/// Game record output
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DebugConfig {
    pub enabled: bool,
    pub log_file_path: String,
}

/// Performance profiling configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ProfilingConfig {
    pub enabled: bool,
}

/// Policy names accepted in `search.policy` and `game.opponent_policies`
pub const POLICY_NAMES: [&str; 11] = [
    "maximin",
    "action_search",
    "depth_search",
    "heuristic",
    "endgame",
    "random",
    "circle",
    "spiral",
    "maze_walker",
    "future_steps",
    "random_probing",
];

/// Conditions accepted in `endgame.condition`
pub const CONDITION_NAMES: [&str; 4] = ["isolation", "endgame", "midgame", "lategame"];

/// Space-filling policies accepted in `endgame.policy`
pub const ENDGAME_POLICY_NAMES: [&str; 2] = ["path_length", "endgame"];

/// Maximum number of players on one board
pub const MAX_PLAYERS: usize = 6;

impl Config {
    /// Loads configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the Engine.toml configuration file
    ///
    /// # Returns
    /// * `Result<Config, String>` - Parsed configuration or error message
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        toml::from_str(&contents).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Loads default configuration from Engine.toml in the project root
    pub fn load_default() -> Result<Self, String> {
        Self::from_file("Engine.toml")
    }

    /// Creates a configuration with hardcoded default values as fallback
    /// This should match the constants defined in Engine.toml
    pub fn default_hardcoded() -> Self {
        Config {
            timing: TimingConfig {
                decision_budget_ms: 500,
                safety_margin_ms: 50,
                polling_interval_ms: 5,
            },
            search: SearchConfig {
                policy: "maximin".to_string(),
                depth_limit: 6,
                expanded_node_limit: 100,
                iterative_deepening: true,
            },
            occupancy: OccupancyConfig {
                depth: 1,
                death_discount: 1.0,
            },
            heuristics: HeuristicsConfig {
                region_weight: 1.0,
                voronoi_weight: 1.0,
                path_length_weight: 1.0,
                opponent_distance_weight: 0.0,
                region_closing_iterations: 1,
                include_opponent_regions: true,
                voronoi_max_steps: 16,
                voronoi_opening_iterations: 0,
                voronoi_minimize_opponents: false,
                path_length_steps: 10,
                path_length_node_limit: 2000,
                opponent_distance_threshold: 16,
            },
            endgame: EndgameConfig {
                enabled: true,
                condition: "isolation".to_string(),
                threshold: 1.0,
                policy: "path_length".to_string(),
                path_length_steps: 30,
                path_length_node_limit: 5000,
            },
            game: GameConfig {
                width: 40,
                height: 40,
                max_rounds: 5000,
                seed: 7,
                opponent_policies: vec![
                    "spiral".to_string(),
                    "maze_walker".to_string(),
                    "random".to_string(),
                ],
            },
            debug: DebugConfig {
                enabled: false,
                log_file_path: "game_records.jsonl".to_string(),
            },
            profiling: ProfilingConfig { enabled: false },
        }
    }

    /// Loads Engine.toml, falling back to hardcoded defaults with a warning
    pub fn load_or_default() -> Self {
        Self::load_default().unwrap_or_else(|e| {
            eprintln!("Warning: Could not load Engine.toml ({}), using hardcoded defaults", e);
            Self::default_hardcoded()
        })
    }

    /// Checks ranges and names that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_policy_name(&self.search.policy)?;
        for name in &self.game.opponent_policies {
            check_policy_name(name)?;
        }
        check_name("condition", &CONDITION_NAMES, &self.endgame.condition)?;
        check_name("endgame policy", &ENDGAME_POLICY_NAMES, &self.endgame.policy)?;
        if self.search.depth_limit == 0 {
            return Err(invalid("search.depth_limit", "must be at least 1"));
        }
        if self.search.expanded_node_limit == 0 {
            return Err(invalid("search.expanded_node_limit", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.occupancy.death_discount) {
            return Err(invalid("occupancy.death_discount", "must lie in [0, 1]"));
        }
        if self.timing.effective_budget_ms() == 0 {
            return Err(invalid("timing.decision_budget_ms", "must exceed safety_margin_ms"));
        }
        if self.game.width == 0 || self.game.height == 0 {
            return Err(invalid("game", "board must not be empty"));
        }
        if self.game.opponent_policies.len() + 1 > MAX_PLAYERS {
            return Err(invalid(
                "game.opponent_policies",
                &format!("at most {} players per game", MAX_PLAYERS),
            ));
        }
        Ok(())
    }
}

fn check_policy_name(name: &str) -> Result<(), ConfigError> {
    check_name("policy", &POLICY_NAMES, name)
}

fn check_name(kind: &'static str, names: &[&str], name: &str) -> Result<(), ConfigError> {
    if names.contains(&name) {
        Ok(())
    } else {
        Err(ConfigError::UnknownName {
            kind,
            name: name.to_string(),
        })
    }
}

fn invalid(name: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name,
        reason: reason.to_string(),
    }
}
