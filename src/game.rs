// Local self-play runner
//
// Every round all active players decide in parallel against the same
// snapshot, then the simulator applies the actions at once.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::bot::{build_policy, Bot};
use crate::config::{Config, MAX_PLAYERS};
use crate::error::ConfigError;
use crate::game_log::GameRecorder;
use crate::policies::Policy;
use crate::replay::GameSnapshot;
use crate::simple_profiler;
use crate::simulator::{Intent, SimulationState};
use crate::types::{Coord, Direction, Grid, Player};

/// Result of a finished local game
#[derive(Debug, Clone)]
pub struct GameOutcome {
    pub winner: Option<u8>,
    /// Rounds played
    pub rounds: u32,
    pub snapshots: Vec<GameSnapshot>,
    pub names: BTreeMap<u8, String>,
}

/// A game between local policies; player k is driven by `policies[k - 1]`
pub struct LocalGame {
    state: SimulationState,
    policies: Vec<Box<dyn Policy>>,
    budget: Duration,
    max_rounds: u32,
}

impl LocalGame {
    /// Places one player per policy on distinct random cells with random directions and speed 1
    pub fn new(
        width: usize,
        height: usize,
        policies: Vec<Box<dyn Policy>>,
        seed: u64,
        budget: Duration,
        max_rounds: u32,
    ) -> Result<Self, ConfigError> {
        if policies.is_empty() {
            return Err(ConfigError::NoPolicies);
        }
        if policies.len() > MAX_PLAYERS || policies.len() > width * height {
            return Err(ConfigError::InvalidValue {
                name: "players",
                reason: format!("{} players do not fit a {}x{} board", policies.len(), width, height),
            });
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut grid = Grid::new(width, height);
        let mut players = Vec::with_capacity(policies.len());
        for (i, policy) in policies.iter().enumerate() {
            let id = i as u8 + 1;
            let position = loop {
                let c = Coord::new(
                    rng.random_range(0..width as i32),
                    rng.random_range(0..height as i32),
                );
                if grid.is_free(c) {
                    break c;
                }
            };
            grid.set(position, id as i8);
            let direction = Direction::from_index(rng.random_range(0..4));
            let mut player = Player::new(id, position.x, position.y, direction, 1);
            player.name = Some(short_name(&policy.name()));
            players.push(player);
        }

        Ok(LocalGame {
            state: SimulationState::new(grid, players, 1),
            policies,
            budget,
            max_rounds,
        })
    }

    /// Engine as player 1 against the configured opponent policies
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut policies: Vec<Box<dyn Policy>> = vec![Box::new(Bot::new(config.clone())?)];
        for (i, name) in config.game.opponent_policies.iter().enumerate() {
            policies.push(build_policy(name, config, config.game.seed + i as u64 + 1)?);
        }
        Self::new(
            config.game.width,
            config.game.height,
            policies,
            config.game.seed,
            Duration::from_millis(config.timing.effective_budget_ms()),
            config.game.max_rounds,
        )
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot::from_state(&self.state, Some(1), !self.is_over())
    }

    pub fn is_over(&self) -> bool {
        self.state.is_done() || self.state.round > self.max_rounds
    }

    /// Collects one decision per active player in parallel and advances one round
    pub fn play_round(&mut self) -> Vec<Intent> {
        let state = &self.state;
        let deadline = Instant::now() + self.budget;

        let intents: Vec<Intent> = self
            .policies
            .par_iter_mut()
            .zip(state.players.par_iter())
            .map(|(policy, player)| {
                if !player.active {
                    return Intent::Idle;
                }
                let opponents: Vec<Player> = state
                    .active_players()
                    .filter(|p| p.id != player.id)
                    .cloned()
                    .collect();
                let action = policy.act(&state.grid, player, &opponents, state.round, deadline);
                simple_profiler::merge_thread_local();
                Intent::Act(action)
            })
            .collect();

        debug!("Round {}: {:?}", self.state.round, intents);
        self.state = self.state.step_intents(&intents);
        intents
    }

    /// Plays until at most one player is left or the round limit is hit
    pub fn run(mut self, recorder: &GameRecorder) -> GameOutcome {
        info!(
            "GAME START: {}x{} board, {} players",
            self.state.grid.width(),
            self.state.grid.height(),
            self.state.players.len()
        );

        let mut snapshots = vec![self.snapshot()];
        recorder.record(&snapshots[0]);
        while !self.is_over() {
            self.play_round();
            let snapshot = self.snapshot();
            recorder.record(&snapshot);
            snapshots.push(snapshot);
        }

        let names = self
            .state
            .players
            .iter()
            .filter_map(|p| p.name.clone().map(|n| (p.id, n)))
            .collect();
        let outcome = GameOutcome {
            winner: self.state.winner(),
            rounds: self.state.round - 1,
            snapshots,
            names,
        };
        match outcome.winner {
            Some(id) => info!("GAME OVER: player {} wins after {} rounds", id, outcome.rounds),
            None => info!("GAME OVER: no winner after {} rounds", outcome.rounds),
        }
        outcome
    }
}

/// Policy name without its parameter list
fn short_name(name: &str) -> String {
    name.split('(').next().unwrap_or(name).to_string()
}
