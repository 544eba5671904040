// Replay module for recorded spe_ed games
//
// This module provides functionality to:
// 1. Load game records (JSON array or JSONL, one snapshot per round)
// 2. Infer every player's action from consecutive snapshots
// 3. Verify that the simulator reproduces each recorded transition
// 4. Re-run the engine on recorded states and compare with what was played

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Instant;

use crate::bot::Bot;
use crate::config::Config;
use crate::error::ReplayError;
use crate::simulator::{Intent, SimulationState};
use crate::types::{Action, Direction, Grid, Player};

/// One player entry of a snapshot
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PlayerRecord {
    pub x: i32,
    pub y: i32,
    pub direction: Direction,
    pub speed: u8,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PlayerRecord {
    pub fn from_player(player: &Player) -> Self {
        PlayerRecord {
            x: player.x,
            y: player.y,
            direction: player.direction,
            speed: player.speed,
            active: player.active,
            name: player.name.clone(),
        }
    }

    pub fn to_player(&self, id: u8) -> Player {
        Player {
            id,
            x: self.x,
            y: self.y,
            direction: self.direction,
            speed: self.speed,
            active: self.active,
            name: self.name.clone(),
        }
    }
}

/// Full game state of one round, as sent by the game server
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GameSnapshot {
    pub width: usize,
    pub height: usize,
    /// Row-major, `cells[y][x]`
    pub cells: Vec<Vec<i8>>,
    pub players: BTreeMap<u8, PlayerRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub you: Option<u8>,
    pub running: bool,
}

impl GameSnapshot {
    pub fn from_state(state: &SimulationState, you: Option<u8>, running: bool) -> Self {
        GameSnapshot {
            width: state.grid.width(),
            height: state.grid.height(),
            cells: state.grid.to_rows(),
            players: state
                .players
                .iter()
                .map(|p| (p.id, PlayerRecord::from_player(p)))
                .collect(),
            you,
            running,
        }
    }

    fn grid(&self, index: usize) -> Result<Grid, ReplayError> {
        let invalid = |reason: String| ReplayError::InvalidSnapshot { index, reason };
        if self.cells.len() != self.height {
            return Err(invalid(format!(
                "{} rows for height {}",
                self.cells.len(),
                self.height
            )));
        }
        if let Some(row) = self.cells.iter().position(|r| r.len() != self.width) {
            return Err(invalid(format!("row {} does not have width {}", row, self.width)));
        }
        Grid::from_rows(&self.cells).map_err(invalid)
    }
}

/// Action reconstructed from two consecutive player records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferredAction {
    Act(Action),
    /// Stopped in place without a visible change (illegal speed change or no answer)
    Invalid,
    /// Already out before the round
    Inactive,
}

impl InferredAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            InferredAction::Act(action) => action.as_str(),
            InferredAction::Invalid => "invalid",
            InferredAction::Inactive => "inactive",
        }
    }

    pub fn intent(&self) -> Intent {
        match self {
            InferredAction::Act(action) => Intent::Act(*action),
            InferredAction::Invalid => Intent::Forfeit,
            InferredAction::Inactive => Intent::Idle,
        }
    }
}

impl fmt::Display for InferredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconstructs the action a player took between two snapshots
pub fn infer_action(before: &PlayerRecord, after: &PlayerRecord) -> InferredAction {
    if !before.active {
        return InferredAction::Inactive;
    }
    if after.speed > before.speed {
        return InferredAction::Act(Action::SpeedUp);
    }
    if after.speed < before.speed {
        return InferredAction::Act(Action::SlowDown);
    }
    if after.direction == before.direction.turn_left() {
        return InferredAction::Act(Action::TurnLeft);
    }
    if after.direction == before.direction.turn_right() {
        return InferredAction::Act(Action::TurnRight);
    }
    if after.x == before.x && after.y == before.y && !after.active {
        return InferredAction::Invalid;
    }
    InferredAction::Act(Action::ChangeNothing)
}

/// What one player saw in one round
#[derive(Debug, Clone)]
pub struct Observation {
    pub grid: Grid,
    pub you: Player,
    pub opponents: Vec<Player>,
    pub round: u32,
}

/// A complete recorded game
#[derive(Debug, Clone)]
pub struct SavedGame {
    snapshots: Vec<GameSnapshot>,
}

impl SavedGame {
    /// Loads a JSON array of snapshots or a JSONL file with one snapshot per line
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ReplayError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let snapshots = Self::parse(&contents)?;
        info!(
            "Loaded {} snapshots from {}",
            snapshots.len(),
            path.as_ref().display()
        );
        Self::from_snapshots(snapshots)
    }

    fn parse(contents: &str) -> Result<Vec<GameSnapshot>, ReplayError> {
        if contents.trim_start().starts_with('[') {
            return serde_json::from_str(contents).map_err(|e| ReplayError::Parse {
                line: e.line(),
                source: e,
            });
        }

        let mut snapshots = Vec::new();
        for (line_num, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let snapshot = serde_json::from_str(line).map_err(|e| ReplayError::Parse {
                line: line_num + 1,
                source: e,
            })?;
            snapshots.push(snapshot);
        }
        Ok(snapshots)
    }

    /// Checks that the record is non-empty, finished and well-formed
    pub fn from_snapshots(snapshots: Vec<GameSnapshot>) -> Result<Self, ReplayError> {
        let last = snapshots.last().ok_or(ReplayError::Empty)?;
        if last.running {
            return Err(ReplayError::Unfinished);
        }
        for (index, snapshot) in snapshots.iter().enumerate() {
            snapshot.grid(index)?;
            if snapshot.players.keys().ne(snapshots[0].players.keys()) {
                return Err(ReplayError::InvalidSnapshot {
                    index,
                    reason: "player set differs from the first snapshot".to_string(),
                });
            }
        }
        Ok(SavedGame { snapshots })
    }

    pub fn snapshots(&self) -> &[GameSnapshot] {
        &self.snapshots
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Rounds played, one fewer than the number of snapshots
    pub fn rounds(&self) -> usize {
        self.snapshots.len() - 1
    }

    pub fn player_ids(&self) -> Vec<u8> {
        self.snapshots[0].players.keys().copied().collect()
    }

    /// The only player still active at the end, if any
    pub fn winner(&self) -> Option<u8> {
        let last = self.snapshots.last()?;
        let mut active = last.players.iter().filter(|(_, p)| p.active);
        match (active.next(), active.next()) {
            (Some((&id, _)), None) => Some(id),
            _ => None,
        }
    }

    /// Display names of the players that reported one
    pub fn names(&self) -> BTreeMap<u8, String> {
        self.snapshots[0]
            .players
            .iter()
            .filter_map(|(&id, p)| p.name.clone().map(|n| (id, n)))
            .collect()
    }

    /// Simulator state of snapshot `index`; snapshot 0 is round 1
    pub fn state_at(&self, index: usize) -> Result<SimulationState, ReplayError> {
        let snapshot = self.snapshot(index)?;
        let players = snapshot
            .players
            .iter()
            .map(|(&id, record)| record.to_player(id))
            .collect();
        Ok(SimulationState::new(snapshot.grid(index)?, players, index as u32 + 1))
    }

    /// State of snapshot `index` as seen by `player`; opponents are the other active players
    pub fn observation(&self, index: usize, player: u8) -> Result<Observation, ReplayError> {
        let state = self.state_at(index)?;
        let you = state
            .player(player)
            .cloned()
            .ok_or(ReplayError::UnknownPlayer { index, player })?;
        let opponents = state
            .active_players()
            .filter(|p| p.id != player)
            .cloned()
            .collect();
        Ok(Observation {
            grid: state.grid,
            you,
            opponents,
            round: state.round,
        })
    }

    /// Inferred actions of every player between snapshots `index` and `index + 1`
    pub fn inferred_actions(&self, index: usize) -> Result<BTreeMap<u8, InferredAction>, ReplayError> {
        let before = self.snapshot(index)?;
        let after = self.snapshot(index + 1)?;
        before
            .players
            .iter()
            .map(|(&id, record)| {
                let next = after
                    .players
                    .get(&id)
                    .ok_or(ReplayError::UnknownPlayer { index: index + 1, player: id })?;
                Ok((id, infer_action(record, next)))
            })
            .collect()
    }

    fn snapshot(&self, index: usize) -> Result<&GameSnapshot, ReplayError> {
        self.snapshots.get(index).ok_or_else(|| ReplayError::InvalidSnapshot {
            index,
            reason: format!("record has only {} snapshots", self.snapshots.len()),
        })
    }
}

/// Result of re-running the engine on one recorded state
#[derive(Debug, Clone)]
pub struct DecisionResult {
    pub index: usize,
    pub round: u32,
    pub recorded: InferredAction,
    pub replayed: Action,
    pub matches: bool,
    pub computation_time_ms: u128,
}

/// Statistics for a complete replay session
#[derive(Debug, Default)]
pub struct ReplayStats {
    pub total_decisions: usize,
    pub matches: usize,
    pub mismatches: usize,
    pub match_rate: f64,
}

/// Replay engine for recorded games
pub struct ReplayEngine {
    config: Config,
    verbose: bool,
}

impl ReplayEngine {
    /// Creates a new replay engine with the given configuration
    pub fn new(config: Config, verbose: bool) -> Self {
        ReplayEngine { config, verbose }
    }

    /// Steps every recorded state with the inferred actions and compares with the next snapshot
    ///
    /// Returns the number of verified transitions, or the first mismatch.
    pub fn verify_transitions(&self, game: &SavedGame) -> Result<usize, ReplayError> {
        for index in 0..game.rounds() {
            let state = game.state_at(index)?;
            let inferred = game.inferred_actions(index)?;
            let intents: Vec<Intent> = state
                .players
                .iter()
                .map(|p| inferred.get(&p.id).map_or(Intent::Idle, |a| a.intent()))
                .collect();

            let simulated = state.step_intents(&intents);
            let expected = game.state_at(index + 1)?;
            let mismatch = |reason: String| ReplayError::Mismatch {
                index,
                next: index + 1,
                reason,
            };

            if let Some(i) = (0..simulated.grid.area())
                .find(|&i| simulated.grid.cells()[i] != expected.grid.cells()[i])
            {
                let c = expected.grid.coord_of(i);
                return Err(mismatch(format!(
                    "cell ({}, {}) is {} but the record has {}",
                    c.x,
                    c.y,
                    simulated.grid.cells()[i],
                    expected.grid.cells()[i]
                )));
            }
            for (sim, rec) in simulated.players.iter().zip(&expected.players) {
                if !sim.same_state(rec) {
                    return Err(mismatch(format!(
                        "player {} simulated as {:?} but recorded as {:?}",
                        sim.id,
                        PlayerRecord::from_player(sim),
                        PlayerRecord::from_player(rec)
                    )));
                }
            }
            if simulated.round != expected.round {
                return Err(mismatch(format!(
                    "round {} but the record has {}",
                    simulated.round, expected.round
                )));
            }

            if self.verbose {
                let played: Vec<String> = inferred
                    .iter()
                    .map(|(id, a)| format!("{}={}", id, a))
                    .collect();
                info!("Round {}: ✓ {}", index + 1, played.join(" "));
            }
        }
        Ok(game.rounds())
    }

    /// How often each inferred action occurs over the whole game, all players
    pub fn action_histogram(&self, game: &SavedGame) -> Result<BTreeMap<&'static str, usize>, ReplayError> {
        let mut histogram = BTreeMap::new();
        for index in 0..game.rounds() {
            for action in game.inferred_actions(index)?.values() {
                *histogram.entry(action.as_str()).or_insert(0) += 1;
            }
        }
        Ok(histogram)
    }

    /// Re-runs the configured engine for `player` on the given snapshot indices
    ///
    /// Indices where the player is already out or that have no successor are skipped.
    pub fn replay_decisions(
        &self,
        game: &SavedGame,
        player: u8,
        indices: &[usize],
    ) -> Result<Vec<DecisionResult>, ReplayError> {
        let bot = Bot::new(self.config.clone())?;
        let mut results = Vec::new();

        for &index in indices {
            if index >= game.rounds() {
                warn!("Snapshot {} has no successor, skipping", index);
                continue;
            }
            let recorded = game
                .inferred_actions(index)?
                .get(&player)
                .copied()
                .ok_or(ReplayError::UnknownPlayer { index, player })?;
            if recorded == InferredAction::Inactive {
                continue;
            }

            let obs = game.observation(index, player)?;
            let start = Instant::now();
            let replayed = bot.decide(&obs.grid, &obs.you, &obs.opponents, obs.round);
            let computation_time_ms = start.elapsed().as_millis();
            let matches = recorded == InferredAction::Act(replayed);

            if self.verbose {
                if matches {
                    info!(
                        "Round {}: ✓ MATCH - {} (time: {}ms)",
                        obs.round, replayed, computation_time_ms
                    );
                } else {
                    warn!(
                        "Round {}: ✗ MISMATCH - Recorded: {}, Replayed: {} (time: {}ms)",
                        obs.round, recorded, replayed, computation_time_ms
                    );
                }
            }

            results.push(DecisionResult {
                index,
                round: obs.round,
                recorded,
                replayed,
                matches,
                computation_time_ms,
            });
        }
        Ok(results)
    }

    /// Replays every decision `player` made
    pub fn replay_all(&self, game: &SavedGame, player: u8) -> Result<Vec<DecisionResult>, ReplayError> {
        let indices: Vec<usize> = (0..game.rounds()).collect();
        self.replay_decisions(game, player, &indices)
    }

    /// Generates statistics from replay results
    pub fn generate_stats(&self, results: &[DecisionResult]) -> ReplayStats {
        let total_decisions = results.len();
        let matches = results.iter().filter(|r| r.matches).count();
        let mismatches = total_decisions - matches;
        let match_rate = if total_decisions > 0 {
            (matches as f64 / total_decisions as f64) * 100.0
        } else {
            0.0
        };

        ReplayStats {
            total_decisions,
            matches,
            mismatches,
            match_rate,
        }
    }

    /// Prints a detailed report of replay results
    pub fn print_report(&self, results: &[DecisionResult]) {
        let stats = self.generate_stats(results);

        println!("\n═══════════════════════════════════════════════════════════");
        println!("                    REPLAY REPORT");
        println!("═══════════════════════════════════════════════════════════");
        println!("Total Decisions: {}", stats.total_decisions);
        println!("Matches:         {} ({:.1}%)", stats.matches, stats.match_rate);
        println!("Mismatches:      {}", stats.mismatches);
        println!("═══════════════════════════════════════════════════════════\n");

        if !results.is_empty() {
            let avg_time: f64 = results.iter().map(|r| r.computation_time_ms as f64).sum::<f64>()
                / results.len() as f64;
            println!("Average Computation Time:   {:.1}ms\n", avg_time);
        }

        let mismatches: Vec<_> = results.iter().filter(|r| !r.matches).collect();
        if !mismatches.is_empty() {
            println!("═══════════════════════════════════════════════════════════");
            println!("                  DETAILED MISMATCHES");
            println!("═══════════════════════════════════════════════════════════");

            for result in mismatches {
                println!(
                    "Round {}: {} → {} (time: {}ms)",
                    result.round, result.recorded, result.replayed, result.computation_time_ms
                );
            }
            println!();
        }
    }

    /// Checks that `player` played one of the acceptable actions in the given rounds
    pub fn validate_expected_actions(
        &self,
        game: &SavedGame,
        player: u8,
        expected: &[(u32, Vec<Action>)], // (round, acceptable actions)
    ) -> Result<(), String> {
        for (round, acceptable) in expected {
            let index = round
                .checked_sub(1)
                .map(|i| i as usize)
                .filter(|&i| i < game.rounds())
                .ok_or_else(|| format!("Round {} not found in record", round))?;

            let inferred = game.inferred_actions(index).map_err(|e| e.to_string())?;
            let actual = inferred
                .get(&player)
                .ok_or_else(|| format!("Player {} not found in record", player))?;

            if !acceptable.iter().any(|a| InferredAction::Act(*a) == *actual) {
                return Err(format!(
                    "Round {}: Expected one of {:?}, but got {}",
                    round,
                    acceptable.iter().map(|a| a.as_str()).collect::<Vec<_>>(),
                    actual
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(x: i32, y: i32, direction: Direction, speed: u8, active: bool) -> PlayerRecord {
        PlayerRecord {
            x,
            y,
            direction,
            speed,
            active,
            name: None,
        }
    }

    #[test]
    fn test_infer_action() {
        let before = record(3, 3, Direction::Right, 2, true);
        let cases = [
            (record(6, 3, Direction::Right, 3, true), InferredAction::Act(Action::SpeedUp)),
            (record(4, 3, Direction::Right, 1, true), InferredAction::Act(Action::SlowDown)),
            (record(3, 1, Direction::Up, 2, true), InferredAction::Act(Action::TurnLeft)),
            (record(3, 5, Direction::Down, 2, true), InferredAction::Act(Action::TurnRight)),
            (record(5, 3, Direction::Right, 2, true), InferredAction::Act(Action::ChangeNothing)),
            (record(5, 3, Direction::Right, 2, false), InferredAction::Act(Action::ChangeNothing)),
            (record(3, 3, Direction::Right, 2, false), InferredAction::Invalid),
        ];
        for (after, expected) in cases {
            assert_eq!(infer_action(&before, &after), expected, "{:?}", after);
        }

        let out = record(3, 3, Direction::Right, 2, false);
        assert_eq!(infer_action(&out, &out), InferredAction::Inactive);
    }

    #[test]
    fn test_snapshot_json_format() {
        let json = r#"{"width": 2, "height": 1, "cells": [[1, 0]],
            "players": {"1": {"x": 0, "y": 0, "direction": "up", "speed": 1, "active": true}},
            "you": 1, "running": false}"#;
        let snapshot: GameSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.players[&1].direction, Direction::Up);
        assert_eq!(snapshot.you, Some(1));

        let game = SavedGame::from_snapshots(vec![snapshot]).unwrap();
        let state = game.state_at(0).unwrap();
        assert_eq!(state.round, 1);
        assert_eq!(state.grid.get(crate::types::Coord::new(0, 0)), Some(1));
    }

    #[test]
    fn test_load_rejects_empty_and_unfinished() {
        assert!(matches!(SavedGame::from_snapshots(vec![]), Err(ReplayError::Empty)));

        let running = GameSnapshot {
            width: 1,
            height: 1,
            cells: vec![vec![0]],
            players: BTreeMap::new(),
            you: None,
            running: true,
        };
        assert!(matches!(
            SavedGame::from_snapshots(vec![running]),
            Err(ReplayError::Unfinished)
        ));
    }

    #[test]
    fn test_malformed_rows_are_rejected() {
        let snapshot = GameSnapshot {
            width: 3,
            height: 1,
            cells: vec![vec![0, 0]],
            players: BTreeMap::new(),
            you: None,
            running: false,
        };
        assert!(matches!(
            SavedGame::from_snapshots(vec![snapshot]),
            Err(ReplayError::InvalidSnapshot { index: 0, .. })
        ));
    }

    #[test]
    fn test_jsonl_parse_error_reports_line() {
        let contents = "{\"width\": 1, \"height\": 1, \"cells\": [[0]], \"players\": {}, \"running\": true}\n\nnot json\n";
        match SavedGame::parse(contents) {
            Err(ReplayError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {:?}", other.map(|s| s.len())),
        }
    }
}
