// Integration tests for loading and verifying recorded games
//
// The fixture is a finished four-player game on a 16x16 board, stored as a
// JSON array of per-round snapshots.

use std::path::PathBuf;

use spe_ed_engine::config::Config;
use spe_ed_engine::error::ReplayError;
use spe_ed_engine::replay::{InferredAction, ReplayEngine, SavedGame};
use spe_ed_engine::types::{Action, Coord, COLLISION_CELL};

fn fixture_path(filename: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(filename)
}

fn load_game() -> SavedGame {
    SavedGame::load(fixture_path("game_4p_16x16.json")).expect("Failed to load fixture game")
}

fn engine() -> ReplayEngine {
    let mut config = Config::default_hardcoded();
    config.search.depth_limit = 2;
    config.timing.decision_budget_ms = 200;
    ReplayEngine::new(config, false)
}

#[test]
fn test_fixture_metadata() {
    let game = load_game();
    assert_eq!(game.rounds(), 31);
    assert_eq!(game.snapshot_count(), 32);
    assert_eq!(game.player_ids(), vec![1, 2, 3, 4]);
    assert_eq!(game.winner(), Some(4));
    assert_eq!(game.snapshots()[0].you, Some(1));

    let names = game.names();
    assert_eq!(names.get(&1).map(String::as_str), Some("bot1"));
    assert_eq!(names.get(&4).map(String::as_str), Some("bot4"));
    assert!(!names.contains_key(&3));

    let last = game.snapshots().last().unwrap();
    let collisions: usize = last
        .cells
        .iter()
        .map(|row| row.iter().filter(|&&v| v == COLLISION_CELL).count())
        .sum();
    assert_eq!(collisions, 2);
}

#[test]
fn test_states_follow_round_numbering() {
    let game = load_game();
    for index in [0, 5, 31] {
        let state = game.state_at(index).unwrap();
        assert_eq!(state.round, index as u32 + 1);
        assert_eq!(state.players.len(), 4);
    }
    assert!(game.state_at(32).is_err());

    let first = game.state_at(0).unwrap();
    assert_eq!(first.grid.get(Coord::new(1, 6)), Some(1));
    assert_eq!(first.grid.occupied_count(), 4);
}

#[test]
fn test_every_transition_reproduces() {
    let game = load_game();
    assert_eq!(engine().verify_transitions(&game).unwrap(), 31);
}

#[test]
fn test_action_histogram() {
    let game = load_game();
    let histogram = engine().action_histogram(&game).unwrap();

    assert_eq!(histogram.get("inactive"), Some(&39));
    assert_eq!(histogram.get("change_nothing"), Some(&23));
    assert_eq!(histogram.get("turn_right"), Some(&20));
    assert_eq!(histogram.get("speed_up"), Some(&16));
    assert_eq!(histogram.get("turn_left"), Some(&15));
    assert_eq!(histogram.get("slow_down"), Some(&11));
    assert_eq!(histogram.get("invalid"), None);
    assert_eq!(histogram.values().sum::<usize>(), 31 * 4);
}

#[test]
fn test_inferred_actions_of_player_one() {
    let game = load_game();
    let expected = [
        Action::SpeedUp,
        Action::TurnRight,
        Action::ChangeNothing,
        Action::SpeedUp,
        Action::TurnLeft,
        Action::TurnLeft,
        Action::TurnRight,
        Action::TurnLeft,
        Action::ChangeNothing,
        Action::TurnRight,
        Action::ChangeNothing,
        Action::SlowDown,
    ];
    for (index, action) in expected.iter().enumerate() {
        let inferred = game.inferred_actions(index).unwrap();
        assert_eq!(inferred[&1], InferredAction::Act(*action), "snapshot {}", index);
    }
    for index in expected.len()..game.rounds() {
        assert_eq!(game.inferred_actions(index).unwrap()[&1], InferredAction::Inactive);
    }
}

#[test]
fn test_elimination_order() {
    let game = load_game();
    let alive_after = |index: usize, id: u8| game.snapshots()[index].players[&id].active;

    assert!(alive_after(10, 3) && !alive_after(11, 3));
    assert!(alive_after(11, 1) && !alive_after(12, 1));
    assert!(alive_after(30, 2) && !alive_after(31, 2));
    assert!(alive_after(31, 4));
}

#[test]
fn test_observation_lists_active_opponents() {
    let game = load_game();
    let obs = game.observation(0, 1).unwrap();
    assert_eq!(obs.you.id, 1);
    assert_eq!(obs.round, 1);
    assert_eq!(obs.opponents.iter().map(|p| p.id).collect::<Vec<_>>(), vec![2, 3, 4]);

    let late = game.observation(20, 4).unwrap();
    assert_eq!(late.opponents.iter().map(|p| p.id).collect::<Vec<_>>(), vec![2]);

    assert!(matches!(
        game.observation(0, 9),
        Err(ReplayError::UnknownPlayer { player: 9, .. })
    ));
}

#[test]
fn test_validate_expected_actions() {
    let game = load_game();
    let engine = engine();

    assert!(engine
        .validate_expected_actions(
            &game,
            1,
            &[
                (1, vec![Action::SpeedUp]),
                (2, vec![Action::TurnRight]),
                (5, vec![Action::TurnLeft, Action::TurnRight]),
            ],
        )
        .is_ok());

    let err = engine
        .validate_expected_actions(&game, 1, &[(1, vec![Action::SlowDown])])
        .unwrap_err();
    assert!(err.contains("Round 1"));

    assert!(engine
        .validate_expected_actions(&game, 1, &[(40, vec![Action::SpeedUp])])
        .is_err());
}

#[test]
fn test_tampered_record_is_detected() {
    let game = load_game();
    let mut snapshots = game.snapshots().to_vec();
    snapshots[3].cells[0][0] = 2;
    let tampered = SavedGame::from_snapshots(snapshots).unwrap();

    match engine().verify_transitions(&tampered) {
        Err(ReplayError::Mismatch { index, next, .. }) => {
            assert_eq!((index, next), (2, 3));
        }
        other => panic!("expected a mismatch, got {:?}", other),
    }
}

#[test]
fn test_replay_decisions_of_player_one() {
    let game = load_game();
    let engine = engine();
    let results = engine.replay_decisions(&game, 1, &[0, 3, 20, 31]).unwrap();

    // snapshot 20 has player 1 out already, snapshot 31 has no successor
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].round, 1);
    assert_eq!(results[0].recorded, InferredAction::Act(Action::SpeedUp));
    assert_eq!(results[1].round, 4);

    let stats = engine.generate_stats(&results);
    assert_eq!(stats.total_decisions, 2);
    assert_eq!(stats.matches + stats.mismatches, 2);
}

#[test]
fn test_missing_file_is_io_error() {
    let result = SavedGame::load(fixture_path("does_not_exist.json"));
    assert!(matches!(result, Err(ReplayError::Io(_))));
}

#[test]
fn test_jump_off_board_record_reproduces() {
    // hand-built: player 1 leaves the 11-wide board on the jumped sub-step of round 6
    let game = SavedGame::load(fixture_path("jump_off_board.jsonl")).unwrap();
    assert_eq!(game.rounds(), 6);
    assert_eq!(game.winner(), Some(2));

    let last = game.state_at(6).unwrap();
    let jumper = last.player(1).unwrap();
    assert!(!jumper.active);
    assert_eq!(jumper.position(), Coord::new(11, 1));
    assert_eq!(last.grid.get(Coord::new(10, 1)), Some(1));

    assert_eq!(engine().verify_transitions(&game).unwrap(), 6);
}

#[test]
fn test_jump_past_first_outside_cell_is_rejected() {
    let game = SavedGame::load(fixture_path("jump_off_board.jsonl")).unwrap();
    let mut snapshots = game.snapshots().to_vec();
    if let Some(jumper) = snapshots[6].players.get_mut(&1) {
        jumper.x = 12;
    }
    let record = SavedGame::from_snapshots(snapshots).unwrap();

    match engine().verify_transitions(&record) {
        Err(ReplayError::Mismatch { index, next, .. }) => assert_eq!((index, next), (5, 6)),
        other => panic!("expected a mismatch, got {:?}", other),
    }
}
