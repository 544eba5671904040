// Integration tests for the replay binary
//
// Builds the binary once and runs it against the recorded fixture game.

use std::path::PathBuf;
use std::process::Command;
use std::sync::Once;

static INIT: Once = Once::new();

/// Ensures the replay binary is built before running any tests.
fn ensure_replay_binary_built() {
    INIT.call_once(|| {
        eprintln!("Building replay binary for integration tests...");

        #[cfg(debug_assertions)]
        let profile_args = vec!["build", "--bin", "replay"];
        #[cfg(not(debug_assertions))]
        let profile_args = vec!["build", "--bin", "replay", "--release"];

        let status = Command::new("cargo")
            .args(&profile_args)
            .current_dir(env!("CARGO_MANIFEST_DIR"))
            .status()
            .expect("Failed to execute cargo build");

        assert!(
            status.success(),
            "Failed to build replay binary as test dependency"
        );

        eprintln!("Replay binary built successfully.");
    });
}

/// Helper function to get the path to test fixtures
fn fixture_path(filename: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(filename)
}

/// Helper function to get the path to the replay binary
fn replay_binary_path() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("target");

    #[cfg(debug_assertions)]
    let profile = "debug";
    #[cfg(not(debug_assertions))]
    let profile = "release";

    path.push(profile);
    path.push("replay");
    path
}

/// Helper to run replay binary with arguments
fn run_replay(args: &[&str]) -> std::process::Output {
    ensure_replay_binary_built();

    Command::new(replay_binary_path())
        .args(args)
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .output()
        .expect("Failed to execute replay binary")
}

#[test]
fn test_help_prints_usage() {
    let output = run_replay(&["--help"]);
    assert!(output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("USAGE:"));
    assert!(stderr.contains("--verify"));
}

#[test]
fn test_missing_mode_fails() {
    let fixture = fixture_path("game_4p_16x16.json");
    let output = run_replay(&[fixture.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Must specify"));
}

#[test]
fn test_verify_fixture_game() {
    let fixture = fixture_path("game_4p_16x16.json");
    let output = run_replay(&[fixture.to_str().unwrap(), "--verify"]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "Verification should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout.contains("All 31 transitions reproduced exactly"));
    assert!(stdout.contains("Winner: player 4"));
    assert!(stdout.contains("turn_right"));
}

#[test]
fn test_missing_game_file_fails() {
    let output = run_replay(&["tests/fixtures/no_such_game.json", "--verify"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error loading game file"));
}

#[test]
fn test_validate_expected_actions() {
    let fixture = fixture_path("game_4p_16x16.json");
    let output = run_replay(&[
        fixture.to_str().unwrap(),
        "--validate",
        "1:speed_up,2:turn_right,5:turn_left|turn_right",
    ]);
    assert!(
        output.status.success(),
        "Validation should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("validated successfully"));

    let output = run_replay(&[fixture.to_str().unwrap(), "--validate", "1:slow_down"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Validation failed"));
}

#[test]
fn test_player_option() {
    let fixture = fixture_path("game_4p_16x16.json");
    let output = run_replay(&[
        fixture.to_str().unwrap(),
        "--player",
        "1",
        "--validate",
        "12:slow_down",
    ]);
    assert!(output.status.success());

    let output = run_replay(&[fixture.to_str().unwrap(), "--player", "x", "--verify"]);
    assert!(!output.status.success());
}

#[test]
fn test_replay_specific_rounds() {
    let fixture = fixture_path("game_4p_16x16.json");
    let output = run_replay(&[fixture.to_str().unwrap(), "--rounds", "1,2"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("REPLAY REPORT"));
    assert!(stdout.contains("Total Decisions: 2"));
}
