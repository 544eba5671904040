// Standalone replay tool for recorded spe_ed games
//
// Usage:
//   cargo run --bin replay -- <game_file> [options]
//
// Options:
//   --verify                 Check that the simulator reproduces every transition
//   --all                    Re-run the engine on every decision of the player
//   --rounds <r1,r2>         Re-run the engine on specific rounds (comma-separated)
//   --validate <r:a,...>     Check recorded actions of the player
//   --player <id>            Player to analyse (default: the record's `you`, else 1)
//   --verbose                Show detailed output for each round
//   --config <path>          Path to Engine.toml (default: Engine.toml)

use std::env;
use std::process;

use spe_ed_engine::config::Config;
use spe_ed_engine::replay::{ReplayEngine, SavedGame};
use spe_ed_engine::types::Action;

fn print_usage() {
    eprintln!("spe_ed Replay Tool");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("  replay <game_file> [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("  --verify                Check every recorded transition against the simulator");
    eprintln!("  --all                   Re-run the engine on every decision of the player");
    eprintln!("  --rounds <R1,R2,...>    Re-run the engine on specific rounds (comma-separated)");
    eprintln!("  --validate <R:A,...>    Validate recorded actions (format: round:action,...)");
    eprintln!("  --player <id>           Player to analyse (default: recorded `you`, else 1)");
    eprintln!("  --verbose               Show detailed output for each round");
    eprintln!("  --config <path>         Path to Engine.toml (default: Engine.toml)");
    eprintln!("  --help                  Show this help message");
    eprintln!();
    eprintln!("EXAMPLES:");
    eprintln!("  # Verify a recorded game");
    eprintln!("  replay game_records.jsonl --verify");
    eprintln!();
    eprintln!("  # Replay specific rounds of player 2");
    eprintln!("  replay game.json --rounds 5,10,15 --player 2");
    eprintln!();
    eprintln!("  # Validate expected actions");
    eprintln!("  replay game.json --validate 1:speed_up,2:turn_right|turn_left");
}

fn parse_rounds(s: &str) -> Result<Vec<u32>, String> {
    s.split(',')
        .map(|r| {
            r.trim()
                .parse::<u32>()
                .map_err(|e| format!("Invalid round number '{}': {}", r, e))
        })
        .collect()
}

fn parse_expected_actions(s: &str) -> Result<Vec<(u32, Vec<Action>)>, String> {
    s.split(',')
        .map(|pair| {
            let parts: Vec<&str> = pair.trim().split(':').collect();
            if parts.len() != 2 {
                return Err(format!("Invalid format '{}'. Expected 'round:action'", pair));
            }

            let round = parts[0]
                .parse::<u32>()
                .map_err(|e| format!("Invalid round number '{}': {}", parts[0], e))?;

            // Support multiple acceptable actions separated by '|'
            let actions: Result<Vec<Action>, String> =
                parts[1].split('|').map(|a| Action::parse(a.trim())).collect();

            Ok((round, actions?))
        })
        .collect()
}

fn option_value<'a>(args: &'a [String], i: usize, name: &str) -> &'a str {
    match args.get(i + 1) {
        Some(value) => value.as_str(),
        None => {
            eprintln!("Error: {} requires an argument", name);
            process::exit(1);
        }
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args.contains(&"--help".to_string()) {
        print_usage();
        process::exit(if args.contains(&"--help".to_string()) {
            0
        } else {
            1
        });
    }

    let game_file = &args[1];
    let mut config_path = "Engine.toml".to_string();
    let mut verbose = false;
    let mut player: Option<u8> = None;
    let mut mode: Option<&str> = None;
    let mut mode_arg = String::new();

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--verify" => mode = Some("verify"),
            "--all" => mode = Some("all"),
            "--rounds" => {
                mode = Some("rounds");
                mode_arg = option_value(&args, i, "--rounds").to_string();
                i += 1;
            }
            "--validate" => {
                mode = Some("validate");
                mode_arg = option_value(&args, i, "--validate").to_string();
                i += 1;
            }
            "--player" => {
                let value = option_value(&args, i, "--player");
                player = match value.parse::<u8>() {
                    Ok(id) => Some(id),
                    Err(e) => {
                        eprintln!("Error: Invalid player id '{}': {}", value, e);
                        process::exit(1);
                    }
                };
                i += 1;
            }
            "--config" => {
                config_path = option_value(&args, i, "--config").to_string();
                i += 1;
            }
            "--verbose" => verbose = true,
            _ => {
                eprintln!("Error: Unknown option '{}'", args[i]);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    let Some(mode) = mode else {
        eprintln!("Error: Must specify --verify, --all, --rounds, or --validate");
        print_usage();
        process::exit(1);
    };

    let config = Config::from_file(&config_path).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from '{}': {}", config_path, e);
        eprintln!("Using default configuration");
        Config::default_hardcoded()
    });

    println!("Loaded configuration from: {}", config_path);
    println!("Replay game file: {}", game_file);
    println!();

    let game = match SavedGame::load(game_file) {
        Ok(game) => game,
        Err(e) => {
            eprintln!("Error loading game file: {}", e);
            process::exit(1);
        }
    };

    let player = player
        .or_else(|| game.snapshots()[0].you)
        .unwrap_or(1);
    println!("Loaded {} snapshots, analysing player {}\n", game.snapshot_count(), player);

    let engine = ReplayEngine::new(config, verbose);

    match mode {
        "verify" => match engine.verify_transitions(&game) {
            Ok(count) => {
                println!("✓ All {} transitions reproduced exactly", count);
                match game.winner() {
                    Some(id) => println!("Winner: player {}", id),
                    None => println!("Winner: none"),
                }
                if let Ok(histogram) = engine.action_histogram(&game) {
                    for (action, count) in histogram {
                        println!("  {:<15} {}", action, count);
                    }
                }
            }
            Err(e) => {
                eprintln!("✗ Verification failed: {}", e);
                process::exit(1);
            }
        },
        "all" => match engine.replay_all(&game, player) {
            Ok(results) => engine.print_report(&results),
            Err(e) => {
                eprintln!("Error during replay: {}", e);
                process::exit(1);
            }
        },
        "rounds" => {
            let rounds = match parse_rounds(&mode_arg) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("Error parsing rounds: {}", e);
                    process::exit(1);
                }
            };
            let indices: Vec<usize> = rounds
                .iter()
                .filter_map(|r| r.checked_sub(1).map(|i| i as usize))
                .collect();

            println!("Replaying {} specific round(s)...\n", indices.len());
            match engine.replay_decisions(&game, player, &indices) {
                Ok(results) => engine.print_report(&results),
                Err(e) => {
                    eprintln!("Error during replay: {}", e);
                    process::exit(1);
                }
            }
        }
        "validate" => {
            let expected = match parse_expected_actions(&mode_arg) {
                Ok(m) => m,
                Err(e) => {
                    eprintln!("Error parsing expected actions: {}", e);
                    process::exit(1);
                }
            };

            println!("Validating {} expected action(s)...\n", expected.len());
            match engine.validate_expected_actions(&game, player, &expected) {
                Ok(()) => println!("✓ All expected actions validated successfully!"),
                Err(e) => {
                    eprintln!("✗ Validation failed: {}", e);
                    process::exit(1);
                }
            }
        }
        _ => unreachable!(),
    }
}
