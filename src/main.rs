// Local self-play runner for the spe_ed engine
//
// Usage:
//   spe-ed-engine [config_path]
//
// Plays one game of the engine against the opponent policies listed in the
// configuration and optionally records every round as JSONL.

use log::{error, info};
use std::env;
use std::process;
use std::time::Instant;

use spe_ed_engine::config::Config;
use spe_ed_engine::game::LocalGame;
use spe_ed_engine::game_log::GameRecorder;
use spe_ed_engine::simple_profiler;

#[tokio::main]
async fn main() {
    // We default to 'info' level logging. But if the `RUST_LOG` environment variable is set,
    // we keep that value instead.
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }

    env_logger::init();

    info!("Starting spe_ed engine...");

    let config = match env::args().nth(1) {
        Some(path) => Config::from_file(&path).unwrap_or_else(|e| {
            eprintln!("Warning: Could not load config from '{}': {}", path, e);
            eprintln!("Using default configuration");
            Config::default_hardcoded()
        }),
        None => Config::load_or_default(),
    };

    if config.profiling.enabled {
        env::set_var("SPE_ED_PROFILE", "1");
    }

    let game = match LocalGame::from_config(&config) {
        Ok(game) => game,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };
    let recorder = GameRecorder::new(config.debug.enabled, &config.debug.log_file_path).await;

    // The game loop is CPU-bound; keep it off the async workers
    let start = Instant::now();
    let (outcome, recorder) = match tokio::task::spawn_blocking(move || {
        let outcome = game.run(&recorder);
        (outcome, recorder)
    })
    .await
    {
        Ok(result) => result,
        Err(e) => {
            error!("Game loop failed: {}", e);
            process::exit(1);
        }
    };
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let written = recorder.finish().await;
    if written > 0 {
        info!("Recorded {} snapshots to {}", written, config.debug.log_file_path);
    }

    simple_profiler::merge_thread_local();
    simple_profiler::print_report(elapsed_ms);

    println!("Rounds played: {}", outcome.rounds);
    for (id, name) in &outcome.names {
        println!("  Player {}: {}", id, name);
    }
    match outcome.winner {
        Some(id) => println!("Winner: player {}", id),
        None => println!("Winner: none (draw or round limit)"),
    }
}
