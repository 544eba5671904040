// Game record writer for asynchronous snapshot logging
//
// Snapshots are handed to a channel and written by a single tokio task, so
// recording never blocks the game loop and lines keep the round order. Each
// snapshot becomes one JSONL line that `SavedGame::load` reads back.

use log::{error, info};
use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::task::JoinHandle;

use crate::replay::GameSnapshot;

/// Represents a single record line
#[derive(Debug, Serialize)]
struct RecordEntry {
    #[serde(flatten)]
    snapshot: GameSnapshot,
    timestamp: String,
}

/// Writes game snapshots to a JSONL file
/// A disabled recorder accepts snapshots and drops them
pub struct GameRecorder {
    sender: Option<UnboundedSender<GameSnapshot>>,
    writer: Option<JoinHandle<usize>>,
}

impl GameRecorder {
    /// Creates a new recorder
    /// If enabled is true, initializes the record file (truncating if it exists)
    pub async fn new(enabled: bool, log_file_path: &str) -> Self {
        if !enabled {
            return Self::disabled();
        }

        let mut file = match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_file_path)
            .await
        {
            Ok(file) => file,
            Err(e) => {
                error!("Failed to create game record file '{}': {}", log_file_path, e);
                return Self::disabled();
            }
        };
        info!("Game recording enabled: {}", log_file_path);

        let (sender, mut receiver) = unbounded_channel::<GameSnapshot>();
        let writer = tokio::spawn(async move {
            let mut written = 0;
            while let Some(snapshot) = receiver.recv().await {
                let entry = RecordEntry {
                    snapshot,
                    timestamp: chrono::Utc::now().to_rfc3339(),
                };
                match serde_json::to_string(&entry) {
                    Ok(json_line) => {
                        let line_with_newline = format!("{}\n", json_line);
                        if let Err(e) = file.write_all(line_with_newline.as_bytes()).await {
                            error!("Failed to write game record entry: {}", e);
                        } else {
                            written += 1;
                        }
                    }
                    Err(e) => {
                        error!("Failed to serialize game record entry: {}", e);
                    }
                }
            }
            if let Err(e) = file.flush().await {
                error!("Failed to flush game record: {}", e);
            }
            written
        });

        GameRecorder {
            sender: Some(sender),
            writer: Some(writer),
        }
    }

    /// Creates a disabled recorder (no-op)
    pub fn disabled() -> Self {
        GameRecorder {
            sender: None,
            writer: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Queues a snapshot without blocking; callable from any thread
    pub fn record(&self, snapshot: &GameSnapshot) {
        if let Some(sender) = &self.sender {
            if sender.send(snapshot.clone()).is_err() {
                error!("Game record writer has stopped, dropping snapshot");
            }
        }
    }

    /// Closes the channel and waits until every queued snapshot is on disk
    ///
    /// Returns the number of written lines.
    pub async fn finish(mut self) -> usize {
        self.sender.take();
        match self.writer.take() {
            Some(writer) => writer.await.unwrap_or_else(|e| {
                error!("Game record writer failed: {}", e);
                0
            }),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::SavedGame;
    use crate::simulator::SimulationState;
    use crate::types::{Action, Direction, Grid, Player};

    #[tokio::test]
    async fn test_disabled_recorder_is_noop() {
        let recorder = GameRecorder::disabled();
        assert!(!recorder.is_enabled());
        let state = SimulationState::new(Grid::new(2, 2), vec![], 1);
        recorder.record(&GameSnapshot::from_state(&state, None, false));
        assert_eq!(recorder.finish().await, 0);
    }

    #[tokio::test]
    async fn test_records_load_back_in_order() {
        let path = std::env::temp_dir().join(format!("spe_ed_record_{}.jsonl", std::process::id()));
        let path_str = path.to_string_lossy().to_string();

        let recorder = GameRecorder::new(true, &path_str).await;
        assert!(recorder.is_enabled());

        let mut state = SimulationState::new(Grid::new(6, 1), vec![Player::new(1, 0, 0, Direction::Right, 1)], 1);
        state.grid.set(state.players[0].position(), 1);
        for _ in 0..3 {
            recorder.record(&GameSnapshot::from_state(&state, Some(1), true));
            state = state.step(&[Action::ChangeNothing]);
        }
        recorder.record(&GameSnapshot::from_state(&state, Some(1), false));
        assert_eq!(recorder.finish().await, 4);

        let game = SavedGame::load(&path).unwrap();
        assert_eq!(game.snapshot_count(), 4);
        assert_eq!(game.rounds(), 3);
        assert_eq!(game.snapshots()[3].players[&1].x, 3);
        let _ = std::fs::remove_file(&path);
    }
}
