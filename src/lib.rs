// Library exports for the spe_ed decision engine
// The self-play binary, the replay tool and the integration tests all build on these modules

pub mod bot;
pub mod conditions;
pub mod config;
pub mod error;
pub mod game;
pub mod game_log;
pub mod heuristics;
pub mod occupancy;
pub mod policies;
pub mod regions;
pub mod replay;
pub mod search;
pub mod simple_profiler;
pub mod simulator;
pub mod types;
pub mod voronoi;
