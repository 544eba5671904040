// Board evaluation heuristics
//
// Every heuristic maps (grid, player, opponents, round, deadline) to a score in
// [0, 1] and never modifies its inputs.

use log::debug;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::time::Instant;

use crate::error::ConfigError;
use crate::profile;
use crate::regions::{Mask, Morphology, RegionMap};
use crate::simulator::Simulator;
use crate::types::{Action, Coord, Grid, Player};
use crate::voronoi::Tessellation;

/// Scores a board from the controlled player's point of view
pub trait Heuristic: Send + Sync {
    fn score(
        &self,
        grid: &Grid,
        player: &Player,
        opponents: &[Player],
        round: u32,
        deadline: Instant,
    ) -> f64;

    fn name(&self) -> String;
}

fn with_opponents<'a>(player: &'a Player, opponents: &'a [Player]) -> Vec<&'a Player> {
    std::iter::once(player).chain(opponents.iter()).collect()
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Returns the same value for every board
pub struct ConstantHeuristic {
    value: f64,
}

impl ConstantHeuristic {
    pub fn new(value: f64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::InvalidValue {
                name: "constant",
                reason: format!("{} is outside [0, 1]", value),
            });
        }
        Ok(ConstantHeuristic { value })
    }
}

impl Heuristic for ConstantHeuristic {
    fn score(&self, _: &Grid, _: &Player, _: &[Player], _: u32, _: Instant) -> f64 {
        self.value
    }

    fn name(&self) -> String {
        format!("ConstantHeuristic({})", self.value)
    }
}

/// Uniform random score for active players, 0 otherwise
pub struct RandomHeuristic {
    rng: Mutex<StdRng>,
}

impl RandomHeuristic {
    /// Pass `None` for a non-reproducible seed
    pub fn new(seed: Option<u64>) -> Self {
        RandomHeuristic {
            rng: Mutex::new(seeded_rng(seed)),
        }
    }
}

impl Heuristic for RandomHeuristic {
    fn score(&self, _: &Grid, player: &Player, _: &[Player], _: u32, _: Instant) -> f64 {
        if !player.active {
            return 0.0;
        }
        self.rng.lock().random::<f64>()
    }

    fn name(&self) -> String {
        "RandomHeuristic()".to_string()
    }
}

/// Size of the player's region, shared among the opponents inside it
pub struct RegionHeuristic {
    morphology: Morphology,
    include_opponent_regions: bool,
}

impl RegionHeuristic {
    pub fn new(closing_iterations: usize, include_opponent_regions: bool) -> Self {
        RegionHeuristic {
            morphology: Morphology::closing(closing_iterations),
            include_opponent_regions,
        }
    }

    fn share(regions: &RegionMap, id: u8, area: f64) -> f64 {
        let size = regions.player_region_size(id) as f64;
        size / (1 + regions.players_sharing_region(id)) as f64 / area
    }
}

impl Heuristic for RegionHeuristic {
    fn score(&self, grid: &Grid, player: &Player, opponents: &[Player], _: u32, _: Instant) -> f64 {
        if !player.active {
            return 0.0;
        }
        let regions = RegionMap::label(grid, &with_opponents(player, opponents), &self.morphology);
        let area = grid.area() as f64;
        let own = Self::share(&regions, player.id, area);

        if !self.include_opponent_regions {
            return own;
        }
        let best_opponent = opponents
            .iter()
            .filter(|o| o.active)
            .map(|o| Self::share(&regions, o.id, area))
            .fold(0.0, f64::max);
        own * (1.0 - best_opponent)
    }

    fn name(&self) -> String {
        format!(
            "RegionHeuristic(closing_iterations={}, include_opponent_regions={})",
            self.morphology.closing, self.include_opponent_regions
        )
    }
}

/// Share of the board the player reaches before every opponent
pub struct VoronoiHeuristic {
    max_steps: usize,
    opening_iterations: usize,
    minimize_opponents: bool,
}

impl VoronoiHeuristic {
    pub fn new(max_steps: usize, opening_iterations: usize, minimize_opponents: bool) -> Self {
        VoronoiHeuristic {
            max_steps,
            opening_iterations,
            minimize_opponents,
        }
    }

    /// Cells owned by `p`, restricted to cells that are really free
    fn owned_cells(t: &Tessellation, grid: &Grid, p: &Player) -> usize {
        let mut count = 0;
        for y in 0..grid.height() as i32 {
            for x in 0..grid.width() as i32 {
                let c = Coord::new(x, y);
                if t.owner(c) == p.id && (grid.is_free(c) || c == p.position()) {
                    count += 1;
                }
            }
        }
        count
    }
}

impl Heuristic for VoronoiHeuristic {
    fn score(&self, grid: &Grid, player: &Player, opponents: &[Player], _: u32, _: Instant) -> f64 {
        if !player.active {
            return 0.0;
        }
        let players = with_opponents(player, opponents);
        let area = grid.area() as f64;

        let (tessellation, opened) = if self.opening_iterations > 0 {
            // thin walls become passable so jumps over them are accounted for
            let walls = Morphology::opening(self.opening_iterations).apply(&Mask::occupied(grid));
            (Tessellation::compute_on(&walls, &players, self.max_steps), true)
        } else {
            (Tessellation::compute(grid, &players, self.max_steps), false)
        };

        let count = |p: &Player| {
            if opened {
                Self::owned_cells(&tessellation, grid, p)
            } else {
                tessellation.cell_count(p.id)
            }
        };

        let own = count(player) as f64 / area;
        if !self.minimize_opponents {
            return own;
        }
        let best_opponent = opponents
            .iter()
            .filter(|o| o.active)
            .map(|o| count(o) as f64 / area)
            .fold(0.0, f64::max);
        own * (1.0 - best_opponent)
    }

    fn name(&self) -> String {
        format!(
            "VoronoiHeuristic(max_steps={}, opening_iterations={}, minimize_opponents={})",
            self.max_steps, self.opening_iterations, self.minimize_opponents
        )
    }
}

/// Distance to the nearest active opponent, capped and normalized by width + height
pub struct OpponentDistanceHeuristic {
    dist_threshold: i32,
}

impl OpponentDistanceHeuristic {
    pub fn new(dist_threshold: i32) -> Self {
        OpponentDistanceHeuristic { dist_threshold }
    }
}

impl Heuristic for OpponentDistanceHeuristic {
    fn score(&self, grid: &Grid, player: &Player, opponents: &[Player], _: u32, _: Instant) -> f64 {
        let nearest = opponents
            .iter()
            .filter(|o| o.active)
            .map(|o| player.position().manhattan(&o.position()))
            .min();
        match nearest {
            None => 1.0,
            Some(d) => {
                let d = d.min(self.dist_threshold) as f64;
                (d / (grid.width() + grid.height()) as f64).min(1.0)
            }
        }
    }

    fn name(&self) -> String {
        format!("OpponentDistanceHeuristic(dist_threshold={})", self.dist_threshold)
    }
}

/// Longest survivable action sequence found by depth-first search, relative to `n_steps`
pub struct PathLengthHeuristic {
    n_steps: usize,
    expanded_node_limit: usize,
}

impl PathLengthHeuristic {
    const ORDER: [Action; 5] = [
        Action::ChangeNothing,
        Action::TurnLeft,
        Action::TurnRight,
        Action::SlowDown,
        Action::SpeedUp,
    ];

    pub fn new(n_steps: usize, expanded_node_limit: usize) -> Result<Self, ConfigError> {
        if n_steps == 0 {
            return Err(ConfigError::InvalidValue {
                name: "n_steps",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(PathLengthHeuristic {
            n_steps,
            expanded_node_limit,
        })
    }

    fn dfs(&self, sim: &mut Simulator, expanded: &mut usize, deadline: Instant) -> usize {
        let mut longest = sim.depth();
        if longest >= self.n_steps
            || *expanded > self.expanded_node_limit
            || Instant::now() >= deadline
        {
            return longest;
        }

        for action in Self::ORDER {
            let alive = sim.step(&[action]).players[0].active;
            if alive {
                let length = self.dfs(sim, expanded, deadline);
                if length >= self.n_steps {
                    sim.undo();
                    return length;
                }
                longest = longest.max(length);
            }
            sim.undo();
        }

        *expanded += 1;
        longest
    }
}

impl Heuristic for PathLengthHeuristic {
    fn score(&self, grid: &Grid, player: &Player, _: &[Player], round: u32, deadline: Instant) -> f64 {
        if !player.active {
            return 0.0;
        }
        let mut sim = Simulator::single_player(grid, player, round);
        let mut expanded = 0;
        let length = self.dfs(&mut sim, &mut expanded, deadline);
        length as f64 / self.n_steps as f64
    }

    fn name(&self) -> String {
        format!(
            "PathLengthHeuristic(n_steps={}, expanded_node_limit={})",
            self.n_steps, self.expanded_node_limit
        )
    }
}

/// Best score over several random survivable rollouts
///
/// Without an inner heuristic a probe scores its length relative to `n_steps`.
pub struct RandomProbingHeuristic {
    inner: Option<Box<dyn Heuristic>>,
    n_steps: usize,
    n_probes: usize,
    actions: Vec<Action>,
    rng: Mutex<StdRng>,
}

impl RandomProbingHeuristic {
    pub fn new(
        inner: Option<Box<dyn Heuristic>>,
        n_steps: usize,
        n_probes: usize,
        full_action_set: bool,
        seed: Option<u64>,
    ) -> Result<Self, ConfigError> {
        if n_steps == 0 || n_probes == 0 {
            return Err(ConfigError::InvalidValue {
                name: "n_steps/n_probes",
                reason: "must be at least 1".to_string(),
            });
        }
        let actions = if full_action_set {
            Action::ALL.to_vec()
        } else {
            vec![Action::ChangeNothing, Action::TurnLeft, Action::TurnRight]
        };
        Ok(RandomProbingHeuristic {
            inner,
            n_steps,
            n_probes,
            actions,
            rng: Mutex::new(seeded_rng(seed)),
        })
    }

    /// Walks random surviving actions until `n_steps` or a dead end
    fn probe(&self, sim: &mut Simulator) {
        let mut actions = self.actions.clone();
        for _ in 0..self.n_steps {
            actions.shuffle(&mut *self.rng.lock());
            let mut dead_end = true;
            for &action in &actions {
                if sim.step(&[action]).players[0].active {
                    dead_end = false;
                    break;
                }
                sim.undo();
            }
            if dead_end {
                break;
            }
        }
    }
}

impl Heuristic for RandomProbingHeuristic {
    fn score(&self, grid: &Grid, player: &Player, opponents: &[Player], round: u32, deadline: Instant) -> f64 {
        if !player.active {
            return 0.0;
        }
        let mut best: f64 = 0.0;
        for probe in 0..self.n_probes {
            if probe > 0 && Instant::now() >= deadline {
                break;
            }
            let mut sim = Simulator::single_player(grid, player, round);
            self.probe(&mut sim);

            let state = sim.state();
            let score = match (&self.inner, state.players.first()) {
                (Some(h), Some(p)) => h.score(&state.grid, p, opponents, state.round, deadline),
                _ => sim.depth() as f64 / self.n_steps as f64,
            };
            best = best.max(score);
        }
        best
    }

    fn name(&self) -> String {
        format!(
            "RandomProbingHeuristic(inner={}, n_steps={}, n_probes={})",
            self.inner.as_ref().map(|h| h.name()).unwrap_or_else(|| "None".to_string()),
            self.n_steps,
            self.n_probes
        )
    }
}

/// Fraction of forward/left/right neighbours that are blocked
pub struct WallhugHeuristic;

impl Heuristic for WallhugHeuristic {
    fn score(&self, grid: &Grid, player: &Player, _: &[Player], _: u32, _: Instant) -> f64 {
        let head = player.position();
        let d = player.direction;
        let blocked = [d, d.turn_left(), d.turn_right()]
            .iter()
            .filter(|dir| !grid.is_free(dir.apply(&head)))
            .count();
        blocked as f64 / 3.0
    }

    fn name(&self) -> String {
        "WallhugHeuristic()".to_string()
    }
}

/// 1 when no active opponent shares the player's region, with and without smoothing
pub struct IsolationHeuristic;

impl Heuristic for IsolationHeuristic {
    fn score(&self, grid: &Grid, player: &Player, opponents: &[Player], _: u32, _: Instant) -> f64 {
        if !player.active {
            return 0.0;
        }
        let players = with_opponents(player, opponents);
        let raw = RegionMap::label(grid, &players, &Morphology::none());
        let smoothed = RegionMap::label(
            grid,
            &players,
            &Morphology {
                closing: 1,
                opening: 1,
                ..Morphology::default()
            },
        );
        let shared = raw.players_sharing_region(player.id) + smoothed.players_sharing_region(player.id);
        if shared == 0 {
            1.0
        } else {
            0.0
        }
    }

    fn name(&self) -> String {
        "IsolationHeuristic()".to_string()
    }
}

/// Round number relative to `n_steps`, capped at 1; 0 once the player is out
pub struct RoundsHeuristic {
    n_steps: u32,
}

impl RoundsHeuristic {
    pub fn new(n_steps: u32) -> Result<Self, ConfigError> {
        if n_steps == 0 {
            return Err(ConfigError::InvalidValue {
                name: "n_steps",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(RoundsHeuristic { n_steps })
    }
}

impl Heuristic for RoundsHeuristic {
    fn score(&self, _: &Grid, player: &Player, _: &[Player], round: u32, _: Instant) -> f64 {
        if !player.active {
            return 0.0;
        }
        (f64::from(round) / f64::from(self.n_steps)).min(1.0)
    }

    fn name(&self) -> String {
        format!("RoundsHeuristic(n_steps={})", self.n_steps)
    }
}

/// Region share like `RegionHeuristic`, on a board whose diagonal gaps are sealed
///
/// Heads of inactive opponents stay walls.
pub struct CloseRegionHeuristic;

impl Heuristic for CloseRegionHeuristic {
    fn score(&self, grid: &Grid, player: &Player, opponents: &[Player], _: u32, _: Instant) -> f64 {
        if !player.active {
            return 0.0;
        }
        let mut walls = Mask::occupied(grid).close_diagonal_gaps();
        walls.set(player.position(), false);
        for o in opponents {
            walls.set(o.position(), !o.active);
        }
        let regions = RegionMap::label_free(&walls);
        let Some(own) = regions.label_at(player.position()) else {
            return 0.0;
        };
        let sharing = opponents
            .iter()
            .filter(|o| o.active && regions.label_at(o.position()) == Some(own))
            .count();
        regions.region_size(own) as f64 / (1 + sharing) as f64 / grid.area() as f64
    }

    fn name(&self) -> String {
        "CloseRegionHeuristic()".to_string()
    }
}

/// Weighted sum of heuristics with weights normalized to 1
pub struct CompositeHeuristic {
    heuristics: Vec<Box<dyn Heuristic>>,
    weights: Vec<f64>,
}

impl CompositeHeuristic {
    /// Pass `None` as `weights` for uniform weighting
    pub fn new(heuristics: Vec<Box<dyn Heuristic>>, weights: Option<Vec<f64>>) -> Result<Self, ConfigError> {
        if heuristics.is_empty() {
            return Err(ConfigError::NoHeuristics);
        }
        let weights = weights.unwrap_or_else(|| vec![1.0; heuristics.len()]);
        if weights.len() != heuristics.len() {
            return Err(ConfigError::WeightCountMismatch {
                weights: weights.len(),
                heuristics: heuristics.len(),
            });
        }
        let total: f64 = weights.iter().sum();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || total <= 0.0 {
            return Err(ConfigError::InvalidWeights);
        }
        let weights = weights.iter().map(|w| w / total).collect();
        Ok(CompositeHeuristic { heuristics, weights })
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl Heuristic for CompositeHeuristic {
    fn score(&self, grid: &Grid, player: &Player, opponents: &[Player], round: u32, deadline: Instant) -> f64 {
        profile!(crate::simple_profiler::Category::Heuristic, {
            let mut total = 0.0;
            for (i, (heuristic, weight)) in self.heuristics.iter().zip(&self.weights).enumerate() {
                if Instant::now() >= deadline {
                    debug!("Composite deadline reached after {} of {} heuristics", i, self.heuristics.len());
                    break;
                }
                total += weight * heuristic.score(grid, player, opponents, round, deadline);
            }
            total
        })
    }

    fn name(&self) -> String {
        let parts: Vec<String> = self
            .heuristics
            .iter()
            .zip(&self.weights)
            .map(|(h, w)| format!("{:.3}*{}", w, h.name()))
            .collect();
        format!("CompositeHeuristic([{}])", parts.join(", "))
    }
}
