// Decision policies: one action per round for the controlled player
//
// Includes the one-step heuristic policy, the space-filling endgame policy,
// simple baselines used as opponents in local games, a scripted policy for
// replays and the phase-switching conditional policy. The tree search policies
// live in `search`.

use log::debug;
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;

use crate::conditions::Condition;
use crate::error::ConfigError;
use crate::heuristics::{Heuristic, PathLengthHeuristic};
use crate::occupancy::OccupancyMap;
use crate::regions::{Mask, Morphology, RegionMap};
use crate::simulator::SimulationState;
use crate::types::{Action, Coord, Direction, Grid, Player, MAX_SPEED, MIN_SPEED};

/// Chooses an action for `you` before `deadline`
pub trait Policy: Send {
    fn act(
        &mut self,
        grid: &Grid,
        you: &Player,
        opponents: &[Player],
        round: u32,
        deadline: Instant,
    ) -> Action;

    fn name(&self) -> String;
}

/// Free cell at `offset` relative to the player's head
fn is_free_at(grid: &Grid, player: &Player, offset: Coord) -> bool {
    grid.is_free(Coord::new(player.x + offset.x, player.y + offset.y))
}

/// Scores every action after one step and picks the best
pub struct HeuristicPolicy {
    heuristic: Box<dyn Heuristic>,
    occupancy_depth: usize,
    actions: Vec<Action>,
}

impl HeuristicPolicy {
    /// # Arguments
    /// * `occupancy_depth` - Forecast depth for weighting newly occupied cells; 0 disables it
    /// * `actions` - Candidate actions; `None` means all five
    pub fn new(
        heuristic: Box<dyn Heuristic>,
        occupancy_depth: usize,
        actions: Option<Vec<Action>>,
    ) -> Result<Self, ConfigError> {
        let actions = actions.unwrap_or_else(|| Action::ALL.to_vec());
        if actions.is_empty() {
            return Err(ConfigError::NoActions);
        }
        Ok(HeuristicPolicy {
            heuristic,
            occupancy_depth,
            actions,
        })
    }
}

impl Policy for HeuristicPolicy {
    fn act(&mut self, grid: &Grid, you: &Player, opponents: &[Player], round: u32, deadline: Instant) -> Action {
        let occupancy = (self.occupancy_depth > 0)
            .then(|| OccupancyMap::forecast(grid, opponents, round, self.occupancy_depth, 1.0));
        let root = SimulationState::new(grid.clone(), vec![you.clone()], round);

        let mut best = (self.actions[0], f64::NEG_INFINITY);
        for &action in &self.actions {
            let next = root.step(&[action]);
            let mut score = 0.0;
            if let Some(p) = next.players.first().filter(|p| p.active) {
                score = self.heuristic.score(&next.grid, p, opponents, next.round, deadline);
                if let Some(occ) = &occupancy {
                    score *= occ.survival_probability(&next.changed_cells);
                }
            }
            if score > best.1 {
                best = (action, score);
            }
        }
        debug!("{} chose {} (score: {:.4})", self.name(), best.0, best.1);
        best.0
    }

    fn name(&self) -> String {
        format!(
            "HeuristicPolicy(heuristic={}, occupancy_depth={})",
            self.heuristic.name(),
            self.occupancy_depth
        )
    }
}

/// Whether a tie-breaker keeps the highest or the lowest scores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Goal {
    Max,
    Min,
}

/// Keeps the actions with the best score after one step
///
/// Fatal actions score worst. Lists of at most one action pass unchanged.
fn tiebreak<F>(root: &SimulationState, remaining: Vec<Action>, goal: Goal, score: F) -> Vec<Action>
where
    F: Fn(&SimulationState, &Player) -> f64,
{
    if remaining.len() <= 1 {
        return remaining;
    }
    let worst = match goal {
        Goal::Max => f64::NEG_INFINITY,
        Goal::Min => f64::INFINITY,
    };
    let scores: Vec<f64> = remaining
        .iter()
        .map(|&action| {
            let next = root.step(&[action]);
            match next.players.first().filter(|p| p.active) {
                Some(p) => score(&next, p),
                None => worst,
            }
        })
        .collect();
    let best = match goal {
        Goal::Max => scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        Goal::Min => scores.iter().copied().fold(f64::INFINITY, f64::min),
    };
    remaining
        .into_iter()
        .zip(scores)
        .filter(|(_, s)| *s == best)
        .map(|(a, _)| a)
        .collect()
}

/// Fills the player's region once no opponent can interfere
///
/// Narrows the candidate actions through a chain of tie-breakers: largest own
/// region, fewest separate regions, fewest occupied cells after closing and
/// dilation (2 then 1 iterations), longest survivable path. The last remaining
/// action is played.
pub struct EndgamePolicy {
    actions: Vec<Action>,
    path_length: PathLengthHeuristic,
}

impl EndgamePolicy {
    const DEFAULT_ACTIONS: [Action; 4] = [
        Action::TurnLeft,
        Action::TurnRight,
        Action::SlowDown,
        Action::ChangeNothing,
    ];

    /// # Arguments
    /// * `actions` - Candidate actions in tie order; `None` means all but `speed_up`
    /// * `path_length_steps` - Horizon of the final path-length tie-breaker
    pub fn new(
        actions: Option<Vec<Action>>,
        path_length_steps: usize,
        path_length_node_limit: usize,
    ) -> Result<Self, ConfigError> {
        let actions = actions.unwrap_or_else(|| Self::DEFAULT_ACTIONS.to_vec());
        if actions.is_empty() {
            return Err(ConfigError::NoActions);
        }
        Ok(EndgamePolicy {
            actions,
            path_length: PathLengthHeuristic::new(path_length_steps, path_length_node_limit)?,
        })
    }

    /// Tie-breakers after the region size, abandoned at the deadline
    fn refine(&self, root: &SimulationState, remaining: Vec<Action>, deadline: Instant) -> Vec<Action> {
        let mut remaining = tiebreak(root, remaining, Goal::Min, |s, _| {
            RegionMap::label_free(&Mask::occupied(&s.grid).pad(1)).region_count() as f64
        });

        for iterations in [2, 1] {
            let closing = Morphology::closing(iterations);
            let dilation = Morphology {
                dilation: iterations,
                ..Morphology::default()
            };
            for morphology in [closing, dilation] {
                if remaining.len() <= 1 || Instant::now() >= deadline {
                    return remaining;
                }
                remaining = tiebreak(root, remaining, Goal::Min, |s, _| {
                    morphology.apply(&Mask::occupied(&s.grid)).count() as f64
                });
            }
        }

        if Instant::now() >= deadline {
            return remaining;
        }
        tiebreak(root, remaining, Goal::Max, |s, p| {
            self.path_length.score(&s.grid, p, &[], s.round, deadline)
        })
    }
}

impl Policy for EndgamePolicy {
    fn act(&mut self, grid: &Grid, you: &Player, _: &[Player], round: u32, deadline: Instant) -> Action {
        let root = SimulationState::new(grid.clone(), vec![you.clone()], round);

        // fatal actions drop out here
        let mut remaining = tiebreak(&root, self.actions.clone(), Goal::Max, |s, p| {
            RegionMap::label(&s.grid, &[p], &Morphology::none()).player_region_size(p.id) as f64
        });
        if Instant::now() < deadline {
            remaining = self.refine(&root, remaining, deadline);
        }

        let action = remaining.last().copied().unwrap_or(Action::ChangeNothing);
        debug!("Round {}: endgame chose {} of {:?}", round, action, remaining);
        action
    }

    fn name(&self) -> String {
        format!("EndgamePolicy(path_length={})", self.path_length.name())
    }
}

/// Counts free cells along every left/forward/right branch up to `n_steps` turns deep
///
/// Trails laid along a branch are not tracked, so branches may revisit cells.
pub struct FutureStepsPolicy {
    n_steps: usize,
}

impl FutureStepsPolicy {
    pub fn new(n_steps: usize) -> Self {
        FutureStepsPolicy { n_steps }
    }

    fn free_cells_ahead(grid: &Grid, from: Coord, direction: Direction, n_steps: usize) -> usize {
        let pos = direction.apply(&from);
        if !grid.is_free(pos) {
            return 0;
        }
        if n_steps == 0 {
            return 1;
        }
        1 + [direction.turn_left(), direction, direction.turn_right()]
            .iter()
            .map(|&d| Self::free_cells_ahead(grid, pos, d, n_steps - 1))
            .sum::<usize>()
    }
}

impl Policy for FutureStepsPolicy {
    fn act(&mut self, grid: &Grid, you: &Player, _: &[Player], _: u32, _: Instant) -> Action {
        let head = you.position();
        let d = you.direction;
        let left = Self::free_cells_ahead(grid, head, d.turn_left(), self.n_steps);
        let forward = Self::free_cells_ahead(grid, head, d, self.n_steps);
        let right = Self::free_cells_ahead(grid, head, d.turn_right(), self.n_steps);

        if left > forward && left >= right {
            Action::TurnLeft
        } else if right > forward && right >= left {
            Action::TurnRight
        } else {
            Action::ChangeNothing
        }
    }

    fn name(&self) -> String {
        format!("FutureStepsPolicy(n_steps={})", self.n_steps)
    }
}

/// Random unit-step walks straight ahead, left and right; the longest total wins
///
/// Walks turn randomly relative to their current heading and stop at the first
/// blocked or already visited cell.
pub struct RandomProbingPolicy {
    n_steps: usize,
    n_probes: usize,
    rng: StdRng,
}

impl RandomProbingPolicy {
    pub fn new(n_steps: usize, n_probes: usize, seed: Option<u64>) -> Result<Self, ConfigError> {
        if n_steps == 0 || n_probes == 0 {
            return Err(ConfigError::InvalidValue {
                name: "n_steps/n_probes",
                reason: "must be at least 1".to_string(),
            });
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(RandomProbingPolicy {
            n_steps,
            n_probes,
            rng,
        })
    }

    fn walk(&mut self, grid: &Grid, from: Coord, direction: Direction) -> usize {
        let mut visited: Vec<Coord> = Vec::with_capacity(self.n_steps);
        let mut pos = from;
        let mut direction = direction;
        while visited.len() < self.n_steps {
            let next = direction.apply(&pos);
            if !grid.is_free(next) || visited.contains(&next) {
                break;
            }
            visited.push(next);
            pos = next;
            direction = match self.rng.random_range(0..3) {
                0 => direction,
                1 => direction.turn_left(),
                _ => direction.turn_right(),
            };
        }
        visited.len()
    }
}

impl Policy for RandomProbingPolicy {
    fn act(&mut self, grid: &Grid, you: &Player, _: &[Player], _: u32, _: Instant) -> Action {
        let d = you.direction;
        let candidates = [
            (Action::ChangeNothing, d),
            (Action::TurnLeft, d.turn_left()),
            (Action::TurnRight, d.turn_right()),
        ];

        let mut totals = [0usize; 3];
        for _ in 0..self.n_probes {
            for (total, &(_, direction)) in totals.iter_mut().zip(&candidates) {
                *total += self.walk(grid, you.position(), direction);
            }
        }

        let mut best = 0;
        for (i, &total) in totals.iter().enumerate() {
            if total > totals[best] {
                best = i;
            }
        }
        candidates[best].0
    }

    fn name(&self) -> String {
        format!(
            "RandomProbingPolicy(n_steps={}, n_probes={})",
            self.n_steps, self.n_probes
        )
    }
}

/// Uniformly or weighted random actions; illegal speed changes become `change_nothing`
pub struct RandomPolicy {
    rng: StdRng,
    weights: Option<WeightedIndex<f64>>,
}

impl RandomPolicy {
    /// # Arguments
    /// * `weights` - One weight per action in `Action::ALL` order; `None` for uniform
    pub fn new(seed: Option<u64>, weights: Option<Vec<f64>>) -> Result<Self, ConfigError> {
        let weights = match weights {
            None => None,
            Some(w) if w.len() != Action::ALL.len() => {
                return Err(ConfigError::ActionProbabilityMismatch(w.len()))
            }
            Some(w) => Some(WeightedIndex::new(&w).map_err(|_| ConfigError::InvalidWeights)?),
        };
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(RandomPolicy { rng, weights })
    }
}

impl Policy for RandomPolicy {
    fn act(&mut self, _: &Grid, you: &Player, _: &[Player], _: u32, _: Instant) -> Action {
        let index = match &self.weights {
            Some(dist) => dist.sample(&mut self.rng),
            None => self.rng.random_range(0..Action::ALL.len()),
        };
        match Action::ALL[index] {
            Action::SpeedUp if you.speed >= MAX_SPEED => Action::ChangeNothing,
            Action::SlowDown if you.speed <= MIN_SPEED => Action::ChangeNothing,
            action => action,
        }
    }

    fn name(&self) -> String {
        "RandomPolicy()".to_string()
    }
}

/// Circles clockwise: prefers right, then straight, then left
pub struct CirclePolicy;

impl Policy for CirclePolicy {
    fn act(&mut self, grid: &Grid, you: &Player, _: &[Player], _: u32, _: Instant) -> Action {
        let d = you.direction;
        if is_free_at(grid, you, d.turn_right().cartesian()) {
            Action::TurnRight
        } else if is_free_at(grid, you, d.cartesian()) {
            Action::ChangeNothing
        } else if is_free_at(grid, you, d.turn_left().cartesian()) {
            Action::TurnLeft
        } else {
            Action::ChangeNothing
        }
    }

    fn name(&self) -> String {
        "CirclePolicy()".to_string()
    }
}

/// Goes straight until blocked, then turns left or right
pub struct MazeWalkerPolicy;

impl Policy for MazeWalkerPolicy {
    fn act(&mut self, grid: &Grid, you: &Player, _: &[Player], _: u32, _: Instant) -> Action {
        let d = you.direction;
        if is_free_at(grid, you, d.cartesian()) {
            Action::ChangeNothing
        } else if is_free_at(grid, you, d.turn_left().cartesian()) {
            Action::TurnLeft
        } else if is_free_at(grid, you, d.turn_right().cartesian()) {
            Action::TurnRight
        } else {
            Action::ChangeNothing
        }
    }

    fn name(&self) -> String {
        "MazeWalkerPolicy()".to_string()
    }
}

/// Winds inwards along its own trail, flipping orientation when cornered
pub struct SpiralPolicy {
    clockwise: bool,
}

impl SpiralPolicy {
    pub fn new() -> Self {
        SpiralPolicy { clockwise: true }
    }
}

impl Default for SpiralPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for SpiralPolicy {
    fn act(&mut self, grid: &Grid, you: &Player, _: &[Player], _: u32, _: Instant) -> Action {
        let forward = you.direction.cartesian();
        let left = you.direction.turn_left().cartesian();
        let right = you.direction.turn_right().cartesian();
        let free = |o: Coord| is_free_at(grid, you, o);

        if free(forward) && free(Coord::new(2 * forward.x, 2 * forward.y)) {
            return Action::ChangeNothing;
        }

        let (inner, inner_action, outer, outer_action) = if self.clockwise {
            (right, Action::TurnRight, left, Action::TurnLeft)
        } else {
            (left, Action::TurnLeft, right, Action::TurnRight)
        };

        if free(right) && free(left) && !free(forward) {
            self.clockwise = !self.clockwise;
            return outer_action;
        }
        if free(inner) {
            inner_action
        } else if free(outer) {
            outer_action
        } else {
            Action::ChangeNothing
        }
    }

    fn name(&self) -> String {
        "SpiralPolicy()".to_string()
    }
}

/// Plays a fixed action list; round r uses entry r-1, then `change_nothing`
pub struct ScriptedPolicy {
    actions: Vec<Action>,
}

impl ScriptedPolicy {
    pub fn new(actions: Vec<Action>) -> Self {
        ScriptedPolicy { actions }
    }
}

impl Policy for ScriptedPolicy {
    fn act(&mut self, _: &Grid, _: &Player, _: &[Player], round: u32, _: Instant) -> Action {
        round
            .checked_sub(1)
            .and_then(|i| self.actions.get(i as usize))
            .copied()
            .unwrap_or(Action::ChangeNothing)
    }

    fn name(&self) -> String {
        format!("ScriptedPolicy(actions={})", self.actions.len())
    }
}

/// Runs the first policy whose condition reaches its threshold, else the last policy
pub struct ConditionalPolicy {
    policies: Vec<Box<dyn Policy>>,
    conditions: Vec<Box<dyn Condition>>,
    thresholds: Vec<f64>,
}

impl ConditionalPolicy {
    pub fn new(
        policies: Vec<Box<dyn Policy>>,
        conditions: Vec<Box<dyn Condition>>,
        thresholds: Vec<f64>,
    ) -> Result<Self, ConfigError> {
        if policies.is_empty() {
            return Err(ConfigError::NoPolicies);
        }
        if policies.len() != conditions.len() + 1 {
            return Err(ConfigError::ConditionCountMismatch {
                policies: policies.len(),
                conditions: conditions.len(),
            });
        }
        if conditions.len() != thresholds.len() {
            return Err(ConfigError::ThresholdCountMismatch {
                conditions: conditions.len(),
                thresholds: thresholds.len(),
            });
        }
        Ok(ConditionalPolicy {
            policies,
            conditions,
            thresholds,
        })
    }
}

impl Policy for ConditionalPolicy {
    fn act(&mut self, grid: &Grid, you: &Player, opponents: &[Player], round: u32, deadline: Instant) -> Action {
        let mut selected = self.policies.len() - 1;
        for (i, (condition, threshold)) in self.conditions.iter().zip(&self.thresholds).enumerate() {
            if condition.score(grid, you, opponents, round, deadline) >= *threshold {
                selected = i;
                break;
            }
        }
        debug!("Round {}: conditional policy selected #{}", round, selected);
        self.policies[selected].act(grid, you, opponents, round, deadline)
    }

    fn name(&self) -> String {
        let names: Vec<String> = self.policies.iter().map(|p| p.name()).collect();
        format!("ConditionalPolicy([{}])", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{OccupiedCellsCondition, RoundsCondition};
    use crate::heuristics::ConstantHeuristic;
    use std::time::Duration;

    fn later() -> Instant {
        Instant::now() + Duration::from_secs(10)
    }

    #[test]
    fn test_scripted_policy_follows_plan() {
        let grid = Grid::new(5, 5);
        let p = Player::new(1, 2, 2, Direction::Right, 1);
        let mut policy = ScriptedPolicy::new(vec![Action::TurnLeft, Action::SpeedUp]);
        assert_eq!(policy.act(&grid, &p, &[], 1, later()), Action::TurnLeft);
        assert_eq!(policy.act(&grid, &p, &[], 2, later()), Action::SpeedUp);
        assert_eq!(policy.act(&grid, &p, &[], 3, later()), Action::ChangeNothing);
        assert_eq!(policy.act(&grid, &p, &[], 0, later()), Action::ChangeNothing);
    }

    #[test]
    fn test_random_policy_avoids_illegal_speed_changes() {
        let grid = Grid::new(5, 5);
        let slow = Player::new(1, 2, 2, Direction::Right, MIN_SPEED);
        let fast = Player::new(1, 2, 2, Direction::Right, MAX_SPEED);
        let mut only_slow = RandomPolicy::new(Some(1), Some(vec![0.0, 0.0, 0.0, 0.0, 1.0])).unwrap();
        let mut only_fast = RandomPolicy::new(Some(1), Some(vec![0.0, 0.0, 0.0, 1.0, 0.0])).unwrap();
        for round in 1..10 {
            assert_eq!(only_slow.act(&grid, &slow, &[], round, later()), Action::ChangeNothing);
            assert_eq!(only_fast.act(&grid, &fast, &[], round, later()), Action::ChangeNothing);
        }
    }

    #[test]
    fn test_random_policy_validates_weights() {
        assert!(matches!(
            RandomPolicy::new(None, Some(vec![1.0, 1.0])),
            Err(ConfigError::ActionProbabilityMismatch(2))
        ));
        assert!(matches!(
            RandomPolicy::new(None, Some(vec![0.0; 5])),
            Err(ConfigError::InvalidWeights)
        ));
    }

    #[test]
    fn test_circle_policy_prefers_right_turn() {
        let grid = Grid::new(5, 5);
        let p = Player::new(1, 2, 2, Direction::Right, 1);
        assert_eq!(CirclePolicy.act(&grid, &p, &[], 1, later()), Action::TurnRight);

        let bottom = Player::new(1, 2, 4, Direction::Right, 1);
        assert_eq!(CirclePolicy.act(&grid, &bottom, &[], 1, later()), Action::ChangeNothing);
    }

    #[test]
    fn test_maze_walker_turns_at_wall() {
        let grid = Grid::new(5, 5);
        let p = Player::new(1, 4, 2, Direction::Right, 1);
        assert_eq!(MazeWalkerPolicy.act(&grid, &p, &[], 1, later()), Action::TurnLeft);
        let mid = Player::new(1, 2, 2, Direction::Right, 1);
        assert_eq!(MazeWalkerPolicy.act(&grid, &mid, &[], 1, later()), Action::ChangeNothing);
    }

    #[test]
    fn test_spiral_policy_stays_alive_on_open_board() {
        let mut state = SimulationState::new(Grid::new(8, 8), vec![Player::new(1, 0, 0, Direction::Right, 1)], 1);
        state.grid.set(Coord::new(0, 0), 1);
        let mut policy = SpiralPolicy::new();
        for _ in 0..20 {
            let p = state.players[0].clone();
            let action = policy.act(&state.grid, &p, &[], state.round, later());
            state = state.step(&[action]);
        }
        assert!(state.players[0].active);
    }

    #[test]
    fn test_heuristic_policy_avoids_death() {
        let grid = Grid::new(5, 5);
        let p = Player::new(1, 4, 2, Direction::Right, 1);
        let mut policy = HeuristicPolicy::new(Box::new(ConstantHeuristic::new(0.5).unwrap()), 0, None).unwrap();
        assert_eq!(policy.act(&grid, &p, &[], 1, later()), Action::TurnLeft);
    }

    #[test]
    fn test_conditional_policy_validation() {
        let scripted = || -> Box<dyn Policy> { Box::new(ScriptedPolicy::new(vec![])) };
        let cond = || -> Box<dyn Condition> { Box::new(RoundsCondition) };

        assert!(matches!(
            ConditionalPolicy::new(vec![], vec![], vec![]),
            Err(ConfigError::NoPolicies)
        ));
        assert!(matches!(
            ConditionalPolicy::new(vec![scripted(), scripted()], vec![], vec![]),
            Err(ConfigError::ConditionCountMismatch { .. })
        ));
        assert!(matches!(
            ConditionalPolicy::new(vec![scripted(), scripted()], vec![cond()], vec![]),
            Err(ConfigError::ThresholdCountMismatch { .. })
        ));
        assert!(ConditionalPolicy::new(vec![scripted()], vec![], vec![]).is_ok());
    }

    #[test]
    fn test_conditional_policy_selects_first_satisfied() {
        let grid = Grid::new(5, 5);
        let p = Player::new(1, 2, 2, Direction::Right, 1);
        let mut policy = ConditionalPolicy::new(
            vec![
                Box::new(ScriptedPolicy::new(vec![Action::TurnLeft])),
                Box::new(ScriptedPolicy::new(vec![Action::TurnRight])),
                Box::new(ScriptedPolicy::new(vec![Action::SpeedUp])),
            ],
            vec![Box::new(RoundsCondition), Box::new(OccupiedCellsCondition)],
            vec![5.0, 0.0],
        )
        .unwrap();
        assert_eq!(policy.act(&grid, &p, &[], 1, later()), Action::TurnRight);
        // round 6 satisfies the first condition, whose policy has no entry left
        assert_eq!(policy.act(&grid, &p, &[], 6, later()), Action::ChangeNothing);
    }

    #[test]
    fn test_future_steps_turns_towards_space() {
        let mut grid = Grid::new(5, 5);
        grid.set(Coord::new(2, 0), 1);
        let top = Player::new(1, 2, 0, Direction::Right, 1);
        assert_eq!(FutureStepsPolicy::new(3).act(&grid, &top, &[], 1, later()), Action::TurnRight);

        let mut grid = Grid::new(5, 5);
        grid.set(Coord::new(4, 2), 1);
        let edge = Player::new(1, 4, 2, Direction::Right, 1);
        // left and right tie, left wins
        assert_eq!(FutureStepsPolicy::new(3).act(&grid, &edge, &[], 1, later()), Action::TurnLeft);

        let mut grid = Grid::new(5, 5);
        grid.set(Coord::new(2, 2), 1);
        let centre = Player::new(1, 2, 2, Direction::Right, 1);
        assert_eq!(FutureStepsPolicy::new(3).act(&grid, &centre, &[], 1, later()), Action::ChangeNothing);
    }

    #[test]
    fn test_random_probing_finds_only_open_side() {
        let mut grid = Grid::new(5, 5);
        grid.set(Coord::new(4, 2), 1);
        grid.set(Coord::new(4, 1), -1);
        let p = Player::new(1, 4, 2, Direction::Right, 1);
        for seed in 0..5 {
            let mut policy = RandomProbingPolicy::new(10, 3, Some(seed)).unwrap();
            assert_eq!(policy.act(&grid, &p, &[], 1, later()), Action::TurnRight);
        }
    }

    #[test]
    fn test_random_probing_is_seeded() {
        let mut grid = Grid::new(8, 8);
        grid.set(Coord::new(3, 3), 1);
        let p = Player::new(1, 3, 3, Direction::Right, 1);
        let mut a = RandomProbingPolicy::new(10, 3, Some(11)).unwrap();
        let mut b = RandomProbingPolicy::new(10, 3, Some(11)).unwrap();
        for round in 1..6 {
            assert_eq!(a.act(&grid, &p, &[], round, later()), b.act(&grid, &p, &[], round, later()));
        }
        assert!(RandomProbingPolicy::new(0, 3, None).is_err());
    }

    #[test]
    fn test_endgame_policy_validation() {
        assert!(matches!(
            EndgamePolicy::new(Some(vec![]), 5, 100),
            Err(ConfigError::NoActions)
        ));
        assert!(EndgamePolicy::new(None, 0, 100).is_err());
    }

    #[test]
    fn test_endgame_policy_enters_larger_side() {
        // wall column at x = 3 with the head in its only gap, facing a wall
        let mut grid = Grid::new(8, 5);
        for y in [0, 1, 3, 4] {
            grid.set(Coord::new(3, y), -1);
        }
        grid.set(Coord::new(3, 2), 1);
        let p = Player::new(1, 3, 2, Direction::Up, 1);
        let mut policy = EndgamePolicy::new(None, 5, 100).unwrap();
        // left side holds 15 cells, right side 20
        assert_eq!(policy.act(&grid, &p, &[], 1, later()), Action::TurnRight);
    }

    #[test]
    fn test_endgame_policy_without_survivor_plays_last_action() {
        let mut grid = Grid::new(1, 1);
        grid.set(Coord::new(0, 0), 1);
        let p = Player::new(1, 0, 0, Direction::Right, 1);
        let mut policy = EndgamePolicy::new(None, 5, 100).unwrap();
        assert_eq!(policy.act(&grid, &p, &[], 1, later()), Action::ChangeNothing);
    }
}
