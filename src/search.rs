// Deadline-bounded look-ahead search for the controlled player
//
// Opponents stay frozen on the board; their likely moves enter only through
// the optional occupancy forecast, which discounts every path by the
// probability of running into an opponent.

use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

use crate::error::ConfigError;
use crate::heuristics::Heuristic;
use crate::occupancy::OccupancyMap;
use crate::policies::Policy;
use crate::profile;
use crate::simple_profiler::{self, Category};
use crate::simulator::SimulationState;
use crate::types::{Action, Grid, Player};

/// One queued search node, owned by a single decision call
struct SearchNode {
    path: Vec<Action>,
    state: SimulationState,
    score: f64,
    collision_probability: f64,
    /// Primary key; deeper first for branch-and-bound, constant for best-first
    depth_key: usize,
    sequence: u64,
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchNode {}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchNode {
    // BinaryHeap pops the greatest node; earlier insertions win ties
    fn cmp(&self, other: &Self) -> Ordering {
        self.depth_key
            .cmp(&other.depth_key)
            .then_with(|| self.score.total_cmp(&other.score))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// A surviving successor of a node, before it is scored
struct Child {
    path: Vec<Action>,
    state: SimulationState,
    collision_probability: f64,
}

fn controlled(state: &SimulationState) -> Option<&Player> {
    state.players.first().filter(|p| p.active)
}

fn root_state(grid: &Grid, you: &Player, round: u32) -> SimulationState {
    SimulationState::new(grid.clone(), vec![you.clone()], round)
}

/// Root actions that keep the controlled player alive for one round
fn surviving_actions(root: &SimulationState, actions: &[Action]) -> Vec<Action> {
    actions
        .iter()
        .copied()
        .filter(|&a| controlled(&root.step(&[a])).is_some())
        .collect()
}

/// Expands `path`/`state` by every action, dropping fatal children
fn expand(
    path: &[Action],
    state: &SimulationState,
    parent_collision: f64,
    actions: &[Action],
    occupancy: Option<&OccupancyMap>,
) -> Vec<Child> {
    let mut children = Vec::with_capacity(actions.len());
    for &action in actions {
        let next = state.step(&[action]);
        if controlled(&next).is_none() {
            continue;
        }
        let survival = occupancy
            .map(|occ| occ.survival_probability(&next.changed_cells))
            .unwrap_or(1.0);
        let mut child_path = path.to_vec();
        child_path.push(action);
        children.push(Child {
            path: child_path,
            collision_probability: 1.0 - (1.0 - parent_collision) * survival,
            state: next,
        });
    }
    children
}

fn forecast(grid: &Grid, opponents: &[Player], round: u32, depth: usize, death_discount: f64) -> Option<OccupancyMap> {
    (depth > 0).then(|| OccupancyMap::forecast(grid, opponents, round, depth, death_discount))
}

fn validate_actions(actions: Option<Vec<Action>>) -> Result<Vec<Action>, ConfigError> {
    let actions = actions.unwrap_or_else(|| Action::ALL.to_vec());
    if actions.is_empty() {
        return Err(ConfigError::NoActions);
    }
    Ok(actions)
}

fn validate_depth(depth_limit: usize) -> Result<(), ConfigError> {
    if depth_limit == 0 {
        return Err(ConfigError::InvalidValue {
            name: "depth_limit",
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

/// Best-first bounded expansion
///
/// Pops the highest scoring node, scores all surviving children and keeps the
/// best evaluated path. Stops when the queue drains, the expanded node budget
/// is used up or the deadline passes.
pub struct ActionSearchPolicy {
    heuristic: Box<dyn Heuristic>,
    depth_limit: usize,
    expanded_node_limit: usize,
    occupancy_depth: usize,
    death_discount: f64,
    actions: Vec<Action>,
}

impl ActionSearchPolicy {
    pub fn new(
        heuristic: Box<dyn Heuristic>,
        depth_limit: usize,
        expanded_node_limit: usize,
        occupancy_depth: usize,
        death_discount: f64,
        actions: Option<Vec<Action>>,
    ) -> Result<Self, ConfigError> {
        validate_depth(depth_limit)?;
        if expanded_node_limit == 0 {
            return Err(ConfigError::InvalidValue {
                name: "expanded_node_limit",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(ActionSearchPolicy {
            heuristic,
            depth_limit,
            expanded_node_limit,
            occupancy_depth,
            death_discount,
            actions: validate_actions(actions)?,
        })
    }

    fn search(&self, grid: &Grid, you: &Player, opponents: &[Player], round: u32, deadline: Instant) -> Action {
        let start = Instant::now();
        let root = root_state(grid, you, round);

        let survivors = surviving_actions(&root, &self.actions);
        match survivors.as_slice() {
            [] => {
                debug!("Round {}: no surviving action", round);
                return Action::ChangeNothing;
            }
            [only] => {
                debug!("Round {}: {} is the only surviving action", round, only);
                return *only;
            }
            _ => {}
        }
        if Instant::now() >= deadline {
            debug!("Round {}: deadline already passed", round);
            return survivors[0];
        }

        let occupancy = forecast(grid, opponents, round, self.occupancy_depth, self.death_discount);

        let mut queue = BinaryHeap::new();
        let mut sequence = 0u64;
        queue.push(SearchNode {
            path: Vec::new(),
            state: root,
            score: 0.0,
            collision_probability: 0.0,
            depth_key: 0,
            sequence,
        });

        let mut best: Option<(Action, f64)> = None;
        let mut expanded = 0usize;

        while let Some(node) = queue.pop() {
            if expanded >= self.expanded_node_limit || Instant::now() >= deadline {
                break;
            }

            for child in expand(&node.path, &node.state, node.collision_probability, &self.actions, occupancy.as_ref()) {
                let Some(player) = controlled(&child.state) else { continue };
                let raw = self.heuristic.score(&child.state.grid, player, opponents, child.state.round, deadline);
                let score = raw * (1.0 - child.collision_probability);

                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((child.path[0], score));
                }

                if child.path.len() < self.depth_limit {
                    sequence += 1;
                    queue.push(SearchNode {
                        path: child.path,
                        state: child.state,
                        score,
                        collision_probability: child.collision_probability,
                        depth_key: 0,
                        sequence,
                    });
                }
            }

            expanded += 1;
            simple_profiler::record_node_expanded();
        }

        let (action, score) = best.unwrap_or((survivors[0], 0.0));
        debug!(
            "Round {}: best-first chose {} (score: {:.4}, expanded: {}, time: {}ms)",
            round,
            action,
            score,
            expanded,
            start.elapsed().as_millis()
        );
        action
    }
}

impl Policy for ActionSearchPolicy {
    fn act(&mut self, grid: &Grid, you: &Player, opponents: &[Player], round: u32, deadline: Instant) -> Action {
        profile!(Category::Search, { self.search(grid, you, opponents, round, deadline) })
    }

    fn name(&self) -> String {
        format!(
            "ActionSearchPolicy(heuristic={}, depth_limit={}, expanded_node_limit={}, occupancy_depth={})",
            self.heuristic.name(),
            self.depth_limit,
            self.expanded_node_limit,
            self.occupancy_depth
        )
    }
}

/// Branch-and-bound search maximising the worst score along a path
///
/// A child's score is capped by its parent's, so a path is worth its weakest
/// position. Deeper nodes are expanded first; the score of the first path that
/// reaches the depth limit becomes a lower bound that prunes everything not
/// strictly above it.
pub struct MaximinSearchPolicy {
    heuristic: Box<dyn Heuristic>,
    depth_limit: usize,
    occupancy_depth: usize,
    death_discount: f64,
    actions: Vec<Action>,
}

impl MaximinSearchPolicy {
    pub fn new(
        heuristic: Box<dyn Heuristic>,
        depth_limit: usize,
        occupancy_depth: usize,
        death_discount: f64,
        actions: Option<Vec<Action>>,
    ) -> Result<Self, ConfigError> {
        validate_depth(depth_limit)?;
        Ok(MaximinSearchPolicy {
            heuristic,
            depth_limit,
            occupancy_depth,
            death_discount,
            actions: validate_actions(actions)?,
        })
    }

    fn search(&self, grid: &Grid, you: &Player, opponents: &[Player], round: u32, deadline: Instant) -> Action {
        let start = Instant::now();
        let root = root_state(grid, you, round);

        let survivors = surviving_actions(&root, &self.actions);
        match survivors.as_slice() {
            [] => {
                debug!("Round {}: no surviving action", round);
                return Action::ChangeNothing;
            }
            [only] => {
                debug!("Round {}: {} is the only surviving action", round, only);
                return *only;
            }
            _ => {}
        }
        if Instant::now() >= deadline {
            debug!("Round {}: deadline already passed", round);
            return survivors[0];
        }

        let occupancy = forecast(grid, opponents, round, self.occupancy_depth, self.death_discount);

        let mut queue = BinaryHeap::new();
        let mut sequence = 0u64;
        queue.push(SearchNode {
            path: Vec::new(),
            state: root,
            score: 1.0,
            collision_probability: 0.0,
            depth_key: 0,
            sequence,
        });

        let mut best_action = survivors[0];
        let mut best_score = 0.0;
        let mut lower_bound = 0.0;
        let mut expanded = 0usize;
        let mut terminals = 0usize;

        while let Some(node) = queue.pop() {
            if Instant::now() >= deadline {
                break;
            }
            if node.score <= lower_bound {
                continue;
            }

            for child in expand(&node.path, &node.state, node.collision_probability, &self.actions, occupancy.as_ref()) {
                let Some(player) = controlled(&child.state) else { continue };
                let raw = self.heuristic.score(&child.state.grid, player, opponents, child.state.round, deadline);
                let score = (raw * (1.0 - child.collision_probability)).min(node.score);

                // until a full-depth path exists, the best partial path decides
                if lower_bound == 0.0 && score > best_score {
                    best_action = child.path[0];
                    best_score = score;
                }

                if score <= lower_bound {
                    continue;
                }

                if child.path.len() < self.depth_limit {
                    sequence += 1;
                    queue.push(SearchNode {
                        depth_key: child.path.len(),
                        path: child.path,
                        state: child.state,
                        score,
                        collision_probability: child.collision_probability,
                        sequence,
                    });
                } else {
                    lower_bound = score;
                    best_action = child.path[0];
                    terminals += 1;
                }
            }

            expanded += 1;
            simple_profiler::record_node_expanded();
        }

        debug!(
            "Round {}: maximin chose {} (bound: {:.4}, terminals: {}, expanded: {}, time: {}ms)",
            round,
            best_action,
            lower_bound,
            terminals,
            expanded,
            start.elapsed().as_millis()
        );
        best_action
    }
}

impl Policy for MaximinSearchPolicy {
    fn act(&mut self, grid: &Grid, you: &Player, opponents: &[Player], round: u32, deadline: Instant) -> Action {
        profile!(Category::Search, { self.search(grid, you, opponents, round, deadline) })
    }

    fn name(&self) -> String {
        format!(
            "MaximinSearchPolicy(heuristic={}, depth_limit={}, occupancy_depth={})",
            self.heuristic.name(),
            self.depth_limit,
            self.occupancy_depth
        )
    }
}

/// Node of the depth search, ordered least likely to collide first
struct DepthNode {
    path: Vec<Action>,
    state: SimulationState,
    collision_probability: f64,
    sequence: u64,
}

impl DepthNode {
    fn queued(child: Child, sequence: u64) -> Self {
        DepthNode {
            path: child.path,
            state: child.state,
            collision_probability: child.collision_probability,
            sequence,
        }
    }
}

impl PartialEq for DepthNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DepthNode {}

impl PartialOrd for DepthNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DepthNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .collision_probability
            .total_cmp(&self.collision_probability)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Occupancy-guided search with one queue per root action
///
/// The queues are served round-robin. Each turn takes the node least likely to
/// collide from one queue, scores it with the heuristic weighted by its depth
/// relative to `depth_limit` and by `1 - collision_probability`, and keeps the
/// best score per root action. With iterative deepening every dequeued node is
/// scored and its children are queued; otherwise the search dives from the
/// dequeued node along the least risky children to a leaf and scores only that
/// leaf. Children are generated in a seeded random action order, and children
/// certain to collide are never queued.
pub struct DepthSearchPolicy {
    heuristic: Box<dyn Heuristic>,
    depth_limit: usize,
    evaluation_limit: usize,
    occupancy_depth: usize,
    death_discount: f64,
    iterative_deepening: bool,
    rng: StdRng,
}

impl DepthSearchPolicy {
    /// # Arguments
    /// * `evaluation_limit` - Heuristic evaluations per decision
    /// * `seed` - Seed for the child order; `None` for a non-reproducible seed
    pub fn new(
        heuristic: Box<dyn Heuristic>,
        depth_limit: usize,
        evaluation_limit: usize,
        occupancy_depth: usize,
        death_discount: f64,
        iterative_deepening: bool,
        seed: Option<u64>,
    ) -> Result<Self, ConfigError> {
        validate_depth(depth_limit)?;
        if evaluation_limit == 0 {
            return Err(ConfigError::InvalidValue {
                name: "evaluation_limit",
                reason: "must be at least 1".to_string(),
            });
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(DepthSearchPolicy {
            heuristic,
            depth_limit,
            evaluation_limit,
            occupancy_depth,
            death_discount,
            iterative_deepening,
            rng,
        })
    }

    /// Children that survive and may avoid every opponent, in shuffled action order
    fn children(
        &mut self,
        path: &[Action],
        state: &SimulationState,
        parent_collision: f64,
        occupancy: Option<&OccupancyMap>,
    ) -> Vec<Child> {
        let mut actions = Action::ALL.to_vec();
        actions.shuffle(&mut self.rng);
        expand(path, state, parent_collision, &actions, occupancy)
            .into_iter()
            .filter(|c| c.collision_probability < 1.0)
            .collect()
    }

    fn evaluate(&self, node: &DepthNode, opponents: &[Player], deadline: Instant) -> f64 {
        let Some(player) = controlled(&node.state) else { return 0.0 };
        let raw = self.heuristic.score(&node.state.grid, player, opponents, node.state.round, deadline);
        let weighted = raw * node.path.len() as f64 / self.depth_limit as f64;
        ((1.0 - node.collision_probability) * weighted).clamp(0.0, 1.0)
    }

    /// Serves one queue and returns the score of the evaluated node
    fn evaluate_one(
        &mut self,
        queue: &mut BinaryHeap<DepthNode>,
        sequence: &mut u64,
        occupancy: Option<&OccupancyMap>,
        opponents: &[Player],
        deadline: Instant,
    ) -> f64 {
        let Some(mut node) = queue.pop() else { return 0.0 };

        if self.iterative_deepening {
            if node.path.len() < self.depth_limit {
                for child in self.children(&node.path, &node.state, node.collision_probability, occupancy) {
                    *sequence += 1;
                    queue.push(DepthNode::queued(child, *sequence));
                }
            }
        } else {
            while node.path.len() < self.depth_limit {
                let mut children = self.children(&node.path, &node.state, node.collision_probability, occupancy);
                let Some(index) = children
                    .iter()
                    .enumerate()
                    .min_by(|a, b| a.1.collision_probability.total_cmp(&b.1.collision_probability))
                    .map(|(i, _)| i)
                else {
                    break;
                };
                let next = children.remove(index);
                for child in children {
                    *sequence += 1;
                    queue.push(DepthNode::queued(child, *sequence));
                }
                *sequence += 1;
                node = DepthNode::queued(next, *sequence);
            }
        }

        self.evaluate(&node, opponents, deadline)
    }

    fn search(&mut self, grid: &Grid, you: &Player, opponents: &[Player], round: u32, deadline: Instant) -> Action {
        let start = Instant::now();
        let root = root_state(grid, you, round);

        let survivors = surviving_actions(&root, &Action::ALL);
        match survivors.as_slice() {
            [] => {
                debug!("Round {}: no surviving action", round);
                return Action::ChangeNothing;
            }
            [only] => {
                debug!("Round {}: {} is the only surviving action", round, only);
                return *only;
            }
            _ => {}
        }
        if Instant::now() >= deadline {
            debug!("Round {}: deadline already passed", round);
            return survivors[0];
        }

        let occupancy = forecast(grid, opponents, round, self.occupancy_depth, self.death_discount);

        let mut sequence = 0u64;
        let mut queues: Vec<(Action, BinaryHeap<DepthNode>)> = Vec::new();
        for child in self.children(&[], &root, 0.0, occupancy.as_ref()) {
            sequence += 1;
            let action = child.path[0];
            let mut queue = BinaryHeap::new();
            queue.push(DepthNode::queued(child, sequence));
            queues.push((action, queue));
        }

        let mut scores: Vec<(Action, f64)> = survivors.iter().map(|&a| (a, 0.0)).collect();
        let mut evaluations = 0usize;

        'search: while !queues.is_empty() {
            for (action, queue) in queues.iter_mut() {
                if evaluations >= self.evaluation_limit || Instant::now() >= deadline {
                    break 'search;
                }
                let score = self.evaluate_one(queue, &mut sequence, occupancy.as_ref(), opponents, deadline);
                evaluations += 1;
                simple_profiler::record_node_expanded();
                if let Some(entry) = scores.iter_mut().find(|entry| entry.0 == *action) {
                    entry.1 = entry.1.max(score);
                }
            }
            queues.retain(|(_, queue)| !queue.is_empty());
        }

        let (action, score) = scores
            .iter()
            .copied()
            .fold(scores[0], |best, entry| if entry.1 > best.1 { entry } else { best });
        debug!(
            "Round {}: depth search chose {} (score: {:.4}, evaluated: {}, time: {}ms)",
            round,
            action,
            score,
            evaluations,
            start.elapsed().as_millis()
        );
        action
    }
}

impl Policy for DepthSearchPolicy {
    fn act(&mut self, grid: &Grid, you: &Player, opponents: &[Player], round: u32, deadline: Instant) -> Action {
        profile!(Category::Search, { self.search(grid, you, opponents, round, deadline) })
    }

    fn name(&self) -> String {
        format!(
            "DepthSearchPolicy(heuristic={}, depth_limit={}, evaluation_limit={}, occupancy_depth={}, iterative_deepening={})",
            self.heuristic.name(),
            self.depth_limit,
            self.evaluation_limit,
            self.occupancy_depth,
            self.iterative_deepening
        )
    }
}
