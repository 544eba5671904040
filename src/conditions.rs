// Game-phase conditions: scalar measurements of a board used to switch policies
//
// Unlike heuristics, condition scores are not normalized. Boolean conditions
// score 1.0 or 0.0; distances and round numbers are returned as they are.

use std::time::Instant;

use crate::error::ConfigError;
use crate::heuristics::Heuristic;
use crate::regions::{Morphology, RegionMap};
use crate::types::{Grid, Player};

/// Measures one property of a board from the controlled player's point of view
pub trait Condition: Send + Sync {
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

fn label(grid: &Grid, player: &Player, opponents: &[Player], morphology: &Morphology) -> RegionMap {
    let players: Vec<&Player> = std::iter::once(player).chain(opponents.iter()).collect();
    RegionMap::label(grid, &players, morphology)
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Share of the board taken by the player's region
pub struct RegionSizeCondition {
    closing_iterations: usize,
}

impl RegionSizeCondition {
    pub fn new(closing_iterations: usize) -> Self {
        RegionSizeCondition { closing_iterations }
    }
}

impl Condition for RegionSizeCondition {
    fn score(&self, grid: &Grid, player: &Player, opponents: &[Player], _: u32, _: Instant) -> f64 {
        let regions = label(grid, player, opponents, &Morphology::closing(self.closing_iterations));
        regions.player_region_size(player.id) as f64 / grid.area() as f64
    }

    fn name(&self) -> String {
        format!("RegionSizeCondition(closing_iterations={})", self.closing_iterations)
    }
}

/// Manhattan distance to the nearest opponent in the player's region
///
/// Infinite when the player is alone in its region, 0 for an inactive player.
pub struct NearestOpponentDistanceCondition {
    opening_iterations: usize,
}

impl NearestOpponentDistanceCondition {
    pub fn new(opening_iterations: usize) -> Self {
        NearestOpponentDistanceCondition { opening_iterations }
    }
}

impl Condition for NearestOpponentDistanceCondition {
    fn score(&self, grid: &Grid, player: &Player, opponents: &[Player], _: u32, _: Instant) -> f64 {
        if !player.active {
            return 0.0;
        }
        let regions = label(grid, player, opponents, &Morphology::opening(self.opening_iterations));
        let Some(own) = regions.player_label(player.id) else {
            return f64::INFINITY;
        };
        opponents
            .iter()
            .filter(|o| o.active && regions.player_label(o.id) == Some(own))
            .map(|o| player.position().manhattan(&o.position()))
            .min()
            .map_or(f64::INFINITY, f64::from)
    }

    fn name(&self) -> String {
        format!(
            "NearestOpponentDistanceCondition(opening_iterations={})",
            self.opening_iterations
        )
    }
}

/// Number of active opponents sharing the player's region
pub struct OpponentsInPlayerRegionCondition {
    closing_iterations: usize,
}

impl OpponentsInPlayerRegionCondition {
    pub fn new(closing_iterations: usize) -> Self {
        OpponentsInPlayerRegionCondition { closing_iterations }
    }
}

impl Condition for OpponentsInPlayerRegionCondition {
    fn score(&self, grid: &Grid, player: &Player, opponents: &[Player], _: u32, _: Instant) -> f64 {
        let regions = label(grid, player, opponents, &Morphology::closing(self.closing_iterations));
        regions.players_sharing_region(player.id) as f64
    }

    fn name(&self) -> String {
        format!(
            "OpponentsInPlayerRegionCondition(closing_iterations={})",
            self.closing_iterations
        )
    }
}

/// 1 when no active opponent sits in a larger region than the player
pub struct PlayerInBiggestRegionCondition {
    opening_iterations: usize,
}

impl PlayerInBiggestRegionCondition {
    pub fn new(opening_iterations: usize) -> Self {
        PlayerInBiggestRegionCondition { opening_iterations }
    }
}

impl Condition for PlayerInBiggestRegionCondition {
    fn score(&self, grid: &Grid, player: &Player, opponents: &[Player], _: u32, _: Instant) -> f64 {
        if !player.active {
            return 0.0;
        }
        let regions = label(grid, player, opponents, &Morphology::opening(self.opening_iterations));
        let own = regions.player_region_size(player.id);
        let biggest = regions
            .player_labels()
            .iter()
            .map(|&(_, l)| regions.region_size(l))
            .max()
            .unwrap_or(0);
        flag(own == biggest)
    }

    fn name(&self) -> String {
        format!(
            "PlayerInBiggestRegionCondition(opening_iterations={})",
            self.opening_iterations
        )
    }
}

/// Fraction of non-free cells on the board
pub struct OccupiedCellsCondition;

impl Condition for OccupiedCellsCondition {
    fn score(&self, grid: &Grid, _: &Player, _: &[Player], _: u32, _: Instant) -> f64 {
        grid.occupied_count() as f64 / grid.area() as f64
    }

    fn name(&self) -> String {
        "OccupiedCellsCondition()".to_string()
    }
}

/// The current round number
pub struct RoundsCondition;

impl Condition for RoundsCondition {
    fn score(&self, _: &Grid, _: &Player, _: &[Player], round: u32, _: Instant) -> f64 {
        f64::from(round)
    }

    fn name(&self) -> String {
        "RoundsCondition()".to_string()
    }
}

/// Uses a heuristic score as a condition
pub struct HeuristicCondition {
    heuristic: Box<dyn Heuristic>,
}

impl HeuristicCondition {
    pub fn new(heuristic: Box<dyn Heuristic>) -> Self {
        HeuristicCondition { heuristic }
    }
}

impl Condition for HeuristicCondition {
    fn score(&self, grid: &Grid, player: &Player, opponents: &[Player], round: u32, deadline: Instant) -> f64 {
        self.heuristic.score(grid, player, opponents, round, deadline)
    }

    fn name(&self) -> String {
        self.heuristic.name()
    }
}

/// How a condition score is compared with its threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    GreaterEqual,
    Greater,
    Equal,
    LessEqual,
    Less,
}

impl Comparison {
    pub fn holds(&self, score: f64, threshold: f64) -> bool {
        match self {
            Comparison::GreaterEqual => score >= threshold,
            Comparison::Greater => score > threshold,
            Comparison::Equal => score == threshold,
            Comparison::LessEqual => score <= threshold,
            Comparison::Less => score < threshold,
        }
    }
}

/// How the individual comparisons are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logic {
    And,
    Or,
}

/// Compares every condition with its threshold and combines the results
///
/// Scores 1.0 when the combination holds, else 0.0.
pub struct CompositeCondition {
    conditions: Vec<Box<dyn Condition>>,
    thresholds: Vec<f64>,
    comparisons: Vec<Comparison>,
    logic: Logic,
}

impl CompositeCondition {
    /// # Arguments
    /// * `thresholds` - One per condition; `None` compares every score with 1.0
    /// * `comparisons` - A single comparison for all conditions, or one per condition
    pub fn new(
        conditions: Vec<Box<dyn Condition>>,
        thresholds: Option<Vec<f64>>,
        comparisons: Vec<Comparison>,
        logic: Logic,
    ) -> Result<Self, ConfigError> {
        if conditions.is_empty() {
            return Err(ConfigError::NoConditions);
        }
        let thresholds = thresholds.unwrap_or_else(|| vec![1.0; conditions.len()]);
        if thresholds.len() != conditions.len() {
            return Err(ConfigError::ThresholdCountMismatch {
                conditions: conditions.len(),
                thresholds: thresholds.len(),
            });
        }
        let comparisons = match comparisons.as_slice() {
            [single] => vec![*single; conditions.len()],
            list if list.len() == conditions.len() => comparisons,
            list => {
                return Err(ConfigError::ComparisonCountMismatch {
                    conditions: conditions.len(),
                    comparisons: list.len(),
                })
            }
        };
        Ok(CompositeCondition {
            conditions,
            thresholds,
            comparisons,
            logic,
        })
    }

    /// In the biggest region with no opponent sharing it
    pub fn endgame() -> Self {
        CompositeCondition {
            conditions: vec![
                Box::new(PlayerInBiggestRegionCondition::new(0)),
                Box::new(OpponentsInPlayerRegionCondition::new(0)),
            ],
            thresholds: vec![1.0, 0.0],
            comparisons: vec![Comparison::Equal; 2],
            logic: Logic::And,
        }
    }

    /// In the biggest region after smoothing, with a quarter of the board filled
    pub fn midgame() -> Self {
        CompositeCondition {
            conditions: vec![
                Box::new(PlayerInBiggestRegionCondition::new(1)),
                Box::new(OccupiedCellsCondition),
            ],
            thresholds: vec![1.0, 0.25],
            comparisons: vec![Comparison::GreaterEqual; 2],
            logic: Logic::And,
        }
    }

    /// In the biggest region, at least 10 cells from any reachable opponent, a fifth of the board filled
    pub fn lategame() -> Self {
        CompositeCondition {
            conditions: vec![
                Box::new(PlayerInBiggestRegionCondition::new(0)),
                Box::new(NearestOpponentDistanceCondition::new(1)),
                Box::new(OccupiedCellsCondition),
            ],
            thresholds: vec![1.0, 10.0, 0.2],
            comparisons: vec![Comparison::GreaterEqual; 3],
            logic: Logic::And,
        }
    }

    pub fn holds(&self, grid: &Grid, player: &Player, opponents: &[Player], round: u32, deadline: Instant) -> bool {
        let mut results = self
            .conditions
            .iter()
            .zip(self.thresholds.iter().zip(&self.comparisons))
            .map(|(c, (&t, cmp))| cmp.holds(c.score(grid, player, opponents, round, deadline), t));
        match self.logic {
            Logic::And => results.all(|r| r),
            Logic::Or => results.any(|r| r),
        }
    }
}

impl Condition for CompositeCondition {
    fn score(&self, grid: &Grid, player: &Player, opponents: &[Player], round: u32, deadline: Instant) -> f64 {
        flag(self.holds(grid, player, opponents, round, deadline))
    }

    fn name(&self) -> String {
        let parts: Vec<String> = self
            .conditions
            .iter()
            .zip(self.thresholds.iter().zip(&self.comparisons))
            .map(|(c, (t, cmp))| format!("{} {:?} {}", c.name(), cmp, t))
            .collect();
        format!("CompositeCondition({:?}: [{}])", self.logic, parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::ConstantHeuristic;
    use crate::types::{Coord, Direction};
    use std::time::Duration;

    fn later() -> Instant {
        Instant::now() + Duration::from_secs(10)
    }

    #[test]
    fn test_comparisons() {
        assert!(Comparison::GreaterEqual.holds(1.0, 1.0));
        assert!(!Comparison::Greater.holds(1.0, 1.0));
        assert!(Comparison::Equal.holds(0.0, 0.0));
        assert!(Comparison::LessEqual.holds(0.5, 1.0));
        assert!(!Comparison::Less.holds(2.0, 1.0));
    }

    #[test]
    fn test_composite_validation() {
        let rounds = || -> Box<dyn Condition> { Box::new(RoundsCondition) };
        assert!(matches!(
            CompositeCondition::new(vec![], None, vec![Comparison::Equal], Logic::And),
            Err(ConfigError::NoConditions)
        ));
        assert!(matches!(
            CompositeCondition::new(vec![rounds()], Some(vec![1.0, 2.0]), vec![Comparison::Equal], Logic::And),
            Err(ConfigError::ThresholdCountMismatch { .. })
        ));
        assert_eq!(
            CompositeCondition::new(
                vec![rounds(), rounds(), rounds()],
                None,
                vec![Comparison::Equal, Comparison::Less],
                Logic::Or
            )
            .err(),
            Some(ConfigError::ComparisonCountMismatch {
                conditions: 3,
                comparisons: 2
            })
        );
    }

    #[test]
    fn test_composite_logic() {
        let grid = Grid::new(4, 4);
        let p = Player::new(1, 0, 0, Direction::Right, 1);
        let make = |logic| {
            CompositeCondition::new(
                vec![Box::new(RoundsCondition), Box::new(OccupiedCellsCondition)],
                Some(vec![10.0, 0.5]),
                vec![Comparison::GreaterEqual],
                logic,
            )
            .unwrap()
        };
        // round 12 passes, an empty board does not
        assert_eq!(make(Logic::And).score(&grid, &p, &[], 12, later()), 0.0);
        assert_eq!(make(Logic::Or).score(&grid, &p, &[], 12, later()), 1.0);
        assert_eq!(make(Logic::Or).score(&grid, &p, &[], 3, later()), 0.0);
    }

    #[test]
    fn test_heuristic_condition_forwards_score() {
        let grid = Grid::new(2, 2);
        let p = Player::new(1, 0, 0, Direction::Right, 1);
        let c = HeuristicCondition::new(Box::new(ConstantHeuristic::new(0.75).unwrap()));
        assert_eq!(c.score(&grid, &p, &[], 1, later()), 0.75);
    }

    #[test]
    fn test_occupied_cells_fraction() {
        let mut grid = Grid::new(4, 2);
        grid.set(Coord::new(0, 0), 1);
        grid.set(Coord::new(1, 0), -1);
        let p = Player::new(1, 0, 0, Direction::Right, 1);
        assert_eq!(OccupiedCellsCondition.score(&grid, &p, &[], 1, later()), 0.25);
    }
}
