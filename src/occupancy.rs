// Occupancy forecast: probability that an opponent occupies a cell within the next rounds
//
// Opponents pick one of the five actions uniformly at random, independently
// per round. Each expanded node ORs the summed probabilities of its children's
// changed cells into the map.

use std::collections::BTreeMap;

use crate::profile;
use crate::simulator::SimulationState;
use crate::types::{Action, Coord, Grid, Player};

/// Per-cell occupancy probabilities in [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyMap {
    width: usize,
    height: usize,
    probabilities: Vec<f64>,
}

impl OccupancyMap {
    /// Map without forecast: 1 on occupied cells, 0 elsewhere
    pub fn from_grid(grid: &Grid) -> Self {
        OccupancyMap {
            width: grid.width(),
            height: grid.height(),
            probabilities: grid
                .cells()
                .iter()
                .map(|&v| if v != 0 { 1.0 } else { 0.0 })
                .collect(),
        }
    }

    /// Forecasts all active `opponents` for `depth` rounds
    ///
    /// # Arguments
    /// * `death_discount` - Factor applied to the probability of branches that eliminate the opponent
    pub fn forecast(
        grid: &Grid,
        opponents: &[Player],
        round: u32,
        depth: usize,
        death_discount: f64,
    ) -> Self {
        profile!(crate::simple_profiler::Category::Occupancy, {
            let mut map = Self::from_grid(grid);
            if depth == 0 {
                return map;
            }
            for opponent in opponents.iter().filter(|o| o.active) {
                map.expand_opponent(grid, opponent, round, depth, death_discount);
            }
            map.clip();
            map
        })
    }

    fn expand_opponent(
        &mut self,
        grid: &Grid,
        opponent: &Player,
        round: u32,
        depth: usize,
        death_discount: f64,
    ) {
        let branch_count = Action::ALL.len() as f64;
        let root = SimulationState::new(grid.clone(), vec![opponent.clone()], round);
        // (state, probability of reaching it, level)
        let mut stack = vec![(root, 1.0f64, 1usize)];

        while let Some((state, probability, level)) = stack.pop() {
            let mut branch_sum: BTreeMap<usize, f64> = BTreeMap::new();

            for action in Action::ALL {
                let child = state.step(&[action]);
                let alive = child.players.first().map(|p| p.active).unwrap_or(false);
                let mut p = probability / branch_count;
                if !alive {
                    p *= death_discount;
                }

                for &c in &child.changed_cells {
                    if let Some(i) = self.index_of(c) {
                        *branch_sum.entry(i).or_insert(0.0) += p;
                    }
                }

                if level < depth && alive {
                    stack.push((child, p, level + 1));
                }
            }

            for (i, p) in branch_sum {
                let q = self.probabilities[i];
                self.probabilities[i] = 1.0 - (1.0 - q) * (1.0 - p);
            }
        }
    }

    fn clip(&mut self) {
        for p in &mut self.probabilities {
            *p = p.clamp(0.0, 1.0);
        }
    }

    fn index_of(&self, c: Coord) -> Option<usize> {
        if c.x < 0 || c.y < 0 || c.x as usize >= self.width || c.y as usize >= self.height {
            None
        } else {
            Some(c.y as usize * self.width + c.x as usize)
        }
    }

    /// Probability for a cell; cells off the board count as certainly occupied
    pub fn get(&self, c: Coord) -> f64 {
        self.index_of(c)
            .map(|i| self.probabilities[i])
            .unwrap_or(1.0)
    }

    /// Probability that none of `cells` is occupied
    pub fn survival_probability(&self, cells: &[Coord]) -> f64 {
        cells.iter().map(|&c| 1.0 - self.get(c)).product()
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.probabilities
            .chunks(self.width.max(1))
            .map(|r| r.to_vec())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    const EPS: f64 = 1e-9;

    fn center_board() -> (Grid, Vec<Player>) {
        let mut grid = Grid::new(5, 5);
        grid.set(Coord::new(2, 2), 1);
        (grid, vec![Player::new(1, 2, 2, Direction::Right, 1)])
    }

    #[test]
    fn test_depth_zero_is_plain_occupancy() {
        let (grid, opponents) = center_board();
        let map = OccupancyMap::forecast(&grid, &opponents, 1, 0, 1.0);
        assert_eq!(map, OccupancyMap::from_grid(&grid));
    }

    #[test]
    fn test_depth_one_center_opponent() {
        let (grid, opponents) = center_board();
        let map = OccupancyMap::forecast(&grid, &opponents, 1, 1, 1.0);

        assert!((map.get(Coord::new(2, 2)) - 1.0).abs() < EPS);
        assert!((map.get(Coord::new(3, 2)) - 0.4).abs() < EPS);
        assert!((map.get(Coord::new(4, 2)) - 0.2).abs() < EPS);
        assert!((map.get(Coord::new(2, 1)) - 0.2).abs() < EPS);
        assert!((map.get(Coord::new(2, 3)) - 0.2).abs() < EPS);
        assert!(map.get(Coord::new(1, 2)).abs() < EPS);
        assert!(map.get(Coord::new(0, 0)).abs() < EPS);
    }

    #[test]
    fn test_inactive_opponents_are_ignored() {
        let (grid, mut opponents) = center_board();
        opponents[0].active = false;
        let map = OccupancyMap::forecast(&grid, &opponents, 1, 2, 1.0);
        assert_eq!(map, OccupancyMap::from_grid(&grid));
    }

    #[test]
    fn test_death_discount_scales_fatal_branches() {
        let mut grid = Grid::new(2, 1);
        grid.set(Coord::new(0, 0), 1);
        let opponents = vec![Player::new(1, 0, 0, Direction::Right, 1)];

        // speed_up writes (1,0) and then leaves the board at (2,0)
        let full = OccupancyMap::forecast(&grid, &opponents, 1, 1, 1.0);
        let none = OccupancyMap::forecast(&grid, &opponents, 1, 1, 0.0);
        assert!((full.get(Coord::new(1, 0)) - 0.4).abs() < EPS);
        assert!((none.get(Coord::new(1, 0)) - 0.2).abs() < EPS);
    }

    #[test]
    fn test_survival_probability_multiplies() {
        let (grid, opponents) = center_board();
        let map = OccupancyMap::forecast(&grid, &opponents, 1, 1, 1.0);
        let p = map.survival_probability(&[Coord::new(3, 2), Coord::new(2, 1)]);
        assert!((p - 0.6 * 0.8).abs() < EPS);
        assert_eq!(map.survival_probability(&[Coord::new(-1, 0)]), 0.0);
    }
}
