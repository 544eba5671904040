// Geodesic tessellation ("Voronoi" cells) grown ring by ring from every active head
//
// A free cell whose claimed neighbours (from earlier rings) all carry one label
// is claimed by it; a cell reached by two or more labels in the same ring is
// contested for good and never claimed.

use std::collections::BTreeMap;

use crate::profile;
use crate::regions::Mask;
use crate::types::{Coord, Grid, Player};

/// Per-cell ownership after tessellation
#[derive(Debug, Clone)]
pub struct Tessellation {
    width: usize,
    height: usize,
    /// 0 = unclaimed, contested or blocked
    owners: Vec<u8>,
    contested: Vec<bool>,
    rings: usize,
}

impl Tessellation {
    /// Grows cells over the free cells of `grid` from the heads of the active `players`
    pub fn compute(grid: &Grid, players: &[&Player], max_steps: usize) -> Self {
        let walls = Mask::occupied(grid);
        Self::compute_on(&walls, players, max_steps)
    }

    /// Same as `compute`, with an explicit wall mask (e.g. after morphology)
    pub fn compute_on(walls: &Mask, players: &[&Player], max_steps: usize) -> Self {
        profile!(crate::simple_profiler::Category::Voronoi, {
            let seeds: Vec<(u8, Coord)> = players
                .iter()
                .filter(|p| p.active)
                .map(|p| (p.id, p.position()))
                .collect();
            Self::grow(walls, &seeds, max_steps)
        })
    }

    fn grow(walls: &Mask, seeds: &[(u8, Coord)], max_steps: usize) -> Self {
        let width = walls.width();
        let height = walls.height();
        let mut t = Tessellation {
            width,
            height,
            owners: vec![0; width * height],
            contested: vec![false; width * height],
            rings: 0,
        };

        let mut claimed = Vec::new();
        for &(id, c) in seeds {
            if let Some(i) = t.index_of(c) {
                t.owners[i] = id;
                claimed.push(i);
            }
        }

        let mut queued = vec![false; width * height];
        for _ in 0..max_steps {
            // free, unresolved cells next to cells claimed in the previous ring
            let mut frontier = Vec::new();
            for &i in &claimed {
                for n in t.coord_of(i).neighbours() {
                    if let Some(j) = t.index_of(n) {
                        if !walls.at(n) && t.owners[j] == 0 && !t.contested[j] && !queued[j] {
                            queued[j] = true;
                            frontier.push(j);
                        }
                    }
                }
            }
            if frontier.is_empty() {
                break;
            }

            // decide against the ownership at the start of the ring
            let mut decisions = Vec::with_capacity(frontier.len());
            for &j in &frontier {
                queued[j] = false;
                let mut label = 0u8;
                let mut conflict = false;
                for n in t.coord_of(j).neighbours() {
                    if let Some(k) = t.index_of(n) {
                        let owner = t.owners[k];
                        if owner == 0 {
                            continue;
                        }
                        if label == 0 {
                            label = owner;
                        } else if label != owner {
                            conflict = true;
                        }
                    }
                }
                decisions.push((j, label, conflict));
            }

            claimed.clear();
            for (j, label, conflict) in decisions {
                if conflict {
                    t.contested[j] = true;
                } else if label != 0 {
                    t.owners[j] = label;
                    claimed.push(j);
                }
            }
            t.rings += 1;
            if claimed.is_empty() {
                break;
            }
        }
        t
    }

    fn index_of(&self, c: Coord) -> Option<usize> {
        if c.x < 0 || c.y < 0 || c.x as usize >= self.width || c.y as usize >= self.height {
            None
        } else {
            Some(c.y as usize * self.width + c.x as usize)
        }
    }

    fn coord_of(&self, i: usize) -> Coord {
        Coord::new((i % self.width) as i32, (i / self.width) as i32)
    }

    /// Owner of a cell, 0 if nobody claimed it
    pub fn owner(&self, c: Coord) -> u8 {
        self.index_of(c).map(|i| self.owners[i]).unwrap_or(0)
    }

    pub fn is_contested(&self, c: Coord) -> bool {
        self.index_of(c).map(|i| self.contested[i]).unwrap_or(false)
    }

    /// Number of expansion rings that were evaluated
    pub fn rings(&self) -> usize {
        self.rings
    }

    /// Number of cells owned by `id`, head included
    pub fn cell_count(&self, id: u8) -> usize {
        self.owners.iter().filter(|&&o| o == id).count()
    }

    /// Cell counts for every player that owns at least one cell
    pub fn counts(&self) -> BTreeMap<u8, usize> {
        let mut counts = BTreeMap::new();
        for &o in self.owners.iter().filter(|&&o| o != 0) {
            *counts.entry(o).or_insert(0) += 1;
        }
        counts
    }

    pub fn contested_count(&self) -> usize {
        self.contested.iter().filter(|&&c| c).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    #[test]
    fn test_opposite_corners_split_evenly() {
        let mut grid = Grid::new(5, 5);
        grid.set(Coord::new(4, 4), 1);
        grid.set(Coord::new(0, 0), 2);
        let p1 = Player::new(1, 4, 4, Direction::Up, 1);
        let p2 = Player::new(2, 0, 0, Direction::Down, 1);

        let t = Tessellation::compute(&grid, &[&p1, &p2], 100);
        assert_eq!(t.cell_count(1), 10);
        assert_eq!(t.cell_count(2), 10);
        assert_eq!(t.contested_count(), 5);
        for i in 0..5 {
            let c = Coord::new(i, 4 - i);
            assert!(t.is_contested(c));
            assert_eq!(t.owner(c), 0);
        }
    }

    #[test]
    fn test_single_player_claims_reachable_cells() {
        let mut grid = Grid::new(4, 3);
        grid.set(Coord::new(0, 0), 1);
        grid.set(Coord::new(2, 0), -1);
        grid.set(Coord::new(2, 1), -1);
        grid.set(Coord::new(2, 2), -1);
        let p = Player::new(1, 0, 0, Direction::Right, 1);

        let t = Tessellation::compute(&grid, &[&p], 100);
        assert_eq!(t.cell_count(1), 6);
        assert_eq!(t.owner(Coord::new(3, 1)), 0);
    }

    #[test]
    fn test_max_steps_limits_growth() {
        let mut grid = Grid::new(5, 1);
        grid.set(Coord::new(0, 0), 1);
        let p = Player::new(1, 0, 0, Direction::Right, 1);

        let t = Tessellation::compute(&grid, &[&p], 2);
        assert_eq!(t.cell_count(1), 3);
        assert_eq!(t.rings(), 2);
    }

    #[test]
    fn test_inactive_players_are_not_seeds() {
        let grid = Grid::new(3, 3);
        let mut p = Player::new(1, 1, 1, Direction::Right, 1);
        p.active = false;
        let t = Tessellation::compute(&grid, &[&p], 10);
        assert!(t.counts().is_empty());
    }
}
