// Connected-region labeling with binary morphology pre-smoothing
//
// Occupied cells are walls. Morphology runs on the occupancy mask padded with
// free cells, using the 4-connected cross as structuring element and treating
// everything outside the padded mask as free.

use std::collections::VecDeque;

use crate::profile;
use crate::types::{Coord, Grid, Player};

/// Boolean image with the board's dimensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl Mask {
    pub fn new(width: usize, height: usize) -> Self {
        Mask {
            width,
            height,
            cells: vec![false; width * height],
        }
    }

    /// True for every non-free cell of the board
    pub fn occupied(grid: &Grid) -> Self {
        Mask {
            width: grid.width(),
            height: grid.height(),
            cells: grid.cells().iter().map(|&v| v != 0).collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Value at (x, y); false outside the mask
    pub fn get(&self, x: i32, y: i32) -> bool {
        self.get_or(x, y, false)
    }

    fn get_or(&self, x: i32, y: i32, outside: bool) -> bool {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return outside;
        }
        self.cells[y as usize * self.width + x as usize]
    }

    pub fn at(&self, c: Coord) -> bool {
        self.get(c.x, c.y)
    }

    pub fn set(&mut self, c: Coord, value: bool) {
        if c.x >= 0 && c.y >= 0 && (c.x as usize) < self.width && (c.y as usize) < self.height {
            self.cells[c.y as usize * self.width + c.x as usize] = value;
        }
    }

    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&v| v).count()
    }

    fn cross(&self, x: i32, y: i32) -> [bool; 4] {
        [
            self.get(x + 1, y),
            self.get(x, y + 1),
            self.get(x - 1, y),
            self.get(x, y - 1),
        ]
    }

    fn map<F: Fn(i32, i32) -> bool>(&self, f: F) -> Mask {
        let mut cells = Vec::with_capacity(self.cells.len());
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                cells.push(f(x, y));
            }
        }
        Mask {
            width: self.width,
            height: self.height,
            cells,
        }
    }

    pub fn dilate(&self) -> Mask {
        self.map(|x, y| self.get(x, y) || self.cross(x, y).iter().any(|&v| v))
    }

    pub fn erode(&self) -> Mask {
        self.map(|x, y| self.get(x, y) && self.cross(x, y).iter().all(|&v| v))
    }

    /// Closing that also seals gaps between diagonally offset wall ends
    ///
    /// Dilates the mask padded by one free cell with the 3x3 square, counting
    /// cells outside as occupied, then erodes with the cross counting them as
    /// free.
    pub fn close_diagonal_gaps(&self) -> Mask {
        let padded = self.pad(1);
        let dilated = padded.map(|x, y| {
            (-1..=1).any(|dy| (-1..=1).any(|dx| padded.get_or(x + dx, y + dy, true)))
        });
        dilated.erode().crop(1)
    }

    /// Copy surrounded by `n` rings of free cells
    pub fn pad(&self, n: usize) -> Mask {
        let mut padded = Mask::new(self.width + 2 * n, self.height + 2 * n);
        for y in 0..self.height {
            for x in 0..self.width {
                padded.cells[(y + n) * padded.width + x + n] = self.cells[y * self.width + x];
            }
        }
        padded
    }

    fn crop(&self, n: usize) -> Mask {
        let width = self.width.saturating_sub(2 * n);
        let height = self.height.saturating_sub(2 * n);
        let mut cropped = Mask::new(width, height);
        for y in 0..height {
            for x in 0..width {
                cropped.cells[y * width + x] = self.cells[(y + n) * self.width + x + n];
            }
        }
        cropped
    }
}

/// Morphological pre-processing, applied as closing, opening, erosion, dilation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Morphology {
    pub closing: usize,
    pub opening: usize,
    pub erosion: usize,
    pub dilation: usize,
}

impl Morphology {
    pub fn none() -> Self {
        Morphology::default()
    }

    pub fn closing(iterations: usize) -> Self {
        Morphology {
            closing: iterations,
            ..Morphology::default()
        }
    }

    pub fn opening(iterations: usize) -> Self {
        Morphology {
            opening: iterations,
            ..Morphology::default()
        }
    }

    pub fn is_identity(&self) -> bool {
        self.padding() == 0
    }

    fn padding(&self) -> usize {
        self.closing
            .max(self.opening)
            .max(self.erosion)
            .max(self.dilation)
    }

    /// Applies the configured operations to a wall mask
    pub fn apply(&self, mask: &Mask) -> Mask {
        let n = self.padding();
        if n == 0 {
            return mask.clone();
        }

        let mut m = mask.pad(n);
        if self.closing > 0 {
            m = repeat(&m, self.closing, Mask::dilate);
            m = repeat(&m, self.closing, Mask::erode);
        }
        if self.opening > 0 {
            m = repeat(&m, self.opening, Mask::erode);
            m = repeat(&m, self.opening, Mask::dilate);
        }
        if self.erosion > 0 {
            m = repeat(&m, self.erosion, Mask::erode);
        }
        if self.dilation > 0 {
            m = repeat(&m, self.dilation, Mask::dilate);
        }
        m.crop(n)
    }
}

fn repeat(mask: &Mask, times: usize, op: fn(&Mask) -> Mask) -> Mask {
    let mut m = mask.clone();
    for _ in 0..times {
        m = op(&m);
    }
    m
}

/// Result of labeling the free cells of a board
#[derive(Debug, Clone)]
pub struct RegionMap {
    width: usize,
    height: usize,
    /// 0 marks walls, regions are numbered from 1
    labels: Vec<u32>,
    sizes: Vec<usize>,
    player_labels: Vec<(u8, u32)>,
}

impl RegionMap {
    /// Labels 4-connected free regions of `grid`
    ///
    /// Walls are the occupied cells after `morphology`; the heads of all active
    /// `players` are cleared afterwards so every active player sits in a region.
    pub fn label(grid: &Grid, players: &[&Player], morphology: &Morphology) -> Self {
        profile!(crate::simple_profiler::Category::Regions, {
            let mut walls = morphology.apply(&Mask::occupied(grid));
            for p in players.iter().filter(|p| p.active) {
                walls.set(p.position(), false);
            }
            let mut map = Self::label_free(&walls);
            map.player_labels = players
                .iter()
                .filter(|p| p.active)
                .filter_map(|p| map.label_at(p.position()).map(|l| (p.id, l)))
                .collect();
            map
        })
    }

    /// Labels the false cells of a wall mask
    pub fn label_free(walls: &Mask) -> Self {
        let width = walls.width();
        let height = walls.height();
        let mut labels = vec![0u32; width * height];
        let mut sizes = Vec::new();
        let mut queue = VecDeque::new();

        for start in 0..labels.len() {
            if walls.cells[start] || labels[start] != 0 {
                continue;
            }
            let label = sizes.len() as u32 + 1;
            let mut size = 0;
            labels[start] = label;
            queue.push_back(start);

            while let Some(i) = queue.pop_front() {
                size += 1;
                let c = Coord::new((i % width) as i32, (i / width) as i32);
                for n in c.neighbours() {
                    if n.x < 0 || n.y < 0 || n.x as usize >= width || n.y as usize >= height {
                        continue;
                    }
                    let j = n.y as usize * width + n.x as usize;
                    if !walls.cells[j] && labels[j] == 0 {
                        labels[j] = label;
                        queue.push_back(j);
                    }
                }
            }
            sizes.push(size);
        }

        RegionMap {
            width,
            height,
            labels,
            sizes,
            player_labels: Vec::new(),
        }
    }

    /// Region label of a cell, `None` for walls and cells outside the board
    pub fn label_at(&self, c: Coord) -> Option<u32> {
        if c.x < 0 || c.y < 0 || c.x as usize >= self.width || c.y as usize >= self.height {
            return None;
        }
        match self.labels[c.y as usize * self.width + c.x as usize] {
            0 => None,
            l => Some(l),
        }
    }

    pub fn region_count(&self) -> usize {
        self.sizes.len()
    }

    pub fn region_size(&self, label: u32) -> usize {
        label
            .checked_sub(1)
            .and_then(|i| self.sizes.get(i as usize))
            .copied()
            .unwrap_or(0)
    }

    pub fn largest_region_size(&self) -> usize {
        self.sizes.iter().copied().max().unwrap_or(0)
    }

    /// Labels of the active players passed to `label`
    pub fn player_labels(&self) -> &[(u8, u32)] {
        &self.player_labels
    }

    pub fn player_label(&self, id: u8) -> Option<u32> {
        self.player_labels
            .iter()
            .find(|(pid, _)| *pid == id)
            .map(|(_, l)| *l)
    }

    /// Size of the region the player is in, 0 if unknown
    pub fn player_region_size(&self, id: u8) -> usize {
        self.player_label(id)
            .map(|l| self.region_size(l))
            .unwrap_or(0)
    }

    /// Number of other labeled players sharing the player's region
    pub fn players_sharing_region(&self, id: u8) -> usize {
        match self.player_label(id) {
            Some(label) => self
                .player_labels
                .iter()
                .filter(|(pid, l)| *pid != id && *l == label)
                .count(),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    fn mask_from(rows: &[&str]) -> Mask {
        let mut m = Mask::new(rows[0].len(), rows.len());
        for (y, r) in rows.iter().enumerate() {
            for (x, ch) in r.chars().enumerate() {
                m.set(Coord::new(x as i32, y as i32), ch == '#');
            }
        }
        m
    }

    #[test]
    fn test_closing_blocks_one_cell_tunnel() {
        let walls = mask_from(&[".......", "###.###", "###.###", "###.###", "......."]);
        let closed = Morphology::closing(1).apply(&walls);
        assert_eq!(
            closed,
            mask_from(&[".......", "###.###", "#######", "###.###", "......."])
        );
    }

    #[test]
    fn test_opening_removes_isolated_cell() {
        let walls = mask_from(&[".....", ".....", "..#..", ".....", "....."]);
        let opened = Morphology::opening(1).apply(&walls);
        assert_eq!(opened.count(), 0);
    }

    #[test]
    fn test_erosion_and_dilation_are_dual_on_block() {
        let walls = mask_from(&[".....", ".###.", ".###.", ".###.", "....."]);
        let eroded = Morphology {
            erosion: 1,
            ..Morphology::default()
        }
        .apply(&walls);
        assert_eq!(eroded.count(), 1);
        assert!(eroded.get(2, 2));

        let dilated = Morphology {
            dilation: 1,
            ..Morphology::default()
        }
        .apply(&eroded);
        assert_eq!(dilated.count(), 5);
    }

    #[test]
    fn test_diagonal_gap_is_sealed() {
        let walls = mask_from(&[".....", ".....", "##...", "...##", ".....", "....."]);
        assert_eq!(RegionMap::label_free(&Morphology::closing(1).apply(&walls)).region_count(), 1);

        let sealed = walls.close_diagonal_gaps();
        assert_eq!(
            sealed,
            mask_from(&[".....", ".....", "###..", "..###", ".....", "....."])
        );
        assert_eq!(RegionMap::label_free(&sealed).region_count(), 2);
    }

    #[test]
    fn test_label_free_counts_components() {
        let walls = mask_from(&["..#..", "..#..", "#####", "..#..", "..#.."]);
        let map = RegionMap::label_free(&walls);
        assert_eq!(map.region_count(), 4);
        assert_eq!(map.largest_region_size(), 4);
        assert_eq!(map.label_at(Coord::new(2, 2)), None);
        assert_eq!(map.label_at(Coord::new(-1, 0)), None);
    }

    #[test]
    fn test_heads_are_cleared_after_morphology() {
        let rows = [".......", "###.###", "###.###", "###.###", "......."];
        let mut grid = Grid::new(7, 5);
        for (y, r) in rows.iter().enumerate() {
            for (x, ch) in r.chars().enumerate() {
                if ch == '#' {
                    grid.set(Coord::new(x as i32, y as i32), -1);
                }
            }
        }
        grid.set(Coord::new(0, 0), 1);
        let player = Player::new(1, 0, 0, Direction::Right, 1);

        let open = RegionMap::label(&grid, &[&player], &Morphology::none());
        assert_eq!(open.player_region_size(1), 17);

        let closed = RegionMap::label(&grid, &[&player], &Morphology::closing(1));
        assert_eq!(closed.player_region_size(1), 8);
        assert_eq!(closed.region_count(), 2);
    }
}
