// spe_ed game primitives
// Board cells: 0 = free, -1 = collision, k > 0 = trail of player k

use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;
use std::fmt;

/// Smallest legal speed; slowing down below it eliminates the player
pub const MIN_SPEED: u8 = 1;
/// Largest legal speed; speeding up beyond it eliminates the player
pub const MAX_SPEED: u8 = 10;
/// Every `JUMP_INTERVAL`-th round only the first and last sub-step of a move are tested for occupancy
pub const JUMP_INTERVAL: u32 = 6;
/// Cell value left behind by a collision
pub const COLLISION_CELL: i8 = -1;

/// 2D coordinate on the board (x grows right, y grows down)
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub fn new(x: i32, y: i32) -> Self {
        Coord { x, y }
    }

    /// Manhattan distance between two coordinates
    pub fn manhattan(&self, other: &Coord) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// The four orthogonal neighbours, in right/down/left/up order
    pub fn neighbours(&self) -> [Coord; 4] {
        Direction::all().map(|d| d.apply(self))
    }
}

/// Heading of a player; the discriminant is the direction index
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Right = 0,
    Down = 1,
    Left = 2,
    Up = 3,
}

impl Direction {
    /// Returns all directions ordered by index
    pub fn all() -> [Direction; 4] {
        [Direction::Right, Direction::Down, Direction::Left, Direction::Up]
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Direction {
        Self::all()[index % 4]
    }

    /// Angle in radians, measured clockwise on screen (y grows down)
    pub fn angle(&self) -> f64 {
        self.index() as f64 * FRAC_PI_2
    }

    /// Unit vector of this heading
    pub fn cartesian(&self) -> Coord {
        match self {
            Direction::Right => Coord { x: 1, y: 0 },
            Direction::Down => Coord { x: 0, y: 1 },
            Direction::Left => Coord { x: -1, y: 0 },
            Direction::Up => Coord { x: 0, y: -1 },
        }
    }

    /// Visual left turn on screen: right -> up -> left -> down
    pub fn turn_left(&self) -> Direction {
        Self::from_index(self.index() + 3)
    }

    /// Visual right turn on screen: right -> down -> left -> up
    pub fn turn_right(&self) -> Direction {
        Self::from_index(self.index() + 1)
    }

    /// Converts direction to its wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Right => "right",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Up => "up",
        }
    }

    /// Calculates the next coordinate when moving in this direction
    pub fn apply(&self, coord: &Coord) -> Coord {
        let step = self.cartesian();
        Coord {
            x: coord.x + step.x,
            y: coord.y + step.y,
        }
    }
}

/// One of the five per-round commands a player can send
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ChangeNothing,
    TurnLeft,
    TurnRight,
    SpeedUp,
    SlowDown,
}

impl Action {
    /// Canonical action order used by search and forecasting
    pub const ALL: [Action; 5] = [
        Action::ChangeNothing,
        Action::TurnLeft,
        Action::TurnRight,
        Action::SpeedUp,
        Action::SlowDown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ChangeNothing => "change_nothing",
            Action::TurnLeft => "turn_left",
            Action::TurnRight => "turn_right",
            Action::SpeedUp => "speed_up",
            Action::SlowDown => "slow_down",
        }
    }

    /// Parses the wire representation (case insensitive)
    pub fn parse(s: &str) -> Result<Action, String> {
        match s.trim().to_lowercase().as_str() {
            "change_nothing" => Ok(Action::ChangeNothing),
            "turn_left" => Ok(Action::TurnLeft),
            "turn_right" => Ok(Action::TurnRight),
            "speed_up" => Ok(Action::SpeedUp),
            "slow_down" => Ok(Action::SlowDown),
            _ => Err(format!("Invalid action: {}", s)),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Player state with all information the game server reports
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Player {
    pub id: u8,
    pub x: i32,
    pub y: i32,
    pub direction: Direction,
    pub speed: u8,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Player {
    pub fn new(id: u8, x: i32, y: i32, direction: Direction, speed: u8) -> Self {
        Player {
            id,
            x,
            y,
            direction,
            speed,
            active: true,
            name: None,
        }
    }

    pub fn position(&self) -> Coord {
        Coord { x: self.x, y: self.y }
    }

    /// Compares all game-relevant fields, ignoring the display name
    pub fn same_state(&self, other: &Player) -> bool {
        self.id == other.id
            && self.x == other.x
            && self.y == other.y
            && self.direction == other.direction
            && self.speed == other.speed
            && self.active == other.active
    }
}

/// Fixed-size row-major board
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<i8>,
}

impl Grid {
    /// Creates an empty board
    pub fn new(width: usize, height: usize) -> Self {
        Grid {
            width,
            height,
            cells: vec![0; width * height],
        }
    }

    /// Builds a board from `rows[y][x]`; all rows must have equal length
    pub fn from_rows(rows: &[Vec<i8>]) -> Result<Self, String> {
        let height = rows.len();
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        if let Some(y) = rows.iter().position(|r| r.len() != width) {
            return Err(format!(
                "Row {} has length {}, expected {}",
                y,
                rows[y].len(),
                width
            ));
        }
        Ok(Grid {
            width,
            height,
            cells: rows.concat(),
        })
    }

    pub fn to_rows(&self) -> Vec<Vec<i8>> {
        if self.width == 0 {
            return vec![Vec::new(); self.height];
        }
        self.cells.chunks(self.width).map(|r| r.to_vec()).collect()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of cells on the board
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    pub fn in_bounds(&self, c: Coord) -> bool {
        c.x >= 0 && c.y >= 0 && (c.x as usize) < self.width && (c.y as usize) < self.height
    }

    /// Row-major index of an in-bounds coordinate
    pub fn index_of(&self, c: Coord) -> Option<usize> {
        if self.in_bounds(c) {
            Some(c.y as usize * self.width + c.x as usize)
        } else {
            None
        }
    }

    pub fn coord_of(&self, index: usize) -> Coord {
        Coord {
            x: (index % self.width) as i32,
            y: (index / self.width) as i32,
        }
    }

    /// Cell value, `None` outside the board
    pub fn get(&self, c: Coord) -> Option<i8> {
        self.index_of(c).map(|i| self.cells[i])
    }

    /// True for in-bounds cells holding 0
    pub fn is_free(&self, c: Coord) -> bool {
        self.get(c) == Some(0)
    }

    /// Writes an in-bounds cell; out-of-bounds writes are ignored
    pub fn set(&mut self, c: Coord, value: i8) {
        if let Some(i) = self.index_of(c) {
            self.cells[i] = value;
        }
    }

    pub fn cells(&self) -> &[i8] {
        &self.cells
    }

    /// Number of non-free cells
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|&&v| v != 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turns_are_inverse_bijections() {
        for d in Direction::all() {
            assert_eq!(d.turn_left().turn_right(), d);
            assert_eq!(d.turn_right().turn_left(), d);
            assert_eq!(d.turn_left().turn_left(), d.turn_right().turn_right());
        }
        assert_eq!(Direction::Right.turn_left(), Direction::Up);
        assert_eq!(Direction::Right.turn_right(), Direction::Down);
    }

    #[test]
    fn test_cartesian_matches_angle() {
        for d in Direction::all() {
            let v = d.cartesian();
            assert!((d.angle().cos() - v.x as f64).abs() < 1e-9);
            assert!((d.angle().sin() - v.y as f64).abs() < 1e-9);
        }
    }

    #[test]
    fn test_action_parse() {
        assert_eq!(Action::parse("turn_left").unwrap(), Action::TurnLeft);
        assert_eq!(Action::parse("SPEED_UP").unwrap(), Action::SpeedUp);
        assert!(Action::parse("jump").is_err());
        for a in Action::ALL {
            assert_eq!(Action::parse(a.as_str()).unwrap(), a);
        }
    }

    #[test]
    fn test_grid_rows_and_bounds() {
        let grid = Grid::from_rows(&[vec![0, 1, 0], vec![-1, 0, 2]]).unwrap();
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.get(Coord::new(1, 0)), Some(1));
        assert_eq!(grid.get(Coord::new(0, 1)), Some(-1));
        assert_eq!(grid.get(Coord::new(3, 0)), None);
        assert_eq!(grid.get(Coord::new(0, -1)), None);
        assert!(grid.is_free(Coord::new(1, 1)));
        assert!(!grid.is_free(Coord::new(-1, 1)));
        assert_eq!(grid.occupied_count(), 3);
        assert_eq!(grid.to_rows(), vec![vec![0, 1, 0], vec![-1, 0, 2]]);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        assert!(Grid::from_rows(&[vec![0, 0], vec![0]]).is_err());
    }

    #[test]
    fn test_player_serde_wire_format() {
        let json = r#"{"x":3,"y":2,"direction":"up","speed":1,"active":true,"id":1}"#;
        let p: Player = serde_json::from_str(json).unwrap();
        assert_eq!(p.direction, Direction::Up);
        assert_eq!(p.name, None);
    }
}
