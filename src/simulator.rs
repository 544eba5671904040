// Exact spe_ed transition rules and a backtrackable simulation history
//
// Players are processed in list order and every write is visible to the
// remaining sub-steps of the round, so collisions resolve incrementally.

use std::collections::HashMap;

use crate::types::{
    Action, Coord, Grid, Player, COLLISION_CELL, JUMP_INTERVAL, MAX_SPEED, MIN_SPEED,
};

/// What a player does in one round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Regular command
    Act(Action),
    /// Player is eliminated without moving (e.g. missed the server deadline)
    Forfeit,
    /// No command; used for players that are already inactive
    Idle,
}

impl From<Action> for Intent {
    fn from(action: Action) -> Self {
        Intent::Act(action)
    }
}

/// Complete game state at the start of a round
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    pub grid: Grid,
    pub players: Vec<Player>,
    pub round: u32,
    /// Cells whose value changed during the round that produced this state, in write order
    pub changed_cells: Vec<Coord>,
}

impl SimulationState {
    pub fn new(grid: Grid, players: Vec<Player>, round: u32) -> Self {
        SimulationState {
            grid,
            players,
            round,
            changed_cells: Vec::new(),
        }
    }

    /// Only sub-steps 0 and speed-1 are checked for occupancy on jump rounds
    pub fn is_jump_round(&self) -> bool {
        self.round % JUMP_INTERVAL == 0
    }

    pub fn player(&self, id: u8) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn active_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.active)
    }

    /// The game ends once fewer than two players are active
    pub fn is_done(&self) -> bool {
        self.active_players().count() < 2
    }

    /// Sole surviving player of a finished game
    pub fn winner(&self) -> Option<u8> {
        let mut active = self.active_players();
        match (active.next(), active.next()) {
            (Some(p), None) => Some(p.id),
            _ => None,
        }
    }

    /// Advances one round; `actions[i]` belongs to `players[i]`, missing entries mean `change_nothing`
    pub fn step(&self, actions: &[Action]) -> SimulationState {
        let intents: Vec<Intent> = actions.iter().map(|&a| Intent::Act(a)).collect();
        self.step_intents(&intents)
    }

    /// Advances one round with explicit intents per player
    pub fn step_intents(&self, intents: &[Intent]) -> SimulationState {
        let mut next = SimulationState {
            grid: self.grid.clone(),
            players: self.players.clone(),
            round: self.round,
            changed_cells: Vec::new(),
        };
        let jump = self.is_jump_round();
        // cell -> index of the player that wrote it this round
        let mut written: HashMap<Coord, usize> = HashMap::new();

        for i in 0..next.players.len() {
            if !next.players[i].active {
                continue;
            }
            let intent = intents
                .get(i)
                .copied()
                .unwrap_or(Intent::Act(Action::ChangeNothing));

            if !Self::apply_intent(&mut next.players[i], intent) {
                continue;
            }

            let id = next.players[i].id as i8;
            let direction = next.players[i].direction;
            let speed = next.players[i].speed as u32;
            let mut pos = next.players[i].position();
            let mut alive = true;

            for sub_step in 0..speed {
                pos = direction.apply(&pos);

                let Some(value) = next.grid.get(pos) else {
                    alive = false;
                    break;
                };

                // jumped cells are bounds-checked but neither tested nor marked
                if jump && sub_step > 0 && sub_step + 1 < speed {
                    continue;
                }

                if value != 0 {
                    alive = false;
                    if value != COLLISION_CELL {
                        next.grid.set(pos, COLLISION_CELL);
                        next.record_change(pos);
                    }
                    if let Some(&other) = written.get(&pos) {
                        next.players[other].active = false;
                    }
                    break;
                }

                next.grid.set(pos, id);
                next.record_change(pos);
                written.insert(pos, i);
            }

            let player = &mut next.players[i];
            player.x = pos.x;
            player.y = pos.y;
            player.active = alive;
        }

        next.round += 1;
        next
    }

    /// Applies turn/speed changes; returns false if the player is eliminated before moving
    fn apply_intent(player: &mut Player, intent: Intent) -> bool {
        match intent {
            Intent::Idle | Intent::Act(Action::ChangeNothing) => {}
            Intent::Forfeit => {
                player.active = false;
                return false;
            }
            Intent::Act(Action::TurnLeft) => player.direction = player.direction.turn_left(),
            Intent::Act(Action::TurnRight) => player.direction = player.direction.turn_right(),
            Intent::Act(Action::SpeedUp) => {
                if player.speed >= MAX_SPEED {
                    player.active = false;
                    return false;
                }
                player.speed += 1;
            }
            Intent::Act(Action::SlowDown) => {
                if player.speed <= MIN_SPEED {
                    player.active = false;
                    return false;
                }
                player.speed -= 1;
            }
        }
        true
    }

    fn record_change(&mut self, c: Coord) {
        if !self.changed_cells.contains(&c) {
            self.changed_cells.push(c);
        }
    }
}

#[derive(Debug, Clone)]
struct HistoryNode {
    state: SimulationState,
    parent: Option<usize>,
}

/// Arena of simulation states linked to their parents
///
/// `step` pushes a child of the current state and makes it current; `undo`
/// moves back to the parent in O(1). States are never mutated after creation,
/// so a parent stays valid for further branching.
#[derive(Debug, Clone)]
pub struct Simulator {
    nodes: Vec<HistoryNode>,
    head: usize,
}

impl Simulator {
    pub fn new(state: SimulationState) -> Self {
        Simulator {
            nodes: vec![HistoryNode {
                state,
                parent: None,
            }],
            head: 0,
        }
    }

    /// Simulation containing only `player`, the usual setup for look-ahead
    pub fn single_player(grid: &Grid, player: &Player, round: u32) -> Self {
        Self::new(SimulationState::new(grid.clone(), vec![player.clone()], round))
    }

    pub fn state(&self) -> &SimulationState {
        &self.nodes[self.head].state
    }

    /// First player of the current state
    pub fn player(&self) -> Option<&Player> {
        self.state().players.first()
    }

    /// Number of steps between the root and the current state
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut node = self.head;
        while let Some(parent) = self.nodes[node].parent {
            depth += 1;
            node = parent;
        }
        depth
    }

    pub fn step(&mut self, actions: &[Action]) -> &SimulationState {
        let next = self.state().step(actions);
        self.push(next)
    }

    pub fn step_intents(&mut self, intents: &[Intent]) -> &SimulationState {
        let next = self.state().step_intents(intents);
        self.push(next)
    }

    /// Returns to the parent state; false when already at the root
    pub fn undo(&mut self) -> bool {
        let Some(parent) = self.nodes[self.head].parent else {
            return false;
        };
        if self.head + 1 == self.nodes.len() {
            self.nodes.pop();
        }
        self.head = parent;
        true
    }

    fn push(&mut self, state: SimulationState) -> &SimulationState {
        self.nodes.push(HistoryNode {
            state,
            parent: Some(self.head),
        });
        self.head = self.nodes.len() - 1;
        &self.nodes[self.head].state
    }
}
