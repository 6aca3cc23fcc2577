/// Action alphabet and move legality: truth-table driven.
///
/// Pure functions operating on a cell lookup, no side effects.
/// These encode "what is legal" without performing the action.
///
/// ## Directional Move Truth Table
/// ┌──────────────────────────────┬───────────┬───────────────────┐
/// │ Destination                   │ Allow?    │ Notes             │
/// ├──────────────────────────────┼───────────┼───────────────────┤
/// │ Wall / Target / ClosedLift    │ DENY      │ fixed obstacles   │
/// │ Beard                         │ DENY      │ cut it first      │
/// │ Rock, vertical move           │ DENY      │ can't lift rocks  │
/// │ Rock, horizontal, beyond Empty│ PUSH      │ rock slides along │
/// │ Rock, horizontal, beyond busy │ DENY      │                   │
/// │ Empty / Earth / Lambda / Razor│ ALLOW     │                   │
/// │ OpenLift / Trampoline         │ ALLOW     │ win / teleport    │
/// └──────────────────────────────┴───────────┴───────────────────┘
///
/// Denied moves are not errors: the robot stays put, the move still
/// counts and the world still ticks.

use std::fmt;

use super::cell::Cell;
use super::grid::Position;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
    Wait,
    Abort,
    CutBeard,
}

impl Action {
    pub const DIRECTIONS: [Action; 4] = [Action::Down, Action::Left, Action::Right, Action::Up];

    /// Unit step for directional actions.
    pub fn delta(self) -> Option<(i32, i32)> {
        match self {
            Action::Up => Some((0, 1)),
            Action::Down => Some((0, -1)),
            Action::Left => Some((-1, 0)),
            Action::Right => Some((1, 0)),
            _ => None,
        }
    }

    pub fn from_char(ch: char) -> Option<Action> {
        match ch.to_ascii_uppercase() {
            'U' => Some(Action::Up),
            'D' => Some(Action::Down),
            'L' => Some(Action::Left),
            'R' => Some(Action::Right),
            'W' => Some(Action::Wait),
            'A' => Some(Action::Abort),
            'S' => Some(Action::CutBeard),
            _ => None,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Action::Up => 'U',
            Action::Down => 'D',
            Action::Left => 'L',
            Action::Right => 'R',
            Action::Wait => 'W',
            Action::Abort => 'A',
            Action::CutBeard => 'S',
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// Format a move sequence as its compact letter string.
pub fn format_actions(actions: &[Action]) -> String {
    actions.iter().map(|a| a.to_char()).collect()
}

/// Result of checking a directional move.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MoveCheck {
    Blocked,
    /// Robot enters `to`.
    Step { to: Position },
    /// Robot enters `to`, the rock there slides to `rock_to`.
    Push { to: Position, rock_to: Position },
}

/// Is `cell` something the robot can never enter?
#[inline]
pub fn is_obstacle(cell: Cell) -> bool {
    matches!(cell, Cell::Wall | Cell::Target(_) | Cell::ClosedLift | Cell::Beard)
}

/// Check a directional move from `from` by `(dx, dy)`.
pub fn check_move<F>(cell_at: &F, from: Position, dx: i32, dy: i32) -> MoveCheck
where
    F: Fn(Position) -> Cell,
{
    let to = from.offset(dx, dy);
    let dest = cell_at(to);

    if is_obstacle(dest) {
        return MoveCheck::Blocked;
    }

    if dest.is_rock() {
        if dy != 0 {
            return MoveCheck::Blocked;
        }
        let rock_to = to.offset(dx, 0);
        if cell_at(rock_to) == Cell::Empty {
            return MoveCheck::Push { to, rock_to };
        }
        return MoveCheck::Blocked;
    }

    if dest.can_walk_onto() {
        MoveCheck::Step { to }
    } else {
        MoveCheck::Blocked
    }
}

/// Search variant: rocks are never pushed, so a rock is just a wall.
#[inline]
pub fn can_walk_without_push<F>(cell_at: &F, to: Position) -> bool
where
    F: Fn(Position) -> Cell,
{
    cell_at(to).can_walk_onto()
}
