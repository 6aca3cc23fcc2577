/// WorldState: the complete state of a running mine.
///
/// ## Mutation Architecture
///
/// The grid is owned outright. All cell mutations during play go through
/// `put()` / `slide()` / `spread()`, which
///   - write the grid,
///   - journal the prior content into the open undo frame, and
///   - re-activate every rock whose fall predicate reads the written cell.
///
/// Because every write re-activates its neighbourhood, the active set is
/// always a superset of the rocks that can move on the next tick. It is
/// trimmed back to exactly the movable rocks at the end of each tick.
///
/// `apply()` takes `&mut self`, so no observer can see a half-applied
/// action; route searches borrow `&self` and may run side by side.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::trace;

use crate::domain::cell::Cell;
use crate::domain::grid::{CellStore, DenseGrid, Position};
use crate::domain::physics::{self, Flood};
use super::undo::{Edit, Frame, UndoLog};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Death {
    Crushed,
    Drowned,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Outcome {
    InProgress,
    Win,
    Fail(Death),
    Aborted,
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        self != Outcome::InProgress
    }

    /// Process exit status for drivers.
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Win | Outcome::Aborted => 0,
            Outcome::InProgress => 1,
            Outcome::Fail(_) => 2,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::InProgress => write!(f, "in progress"),
            Outcome::Win => write!(f, "win"),
            Outcome::Fail(Death::Crushed) => write!(f, "fail (crushed)"),
            Outcome::Fail(Death::Drowned) => write!(f, "fail (drowned)"),
            Outcome::Aborted => write!(f, "aborted"),
        }
    }
}

/// Trampoline wiring. Markers are numbered 1..=9.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Teleports {
    /// trampoline marker -> target marker
    pub links: BTreeMap<u8, u8>,
    /// target marker -> position (targets never move)
    pub targets: BTreeMap<u8, Position>,
    /// trampoline marker -> position at load
    pub entries: BTreeMap<u8, Position>,
}

impl Teleports {
    /// Every trampoline marker bound to `target`.
    pub fn entries_for(&self, target: u8) -> impl Iterator<Item = u8> + '_ {
        self.links
            .iter()
            .filter(move |&(_, &t)| t == target)
            .map(|(&tramp, _)| tramp)
    }
}

pub struct WorldState<G: CellStore = DenseGrid> {
    // ── Grid ──
    pub(crate) grid: G,

    // ── Fixed points ──
    pub robot: Position,
    pub lift: Option<Position>,
    pub teleports: Teleports,

    // ── Counters ──
    pub lambdas_gathered: u32,
    pub total_lambdas: u32,
    pub moves: u32,
    pub razors: u32,

    // ── Hazards ──
    pub flood: Flood,
    /// Ticks between beard growth events.
    pub growth: i32,
    pub ticks_until_growth: i32,

    // ── Tick bookkeeping ──
    /// Positions to re-evaluate next tick. Superset of the movable rocks.
    pub(crate) active: BTreeSet<Position>,
    pub outcome: Outcome,

    // ── Undo ──
    pub(crate) undo: UndoLog,
    /// Frame being filled by the action in flight.
    pub(crate) recording: Option<Frame>,
}

// ── Cell query / mutation API ──

impl<G: CellStore> WorldState<G> {
    /// Cell at `pos`. Out of bounds reads as Wall.
    #[inline]
    pub fn cell(&self, pos: Position) -> Cell {
        self.grid.get(pos)
    }

    pub fn grid(&self) -> &G {
        &self.grid
    }

    /// Map width without the border.
    pub fn map_width(&self) -> i32 {
        self.grid.width() - 2
    }

    /// Map height without the border.
    pub fn map_height(&self) -> i32 {
        self.grid.height() - 2
    }

    /// Journaled write.
    pub(crate) fn put(&mut self, pos: Position, cell: Cell) {
        let prior = self.grid.get(pos);
        if let Some(frame) = self.recording.as_mut() {
            frame.edits.push(Edit::Write { pos, prior });
        }
        self.grid.set(pos, cell);
        self.touch(pos);
    }

    /// Journaled rock move: `from` empties, `to` receives `landed`.
    pub(crate) fn slide(&mut self, from: Position, to: Position, landed: Cell) {
        let cell = self.grid.get(from);
        let prior = self.grid.get(to);
        if let Some(frame) = self.recording.as_mut() {
            frame.edits.push(Edit::Slide { from, to, cell, prior });
        }
        trace!(%from, %to, ?landed, "rock moves");
        self.grid.set(from, Cell::Empty);
        self.grid.set(to, landed);
        self.touch(from);
        self.touch(to);
    }

    /// Journaled beard growth from `from` into the empty cell `to`.
    pub(crate) fn spread(&mut self, from: Position, to: Position) {
        if let Some(frame) = self.recording.as_mut() {
            frame.edits.push(Edit::Spread { from, to });
        }
        self.grid.set(to, Cell::Beard);
        self.touch(to);
    }

    /// Queue the rocks whose predicate reads `pos`.
    #[inline]
    pub(crate) fn touch(&mut self, pos: Position) {
        self.active.extend(physics::influenced_by(pos));
    }
}

// ── Active set maintenance ──

impl<G: CellStore> WorldState<G> {
    /// Drop everything that cannot move right now.
    pub(crate) fn trim_active(&mut self) {
        let grid = &self.grid;
        let cell_at = |p: Position| grid.get(p);
        self.active.retain(|&p| physics::can_fall(&cell_at, p));
    }

    /// Full scan of the interior.
    pub(crate) fn rebuild_active(&mut self) {
        let grid = &self.grid;
        let cell_at = |p: Position| grid.get(p);
        self.active = grid
            .interior()
            .into_iter()
            .filter(|&p| physics::can_fall(&cell_at, p))
            .collect();
    }

    /// Positions currently queued for the next tick.
    pub fn active_positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.active.iter().copied()
    }

    /// Will any rock move on the next tick?
    pub fn has_moving_rocks(&self) -> bool {
        let cell_at = |p: Position| self.grid.get(p);
        self.active.iter().any(|&p| physics::can_fall(&cell_at, p))
    }
}

// ── Derived queries ──

impl<G: CellStore> WorldState<G> {
    pub fn lift_is_open(&self) -> bool {
        self.lift.map_or(false, |p| self.cell(p) == Cell::OpenLift)
    }

    pub fn all_lambdas_gathered(&self) -> bool {
        self.lambdas_gathered == self.total_lambdas
    }

    /// Where stepping on `pos` actually puts the robot: the bound target
    /// for a trampoline, `pos` itself otherwise.
    pub fn trampoline_destination(&self, pos: Position) -> Position {
        match self.cell(pos) {
            Cell::Trampoline(t) => self
                .teleports
                .links
                .get(&t)
                .and_then(|target| self.teleports.targets.get(target))
                .copied()
                .unwrap_or(pos),
            _ => pos,
        }
    }

    /// All beard cells, in tick order.
    pub fn beards(&self) -> Vec<Position> {
        self.grid
            .interior()
            .into_iter()
            .filter(|&p| self.grid.get(p) == Cell::Beard)
            .collect()
    }

    /// Number of actions that can be rolled back.
    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }
}

impl<G: CellStore> Clone for WorldState<G> {
    fn clone(&self) -> Self {
        WorldState {
            grid: self.grid.clone(),
            robot: self.robot,
            lift: self.lift,
            teleports: self.teleports.clone(),
            lambdas_gathered: self.lambdas_gathered,
            total_lambdas: self.total_lambdas,
            moves: self.moves,
            razors: self.razors,
            flood: self.flood,
            growth: self.growth,
            ticks_until_growth: self.ticks_until_growth,
            active: self.active.clone(),
            outcome: self.outcome,
            undo: self.undo.clone(),
            recording: None,
        }
    }
}

impl<G: CellStore + fmt::Debug> fmt::Debug for WorldState<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldState")
            .field("robot", &self.robot)
            .field("lift", &self.lift)
            .field("lambdas_gathered", &self.lambdas_gathered)
            .field("total_lambdas", &self.total_lambdas)
            .field("moves", &self.moves)
            .field("razors", &self.razors)
            .field("flood", &self.flood)
            .field("ticks_until_growth", &self.ticks_until_growth)
            .field("outcome", &self.outcome)
            .field("undo_depth", &self.undo.len())
            .finish()
    }
}

// ── Construction ──

impl<G: CellStore> WorldState<G> {
    /// Empty world with a `w` x `h` interior; the level loader fills it in.
    pub(crate) fn blank(w: i32, h: i32) -> Self {
        WorldState {
            grid: G::walled(w, h),
            robot: Position::new(0, 0),
            lift: None,
            teleports: Teleports::default(),
            lambdas_gathered: 0,
            total_lambdas: 0,
            moves: 0,
            razors: 0,
            flood: Flood::new(0, 0, 10),
            growth: 25,
            ticks_until_growth: 25,
            active: BTreeSet::new(),
            outcome: Outcome::InProgress,
            undo: UndoLog::default(),
            recording: None,
        }
    }

    /// Put the lift in the state the lambda count dictates.
    /// Unjournaled; only used at load.
    pub(crate) fn normalise_lift(&mut self) {
        if let Some(lift) = self.lift {
            let cell = if self.all_lambdas_gathered() { Cell::OpenLift } else { Cell::ClosedLift };
            self.grid.set(lift, cell);
        }
    }
}
