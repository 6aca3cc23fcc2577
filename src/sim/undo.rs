/// Undo log: one reverse-delta frame per accepted action.
///
/// ## Frame contents
///
///   - robot position before and after the action
///   - every grid edit in the order it happened:
///       `Write`  a cell overwritten (collection, teleport, cut, lift)
///       `Slide`  a rock pushed or fallen, with the destination's prior cell
///       `Spread` a beard grown into an empty cell
///   - the counters as they were before the action
///
/// ## Rollback
///
/// Edits are reversed in exact reverse order, so overlapping writes
/// (two rocks racing for one cell, a rock landing where the robot left)
/// unwind to the original content. Counters are restored from the
/// snapshot rather than recomputed.
///
/// The active set is rebuilt conservatively: the current set plus the
/// influence block of every cell the frame touched, trimmed to rocks
/// that can actually move. A rock that could move before the frame either
/// moved during it (its source is touched) or was stopped by an edit in
/// its influence block, so nothing movable is missed.

use tracing::debug;

use crate::domain::cell::Cell;
use crate::domain::grid::{CellStore, Position};
use crate::domain::physics::{self, Flood};
use super::world::{Outcome, WorldState};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Edit {
    Write { pos: Position, prior: Cell },
    Slide { from: Position, to: Position, cell: Cell, prior: Cell },
    Spread { from: Position, to: Position },
}

impl Edit {
    /// Cells whose content this edit changed.
    fn touched(&self) -> [Option<Position>; 2] {
        match *self {
            Edit::Write { pos, .. } => [Some(pos), None],
            Edit::Slide { from, to, .. } => [Some(from), Some(to)],
            Edit::Spread { to, .. } => [Some(to), None],
        }
    }
}

/// Counter values captured before an action.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Counters {
    pub lambdas_gathered: u32,
    pub razors: u32,
    pub moves: u32,
    pub flood: Flood,
    pub ticks_until_growth: i32,
    pub outcome: Outcome,
}

#[derive(Clone, Debug)]
pub struct Frame {
    pub robot_from: Position,
    pub robot_to: Position,
    pub edits: Vec<Edit>,
    pub before: Counters,
}

impl Frame {
    pub fn new(robot: Position, before: Counters) -> Self {
        Frame { robot_from: robot, robot_to: robot, edits: Vec::new(), before }
    }
}

/// Append-only stack of frames.
#[derive(Clone, Debug, Default)]
pub struct UndoLog {
    frames: Vec<Frame>,
}

impl UndoLog {
    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl<G: CellStore> WorldState<G> {
    pub(crate) fn snapshot_counters(&self) -> Counters {
        Counters {
            lambdas_gathered: self.lambdas_gathered,
            razors: self.razors,
            moves: self.moves,
            flood: self.flood,
            ticks_until_growth: self.ticks_until_growth,
            outcome: self.outcome,
        }
    }

    /// Undo the most recent action. Returns false (and changes nothing)
    /// when there is nothing to undo.
    pub fn rollback(&mut self) -> bool {
        if self.moves == 0 || self.undo.is_empty() {
            return false;
        }
        let frame = match self.undo.pop() {
            Some(f) => f,
            None => return false,
        };

        for edit in frame.edits.iter().rev() {
            match *edit {
                Edit::Write { pos, prior } => self.grid.set(pos, prior),
                Edit::Slide { from, to, cell, prior } => {
                    self.grid.set(to, prior);
                    self.grid.set(from, cell);
                }
                Edit::Spread { to, .. } => self.grid.set(to, Cell::Empty),
            }
        }

        self.robot = frame.robot_from;
        let before = frame.before;
        self.lambdas_gathered = before.lambdas_gathered;
        self.razors = before.razors;
        self.moves = before.moves;
        self.flood = before.flood;
        self.ticks_until_growth = before.ticks_until_growth;
        self.outcome = before.outcome;

        let touched: Vec<Position> = frame
            .edits
            .iter()
            .flat_map(|e| e.touched())
            .flatten()
            .collect();
        for pos in touched {
            self.active.extend(physics::influenced_by(pos));
        }
        self.trim_active();

        debug!(moves = self.moves, depth = self.undo.len(), "rolled back");
        true
    }

    /// Forget all history; the current state becomes the new baseline.
    pub fn clear_history(&mut self) {
        self.undo.clear();
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::cell::Cell;
    use crate::domain::grid::Position;
    use crate::domain::rules::Action;
    use crate::sim::world::{Death, Outcome, WorldState};

    fn world(text: &str) -> WorldState {
        WorldState::parse(text).expect("valid map")
    }

    /// Everything an observer can see, for field-for-field comparison.
    fn observe(w: &WorldState) -> (String, Position, u32, u32, u32, i32, Outcome, String) {
        (
            w.layout_text(),
            w.robot,
            w.lambdas_gathered,
            w.moves,
            w.razors,
            w.ticks_until_growth,
            w.outcome,
            format!("{:?}", w.flood),
        )
    }

    const MINE: &str = "\
######
#. *R#
#  \\.#
#\\ * #
L  .\\#
######

Water 1
Flooding 4
Waterproof 3";

    #[test]
    fn rollback_on_fresh_world_fails() {
        let mut w = world(MINE);
        let before = observe(&w);
        assert!(!w.rollback());
        assert_eq!(observe(&w), before);
    }

    #[test]
    fn n_actions_then_n_rollbacks_restore_everything() {
        let mut w = world(MINE);
        let start = observe(&w);
        let start_grid = w.grid().clone();
        let moves = "LDLLDRRDW";
        let mut applied = 0;
        for ch in moves.chars() {
            let action = Action::from_char(ch).expect("action");
            if w.apply(action).is_err() {
                break;
            }
            applied += 1;
        }
        assert!(applied > 0);
        for _ in 0..applied {
            assert!(w.rollback());
        }
        assert_eq!(observe(&w), start);
        assert_eq!(*w.grid(), start_grid);
        assert_eq!(w.undo_depth(), 0);
        assert!(!w.rollback());
    }

    #[test]
    fn rollback_restores_each_intermediate_state() {
        let mut w = world(MINE);
        let mut history = vec![observe(&w)];
        for ch in "LDLL".chars() {
            w.apply(Action::from_char(ch).expect("action")).expect("in progress");
            history.push(observe(&w));
        }
        history.pop();
        while let Some(expected) = history.pop() {
            assert!(w.rollback());
            assert_eq!(observe(&w), expected);
        }
    }

    #[test]
    fn rollback_recloses_lift() {
        let mut w = world("#####\n#R\\L#\n#####");
        w.apply(Action::Right).expect("step");
        assert!(w.lift_is_open());
        assert!(w.rollback());
        assert!(!w.lift_is_open());
        assert_eq!(w.cell(Position::new(3, 2)), Cell::Lambda);
        assert_eq!(w.lambdas_gathered, 0);
    }

    #[test]
    fn rollback_revives_crushed_robot() {
        let mut w = world("#####\n# * #\n#   #\n#  R#\n#   #\n#####");
        w.apply(Action::Left).expect("step under rock");
        assert_eq!(w.outcome, Outcome::Fail(Death::Crushed));
        assert!(w.rollback());
        assert_eq!(w.outcome, Outcome::InProgress);
        assert_eq!(w.robot, Position::new(4, 3));
        assert_eq!(w.cell(Position::new(3, 5)), Cell::Rock);
        assert!(w.has_moving_rocks());
    }

    #[test]
    fn rollback_after_win_restores_movable_rocks() {
        // the rock on the left would fall, but stepping onto the open lift
        // ends the game before any tick runs
        let mut w = world("######\n#*  RO#\n#    .#\n######");
        assert!(w.has_moving_rocks());
        w.apply(Action::Right).expect("win");
        assert_eq!(w.outcome, Outcome::Win);
        assert!(w.rollback());
        assert!(w.has_moving_rocks());
        assert_eq!(w.cell(Position::new(5, 3)), Cell::Robot);
        assert_eq!(w.cell(Position::new(6, 3)), Cell::OpenLift);
    }

    #[test]
    fn rollback_undoes_abort() {
        let mut w = world(MINE);
        w.apply(Action::Wait).expect("wait");
        w.apply(Action::Abort).expect("abort");
        assert_eq!(w.outcome, Outcome::Aborted);
        assert!(w.rollback());
        assert_eq!(w.outcome, Outcome::InProgress);
        assert_eq!(w.moves, 1);
    }

    #[test]
    fn clear_history_makes_current_state_the_baseline() {
        let mut w = world(MINE);
        w.apply(Action::Left).expect("move");
        assert_eq!(w.undo_depth(), 1);
        w.clear_history();
        assert_eq!(w.undo_depth(), 0);
        assert!(!w.rollback());
        assert_eq!(w.moves, 1);
    }

    #[test]
    fn rollback_undoes_teleport_group_clear() {
        let text = "#######\n#RA B1#\n#######\n\nTrampoline A targets 1\nTrampoline B targets 1";
        let mut w = world(text);
        let before = w.layout_text();
        w.apply(Action::Right).expect("jump");
        assert_eq!(w.robot, Position::new(6, 2));
        assert!(w.rollback());
        assert_eq!(w.layout_text(), before);
        assert_eq!(w.robot, Position::new(2, 2));
    }
}
