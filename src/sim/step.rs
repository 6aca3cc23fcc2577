/// The step function: applies one action and advances the world one tick.
///
/// Processing order:
///   1. Reject if the game is over
///   2. Open an undo frame
///   3. Execute the action (move / push / collect / teleport / cut / wait)
///   4. Tick, unless the action itself won the game:
///        a. rock moves from the active set (all decided on one grid)
///        b. beard growth (all decided on the same grid)
///        c. apply rocks, then growth; note crushes
///        d. open the lift once every lambda is in
///        e. win check
///        f. crush, else flood bookkeeping and drowning
///   5. Close the frame
///
/// Physics queries go through `domain::physics`; legality through
/// `domain::rules`. Every grid write goes through the journaled
/// `put` / `slide` / `spread` helpers on `WorldState`.

use tracing::{debug, info};

use crate::domain::cell::Cell;
use crate::domain::grid::{CellStore, Position};
use crate::domain::physics;
use crate::domain::rules::{self, Action, MoveCheck};
use crate::error::SimError;
use super::event::GameEvent;
use super::undo::Frame;
use super::world::{Death, Outcome, WorldState};

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

impl<G: CellStore> WorldState<G> {
    /// Apply one action. Illegal moves are not errors: they cost a move
    /// and a tick. Errors only when the game is already over.
    pub fn apply(&mut self, action: Action) -> Result<Vec<GameEvent>, SimError> {
        match self.outcome {
            Outcome::InProgress => {}
            Outcome::Fail(Death::Crushed) => return Err(SimError::RobotKilled),
            other => return Err(SimError::GameFinished(other)),
        }

        let mut events = Vec::new();
        self.recording = Some(Frame::new(self.robot, self.snapshot_counters()));
        debug!(%action, moves = self.moves, robot = %self.robot, "apply");

        if action == Action::Abort {
            self.outcome = Outcome::Aborted;
            events.push(GameEvent::Aborted);
        } else {
            self.moves += 1;
            match action {
                Action::Wait => {}
                Action::CutBeard => self.cut_beard(&mut events),
                _ => self.move_robot(action, &mut events),
            }
            if self.outcome != Outcome::Win {
                self.tick(&mut events);
            }
        }

        if let Some(mut frame) = self.recording.take() {
            frame.robot_to = self.robot;
            self.undo.push(frame);
        }

        if self.outcome.is_terminal() {
            info!(outcome = %self.outcome, moves = self.moves,
                  lambdas = self.lambdas_gathered, "game over");
        }
        Ok(events)
    }

    /// Apply a move string such as `"LLDRA"`. Whitespace is skipped.
    /// The whole string is validated before anything is applied; play
    /// stops quietly at the first terminal outcome.
    pub fn apply_all(&mut self, moves: &str) -> Result<Vec<GameEvent>, SimError> {
        let actions = moves
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| Action::from_char(c).ok_or(SimError::InvalidAction(c)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut events = Vec::new();
        for action in actions {
            if self.outcome.is_terminal() {
                break;
            }
            events.extend(self.apply(action)?);
        }
        Ok(events)
    }
}

// ══════════════════════════════════════════════════════════════
// Action execution
// ══════════════════════════════════════════════════════════════

impl<G: CellStore> WorldState<G> {
    fn move_robot(&mut self, action: Action, events: &mut Vec<GameEvent>) {
        let (dx, dy) = match action.delta() {
            Some(d) => d,
            None => return,
        };
        let from = self.robot;
        let check = {
            let grid = &self.grid;
            rules::check_move(&|p: Position| grid.get(p), from, dx, dy)
        };

        match check {
            MoveCheck::Blocked => {
                events.push(GameEvent::MoveBlocked { action });
            }
            MoveCheck::Push { to, rock_to } => {
                let rock = self.cell(to);
                self.slide(to, rock_to, rock);
                events.push(GameEvent::RockPushed { from: to, to: rock_to });
                self.enter(from, to);
            }
            MoveCheck::Step { to } => match self.cell(to) {
                Cell::Lambda => {
                    self.lambdas_gathered += 1;
                    events.push(GameEvent::LambdaCollected { at: to });
                    self.enter(from, to);
                }
                Cell::Razor => {
                    self.razors += 1;
                    events.push(GameEvent::RazorCollected { at: to });
                    self.enter(from, to);
                }
                Cell::OpenLift => {
                    // The lift cell stays a lift; the robot rides it out.
                    self.put(from, Cell::Empty);
                    self.robot = to;
                    self.outcome = Outcome::Win;
                    events.push(GameEvent::Won);
                }
                Cell::Trampoline(t) => self.jump(from, to, t, events),
                _ => self.enter(from, to),
            },
        }
    }

    fn enter(&mut self, from: Position, to: Position) {
        self.put(from, Cell::Empty);
        self.put(to, Cell::Robot);
        self.robot = to;
    }

    /// Teleport through trampoline `t` at `at`. Every trampoline sharing
    /// the target disappears with it.
    fn jump(&mut self, from: Position, at: Position, t: u8, events: &mut Vec<GameEvent>) {
        let target = match self.teleports.links.get(&t) {
            Some(&target) => target,
            None => return self.enter(from, at),
        };
        let landing = match self.teleports.targets.get(&target) {
            Some(&p) => p,
            None => return self.enter(from, at),
        };

        self.put(from, Cell::Empty);
        let group: Vec<(u8, Position)> = self
            .teleports
            .entries_for(target)
            .filter_map(|tramp| self.teleports.entries.get(&tramp).map(|&p| (tramp, p)))
            .collect();
        for (tramp, p) in group {
            if self.cell(p) == Cell::Trampoline(tramp) {
                self.put(p, Cell::Empty);
            }
        }
        self.put(landing, Cell::Robot);
        self.robot = landing;
        events.push(GameEvent::Teleported { from: at, to: landing });
    }

    fn cut_beard(&mut self, events: &mut Vec<GameEvent>) {
        if self.razors == 0 {
            events.push(GameEvent::CutWithoutRazor);
            return;
        }
        self.razors -= 1;
        let beards: Vec<Position> = self
            .robot
            .neighbours8()
            .filter(|&p| self.cell(p) == Cell::Beard)
            .collect();
        for &p in &beards {
            self.put(p, Cell::Empty);
        }
        events.push(GameEvent::BeardCut { count: beards.len() });
    }
}

// ══════════════════════════════════════════════════════════════
// Physics tick
// ══════════════════════════════════════════════════════════════

impl<G: CellStore> WorldState<G> {
    fn tick(&mut self, events: &mut Vec<GameEvent>) {
        // a. rocks: every decision is made on the same grid
        let candidates = std::mem::take(&mut self.active);
        let rock_moves: Vec<(Position, Position, Cell)> = {
            let grid = &self.grid;
            let cell_at = |p: Position| grid.get(p);
            candidates
                .iter()
                .filter_map(|&src| {
                    physics::fall_target(&cell_at, src)
                        .map(|dst| (src, dst, physics::landed_cell(&cell_at, grid.get(src), dst)))
                })
                .collect()
        };

        // b. growth, decided on that same grid
        let growth = self.growth_due();

        // c. apply
        let mut crushed = false;
        for (src, dst, landed) in rock_moves {
            if !self.cell(src).is_rock() {
                continue;
            }
            self.slide(src, dst, landed);
            events.push(GameEvent::RockFell { from: src, to: dst });
            let grid = &self.grid;
            crushed |= physics::crushes(&|p: Position| grid.get(p), dst);
        }

        let mut grown = 0;
        for (from, to) in growth {
            if self.cell(to) == Cell::Empty {
                self.spread(from, to);
                grown += 1;
            }
        }
        if grown > 0 {
            events.push(GameEvent::BeardGrew { count: grown });
        }

        // d. lift
        if self.all_lambdas_gathered() {
            if let Some(lift) = self.lift {
                if self.cell(lift) == Cell::ClosedLift {
                    self.put(lift, Cell::OpenLift);
                    events.push(GameEvent::LiftOpened);
                    info!(lift = %lift, "lift opened");
                }
            }
        }

        // e. win
        if Some(self.robot) == self.lift && self.lift_is_open() {
            self.outcome = Outcome::Win;
            events.push(GameEvent::Won);
        }

        // f. crush beats drowning; a crushed robot does not breathe
        if crushed {
            self.outcome = Outcome::Fail(Death::Crushed);
            events.push(GameEvent::RobotCrushed);
        } else if self.outcome == Outcome::InProgress {
            let level = self.flood.water;
            let drowned = self.flood.tick(self.robot.y);
            if self.flood.water > level {
                events.push(GameEvent::WaterRose { level: self.flood.water });
            }
            if drowned {
                self.outcome = Outcome::Fail(Death::Drowned);
                events.push(GameEvent::RobotDrowned);
            }
        }

        self.trim_active();
    }

    /// Advance the growth countdown; on expiry return every
    /// `(beard, empty neighbour)` pair to fill this tick.
    fn growth_due(&mut self) -> Vec<(Position, Position)> {
        if self.growth <= 0 {
            return Vec::new();
        }
        self.ticks_until_growth -= 1;
        if self.ticks_until_growth > 0 {
            return Vec::new();
        }
        self.ticks_until_growth = self.growth;
        let beards = self.beards();
        let grid = &self.grid;
        physics::growth_targets(&|p: Position| grid.get(p), &beards)
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn world(text: &str) -> WorldState {
        WorldState::parse(text).expect("valid map")
    }

    fn at(x: i32, y: i32) -> Position {
        Position::new(x, y)
    }

    fn lift_matches_lambdas(w: &WorldState) -> bool {
        w.lift_is_open() == w.all_lambdas_gathered()
    }

    // ── basic moves ──

    #[test]
    fn walk_through_earth_leaves_empty() {
        let mut w = world("#####\n#R..#\n#####");
        let ev = w.apply(Action::Right).expect("move");
        assert!(ev.is_empty());
        assert_eq!(w.robot, at(3, 2));
        assert_eq!(w.cell(at(2, 2)), Cell::Empty);
        assert_eq!(w.cell(at(3, 2)), Cell::Robot);
        assert_eq!(w.moves, 1);
    }

    #[test]
    fn blocked_move_still_counts_and_ticks() {
        let mut w = world("#####\n#R#*#\n#  .#\n#####\n\nFlooding 1");
        let ev = w.apply(Action::Right).expect("blocked");
        assert_eq!(ev[0], GameEvent::MoveBlocked { action: Action::Right });
        assert_eq!(w.robot, at(2, 3));
        assert_eq!(w.moves, 1);
        assert_eq!(w.flood.water, 1);
    }

    #[test]
    fn wait_counts_as_move() {
        let mut w = world("####\n#R #\n####");
        w.apply(Action::Wait).expect("wait");
        w.apply(Action::Wait).expect("wait");
        assert_eq!(w.moves, 2);
        assert_eq!(w.robot, at(2, 2));
    }

    #[test]
    fn abort_ends_game_without_counting() {
        let mut w = world("####\n#R #\n####");
        w.apply(Action::Abort).expect("abort");
        assert_eq!(w.outcome, Outcome::Aborted);
        assert_eq!(w.moves, 0);
        assert_eq!(w.apply(Action::Wait), Err(SimError::GameFinished(Outcome::Aborted)));
        assert_eq!(w.apply(Action::Abort), Err(SimError::GameFinished(Outcome::Aborted)));
        assert_eq!(w.undo_depth(), 1);
    }

    #[test]
    fn push_rock_sideways() {
        let mut w = world("######\n#R*  #\n#....#\n######");
        let ev = w.apply(Action::Right).expect("push");
        assert!(ev.contains(&GameEvent::RockPushed { from: at(3, 3), to: at(4, 3) }));
        assert_eq!(w.robot, at(3, 3));
        assert_eq!(w.cell(at(4, 3)), Cell::Rock);
    }

    #[test]
    fn pushed_rock_falls_on_the_same_tick() {
        let mut w = world("######\n#R*  #\n#.. .#\n######");
        w.apply(Action::Right).expect("push");
        // pushed onto (4,3) over empty (4,2)
        assert_eq!(w.cell(at(4, 3)), Cell::Empty);
        assert_eq!(w.cell(at(4, 2)), Cell::Rock);
    }

    // ── falling ──

    #[test]
    fn rock_over_empty_moves_after_exactly_one_tick() {
        let mut w = world("#####\n#*  #\n#  R#\n#. .#\n#####");
        assert_eq!(w.cell(at(2, 4)), Cell::Rock);
        w.apply(Action::Wait).expect("tick");
        assert_eq!(w.cell(at(2, 4)), Cell::Empty);
        assert_eq!(w.cell(at(2, 3)), Cell::Rock);
        w.apply(Action::Wait).expect("tick");
        assert_eq!(w.cell(at(2, 3)), Cell::Rock);
        assert_eq!(w.cell(at(2, 2)), Cell::Earth);
    }

    #[test]
    fn stacked_rocks_slide_off_each_other() {
        let mut w = world("#####\n#*  #\n#*  #\n#..R#\n#####");
        w.apply(Action::Wait).expect("tick");
        assert_eq!(w.cell(at(2, 4)), Cell::Empty);
        assert_eq!(w.cell(at(3, 3)), Cell::Rock);
    }

    #[test]
    fn lambda_rock_cracks_when_it_lands() {
        let mut w = world("#####\n#@ R#\n#   #\n#.  #\n#####");
        assert_eq!(w.total_lambdas, 1);
        w.apply(Action::Wait).expect("tick");
        assert_eq!(w.cell(at(2, 3)), Cell::Lambda);
    }

    #[test]
    fn lambda_rock_in_flight_stays_a_rock() {
        let mut w = world("#####\n#@ R#\n#   #\n#   #\n#.  #\n#####");
        w.apply(Action::Wait).expect("tick");
        assert_eq!(w.cell(at(2, 4)), Cell::LambdaRock);
        w.apply(Action::Wait).expect("tick");
        assert_eq!(w.cell(at(2, 3)), Cell::Lambda);
    }

    // ── crushing ──

    #[test]
    fn rock_landing_on_robot_crushes() {
        let mut w = world("#####\n# * #\n#   #\n#  R#\n#   #\n#####");
        let ev = w.apply(Action::Left).expect("step");
        assert!(ev.contains(&GameEvent::RobotCrushed));
        assert_eq!(w.outcome, Outcome::Fail(Death::Crushed));
        assert_eq!(w.apply(Action::Wait), Err(SimError::RobotKilled));
    }

    #[test]
    fn rock_resting_on_robot_is_harmless() {
        let mut w = world("#####\n# * #\n# .R#\n#   #\n#####");
        w.apply(Action::Left).expect("step under rock");
        assert_eq!(w.outcome, Outcome::InProgress);
        assert_eq!(w.cell(at(3, 4)), Cell::Rock);
        assert_eq!(w.cell(at(3, 3)), Cell::Robot);
    }

    #[test]
    fn leaving_from_under_a_rock_downward_is_fatal() {
        let mut w = world("#####\n# * #\n# R #\n# . #\n#####");
        w.apply(Action::Down).expect("step");
        assert_eq!(w.outcome, Outcome::Fail(Death::Crushed));
    }

    #[test]
    fn crush_takes_precedence_over_drowning() {
        let text = "#####\n# * #\n#   #\n#  R#\n#####\n\nWater 2\nWaterproof 0";
        let mut w = world(text);
        let ev = w.apply(Action::Left).expect("step");
        assert_eq!(w.outcome, Outcome::Fail(Death::Crushed));
        assert!(!ev.contains(&GameEvent::RobotDrowned));
    }

    // ── collecting and the lift ──

    #[test]
    fn lift_opens_on_the_tick_after_last_lambda() {
        let mut w = world("######\n#R\\\\L#\n######");
        assert!(lift_matches_lambdas(&w));
        w.apply(Action::Right).expect("first");
        assert!(!w.lift_is_open());
        assert!(lift_matches_lambdas(&w));
        let ev = w.apply(Action::Right).expect("second");
        assert!(ev.contains(&GameEvent::LiftOpened));
        assert!(w.lift_is_open());
        assert!(lift_matches_lambdas(&w));
        let ev = w.apply(Action::Right).expect("exit");
        assert_eq!(ev, vec![GameEvent::Won]);
        assert_eq!(w.outcome, Outcome::Win);
        assert_eq!(w.robot, at(5, 2));
        assert_eq!(w.cell(at(5, 2)), Cell::OpenLift);
    }

    #[test]
    fn closed_lift_blocks() {
        let mut w = world("#####\n#RL\\#\n#####");
        let ev = w.apply(Action::Right).expect("blocked");
        assert_eq!(ev[0], GameEvent::MoveBlocked { action: Action::Right });
        assert_eq!(w.outcome, Outcome::InProgress);
    }

    #[test]
    fn lift_state_tracks_lambdas_every_tick() {
        let mut w = world("#######\n#R\\ \\L#\n#.....#\n#######");
        for ch in "RRRRW".chars() {
            w.apply(Action::from_char(ch).expect("action")).expect("play");
            assert!(lift_matches_lambdas(&w), "after {ch}");
            if w.outcome.is_terminal() {
                break;
            }
        }
    }

    // ── trampolines ──

    #[test]
    fn trampoline_teleports_and_clears_its_group() {
        let text = "########\n#RA B 1#\n#......#\n########\n\nTrampoline A targets 1\nTrampoline B targets 1";
        let mut w = world(text);
        let ev = w.apply(Action::Right).expect("jump");
        assert!(ev.contains(&GameEvent::Teleported { from: at(3, 3), to: at(7, 3) }));
        assert_eq!(w.robot, at(7, 3));
        assert_eq!(w.cell(at(7, 3)), Cell::Robot);
        assert_eq!(w.cell(at(2, 3)), Cell::Empty);
        assert_eq!(w.cell(at(3, 3)), Cell::Empty);
        assert_eq!(w.cell(at(5, 3)), Cell::Empty);
    }

    #[test]
    fn other_groups_survive_a_jump() {
        let text = "#########\n#RA B 12#\n#.......#\n#########\n\nTrampoline A targets 1\nTrampoline B targets 2";
        let mut w = world(text);
        w.apply(Action::Right).expect("jump");
        assert_eq!(w.cell(at(5, 3)), Cell::Trampoline(2));
    }

    // ── beards and razors ──

    #[test]
    fn beard_grows_exactly_every_growth_ticks() {
        let text = "#######\n#     #\n#  W  #\n#     #\n#R....#\n#######\n\nGrowth 3";
        let mut w = world(text);
        let count = |w: &WorldState| w.beards().len();
        assert_eq!(count(&w), 1);
        w.apply(Action::Wait).expect("t1");
        w.apply(Action::Wait).expect("t2");
        assert_eq!(count(&w), 1);
        let ev = w.apply(Action::Wait).expect("t3");
        assert!(ev.contains(&GameEvent::BeardGrew { count: 8 }));
        assert_eq!(count(&w), 9);
        w.apply(Action::Wait).expect("t4");
        w.apply(Action::Wait).expect("t5");
        assert_eq!(count(&w), 9);
        w.apply(Action::Wait).expect("t6");
        // rows 3..=5 fill up; row 2 holds only earth and the robot
        assert_eq!(count(&w), 15);
    }

    #[test]
    fn razor_then_cut() {
        let text = "######\n#R!W #\n#....#\n######\n\nGrowth 100";
        let mut w = world(text);
        let ev = w.apply(Action::CutBeard).expect("no razor");
        assert_eq!(ev[0], GameEvent::CutWithoutRazor);
        w.apply(Action::Right).expect("collect");
        assert_eq!(w.razors, 1);
        let ev = w.apply(Action::CutBeard).expect("cut");
        assert!(ev.contains(&GameEvent::BeardCut { count: 1 }));
        assert_eq!(w.razors, 0);
        assert_eq!(w.cell(at(4, 3)), Cell::Empty);
        assert_eq!(w.moves, 3);
    }

    #[test]
    fn beard_blocks_movement() {
        let mut w = world("#####\n#RW #\n#####");
        w.apply(Action::Right).expect("blocked");
        assert_eq!(w.robot, at(2, 2));
    }

    // ── flooding ──

    #[test]
    fn drowns_on_the_tick_allowance_runs_out() {
        let text = "#####\n#   #\n#R  #\n#####\n\nWater 2\nFlooding 3\nWaterproof 2";
        let mut w = world(text);
        w.apply(Action::Wait).expect("t1");
        assert_eq!(w.outcome, Outcome::InProgress);
        w.apply(Action::Wait).expect("t2");
        assert_eq!(w.outcome, Outcome::InProgress);
        let ev = w.apply(Action::Wait).expect("t3");
        assert_eq!(w.outcome, Outcome::Fail(Death::Drowned));
        assert!(ev.contains(&GameEvent::RobotDrowned));
        assert_eq!(w.apply(Action::Wait), Err(SimError::GameFinished(w.outcome)));
    }

    #[test]
    fn surfacing_refills_the_allowance() {
        let text = "#####\n#   #\n#R  #\n#####\n\nWater 2\nWaterproof 1";
        let mut w = world(text);
        w.apply(Action::Wait).expect("t1");
        assert_eq!(w.flood.waterproof_left, 0);
        w.apply(Action::Up).expect("surface");
        assert_eq!(w.flood.waterproof_left, 1);
        w.apply(Action::Down).expect("dive");
        assert_eq!(w.outcome, Outcome::InProgress);
        w.apply(Action::Wait).expect("t4");
        assert_eq!(w.outcome, Outcome::Fail(Death::Drowned));
    }

    #[test]
    fn water_rises_and_never_falls_in_play() {
        let text = "#####\n#   #\n#   #\n#R  #\n#####\n\nFlooding 2\nWaterproof 50";
        let mut w = world(text);
        let mut last = w.flood.water;
        for _ in 0..6 {
            w.apply(Action::Wait).expect("tick");
            assert!(w.flood.water >= last);
            last = w.flood.water;
        }
        assert_eq!(w.flood.water, 3);
    }

    #[test]
    fn apply_all_validates_first() {
        let mut w = world("#####\n#R..#\n#####");
        assert_eq!(w.apply_all("RXR"), Err(SimError::InvalidAction('X')));
        assert_eq!(w.moves, 0);
        w.apply_all("R R").expect("moves");
        assert_eq!(w.moves, 2);
    }

    #[test]
    fn apply_all_stops_at_game_end() {
        let mut w = world("#####\n#RO #\n#####");
        let ev = w.apply_all("RRRR").expect("moves");
        assert_eq!(ev, vec![GameEvent::Won]);
        assert_eq!(w.moves, 1);
    }
}
