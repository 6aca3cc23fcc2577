/// Route search: BFS over the mine from a start cell, without pushing rocks.
///
/// Two checks gate every expansion:
///   1. **Walkable**: the cell can be entered without a push (a trampoline
///      sends the search on to its target).
///   2. **Safe**: entering it on step `n` neither drowns the robot nor puts
///      it under a rock that lands above it by then.
///
/// The search reads the world through a view that treats the robot's
/// current cell and the cell being left as empty. It never mutates the
/// world; dropping the iterator abandons the search.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use super::cell::Cell;
use super::grid::{CellStore, Position};
use super::physics::{self, Flood};
use super::rules::{self, Action};
use crate::sim::world::WorldState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchOptions {
    /// Plan through a closed lift as if it were open.
    pub assume_lift_open: bool,
    /// Direction expansion order.
    pub order: [Action; 4],
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions { assume_lift_open: false, order: Action::DIRECTIONS }
    }
}

/// A reachable cell and the moves that get there.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub position: Position,
    pub actions: Vec<Action>,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {}", self.position, rules::format_actions(&self.actions))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchResult {
    pub routes: Vec<Route>,
    pub lift: Option<Route>,
}

struct Node {
    pos: Position,
    parent: Option<usize>,
    action: Action,
    steps: i32,
    flood: Flood,
}

/// Lazily yields a route to every reachable lambda, nearest first.
pub struct RouteSearch<'a, G: CellStore> {
    world: &'a WorldState<G>,
    options: SearchOptions,
    nodes: Vec<Node>,
    queue: VecDeque<usize>,
    visited: HashSet<Position>,
    lift: Option<Route>,
}

impl<'a, G: CellStore> RouteSearch<'a, G> {
    pub fn new(world: &'a WorldState<G>, start: Position) -> Self {
        Self::with_options(world, start, SearchOptions::default())
    }

    pub fn with_options(world: &'a WorldState<G>, start: Position, options: SearchOptions) -> Self {
        let root = Node { pos: start, parent: None, action: Action::Wait, steps: 0, flood: world.flood };
        let mut visited = HashSet::new();
        visited.insert(start);
        RouteSearch {
            world,
            options,
            nodes: vec![root],
            queue: VecDeque::from([0]),
            visited,
            lift: None,
        }
    }

    /// Replace the direction order.
    pub fn with_order(mut self, order: [Action; 4]) -> Self {
        self.options.order = order;
        self
    }

    /// Route to the lift, once the search has reached it.
    pub fn lift(&self) -> Option<&Route> {
        self.lift.as_ref()
    }

    /// Drain the search.
    pub fn run(mut self) -> SearchResult {
        let routes: Vec<Route> = self.by_ref().collect();
        SearchResult { routes, lift: self.lift }
    }

    fn is_lift(&self, cell: Cell) -> bool {
        cell == Cell::OpenLift || (self.options.assume_lift_open && cell == Cell::ClosedLift)
    }

    fn route_to(&self, idx: usize) -> Route {
        let mut actions = Vec::with_capacity(self.nodes[idx].steps.max(0) as usize);
        let mut cur = idx;
        while let Some(parent) = self.nodes[cur].parent {
            actions.push(self.nodes[cur].action);
            cur = parent;
        }
        actions.reverse();
        Route { position: self.nodes[idx].pos, actions }
    }

    fn expand(&mut self, idx: usize) {
        let (from, steps, flood) = {
            let n = &self.nodes[idx];
            (n.pos, n.steps, n.flood)
        };

        for action in self.options.order {
            let (dx, dy) = match action.delta() {
                Some(d) => d,
                None => continue,
            };
            let step = from.offset(dx, dy);
            if self.visited.contains(&step) {
                continue;
            }
            let cell = self.seen_from(from, step);
            let walkable = rules::can_walk_without_push(&|p: Position| self.seen_from(from, p), step)
                || self.is_lift(cell);
            if !walkable {
                continue;
            }

            let to = self.world.trampoline_destination(step);
            let mut ticked = flood;
            if ticked.tick(to.y) || !self.rocks_safe(from, to, steps + 1) {
                continue;
            }

            self.visited.insert(step);
            self.visited.insert(to);
            self.nodes.push(Node { pos: to, parent: Some(idx), action, steps: steps + 1, flood: ticked });
            self.queue.push_back(self.nodes.len() - 1);
        }
    }

    /// The world as seen while leaving `from`: that cell and the robot's
    /// current cell read as Empty.
    fn seen_from(&self, from: Position, p: Position) -> Cell {
        if p == self.world.robot || p == from {
            Cell::Empty
        } else {
            self.world.cell(p)
        }
    }

    /// Entering `to` from `from` on step `n`: is any rock due to land
    /// directly above `to` by then?
    fn rocks_safe(&self, from: Position, to: Position, n: i32) -> bool {
        let view = |p: Position| self.seen_from(from, p);
        let above = to.up();

        // immediate collapse
        for x in to.x - 1..=to.x + 1 {
            if physics::fall_target(&view, Position::new(x, to.y + 2)) == Some(above) {
                return false;
            }
        }

        // a rock dropping into the column and falling through it for n ticks
        let top = to.y + n + 1;
        let landing = Position::new(to.x, top - 1);
        let column_clear = (to.y + 1..=top - 2).all(|y| view(Position::new(to.x, y)) == Cell::Empty);
        if column_clear {
            for x in to.x - 1..=to.x + 1 {
                if physics::fall_target(&view, Position::new(x, top)) == Some(landing) {
                    return false;
                }
            }
        }
        true
    }
}

impl<'a, G: CellStore> Iterator for RouteSearch<'a, G> {
    type Item = Route;

    fn next(&mut self) -> Option<Route> {
        while let Some(idx) = self.queue.pop_front() {
            let cell = self.world.cell(self.nodes[idx].pos);
            if self.is_lift(cell) {
                if self.lift.is_none() {
                    self.lift = Some(self.route_to(idx));
                }
                continue;
            }
            self.expand(idx);
            if cell == Cell::Lambda {
                return Some(self.route_to(idx));
            }
        }
        None
    }
}
