//! Lambda Lifter: a grid mine simulator.
//!
//! `domain` holds the cell model, the physics predicates, move legality and
//! the route search. `sim` owns the running world: the map codec, the step
//! function, and the undo log.

pub mod config;
pub mod domain;
pub mod error;
pub mod sim;

pub use domain::cell::Cell;
pub use domain::grid::{CellStore, DenseGrid, Position, SparseGrid};
pub use domain::rules::Action;
pub use domain::search::{Route, RouteSearch, SearchOptions, SearchResult};
pub use error::{MapError, SimError};
pub use sim::event::GameEvent;
pub use sim::world::{Death, Outcome, WorldState};
