//! Error types for map loading and play.

use crate::sim::world::Outcome;

/// Map text could not be turned into a world. Fatal at construction.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("invalid map character {ch:?} at line {line}, column {column}")]
    InvalidCell { ch: char, line: usize, column: usize },

    #[error("bad metadata line {line}: {text:?}")]
    BadMetadata { line: usize, text: String },

    #[error("map has no robot")]
    MissingRobot,

    #[error("second robot at line {line}, column {column}")]
    MultipleRobots { line: usize, column: usize },

    #[error("trampoline {trampoline} targets {target}, which is not on the map")]
    UnboundTrampoline { trampoline: char, target: char },

    #[error("could not read map: {0}")]
    Io(#[from] std::io::Error),
}

/// An action could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    #[error("game already finished ({0})")]
    GameFinished(Outcome),

    /// Same as `GameFinished`, for a robot that was crushed by a rock.
    #[error("robot was killed by a falling rock")]
    RobotKilled,

    #[error("unknown action {0:?}")]
    InvalidAction(char),
}
