/// Events emitted while applying an action.
/// Drivers and tests consume these; the world never reads them back.

use crate::domain::grid::Position;
use crate::domain::rules::Action;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameEvent {
    MoveBlocked { action: Action },
    LambdaCollected { at: Position },
    RazorCollected { at: Position },
    RockPushed { from: Position, to: Position },
    Teleported { from: Position, to: Position },
    BeardCut { count: usize },
    CutWithoutRazor,
    RockFell { from: Position, to: Position },
    BeardGrew { count: usize },
    LiftOpened,
    WaterRose { level: i32 },
    RobotCrushed,
    RobotDrowned,
    Won,
    Aborted,
}
