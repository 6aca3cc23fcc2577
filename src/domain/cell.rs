/// Cell types and their properties.
/// Properties are queried via methods, not stored as flags,
/// so cell semantics are centralized here.

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Cell {
    Empty,
    Earth,
    Wall,
    Robot,
    Rock,
    LambdaRock,      // Rock that turns into a Lambda when it lands
    Lambda,
    Razor,
    Beard,
    ClosedLift,
    OpenLift,
    Target(u8),      // 1..=9, teleport destination
    Trampoline(u8),  // 1..=9, teleport entry ('A' = 1)
}

impl Cell {
    /// Does this cell fall under gravity?
    pub fn is_rock(self) -> bool {
        matches!(self, Cell::Rock | Cell::LambdaRock)
    }

    pub fn is_trampoline(self) -> bool {
        matches!(self, Cell::Trampoline(_))
    }

    pub fn is_target(self) -> bool {
        matches!(self, Cell::Target(_))
    }

    /// Can the robot step into this cell without pushing anything?
    pub fn can_walk_onto(self) -> bool {
        matches!(
            self,
            Cell::Empty
                | Cell::Earth
                | Cell::Lambda
                | Cell::Razor
                | Cell::OpenLift
                | Cell::Trampoline(_)
        )
    }

    /// Counts toward the lambda total at load time.
    pub fn is_lambda_source(self) -> bool {
        matches!(self, Cell::Lambda | Cell::LambdaRock)
    }

    /// Map legend character -> cell. `None` for characters outside the legend.
    pub fn from_char(ch: char) -> Option<Cell> {
        let cell = match ch {
            ' ' => Cell::Empty,
            '.' => Cell::Earth,
            '#' => Cell::Wall,
            'R' => Cell::Robot,
            '*' => Cell::Rock,
            '@' => Cell::LambdaRock,
            '\\' => Cell::Lambda,
            '!' => Cell::Razor,
            'W' => Cell::Beard,
            'L' => Cell::ClosedLift,
            'O' => Cell::OpenLift,
            'A'..='I' => Cell::Trampoline(ch as u8 - b'A' + 1),
            '1'..='9' => Cell::Target(ch as u8 - b'0'),
            _ => return None,
        };
        Some(cell)
    }

    pub fn to_char(self) -> char {
        match self {
            Cell::Empty => ' ',
            Cell::Earth => '.',
            Cell::Wall => '#',
            Cell::Robot => 'R',
            Cell::Rock => '*',
            Cell::LambdaRock => '@',
            Cell::Lambda => '\\',
            Cell::Razor => '!',
            Cell::Beard => 'W',
            Cell::ClosedLift => 'L',
            Cell::OpenLift => 'O',
            Cell::Trampoline(n) => (b'A' + n - 1) as char,
            Cell::Target(n) => (b'0' + n) as char,
        }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::Empty
    }
}
