/// Physics predicates: single source of truth for what moves.
///
/// Everything here is a pure function over a cell lookup
/// (`Fn(Position) -> Cell`), so the tick, the rollback and the route
/// search all ask the same questions. The search passes an overlay
/// lookup (hypothetical vacated cells); the tick passes the live grid.
///
/// ## Rock Fall Rules (priority order, first match wins)
/// ┌───┬──────────────────────────────────────────────┬─────────────┐
/// │ # │ Condition                                     │ Destination │
/// ├───┼──────────────────────────────────────────────┼─────────────┤
/// │ 1 │ below Empty                                   │ down        │
/// │ 2 │ below rock, right Empty, right-below Empty    │ right-down  │
/// │ 3 │ below rock, rule 2 blocked,                   │ left-down   │
/// │   │ left Empty, left-below Empty                  │             │
/// │ 4 │ below Lambda, right Empty, right-below Empty  │ right-down  │
/// │   │ otherwise                                     │ stays       │
/// └───┴──────────────────────────────────────────────┴─────────────┘
///
/// ## Flooding
///
/// Rows `1..=water` are submerged. Each tick the robot spends submerged
/// costs one unit of `waterproof_left`; a dry tick refills it. The robot
/// drowns when the budget drops below `DROWN_BELOW`.

use std::collections::BTreeMap;

use super::cell::Cell;
use super::grid::Position;

/// Drowning threshold on the waterproof countdown. With 0 the robot
/// survives exactly `Waterproof` submerged ticks and dies on the next.
pub const DROWN_BELOW: i32 = 0;

// ══════════════════════════════════════════════════════════════
// Rocks
// ══════════════════════════════════════════════════════════════

/// Where the rock at `pos` goes this tick. `None` if `pos` is not a rock
/// or the rock stays put.
pub fn fall_target<F>(cell_at: &F, pos: Position) -> Option<Position>
where
    F: Fn(Position) -> Cell,
{
    if !cell_at(pos).is_rock() {
        return None;
    }

    let below = cell_at(pos.down());
    if below == Cell::Empty {
        return Some(pos.down());
    }

    let right_clear = cell_at(pos.right()) == Cell::Empty
        && cell_at(pos.right().down()) == Cell::Empty;

    if below.is_rock() {
        if right_clear {
            return Some(pos.right().down());
        }
        let left_clear = cell_at(pos.left()) == Cell::Empty
            && cell_at(pos.left().down()) == Cell::Empty;
        if left_clear {
            return Some(pos.left().down());
        }
        return None;
    }

    if below == Cell::Lambda && right_clear {
        return Some(pos.right().down());
    }

    None
}

/// Can the rock at `pos` move this tick?
#[inline]
pub fn can_fall<F>(cell_at: &F, pos: Position) -> bool
where
    F: Fn(Position) -> Cell,
{
    fall_target(cell_at, pos).is_some()
}

/// What a falling `rock` becomes at `dest`: a lambda rock that lands on
/// something non-empty cracks open into a Lambda.
pub fn landed_cell<F>(cell_at: &F, rock: Cell, dest: Position) -> Cell
where
    F: Fn(Position) -> Cell,
{
    if rock == Cell::LambdaRock && cell_at(dest.down()) != Cell::Empty {
        Cell::Lambda
    } else {
        rock
    }
}

/// Does a rock arriving at `dest` land on the robot?
#[inline]
pub fn crushes<F>(cell_at: &F, dest: Position) -> bool
where
    F: Fn(Position) -> Cell,
{
    cell_at(dest.down()) == Cell::Robot
}

/// Positions whose fall predicate reads `pos`: a change at `pos` can only
/// start or stop rocks in this 3x2 block (same row and the row above).
pub fn influenced_by(pos: Position) -> impl Iterator<Item = Position> {
    (0..=1).flat_map(move |dy| (-1..=1).map(move |dx| pos.offset(dx, dy)))
}

// ══════════════════════════════════════════════════════════════
// Beards
// ══════════════════════════════════════════════════════════════

/// Every Empty cell adjacent (8-way) to one of `beards`, paired with the
/// first beard (in tick order) that reaches it. Deduplicated by target and
/// sorted by target; all of them are filled at once.
pub fn growth_targets<F>(cell_at: &F, beards: &[Position]) -> Vec<(Position, Position)>
where
    F: Fn(Position) -> Cell,
{
    let mut sources: Vec<Position> = beards.to_vec();
    sources.sort();
    let mut claimed: BTreeMap<Position, Position> = BTreeMap::new();
    for beard in sources {
        for p in beard.neighbours8() {
            if cell_at(p) == Cell::Empty {
                claimed.entry(p).or_insert(beard);
            }
        }
    }
    claimed.into_iter().map(|(to, from)| (from, to)).collect()
}

// ══════════════════════════════════════════════════════════════
// Flooding
// ══════════════════════════════════════════════════════════════

/// Water timers. Cloned by the route search to replay the schedule
/// along a hypothetical path.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Flood {
    pub water: i32,
    pub flooding: i32,
    pub waterproof: i32,
    pub waterproof_left: i32,
    pub steps_until_rise: i32,
}

impl Flood {
    pub fn new(water: i32, flooding: i32, waterproof: i32) -> Self {
        Flood {
            water,
            flooding,
            waterproof,
            waterproof_left: waterproof,
            steps_until_rise: flooding,
        }
    }

    #[inline]
    pub fn submerges(&self, row: i32) -> bool {
        row <= self.water
    }

    /// Advance one tick with the robot on `robot_row`.
    /// Returns true if the robot drowned on this tick.
    pub fn tick(&mut self, robot_row: i32) -> bool {
        if self.submerges(robot_row) {
            self.waterproof_left -= 1;
        } else {
            self.waterproof_left = self.waterproof;
        }
        if self.flooding > 0 {
            self.steps_until_rise -= 1;
            if self.steps_until_rise == 0 {
                self.water += 1;
                self.steps_until_rise = self.flooding;
            }
        }
        self.waterproof_left < DROWN_BELOW
    }

    /// Water level after `ticks` more ticks, without touching the budget.
    pub fn level_after(&self, ticks: i32) -> i32 {
        if self.flooding <= 0 || ticks < self.steps_until_rise {
            return self.water;
        }
        self.water + 1 + (ticks - self.steps_until_rise) / self.flooding
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Rows top to bottom, like a map file; the last row is y = 1.
    /// Anything outside the picture reads as Wall.
    fn cells_from(rows: &[&str]) -> impl Fn(Position) -> Cell {
        let h = rows.len() as i32;
        let mut map = HashMap::new();
        for (i, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                let cell = Cell::from_char(ch).expect("legend char");
                map.insert(Position::new(x as i32 + 1, h - i as i32), cell);
            }
        }
        move |p| map.get(&p).copied().unwrap_or(Cell::Wall)
    }

    // ── fall_target ──

    #[test]
    fn rock_falls_straight_into_empty() {
        let c = cells_from(&["*", " "]);
        assert_eq!(fall_target(&c, Position::new(1, 2)), Some(Position::new(1, 1)));
    }

    #[test]
    fn rock_on_earth_stays() {
        let c = cells_from(&["*", "."]);
        assert_eq!(fall_target(&c, Position::new(1, 2)), None);
    }

    #[test]
    fn rock_on_rock_slides_right_first() {
        let c = cells_from(&[" * ", " * "]);
        assert_eq!(fall_target(&c, Position::new(2, 2)), Some(Position::new(3, 1)));
    }

    #[test]
    fn rock_on_rock_slides_left_when_right_blocked() {
        let c = cells_from(&[" *.", " * "]);
        assert_eq!(fall_target(&c, Position::new(2, 2)), Some(Position::new(1, 1)));
        let c = cells_from(&[" * ", " *."]);
        assert_eq!(fall_target(&c, Position::new(2, 2)), Some(Position::new(1, 1)));
    }

    #[test]
    fn rock_on_rock_boxed_in_stays() {
        let c = cells_from(&[".*.", " * "]);
        assert_eq!(fall_target(&c, Position::new(2, 2)), None);
    }

    #[test]
    fn rock_on_lambda_only_slides_right() {
        let c = cells_from(&[" * ", " \\ "]);
        assert_eq!(fall_target(&c, Position::new(2, 2)), Some(Position::new(3, 1)));
        let c = cells_from(&[" *.", " \\ "]);
        assert_eq!(fall_target(&c, Position::new(2, 2)), None);
    }

    #[test]
    fn lambda_rock_obeys_same_rules() {
        let c = cells_from(&["@", " "]);
        assert_eq!(fall_target(&c, Position::new(1, 2)), Some(Position::new(1, 1)));
        let c = cells_from(&[" @ ", " * "]);
        assert_eq!(fall_target(&c, Position::new(2, 2)), Some(Position::new(3, 1)));
    }

    #[test]
    fn non_rock_never_falls() {
        let c = cells_from(&["\\", " "]);
        assert_eq!(fall_target(&c, Position::new(1, 2)), None);
    }

    // ── landing ──

    #[test]
    fn lambda_rock_cracks_on_landing() {
        let c = cells_from(&["@", " ", "."]);
        assert_eq!(landed_cell(&c, Cell::LambdaRock, Position::new(1, 2)), Cell::Lambda);
        let c = cells_from(&["@", " ", " "]);
        assert_eq!(landed_cell(&c, Cell::LambdaRock, Position::new(1, 2)), Cell::LambdaRock);
        assert_eq!(landed_cell(&c, Cell::Rock, Position::new(1, 2)), Cell::Rock);
    }

    #[test]
    fn crush_means_robot_below_destination() {
        let c = cells_from(&["*", " ", "R"]);
        assert!(crushes(&c, Position::new(1, 2)));
        assert!(!crushes(&c, Position::new(1, 3)));
    }

    #[test]
    fn influence_block_is_row_and_row_above() {
        let p = Position::new(5, 5);
        let v: Vec<_> = influenced_by(p).collect();
        assert_eq!(v.len(), 6);
        assert!(v.contains(&Position::new(4, 6)));
        assert!(v.contains(&Position::new(6, 5)));
        assert!(!v.contains(&Position::new(5, 4)));
    }

    // ── growth ──

    #[test]
    fn growth_fills_every_empty_neighbour_once() {
        let c = cells_from(&["   ", " W ", " .W"]);
        let beards = [Position::new(3, 1), Position::new(2, 2)];
        let t = growth_targets(&c, &beards);
        // six empties around the centre beard; the corner beard adds nothing new
        assert_eq!(t.len(), 6);
        assert!(t.iter().all(|&(_, to)| to != Position::new(2, 1)));
        // (3,2) touches both beards; the lower one claims it
        assert!(t.contains(&(Position::new(3, 1), Position::new(3, 2))));
        let targets: Vec<_> = t.iter().map(|&(_, to)| to).collect();
        let mut sorted = targets.clone();
        sorted.sort();
        assert_eq!(targets, sorted);
    }

    // ── flood ──

    #[test]
    fn flood_budget_counts_down_only_under_water() {
        let mut f = Flood::new(1, 0, 2);
        assert!(!f.tick(1));
        assert!(!f.tick(1));
        assert_eq!(f.waterproof_left, 0);
        assert!(!f.tick(2));
        assert_eq!(f.waterproof_left, 2);
    }

    #[test]
    fn flood_drowns_after_allowance() {
        let mut f = Flood::new(1, 0, 2);
        assert!(!f.tick(1));
        assert!(!f.tick(1));
        assert!(f.tick(1));
    }

    #[test]
    fn flood_rises_every_period() {
        let mut f = Flood::new(0, 3, 10);
        for _ in 0..3 { f.tick(5); }
        assert_eq!(f.water, 1);
        for _ in 0..3 { f.tick(5); }
        assert_eq!(f.water, 2);
    }

    #[test]
    fn level_after_matches_ticking() {
        let base = Flood::new(2, 4, 10);
        let mut f = base;
        for n in 0..20 {
            assert_eq!(base.level_after(n), f.water, "after {n} ticks");
            f.tick(100);
        }
        let dry = Flood::new(3, 0, 10);
        assert_eq!(dry.level_after(50), 3);
    }
}
