/// Grid storage behind a small trait so the backing can be swapped
/// without touching physics or move logic.
///
/// ## Coordinates
///
/// `x` grows rightward, `y` grows upward. Every store is created padded
/// with a one-cell Wall border: interior cells live in `1..=w` x `1..=h`,
/// so the eight neighbours of any interior cell are always in bounds.
///
/// Reads outside `[0, width) x [0, height)` return `Wall`; writes there
/// are dropped. Neither backing ever touches memory outside its bounds.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use super::cell::Cell;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Position { x, y }
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Position { x: self.x + dx, y: self.y + dy }
    }

    #[inline]
    pub fn up(self) -> Self { self.offset(0, 1) }
    #[inline]
    pub fn down(self) -> Self { self.offset(0, -1) }
    #[inline]
    pub fn left(self) -> Self { self.offset(-1, 0) }
    #[inline]
    pub fn right(self) -> Self { self.offset(1, 0) }

    /// The 8 surrounding cells (Chebyshev distance 1).
    pub fn neighbours8(self) -> impl Iterator<Item = Position> {
        (-1..=1)
            .flat_map(move |dy| (-1..=1).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| dx != 0 || dy != 0)
            .map(move |(dx, dy)| self.offset(dx, dy))
    }

    pub fn manhattan(self, other: Position) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

/// Row-major, bottom row first. Ticks scan in this order.
impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cell storage contract. `width`/`height` include the border.
pub trait CellStore: Clone {
    /// A store for a `w` x `h` map: Empty interior, Wall border.
    fn walled(w: i32, h: i32) -> Self;

    fn width(&self) -> i32;
    fn height(&self) -> i32;

    fn get(&self, pos: Position) -> Cell;
    fn set(&mut self, pos: Position, cell: Cell);

    #[inline]
    fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width() && pos.y < self.height()
    }

    /// Interior positions, bottom row first.
    fn interior(&self) -> Vec<Position> {
        let mut out = Vec::with_capacity(((self.width() - 2) * (self.height() - 2)).max(0) as usize);
        for y in 1..self.height() - 1 {
            for x in 1..self.width() - 1 {
                out.push(Position::new(x, y));
            }
        }
        out
    }
}

// ══════════════════════════════════════════════════════════════
// Dense backing
// ══════════════════════════════════════════════════════════════

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DenseGrid {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
}

impl DenseGrid {
    #[inline]
    fn index(&self, pos: Position) -> Option<usize> {
        if self.in_bounds(pos) {
            Some((pos.y * self.width + pos.x) as usize)
        } else {
            None
        }
    }
}

impl CellStore for DenseGrid {
    fn walled(w: i32, h: i32) -> Self {
        let width = w.max(0) + 2;
        let height = h.max(0) + 2;
        let mut cells = vec![Cell::Wall; (width * height) as usize];
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                cells[(y * width + x) as usize] = Cell::Empty;
            }
        }
        DenseGrid { width, height, cells }
    }

    fn width(&self) -> i32 { self.width }
    fn height(&self) -> i32 { self.height }

    #[inline]
    fn get(&self, pos: Position) -> Cell {
        self.index(pos).map_or(Cell::Wall, |i| self.cells[i])
    }

    #[inline]
    fn set(&mut self, pos: Position, cell: Cell) {
        if let Some(i) = self.index(pos) {
            self.cells[i] = cell;
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Sparse backing
// ══════════════════════════════════════════════════════════════

/// Stores only non-Empty cells. Suits large, mostly open maps.
/// Writing Empty removes the entry, so equal contents compare equal.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SparseGrid {
    width: i32,
    height: i32,
    cells: HashMap<Position, Cell>,
}

impl CellStore for SparseGrid {
    fn walled(w: i32, h: i32) -> Self {
        let width = w.max(0) + 2;
        let height = h.max(0) + 2;
        let mut cells = HashMap::with_capacity(((width + height) * 2) as usize);
        for x in 0..width {
            cells.insert(Position::new(x, 0), Cell::Wall);
            cells.insert(Position::new(x, height - 1), Cell::Wall);
        }
        for y in 1..height - 1 {
            cells.insert(Position::new(0, y), Cell::Wall);
            cells.insert(Position::new(width - 1, y), Cell::Wall);
        }
        SparseGrid { width, height, cells }
    }

    fn width(&self) -> i32 { self.width }
    fn height(&self) -> i32 { self.height }

    fn get(&self, pos: Position) -> Cell {
        if !self.in_bounds(pos) {
            return Cell::Wall;
        }
        self.cells.get(&pos).copied().unwrap_or(Cell::Empty)
    }

    fn set(&mut self, pos: Position, cell: Cell) {
        if !self.in_bounds(pos) {
            return;
        }
        if cell == Cell::Empty {
            self.cells.remove(&pos);
        } else {
            self.cells.insert(pos, cell);
        }
    }
}
