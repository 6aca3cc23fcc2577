/// Level codec: map text <-> WorldState.
///
/// ## Map format:
///   ```text
///   <layout rows, top row first>
///   <blank line>
///   Water 1
///   Flooding 8
///   Waterproof 5
///   Growth 15
///   Razors 2
///   Trampoline A targets 1
///   ```
///
/// The layout ends at the first blank line. Its last row is row 1; shorter
/// rows are padded with Empty to the widest one. Metadata is one
/// whitespace-separated key/value pair per line, all of it optional.
///
/// ## Cell legend:
///   '#' = Wall          '*' = Rock         '@' = Lambda rock
///   '\' = Lambda        '.' = Earth        ' ' = Empty
///   'L' = Closed lift   'O' = Open lift    'R' = Robot
///   'W' = Beard         '!' = Razor
///   'A'..'I' = Trampolines    '1'..'9' = Targets

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::domain::cell::Cell;
use crate::domain::grid::{CellStore, Position};
use crate::domain::physics::Flood;
use crate::error::MapError;
use super::world::WorldState;

const DEFAULT_WATER: i32 = 0;
const DEFAULT_FLOODING: i32 = 0;
const DEFAULT_WATERPROOF: i32 = 10;
const DEFAULT_GROWTH: i32 = 25;
const DEFAULT_RAZORS: u32 = 0;

/// Metadata values as read, before they are folded into the world.
struct Metadata {
    water: i32,
    flooding: i32,
    waterproof: i32,
    growth: i32,
    razors: u32,
    links: Vec<(u8, u8)>,
}

impl Default for Metadata {
    fn default() -> Self {
        Metadata {
            water: DEFAULT_WATER,
            flooding: DEFAULT_FLOODING,
            waterproof: DEFAULT_WATERPROOF,
            growth: DEFAULT_GROWTH,
            razors: DEFAULT_RAZORS,
            links: Vec::new(),
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

impl<G: CellStore> WorldState<G> {
    /// Build a world from map text.
    pub fn parse(text: &str) -> Result<Self, MapError> {
        let lines: Vec<&str> = text.lines().collect();
        let start = lines.iter().position(|l| !l.is_empty()).unwrap_or(lines.len());
        let end = lines[start..]
            .iter()
            .position(|l| l.is_empty())
            .map_or(lines.len(), |n| start + n);
        let layout = &lines[start..end];

        let height = layout.len() as i32;
        let width = layout.iter().map(|row| row.chars().count()).max().unwrap_or(0) as i32;
        let mut world = WorldState::<G>::blank(width, height);

        let mut robot = None;
        for (i, row) in layout.iter().enumerate() {
            let y = height - i as i32;
            for (j, ch) in row.chars().enumerate() {
                let pos = Position::new(j as i32 + 1, y);
                let cell = Cell::from_char(ch).ok_or(MapError::InvalidCell {
                    ch,
                    line: start + i + 1,
                    column: j + 1,
                })?;
                match cell {
                    Cell::Robot => {
                        if robot.is_some() {
                            return Err(MapError::MultipleRobots { line: start + i + 1, column: j + 1 });
                        }
                        robot = Some(pos);
                    }
                    c if c.is_lambda_source() => world.total_lambdas += 1,
                    Cell::ClosedLift | Cell::OpenLift => {
                        if let Some(prev) = world.lift {
                            warn!(first = %prev, ignored = %pos, "map has more than one lift");
                        }
                        world.lift = Some(pos);
                    }
                    Cell::Trampoline(t) => {
                        world.teleports.entries.insert(t, pos);
                    }
                    Cell::Target(n) => {
                        world.teleports.targets.insert(n, pos);
                    }
                    _ => {}
                }
                world.grid.set(pos, cell);
            }
        }
        world.robot = robot.ok_or(MapError::MissingRobot)?;

        let meta = parse_metadata(&lines[end..], end)?;
        for &(t, n) in &meta.links {
            if !world.teleports.targets.contains_key(&n) {
                return Err(MapError::UnboundTrampoline {
                    trampoline: Cell::Trampoline(t).to_char(),
                    target: Cell::Target(n).to_char(),
                });
            }
            world.teleports.links.insert(t, n);
        }

        world.flood = Flood::new(meta.water, meta.flooding, meta.waterproof);
        world.growth = meta.growth;
        world.ticks_until_growth = meta.growth;
        world.razors = meta.razors;

        world.normalise_lift();
        world.rebuild_active();

        debug!(
            width, height,
            robot = %world.robot,
            lambdas = world.total_lambdas,
            active = world.active.len(),
            "map parsed"
        );
        Ok(world)
    }

    /// Read and parse a map file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MapError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let world = Self::parse(&text)?;
        info!(path = %path.display(), "map loaded");
        Ok(world)
    }

    /// The layout rows, top first, each terminated by a newline.
    pub fn layout_text(&self) -> String {
        let (w, h) = (self.map_width(), self.map_height());
        let mut out = String::with_capacity(((w + 1) * h).max(0) as usize);
        for y in (1..=h).rev() {
            for x in 1..=w {
                out.push(self.cell(Position::new(x, y)).to_char());
            }
            out.push('\n');
        }
        out
    }

    /// Full map text: layout, blank line, metadata. Parses back to an
    /// equivalent world (history excluded).
    pub fn to_map_text(&self) -> String {
        let mut out = self.layout_text();
        out.push('\n');
        out.push_str(&format!("Water {}\n", self.flood.water));
        out.push_str(&format!("Flooding {}\n", self.flood.flooding));
        out.push_str(&format!("Waterproof {}\n", self.flood.waterproof));
        out.push_str(&format!("Growth {}\n", self.growth));
        out.push_str(&format!("Razors {}\n", self.razors));

        for (&t, &n) in &self.teleports.links {
            let on_map = self
                .teleports
                .entries
                .get(&t)
                .map_or(false, |&p| self.cell(p) == Cell::Trampoline(t));
            if on_map {
                out.push_str(&format!(
                    "Trampoline {} targets {}\n",
                    Cell::Trampoline(t).to_char(),
                    Cell::Target(n).to_char()
                ));
            }
        }
        out
    }
}

impl<G: CellStore> FromStr for WorldState<G> {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<G: CellStore> fmt::Display for WorldState<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_map_text())
    }
}

// ══════════════════════════════════════════════════════════════
// Metadata parsing
// ══════════════════════════════════════════════════════════════

/// `first_line` is the zero-based index of `lines[0]` in the whole text.
fn parse_metadata(lines: &[&str], first_line: usize) -> Result<Metadata, MapError> {
    let mut meta = Metadata::default();

    for (i, raw) in lines.iter().enumerate() {
        let line = first_line + i + 1;
        let words: Vec<&str> = raw.split_whitespace().collect();
        let bad = || MapError::BadMetadata { line, text: raw.to_string() };

        match words.as_slice() {
            [] => {}
            ["Water", v] => meta.water = v.parse().map_err(|_| bad())?,
            ["Flooding", v] => meta.flooding = v.parse().map_err(|_| bad())?,
            ["Waterproof", v] => meta.waterproof = v.parse().map_err(|_| bad())?,
            ["Growth", v] => meta.growth = v.parse().map_err(|_| bad())?,
            ["Razors", v] => meta.razors = v.parse().map_err(|_| bad())?,
            ["Trampoline", t, "targets", n] => {
                let link = single_char(t)
                    .and_then(Cell::from_char)
                    .zip(single_char(n).and_then(Cell::from_char));
                match link {
                    Some((Cell::Trampoline(t), Cell::Target(n))) => meta.links.push((t, n)),
                    _ => return Err(bad()),
                }
            }
            ["Water" | "Flooding" | "Waterproof" | "Growth" | "Razors" | "Trampoline", ..] => {
                return Err(bad());
            }
            [key, ..] => warn!(line, key, "ignoring unknown metadata"),
        }
    }

    Ok(meta)
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
