//! Grid cells and stateless spatial helpers

use serde::{Deserialize, Serialize};

use super::kinds::{HazardKind, ItemKind, Mineral};

/// Logical grid coordinate; y grows downward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Offset by a delta, `None` when the result leaves a `width` x `depth` grid
    pub fn offset(self, dx: i64, dy: i64, width: usize, depth: usize) -> Option<Position> {
        let x = self.x as i64 + dx;
        let y = self.y as i64 + dy;
        if in_bounds(x, y, width, depth) {
            Some(Position::new(x as usize, y as usize))
        } else {
            None
        }
    }

    pub fn delta_to(self, other: Position) -> (i64, i64) {
        (
            other.x as i64 - self.x as i64,
            other.y as i64 - self.y as i64,
        )
    }
}

/// Orthogonal step directions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
    Up,
    Down,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Left, Side::Right, Side::Up, Side::Down];

    pub fn delta(self) -> (i64, i64) {
        match self {
            Side::Left => (-1, 0),
            Side::Right => (1, 0),
            Side::Up => (0, -1),
            Side::Down => (0, 1),
        }
    }
}

pub fn in_bounds(x: i64, y: i64, width: usize, depth: usize) -> bool {
    x >= 0 && y >= 0 && (x as usize) < width && (y as usize) < depth
}

pub fn neighbor(pos: Position, side: Side, width: usize, depth: usize) -> Option<Position> {
    let (dx, dy) = side.delta();
    pos.offset(dx, dy, width, depth)
}

/// True for the 8 cells surrounding `a`
pub fn is_adjacent(a: Position, b: Position) -> bool {
    a != b && chebyshev(a, b) == 1
}

pub fn manhattan(a: Position, b: Position) -> usize {
    a.x.abs_diff(b.x) + a.y.abs_diff(b.y)
}

pub fn chebyshev(a: Position, b: Position) -> usize {
    a.x.abs_diff(b.x).max(a.y.abs_diff(b.y))
}

pub fn within_radius(a: Position, b: Position, radius: usize) -> bool {
    chebyshev(a, b) <= radius
}

/// Every in-bounds cell whose Chebyshev distance to `center` is at most `radius`
pub fn cells_in_radius(
    center: Position,
    radius: usize,
    width: usize,
    depth: usize,
) -> impl Iterator<Item = Position> {
    let x0 = center.x.saturating_sub(radius);
    let y0 = center.y.saturating_sub(radius);
    let x1 = (center.x + radius).min(width.saturating_sub(1));
    let y1 = (center.y + radius).min(depth.saturating_sub(1));
    (x0..=x1).flat_map(move |x| (y0..=y1).map(move |y| Position::new(x, y)))
}

/// Ground occupying a cell; `kind == None` means dug out
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ground {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<Mineral>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: ItemKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hazard {
    pub name: HazardKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Facing>,
}

impl Hazard {
    pub fn new(name: HazardKind) -> Self {
        Self {
            name,
            orientation: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub ground: Ground,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub hazards: Vec<Hazard>,
}

impl Cell {
    pub fn solid(kind: Mineral) -> Self {
        Self {
            ground: Ground { kind: Some(kind) },
            ..Self::default()
        }
    }

    pub fn is_solid(&self) -> bool {
        self.ground.kind.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.is_solid() && self.items.is_empty() && self.hazards.is_empty()
    }

    pub fn has_hazard(&self, kind: HazardKind) -> bool {
        self.hazards.iter().any(|h| h.name == kind)
    }

    pub fn has_lava(&self) -> bool {
        self.has_hazard(HazardKind::Lava)
    }

    pub fn gas(&self) -> Option<HazardKind> {
        self.hazards.iter().map(|h| h.name).find(|k| k.is_gas())
    }

    pub fn fluid(&self) -> Option<HazardKind> {
        self.hazards.iter().map(|h| h.name).find(|k| k.is_fluid())
    }

    /// No ground and no lava or gas
    pub fn is_open_to_fluid(&self) -> bool {
        !self.is_solid() && self.fluid().is_none()
    }

    pub fn has_minerals(&self) -> bool {
        self.items
            .iter()
            .any(|i| matches!(i.name, ItemKind::Mineral(_)))
    }

    pub fn remove_hazard(&mut self, kind: HazardKind) -> bool {
        let before = self.hazards.len();
        self.hazards.retain(|h| h.name != kind);
        self.hazards.len() != before
    }

    pub fn remove_monsters(&mut self) {
        self.hazards.retain(|h| !h.name.is_monster());
    }

    pub fn clear(&mut self) {
        *self = Cell::default();
    }
}
