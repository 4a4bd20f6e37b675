//! Per-match world: terrain grid, outpost and static lookup tables

pub mod generate;
pub mod grid;
pub mod kinds;
pub mod parts;
pub mod template;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use generate::{generate, WorldGenError};
pub use grid::{Cell, Position, Side};
pub use kinds::{Consumable, HazardKind, HullKey, ItemKind, Mineral};
pub use parts::{Part, Slot};
pub use template::{Layer, TemplateOverrides, WorldTemplate};

/// Full structural health of the outpost
pub const SPACECO_MAX_HEALTH: u32 = 9;

/// Width of the outpost footprint, centred on its position
const SPACECO_FOOTPRINT: [i64; 3] = [-1, 0, 1];

/// One consumable line in the outpost catalog
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub price: f64,
    pub stock: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpacecoStats {
    pub units_bought: u64,
    pub credits_paid: f64,
    pub fuel_sold: f64,
    pub repairs_sold: f64,
    pub items_sold: u64,
    pub parts_sold: u64,
}

/// The shared trading outpost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spaceco {
    pub position: Position,
    pub health: u32,
    /// Units of each kind bought from players so far
    pub hull: BTreeMap<HullKey, u32>,
    /// Part key -> price
    pub parts: BTreeMap<String, u32>,
    pub items: BTreeMap<Consumable, CatalogItem>,
    pub stats: SpacecoStats,
}

impl Spaceco {
    pub fn new(position: Position, parts: impl IntoIterator<Item = Part>) -> Self {
        let items = [
            (Consumable::Teleporter, CatalogItem { price: 15.0, stock: 3 }),
            (Consumable::RepairNanites, CatalogItem { price: 20.0, stock: 3 }),
            (Consumable::TimedCharge, CatalogItem { price: 10.0, stock: 5 }),
        ]
        .into_iter()
        .collect();

        Self {
            position,
            health: SPACECO_MAX_HEALTH,
            hull: BTreeMap::new(),
            parts: parts.into_iter().map(|p| (p.key(), p.price())).collect(),
            items,
            stats: SpacecoStats::default(),
        }
    }
}

/// Generated environment for one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct World {
    pub template: String,
    pub width: usize,
    pub depth: usize,
    pub air_gap: usize,
    pub safe_depth: usize,
    pub gravity: f64,
    pub hole_chance: f64,
    pub mineral_chance: f64,
    pub random_mineral_chance: f64,
    pub item_chance: f64,
    pub hazard_chance: f64,
    pub layers: Vec<Layer>,
    /// Indexed `[x][y]`
    pub grid: Vec<Vec<Cell>>,
    pub spaceco: Spaceco,
    pub densities: BTreeMap<Mineral, f64>,
    pub ground_effects: BTreeMap<Mineral, String>,
    pub mineral_names: BTreeMap<Mineral, String>,
}

impl World {
    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        grid::in_bounds(x, y, self.width, self.depth)
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.x < self.width && pos.y < self.depth
    }

    pub fn get(&self, pos: Position) -> Option<&Cell> {
        self.grid.get(pos.x).and_then(|col| col.get(pos.y))
    }

    pub fn get_mut(&mut self, pos: Position) -> Option<&mut Cell> {
        self.grid.get_mut(pos.x).and_then(|col| col.get_mut(pos.y))
    }

    pub fn neighbor(&self, pos: Position, side: Side) -> Option<Position> {
        grid::neighbor(pos, side, self.width, self.depth)
    }

    /// Solid ground at `pos`; the outside of the grid counts as solid
    pub fn is_solid(&self, pos: Option<Position>) -> bool {
        match pos.and_then(|p| self.get(p)) {
            Some(cell) => cell.is_solid(),
            None => true,
        }
    }

    pub fn side_is_solid(&self, pos: Position, side: Side) -> bool {
        self.is_solid(self.neighbor(pos, side))
    }

    pub fn density(&self, mineral: Mineral) -> f64 {
        self.densities.get(&mineral).copied().unwrap_or(0.0)
    }

    /// Cargo weight of `count` units of `key`
    pub fn hull_weight(&self, key: HullKey, count: u32) -> f64 {
        let per_unit = if key.is_mineral() { 2000.0 } else { 1000.0 };
        self.density(key.color()) / per_unit * f64::from(count)
    }

    /// Cells directly under the outpost footprint that are inside the grid
    pub fn spaceco_support(&self) -> Vec<Option<Position>> {
        let pos = self.spaceco.position;
        SPACECO_FOOTPRINT
            .iter()
            .map(|dx| pos.offset(*dx, 1, self.width, self.depth))
            .collect()
    }

    pub fn cells_in_radius(&self, center: Position, radius: usize) -> Vec<Position> {
        grid::cells_in_radius(center, radius, self.width, self.depth).collect()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Hand-built worlds for unit tests

    use super::*;

    /// `width` x `depth` world, rows `0..=air_gap` empty, everything below solid white
    pub fn flat_world(width: usize, depth: usize, air_gap: usize) -> World {
        let mut grid = vec![vec![Cell::default(); depth]; width];
        for column in grid.iter_mut() {
            for (y, cell) in column.iter_mut().enumerate() {
                if y > air_gap {
                    *cell = Cell::solid(Mineral::White);
                }
            }
        }
        let template = template::builtin("standard").expect("standard template");
        World {
            template: template.name,
            width,
            depth,
            air_gap,
            safe_depth: air_gap + 1,
            gravity: 9.8,
            hole_chance: 0.0,
            mineral_chance: 0.0,
            random_mineral_chance: 0.0,
            item_chance: 0.0,
            hazard_chance: 0.0,
            layers: template.layers,
            grid,
            spaceco: Spaceco::new(Position::new(1, air_gap), Vec::new()),
            densities: template.densities,
            ground_effects: template.ground_effects,
            mineral_names: template.mineral_names,
        }
    }

    /// World with no ground at all
    pub fn open_world(width: usize, depth: usize) -> World {
        let mut world = flat_world(width, depth, 0);
        for column in world.grid.iter_mut() {
            for cell in column.iter_mut() {
                cell.clear();
            }
        }
        world
    }
}
