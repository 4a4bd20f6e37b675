//! World generation from a template and a random source

use rand::Rng;
use tracing::debug;

use super::grid::{Cell, Hazard, Item, Position};
use super::kinds::ItemKind;
use super::parts::Part;
use super::template::{Layer, WorldTemplate};
use super::{Spaceco, World};

/// World generation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldGenError {
    #[error("world must be between 3x3 and {}x{}, got {width}x{depth}", MAX_WIDTH, MAX_DEPTH)]
    InvalidDimensions { width: usize, depth: usize },

    #[error("outpost catalog asks for {requested} parts, only {available} exist")]
    TooManyParts { requested: usize, available: usize },

    #[error("template has no layers")]
    NoLayers,

    #[error("unknown world template: {0}")]
    UnknownTemplate(String),

    #[error("unknown value in template: {0}")]
    UnknownValue(String),

    #[error("template value list is empty")]
    EmptyValueSpec,
}

/// Largest world a template may produce
pub const MAX_WIDTH: usize = 256;
pub const MAX_DEPTH: usize = 1024;

/// Percentage roll
fn roll<R: Rng + ?Sized>(rng: &mut R, chance: f64) -> bool {
    chance > 0.0 && rng.gen_range(0.0..100.0) < chance
}

/// Effective chances for one row: a layer pin wins, otherwise scaled by depth
struct RowChances {
    hole: f64,
    mineral: f64,
    random_mineral: f64,
    item: f64,
    hazard: f64,
}

impl RowChances {
    fn new(template: &WorldTemplate, layer: &Layer, depth_percent: f64) -> Self {
        let scaled = |pinned: Option<f64>, default: f64| pinned.unwrap_or(depth_percent * default);
        Self {
            hole: scaled(layer.hole_chance, template.hole_chance),
            mineral: scaled(layer.mineral_chance, template.mineral_chance),
            random_mineral: scaled(layer.random_mineral_chance, template.random_mineral_chance),
            item: scaled(layer.item_chance, template.item_chance),
            hazard: scaled(layer.hazard_chance, template.hazard_chance),
        }
    }
}

/// Build a world from `template`
pub fn generate<R: Rng + ?Sized>(
    template: &WorldTemplate,
    rng: &mut R,
) -> Result<World, WorldGenError> {
    if template.layers.is_empty() {
        return Err(WorldGenError::NoLayers);
    }

    let air_gap = template.air_gap.sample_count(rng);
    let safe_depth = template.safe_depth.sample_count(rng);
    let width = template.width.sample_count(rng);
    let depth = template.depth.sample_count(rng);
    let gravity = template.gravity.sample(rng);
    let part_count = template.part_count.sample_count(rng);

    if !(3..=MAX_WIDTH).contains(&width) || !(3..=MAX_DEPTH).contains(&depth) {
        return Err(WorldGenError::InvalidDimensions { width, depth });
    }
    // keep at least one row of ground under the surface
    let air_gap = air_gap.min(depth - 2);

    let parts = Part::catalog(rng, part_count).ok_or_else(|| WorldGenError::TooManyParts {
        requested: part_count,
        available: Part::all().len(),
    })?;
    let spaceco = Spaceco::new(Position::new(rng.gen_range(1..=width - 2), air_gap), parts);

    let layer_count = template.layers.len();
    let mut grid = vec![vec![Cell::default(); depth]; width];
    for column in grid.iter_mut() {
        for (y, cell) in column.iter_mut().enumerate() {
            if y <= air_gap {
                continue;
            }
            let depth_percent = y as f64 / depth as f64;
            let layer_index = ((depth_percent * layer_count as f64).floor() as usize).min(layer_count - 1);
            let layer = &template.layers[layer_index];
            let chances = RowChances::new(template, layer, depth_percent);
            *cell = roll_cell(layer, &chances, y >= safe_depth, rng)?;
        }
    }

    let filled = settle_fluids(&mut grid, air_gap);
    debug!(width, depth, air_gap, filled, template = %template.name, "World generated");

    Ok(World {
        template: template.name.clone(),
        width,
        depth,
        air_gap,
        safe_depth,
        gravity,
        hole_chance: template.hole_chance,
        mineral_chance: template.mineral_chance,
        random_mineral_chance: template.random_mineral_chance,
        item_chance: template.item_chance,
        hazard_chance: template.hazard_chance,
        layers: template.layers.clone(),
        grid,
        spaceco,
        densities: template.densities.clone(),
        ground_effects: template.ground_effects.clone(),
        mineral_names: template.mineral_names.clone(),
    })
}

fn roll_cell<R: Rng + ?Sized>(
    layer: &Layer,
    chances: &RowChances,
    holes_allowed: bool,
    rng: &mut R,
) -> Result<Cell, WorldGenError> {
    let is_hole = holes_allowed && roll(rng, chances.hole);

    if !is_hole {
        let kind = layer.ground.resolve_ground(rng)?;
        let mut cell = Cell::solid(kind);
        if roll(rng, chances.mineral) {
            let count = rng.gen_range(1..=4);
            let color = if roll(rng, chances.random_mineral) {
                kind.random_other(rng)
            } else {
                kind
            };
            cell.items = (0..count)
                .map(|_| Item {
                    name: ItemKind::Mineral(color),
                })
                .collect();
        }
        return Ok(cell);
    }

    let mut cell = Cell::default();
    if roll(rng, chances.hazard) {
        cell.hazards.push(Hazard::new(layer.hazards.resolve_hazard(rng)?));
    } else if roll(rng, chances.item) {
        cell.items.push(Item {
            name: layer.items.resolve_item(rng)?,
        });
    }
    Ok(cell)
}

/// Close single-cell gaps around lava and gas below the air gap.
///
/// Empty cells inherit from a left or upper fluid neighbour; a fluid cell
/// back-fills an empty left neighbour. Repeats until nothing changes and
/// returns the number of filled cells.
fn settle_fluids(grid: &mut [Vec<Cell>], air_gap: usize) -> usize {
    let width = grid.len();
    let depth = grid.first().map_or(0, Vec::len);
    let mut filled = 0;

    loop {
        let mut changed = false;
        for x in 0..width {
            for y in (air_gap + 1)..depth {
                if grid[x][y].is_empty() {
                    let left = if x > 0 { grid[x - 1][y].fluid() } else { None };
                    let above = grid[x][y - 1].fluid();
                    if let Some(kind) = left.or(above) {
                        grid[x][y].hazards.push(Hazard::new(kind));
                        filled += 1;
                        changed = true;
                    }
                } else if let Some(kind) = grid[x][y].fluid() {
                    if x > 0 && grid[x - 1][y].is_empty() {
                        grid[x - 1][y].hazards.push(Hazard::new(kind));
                        filled += 1;
                        changed = true;
                    }
                }
            }
        }
        if !changed {
            return filled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::template::{builtin, Scalar, TemplateOverrides, ValueSpec};
    use crate::world::SPACECO_MAX_HEALTH;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn sized(width: f64, depth: f64, overrides: TemplateOverrides) -> WorldTemplate {
        TemplateOverrides {
            width: Some(Scalar::Fixed(width)),
            depth: Some(Scalar::Fixed(depth)),
            ..overrides
        }
        .apply(builtin("standard").unwrap())
    }

    #[test]
    fn no_holes_means_solid_below_air_gap() {
        let template = sized(
            10.0,
            20.0,
            TemplateOverrides {
                hole_chance: Some(0.0),
                ..TemplateOverrides::default()
            },
        );
        let world = generate(&template, &mut ChaCha8Rng::seed_from_u64(11)).unwrap();

        assert_eq!((world.width, world.depth), (10, 20));
        for x in 0..world.width {
            for y in 0..world.depth {
                let cell = &world.grid[x][y];
                assert!(cell.hazards.is_empty());
                if y > world.air_gap {
                    assert!(cell.ground.kind.is_some(), "({x},{y}) should be solid");
                } else {
                    assert!(cell.is_empty());
                }
            }
        }
    }

    #[test]
    fn cells_have_one_role_and_no_fluid_gaps() {
        let template = sized(
            24.0,
            40.0,
            TemplateOverrides {
                hole_chance: Some(80.0),
                hazard_chance: Some(60.0),
                item_chance: Some(50.0),
                ..TemplateOverrides::default()
            },
        );

        for seed in 0..8 {
            let world = generate(&template, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap();
            for x in 0..world.width {
                for y in (world.air_gap + 1)..world.depth {
                    let cell = &world.grid[x][y];
                    if cell.is_solid() {
                        assert!(cell.hazards.is_empty());
                    } else if !cell.hazards.is_empty() {
                        assert!(cell.items.is_empty());
                    }

                    if cell.is_empty() {
                        if x > 0 {
                            assert!(world.grid[x - 1][y].fluid().is_none(), "gap at ({x},{y})");
                        }
                        assert!(world.grid[x][y - 1].fluid().is_none(), "gap at ({x},{y})");
                    }
                    if cell.fluid().is_some() && x > 0 {
                        assert!(!world.grid[x - 1][y].is_empty(), "gap left of ({x},{y})");
                    }
                }
            }
        }
    }

    #[test]
    fn same_seed_same_world() {
        let template = builtin("caverns").unwrap();
        let a = generate(&template, &mut ChaCha8Rng::seed_from_u64(99)).unwrap();
        let b = generate(&template, &mut ChaCha8Rng::seed_from_u64(99)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn outpost_sits_inside_margin_on_surface() {
        let template = builtin("standard").unwrap();
        for seed in 0..20 {
            let world = generate(&template, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap();
            let pos = world.spaceco.position;
            assert!(pos.x >= 1 && pos.x <= world.width - 2);
            assert_eq!(pos.y, world.air_gap);
            assert_eq!(world.spaceco.health, SPACECO_MAX_HEALTH);
            assert!(!world.spaceco.parts.is_empty());
        }
    }

    #[test]
    fn rejects_out_of_range_worlds_and_missing_layers() {
        let tiny = sized(2.0, 20.0, TemplateOverrides::default());
        assert_eq!(
            generate(&tiny, &mut ChaCha8Rng::seed_from_u64(0)),
            Err(WorldGenError::InvalidDimensions { width: 2, depth: 20 })
        );

        let huge = sized(60000.0, 60000.0, TemplateOverrides::default());
        assert_eq!(
            generate(&huge, &mut ChaCha8Rng::seed_from_u64(0)),
            Err(WorldGenError::InvalidDimensions { width: 60000, depth: 60000 })
        );
        let too_deep = sized(10.0, (MAX_DEPTH + 1) as f64, TemplateOverrides::default());
        assert!(matches!(
            generate(&too_deep, &mut ChaCha8Rng::seed_from_u64(0)),
            Err(WorldGenError::InvalidDimensions { .. })
        ));

        let no_layers = TemplateOverrides {
            layers: Some(Vec::new()),
            ..TemplateOverrides::default()
        }
        .apply(builtin("standard").unwrap());
        assert_eq!(
            generate(&no_layers, &mut ChaCha8Rng::seed_from_u64(0)),
            Err(WorldGenError::NoLayers)
        );
    }

    #[test]
    fn pinned_layer_chance_beats_depth_scaling() {
        let mut layer = Layer::with_ground(ValueSpec::Named("red".into()));
        layer.mineral_chance = Some(100.0);
        layer.random_mineral_chance = Some(0.0);
        let template = sized(
            5.0,
            10.0,
            TemplateOverrides {
                hole_chance: Some(0.0),
                layers: Some(vec![layer]),
                ..TemplateOverrides::default()
            },
        );
        let world = generate(&template, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();
        for x in 0..world.width {
            for y in (world.air_gap + 1)..world.depth {
                let cell = &world.grid[x][y];
                assert!((1..=4).contains(&cell.items.len()));
                assert!(cell
                    .items
                    .iter()
                    .all(|i| i.name == ItemKind::Mineral(crate::world::Mineral::Red)));
            }
        }
    }

    #[test]
    fn outpost_catalog_holds_exactly_part_count() {
        let template = sized(
            10.0,
            20.0,
            TemplateOverrides {
                part_count: Some(Scalar::Fixed(40.0)),
                ..TemplateOverrides::default()
            },
        );
        for seed in 0..4 {
            let world = generate(&template, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap();
            assert_eq!(world.spaceco.parts.len(), 40);
        }

        let greedy = sized(
            10.0,
            20.0,
            TemplateOverrides {
                part_count: Some(Scalar::Fixed(1.0e9)),
                ..TemplateOverrides::default()
            },
        );
        assert!(matches!(
            generate(&greedy, &mut ChaCha8Rng::seed_from_u64(0)),
            Err(WorldGenError::TooManyParts { requested: 1_000_000_000, .. })
        ));
    }
}
