//! World templates: the tunable input of world generation

use std::collections::BTreeMap;

use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::generate::WorldGenError;
use super::kinds::{Consumable, HazardKind, ItemKind, Mineral};

/// A number, or a `[min, max]` pair sampled once per world
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Fixed(f64),
    Range([f64; 2]),
}

impl Scalar {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Scalar::Fixed(v) => v,
            Scalar::Range([a, b]) => {
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                rng.gen_range(lo..=hi)
            }
        }
    }

    pub fn sample_count<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        match *self {
            Scalar::Fixed(v) => v.max(0.0).round() as usize,
            Scalar::Range([a, b]) => {
                let lo = a.min(b).max(0.0).round() as usize;
                let hi = a.max(b).max(0.0).round() as usize;
                rng.gen_range(lo..=hi)
            }
        }
    }
}

/// How a layer names its ground, hazard or item content
///
/// A bare string is either a concrete name or an alias (`random`, `gas`,
/// `monster`); a list is a uniform pick; a map is a weighted pick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueSpec {
    Named(String),
    List(Vec<String>),
    Weighted(BTreeMap<String, f64>),
}

impl Default for ValueSpec {
    fn default() -> Self {
        ValueSpec::Named(RANDOM.to_string())
    }
}

const RANDOM: &str = "random";

impl ValueSpec {
    fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<String, WorldGenError> {
        match self {
            ValueSpec::Named(name) => Ok(name.clone()),
            ValueSpec::List(names) => names
                .choose(rng)
                .cloned()
                .ok_or(WorldGenError::EmptyValueSpec),
            ValueSpec::Weighted(weights) => {
                let (names, weights): (Vec<&String>, Vec<f64>) =
                    weights.iter().map(|(n, w)| (n, *w)).unzip();
                let index = WeightedIndex::new(&weights).map_err(|_| WorldGenError::EmptyValueSpec)?;
                Ok(names[index.sample(rng)].clone())
            }
        }
    }

    pub fn resolve_ground<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Mineral, WorldGenError> {
        let name = self.pick(rng)?;
        if name == RANDOM {
            return Ok(Mineral::random(rng));
        }
        name.parse().map_err(|_| WorldGenError::UnknownValue(name))
    }

    pub fn resolve_hazard<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<HazardKind, WorldGenError> {
        let name = self.pick(rng)?;
        let pool: &[HazardKind] = match name.as_str() {
            RANDOM => &HazardKind::ALL,
            "gas" => &HazardKind::GASES,
            "monster" => &HazardKind::MONSTERS,
            _ => return name.parse().map_err(|_| WorldGenError::UnknownValue(name)),
        };
        pool.choose(rng).copied().ok_or(WorldGenError::EmptyValueSpec)
    }

    pub fn resolve_item<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<ItemKind, WorldGenError> {
        let name = self.pick(rng)?;
        if name == RANDOM {
            let pick = Consumable::ALL
                .choose(rng)
                .copied()
                .ok_or(WorldGenError::EmptyValueSpec)?;
            return Ok(ItemKind::Consumable(pick));
        }
        name.parse().map_err(|_| WorldGenError::UnknownValue(name))
    }
}

/// Depth band of a template; chances here pin absolute values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub ground: ValueSpec,
    #[serde(default)]
    pub hazards: ValueSpec,
    #[serde(default)]
    pub items: ValueSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hole_chance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mineral_chance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random_mineral_chance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_chance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hazard_chance: Option<f64>,
}

impl Layer {
    pub fn with_ground(ground: ValueSpec) -> Self {
        Self {
            ground,
            hazards: ValueSpec::default(),
            items: ValueSpec::default(),
            hole_chance: None,
            mineral_chance: None,
            random_mineral_chance: None,
            item_chance: None,
            hazard_chance: None,
        }
    }
}

/// Full description of a kind of world; chances are percentages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldTemplate {
    pub name: String,
    pub width: Scalar,
    pub depth: Scalar,
    pub air_gap: Scalar,
    pub safe_depth: Scalar,
    pub gravity: Scalar,
    pub part_count: Scalar,
    pub hole_chance: f64,
    pub mineral_chance: f64,
    pub random_mineral_chance: f64,
    pub item_chance: f64,
    pub hazard_chance: f64,
    pub layers: Vec<Layer>,
    pub densities: BTreeMap<Mineral, f64>,
    #[serde(default)]
    pub ground_effects: BTreeMap<Mineral, String>,
    #[serde(default)]
    pub mineral_names: BTreeMap<Mineral, String>,
}

/// Per-match adjustments applied on top of a named template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateOverrides {
    pub width: Option<Scalar>,
    pub depth: Option<Scalar>,
    pub air_gap: Option<Scalar>,
    pub safe_depth: Option<Scalar>,
    pub gravity: Option<Scalar>,
    pub part_count: Option<Scalar>,
    pub hole_chance: Option<f64>,
    pub mineral_chance: Option<f64>,
    pub random_mineral_chance: Option<f64>,
    pub item_chance: Option<f64>,
    pub hazard_chance: Option<f64>,
    pub layers: Option<Vec<Layer>>,
    pub densities: Option<BTreeMap<Mineral, f64>>,
}

impl TemplateOverrides {
    pub fn apply(&self, mut template: WorldTemplate) -> WorldTemplate {
        macro_rules! pin {
            ($($field:ident),*) => {
                $(if let Some(v) = &self.$field { template.$field = v.clone(); })*
            };
        }
        pin!(
            width,
            depth,
            air_gap,
            safe_depth,
            gravity,
            part_count,
            hole_chance,
            mineral_chance,
            random_mineral_chance,
            item_chance,
            hazard_chance,
            layers,
            densities
        );
        template
    }
}

fn default_densities() -> BTreeMap<Mineral, f64> {
    [
        (Mineral::White, 100.0),
        (Mineral::Orange, 120.0),
        (Mineral::Yellow, 140.0),
        (Mineral::Green, 160.0),
        (Mineral::Teal, 180.0),
        (Mineral::Blue, 200.0),
        (Mineral::Purple, 250.0),
        (Mineral::Pink, 300.0),
        (Mineral::Red, 350.0),
        (Mineral::Black, 400.0),
    ]
    .into_iter()
    .collect()
}

fn default_mineral_names() -> BTreeMap<Mineral, String> {
    [
        (Mineral::White, "Quartzite"),
        (Mineral::Orange, "Ochrium"),
        (Mineral::Yellow, "Sulfurite"),
        (Mineral::Green, "Verdite"),
        (Mineral::Teal, "Cyanite"),
        (Mineral::Blue, "Cobaltine"),
        (Mineral::Purple, "Amethine"),
        (Mineral::Pink, "Rhodonite"),
        (Mineral::Red, "Rubium"),
        (Mineral::Black, "Obsidium"),
    ]
    .into_iter()
    .map(|(m, n)| (m, n.to_string()))
    .collect()
}

fn default_ground_effects() -> BTreeMap<Mineral, String> {
    [
        (Mineral::Black, "hard"),
        (Mineral::Red, "hot"),
        (Mineral::Teal, "slippery"),
    ]
    .into_iter()
    .map(|(m, e)| (m, e.to_string()))
    .collect()
}

fn names(list: &[&str]) -> ValueSpec {
    ValueSpec::List(list.iter().map(|s| s.to_string()).collect())
}

fn weighted(list: &[(&str, f64)]) -> ValueSpec {
    ValueSpec::Weighted(list.iter().map(|(s, w)| (s.to_string(), *w)).collect())
}

/// Templates shipped with the server
pub fn builtin(name: &str) -> Option<WorldTemplate> {
    match name {
        "standard" => Some(WorldTemplate {
            name: "standard".to_string(),
            width: Scalar::Range([24.0, 32.0]),
            depth: Scalar::Range([50.0, 60.0]),
            air_gap: Scalar::Fixed(2.0),
            safe_depth: Scalar::Range([6.0, 9.0]),
            gravity: Scalar::Fixed(9.8),
            part_count: Scalar::Range([6.0, 12.0]),
            hole_chance: 30.0,
            mineral_chance: 20.0,
            random_mineral_chance: 10.0,
            item_chance: 10.0,
            hazard_chance: 25.0,
            layers: vec![
                Layer {
                    hazards: ValueSpec::Named("monster".to_string()),
                    ..Layer::with_ground(names(&["white", "orange", "yellow"]))
                },
                Layer::with_ground(weighted(&[("green", 3.0), ("teal", 2.0), ("blue", 1.0)])),
                Layer {
                    hazards: ValueSpec::Named("gas".to_string()),
                    ..Layer::with_ground(names(&["blue", "purple", "pink"]))
                },
                Layer {
                    hazards: weighted(&[("lava", 3.0), ("gas", 1.0), ("monster", 1.0)]),
                    ..Layer::with_ground(ValueSpec::Named("random".to_string()))
                },
            ],
            densities: default_densities(),
            ground_effects: default_ground_effects(),
            mineral_names: default_mineral_names(),
        }),
        "caverns" => Some(WorldTemplate {
            name: "caverns".to_string(),
            width: Scalar::Range([30.0, 40.0]),
            depth: Scalar::Range([40.0, 50.0]),
            air_gap: Scalar::Fixed(3.0),
            safe_depth: Scalar::Fixed(6.0),
            gravity: Scalar::Fixed(7.5),
            part_count: Scalar::Range([8.0, 14.0]),
            hole_chance: 55.0,
            mineral_chance: 25.0,
            random_mineral_chance: 20.0,
            item_chance: 15.0,
            hazard_chance: 35.0,
            layers: vec![
                Layer::with_ground(names(&["white", "teal"])),
                Layer {
                    hazards: ValueSpec::Named("gas".to_string()),
                    hazard_chance: Some(20.0),
                    ..Layer::with_ground(ValueSpec::Named("random".to_string()))
                },
                Layer {
                    hazards: weighted(&[("lava", 1.0), ("noxious_gas", 2.0)]),
                    ..Layer::with_ground(names(&["purple", "red", "black"]))
                },
            ],
            densities: default_densities(),
            ground_effects: default_ground_effects(),
            mineral_names: default_mineral_names(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn scalar_parses_number_or_pair() {
        let fixed: Scalar = serde_json::from_str("12").unwrap();
        assert_eq!(fixed, Scalar::Fixed(12.0));
        let range: Scalar = serde_json::from_str("[3, 5]").unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let n = range.sample_count(&mut rng);
            assert!((3..=5).contains(&n));
        }
    }

    #[test]
    fn aliases_resolve_to_concrete_hazards() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..50 {
            assert!(ValueSpec::Named("gas".into()).resolve_hazard(&mut rng).unwrap().is_gas());
            assert!(ValueSpec::Named("monster".into())
                .resolve_hazard(&mut rng)
                .unwrap()
                .is_monster());
        }
        assert_eq!(
            ValueSpec::Named("lava".into()).resolve_hazard(&mut rng).unwrap(),
            HazardKind::Lava
        );
        assert!(ValueSpec::Named("acid".into()).resolve_hazard(&mut rng).is_err());
    }

    #[test]
    fn weighted_pick_never_returns_zero_weight() {
        let spec = weighted(&[("red", 1.0), ("blue", 0.0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..100 {
            assert_eq!(spec.resolve_ground(&mut rng).unwrap(), Mineral::Red);
        }
    }

    #[test]
    fn overrides_pin_fields() {
        let template = builtin("standard").unwrap();
        let overrides = TemplateOverrides {
            width: Some(Scalar::Fixed(10.0)),
            hole_chance: Some(0.0),
            ..TemplateOverrides::default()
        };
        let pinned = overrides.apply(template.clone());
        assert_eq!(pinned.width, Scalar::Fixed(10.0));
        assert_eq!(pinned.hole_chance, 0.0);
        assert_eq!(pinned.depth, template.depth);
    }
}
