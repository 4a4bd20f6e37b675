//! Player record, rig configuration and derived capabilities

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::world::grid::Facing;
use crate::world::{Consumable, HullKey, Part, Position, Slot, World};

pub const STARTING_CREDITS: f64 = 20.0;

/// Facing of a player's rig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Left,
    Right,
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
    UpLeftAngle,
    UpRightAngle,
    DownLeftAngle,
    DownRightAngle,
}

impl Orientation {
    /// Horizontal side the rig is leaning on
    pub fn side(self) -> Facing {
        match self {
            Orientation::Left
            | Orientation::UpLeft
            | Orientation::DownLeft
            | Orientation::UpLeftAngle
            | Orientation::DownLeftAngle => Facing::Left,
            Orientation::Right
            | Orientation::UpRight
            | Orientation::DownRight
            | Orientation::UpRightAngle
            | Orientation::DownRightAngle => Facing::Right,
        }
    }

    pub fn vertical(up: bool, side: Facing, angled: bool) -> Self {
        match (up, side, angled) {
            (true, Facing::Left, false) => Orientation::UpLeft,
            (true, Facing::Right, false) => Orientation::UpRight,
            (false, Facing::Left, false) => Orientation::DownLeft,
            (false, Facing::Right, false) => Orientation::DownRight,
            (true, Facing::Left, true) => Orientation::UpLeftAngle,
            (true, Facing::Right, true) => Orientation::UpRightAngle,
            (false, Facing::Left, true) => Orientation::DownLeftAngle,
            (false, Facing::Right, true) => Orientation::DownRightAngle,
        }
    }
}

/// One contractor in a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub position: Position,
    pub orientation: Orientation,
    pub configuration: BTreeMap<Slot, Part>,

    // Derived from configuration
    pub max_health: f64,
    pub max_fuel: f64,
    pub max_cargo: f64,
    pub drill_strength: f64,

    pub health: f64,
    pub fuel: f64,
    /// Cached weight of `hull`, clamped to `max_cargo`
    pub cargo: f64,
    pub credits: f64,
    pub hull: BTreeMap<HullKey, u32>,
    pub items: BTreeMap<Consumable, u32>,
    pub moving: bool,
}

impl Player {
    pub fn new(id: Uuid, name: String, position: Position) -> Self {
        let mut player = Self {
            id,
            name,
            position,
            orientation: Orientation::Right,
            configuration: Slot::ALL
                .into_iter()
                .map(|slot| (slot, Part::starter(slot)))
                .collect(),
            max_health: 0.0,
            max_fuel: 0.0,
            max_cargo: 0.0,
            drill_strength: 0.0,
            health: 0.0,
            fuel: 0.0,
            cargo: 0.0,
            credits: STARTING_CREDITS,
            hull: BTreeMap::new(),
            items: BTreeMap::new(),
            moving: false,
        };
        player.recompute_caps();
        player.health = player.max_health;
        player.fuel = player.max_fuel;
        player
    }

    pub fn part(&self, slot: Slot) -> Part {
        self.configuration
            .get(&slot)
            .copied()
            .unwrap_or(Part::starter(slot))
    }

    /// Fit `part` into its slot and return what it replaced
    pub fn equip(&mut self, part: Part) -> Part {
        let old = self.part(part.slot);
        self.configuration.insert(part.slot, part);
        self.recompute_caps();
        old
    }

    /// Recompute caps from the configuration and clamp pools to them
    pub fn recompute_caps(&mut self) {
        self.drill_strength = self.part(Slot::Drill).rating();
        self.max_health = self.part(Slot::Hull).rating();
        self.max_fuel = self.part(Slot::FuelTank).rating();
        self.max_cargo = self.part(Slot::CargoBay).rating();
        self.health = self.health.clamp(0.0, self.max_health);
        self.fuel = self.fuel.clamp(0.0, self.max_fuel);
        self.cargo = self.cargo.clamp(0.0, self.max_cargo);
    }

    pub fn recompute_cargo(&mut self, world: &World) {
        let weight: f64 = self
            .hull
            .iter()
            .map(|(key, count)| world.hull_weight(*key, *count))
            .sum();
        self.cargo = weight.clamp(0.0, self.max_cargo);
    }

    pub fn is_cargo_full(&self) -> bool {
        self.cargo >= self.max_cargo
    }

    /// Subtract health, never below zero; returns the damage actually taken
    pub fn apply_damage(&mut self, amount: f64) -> f64 {
        let before = self.health;
        self.health = (self.health - amount.max(0.0)).max(0.0);
        before - self.health
    }

    pub fn add_to_hull(&mut self, key: HullKey, count: u32) {
        *self.hull.entry(key).or_insert(0) += count;
    }

    pub fn add_item(&mut self, item: Consumable) {
        *self.items.entry(item).or_insert(0) += 1;
    }

    /// Remove one `item`; false when none is held
    pub fn take_item(&mut self, item: Consumable) -> bool {
        match self.items.get_mut(&item) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    self.items.remove(&item);
                }
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::parts::{Material, Subtype};
    use crate::world::testing::flat_world;
    use crate::world::Mineral;

    fn player() -> Player {
        Player::new(Uuid::new_v4(), "ada".into(), Position::new(1, 1))
    }

    #[test]
    fn new_player_starts_full() {
        let p = player();
        assert_eq!(p.health, p.max_health);
        assert_eq!(p.fuel, p.max_fuel);
        assert_eq!(p.cargo, 0.0);
        assert_eq!(p.credits, STARTING_CREDITS);
        assert_eq!(p.configuration.len(), Slot::ALL.len());
    }

    #[test]
    fn equip_replaces_one_slot_and_recomputes_caps() {
        let mut p = player();
        let tank = Part::new(Slot::FuelTank, Material::Iron, Subtype::Standard);
        let old = p.equip(tank);
        assert_eq!(old, Part::starter(Slot::FuelTank));
        assert_eq!(p.max_fuel, 30.0);
        assert_eq!(p.part(Slot::Drill), Part::starter(Slot::Drill));

        let light_hull = Part::new(Slot::Hull, Material::Tin, Subtype::Light);
        p.equip(light_hull);
        assert!(p.health <= p.max_health);
    }

    #[test]
    fn cargo_is_clamped_weight_of_hull() {
        let world = flat_world(5, 5, 1);
        let mut p = player();
        p.add_to_hull(HullKey::Ground(Mineral::White), 10);
        p.add_to_hull(HullKey::Mineral(Mineral::White), 10);
        p.recompute_cargo(&world);
        assert!((p.cargo - (1.0 + 0.5)).abs() < 1e-9);

        p.add_to_hull(HullKey::Ground(Mineral::Black), 1000);
        p.recompute_cargo(&world);
        assert_eq!(p.cargo, p.max_cargo);
        assert!(p.is_cargo_full());
    }

    #[test]
    fn damage_never_goes_negative() {
        let mut p = player();
        let taken = p.apply_damage(p.max_health + 50.0);
        assert_eq!(p.health, 0.0);
        assert_eq!(taken, p.max_health);
    }

    #[test]
    fn items_are_counted() {
        let mut p = player();
        assert!(!p.take_item(Consumable::Teleporter));
        p.add_item(Consumable::Teleporter);
        p.add_item(Consumable::Teleporter);
        assert!(p.take_item(Consumable::Teleporter));
        assert_eq!(p.items.get(&Consumable::Teleporter), Some(&1));
    }
}
