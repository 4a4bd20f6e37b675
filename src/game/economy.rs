//! Outpost trading, consumables and structural settling

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::world::grid::within_radius;
use crate::world::{Consumable, Part, Position, Side, SPACECO_MAX_HEALTH};

use super::error::GameError;
use super::events::GameEvent;
use super::hazards::HazardSystem;
use super::r#match::MatchState;
use super::{Delay, Outcome, Task};

/// Players must be this close to the outpost to trade
pub const TRADE_RADIUS: usize = 2;
pub const FUEL_PRICE: f64 = 0.9;
pub const REPAIR_PRICE: f64 = 1.3;
pub const OUTPOST_REPAIR_PRICE: f64 = 10.0;
pub const MINERAL_PRICE_BASE: f64 = 800.0;
pub const GROUND_PRICE_BASE: f64 = 1600.0;
pub const MIN_UNIT_PRICE: f64 = 0.01;
pub const CHARGE_RADIUS: usize = 2;
pub const CHARGE_OUTPOST_DAMAGE: u32 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairTarget {
    #[default]
    Player,
    Outpost,
}

/// Price of one more unit when the outpost has already bought `sold`
pub fn unit_price(density: f64, base: f64, sold: u32) -> f64 {
    (density / (base + f64::from(sold))).max(MIN_UNIT_PRICE)
}

pub struct EconomySystem;

impl EconomySystem {
    fn ensure_near_outpost(state: &MatchState, player_id: Uuid) -> Result<(), GameError> {
        let player = state.player(player_id)?;
        if !within_radius(player.position, state.world.spaceco.position, TRADE_RADIUS) {
            return Err(GameError::NotAtOutpost);
        }
        Ok(())
    }

    fn ensure_open(state: &MatchState, player_id: Uuid) -> Result<(), GameError> {
        Self::ensure_near_outpost(state, player_id)?;
        if state.world.spaceco.health == 0 {
            return Err(GameError::OutpostDestroyed);
        }
        Ok(())
    }

    fn spaceco_update(state: &MatchState) -> GameEvent {
        let spaceco = &state.world.spaceco;
        GameEvent::SpacecoUpdate {
            health: spaceco.health,
            parts: spaceco.parts.clone(),
            items: spaceco.items.clone(),
        }
    }

    /// Sell the whole hull, each unit priced against what the outpost already holds
    pub fn sell(state: &mut MatchState, player_id: Uuid) -> Result<Outcome, GameError> {
        Self::ensure_open(state, player_id)?;
        let world = &mut state.world;
        let player = state
            .players
            .get_mut(&player_id)
            .ok_or(GameError::UnknownPlayer)?;
        if player.hull.is_empty() {
            return Err(GameError::NothingToSell);
        }

        let mut gain = 0.0;
        let mut units = 0u32;
        for (key, count) in std::mem::take(&mut player.hull) {
            let density = world.density(key.color());
            let base = if key.is_mineral() {
                MINERAL_PRICE_BASE
            } else {
                GROUND_PRICE_BASE
            };
            let sold = world.spaceco.hull.entry(key).or_insert(0);
            for _ in 0..count {
                gain += unit_price(density, base, *sold);
                *sold += 1;
            }
            units += count;
        }

        player.credits += gain;
        player.recompute_cargo(world);
        world.spaceco.stats.units_bought += u64::from(units);
        world.spaceco.stats.credits_paid += gain;
        info!(match_id = %state.id, player_id = %player_id, units, gain, "Hull sold");

        let mut outcome = Outcome::event(GameEvent::SpacecoSale {
            player_id,
            units,
            gain,
            credits: player.credits,
        });
        outcome.emit(GameEvent::PlayerUpdate {
            player: player.clone(),
        });
        Ok(outcome)
    }

    /// Buy fuel; `None` tops up the tank
    pub fn refuel(
        state: &mut MatchState,
        player_id: Uuid,
        amount: Option<f64>,
    ) -> Result<Outcome, GameError> {
        Self::ensure_open(state, player_id)?;
        let player = state.player_mut(player_id)?;
        let missing = player.max_fuel - player.fuel;
        let quantity = purchase_quantity(missing, amount)?;
        let cost = quantity * FUEL_PRICE;
        if player.credits < cost {
            return Err(GameError::InsufficientCredits {
                need: cost,
                have: player.credits,
            });
        }

        player.credits -= cost;
        player.fuel = (player.fuel + quantity).min(player.max_fuel);
        let player = player.clone();
        state.world.spaceco.stats.fuel_sold += quantity;
        Ok(Outcome::event(GameEvent::PlayerUpdate { player }))
    }

    /// Repair the player's rig, or pay to rebuild the outpost
    pub fn repair(
        state: &mut MatchState,
        player_id: Uuid,
        amount: Option<f64>,
        target: RepairTarget,
    ) -> Result<Outcome, GameError> {
        match target {
            RepairTarget::Player => Self::repair_player(state, player_id, amount),
            RepairTarget::Outpost => Self::repair_outpost(state, player_id, amount),
        }
    }

    fn repair_player(
        state: &mut MatchState,
        player_id: Uuid,
        amount: Option<f64>,
    ) -> Result<Outcome, GameError> {
        Self::ensure_open(state, player_id)?;
        let player = state.player_mut(player_id)?;
        let missing = player.max_health - player.health;
        let quantity = purchase_quantity(missing, amount)?;
        let cost = quantity * REPAIR_PRICE;
        if player.credits < cost {
            return Err(GameError::InsufficientCredits {
                need: cost,
                have: player.credits,
            });
        }

        player.credits -= cost;
        player.health = (player.health + quantity).min(player.max_health);
        let player = player.clone();
        state.world.spaceco.stats.repairs_sold += quantity;
        Ok(Outcome::event(GameEvent::PlayerUpdate { player }))
    }

    /// Outpost repairs are allowed even when it is destroyed
    fn repair_outpost(
        state: &mut MatchState,
        player_id: Uuid,
        amount: Option<f64>,
    ) -> Result<Outcome, GameError> {
        Self::ensure_near_outpost(state, player_id)?;
        let missing = f64::from(SPACECO_MAX_HEALTH - state.world.spaceco.health.min(SPACECO_MAX_HEALTH));
        let quantity = purchase_quantity(missing, amount.map(f64::floor))?;
        let cost = quantity * OUTPOST_REPAIR_PRICE;
        let player = state.player_mut(player_id)?;
        if player.credits < cost {
            return Err(GameError::InsufficientCredits {
                need: cost,
                have: player.credits,
            });
        }

        player.credits -= cost;
        let player = player.clone();
        let spaceco = &mut state.world.spaceco;
        spaceco.health = (spaceco.health + quantity as u32).min(SPACECO_MAX_HEALTH);
        spaceco.stats.repairs_sold += quantity;
        info!(match_id = %state.id, player_id = %player_id, health = spaceco.health, "Outpost repaired");

        let mut outcome = Outcome::event(Self::spaceco_update(state));
        outcome.emit(GameEvent::PlayerUpdate { player });
        Ok(outcome)
    }

    pub fn buy_item(state: &mut MatchState, player_id: Uuid, name: &str) -> Result<Outcome, GameError> {
        Self::ensure_open(state, player_id)?;
        let item: Consumable = name
            .parse()
            .map_err(|_| GameError::UnknownItem(name.to_string()))?;
        let listing = *state
            .world
            .spaceco
            .items
            .get(&item)
            .ok_or_else(|| GameError::UnknownItem(name.to_string()))?;
        if listing.stock == 0 {
            return Err(GameError::OutOfStock);
        }
        let player = state.player_mut(player_id)?;
        if player.credits < listing.price {
            return Err(GameError::InsufficientCredits {
                need: listing.price,
                have: player.credits,
            });
        }

        player.credits -= listing.price;
        player.add_item(item);
        let player = player.clone();
        let spaceco = &mut state.world.spaceco;
        if let Some(entry) = spaceco.items.get_mut(&item) {
            entry.stock -= 1;
        }
        spaceco.stats.items_sold += 1;

        let mut outcome = Outcome::event(GameEvent::PlayerUpdate { player });
        outcome.emit(Self::spaceco_update(state));
        Ok(outcome)
    }

    /// Fit a part from the catalog, replacing whatever is in its slot
    pub fn buy_upgrade(state: &mut MatchState, player_id: Uuid, key: &str) -> Result<Outcome, GameError> {
        Self::ensure_open(state, player_id)?;
        let part: Part = key
            .parse()
            .map_err(|_| GameError::UnknownPart(key.to_string()))?;
        let price = *state
            .world
            .spaceco
            .parts
            .get(key)
            .ok_or_else(|| GameError::UnknownPart(key.to_string()))?;
        let price = f64::from(price);
        let player = state
            .players
            .get_mut(&player_id)
            .ok_or(GameError::UnknownPlayer)?;
        if player.credits < price {
            return Err(GameError::InsufficientCredits {
                need: price,
                have: player.credits,
            });
        }

        player.credits -= price;
        let replaced = player.equip(part);
        player.recompute_cargo(&state.world);
        let player = player.clone();
        let spaceco = &mut state.world.spaceco;
        spaceco.parts.remove(key);
        spaceco.stats.parts_sold += 1;
        info!(match_id = %state.id, player_id = %player_id, part = %part, replaced = %replaced, "Part fitted");

        let mut outcome = Outcome::event(GameEvent::PlayerUpdate { player });
        outcome.emit(Self::spaceco_update(state));
        Ok(outcome)
    }

    /// Consume one carried item
    pub fn use_item(state: &mut MatchState, player_id: Uuid, name: &str) -> Result<Outcome, GameError> {
        let item: Consumable = name
            .parse()
            .map_err(|_| GameError::UnknownItem(name.to_string()))?;
        let outpost = state.world.spaceco.position;
        let player = state.player_mut(player_id)?;
        if !player.take_item(item) {
            return Err(GameError::ItemNotOwned);
        }

        let mut outcome = Outcome::default();
        match item {
            Consumable::Teleporter => {
                player.position = outpost;
                player.moving = false;
                outcome.emit(GameEvent::PlayerMove {
                    player: player.clone(),
                });
                state.paths.remove(&player_id);
            }
            Consumable::RepairNanites => {
                player.health = player.max_health;
                outcome.emit(GameEvent::PlayerUpdate {
                    player: player.clone(),
                });
            }
            Consumable::TimedCharge => {
                let center = player.position;
                debug!(match_id = %state.id, player_id = %player_id, ?center, "Charge armed");
                outcome.defer(
                    Delay::Fuse,
                    Task::Detonate {
                        center,
                        radius: CHARGE_RADIUS,
                    },
                );
            }
        }
        Ok(outcome)
    }

    /// Blast a square of cells clear, then let players and the outpost settle
    pub fn detonate(state: &mut MatchState, center: Position, radius: usize) -> Outcome {
        let mut outcome = Outcome::default();
        let cleared = state.world.cells_in_radius(center, radius);
        for pos in &cleared {
            if let Some(cell) = state.world.get_mut(*pos) {
                cell.clear();
            }
        }

        let spaceco = &mut state.world.spaceco;
        if within_radius(center, spaceco.position, radius) {
            spaceco.health = spaceco.health.saturating_sub(CHARGE_OUTPOST_DAMAGE);
        }

        let mut caught: Vec<Uuid> = state
            .players
            .values()
            .filter(|p| within_radius(center, p.position, radius))
            .map(|p| p.id)
            .collect();
        caught.sort();
        for player_id in caught {
            if let Some(event) = Self::fall_player(state, player_id) {
                outcome.emit(event);
            }
        }

        info!(match_id = %state.id, ?center, radius, cells = cleared.len(), "Charge detonated");
        outcome.emit(GameEvent::Explosion {
            center,
            radius,
            cleared,
        });

        // Fluids on the rim now border open cells
        for pos in state.world.cells_in_radius(center, radius + 1) {
            if within_radius(center, pos, radius) {
                continue;
            }
            if let Some(fluid) = state.world.get(pos).and_then(|c| c.fluid()) {
                HazardSystem::start(state, pos, fluid, &mut outcome);
            }
        }

        Self::spaceco_fall(state, &mut outcome);
        outcome
    }

    /// Drop a player straight down until something solid is below
    fn fall_player(state: &mut MatchState, player_id: Uuid) -> Option<GameEvent> {
        let world = &state.world;
        let player = state.players.get_mut(&player_id)?;
        let start = player.position;
        let mut position = start;
        while let Some(below) = world.neighbor(position, Side::Down) {
            if world.get(below).map_or(true, |c| c.is_solid()) {
                break;
            }
            position = below;
        }
        if position == start {
            return None;
        }
        player.position = position;
        Some(GameEvent::PlayerMove {
            player: player.clone(),
        })
    }

    /// Drop the outpost while nothing holds up its footprint, one health per row
    pub fn spaceco_fall(state: &mut MatchState, outcome: &mut Outcome) {
        let from = state.world.spaceco.position;
        loop {
            let world = &state.world;
            let unsupported = world
                .spaceco_support()
                .into_iter()
                .all(|below| matches!(below.and_then(|p| world.get(p)), Some(cell) if !cell.is_solid()));
            if !unsupported {
                break;
            }
            let spaceco = &mut state.world.spaceco;
            spaceco.position.y += 1;
            spaceco.health = spaceco.health.saturating_sub(1);
        }

        let spaceco = &state.world.spaceco;
        if spaceco.position != from {
            info!(match_id = %state.id, ?from, to = ?spaceco.position, health = spaceco.health, "Outpost fell");
            outcome.emit(GameEvent::SpacecoFall {
                from,
                to: spaceco.position,
                health: spaceco.health,
            });
        }
    }
}

/// Clamp a requested quantity to what is missing; `None` buys everything missing
fn purchase_quantity(missing: f64, requested: Option<f64>) -> Result<f64, GameError> {
    if missing <= 0.0 {
        return Err(GameError::AlreadyFull);
    }
    match requested {
        None => Ok(missing),
        Some(r) if r.is_nan() || r <= 0.0 => Err(GameError::InvalidAmount),
        Some(r) => Ok(r.min(missing)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::r#match::testing::state_with;
    use crate::world::parts::{Material, Subtype};
    use crate::world::testing::flat_world;
    use crate::world::{Cell, HullKey, Mineral, Slot};

    /// 9x8 world, surface row 2, outpost at (1,2), player beside it
    fn setup() -> (MatchState, Uuid) {
        let mut state = state_with(flat_world(9, 8, 2));
        let id = state.add_test_player(Position::new(2, 2));
        (state, id)
    }

    #[test]
    fn unit_price_never_rises() {
        let mut last = f64::MAX;
        for sold in 0..5000 {
            let price = unit_price(400.0, MINERAL_PRICE_BASE, sold);
            assert!(price <= last);
            assert!(price >= MIN_UNIT_PRICE);
            last = price;
        }
    }

    #[test]
    fn sell_clears_hull_and_pays() {
        let (mut state, id) = setup();
        let player = state.players.get_mut(&id).unwrap();
        player.add_to_hull(HullKey::Mineral(Mineral::Red), 3);
        player.add_to_hull(HullKey::Ground(Mineral::White), 2);
        player.cargo = 1.0;
        let credits = player.credits;

        let outcome = EconomySystem::sell(&mut state, id).unwrap();
        let player = &state.players[&id];
        assert!(player.hull.is_empty());
        assert_eq!(player.cargo, 0.0);
        assert!(player.credits > credits);
        assert_eq!(state.world.spaceco.hull[&HullKey::Mineral(Mineral::Red)], 3);
        assert_eq!(state.world.spaceco.stats.units_bought, 5);
        assert!(matches!(
            outcome.events[0],
            GameEvent::SpacecoSale { units: 5, .. }
        ));

        assert_eq!(
            EconomySystem::sell(&mut state, id).unwrap_err(),
            GameError::NothingToSell
        );
    }

    #[test]
    fn second_sale_pays_less_per_unit() {
        let (mut state, id) = setup();
        let sale = |state: &mut MatchState| {
            state
                .players
                .get_mut(&id)
                .unwrap()
                .add_to_hull(HullKey::Mineral(Mineral::Blue), 4);
            match EconomySystem::sell(state, id).unwrap().events[0] {
                GameEvent::SpacecoSale { gain, .. } => gain,
                _ => panic!("expected a sale"),
            }
        };
        let first = sale(&mut state);
        let second = sale(&mut state);
        assert!(second < first);
    }

    #[test]
    fn trading_needs_a_nearby_working_outpost() {
        let (mut state, id) = setup();
        state.players.get_mut(&id).unwrap().position = Position::new(6, 2);
        assert_eq!(
            EconomySystem::refuel(&mut state, id, None).unwrap_err(),
            GameError::NotAtOutpost
        );

        state.players.get_mut(&id).unwrap().position = Position::new(2, 2);
        state.world.spaceco.health = 0;
        assert_eq!(
            EconomySystem::buy_item(&mut state, id, "teleporter").unwrap_err(),
            GameError::OutpostDestroyed
        );
    }

    #[test]
    fn refuel_tops_up_or_clamps_amount() {
        let (mut state, id) = setup();
        assert_eq!(
            EconomySystem::refuel(&mut state, id, None).unwrap_err(),
            GameError::AlreadyFull
        );

        let player = state.players.get_mut(&id).unwrap();
        player.fuel = player.max_fuel - 4.0;
        let credits = player.credits;
        EconomySystem::refuel(&mut state, id, Some(100.0)).unwrap();
        let player = &state.players[&id];
        assert_eq!(player.fuel, player.max_fuel);
        assert!((credits - player.credits - 4.0 * FUEL_PRICE).abs() < 1e-9);
    }

    #[test]
    fn repair_costs_credits() {
        let (mut state, id) = setup();
        let player = state.players.get_mut(&id).unwrap();
        player.health = 2.0;
        player.credits = 5.0;
        let err = EconomySystem::repair(&mut state, id, None, RepairTarget::Player).unwrap_err();
        assert_eq!(err.code(), "insufficient_credits");

        EconomySystem::repair(&mut state, id, Some(3.0), RepairTarget::Player).unwrap();
        let player = &state.players[&id];
        assert_eq!(player.health, 5.0);
        assert!((player.credits - (5.0 - 3.0 * REPAIR_PRICE)).abs() < 1e-9);
    }

    #[test]
    fn destroyed_outpost_can_be_rebuilt() {
        let (mut state, id) = setup();
        state.world.spaceco.health = 0;
        state.players.get_mut(&id).unwrap().credits = 100.0;

        let outcome = EconomySystem::repair(&mut state, id, Some(4.0), RepairTarget::Outpost).unwrap();
        assert_eq!(state.world.spaceco.health, 4);
        assert_eq!(state.players[&id].credits, 60.0);
        assert!(matches!(
            outcome.events[0],
            GameEvent::SpacecoUpdate { health: 4, .. }
        ));
    }

    #[test]
    fn buying_items_draws_down_stock() {
        let (mut state, id) = setup();
        state.players.get_mut(&id).unwrap().credits = 1000.0;
        for _ in 0..3 {
            EconomySystem::buy_item(&mut state, id, "teleporter").unwrap();
        }
        assert_eq!(
            EconomySystem::buy_item(&mut state, id, "teleporter").unwrap_err(),
            GameError::OutOfStock
        );
        assert_eq!(state.players[&id].items[&Consumable::Teleporter], 3);
        assert_eq!(
            EconomySystem::buy_item(&mut state, id, "jetpack").unwrap_err(),
            GameError::UnknownItem("jetpack".into())
        );
    }

    #[test]
    fn upgrade_replaces_one_slot_and_leaves_catalog() {
        let (mut state, id) = setup();
        let part = Part::new(Slot::FuelTank, Material::Iron, Subtype::Heavy);
        state.world.spaceco.parts.insert(part.key(), part.price());
        state.players.get_mut(&id).unwrap().credits = 500.0;
        let drill = state.players[&id].part(Slot::Drill);

        EconomySystem::buy_upgrade(&mut state, id, &part.key()).unwrap();
        let player = &state.players[&id];
        assert_eq!(player.part(Slot::FuelTank), part);
        assert_eq!(player.part(Slot::Drill), drill);
        assert_eq!(player.max_fuel, part.rating());
        assert!(!state.world.spaceco.parts.contains_key(&part.key()));

        assert_eq!(
            EconomySystem::buy_upgrade(&mut state, id, &part.key()).unwrap_err(),
            GameError::UnknownPart(part.key())
        );
    }

    #[test]
    fn teleporter_returns_player_to_outpost() {
        let (mut state, id) = setup();
        let player = state.players.get_mut(&id).unwrap();
        player.position = Position::new(7, 2);
        player.add_item(Consumable::Teleporter);

        EconomySystem::use_item(&mut state, id, "teleporter").unwrap();
        assert_eq!(state.players[&id].position, state.world.spaceco.position);
        assert_eq!(
            EconomySystem::use_item(&mut state, id, "teleporter").unwrap_err(),
            GameError::ItemNotOwned
        );
    }

    #[test]
    fn charge_is_silent_until_it_goes_off() {
        let (mut state, id) = setup();
        let player = state.players.get_mut(&id).unwrap();
        player.position = Position::new(6, 2);
        player.add_item(Consumable::TimedCharge);

        let outcome = EconomySystem::use_item(&mut state, id, "timed_charge").unwrap();
        assert!(outcome.events.is_empty());
        assert_eq!(
            outcome.deferred,
            vec![(
                Delay::Fuse,
                Task::Detonate {
                    center: Position::new(6, 2),
                    radius: CHARGE_RADIUS
                }
            )]
        );
    }

    #[test]
    fn detonation_clears_cells_and_drops_player() {
        let (mut state, id) = setup();
        state.players.get_mut(&id).unwrap().position = Position::new(6, 2);

        let outcome = EconomySystem::detonate(&mut state, Position::new(6, 3), 2);
        for x in 4..=8 {
            for y in 1..=5 {
                assert!(state.world.grid[x][y].is_empty(), "({x},{y}) not cleared");
            }
        }
        assert_eq!(state.players[&id].position, Position::new(6, 5));
        assert!(outcome
            .events
            .iter()
            .any(|e| matches!(e, GameEvent::Explosion { cleared, .. } if cleared.len() == 25)));
        // Outpost at (1,2) was out of range
        assert_eq!(state.world.spaceco.health, SPACECO_MAX_HEALTH);
    }

    #[test]
    fn outpost_falls_into_opened_shaft() {
        let (mut state, _) = setup();
        for x in 0..=2 {
            for y in 3..=5 {
                state.world.grid[x][y] = Cell::default();
            }
        }

        let mut outcome = Outcome::default();
        EconomySystem::spaceco_fall(&mut state, &mut outcome);
        assert_eq!(state.world.spaceco.position, Position::new(1, 5));
        assert_eq!(state.world.spaceco.health, SPACECO_MAX_HEALTH - 3);
        assert!(matches!(
            outcome.events[..],
            [GameEvent::SpacecoFall { health, .. }] if health == SPACECO_MAX_HEALTH - 3
        ));
    }

    #[test]
    fn partially_supported_outpost_stays() {
        let (mut state, _) = setup();
        state.world.grid[0][3] = Cell::default();
        state.world.grid[1][3] = Cell::default();

        let mut outcome = Outcome::default();
        EconomySystem::spaceco_fall(&mut state, &mut outcome);
        assert_eq!(state.world.spaceco.position, Position::new(1, 2));
        assert!(outcome.events.is_empty());
    }
}
