//! Step-by-step movement and digging

use std::collections::VecDeque;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::world::grid::{is_adjacent, within_radius, Facing};
use crate::world::{HullKey, ItemKind, Position, Side, World};

use super::economy::EconomySystem;
use super::error::GameError;
use super::events::GameEvent;
use super::hazards::HazardSystem;
use super::player::Orientation;
use super::r#match::MatchState;
use super::{Delay, Outcome, Task};

/// Fuel burned by any step
pub const BASE_STEP_FUEL: f64 = 0.1;
/// Ground density is divided by this to get the extra fuel for digging it
pub const DIG_FUEL_DIVISOR: f64 = 3000.0;
/// Radius around a step in which creatures wake and the outpost is checked
pub const DISTURB_RADIUS: usize = 2;

/// Remaining steps of a submitted path, tagged with the submission it came from
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedPath {
    pub epoch: u64,
    pub steps: VecDeque<Position>,
}

pub struct MovementSystem;

impl MovementSystem {
    /// Validate a whole path, resolve its first step and queue the rest
    pub fn submit_path(
        state: &mut MatchState,
        player_id: Uuid,
        path: Vec<Position>,
    ) -> Result<Outcome, GameError> {
        let player = state.player(player_id)?;
        if player.moving {
            return Err(GameError::AlreadyMoving);
        }
        if path.is_empty() {
            return Err(GameError::EmptyPath);
        }

        let mut previous = player.position;
        for &step in &path {
            if !state.world.contains(step) {
                return Err(GameError::OutOfBounds(step));
            }
            if !is_adjacent(previous, step) {
                return Err(GameError::NotAdjacent(step));
            }
            previous = step;
        }

        let mut remaining: VecDeque<Position> = path.into();
        let Some(first) = remaining.pop_front() else {
            return Err(GameError::EmptyPath);
        };
        let continuing = !remaining.is_empty();

        state.player_mut(player_id)?.moving = continuing;
        match Self::resolve_step(state, player_id, first) {
            Ok(mut outcome) => {
                if continuing {
                    state.path_epoch += 1;
                    let epoch = state.path_epoch;
                    state.paths.insert(
                        player_id,
                        QueuedPath {
                            epoch,
                            steps: remaining,
                        },
                    );
                    outcome.defer(Delay::Step, Task::Step { player_id, epoch });
                }
                Ok(outcome)
            }
            Err(err) => {
                state.player_mut(player_id)?.moving = false;
                Err(err)
            }
        }
    }

    /// Resolve the next queued step of a moving player.
    /// Steps scheduled for a path that has since been replaced or cleared are dropped.
    pub fn continue_path(state: &mut MatchState, player_id: Uuid, epoch: u64) -> Outcome {
        let Some(path) = state.paths.get_mut(&player_id) else {
            return Outcome::default();
        };
        if path.epoch != epoch {
            debug!(match_id = %state.id, player_id = %player_id, epoch, "Dropping stale step");
            return Outcome::default();
        }
        let Some(next) = path.steps.pop_front() else {
            state.paths.remove(&player_id);
            return Outcome::default();
        };
        let continuing = !path.steps.is_empty();
        if !continuing {
            state.paths.remove(&player_id);
        }

        let Some(player) = state.players.get_mut(&player_id) else {
            state.paths.remove(&player_id);
            return Outcome::default();
        };
        player.moving = continuing;

        match Self::resolve_step(state, player_id, next) {
            Ok(mut outcome) => {
                if continuing {
                    outcome.defer(Delay::Step, Task::Step { player_id, epoch });
                }
                outcome
            }
            Err(err) => {
                warn!(
                    match_id = %state.id,
                    player_id = %player_id,
                    reason = err.code(),
                    "Queued step failed, aborting path"
                );
                state.paths.remove(&player_id);
                if let Some(player) = state.players.get_mut(&player_id) {
                    player.moving = false;
                }
                Outcome::event(GameEvent::MoveAborted {
                    player_id,
                    reason: err.code(),
                })
            }
        }
    }

    /// Move a player one cell, digging and collecting whatever is there.
    /// Nothing is mutated when validation fails.
    pub fn resolve_step(
        state: &mut MatchState,
        player_id: Uuid,
        target: Position,
    ) -> Result<Outcome, GameError> {
        let world = &state.world;
        let player = state.player(player_id)?;
        let cell = world.get(target).ok_or(GameError::OutOfBounds(target))?;
        let from = player.position;
        if !is_adjacent(from, target) {
            return Err(GameError::NotAdjacent(target));
        }

        let ground = cell.ground.kind;
        if let Some(kind) = ground {
            if world.density(kind) > player.drill_strength {
                return Err(GameError::DrillTooWeak);
            }
        }
        if (ground.is_some() || cell.has_minerals()) && player.is_cargo_full() {
            return Err(GameError::CargoFull);
        }

        let (dx, dy) = from.delta_to(target);
        if dy < 0
            && ground.is_none()
            && !world.side_is_solid(target, Side::Left)
            && !world.side_is_solid(target, Side::Right)
        {
            return Err(GameError::NoWheelSupport);
        }

        let cost = BASE_STEP_FUEL + ground.map_or(0.0, |k| world.density(k) / DIG_FUEL_DIVISOR);
        if player.fuel < cost {
            return Err(GameError::InsufficientFuel {
                need: cost,
                have: player.fuel,
            });
        }

        let orientation = orient(world, player.orientation, target, dx, dy);

        // Validation done; mutate
        let mut outcome = Outcome::default();
        let Some(cell) = state.world.get_mut(target) else {
            return Err(GameError::OutOfBounds(target));
        };
        let items = std::mem::take(&mut cell.items);
        cell.ground.kind = None;
        let damage: f64 = cell.hazards.iter().map(|h| h.name.damage()).sum();

        let Some(player) = state.players.get_mut(&player_id) else {
            return Err(GameError::UnknownPlayer);
        };
        player.position = target;
        player.orientation = orientation;
        player.fuel = (player.fuel - cost).max(0.0);
        if let Some(kind) = ground {
            player.add_to_hull(HullKey::Ground(kind), 1);
        }
        for item in items {
            match item.name {
                ItemKind::Mineral(color) => player.add_to_hull(HullKey::Mineral(color), 1),
                ItemKind::Consumable(c) => player.add_item(c),
            }
        }
        player.recompute_cargo(&state.world);
        if damage > 0.0 {
            player.apply_damage(damage);
        }
        debug!(match_id = %state.id, player_id = %player_id, ?target, fuel = player.fuel, "Step resolved");
        outcome.emit(GameEvent::PlayerMove {
            player: player.clone(),
        });

        Self::disturb(state, target, &mut outcome);
        Ok(outcome)
    }

    /// Set off fluids next to a freshly opened cell, wake nearby creatures
    /// and let the outpost settle if it is close
    pub fn disturb(state: &mut MatchState, center: Position, outcome: &mut Outcome) {
        let probes = [
            Some(center),
            state.world.neighbor(center, Side::Left),
            state.world.neighbor(center, Side::Right),
            state.world.neighbor(center, Side::Down),
        ];
        for pos in probes.into_iter().flatten() {
            if let Some(fluid) = state.world.get(pos).and_then(|c| c.fluid()) {
                HazardSystem::start(state, pos, fluid, outcome);
            }
        }

        for pos in state.world.cells_in_radius(center, DISTURB_RADIUS) {
            let Some(cell) = state.world.get(pos) else {
                continue;
            };
            for hazard in cell.hazards.iter().filter(|h| h.name.is_monster()) {
                outcome.defer(
                    Delay::Now,
                    Task::Wake {
                        position: pos,
                        creature: hazard.name,
                    },
                );
            }
        }

        if within_radius(center, state.world.spaceco.position, DISTURB_RADIUS) {
            EconomySystem::spaceco_fall(state, outcome);
        }
    }
}

/// Orientation after stepping onto `target` by `(dx, dy)`
fn orient(world: &World, current: Orientation, target: Position, dx: i64, dy: i64) -> Orientation {
    if dy == 0 {
        return if dx < 0 {
            Orientation::Left
        } else {
            Orientation::Right
        };
    }

    let toward = match dx {
        d if d < 0 => Some(Facing::Left),
        d if d > 0 => Some(Facing::Right),
        _ => None,
    };
    let side = if world.side_is_solid(target, Side::Left) {
        Facing::Left
    } else if world.side_is_solid(target, Side::Right) {
        Facing::Right
    } else if let Some(facing) = toward.filter(|_| world.side_is_solid(target, Side::Down)) {
        facing
    } else {
        current.side()
    };

    Orientation::vertical(dy < 0, side, dx != 0)
}
