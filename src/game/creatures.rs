//! Creature wake/sleep behaviour

use rand::Rng;
use tracing::trace;

use crate::world::grid::{chebyshev, manhattan, Facing, Hazard};
use crate::world::{HazardKind, Position, Side, World};

use super::events::GameEvent;
use super::r#match::MatchState;
use super::{Delay, Outcome, Task};

/// Chance that an awake creature dozes off after moving
pub const SLEEP_CHANCE: f64 = 0.4;
/// Creatures only chase players within this many cells on both axes
pub const CHASE_RANGE: usize = 3;

pub struct CreatureSystem;

impl CreatureSystem {
    /// Wake the creature at `position` and move it one cell toward the nearest player
    pub fn wake(state: &mut MatchState, position: Position, creature: HazardKind) -> Outcome {
        let mut outcome = Outcome::default();
        let world = &state.world;
        if !world.get(position).map_or(false, |c| c.has_hazard(creature)) {
            return outcome;
        }
        if Side::ALL
            .into_iter()
            .all(|side| blocked(world, world.neighbor(position, side)))
        {
            trace!(match_id = %state.id, ?position, "Creature boxed in");
            return outcome;
        }

        let Some(target) = state
            .players
            .values()
            .min_by_key(|p| (manhattan(p.position, position), p.id))
            .map(|p| (p.id, p.position))
        else {
            outcome.emit(GameEvent::SleepChomper { creature, position });
            return outcome;
        };
        let (player_id, player_pos) = target;

        if player_pos == position {
            if let Some(player) = state.players.get_mut(&player_id) {
                let damage = player.apply_damage(creature.damage());
                outcome.emit(GameEvent::PlayerHurt {
                    player_id,
                    damage,
                    health: player.health,
                    source: creature,
                });
            }
            return outcome;
        }

        if chebyshev(position, player_pos) > CHASE_RANGE {
            outcome.emit(GameEvent::SleepChomper { creature, position });
            return outcome;
        }

        let Some(next) = choose_step(world, position, player_pos) else {
            outcome.emit(GameEvent::SleepChomper { creature, position });
            return outcome;
        };

        let (dx, _) = position.delta_to(player_pos);
        let previous = world.get(position).and_then(|c| {
            c.hazards
                .iter()
                .find(|h| h.name == creature)
                .and_then(|h| h.orientation)
        });
        let orientation = match dx {
            d if d < 0 => Facing::Left,
            d if d > 0 => Facing::Right,
            _ => previous.unwrap_or(Facing::Left),
        };

        if let Some(cell) = state.world.get_mut(position) {
            if let Some(index) = cell.hazards.iter().position(|h| h.name == creature) {
                cell.hazards.remove(index);
            }
        }
        if let Some(cell) = state.world.get_mut(next) {
            cell.hazards.push(Hazard {
                name: creature,
                orientation: Some(orientation),
            });
        }

        outcome.emit(GameEvent::CreatureMove {
            creature,
            from: position,
            to: next,
            orientation,
        });
        outcome.defer(
            Delay::Tick,
            Task::Reroll {
                position: next,
                creature,
            },
        );
        outcome
    }

    /// Follow-up after a move: doze off or keep chasing
    pub fn reroll(state: &mut MatchState, position: Position, creature: HazardKind) -> Outcome {
        if !state
            .world
            .get(position)
            .map_or(false, |c| c.has_hazard(creature))
        {
            return Outcome::default();
        }
        if state.rng.gen_bool(SLEEP_CHANCE) {
            return Outcome::event(GameEvent::SleepChomper { creature, position });
        }
        Self::wake(state, position, creature)
    }
}

/// Ground, any hazard, or the edge of the grid
fn blocked(world: &World, pos: Option<Position>) -> bool {
    match pos.and_then(|p| world.get(p)) {
        Some(cell) => cell.is_solid() || !cell.hazards.is_empty(),
        None => true,
    }
}

/// Preferred axis toward the target, then the other axis, then any free cell
fn choose_step(world: &World, from: Position, to: Position) -> Option<Position> {
    let (dx, dy) = from.delta_to(to);
    let horizontal = (dx.signum(), 0);
    let vertical = (0, dy.signum());
    let axes = if dx.abs() >= dy.abs() {
        [horizontal, vertical]
    } else {
        [vertical, horizontal]
    };

    let toward = axes
        .into_iter()
        .filter(|&(x, y)| (x, y) != (0, 0))
        .filter_map(|(x, y)| from.offset(x, y, world.width, world.depth))
        .find(|pos| !blocked(world, Some(*pos)));
    if toward.is_some() {
        return toward;
    }

    let neighbors: Vec<Position> = Side::ALL
        .into_iter()
        .filter_map(|side| world.neighbor(from, side))
        .collect();
    neighbors
        .iter()
        .copied()
        .find(|pos| world.get(*pos).map_or(false, |c| c.is_empty()))
        .or_else(|| {
            neighbors
                .into_iter()
                .find(|pos| !blocked(world, Some(*pos)))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::r#match::testing::state_with;
    use crate::world::testing::open_world;
    use crate::world::{Cell, Mineral};

    fn monster_at(state: &mut MatchState, x: usize, y: usize) -> Position {
        state.world.grid[x][y]
            .hazards
            .push(Hazard::new(HazardKind::RedMonster));
        Position::new(x, y)
    }

    #[test]
    fn far_player_leaves_creature_dormant() {
        let mut state = state_with(open_world(12, 12));
        let pos = monster_at(&mut state, 2, 2);
        state.add_test_player(Position::new(2, 6));

        let outcome = CreatureSystem::wake(&mut state, pos, HazardKind::RedMonster);
        assert!(matches!(outcome.events[..], [GameEvent::SleepChomper { .. }]));
        assert!(outcome.deferred.is_empty());
        assert!(state.world.grid[2][2].has_hazard(HazardKind::RedMonster));
    }

    #[test]
    fn no_players_means_sleep() {
        let mut state = state_with(open_world(6, 6));
        let pos = monster_at(&mut state, 2, 2);
        let outcome = CreatureSystem::wake(&mut state, pos, HazardKind::RedMonster);
        assert!(matches!(outcome.events[..], [GameEvent::SleepChomper { .. }]));
    }

    #[test]
    fn creature_steps_toward_player_along_longer_axis() {
        let mut state = state_with(open_world(10, 10));
        let pos = monster_at(&mut state, 5, 5);
        state.add_test_player(Position::new(2, 4));

        let outcome = CreatureSystem::wake(&mut state, pos, HazardKind::RedMonster);
        match &outcome.events[..] {
            [GameEvent::CreatureMove {
                to, orientation, ..
            }] => {
                assert_eq!(*to, Position::new(4, 5));
                assert_eq!(*orientation, Facing::Left);
            }
            other => panic!("unexpected events {other:?}"),
        }
        assert!(!state.world.grid[5][5].has_hazard(HazardKind::RedMonster));
        assert!(state.world.grid[4][5].has_hazard(HazardKind::RedMonster));
        assert_eq!(
            outcome.deferred,
            vec![(
                Delay::Tick,
                Task::Reroll {
                    position: Position::new(4, 5),
                    creature: HazardKind::RedMonster
                }
            )]
        );
    }

    #[test]
    fn blocked_axis_falls_back_to_other_axis() {
        let mut state = state_with(open_world(10, 10));
        let pos = monster_at(&mut state, 5, 5);
        state.world.grid[4][5] = Cell::solid(Mineral::White);
        state.add_test_player(Position::new(2, 4));

        let outcome = CreatureSystem::wake(&mut state, pos, HazardKind::RedMonster);
        assert!(matches!(
            outcome.events[..],
            [GameEvent::CreatureMove { to, .. }] if to == Position::new(5, 4)
        ));
    }

    #[test]
    fn boxed_in_creature_stays_silent() {
        let mut state = state_with(open_world(5, 5));
        let pos = monster_at(&mut state, 2, 2);
        for (x, y) in [(1, 2), (3, 2), (2, 1), (2, 3)] {
            state.world.grid[x][y] = Cell::solid(Mineral::White);
        }
        state.add_test_player(Position::new(1, 1));

        let outcome = CreatureSystem::wake(&mut state, pos, HazardKind::RedMonster);
        assert!(outcome.is_empty());
    }

    #[test]
    fn shared_cell_bites_player() {
        let mut state = state_with(open_world(5, 5));
        let pos = monster_at(&mut state, 2, 2);
        let id = state.add_test_player(pos);
        let health = state.players[&id].health;

        let outcome = CreatureSystem::wake(&mut state, pos, HazardKind::RedMonster);
        assert!(matches!(
            outcome.events[..],
            [GameEvent::PlayerHurt { damage, .. }] if damage == 3.0
        ));
        assert_eq!(state.players[&id].health, health - 3.0);
        assert!(outcome.deferred.is_empty());
    }

    #[test]
    fn gone_creature_is_noop() {
        let mut state = state_with(open_world(5, 5));
        state.add_test_player(Position::new(1, 1));
        let outcome = CreatureSystem::wake(&mut state, Position::new(2, 2), HazardKind::PurpleMonster);
        assert!(outcome.is_empty());
        let outcome = CreatureSystem::reroll(&mut state, Position::new(2, 2), HazardKind::PurpleMonster);
        assert!(outcome.is_empty());
    }

    #[test]
    fn rerolls_either_sleep_or_chase() {
        let mut state = state_with(open_world(10, 10));
        let mut pos = monster_at(&mut state, 5, 5);
        state.add_test_player(Position::new(8, 5));

        let mut slept = false;
        for _ in 0..20 {
            let outcome = CreatureSystem::reroll(&mut state, pos, HazardKind::RedMonster);
            match &outcome.events[..] {
                [GameEvent::SleepChomper { .. }] => {
                    slept = true;
                    break;
                }
                [GameEvent::CreatureMove { to, .. }] => pos = *to,
                [GameEvent::PlayerHurt { .. }] => {}
                other => panic!("unexpected events {other:?}"),
            }
        }
        assert!(slept);
    }
}
