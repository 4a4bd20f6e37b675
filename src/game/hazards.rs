//! Gas dissipation and lava spillage
//!
//! Both are delay-chained flood fills. A chain owns one visited set for its
//! whole lifetime, so a cell is claimed at most once per chain and every
//! chain ends after at most one tick per grid cell.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::world::grid::Hazard;
use crate::world::{HazardKind, Position, Side};

use super::events::GameEvent;
use super::r#match::MatchState;
use super::{Delay, Outcome, Task};

/// Directions gas moves into
const GAS_SIDES: [Side; 3] = [Side::Left, Side::Right, Side::Up];
/// Directions lava moves into
const LAVA_SIDES: [Side; 3] = [Side::Left, Side::Right, Side::Down];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(u64);

#[derive(Debug, Default)]
struct Chain {
    visited: HashSet<Position>,
    pending: usize,
}

/// Live propagation chains of one match
#[derive(Debug, Default)]
pub struct Chains {
    next: u64,
    live: HashMap<ChainId, Chain>,
}

impl Chains {
    pub fn start(&mut self, origin: Position) -> ChainId {
        let id = ChainId(self.next);
        self.next += 1;
        let mut chain = Chain::default();
        chain.visited.insert(origin);
        self.live.insert(id, chain);
        id
    }

    /// Claim `pos` for the chain; false if already claimed or the chain is gone
    fn visit(&mut self, id: ChainId, pos: Position) -> bool {
        self.live
            .get_mut(&id)
            .map_or(false, |chain| chain.visited.insert(pos))
    }

    fn is_visited(&self, id: ChainId, pos: Position) -> bool {
        self.live
            .get(&id)
            .map_or(true, |chain| chain.visited.contains(&pos))
    }

    fn schedule(&mut self, id: ChainId) {
        if let Some(chain) = self.live.get_mut(&id) {
            chain.pending += 1;
        }
    }

    fn complete(&mut self, id: ChainId) {
        if let Some(chain) = self.live.get_mut(&id) {
            chain.pending = chain.pending.saturating_sub(1);
            if chain.pending == 0 {
                self.live.remove(&id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

pub struct HazardSystem;

impl HazardSystem {
    /// Begin a new chain at `origin` for a gas or lava found there
    pub fn start(state: &mut MatchState, origin: Position, kind: HazardKind, outcome: &mut Outcome) {
        let chain = state.chains.start(origin);
        Self::enqueue(state, chain, origin, kind, outcome);
    }

    fn enqueue(
        state: &mut MatchState,
        chain: ChainId,
        origin: Position,
        kind: HazardKind,
        outcome: &mut Outcome,
    ) {
        state.chains.schedule(chain);
        let task = if kind == HazardKind::Lava {
            Task::Lava { chain, origin }
        } else {
            Task::Gas {
                chain,
                origin,
                gas: kind,
            }
        };
        outcome.defer(Delay::Tick, task);
    }

    /// One gas tick: spread into open cells beside and above, then leave the origin
    pub fn gas_tick(state: &mut MatchState, chain: ChainId, origin: Position, gas: HazardKind) -> Outcome {
        let mut outcome = Outcome::default();
        if !state.world.get(origin).map_or(false, |c| c.has_hazard(gas)) {
            state.chains.complete(chain);
            return outcome;
        }

        let mut added = Vec::new();
        let mut continued = Vec::new();
        for side in GAS_SIDES {
            let Some(pos) = state.world.neighbor(origin, side) else {
                continue;
            };
            if state.chains.is_visited(chain, pos) {
                continue;
            }
            let Some(cell) = state.world.get_mut(pos) else {
                continue;
            };
            if cell.is_open_to_fluid() {
                state.chains.visit(chain, pos);
                cell.remove_monsters();
                cell.hazards.push(Hazard::new(gas));
                added.push(pos);
            } else if let Some(other) = cell.gas().filter(|g| *g != gas) {
                state.chains.visit(chain, pos);
                continued.push((pos, other));
            }
        }

        let mut removed = Vec::new();
        if let Some(cell) = state.world.get_mut(origin) {
            if cell.remove_hazard(gas) {
                removed.push(origin);
            }
        }

        Self::hurt_players(state, &added, gas, &mut outcome);
        trace!(match_id = %state.id, ?origin, added = added.len(), "Gas tick");
        outcome.emit(GameEvent::Hazards {
            hazard: gas,
            added: added.clone(),
            removed,
        });

        for pos in added {
            Self::enqueue(state, chain, pos, gas, &mut outcome);
        }
        for (pos, other) in continued {
            Self::enqueue(state, chain, pos, other, &mut outcome);
        }
        state.chains.complete(chain);
        outcome
    }

    /// One lava tick: spill sideways and down, draining the origin unless it is walled in
    pub fn lava_tick(state: &mut MatchState, chain: ChainId, origin: Position) -> Outcome {
        let mut outcome = Outcome::default();
        if !state.world.get(origin).map_or(false, |c| c.has_lava()) {
            state.chains.complete(chain);
            return outcome;
        }

        let mut added = Vec::new();
        let mut continued = Vec::new();
        for side in LAVA_SIDES {
            let Some(pos) = state.world.neighbor(origin, side) else {
                continue;
            };
            if state.chains.is_visited(chain, pos) {
                continue;
            }
            let Some(cell) = state.world.get_mut(pos) else {
                continue;
            };
            if cell.is_open_to_fluid() {
                state.chains.visit(chain, pos);
                cell.remove_monsters();
                cell.hazards.push(Hazard::new(HazardKind::Lava));
                added.push(pos);
            } else if cell.has_lava() {
                state.chains.visit(chain, pos);
                continued.push(pos);
            }
        }

        let mut removed = Vec::new();
        if !Self::is_contained(state, origin) {
            if let Some(cell) = state.world.get_mut(origin) {
                cell.remove_hazard(HazardKind::Lava);
                removed.push(origin);
            }
        }

        Self::hurt_players(state, &added, HazardKind::Lava, &mut outcome);
        trace!(match_id = %state.id, ?origin, added = added.len(), "Lava tick");
        outcome.emit(GameEvent::Hazards {
            hazard: HazardKind::Lava,
            added: added.clone(),
            removed,
        });

        for pos in added.into_iter().chain(continued) {
            Self::enqueue(state, chain, pos, HazardKind::Lava, &mut outcome);
        }
        state.chains.complete(chain);
        outcome
    }

    /// Solid ground on the left, right and below; grid edges count as solid
    pub fn is_contained(state: &MatchState, pos: Position) -> bool {
        [Side::Left, Side::Right, Side::Down]
            .into_iter()
            .all(|side| state.world.side_is_solid(pos, side))
    }

    fn hurt_players(state: &mut MatchState, cells: &[Position], source: HazardKind, outcome: &mut Outcome) {
        if cells.is_empty() {
            return;
        }
        let mut hurt: Vec<_> = state
            .players
            .values_mut()
            .filter(|p| cells.contains(&p.position))
            .collect();
        hurt.sort_by_key(|p| p.id);
        for player in hurt {
            let damage = player.apply_damage(source.damage());
            outcome.emit(GameEvent::PlayerHurt {
                player_id: player.id,
                damage,
                health: player.health,
                source,
            });
        }
    }
}
