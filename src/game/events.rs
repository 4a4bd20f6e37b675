//! State-change events broadcast to match observers
//!
//! Each kind carries a fixed set of plain fields; nothing here borrows from
//! live match state, so every event serializes without surprises.

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::world::grid::Facing;
use crate::world::{CatalogItem, Consumable, HazardKind, Position};

use super::player::Player;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "update", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum GameEvent {
    PlayerJoin {
        player: Player,
    },

    PlayerExit {
        player_id: Uuid,
    },

    /// One resolved step of movement (also teleports and falls)
    PlayerMove {
        player: Player,
    },

    /// A queued path stopped early
    MoveAborted {
        player_id: Uuid,
        reason: &'static str,
    },

    /// Pools or inventory changed through a trade or item
    PlayerUpdate {
        player: Player,
    },

    PlayerHurt {
        player_id: Uuid,
        damage: f64,
        health: f64,
        source: HazardKind,
    },

    /// One propagation tick of gas or lava
    Hazards {
        hazard: HazardKind,
        added: Vec<Position>,
        removed: Vec<Position>,
    },

    CreatureMove {
        creature: HazardKind,
        from: Position,
        to: Position,
        orientation: Facing,
    },

    SleepChomper {
        creature: HazardKind,
        position: Position,
    },

    SpacecoSale {
        player_id: Uuid,
        units: u32,
        gain: f64,
        credits: f64,
    },

    SpacecoUpdate {
        health: u32,
        parts: BTreeMap<String, u32>,
        items: BTreeMap<Consumable, CatalogItem>,
    },

    SpacecoFall {
        from: Position,
        to: Position,
        health: u32,
    },

    Explosion {
        center: Position,
        radius: usize,
        cleared: Vec<Position>,
    },
}

impl GameEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            GameEvent::PlayerJoin { .. } => "playerJoin",
            GameEvent::PlayerExit { .. } => "playerExit",
            GameEvent::PlayerMove { .. } => "playerMove",
            GameEvent::MoveAborted { .. } => "moveAborted",
            GameEvent::PlayerUpdate { .. } => "playerUpdate",
            GameEvent::PlayerHurt { .. } => "playerHurt",
            GameEvent::Hazards { .. } => "hazards",
            GameEvent::CreatureMove { .. } => "creatureMove",
            GameEvent::SleepChomper { .. } => "sleepChomper",
            GameEvent::SpacecoSale { .. } => "spacecoSale",
            GameEvent::SpacecoUpdate { .. } => "spacecoUpdate",
            GameEvent::SpacecoFall { .. } => "spacecoFall",
            GameEvent::Explosion { .. } => "explosion",
        }
    }
}

/// Wire form: `{ matchId, update, ...fields }`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<'a, E: Serialize> {
    pub match_id: Uuid,
    #[serde(flatten)]
    pub event: &'a E,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_flattens_event_fields() {
        let match_id = Uuid::new_v4();
        let player_id = Uuid::new_v4();
        let event = GameEvent::MoveAborted {
            player_id,
            reason: "insufficient_fuel",
        };
        let json = serde_json::to_value(Envelope {
            match_id,
            event: &event,
        })
        .unwrap();

        assert_eq!(json["matchId"], match_id.to_string());
        assert_eq!(json["update"], "moveAborted");
        assert_eq!(json["playerId"], player_id.to_string());
        assert_eq!(json["reason"], "insufficient_fuel");
        assert_eq!(event.kind(), "moveAborted");
    }

    #[test]
    fn hazard_event_lists_cells() {
        let event = GameEvent::Hazards {
            hazard: HazardKind::NoxiousGas,
            added: vec![Position::new(1, 2)],
            removed: vec![Position::new(1, 3)],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["update"], "hazards");
        assert_eq!(json["hazard"], "noxious_gas");
        assert_eq!(json["added"][0]["y"], 2);
    }
}
