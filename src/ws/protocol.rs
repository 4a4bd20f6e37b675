//! WebSocket protocol message definitions
//! These are the wire types for commands a connected player may send

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::economy::RepairTarget;
use crate::game::Trade;
use crate::world::Position;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Walk or dig along a path of adjacent cells
    Move { path: Vec<Position> },

    Sell,

    Refuel {
        #[serde(default)]
        amount: Option<f64>,
    },

    Repair {
        #[serde(default)]
        amount: Option<f64>,
        #[serde(default)]
        target: RepairTarget,
    },

    BuyItem { name: String },

    BuyUpgrade { part: String },

    UseItem { name: String },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

impl ClientMsg {
    /// Outpost or item request carried by this message, if any
    pub fn into_trade(self) -> Option<Trade> {
        match self {
            ClientMsg::Sell => Some(Trade::Sell),
            ClientMsg::Refuel { amount } => Some(Trade::Refuel { amount }),
            ClientMsg::Repair { amount, target } => Some(Trade::Repair { amount, target }),
            ClientMsg::BuyItem { name } => Some(Trade::BuyItem { name }),
            ClientMsg::BuyUpgrade { part } => Some(Trade::BuyUpgrade { part }),
            ClientMsg::UseItem { name } => Some(Trade::UseItem { name }),
            ClientMsg::Move { .. } | ClientMsg::Ping { .. } => None,
        }
    }
}

/// Direct replies to one connection; match updates arrive as separate envelopes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    Welcome {
        match_id: Uuid,
        player_id: Option<Uuid>,
        server_time: i64,
    },

    /// Pong response
    Pong { t: u64 },

    /// A command was rejected
    Error { code: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_type_tag() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"move","path":[{"x":1,"y":2},{"x":1,"y":3}]}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Move { ref path } if path.len() == 2));

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"repair","target":"outpost"}"#).unwrap();
        assert_eq!(
            msg.into_trade(),
            Some(Trade::Repair {
                amount: None,
                target: RepairTarget::Outpost
            })
        );

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"refuel"}"#).unwrap();
        assert_eq!(msg.into_trade(), Some(Trade::Refuel { amount: None }));
    }

    #[test]
    fn error_reply_shape() {
        let json = serde_json::to_value(ServerMsg::Error {
            code: "cargo_full".into(),
            message: "Cargo hold is full".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "cargo_full");
    }
}
