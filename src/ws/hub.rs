//! Per-match fan-out of serialized events

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use crate::game::events::Envelope;

/// Sink for serialized match updates
pub trait Broadcaster: Send + Sync {
    fn send(&self, match_id: Uuid, payload: Arc<str>);
}

/// Wrap `event` in its envelope and hand it to the broadcaster.
/// Events that fail to serialize are logged and dropped.
pub fn publish<E: Serialize>(broadcaster: &dyn Broadcaster, match_id: Uuid, event: &E) -> bool {
    match serde_json::to_string(&Envelope { match_id, event }) {
        Ok(json) => {
            broadcaster.send(match_id, json.into());
            true
        }
        Err(e) => {
            warn!(match_id = %match_id, error = %e, "Dropping event that failed to serialize");
            false
        }
    }
}

/// Broadcast channels keyed by match
pub struct ChannelHub {
    channels: DashMap<Uuid, broadcast::Sender<Arc<str>>>,
    capacity: usize,
}

impl ChannelHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    /// Create the channel for a running match; a no-op if it already exists
    pub fn open(&self, match_id: Uuid) {
        self.channels
            .entry(match_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
    }

    /// Receiver for a match's updates, `None` unless the match's channel is open
    pub fn subscribe(&self, match_id: Uuid) -> Option<broadcast::Receiver<Arc<str>>> {
        self.channels.get(&match_id).map(|tx| tx.subscribe())
    }

    /// Drop the channel so subscribers see it close
    pub fn close(&self, match_id: Uuid) {
        self.channels.remove(&match_id);
    }

    pub fn subscriber_count(&self, match_id: Uuid) -> usize {
        self.channels
            .get(&match_id)
            .map_or(0, |tx| tx.receiver_count())
    }
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Broadcaster for ChannelHub {
    fn send(&self, match_id: Uuid, payload: Arc<str>) {
        if let Some(tx) = self.channels.get(&match_id) {
            // No receivers is fine
            let _ = tx.send(payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameEvent;
    use std::collections::HashMap;

    #[test]
    fn subscribers_get_enveloped_events() {
        let hub = ChannelHub::default();
        let match_id = Uuid::new_v4();
        hub.open(match_id);
        let mut rx = hub.subscribe(match_id).unwrap();
        let player_id = Uuid::new_v4();

        assert!(publish(&hub, match_id, &GameEvent::PlayerExit { player_id }));
        let payload = rx.try_recv().unwrap();
        let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(json["matchId"], match_id.to_string());
        assert_eq!(json["update"], "playerExit");
        assert_eq!(json["playerId"], player_id.to_string());
    }

    #[test]
    fn unserializable_event_is_dropped() {
        #[derive(Serialize)]
        struct Bad {
            by_pair: HashMap<(u8, u8), u8>,
        }

        let hub = ChannelHub::default();
        let match_id = Uuid::new_v4();
        hub.open(match_id);
        let mut rx = hub.subscribe(match_id).unwrap();
        let bad = Bad {
            by_pair: HashMap::from([((1, 2), 3)]),
        };

        assert!(!publish(&hub, match_id, &bad));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closing_ends_subscriptions() {
        let hub = ChannelHub::default();
        let match_id = Uuid::new_v4();
        hub.open(match_id);
        let mut rx = hub.subscribe(match_id).unwrap();
        assert_eq!(hub.subscriber_count(match_id), 1);

        hub.close(match_id);
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Closed)
        ));
    }

    #[test]
    fn closed_or_unknown_matches_cannot_be_subscribed() {
        let hub = ChannelHub::default();
        let match_id = Uuid::new_v4();
        assert!(hub.subscribe(match_id).is_none());

        hub.open(match_id);
        hub.open(match_id);
        let _rx = hub.subscribe(match_id).unwrap();
        assert_eq!(hub.subscriber_count(match_id), 1);

        hub.close(match_id);
        assert!(hub.subscribe(match_id).is_none());
        assert_eq!(hub.subscriber_count(match_id), 0);
    }
}
