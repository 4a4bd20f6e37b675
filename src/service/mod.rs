//! Match lifecycle: create, route commands to match actors, delete and restore

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::game::economy::RepairTarget;
use crate::game::r#match::MatchRegistry;
use crate::game::{
    GameError, GameMatch, MatchCommand, MatchHandle, MatchOptions, MatchSnapshot, MatchState,
    MatchTimings, Player, Trade,
};
use crate::store::{SnapshotStore, StoreError};
use crate::world::{Position, WorldGenError};
use crate::ws::hub::{Broadcaster, ChannelHub};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    WorldGen(#[from] WorldGenError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("world generation task failed: {0}")]
    Generation(#[from] tokio::task::JoinError),
}

/// Owns every live match and the stores they save to
pub struct MatchService {
    registry: Arc<MatchRegistry>,
    store: Arc<dyn SnapshotStore>,
    hub: Arc<ChannelHub>,
    timings: MatchTimings,
}

impl MatchService {
    pub fn new(store: Arc<dyn SnapshotStore>, hub: Arc<ChannelHub>, timings: MatchTimings) -> Self {
        Self {
            registry: Arc::new(MatchRegistry::new()),
            store,
            hub,
            timings,
        }
    }

    pub fn hub(&self) -> &Arc<ChannelHub> {
        &self.hub
    }

    pub fn match_ids(&self) -> Vec<Uuid> {
        self.registry.ids()
    }

    pub fn active_matches(&self) -> usize {
        self.registry.active_matches()
    }

    pub fn total_players(&self) -> usize {
        self.registry.total_players()
    }

    /// Start an actor for `state` and watch it so a crash only takes down its own match
    fn spawn(&self, state: MatchState) {
        let broadcaster: Arc<dyn Broadcaster> = self.hub.clone();
        let (game_match, handle) =
            GameMatch::new(state, broadcaster, self.store.clone(), self.timings);
        let match_id = handle.id;
        self.hub.open(match_id);
        self.registry.insert(handle);

        let actor = tokio::spawn(game_match.run());
        let registry = self.registry.clone();
        let hub = self.hub.clone();
        tokio::spawn(async move {
            if let Err(e) = actor.await {
                error!(match_id = %match_id, error = %e, "Match actor crashed");
            }
            registry.remove(&match_id);
            hub.close(match_id);
        });
    }

    fn handle(&self, id: Uuid) -> Result<MatchHandle, GameError> {
        self.registry.get(&id).ok_or(GameError::UnknownMatch)
    }

    async fn call<T>(
        &self,
        id: Uuid,
        make: impl FnOnce(oneshot::Sender<Result<T, GameError>>) -> MatchCommand,
    ) -> Result<T, GameError> {
        self.handle(id)?.request(make).await?
    }

    pub async fn create_match(
        &self,
        name: String,
        options: MatchOptions,
    ) -> Result<MatchSnapshot, ServiceError> {
        let id = Uuid::new_v4();
        // CPU-bound, runs on the blocking pool
        let state =
            tokio::task::spawn_blocking(move || MatchState::create(id, name, options)).await??;
        let snapshot = state.snapshot();
        self.store.create(&snapshot)?;
        info!(
            match_id = %id,
            name = %snapshot.name,
            width = snapshot.world.width,
            depth = snapshot.world.depth,
            "Match created"
        );
        self.spawn(state);
        Ok(snapshot)
    }

    pub async fn get_match(&self, id: Uuid) -> Result<MatchSnapshot, GameError> {
        self.handle(id)?
            .request(|reply| MatchCommand::Snapshot { reply })
            .await
    }

    pub async fn join_match(&self, id: Uuid, name: String) -> Result<Player, GameError> {
        self.call(id, |reply| MatchCommand::Join { name, reply }).await
    }

    pub async fn exit_match(&self, id: Uuid, player_id: Uuid) -> Result<(), GameError> {
        self.call(id, |reply| MatchCommand::Exit { player_id, reply })
            .await
    }

    /// Validate a path and start moving; later steps run on the match's own schedule
    pub async fn move_player(
        &self,
        id: Uuid,
        player_id: Uuid,
        path: Vec<Position>,
    ) -> Result<Player, GameError> {
        self.call(id, |reply| MatchCommand::Move {
            player_id,
            path,
            reply,
        })
        .await
    }

    pub async fn trade(&self, id: Uuid, player_id: Uuid, trade: Trade) -> Result<Player, GameError> {
        self.call(id, |reply| MatchCommand::Trade {
            player_id,
            trade,
            reply,
        })
        .await
    }

    pub async fn sell(&self, id: Uuid, player_id: Uuid) -> Result<Player, GameError> {
        self.trade(id, player_id, Trade::Sell).await
    }

    pub async fn refuel(&self, id: Uuid, player_id: Uuid, amount: Option<f64>) -> Result<Player, GameError> {
        self.trade(id, player_id, Trade::Refuel { amount }).await
    }

    pub async fn repair(
        &self,
        id: Uuid,
        player_id: Uuid,
        amount: Option<f64>,
        target: RepairTarget,
    ) -> Result<Player, GameError> {
        self.trade(id, player_id, Trade::Repair { amount, target })
            .await
    }

    pub async fn buy_item(&self, id: Uuid, player_id: Uuid, name: String) -> Result<Player, GameError> {
        self.trade(id, player_id, Trade::BuyItem { name }).await
    }

    pub async fn buy_upgrade(&self, id: Uuid, player_id: Uuid, part: String) -> Result<Player, GameError> {
        self.trade(id, player_id, Trade::BuyUpgrade { part }).await
    }

    pub async fn use_item(&self, id: Uuid, player_id: Uuid, name: String) -> Result<Player, GameError> {
        self.trade(id, player_id, Trade::UseItem { name }).await
    }

    /// Stop the match and remove it from storage; pending timers and saves become no-ops
    pub async fn delete_match(&self, id: Uuid) -> Result<(), GameError> {
        let handle = self.registry.remove(&id).ok_or(GameError::UnknownMatch)?;
        if handle
            .request(|reply| MatchCommand::Shutdown { reply })
            .await
            .is_err()
        {
            // Actor already gone; remove what it left behind
            match self.store.delete(id) {
                Ok(()) | Err(StoreError::NotFound(_)) => {}
                Err(e) => warn!(match_id = %id, error = %e, "Failed to delete stored match"),
            }
        }
        self.hub.close(id);
        Ok(())
    }

    /// Start actors for every stored match not already running
    pub fn restore(&self) -> Result<usize, StoreError> {
        let mut restored = 0;
        for id in self.store.list()? {
            if self.registry.get(&id).is_some() {
                continue;
            }
            match self.store.read(id) {
                Ok(snapshot) => {
                    self.spawn(MatchState::from_snapshot(snapshot));
                    restored += 1;
                }
                Err(e) => warn!(match_id = %id, error = %e, "Skipping unreadable stored match"),
            }
        }
        info!(restored, "Stored matches restored");
        Ok(restored)
    }
}
