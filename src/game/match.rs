//! Match state and the per-match actor

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::store::{SnapshotStore, StoreError};
use crate::util::time::{CHARGE_FUSE_MS, HAZARD_TICK_MS, SAVE_DEBOUNCE_MS, STEP_INTERVAL_MS};
use crate::world::{generate, template, Position, TemplateOverrides, World, WorldGenError};
use crate::ws::hub::{publish, Broadcaster};

use super::creatures::CreatureSystem;
use super::economy::{EconomySystem, RepairTarget};
use super::error::GameError;
use super::events::GameEvent;
use super::hazards::{Chains, HazardSystem};
use super::movement::{MovementSystem, QueuedPath};
use super::player::Player;
use super::{Delay, Outcome, Task};

/// Parameters a match was created with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchOptions {
    pub template: String,
    pub overrides: TemplateOverrides,
    pub seed: Option<u64>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            template: "standard".to_string(),
            overrides: TemplateOverrides::default(),
            seed: None,
        }
    }
}

/// Persisted form of a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    pub id: Uuid,
    pub name: String,
    pub options: MatchOptions,
    pub world: World,
    pub players: Vec<Player>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

/// Match state (owned by the match actor)
pub struct MatchState {
    pub id: Uuid,
    pub name: String,
    pub options: MatchOptions,
    pub world: World,
    pub players: HashMap<Uuid, Player>,
    pub rng: ChaCha8Rng,
    /// Live gas and lava chains; not persisted
    pub chains: Chains,
    /// Remaining steps of each moving player's path; not persisted
    pub paths: HashMap<Uuid, QueuedPath>,
    /// Last path submission number handed out
    pub path_epoch: u64,
}

impl MatchState {
    /// Generate a fresh world for a new match
    pub fn create(id: Uuid, name: String, options: MatchOptions) -> Result<Self, WorldGenError> {
        let base = template::builtin(&options.template)
            .ok_or_else(|| WorldGenError::UnknownTemplate(options.template.clone()))?;
        let template = options.overrides.apply(base);
        let seed = options.seed.unwrap_or_else(rand::random);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let world = generate(&template, &mut rng)?;

        Ok(Self {
            id,
            name,
            options,
            world,
            players: HashMap::new(),
            rng,
            chains: Chains::default(),
            paths: HashMap::new(),
            path_epoch: 0,
        })
    }

    /// Rebuild from a stored snapshot; in-flight paths and chains are not resumed
    pub fn from_snapshot(snapshot: MatchSnapshot) -> Self {
        let players = snapshot
            .players
            .into_iter()
            .map(|mut p| {
                p.moving = false;
                (p.id, p)
            })
            .collect();

        Self {
            id: snapshot.id,
            name: snapshot.name,
            options: snapshot.options,
            world: snapshot.world,
            players,
            rng: ChaCha8Rng::seed_from_u64(rand::random()),
            chains: Chains::default(),
            paths: HashMap::new(),
            path_epoch: 0,
        }
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        let mut players: Vec<Player> = self.players.values().cloned().collect();
        players.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        MatchSnapshot {
            id: self.id,
            name: self.name.clone(),
            options: self.options.clone(),
            world: self.world.clone(),
            players,
            saved_at: Some(Utc::now()),
        }
    }

    pub fn player(&self, id: Uuid) -> Result<&Player, GameError> {
        self.players.get(&id).ok_or(GameError::UnknownPlayer)
    }

    pub fn player_mut(&mut self, id: Uuid) -> Result<&mut Player, GameError> {
        self.players.get_mut(&id).ok_or(GameError::UnknownPlayer)
    }

    /// Spawn point on the surface row at a random column
    fn spawn_position(&mut self) -> Position {
        let x = self.rng.gen_range(0..self.world.width);
        Position::new(x, self.world.air_gap)
    }

    pub fn join(&mut self, name: String) -> (Player, Outcome) {
        let position = self.spawn_position();
        let player = Player::new(Uuid::new_v4(), name, position);
        self.players.insert(player.id, player.clone());
        let outcome = Outcome::event(GameEvent::PlayerJoin {
            player: player.clone(),
        });
        (player, outcome)
    }

    pub fn exit(&mut self, player_id: Uuid) -> Result<Outcome, GameError> {
        self.players
            .remove(&player_id)
            .ok_or(GameError::UnknownPlayer)?;
        self.paths.remove(&player_id);
        Ok(Outcome::event(GameEvent::PlayerExit { player_id }))
    }

    pub fn trade(&mut self, player_id: Uuid, trade: Trade) -> Result<Outcome, GameError> {
        match trade {
            Trade::Sell => EconomySystem::sell(self, player_id),
            Trade::Refuel { amount } => EconomySystem::refuel(self, player_id, amount),
            Trade::Repair { amount, target } => {
                EconomySystem::repair(self, player_id, amount, target)
            }
            Trade::BuyItem { name } => EconomySystem::buy_item(self, player_id, &name),
            Trade::BuyUpgrade { part } => EconomySystem::buy_upgrade(self, player_id, &part),
            Trade::UseItem { name } => EconomySystem::use_item(self, player_id, &name),
        }
    }

    /// Run one deferred continuation
    pub fn run_task(&mut self, task: Task) -> Outcome {
        match task {
            Task::Gas { chain, origin, gas } => HazardSystem::gas_tick(self, chain, origin, gas),
            Task::Lava { chain, origin } => HazardSystem::lava_tick(self, chain, origin),
            Task::Wake { position, creature } => CreatureSystem::wake(self, position, creature),
            Task::Reroll { position, creature } => {
                CreatureSystem::reroll(self, position, creature)
            }
            Task::Step { player_id, epoch } => MovementSystem::continue_path(self, player_id, epoch),
            Task::Detonate { center, radius } => EconomySystem::detonate(self, center, radius),
        }
    }
}

/// Outpost and item operations a player can request
#[derive(Debug, Clone, PartialEq)]
pub enum Trade {
    Sell,
    Refuel { amount: Option<f64> },
    Repair { amount: Option<f64>, target: RepairTarget },
    BuyItem { name: String },
    BuyUpgrade { part: String },
    UseItem { name: String },
}

/// Delays used by deferred continuations and the save debounce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchTimings {
    pub hazard_tick: Duration,
    pub step_interval: Duration,
    pub charge_fuse: Duration,
    pub save_debounce: Duration,
}

impl MatchTimings {
    pub fn delay(&self, delay: Delay) -> Duration {
        match delay {
            Delay::Now => Duration::ZERO,
            Delay::Tick => self.hazard_tick,
            Delay::Step => self.step_interval,
            Delay::Fuse => self.charge_fuse,
        }
    }
}

impl Default for MatchTimings {
    fn default() -> Self {
        Self {
            hazard_tick: Duration::from_millis(HAZARD_TICK_MS),
            step_interval: Duration::from_millis(STEP_INTERVAL_MS),
            charge_fuse: Duration::from_millis(CHARGE_FUSE_MS),
            save_debounce: Duration::from_millis(SAVE_DEBOUNCE_MS),
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, GameError>>;

/// Messages processed by the match actor, one at a time
pub enum MatchCommand {
    Snapshot {
        reply: oneshot::Sender<MatchSnapshot>,
    },
    Join {
        name: String,
        reply: Reply<Player>,
    },
    Exit {
        player_id: Uuid,
        reply: Reply<()>,
    },
    Move {
        player_id: Uuid,
        path: Vec<Position>,
        reply: Reply<Player>,
    },
    Trade {
        player_id: Uuid,
        trade: Trade,
        reply: Reply<Player>,
    },
    /// Deferred continuation coming back from a timer
    Run(Task),
    /// Debounced save
    Flush,
    /// Remove the match from storage and stop the actor
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running match
#[derive(Clone)]
pub struct MatchHandle {
    pub id: Uuid,
    pub cmd_tx: mpsc::Sender<MatchCommand>,
    pub player_count: Arc<AtomicUsize>,
}

impl MatchHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    /// Send a command and wait for the actor's reply
    pub async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> MatchCommand,
    ) -> Result<T, GameError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| GameError::Unavailable)?;
        rx.await.map_err(|_| GameError::Unavailable)
    }
}

/// Registry of all active matches
pub struct MatchRegistry {
    matches: DashMap<Uuid, MatchHandle>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self {
            matches: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.get(id).map(|m| m.value().clone())
    }

    pub fn insert(&self, handle: MatchHandle) {
        self.matches.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.remove(id).map(|(_, h)| h)
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.matches.iter().map(|m| *m.key()).collect()
    }

    pub fn active_matches(&self) -> usize {
        self.matches.len()
    }

    pub fn total_players(&self) -> usize {
        self.matches
            .iter()
            .map(|m| m.value().player_count())
            .sum()
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative match actor
pub struct GameMatch {
    state: MatchState,
    cmd_rx: mpsc::Receiver<MatchCommand>,
    /// Timers hold weak senders so a stopped match drops them silently
    scheduler: mpsc::WeakSender<MatchCommand>,
    broadcaster: Arc<dyn Broadcaster>,
    store: Arc<dyn SnapshotStore>,
    timings: MatchTimings,
    save_pending: bool,
    player_count: Arc<AtomicUsize>,
}

impl GameMatch {
    pub fn new(
        state: MatchState,
        broadcaster: Arc<dyn Broadcaster>,
        store: Arc<dyn SnapshotStore>,
        timings: MatchTimings,
    ) -> (Self, MatchHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let player_count = Arc::new(AtomicUsize::new(state.players.len()));

        let handle = MatchHandle {
            id: state.id,
            cmd_tx: cmd_tx.clone(),
            player_count: player_count.clone(),
        };

        let game_match = Self {
            state,
            cmd_rx,
            scheduler: cmd_tx.downgrade(),
            broadcaster,
            store,
            timings,
            save_pending: false,
            player_count,
        };

        (game_match, handle)
    }

    /// Process commands until the match is deleted or every handle is dropped
    pub async fn run(mut self) {
        info!(match_id = %self.state.id, players = self.state.players.len(), "Match actor started");

        while let Some(cmd) = self.cmd_rx.recv().await {
            if let MatchCommand::Shutdown { reply } = cmd {
                self.cmd_rx.close();
                if let Err(e) = self.store.delete(self.state.id) {
                    warn!(match_id = %self.state.id, error = %e, "Failed to delete stored match");
                }
                let _ = reply.send(());
                info!(match_id = %self.state.id, "Match deleted");
                return;
            }
            self.handle(cmd);
        }

        if self.save_pending {
            self.flush();
        }
        info!(match_id = %self.state.id, "Match actor stopped");
    }

    fn handle(&mut self, cmd: MatchCommand) {
        match cmd {
            MatchCommand::Snapshot { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
            MatchCommand::Join { name, reply } => {
                let (player, outcome) = self.state.join(name);
                info!(match_id = %self.state.id, player_id = %player.id, name = %player.name, "Player joined");
                self.apply(outcome);
                self.sync_player_count();
                let _ = reply.send(Ok(player));
            }
            MatchCommand::Exit { player_id, reply } => {
                let result = self.state.exit(player_id).map(|outcome| {
                    info!(match_id = %self.state.id, player_id = %player_id, "Player left");
                    self.apply(outcome);
                    self.sync_player_count();
                });
                let _ = reply.send(result);
            }
            MatchCommand::Move {
                player_id,
                path,
                reply,
            } => {
                let result = MovementSystem::submit_path(&mut self.state, player_id, path)
                    .map(|outcome| self.apply(outcome))
                    .and_then(|()| self.state.player(player_id).cloned());
                let _ = reply.send(result);
            }
            MatchCommand::Trade {
                player_id,
                trade,
                reply,
            } => {
                let result = self
                    .state
                    .trade(player_id, trade)
                    .map(|outcome| self.apply(outcome))
                    .and_then(|()| self.state.player(player_id).cloned());
                let _ = reply.send(result);
            }
            MatchCommand::Run(task) => {
                let outcome = self.state.run_task(task);
                if !outcome.is_empty() {
                    self.apply(outcome);
                }
            }
            MatchCommand::Flush => self.flush(),
            MatchCommand::Shutdown { .. } => {}
        }
    }

    /// Broadcast events, arm follow-up timers and mark the match for saving
    fn apply(&mut self, outcome: Outcome) {
        for event in &outcome.events {
            debug!(match_id = %self.state.id, update = event.kind(), "Broadcasting event");
            publish(self.broadcaster.as_ref(), self.state.id, event);
        }
        for (delay, task) in outcome.deferred {
            self.schedule(self.timings.delay(delay), MatchCommand::Run(task));
        }
        self.mark_dirty();
    }

    fn schedule(&self, delay: Duration, cmd: MatchCommand) {
        let scheduler = self.scheduler.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = scheduler.upgrade() {
                let _ = tx.send(cmd).await;
            }
        });
    }

    fn mark_dirty(&mut self) {
        if self.save_pending {
            return;
        }
        self.save_pending = true;
        self.schedule(self.timings.save_debounce, MatchCommand::Flush);
    }

    fn flush(&mut self) {
        self.save_pending = false;
        let snapshot = self.state.snapshot();
        match self.store.update(&snapshot) {
            Ok(()) => debug!(match_id = %self.state.id, "Match saved"),
            Err(StoreError::NotFound(_)) => {
                debug!(match_id = %self.state.id, "Match no longer stored, skipping save")
            }
            Err(e) => warn!(match_id = %self.state.id, error = %e, "Failed to save match"),
        }
    }

    fn sync_player_count(&self) {
        self.player_count
            .store(self.state.players.len(), Ordering::Relaxed);
    }
}
