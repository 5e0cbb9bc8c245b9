#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Multiplayer room management for Outpost Defence.
//!
//! The [`RoomManager`] owns every active room. Each room runs one
//! independent fixed-rate tick task that advances all of its players'
//! simulation engines in lockstep and layers cross-player mechanics on top:
//! the send-point attack economy, elimination and ranking, and a throttled
//! state broadcast. Rooms never share mutable state with each other; the
//! room-code allocator and the registry are the only cross-room structures
//! and both serialize access behind one mutex.
//!
//! Every command is a plain function returning `Result<_, RoomError>`;
//! nothing throws across the command boundary, so network handlers can
//! always produce a response.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use outpost_defence_core::{
    CellCoord, EnemyKind, PlacementError, PlayerId, SellError, TowerId, TowerKind, UpgradeError,
};
use outpost_defence_map::blueprint;
use parking_lot::Mutex;
use thiserror::Error;

mod codes;
pub mod config;
pub mod protocol;
mod room;

pub use codes::RoomCode;
pub use config::{send_tier, RoomConfig, SendTier};
pub use protocol::{
    Audience, ChannelGateway, Gateway, NullGateway, Outbound, PlayerSnapshot, RankEntry,
    RoomSnapshot, ServerEvent,
};
pub use room::RoomStatus;

use room::{JoinOutcome, Room};

/// Reasons a room command is rejected. Every variant maps to a short reason
/// string for the network layer; no state mutates on rejection.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RoomError {
    /// No room exists under the provided code.
    #[error("room not found")]
    RoomNotFound,
    /// The player is not in any room.
    #[error("player is not in a room")]
    PlayerNotFound,
    /// The player already belongs to another room.
    #[error("player is already in a room")]
    AlreadyInRoom,
    /// The room is at its configured capacity.
    #[error("room is full")]
    RoomFull,
    /// The room already left the waiting state.
    #[error("room has already started")]
    AlreadyStarted,
    /// The requested map index is not in the catalog.
    #[error("unknown map index")]
    UnknownMap,
    /// Only the host may issue this command.
    #[error("only the host may do that")]
    NotHost,
    /// The room holds fewer players than the configured minimum.
    #[error("not enough players to start")]
    NotEnoughPlayers,
    /// At least one non-host player has not readied up.
    #[error("all players must be ready")]
    NotReady,
    /// The room is not currently playing.
    #[error("room is not playing")]
    NotPlaying,
    /// The issuing player was already eliminated.
    #[error("player has been eliminated")]
    Eliminated,
    /// A shared wave is already running.
    #[error("a wave is already in progress")]
    WaveInProgress,
    /// Every configured wave has been played.
    #[error("no waves remain")]
    WavesExhausted,
    /// No send target was given and no default is selected.
    #[error("no attack target selected")]
    NoTarget,
    /// Players cannot attack their own board.
    #[error("cannot target yourself")]
    SelfTarget,
    /// The requested target left, was eliminated, or finished.
    #[error("target is not available")]
    TargetUnavailable,
    /// The sender cannot afford the requested tier.
    #[error("not enough send points")]
    InsufficientPoints,
    /// The engine rejected a tower placement.
    #[error("placement rejected: {0:?}")]
    Placement(PlacementError),
    /// The engine rejected a tower sale.
    #[error("sale rejected: {0:?}")]
    Sell(SellError),
    /// The engine rejected a tower upgrade.
    #[error("upgrade rejected: {0:?}")]
    Upgrade(UpgradeError),
}

#[derive(Default)]
struct Registry {
    rooms: HashMap<RoomCode, Arc<Mutex<Room>>>,
    players: HashMap<PlayerId, RoomCode>,
}

/// Owns every active room and the shared code allocator.
pub struct RoomManager {
    config: RoomConfig,
    gateway: Arc<dyn Gateway>,
    registry: Arc<Mutex<Registry>>,
}

impl RoomManager {
    /// Creates a manager delivering broadcasts through the provided gateway.
    #[must_use]
    pub fn new(config: RoomConfig, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            config,
            gateway,
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// The configuration this manager was built with.
    #[must_use]
    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Number of rooms currently alive.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.registry.lock().rooms.len()
    }

    /// The room a player currently belongs to, if any.
    #[must_use]
    pub fn player_room(&self, player: PlayerId) -> Option<RoomCode> {
        self.registry.lock().players.get(&player).cloned()
    }

    // ------------------------------------------------------------------
    // Lifecycle commands
    // ------------------------------------------------------------------

    /// Creates a room with the caller as host and returns its code.
    pub fn create_room(
        &self,
        host: PlayerId,
        host_name: String,
        map_index: u32,
    ) -> Result<RoomCode, RoomError> {
        let Some(map) = blueprint(map_index) else {
            return Err(RoomError::UnknownMap);
        };

        let mut registry = self.registry.lock();
        if registry.players.contains_key(&host) {
            return Err(RoomError::AlreadyInRoom);
        }

        let mut rng = rand::thread_rng();
        let code = loop {
            let candidate = RoomCode::generate(&mut rng);
            if !registry.rooms.contains_key(&candidate) {
                break candidate;
            }
        };

        let room = Room::new(code.clone(), host, host_name, map_index, map);
        let _ = registry
            .rooms
            .insert(code.clone(), Arc::new(Mutex::new(room)));
        let _ = registry.players.insert(host, code.clone());
        tracing::info!(room = %code, host = host.get(), "room created");
        Ok(code)
    }

    /// Joins a waiting room, or reconnects a player already recorded in it.
    pub fn join_room(
        &self,
        code: &RoomCode,
        player: PlayerId,
        name: String,
    ) -> Result<(), RoomError> {
        let room = {
            let registry = self.registry.lock();
            match registry.players.get(&player) {
                Some(existing) if existing != code => return Err(RoomError::AlreadyInRoom),
                _ => {}
            }
            registry
                .rooms
                .get(code)
                .cloned()
                .ok_or(RoomError::RoomNotFound)?
        };

        let outcome = room
            .lock()
            .join(player, name, &self.config, self.gateway.as_ref())?;
        let _ = self
            .registry
            .lock()
            .players
            .insert(player, code.clone());
        match outcome {
            JoinOutcome::Joined => tracing::info!(room = %code, player = player.get(), "joined"),
            JoinOutcome::Reconnected => {
                tracing::info!(room = %code, player = player.get(), "reconnected");
            }
        }
        Ok(())
    }

    /// Removes a player from their room. Mid-game this is an immediate
    /// elimination; an empty room is torn down.
    pub fn leave_room(&self, player: PlayerId) -> Result<(), RoomError> {
        let (code, room) = self.room_of(player)?;
        let teardown = room.lock().leave(player, self.gateway.as_ref());

        let mut registry = self.registry.lock();
        let _ = registry.players.remove(&player);
        if teardown {
            let _ = registry.rooms.remove(&code);
            tracing::info!(room = %code, "room removed after last player left");
        }
        Ok(())
    }

    /// Sets a non-host player's ready flag.
    pub fn set_ready(&self, player: PlayerId, ready: bool) -> Result<(), RoomError> {
        let (_, room) = self.room_of(player)?;
        let result = room.lock().set_ready(player, ready, self.gateway.as_ref());
        result
    }

    /// Host-only: starts the pre-game countdown and this room's tick task.
    ///
    /// Must be called from within a tokio runtime; the repeating tick task
    /// is spawned onto it.
    pub fn start_game(&self, player: PlayerId) -> Result<(), RoomError> {
        let (code, room) = self.room_of(player)?;
        {
            let mut guard = room.lock();
            guard.start_game(player, &self.config, self.gateway.as_ref())?;
            if guard.ticker_started {
                return Ok(());
            }
            guard.ticker_started = true;
        }
        self.spawn_ticker(code, room);
        Ok(())
    }

    // ------------------------------------------------------------------
    // In-game commands
    // ------------------------------------------------------------------

    /// Places a tower on the issuing player's own board.
    pub fn place_tower(
        &self,
        player: PlayerId,
        kind: TowerKind,
        cell: CellCoord,
    ) -> Result<TowerId, RoomError> {
        let (_, room) = self.room_of(player)?;
        let result = room.lock()
            .place_tower(player, kind, cell, self.gateway.as_ref());
        result
    }

    /// Sells a tower on the issuing player's own board.
    pub fn sell_tower(&self, player: PlayerId, tower: TowerId) -> Result<u32, RoomError> {
        let (_, room) = self.room_of(player)?;
        let result = room.lock().sell_tower(player, tower, self.gateway.as_ref());
        result
    }

    /// Upgrades a tower on the issuing player's own board.
    pub fn upgrade_tower(&self, player: PlayerId, tower: TowerId) -> Result<u32, RoomError> {
        let (_, room) = self.room_of(player)?;
        let result = room.lock()
            .upgrade_tower(player, tower, self.gateway.as_ref());
        result
    }

    /// Host-only: starts the next shared wave for every living player.
    pub fn start_wave(&self, player: PlayerId) -> Result<u32, RoomError> {
        let (_, room) = self.room_of(player)?;
        let result = room.lock().start_wave(player, self.gateway.as_ref());
        result
    }

    /// Spends send points to materialize enemies on another player's board.
    /// Falls back to the sender's selected default target.
    pub fn send_enemy(
        &self,
        player: PlayerId,
        target: Option<PlayerId>,
        kind: EnemyKind,
    ) -> Result<u32, RoomError> {
        let (_, room) = self.room_of(player)?;
        let result = room.lock()
            .send_enemy(player, target, kind, self.gateway.as_ref());
        result
    }

    /// Selects the default recipient for future sends.
    pub fn select_target(&self, player: PlayerId, target: PlayerId) -> Result<(), RoomError> {
        let (_, room) = self.room_of(player)?;
        let result = room.lock().select_target(player, target);
        result
    }

    // ------------------------------------------------------------------
    // Observation and control
    // ------------------------------------------------------------------

    /// Current lifecycle status of a room.
    pub fn room_status(&self, code: &RoomCode) -> Result<RoomStatus, RoomError> {
        Ok(self.room_by_code(code)?.lock().status)
    }

    /// Shared wave number of a room.
    pub fn room_wave(&self, code: &RoomCode) -> Result<u32, RoomError> {
        Ok(self.room_by_code(code)?.lock().wave_number())
    }

    /// Full serializable snapshot of a room.
    pub fn snapshot(&self, code: &RoomCode) -> Result<RoomSnapshot, RoomError> {
        Ok(self.room_by_code(code)?.lock().snapshot())
    }

    /// Advances a room by one manual step, for headless drivers and tests
    /// that want deterministic time instead of the spawned ticker.
    pub fn step_room(&self, code: &RoomCode, dt: Duration) -> Result<(), RoomError> {
        let room = self.room_by_code(code)?;
        room.lock().step(dt, &self.config, self.gateway.as_ref());
        Ok(())
    }

    /// Ends a room, emitting final rankings and stopping its tick task.
    /// Idempotent: stopping an already-ended room is a no-op.
    pub fn stop_room(&self, code: &RoomCode) -> Result<(), RoomError> {
        let room = self.room_by_code(code)?;
        room.lock().finish(self.gateway.as_ref());
        Ok(())
    }

    /// Removes rooms that ended, or sat without connected players, longer
    /// than the idle timeout. Returns how many rooms were released.
    pub fn sweep_stale(&self) -> usize {
        let timeout = self.config.idle_timeout;
        let mut registry = self.registry.lock();

        let stale: Vec<RoomCode> = registry
            .rooms
            .iter()
            .filter(|(_, room)| {
                let room = room.lock();
                let ended_expired = room
                    .ended_at
                    .is_some_and(|instant| instant.elapsed() >= timeout);
                let empty_expired = room
                    .empty_since
                    .is_some_and(|instant| instant.elapsed() >= timeout);
                room.players.is_empty() || ended_expired || empty_expired
            })
            .map(|(code, _)| code.clone())
            .collect();

        for code in &stale {
            if let Some(room) = registry.rooms.remove(code) {
                // Flip the status so a still-running ticker exits on its
                // next pass; sweeping an already-ended room is a no-op.
                let mut room = room.lock();
                room.status = RoomStatus::Ended;
                registry
                    .players
                    .retain(|_, player_room| *player_room != *code);
                tracing::info!(room = %code, "stale room removed");
            }
        }
        stale.len()
    }

    /// Spawns the low-frequency background task that calls
    /// [`RoomManager::sweep_stale`] until the manager is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::downgrade(self);
        let period = self.config.idle_timeout.max(Duration::from_secs(4)) / 4;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                let _ = interval.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                let _ = manager.sweep_stale();
            }
        })
    }

    fn room_of(&self, player: PlayerId) -> Result<(RoomCode, Arc<Mutex<Room>>), RoomError> {
        let registry = self.registry.lock();
        let code = registry
            .players
            .get(&player)
            .cloned()
            .ok_or(RoomError::PlayerNotFound)?;
        let room = registry
            .rooms
            .get(&code)
            .cloned()
            .ok_or(RoomError::RoomNotFound)?;
        Ok((code, room))
    }

    fn room_by_code(&self, code: &RoomCode) -> Result<Arc<Mutex<Room>>, RoomError> {
        self.registry
            .lock()
            .rooms
            .get(code)
            .cloned()
            .ok_or(RoomError::RoomNotFound)
    }

    fn spawn_ticker(&self, code: RoomCode, room: Arc<Mutex<Room>>) {
        let config = self.config.clone();
        let gateway = Arc::clone(&self.gateway);
        let tick = config.tick_duration();
        let _ = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                let _ = interval.tick().await;
                let mut guard = room.lock();
                if guard.status == RoomStatus::Ended {
                    break;
                }
                guard.step(tick, &config, gateway.as_ref());
                if guard.status == RoomStatus::Ended {
                    break;
                }
            }
            tracing::debug!(room = %code, "tick task stopped");
        });
    }
}
