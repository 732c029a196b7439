//! The room actor registry: creates rooms with fresh codes, looks up live
//! actors, restores hibernating rooms from storage, and routes
//! lobby-to-room messages.

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::Config;
use crate::game::{RoomConfig, MAX_PLAYERS, MIN_PLAYERS};
use crate::lobby::LobbyHandle;
use crate::protocol::{
    generate_room_code, ErrorKind, JoinRequest, JoinRequestId, RoomCode, RoomCreateOptions,
};
use crate::room::{RoomActor, RoomHandle, RoomMsg};
use crate::runtime::Clock;
use crate::storage::RoomStore;

pub struct RoomRegistry {
    rooms: DashMap<RoomCode, RoomHandle>,
    lobby: LobbyHandle,
    clock: Arc<dyn Clock>,
    store: Arc<dyn RoomStore>,
    config: Arc<Config>,
}

impl RoomRegistry {
    pub fn new(
        lobby: LobbyHandle,
        clock: Arc<dyn Clock>,
        store: Arc<dyn RoomStore>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            rooms: DashMap::new(),
            lobby,
            clock,
            store,
            config,
        }
    }

    /// Spawn a new room with a freshly assigned code.
    pub async fn create_room(
        &self,
        options: Option<RoomCreateOptions>,
    ) -> Result<RoomHandle, (ErrorKind, String)> {
        if self.rooms.len() >= self.config.server.max_rooms {
            return Err((
                ErrorKind::RoomUnavailable,
                "The server is at its room limit".to_string(),
            ));
        }

        let room_config = self.room_config_from(options);
        // Collision with a live or hibernating room re-draws the code
        let code = loop {
            let candidate = generate_room_code();
            if self.rooms.contains_key(&candidate) {
                continue;
            }
            let stored = self
                .store
                .load_snapshot(&candidate)
                .await
                .ok()
                .flatten()
                .is_some();
            if !stored {
                break candidate;
            }
        };

        let seed = fastrand::u64(..);
        tracing::info!(room_code = %code, seed, "Room created");
        let handle = RoomActor::spawn(
            code.clone(),
            room_config,
            seed,
            self.clock.clone(),
            self.store.clone(),
            self.lobby.clone(),
            self.config.clone(),
        );
        self.rooms.insert(code, handle.clone());
        Ok(handle)
    }

    fn room_config_from(&self, options: Option<RoomCreateOptions>) -> RoomConfig {
        let options = options.unwrap_or_default();
        let defaults = RoomConfig::default();
        RoomConfig {
            max_players: options
                .max_players
                .unwrap_or(self.config.game.default_max_players)
                .clamp(MIN_PLAYERS, MAX_PLAYERS),
            turn_timeout_seconds: options
                .turn_timeout_seconds
                .unwrap_or(self.config.game.turn_timeout_secs),
            is_public: options.is_public.unwrap_or(defaults.is_public),
            allow_spectators: options.allow_spectators.unwrap_or(defaults.allow_spectators),
            show_hints: options.show_hints.unwrap_or(defaults.show_hints),
        }
    }

    /// Find a live room, or wake a hibernating one from its snapshot.
    pub async fn lookup_or_restore(&self, code: &RoomCode) -> Option<RoomHandle> {
        if let Some(handle) = self.rooms.get(code) {
            return Some(handle.clone());
        }
        let snapshot = self.store.load_snapshot(code).await.ok().flatten()?;
        tracing::info!(room_code = %code, "Restoring room from snapshot");
        let handle = RoomActor::spawn_restored(
            snapshot.state,
            self.clock.clone(),
            self.store.clone(),
            self.lobby.clone(),
            self.config.clone(),
        );
        self.rooms.insert(code.clone(), handle.clone());
        Some(handle)
    }

    /// Wake every stored room at startup so the directory repopulates.
    pub async fn restore_all(&self) {
        let codes = match self.store.list_rooms().await {
            Ok(codes) => codes,
            Err(error) => {
                tracing::error!(%error, "Cold-start room listing failed");
                return;
            }
        };
        for code in codes {
            let _ = self.lookup_or_restore(&code).await;
        }
    }

    /// Route a lobby join request to the room's host. False when the room
    /// is gone (the caller reports NotFound to the requester).
    pub async fn forward_join_request(&self, code: &RoomCode, request: JoinRequest) -> bool {
        let Some(handle) = self.lookup_or_restore(code).await else {
            return false;
        };
        let delivered = handle.send(RoomMsg::JoinRequest { request }).await;
        if !delivered {
            // The actor is gone; drop the stale handle
            self.rooms.remove(code);
        }
        delivered
    }

    pub async fn cancel_join_request(&self, code: &RoomCode, request_id: JoinRequestId) {
        if let Some(handle) = self.rooms.get(code).map(|h| h.clone()) {
            let delivered = handle.send(RoomMsg::CancelJoinRequest { request_id }).await;
            if !delivered {
                self.rooms.remove(code);
            }
        }
    }

    /// Number of live room actors.
    pub fn live_rooms(&self) -> usize {
        self.rooms.len()
    }
}
