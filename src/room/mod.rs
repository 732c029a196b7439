//! The game room actor.
//!
//! One task per room code owns the authoritative [`GameState`] and processes
//! one mailbox message at a time: client commands, transport attach/detach,
//! timer firings and lobby-forwarded join requests. Everything volatile
//! (connections, timers, chat) lives here; everything durable is persisted
//! through [`crate::storage`] after each transition.

mod admission;
mod ai_driver;
mod chat;
mod commands;
mod filtering;
mod spectator;
mod timers;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::ai::DecisionEngine;
use crate::config::Config;
use crate::game::{GameEvent, GamePhase, GameState, PresenceState, RoomConfig};
use crate::lobby::LobbyHandle;
use crate::protocol::{
    ConnectionId, Envelope, ErrorKind, JoinRequest, JoinRequestId, PlayerSummary, Role, RoomCode,
    RoomCommand, RoomEvent, RoomStatus, RoomStatusUpdate, UserId, GAME_NAME,
};
use crate::runtime::{Clock, SeededRng, TimerToken, TimerTokens};
use crate::storage::{RoomSnapshot, RoomStore, StorageError};

use chat::RoomChat;
use spectator::SpectatorRoster;

/// Attempts before a failing snapshot write marks the room unhealthy.
const PERSIST_RETRIES: u32 = 3;

/// Mailbox capacity per room.
const MAILBOX_CAPACITY: usize = 256;

/// Timers a room schedules; every firing carries the token it was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerKind {
    Countdown,
    AfkWarning,
    AfkTimeout,
    TurnTimeout,
    Grace { user_id: UserId },
    AiStep,
    FinishedTtl,
}

/// Everything that can land in a room's mailbox.
#[derive(Debug)]
pub enum RoomMsg {
    /// A transport opened; commands for this connection follow
    Attach {
        conn_id: ConnectionId,
        outbound: mpsc::Sender<String>,
    },
    /// One parsed client command
    Command {
        conn_id: ConnectionId,
        command: RoomCommand,
    },
    /// The transport closed
    Detach { conn_id: ConnectionId },
    /// A scheduled timer fired
    TimerFired { kind: TimerKind, token: TimerToken },
    /// The lobby forwarded a join request for the host to judge
    JoinRequest { request: JoinRequest },
    /// The lobby withdrew a pending join request
    CancelJoinRequest { request_id: JoinRequestId },
}

/// Cloneable address of a room actor.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    code: RoomCode,
    tx: mpsc::Sender<RoomMsg>,
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub async fn send(&self, msg: RoomMsg) -> bool {
        self.tx.send(msg).await.is_ok()
    }

    pub fn sender(&self) -> mpsc::Sender<RoomMsg> {
        self.tx.clone()
    }
}

/// One live transport attached to this room.
#[derive(Debug, Clone)]
struct Connection {
    role: Role,
    user_id: UserId,
    display_name: String,
    joined_at: DateTime<Utc>,
    outbound: mpsc::Sender<String>,
}

pub struct RoomActor {
    state: GameState,
    /// Transports that attached but have not sent `ROOM_JOIN` yet
    pending: HashMap<ConnectionId, mpsc::Sender<String>>,
    connections: HashMap<ConnectionId, Connection>,
    chat: RoomChat,
    spectators: SpectatorRoster,
    engines: HashMap<UserId, DecisionEngine>,
    dice_rng: SeededRng,
    clock: Arc<dyn Clock>,
    store: Arc<dyn RoomStore>,
    lobby: LobbyHandle,
    config: Arc<Config>,
    rx: mpsc::Receiver<RoomMsg>,
    self_tx: mpsc::Sender<RoomMsg>,
    countdown_tokens: TimerTokens,
    afk_tokens: TimerTokens,
    ai_tokens: TimerTokens,
    finished_tokens: TimerTokens,
    grace_tokens: HashMap<UserId, TimerTokens>,
    /// Pending join requests awaiting the host
    join_requests: HashMap<JoinRequestId, JoinRequest>,
    /// Approved private-room joins and their expiry
    approvals: HashMap<UserId, (JoinRequestId, DateTime<Utc>)>,
    /// Set when persistence failed beyond retries; the room sits paused
    unhealthy: bool,
    closing: bool,
}

impl RoomActor {
    /// Spawn a fresh room.
    pub fn spawn(
        code: RoomCode,
        room_config: RoomConfig,
        seed: u64,
        clock: Arc<dyn Clock>,
        store: Arc<dyn RoomStore>,
        lobby: LobbyHandle,
        config: Arc<Config>,
    ) -> RoomHandle {
        let state = GameState::new(code, room_config, seed);
        Self::spawn_with_state(state, clock, store, lobby, config)
    }

    /// Spawn a room around restored state (cold-start recovery). Presence is
    /// derived from live connections, so every human seat starts
    /// disconnected with a fresh grace deadline.
    pub fn spawn_restored(
        mut state: GameState,
        clock: Arc<dyn Clock>,
        store: Arc<dyn RoomStore>,
        lobby: LobbyHandle,
        config: Arc<Config>,
    ) -> RoomHandle {
        let now = clock.now();
        let grace = chrono::Duration::seconds(config.game.grace_period_secs as i64);
        for player in &mut state.players {
            if player.kind.is_human() && player.presence == PresenceState::Connected {
                player.presence = PresenceState::Disconnected;
                player.reconnect_deadline = Some(now + grace);
            }
        }
        if state.phase.is_playing() {
            state.pause(now);
        }
        Self::spawn_with_state(state, clock, store, lobby, config)
    }

    fn spawn_with_state(
        state: GameState,
        clock: Arc<dyn Clock>,
        store: Arc<dyn RoomStore>,
        lobby: LobbyHandle,
        config: Arc<Config>,
    ) -> RoomHandle {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let handle = RoomHandle {
            code: state.code.clone(),
            tx: tx.clone(),
        };
        let dice_rng = SeededRng::new(state.rng_seed);
        let actor = RoomActor {
            chat: RoomChat::new(config.game.room_chat_history),
            spectators: SpectatorRoster::new(),
            engines: HashMap::new(),
            dice_rng,
            state,
            pending: HashMap::new(),
            connections: HashMap::new(),
            clock,
            store,
            lobby,
            config,
            rx,
            self_tx: tx,
            countdown_tokens: TimerTokens::new(),
            afk_tokens: TimerTokens::new(),
            ai_tokens: TimerTokens::new(),
            finished_tokens: TimerTokens::new(),
            grace_tokens: HashMap::new(),
            join_requests: HashMap::new(),
            approvals: HashMap::new(),
            unhealthy: false,
            closing: false,
        };
        tokio::spawn(actor.run());
        handle
    }

    async fn run(mut self) {
        let code = self.state.code.clone();
        tracing::info!(room_code = %code, "Room actor started");
        self.notify_lobby().await;
        self.restore_grace_timers();
        if self.state.phase == GamePhase::GameOver {
            // A restored finished room only lingers for its TTL
            self.start_finished_ttl();
        }

        while let Some(msg) = self.rx.recv().await {
            self.handle_message(msg).await;
            if self.closing {
                break;
            }
        }

        tracing::info!(room_code = %code, "Room actor stopped");
    }

    async fn handle_message(&mut self, msg: RoomMsg) {
        match msg {
            RoomMsg::Attach { conn_id, outbound } => {
                self.pending.insert(conn_id, outbound);
            }
            RoomMsg::Command { conn_id, command } => {
                self.handle_command(conn_id, command).await;
            }
            RoomMsg::Detach { conn_id } => {
                self.handle_detach(conn_id).await;
            }
            RoomMsg::TimerFired { kind, token } => {
                self.handle_timer(kind, token).await;
            }
            RoomMsg::JoinRequest { request } => {
                self.handle_join_request(request).await;
            }
            RoomMsg::CancelJoinRequest { request_id } => {
                self.handle_cancel_join_request(request_id).await;
            }
        }
    }

    // ------------------------------------------------------------------
    // Outbound plumbing
    // ------------------------------------------------------------------

    fn envelope(&self, event: &RoomEvent) -> Option<String> {
        match Envelope::new(event, self.clock.now()).to_json() {
            Ok(json) => Some(json),
            Err(error) => {
                tracing::error!(room_code = %self.state.code, %error, "Failed to serialize room event");
                None
            }
        }
    }

    /// Send one event to one connection.
    async fn send_to(&self, conn_id: ConnectionId, event: &RoomEvent) {
        let Some(conn) = self.connections.get(&conn_id) else {
            return;
        };
        if let Some(json) = self.envelope(event) {
            let _ = conn.outbound.send(json).await;
        }
    }

    /// Send one event to a transport that has not joined yet.
    async fn send_pending(&self, conn_id: ConnectionId, event: &RoomEvent) {
        let Some(outbound) = self.pending.get(&conn_id) else {
            return;
        };
        if let Some(json) = self.envelope(event) {
            let _ = outbound.send(json).await;
        }
    }

    /// Broadcast to every joined connection.
    async fn broadcast(&self, event: &RoomEvent) {
        let Some(json) = self.envelope(event) else {
            return;
        };
        for conn in self.connections.values() {
            let _ = conn.outbound.send(json.clone()).await;
        }
    }

    /// Broadcast to every connection of one user.
    async fn send_to_user(&self, user_id: &UserId, event: &RoomEvent) {
        let Some(json) = self.envelope(event) else {
            return;
        };
        for conn in self.connections.values().filter(|c| &c.user_id == user_id) {
            let _ = conn.outbound.send(json.clone()).await;
        }
    }

    /// Broadcast to every spectator connection.
    async fn broadcast_spectators(&self, event: &RoomEvent) {
        let Some(json) = self.envelope(event) else {
            return;
        };
        for conn in self
            .connections
            .values()
            .filter(|c| c.role == Role::Spectator)
        {
            let _ = conn.outbound.send(json.clone()).await;
        }
    }

    async fn send_error(&self, conn_id: ConnectionId, kind: ErrorKind, message: impl Into<String>) {
        self.send_to(
            conn_id,
            &RoomEvent::RoomError {
                kind,
                message: message.into(),
            },
        )
        .await;
    }

    // ------------------------------------------------------------------
    // Lobby coordination
    // ------------------------------------------------------------------

    fn directory_status(&self) -> RoomStatus {
        match self.state.phase {
            GamePhase::Waiting | GamePhase::Countdown => RoomStatus::Waiting,
            GamePhase::TurnRoll | GamePhase::TurnDecide | GamePhase::TurnScore => {
                RoomStatus::Playing
            }
            GamePhase::Paused => RoomStatus::Paused,
            GamePhase::GameOver => RoomStatus::Finished,
        }
    }

    fn status_update(&self) -> RoomStatusUpdate {
        let players: Vec<PlayerSummary> = self
            .state
            .active_players()
            .map(|p| p.summary())
            .collect();
        let host = self.state.host();
        RoomStatusUpdate {
            code: self.state.code.clone(),
            game: GAME_NAME.to_string(),
            status: self.directory_status(),
            player_count: players.len(),
            spectator_count: self.spectators.unique_users(&self.connections),
            max_players: self.state.config.max_players,
            round_number: self.state.round_number,
            total_rounds: crate::game::MAX_TURNS,
            is_public: self.state.config.is_public,
            allow_spectators: self.state.config.allow_spectators,
            players,
            host_id: host.map(|h| h.user_id.clone()).unwrap_or(UserId::from("")),
            host_name: host.map(|h| h.display_name.clone()).unwrap_or_default(),
            updated_at: self.clock.now(),
            paused_at: self.state.paused_at,
            identity: self.state.identity.clone(),
        }
    }

    /// Push the current status to the lobby directory.
    async fn notify_lobby(&self) {
        self.lobby.room_update(self.status_update()).await;
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Append events and write the snapshot, with bounded retries. On
    /// persistent failure the room pauses unhealthy rather than playing on
    /// over a state it cannot recover.
    async fn persist(&mut self, events: Vec<GameEvent>) {
        for event in &events {
            if let Err(error) = self.store.append_event(&self.state.code, event).await {
                tracing::warn!(room_code = %self.state.code, %error, "Event append failed");
            }
        }

        let snapshot = RoomSnapshot::new(self.state.clone());
        let mut last_error: Option<StorageError> = None;
        for attempt in 1..=PERSIST_RETRIES {
            match self.store.save_snapshot(&snapshot).await {
                Ok(()) => return,
                Err(error) => {
                    tracing::warn!(
                        room_code = %self.state.code,
                        attempt,
                        %error,
                        "Snapshot write failed"
                    );
                    last_error = Some(error);
                }
            }
        }

        tracing::error!(
            room_code = %self.state.code,
            error = %last_error.map(|e| e.to_string()).unwrap_or_default(),
            "Snapshot writes exhausted retries; pausing room"
        );
        self.unhealthy = true;
        let now = self.clock.now();
        self.state.pause(now);
        self.cancel_turn_timers();
        if let Some(paused_at) = self.state.paused_at {
            self.broadcast(&RoomEvent::RoomPaused { paused_at }).await;
        }
        self.notify_lobby().await;
    }

    // ------------------------------------------------------------------
    // Closing
    // ------------------------------------------------------------------

    /// Tear the room down: tell everyone, tell the lobby, drop storage.
    async fn close_room(&mut self, reason: &str) {
        if self.closing {
            return;
        }
        self.closing = true;
        self.broadcast(&RoomEvent::RoomClosed {
            reason: reason.to_string(),
        })
        .await;
        self.lobby.room_closed(self.state.code.clone()).await;
        if let Err(error) = self.store.delete_room(&self.state.code).await {
            tracing::warn!(room_code = %self.state.code, %error, "Failed to delete room storage");
        }
        self.connections.clear();
        self.pending.clear();
    }
}
