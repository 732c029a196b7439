//! The global lobby actor.
//!
//! Singleton task owning the social surface: room directory, unique-user
//! presence, rate-limited chat, invites and join requests, highlight
//! fan-out. It owns no game state; rooms feed it status updates and it
//! never blocks on a room.

pub mod chat;
pub mod directory;
pub mod invites;
pub mod presence;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::protocol::{
    ConnectionId, Envelope, ErrorKind, Highlight, Identity, JoinRequest, JoinRequestId,
    LobbyCommand, LobbyEvent, RoomCode, RoomStatus, RoomStatusUpdate, RoomUpdateAction, UserId,
};
use crate::registry::RoomRegistry;
use crate::runtime::Clock;

use chat::LobbyChat;
use directory::{RoomDirectory, RoomFilter};
use invites::{InviteBook, JoinRequestBook};
use presence::PresenceTracker;

/// Mailbox capacity for the lobby.
const MAILBOX_CAPACITY: usize = 1024;

/// Cadence of the expiry sweep (invites, join requests, finished rooms).
const SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(15);

/// Everything that can land in the lobby's mailbox.
#[derive(Debug)]
pub enum LobbyMsg {
    Attach {
        conn_id: ConnectionId,
        identity: Identity,
        outbound: mpsc::Sender<String>,
    },
    Command {
        conn_id: ConnectionId,
        command: LobbyCommand,
    },
    Detach {
        conn_id: ConnectionId,
    },
    /// Directory update pushed by a room actor
    RoomUpdate(Box<RoomStatusUpdate>),
    /// A room actor shut down
    RoomClosed(RoomCode),
    /// A room wants a highlight fanned out
    Highlight(Highlight),
    /// A room host ruled on a join request
    JoinRequestResolved {
        request: JoinRequest,
        approved: bool,
    },
    /// Periodic expiry sweep
    Sweep,
}

/// Cloneable address of the lobby actor.
#[derive(Debug, Clone)]
pub struct LobbyHandle {
    tx: mpsc::Sender<LobbyMsg>,
}

impl LobbyHandle {
    pub async fn room_update(&self, update: RoomStatusUpdate) {
        let _ = self.tx.send(LobbyMsg::RoomUpdate(Box::new(update))).await;
    }

    pub async fn room_closed(&self, code: RoomCode) {
        let _ = self.tx.send(LobbyMsg::RoomClosed(code)).await;
    }

    pub async fn highlight(&self, highlight: Highlight) {
        let _ = self.tx.send(LobbyMsg::Highlight(highlight)).await;
    }

    pub async fn join_request_resolved(&self, request: JoinRequest, approved: bool) {
        let _ = self
            .tx
            .send(LobbyMsg::JoinRequestResolved { request, approved })
            .await;
    }

    pub async fn send(&self, msg: LobbyMsg) -> bool {
        self.tx.send(msg).await.is_ok()
    }

    pub fn sender(&self) -> mpsc::Sender<LobbyMsg> {
        self.tx.clone()
    }
}

/// Create the lobby mailbox ahead of spawning the actor, so rooms and the
/// registry can hold the handle before the lobby task exists.
pub fn lobby_channel() -> (LobbyHandle, mpsc::Receiver<LobbyMsg>) {
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    (LobbyHandle { tx }, rx)
}

#[derive(Debug)]
struct LobbyConnection {
    identity: Identity,
    outbound: mpsc::Sender<String>,
}

pub struct LobbyActor {
    connections: HashMap<ConnectionId, LobbyConnection>,
    presence: PresenceTracker,
    directory: RoomDirectory,
    chat: LobbyChat,
    invites: InviteBook,
    join_requests: JoinRequestBook,
    registry: Arc<RoomRegistry>,
    clock: Arc<dyn Clock>,
    config: Arc<Config>,
    rx: mpsc::Receiver<LobbyMsg>,
    self_tx: mpsc::Sender<LobbyMsg>,
}

impl LobbyActor {
    pub fn spawn(
        handle: &LobbyHandle,
        rx: mpsc::Receiver<LobbyMsg>,
        registry: Arc<RoomRegistry>,
        clock: Arc<dyn Clock>,
        config: Arc<Config>,
    ) {
        let actor = LobbyActor {
            connections: HashMap::new(),
            presence: PresenceTracker::new(),
            directory: RoomDirectory::new(),
            chat: LobbyChat::new(&config.lobby),
            invites: InviteBook::new(),
            join_requests: JoinRequestBook::new(),
            registry,
            clock,
            config,
            rx,
            self_tx: handle.sender(),
        };
        tokio::spawn(actor.run());
    }

    async fn run(mut self) {
        tracing::info!("Lobby actor started");
        self.schedule_sweep();
        while let Some(msg) = self.rx.recv().await {
            self.handle_message(msg).await;
        }
        tracing::info!("Lobby actor stopped");
    }

    fn schedule_sweep(&self) {
        let tx = self.self_tx.clone();
        let clock = self.clock.clone();
        tokio::spawn(async move {
            clock.sleep(SWEEP_INTERVAL).await;
            let _ = tx.send(LobbyMsg::Sweep).await;
        });
    }

    async fn handle_message(&mut self, msg: LobbyMsg) {
        match msg {
            LobbyMsg::Attach {
                conn_id,
                identity,
                outbound,
            } => self.handle_attach(conn_id, identity, outbound).await,
            LobbyMsg::Command { conn_id, command } => {
                self.handle_command(conn_id, command).await;
            }
            LobbyMsg::Detach { conn_id } => self.handle_detach(conn_id).await,
            LobbyMsg::RoomUpdate(update) => self.apply_room_update(*update).await,
            LobbyMsg::RoomClosed(code) => self.apply_room_closed(code).await,
            LobbyMsg::Highlight(highlight) => {
                self.broadcast(&LobbyEvent::LobbyHighlight { highlight }).await;
            }
            LobbyMsg::JoinRequestResolved { request, approved } => {
                self.apply_join_resolution(request, approved).await;
            }
            LobbyMsg::Sweep => {
                self.sweep().await;
                self.schedule_sweep();
            }
        }
    }

    // ------------------------------------------------------------------
    // Outbound plumbing
    // ------------------------------------------------------------------

    fn envelope(&self, event: &LobbyEvent) -> Option<String> {
        match Envelope::new(event, self.clock.now()).to_json() {
            Ok(json) => Some(json),
            Err(error) => {
                tracing::error!(%error, "Failed to serialize lobby event");
                None
            }
        }
    }

    async fn send_to(&self, conn_id: ConnectionId, event: &LobbyEvent) {
        let Some(conn) = self.connections.get(&conn_id) else {
            return;
        };
        if let Some(json) = self.envelope(event) {
            let _ = conn.outbound.send(json).await;
        }
    }

    async fn send_to_user(&self, user_id: &UserId, event: &LobbyEvent) {
        let Some(json) = self.envelope(event) else {
            return;
        };
        for conn_id in self.presence.connections_of(user_id) {
            if let Some(conn) = self.connections.get(&conn_id) {
                let _ = conn.outbound.send(json.clone()).await;
            }
        }
    }

    async fn broadcast(&self, event: &LobbyEvent) {
        let Some(json) = self.envelope(event) else {
            return;
        };
        for conn in self.connections.values() {
            let _ = conn.outbound.send(json.clone()).await;
        }
    }

    async fn send_error(&self, conn_id: ConnectionId, kind: ErrorKind, message: impl Into<String>) {
        self.send_to(
            conn_id,
            &LobbyEvent::LobbyError {
                kind,
                message: message.into(),
            },
        )
        .await;
    }

    // ------------------------------------------------------------------
    // Connections & presence
    // ------------------------------------------------------------------

    async fn handle_attach(
        &mut self,
        conn_id: ConnectionId,
        identity: Identity,
        outbound: mpsc::Sender<String>,
    ) {
        let first = self.presence.connect(conn_id, &identity);
        self.connections.insert(
            conn_id,
            LobbyConnection {
                identity: identity.clone(),
                outbound,
            },
        );
        tracing::info!(user_id = %identity.user_id, %conn_id, first, "Lobby connection attached");

        if first {
            self.broadcast(&LobbyEvent::PresenceJoin {
                user: crate::protocol::OnlineUser {
                    user_id: identity.user_id.clone(),
                    display_name: identity.display_name.clone(),
                },
            })
            .await;
        }

        self.send_to(
            conn_id,
            &LobbyEvent::PresenceInit {
                online_count: self.presence.online_count(),
                users: self.presence.online_users(),
            },
        )
        .await;
        self.send_to(
            conn_id,
            &LobbyEvent::LobbyChatHistory {
                messages: self.chat.history(),
            },
        )
        .await;
        self.send_to(
            conn_id,
            &LobbyEvent::LobbyRoomsList {
                rooms: self.directory.list(RoomFilter::default()),
            },
        )
        .await;
    }

    async fn handle_detach(&mut self, conn_id: ConnectionId) {
        self.connections.remove(&conn_id);
        if let Some(user_id) = self.presence.disconnect(conn_id) {
            tracing::info!(%user_id, "Lobby user fully disconnected");
            self.chat.forget_user(&user_id);
            self.broadcast(&LobbyEvent::PresenceLeave { user_id }).await;
        }
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    async fn handle_command(&mut self, conn_id: ConnectionId, command: LobbyCommand) {
        let Some(conn) = self.connections.get(&conn_id) else {
            return;
        };
        let identity = conn.identity.clone();

        match command {
            LobbyCommand::LobbyChat { content } => {
                let now = self.clock.now();
                match self.chat.post(
                    &identity.user_id,
                    &identity.display_name,
                    &content,
                    &self.config.protocol,
                    now,
                ) {
                    Ok(message) => {
                        self.broadcast(&LobbyEvent::LobbyChatMessage { message }).await;
                    }
                    Err(error) => {
                        self.send_error(conn_id, error.kind(), error.to_string()).await;
                    }
                }
            }
            LobbyCommand::GetRooms => {
                self.send_to(
                    conn_id,
                    &LobbyEvent::LobbyRoomsList {
                        rooms: self.directory.list(RoomFilter::default()),
                    },
                )
                .await;
            }
            LobbyCommand::GetOnlineUsers => {
                self.send_to(
                    conn_id,
                    &LobbyEvent::LobbyOnlineUsers {
                        users: self.presence.online_users(),
                    },
                )
                .await;
            }
            LobbyCommand::RoomCreated { room } | LobbyCommand::RoomUpdated { room } => {
                self.apply_room_update(room).await;
            }
            LobbyCommand::RoomClosed { code } => {
                self.apply_room_closed(code).await;
            }
            LobbyCommand::RequestJoin { room_code } => {
                self.handle_request_join(conn_id, identity, room_code).await;
            }
            LobbyCommand::CancelJoinRequest {
                request_id,
                room_code,
            } => {
                self.handle_cancel_join_request(conn_id, &identity.user_id, request_id, room_code)
                    .await;
            }
            LobbyCommand::SendInvite {
                to_user_id,
                room_code,
            } => {
                self.handle_send_invite(conn_id, identity, to_user_id, room_code).await;
            }
            LobbyCommand::CancelInvite { invite_id } => {
                match self.invites.cancel(invite_id, &identity.user_id) {
                    Some(invite) => {
                        self.send_to_user(
                            &invite.to_user_id,
                            &LobbyEvent::InviteCancelled { invite_id },
                        )
                        .await;
                    }
                    None => {
                        self.send_error(conn_id, ErrorKind::NotFound, "No such invite to cancel")
                            .await;
                    }
                }
            }
        }
    }

    async fn handle_request_join(
        &mut self,
        conn_id: ConnectionId,
        identity: Identity,
        room_code: RoomCode,
    ) {
        let Some(room) = self.directory.get(&room_code) else {
            self.send_to(
                conn_id,
                &LobbyEvent::JoinRequestError {
                    kind: ErrorKind::NotFound,
                    message: format!("Room {room_code} is not listed"),
                },
            )
            .await;
            return;
        };
        if room.status != RoomStatus::Waiting {
            self.send_to(
                conn_id,
                &LobbyEvent::JoinRequestError {
                    kind: ErrorKind::IllegalState,
                    message: "That game is already underway".to_string(),
                },
            )
            .await;
            return;
        }

        let now = self.clock.now();
        let ttl = chrono::Duration::seconds(self.config.lobby.join_request_ttl_secs as i64);
        let (request, superseded) = self.join_requests.file(
            identity.user_id.clone(),
            identity.display_name.clone(),
            identity.avatar_seed.clone(),
            room_code.clone(),
            ttl,
            now,
        );

        if let Some(prior) = superseded {
            self.registry
                .cancel_join_request(&prior.room_code, prior.id)
                .await;
            self.send_to_user(
                &identity.user_id,
                &LobbyEvent::JoinRequestCancelled {
                    request_id: prior.id,
                },
            )
            .await;
        }

        let routed = self.registry.forward_join_request(&room_code, request.clone()).await;
        if routed {
            tracing::info!(user_id = %identity.user_id, %room_code, "Join request forwarded");
            self.send_to_user(&identity.user_id, &LobbyEvent::JoinRequestSent { request })
                .await;
        } else {
            self.join_requests.resolve(request.id);
            self.send_to(
                conn_id,
                &LobbyEvent::JoinRequestError {
                    kind: ErrorKind::NotFound,
                    message: "The room is gone".to_string(),
                },
            )
            .await;
        }
    }

    async fn handle_cancel_join_request(
        &mut self,
        conn_id: ConnectionId,
        user_id: &UserId,
        request_id: JoinRequestId,
        room_code: RoomCode,
    ) {
        match self.join_requests.cancel(request_id, user_id) {
            Some(_) => {
                self.registry.cancel_join_request(&room_code, request_id).await;
                self.send_to_user(user_id, &LobbyEvent::JoinRequestCancelled { request_id })
                    .await;
            }
            None => {
                self.send_error(conn_id, ErrorKind::NotFound, "No pending join request").await;
            }
        }
    }

    async fn handle_send_invite(
        &mut self,
        conn_id: ConnectionId,
        identity: Identity,
        to_user_id: UserId,
        room_code: RoomCode,
    ) {
        if !self.directory.contains(&room_code) {
            self.send_error(conn_id, ErrorKind::NotFound, "That room is not listed").await;
            return;
        }
        let now = self.clock.now();
        let ttl = chrono::Duration::seconds(self.config.lobby.invite_ttl_secs as i64);
        match self.invites.create(
            identity.user_id.clone(),
            identity.display_name.clone(),
            to_user_id.clone(),
            room_code,
            ttl,
            now,
        ) {
            Ok(invite) => {
                if self.presence.is_online(&to_user_id) {
                    self.send_to_user(&to_user_id, &LobbyEvent::InviteReceived { invite })
                        .await;
                }
                // Held until expiry either way; an offline target simply
                // never sees it
            }
            Err(_) => {
                self.send_error(
                    conn_id,
                    ErrorKind::Conflict,
                    "An identical invite is already pending",
                )
                .await;
            }
        }
    }

    // ------------------------------------------------------------------
    // Room-fed state
    // ------------------------------------------------------------------

    async fn apply_room_update(&mut self, update: RoomStatusUpdate) {
        let created = self.directory.upsert(update.clone(), self.clock.now());
        let action = if created {
            RoomUpdateAction::Created
        } else {
            RoomUpdateAction::Updated
        };
        self.broadcast(&LobbyEvent::LobbyRoomUpdate {
            action,
            room: Some(Box::new(update)),
            code: None,
        })
        .await;
    }

    async fn apply_room_closed(&mut self, code: RoomCode) {
        if self.directory.remove(&code) {
            self.broadcast(&LobbyEvent::LobbyRoomUpdate {
                action: RoomUpdateAction::Closed,
                room: None,
                code: Some(code),
            })
            .await;
        }
    }

    async fn apply_join_resolution(&mut self, request: JoinRequest, approved: bool) {
        self.join_requests.resolve(request.id);
        let event = if approved {
            LobbyEvent::JoinRequestApproved {
                request_id: request.id,
                room_code: request.room_code.clone(),
                approval_ttl_secs: self.config.server.join_approval_ttl_secs,
            }
        } else {
            LobbyEvent::JoinRequestDeclined {
                request_id: request.id,
                room_code: request.room_code.clone(),
            }
        };
        self.send_to_user(&request.user_id, &event).await;
    }

    // ------------------------------------------------------------------
    // Expiry sweep
    // ------------------------------------------------------------------

    async fn sweep(&mut self) {
        let now = self.clock.now();

        for invite in self.invites.sweep(now) {
            self.send_to_user(
                &invite.to_user_id,
                &LobbyEvent::InviteCancelled {
                    invite_id: invite.id,
                },
            )
            .await;
        }

        for request in self.join_requests.sweep(now) {
            self.registry
                .cancel_join_request(&request.room_code, request.id)
                .await;
            self.send_to_user(
                &request.user_id,
                &LobbyEvent::JoinRequestCancelled {
                    request_id: request.id,
                },
            )
            .await;
        }

        let retention = chrono::Duration::seconds(self.config.lobby.finished_retention_secs as i64);
        for code in self.directory.sweep_finished(now, retention) {
            self.broadcast(&LobbyEvent::LobbyRoomUpdate {
                action: RoomUpdateAction::Closed,
                room: None,
                code: Some(code),
            })
            .await;
        }
    }
}
