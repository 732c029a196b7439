//! Connection admission and presence: joining, reattachment, spectator
//! downgrade, disconnect grace, abandonment, pause/resume, host transfer.

use crate::ai::{profile_by_id, AiProfile, DecisionEngine};
use crate::game::{GameEvent, GamePhase, PlayerKind, PresenceState, TurnAdvance};
use crate::protocol::validation::{validate_display_name, validate_user_id};
use crate::protocol::{
    ChatScope, ConnectionId, ErrorKind, Identity, JoinRequestId, Role, RoomCreateOptions,
    RoomEvent, UserId,
};

use super::{Connection, RoomActor};

impl RoomActor {
    pub(super) async fn handle_join(
        &mut self,
        conn_id: ConnectionId,
        requested_role: Role,
        user_id: UserId,
        display_name: String,
        avatar_seed: String,
        _options: Option<RoomCreateOptions>,
        approval: Option<JoinRequestId>,
    ) {
        let Some(outbound) = self.pending.remove(&conn_id) else {
            // Either never attached or joined twice; the second join is a no-op
            self.send_error(conn_id, ErrorKind::Conflict, "Already joined").await;
            return;
        };

        // Schema-level identity checks
        if let Err(reason) = validate_user_id(user_id.as_str())
            .and_then(|()| validate_display_name(&display_name, &self.config.protocol))
        {
            self.refuse_pending(conn_id, outbound, ErrorKind::Malformed, reason).await;
            return;
        }

        if self.state.is_banned(&user_id) {
            self.refuse_pending(
                conn_id,
                outbound,
                ErrorKind::RoomUnavailable,
                "You are banned from this room".to_string(),
            )
            .await;
            return;
        }

        match requested_role {
            Role::Player => {
                self.join_as_player(conn_id, outbound, user_id, display_name, avatar_seed, approval)
                    .await;
            }
            Role::Spectator => {
                if !self.state.config.allow_spectators {
                    self.refuse_pending(
                        conn_id,
                        outbound,
                        ErrorKind::RoomUnavailable,
                        "This room does not allow spectators".to_string(),
                    )
                    .await;
                    return;
                }
                self.join_as_spectator(conn_id, outbound, user_id, display_name, false)
                    .await;
            }
        }
    }

    async fn refuse_pending(
        &self,
        conn_id: ConnectionId,
        outbound: tokio::sync::mpsc::Sender<String>,
        kind: ErrorKind,
        message: String,
    ) {
        tracing::debug!(room_code = %self.state.code, %conn_id, %kind, "Join refused: {message}");
        let event = RoomEvent::RoomError { kind, message };
        if let Some(json) = self.envelope(&event) {
            let _ = outbound.send(json).await;
        }
    }

    async fn join_as_player(
        &mut self,
        conn_id: ConnectionId,
        outbound: tokio::sync::mpsc::Sender<String>,
        user_id: UserId,
        display_name: String,
        avatar_seed: String,
        approval: Option<JoinRequestId>,
    ) {
        let now = self.clock.now();

        // Reattach: the seat survives a disconnect, even mid-game
        let has_live_seat = self
            .state
            .player(&user_id)
            .is_some_and(|p| p.is_active());
        if has_live_seat {
            self.cancel_grace_timer(&user_id);
            if let Some(player) = self.state.player_mut(&user_id) {
                player.presence = PresenceState::Connected;
                player.reconnect_deadline = None;
                player.last_seen_at = Some(now);
            }
            self.connections.insert(
                conn_id,
                Connection {
                    role: Role::Player,
                    user_id: user_id.clone(),
                    display_name,
                    joined_at: now,
                    outbound,
                },
            );
            tracing::info!(room_code = %self.state.code, %user_id, "Player reattached");
            self.broadcast(&RoomEvent::PlayerPresence {
                user_id: user_id.clone(),
                presence: PresenceState::Connected,
                reconnect_deadline: None,
            })
            .await;
            // Resume before the join reply so the reply carries the live phase
            self.maybe_resume().await;
            self.send_joined_reply(conn_id, Role::Player, false).await;
            self.persist(Vec::new()).await;
            self.notify_lobby().await;
            return;
        }

        // Fresh seats only exist while waiting, below capacity
        let seats_full =
            self.state.players.len() >= usize::from(self.state.config.max_players);
        if self.state.phase != GamePhase::Waiting || seats_full {
            if self.state.config.allow_spectators {
                self.join_as_spectator(conn_id, outbound, user_id, display_name, true)
                    .await;
            } else {
                self.refuse_pending(
                    conn_id,
                    outbound,
                    ErrorKind::RoomUnavailable,
                    "The room is full or already playing".to_string(),
                )
                .await;
            }
            return;
        }

        // Private rooms admit only host-approved requests (the creator's
        // first join seats the host and needs no approval)
        if !self.state.config.is_public && !self.state.players.is_empty() {
            let approved = self.consume_approval(&user_id, approval);
            if !approved {
                self.refuse_pending(
                    conn_id,
                    outbound,
                    ErrorKind::Unauthorized,
                    "This room requires host approval; send a join request from the lobby"
                        .to_string(),
                )
                .await;
                return;
            }
        }

        let identity = Identity {
            user_id: user_id.clone(),
            display_name: display_name.clone(),
            avatar_seed,
        };
        let seat_result = self
            .state
            .add_player(identity.clone(), PlayerKind::Human, now)
            .map(|record| record.seat_index);
        match seat_result {
            Ok(seat_index) => {
                let view = self.player_view_public(&user_id);
                self.connections.insert(
                    conn_id,
                    Connection {
                        role: Role::Player,
                        user_id: user_id.clone(),
                        display_name: display_name.clone(),
                        joined_at: now,
                        outbound,
                    },
                );
                tracing::info!(room_code = %self.state.code, %user_id, seat_index, "Player joined");
                if let Some(player) = view {
                    self.broadcast(&RoomEvent::PlayerJoined { player }).await;
                }
                self.post_system_chat(&format!("{display_name} joined the game")).await;
                self.send_joined_reply(conn_id, Role::Player, false).await;
                self.persist(vec![GameEvent::PlayerJoined {
                    identity,
                    kind: PlayerKind::Human,
                    seat_index,
                    at: now,
                }])
                .await;
                self.notify_lobby().await;
            }
            Err(error) => {
                // Raced to the last seat; fall back like any full room
                if self.state.config.allow_spectators {
                    self.join_as_spectator(conn_id, outbound, user_id, display_name, true)
                        .await;
                } else {
                    self.refuse_pending(conn_id, outbound, error.kind(), error.to_string())
                        .await;
                }
            }
        }
    }

    fn consume_approval(&mut self, user_id: &UserId, provided: Option<JoinRequestId>) -> bool {
        let now = self.clock.now();
        let Some((request_id, expires)) = self.approvals.get(user_id).copied() else {
            return false;
        };
        if expires < now {
            self.approvals.remove(user_id);
            return false;
        }
        if provided.is_some_and(|id| id != request_id) {
            return false;
        }
        self.approvals.remove(user_id);
        true
    }

    async fn join_as_spectator(
        &mut self,
        conn_id: ConnectionId,
        outbound: tokio::sync::mpsc::Sender<String>,
        user_id: UserId,
        display_name: String,
        was_downgraded: bool,
    ) {
        let now = self.clock.now();
        let first_connection = !self
            .connections
            .values()
            .any(|c| c.role == Role::Spectator && c.user_id == user_id);
        self.connections.insert(
            conn_id,
            Connection {
                role: Role::Spectator,
                user_id: user_id.clone(),
                display_name: display_name.clone(),
                joined_at: now,
                outbound,
            },
        );
        self.spectators.add(&user_id, &display_name);
        tracing::info!(room_code = %self.state.code, %user_id, was_downgraded, "Spectator joined");

        if first_connection {
            if let Some(spectator) = self.spectators.view(&user_id) {
                self.broadcast(&RoomEvent::SpectatorJoined { spectator }).await;
            }
        }
        self.send_joined_reply(conn_id, Role::Spectator, was_downgraded).await;
        self.notify_lobby().await;
    }

    /// The `ROOM_JOINED` reply plus chat history for the new arrival.
    async fn send_joined_reply(&self, conn_id: ConnectionId, role: Role, was_downgraded: bool) {
        let state = self.filtered_state(role, self.connections.get(&conn_id).map(|c| &c.user_id));
        self.send_to(
            conn_id,
            &RoomEvent::RoomJoined {
                role,
                was_downgraded,
                state: Box::new(state),
            },
        )
        .await;
        self.send_to(
            conn_id,
            &RoomEvent::ChatHistory {
                scope: ChatScope::Player,
                messages: self.chat.player_history(),
            },
        )
        .await;
        if role == Role::Spectator {
            self.send_to(
                conn_id,
                &RoomEvent::ChatHistory {
                    scope: ChatScope::Spectator,
                    messages: self.chat.spectator_history(),
                },
            )
            .await;
        }
    }

    // ------------------------------------------------------------------
    // Detach & leave
    // ------------------------------------------------------------------

    pub(super) async fn handle_detach(&mut self, conn_id: ConnectionId) {
        if self.pending.remove(&conn_id).is_some() {
            return;
        }
        let Some(conn) = self.connections.remove(&conn_id) else {
            return;
        };

        match conn.role {
            Role::Player => {
                // Multi-tab: any surviving player connection keeps presence
                let still_connected = self
                    .connections
                    .values()
                    .any(|c| c.role == Role::Player && c.user_id == conn.user_id);
                if still_connected {
                    return;
                }
                let seated_active = self
                    .state
                    .player(&conn.user_id)
                    .is_some_and(|p| p.is_active());
                if !seated_active {
                    return;
                }

                if self.state.phase == GamePhase::Waiting {
                    // No grace in the lobby: the seat opens up immediately
                    self.remove_seated_player(&conn.user_id, "left the room").await;
                    return;
                }
                if self.state.phase == GamePhase::GameOver {
                    return;
                }

                let deadline = self.arm_grace_timer(&conn.user_id);
                if let Some(player) = self.state.player_mut(&conn.user_id) {
                    player.presence = PresenceState::Disconnected;
                    player.reconnect_deadline = Some(deadline);
                }
                tracing::info!(room_code = %self.state.code, user_id = %conn.user_id, "Player disconnected; grace armed");
                self.broadcast(&RoomEvent::PlayerPresence {
                    user_id: conn.user_id.clone(),
                    presence: PresenceState::Disconnected,
                    reconnect_deadline: Some(deadline),
                })
                .await;
                self.persist(vec![GameEvent::PlayerDisconnected {
                    user_id: conn.user_id.clone(),
                    reconnect_deadline: deadline,
                }])
                .await;
                self.maybe_pause().await;
                self.notify_lobby().await;
            }
            Role::Spectator => {
                let last_connection = !self
                    .connections
                    .values()
                    .any(|c| c.role == Role::Spectator && c.user_id == conn.user_id);
                if last_connection {
                    self.spectators.remove(&conn.user_id);
                    self.broadcast(&RoomEvent::SpectatorLeft {
                        user_id: conn.user_id.clone(),
                    })
                    .await;
                    self.notify_lobby().await;
                }
            }
        }
    }

    pub(super) async fn handle_player_leave(&mut self, _conn_id: ConnectionId, user_id: &UserId) {
        tracing::info!(room_code = %self.state.code, %user_id, "Player left");
        if self.state.phase == GamePhase::Waiting {
            self.remove_seated_player(user_id, "left the room").await;
        } else {
            self.abandon_player(user_id, "left the game").await;
        }
        self.drop_user_connections(user_id);
    }

    pub(super) async fn handle_spectator_leave(&mut self, conn_id: ConnectionId, user_id: &UserId) {
        self.connections.remove(&conn_id);
        let last = !self
            .connections
            .values()
            .any(|c| c.role == Role::Spectator && c.user_id == *user_id);
        if last {
            self.spectators.remove(user_id);
            self.broadcast(&RoomEvent::SpectatorLeft {
                user_id: user_id.clone(),
            })
            .await;
            self.notify_lobby().await;
        }
    }

    /// Remove a seat during the waiting phase and keep the room coherent:
    /// host transfer, countdown sanity, queue promotion, empty-room close.
    async fn remove_seated_player(&mut self, user_id: &UserId, reason: &str) {
        let Ok(removed) = self.state.remove_waiting_player(user_id) else {
            return;
        };
        self.broadcast(&RoomEvent::PlayerLeft {
            user_id: user_id.clone(),
        })
        .await;
        self.post_system_chat(&format!("{} {reason}", removed.display_name)).await;
        self.engines.remove(user_id);

        if self.state.players.iter().all(|p| p.kind.is_ai()) {
            // A lobby of nothing but AI seats has no one left to host it
            self.close_room("all players left").await;
            return;
        }

        if removed.is_host {
            if let Some(new_host) = self.state.transfer_host() {
                self.broadcast(&RoomEvent::HostChanged {
                    user_id: new_host.clone(),
                })
                .await;
                self.post_system_chat("The host seat changed hands").await;
            } else {
                self.close_room("the host left an empty room").await;
                return;
            }
        }

        self.promote_from_queue().await;
        self.persist(Vec::new()).await;
        self.notify_lobby().await;
    }

    /// Terminal departure of a seated player during play.
    pub(super) async fn abandon_player(&mut self, user_id: &UserId, reason: &str) {
        self.cancel_grace_timer(user_id);
        let was_host = self
            .state
            .player(user_id)
            .is_some_and(|p| p.is_host);
        let display_name = self
            .state
            .player(user_id)
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| user_id.to_string());
        let now = self.clock.now();
        let advance = match self.state.mark_abandoned(user_id, now) {
            Ok(advance) => advance,
            Err(error) => {
                tracing::warn!(room_code = %self.state.code, %user_id, %error, "Abandon failed");
                return;
            }
        };
        tracing::info!(room_code = %self.state.code, %user_id, "Player abandoned");

        self.broadcast(&RoomEvent::PlayerAbandoned {
            user_id: user_id.clone(),
        })
        .await;
        self.post_system_chat(&format!("{display_name} {reason}")).await;
        let mut events = vec![GameEvent::PlayerAbandoned {
            user_id: user_id.clone(),
        }];

        let active_humans = self
            .state
            .active_players()
            .filter(|p| p.kind.is_human())
            .count();

        if was_host && self.state.phase != GamePhase::GameOver {
            if let Some(new_host) = self.state.transfer_host() {
                self.broadcast(&RoomEvent::HostChanged {
                    user_id: new_host.clone(),
                })
                .await;
            }
        }

        match advance {
            Some(TurnAdvance::GameOver) => {
                let rankings = self.state.rankings.clone().unwrap_or_default();
                let predictions = self.spectators.resolve_predictions(&rankings);
                self.broadcast(&RoomEvent::GameOver {
                    rankings: rankings.clone(),
                    predictions,
                })
                .await;
                events.push(GameEvent::GameOver { rankings, at: now });
                self.cancel_turn_timers();
                self.start_finished_ttl();
            }
            Some(TurnAdvance::NextPlayer(next)) => {
                self.broadcast(&RoomEvent::TurnStarted {
                    user_id: next,
                    turn_number: self.state.turn_number,
                    round_number: self.state.round_number,
                })
                .await;
                self.send_turn_hints().await;
                self.arm_turn_timers();
            }
            None => {}
        }

        self.persist(events).await;
        self.notify_lobby().await;

        if active_humans == 0 && self.state.phase != GamePhase::GameOver {
            // Nobody is coming back for this one
            self.close_room("every player abandoned the game").await;
        }
    }

    pub(super) fn drop_user_connections(&mut self, user_id: &UserId) {
        self.connections.retain(|_, c| &c.user_id != user_id);
    }

    // ------------------------------------------------------------------
    // Pause / resume
    // ------------------------------------------------------------------

    pub(super) async fn maybe_pause(&mut self) {
        if !self.state.phase.is_playing() || !self.state.all_humans_disconnected() {
            return;
        }
        let now = self.clock.now();
        self.state.pause(now);
        self.cancel_turn_timers();
        tracing::info!(room_code = %self.state.code, "All humans disconnected; room paused");
        if let Some(paused_at) = self.state.paused_at {
            self.broadcast(&RoomEvent::RoomPaused { paused_at }).await;
        }
        self.persist(Vec::new()).await;
        self.notify_lobby().await;
    }

    pub(super) async fn maybe_resume(&mut self) {
        if self.state.phase != GamePhase::Paused || self.unhealthy {
            return;
        }
        let now = self.clock.now();
        let Some(phase) = self.state.resume(now) else {
            return;
        };
        tracing::info!(room_code = %self.state.code, ?phase, "Room resumed");
        self.broadcast(&RoomEvent::RoomResumed { phase }).await;
        if phase == GamePhase::Countdown {
            self.start_countdown_timer();
        } else {
            self.send_turn_hints().await;
            self.arm_turn_timers();
        }
        self.persist(Vec::new()).await;
        self.notify_lobby().await;
    }

    // ------------------------------------------------------------------
    // AI seats & queue promotion
    // ------------------------------------------------------------------

    pub(super) async fn seat_ai_player(
        &mut self,
        ai_profile_id: Option<String>,
    ) -> Result<(), (ErrorKind, String)> {
        let profile = match ai_profile_id {
            Some(id) => profile_by_id(&id)
                .ok_or((ErrorKind::NotFound, format!("No AI profile '{id}'")))?,
            None => AiProfile::default_profile(),
        };
        let now = self.clock.now();
        let seat = self.state.next_seat_index();
        let user_id = UserId(format!("ai:{}:{seat}", profile.id));
        let identity = Identity {
            user_id: user_id.clone(),
            display_name: profile.display_name.clone(),
            avatar_seed: profile.id.clone(),
        };
        let kind = PlayerKind::Ai {
            ai_profile_id: profile.id.clone(),
        };
        let seat_index = self
            .state
            .add_player(identity.clone(), kind.clone(), now)
            .map(|record| record.seat_index)
            .map_err(|e| (e.kind(), e.to_string()))?;

        let mut engine = DecisionEngine::new(profile);
        // Seat-salted so two copies of the same profile diverge
        engine.initialize(self.state.rng_seed.wrapping_add(seat_index as u64 + 1));
        self.engines.insert(user_id.clone(), engine);

        tracing::info!(room_code = %self.state.code, %user_id, "AI player seated");
        if let Some(player) = self.player_view_public(&user_id) {
            self.broadcast(&RoomEvent::PlayerJoined { player }).await;
        }
        self.post_system_chat(&format!("{} sat down", identity.display_name)).await;
        self.persist(vec![GameEvent::PlayerJoined {
            identity,
            kind,
            seat_index,
            at: now,
        }])
        .await;
        Ok(())
    }

    /// A seat opened while waiting: promote the head of the spectator queue.
    pub(super) async fn promote_from_queue(&mut self) {
        if self.state.phase != GamePhase::Waiting
            || self.state.players.len() >= usize::from(self.state.config.max_players)
        {
            return;
        }
        let Some((user_id, display_name)) = self.spectators.pop_queue_head() else {
            return;
        };
        let now = self.clock.now();
        let identity = Identity {
            user_id: user_id.clone(),
            display_name: display_name.clone(),
            avatar_seed: display_name.clone(),
        };
        let seat_result = self
            .state
            .add_player(identity.clone(), PlayerKind::Human, now)
            .map(|record| record.seat_index);
        match seat_result {
            Ok(seat_index) => {
                for conn in self.connections.values_mut() {
                    if conn.user_id == user_id {
                        conn.role = Role::Player;
                    }
                }
                self.spectators.remove(&user_id);
                tracing::info!(room_code = %self.state.code, %user_id, "Promoted from spectator queue");
                if let Some(player) = self.player_view_public(&user_id) {
                    self.broadcast(&RoomEvent::PlayerJoined { player }).await;
                }
                self.post_system_chat(&format!("{display_name} got a seat from the queue")).await;
                self.send_state_refresh_to_user(&user_id).await;
                self.persist(vec![GameEvent::PlayerJoined {
                    identity,
                    kind: PlayerKind::Human,
                    seat_index,
                    at: now,
                }])
                .await;
            }
            Err(error) => {
                tracing::warn!(room_code = %self.state.code, %user_id, %error, "Queue promotion failed");
            }
        }
    }
}
