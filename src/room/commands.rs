//! Command dispatch and the game-command handlers.
//!
//! One command at a time: validate role and phase, apply the transition,
//! broadcast in transition order, persist, then re-arm timers. Refusals are
//! typed `ROOM_ERROR` events to the caller only and never drop the
//! connection.

use crate::game::{Category, GameEvent, GamePhase, TurnAdvance};
use crate::protocol::{
    ChatScope, ConnectionId, ErrorKind, Highlight, HighlightKind, JoinRequest, JoinRequestId,
    ReactionOp, Role, RoomCommand, RoomEvent, UserId,
};

use super::RoomActor;

impl RoomActor {
    pub(super) async fn handle_command(&mut self, conn_id: ConnectionId, command: RoomCommand) {
        if let RoomCommand::RoomJoin {
            role,
            user_id,
            display_name,
            avatar_seed,
            options,
            approval,
        } = command
        {
            self.handle_join(conn_id, role, user_id, display_name, avatar_seed, options, approval)
                .await;
            return;
        }

        // Everything else requires a completed ROOM_JOIN
        let Some(conn) = self.connections.get(&conn_id) else {
            self.send_pending(
                conn_id,
                &RoomEvent::RoomError {
                    kind: ErrorKind::Unauthorized,
                    message: "ROOM_JOIN must be the first message".to_string(),
                },
            )
            .await;
            return;
        };
        let role = conn.role;
        let user_id = conn.user_id.clone();

        match (role, command) {
            (Role::Player, RoomCommand::Roll) => self.handle_roll(conn_id, &user_id).await,
            (Role::Player, RoomCommand::ToggleKeep { index }) => {
                self.handle_keep_edit(conn_id, &user_id, KeepEdit::Toggle(index)).await;
            }
            (Role::Player, RoomCommand::KeepAll) => {
                self.handle_keep_edit(conn_id, &user_id, KeepEdit::KeepAll).await;
            }
            (Role::Player, RoomCommand::ReleaseAll) => {
                self.handle_keep_edit(conn_id, &user_id, KeepEdit::ReleaseAll).await;
            }
            (Role::Player, RoomCommand::Score { category }) => {
                self.handle_score(conn_id, &user_id, category).await;
            }
            (Role::Player, RoomCommand::StartGame) => {
                self.handle_start_game(conn_id, &user_id).await;
            }
            (Role::Player, RoomCommand::ChatPlayer { content, quick_key }) => {
                self.handle_player_chat(conn_id, &user_id, content, quick_key).await;
            }
            (Role::Player, RoomCommand::React {
                message_id,
                emoji,
                op,
            }) => {
                self.handle_reaction(conn_id, &user_id, message_id, &emoji, op).await;
            }
            (Role::Player, RoomCommand::Leave) => self.handle_player_leave(conn_id, &user_id).await,
            (Role::Player, RoomCommand::Kick { user_id: target }) => {
                self.handle_kick(conn_id, &user_id, &target).await;
            }
            (Role::Player, RoomCommand::ApproveJoin { request_id }) => {
                self.handle_join_verdict(conn_id, &user_id, request_id, true).await;
            }
            (Role::Player, RoomCommand::DeclineJoin { request_id }) => {
                self.handle_join_verdict(conn_id, &user_id, request_id, false).await;
            }
            (Role::Player, RoomCommand::AddAiPlayer { ai_profile_id }) => {
                self.handle_add_ai(conn_id, &user_id, ai_profile_id).await;
            }
            (Role::Player, RoomCommand::RemoveAiPlayer { user_id: target }) => {
                self.handle_remove_ai(conn_id, &user_id, &target).await;
            }
            (Role::Spectator, RoomCommand::ChatSpectator { content }) => {
                self.handle_spectator_chat(conn_id, &user_id, content).await;
            }
            (Role::Spectator, RoomCommand::Predict { winner }) => {
                self.handle_predict(conn_id, &user_id, winner).await;
            }
            (Role::Spectator, RoomCommand::RootFor { user_id: target }) => {
                self.handle_root_for(conn_id, &user_id, target).await;
            }
            (Role::Spectator, RoomCommand::QueueJoin) => {
                self.handle_queue_join(conn_id, &user_id).await;
            }
            (Role::Spectator, RoomCommand::QueueLeave) => {
                self.handle_queue_leave(conn_id, &user_id).await;
            }
            (Role::Spectator, RoomCommand::Leave) => {
                self.handle_spectator_leave(conn_id, &user_id).await;
            }
            (_, other) => {
                self.send_error(
                    conn_id,
                    ErrorKind::Unauthorized,
                    format!("{} is not available to your role", command_name(&other)),
                )
                .await;
            }
        }
    }

    // ------------------------------------------------------------------
    // Turn commands
    // ------------------------------------------------------------------

    async fn handle_roll(&mut self, conn_id: ConnectionId, user_id: &UserId) {
        match self.state.roll(user_id, &mut self.dice_rng) {
            Ok(outcome) => {
                self.note_player_activity(user_id);
                self.broadcast(&RoomEvent::DiceRolled {
                    user_id: user_id.clone(),
                    dice: outcome.dice,
                    kept_mask: outcome.kept_mask,
                    rolls_remaining: outcome.rolls_remaining,
                    roll_number: outcome.roll_number,
                })
                .await;
                self.persist(vec![GameEvent::TurnRolled {
                    user_id: user_id.clone(),
                    dice: outcome.dice,
                    roll_number: outcome.roll_number,
                    rolls_remaining: outcome.rolls_remaining,
                }])
                .await;
                self.send_turn_hints().await;
                self.reset_afk_timers();
            }
            Err(error) => self.send_error(conn_id, error.kind(), error.to_string()).await,
        }
    }

    async fn handle_keep_edit(&mut self, conn_id: ConnectionId, user_id: &UserId, edit: KeepEdit) {
        let result = match edit {
            KeepEdit::Toggle(index) => self.state.toggle_keep(user_id, index),
            KeepEdit::KeepAll => self.state.keep_all(user_id),
            KeepEdit::ReleaseAll => self.state.release_all(user_id),
        };
        match result {
            Ok(kept_mask) => {
                self.note_player_activity(user_id);
                self.broadcast(&RoomEvent::KeptChanged {
                    user_id: user_id.clone(),
                    kept_mask,
                })
                .await;
                self.persist(vec![GameEvent::DiceKeptToggled {
                    user_id: user_id.clone(),
                    kept_mask,
                }])
                .await;
                self.reset_afk_timers();
            }
            Err(error) => self.send_error(conn_id, error.kind(), error.to_string()).await,
        }
    }

    async fn handle_score(&mut self, conn_id: ConnectionId, user_id: &UserId, category: Category) {
        let now = self.clock.now();
        match self.state.score(user_id, category, now) {
            Ok(outcome) => {
                self.note_player_activity(user_id);
                self.apply_score_outcome(user_id, category, outcome, false).await;
            }
            Err(error) => self.send_error(conn_id, error.kind(), error.to_string()).await,
        }
    }

    /// Everything that follows a committed score, shared by the human, AFK
    /// and AI paths: broadcasts, highlight, persistence, advance handling.
    pub(super) async fn apply_score_outcome(
        &mut self,
        user_id: &UserId,
        category: Category,
        outcome: crate::game::ScoreOutcome,
        auto: bool,
    ) {
        let now = self.clock.now();
        self.broadcast(&RoomEvent::TurnScored {
            user_id: user_id.clone(),
            category,
            points: outcome.points,
            totals: outcome.totals,
            auto,
        })
        .await;

        if category == Category::Dicee && outcome.points > 0 {
            let player_name = self
                .state
                .player(user_id)
                .map(|p| p.display_name.clone())
                .unwrap_or_default();
            self.lobby
                .highlight(Highlight {
                    kind: HighlightKind::Dicee,
                    player_name,
                    room_code: self.state.code.clone(),
                })
                .await;
        }

        let mut events = vec![GameEvent::TurnScored {
            user_id: user_id.clone(),
            category,
            points: outcome.points,
            at: now,
        }];

        match &outcome.advance {
            TurnAdvance::NextPlayer(next) => {
                self.broadcast(&RoomEvent::TurnStarted {
                    user_id: next.clone(),
                    turn_number: self.state.turn_number,
                    round_number: self.state.round_number,
                })
                .await;
            }
            TurnAdvance::GameOver => {
                let rankings = self.state.rankings.clone().unwrap_or_default();
                let predictions = self.spectators.resolve_predictions(&rankings);
                self.broadcast(&RoomEvent::GameOver {
                    rankings: rankings.clone(),
                    predictions,
                })
                .await;
                if let Some(winner) = rankings.first() {
                    self.lobby
                        .highlight(Highlight {
                            kind: HighlightKind::GameOver,
                            player_name: winner.display_name.clone(),
                            room_code: self.state.code.clone(),
                        })
                        .await;
                }
                events.push(GameEvent::GameOver {
                    rankings,
                    at: now,
                });
                self.cancel_turn_timers();
                self.start_finished_ttl();
            }
        }

        self.persist(events).await;
        self.notify_lobby().await;

        if matches!(outcome.advance, TurnAdvance::NextPlayer(_)) {
            self.send_turn_hints().await;
            self.arm_turn_timers();
        }
    }

    /// A player did something on their own turn: their idle strikes reset.
    fn note_player_activity(&mut self, user_id: &UserId) {
        let now = self.clock.now();
        if let Some(player) = self.state.player_mut(user_id) {
            player.turns_consecutive_afk = 0;
            player.last_seen_at = Some(now);
        }
    }

    // ------------------------------------------------------------------
    // Host commands
    // ------------------------------------------------------------------

    fn caller_is_host(&self, user_id: &UserId) -> bool {
        self.state.host().is_some_and(|h| &h.user_id == user_id)
    }

    async fn handle_start_game(&mut self, conn_id: ConnectionId, user_id: &UserId) {
        match self.state.start_countdown(user_id) {
            Ok(()) => {
                let seconds = self.config.game.starting_countdown_secs;
                tracing::info!(room_code = %self.state.code, "Countdown started");
                self.broadcast(&RoomEvent::GameStarting { seconds }).await;
                self.start_countdown_timer();
                self.notify_lobby().await;
            }
            Err(error) => self.send_error(conn_id, error.kind(), error.to_string()).await,
        }
    }

    async fn handle_kick(&mut self, conn_id: ConnectionId, caller: &UserId, target: &UserId) {
        if !self.caller_is_host(caller) {
            self.send_error(conn_id, ErrorKind::Unauthorized, "Only the host can kick")
                .await;
            return;
        }
        if caller == target {
            self.send_error(conn_id, ErrorKind::IllegalState, "You cannot kick yourself")
                .await;
            return;
        }
        if self.state.player(target).is_none() {
            self.send_error(conn_id, ErrorKind::NotFound, "No such player").await;
            return;
        }

        tracing::info!(room_code = %self.state.code, %target, "Player kicked");
        let target_name = self
            .state
            .player(target)
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| target.to_string());
        self.state.banned_users.push(target.clone());
        self.post_system_chat(&format!("{target_name} was removed from the room"))
            .await;

        if self.state.phase == GamePhase::Waiting {
            let _ = self.state.remove_waiting_player(target);
            self.broadcast(&RoomEvent::PlayerLeft {
                user_id: target.clone(),
            })
            .await;
            self.promote_from_queue().await;
        } else {
            self.abandon_player(target, "was removed by the host").await;
        }

        // Their transports are no longer welcome
        self.drop_user_connections(target);
        self.persist(Vec::new()).await;
        self.notify_lobby().await;
    }

    async fn handle_join_verdict(
        &mut self,
        conn_id: ConnectionId,
        caller: &UserId,
        request_id: JoinRequestId,
        approved: bool,
    ) {
        if !self.caller_is_host(caller) {
            self.send_error(
                conn_id,
                ErrorKind::Unauthorized,
                "Only the host rules on join requests",
            )
            .await;
            return;
        }
        let Some(request) = self.join_requests.remove(&request_id) else {
            self.send_error(conn_id, ErrorKind::NotFound, "No such join request").await;
            return;
        };

        if approved {
            let ttl = self.config.server.join_approval_ttl_secs;
            let expires = self.clock.now() + chrono::Duration::seconds(ttl as i64);
            self.approvals
                .insert(request.user_id.clone(), (request_id, expires));
        }
        self.broadcast(&RoomEvent::JoinRequestResolved {
            request_id,
            approved,
        })
        .await;
        self.lobby.join_request_resolved(request, approved).await;
    }

    async fn handle_add_ai(
        &mut self,
        conn_id: ConnectionId,
        caller: &UserId,
        ai_profile_id: Option<String>,
    ) {
        if !self.caller_is_host(caller) {
            self.send_error(conn_id, ErrorKind::Unauthorized, "Only the host seats AI players")
                .await;
            return;
        }
        match self.seat_ai_player(ai_profile_id).await {
            Ok(()) => {
                self.persist(Vec::new()).await;
                self.notify_lobby().await;
            }
            Err((kind, message)) => self.send_error(conn_id, kind, message).await,
        }
    }

    async fn handle_remove_ai(&mut self, conn_id: ConnectionId, caller: &UserId, target: &UserId) {
        if !self.caller_is_host(caller) {
            self.send_error(conn_id, ErrorKind::Unauthorized, "Only the host removes AI players")
                .await;
            return;
        }
        let is_ai = self
            .state
            .player(target)
            .is_some_and(|p| p.kind.is_ai());
        if !is_ai {
            self.send_error(conn_id, ErrorKind::NotFound, "No such AI player").await;
            return;
        }
        match self.state.remove_waiting_player(target) {
            Ok(_) => {
                self.engines.remove(target);
                self.broadcast(&RoomEvent::PlayerLeft {
                    user_id: target.clone(),
                })
                .await;
                self.persist(Vec::new()).await;
                self.notify_lobby().await;
            }
            Err(error) => self.send_error(conn_id, error.kind(), error.to_string()).await,
        }
    }

    // ------------------------------------------------------------------
    // Chat & reactions
    // ------------------------------------------------------------------

    async fn handle_player_chat(
        &mut self,
        conn_id: ConnectionId,
        user_id: &UserId,
        content: Option<String>,
        quick_key: Option<String>,
    ) {
        let display_name = self.display_name_of(conn_id);
        match self.chat.player_message(
            user_id,
            &display_name,
            content,
            quick_key,
            &self.config.protocol,
            self.clock.now(),
        ) {
            Ok(message) => {
                // Reset the idle clock if the chatter is the current player
                if self.state.current_user_id() == Some(user_id) {
                    self.reset_afk_timers();
                }
                self.broadcast(&RoomEvent::ChatMessage {
                    scope: ChatScope::Player,
                    message,
                })
                .await;
            }
            Err((kind, message)) => self.send_error(conn_id, kind, message).await,
        }
    }

    async fn handle_spectator_chat(
        &mut self,
        conn_id: ConnectionId,
        user_id: &UserId,
        content: String,
    ) {
        let display_name = self.display_name_of(conn_id);
        match self.chat.spectator_message(
            user_id,
            &display_name,
            &content,
            &self.config.protocol,
            self.clock.now(),
        ) {
            Ok(message) => {
                self.broadcast_spectators(&RoomEvent::ChatMessage {
                    scope: ChatScope::Spectator,
                    message,
                })
                .await;
            }
            Err((kind, message)) => self.send_error(conn_id, kind, message).await,
        }
    }

    async fn handle_reaction(
        &mut self,
        conn_id: ConnectionId,
        user_id: &UserId,
        message_id: crate::protocol::MessageId,
        emoji: &str,
        op: ReactionOp,
    ) {
        match self.chat.react(user_id, message_id, emoji, op) {
            Ok(()) => {
                self.broadcast(&RoomEvent::ReactionUpdated {
                    message_id,
                    emoji: emoji.to_string(),
                    user_id: user_id.clone(),
                    op,
                })
                .await;
            }
            Err((kind, message)) => self.send_error(conn_id, kind, message).await,
        }
    }

    fn display_name_of(&self, conn_id: ConnectionId) -> String {
        self.connections
            .get(&conn_id)
            .map(|c| c.display_name.clone())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Join requests (lobby-forwarded)
    // ------------------------------------------------------------------

    pub(super) async fn handle_join_request(&mut self, request: JoinRequest) {
        if self.state.phase != GamePhase::Waiting
            || self.state.players.len() >= usize::from(self.state.config.max_players)
        {
            self.lobby.join_request_resolved(request, false).await;
            return;
        }
        let request_id = request.id;
        self.join_requests.insert(request_id, request.clone());
        if let Some(host) = self.state.host() {
            let host_id = host.user_id.clone();
            self.send_to_user(&host_id, &RoomEvent::JoinRequestReceived { request })
                .await;
        }
    }

    pub(super) async fn handle_cancel_join_request(&mut self, request_id: JoinRequestId) {
        if self.join_requests.remove(&request_id).is_some() {
            self.broadcast(&RoomEvent::JoinRequestResolved {
                request_id,
                approved: false,
            })
            .await;
        }
    }
}

enum KeepEdit {
    Toggle(usize),
    KeepAll,
    ReleaseAll,
}

fn command_name(command: &RoomCommand) -> &'static str {
    match command {
        RoomCommand::RoomJoin { .. } => "ROOM_JOIN",
        RoomCommand::StartGame => "START_GAME",
        RoomCommand::Roll => "ROLL",
        RoomCommand::ToggleKeep { .. } => "TOGGLE_KEEP",
        RoomCommand::KeepAll => "KEEP_ALL",
        RoomCommand::ReleaseAll => "RELEASE_ALL",
        RoomCommand::Score { .. } => "SCORE",
        RoomCommand::ChatPlayer { .. } => "CHAT_PLAYER",
        RoomCommand::React { .. } => "REACT",
        RoomCommand::Leave => "LEAVE",
        RoomCommand::Kick { .. } => "KICK",
        RoomCommand::ApproveJoin { .. } => "APPROVE_JOIN",
        RoomCommand::DeclineJoin { .. } => "DECLINE_JOIN",
        RoomCommand::AddAiPlayer { .. } => "ADD_AI_PLAYER",
        RoomCommand::RemoveAiPlayer { .. } => "REMOVE_AI_PLAYER",
        RoomCommand::ChatSpectator { .. } => "CHAT_SPECTATOR",
        RoomCommand::Predict { .. } => "PREDICT",
        RoomCommand::RootFor { .. } => "ROOT_FOR",
        RoomCommand::QueueJoin => "QUEUE_JOIN",
        RoomCommand::QueueLeave => "QUEUE_LEAVE",
    }
}
