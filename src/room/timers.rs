//! Timer scheduling and firing for one room.
//!
//! Every timer is a spawned sleep that posts back to the mailbox with the
//! token it was issued; the handlers compare tokens before acting, so a
//! superseded timer is a no-op and cancellation is just issuing a new token.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::game::{GameEvent, GamePhase, PresenceState};
use crate::protocol::{RoomEvent, UserId};
use crate::runtime::{TimerToken, TimerTokens};

use super::{RoomActor, RoomMsg, TimerKind};

impl RoomActor {
    pub(super) fn schedule(&self, kind: TimerKind, token: TimerToken, delay: Duration) {
        let tx = self.self_tx.clone();
        let clock = self.clock.clone();
        tokio::spawn(async move {
            clock.sleep(delay).await;
            let _ = tx.send(RoomMsg::TimerFired { kind, token }).await;
        });
    }

    pub(super) fn start_countdown_timer(&mut self) {
        let token = self.countdown_tokens.issue();
        self.schedule(
            TimerKind::Countdown,
            token,
            Duration::from_secs(self.config.game.starting_countdown_secs),
        );
    }

    /// Arm AFK (and optional hard turn-timeout) timers for a human turn, or
    /// the pacing step for an AI turn. Any prior turn timers go stale.
    pub(super) fn arm_turn_timers(&mut self) {
        self.cancel_turn_timers();
        if self.state.phase != GamePhase::TurnRoll && self.state.phase != GamePhase::TurnDecide {
            return;
        }
        let Some(player) = self.state.current_player() else {
            return;
        };
        if player.kind.is_ai() {
            self.schedule_ai_step();
            return;
        }

        let token = self.afk_tokens.issue();
        let warning = self.config.game.afk_warning_secs;
        let timeout = self.config.game.afk_timeout_secs;
        self.schedule(TimerKind::AfkWarning, token, Duration::from_secs(warning));
        self.schedule(TimerKind::AfkTimeout, token, Duration::from_secs(timeout));

        let turn_timeout = self.state.config.turn_timeout_seconds;
        if turn_timeout > 0 {
            self.schedule(
                TimerKind::TurnTimeout,
                token,
                Duration::from_secs(turn_timeout),
            );
        }
    }

    /// The current player acted: restart their idle clock.
    pub(super) fn reset_afk_timers(&mut self) {
        self.arm_turn_timers();
    }

    pub(super) fn cancel_turn_timers(&mut self) {
        self.afk_tokens.invalidate();
        self.ai_tokens.invalidate();
    }

    /// Start a grace timer for a freshly disconnected player and return the
    /// deadline written into their record.
    pub(super) fn arm_grace_timer(&mut self, user_id: &UserId) -> DateTime<Utc> {
        let grace_secs = self.config.game.grace_period_secs;
        let deadline = self.clock.now() + chrono::Duration::seconds(grace_secs as i64);
        let token = self
            .grace_tokens
            .entry(user_id.clone())
            .or_default()
            .issue();
        self.schedule(
            TimerKind::Grace {
                user_id: user_id.clone(),
            },
            token,
            Duration::from_secs(grace_secs),
        );
        deadline
    }

    pub(super) fn cancel_grace_timer(&mut self, user_id: &UserId) {
        if let Some(tokens) = self.grace_tokens.get_mut(user_id) {
            tokens.invalidate();
        }
    }

    /// After a restart, every restored disconnected seat gets its grace
    /// timer re-armed against the restored deadline.
    pub(super) fn restore_grace_timers(&mut self) {
        let now = self.clock.now();
        let pending: Vec<(UserId, DateTime<Utc>)> = self
            .state
            .players
            .iter()
            .filter(|p| p.presence == PresenceState::Disconnected)
            .filter_map(|p| p.reconnect_deadline.map(|d| (p.user_id.clone(), d)))
            .collect();
        for (user_id, deadline) in pending {
            let remaining = (deadline - now).to_std().unwrap_or(Duration::ZERO);
            let token = self
                .grace_tokens
                .entry(user_id.clone())
                .or_insert_with(TimerTokens::new)
                .issue();
            self.schedule(TimerKind::Grace { user_id }, token, remaining);
        }
    }

    pub(super) fn start_finished_ttl(&mut self) {
        let token = self.finished_tokens.issue();
        self.schedule(
            TimerKind::FinishedTtl,
            token,
            Duration::from_secs(self.config.server.finished_room_ttl_secs),
        );
    }

    pub(super) async fn handle_timer(&mut self, kind: TimerKind, token: TimerToken) {
        match kind {
            TimerKind::Countdown => self.handle_countdown_elapsed(token).await,
            TimerKind::AfkWarning => self.handle_afk_warning(token).await,
            TimerKind::AfkTimeout | TimerKind::TurnTimeout => {
                self.handle_afk_timeout(token).await;
            }
            TimerKind::Grace { user_id } => self.handle_grace_expired(&user_id, token).await,
            TimerKind::AiStep => self.handle_ai_step(token).await,
            TimerKind::FinishedTtl => {
                if self.finished_tokens.is_current(token) {
                    self.close_room("finished").await;
                }
            }
        }
    }

    async fn handle_countdown_elapsed(&mut self, token: TimerToken) {
        if !self.countdown_tokens.is_current(token) || self.state.phase != GamePhase::Countdown {
            return;
        }
        if self.state.active_player_count() < usize::from(crate::game::MIN_PLAYERS) {
            tracing::info!(room_code = %self.state.code, "Countdown elapsed below minimum seats; back to waiting");
            self.state.cancel_countdown();
            self.notify_lobby().await;
            return;
        }
        let now = self.clock.now();
        let first = match self.state.begin_game(now) {
            Ok(first) => first,
            Err(error) => {
                tracing::error!(room_code = %self.state.code, %error, "Countdown elapsed on unstartable room");
                self.state.cancel_countdown();
                return;
            }
        };
        tracing::info!(room_code = %self.state.code, first_player = %first, "Game started");
        self.broadcast(&RoomEvent::GameStarted {
            player_order: self.state.player_order.clone(),
        })
        .await;
        self.broadcast(&RoomEvent::TurnStarted {
            user_id: first,
            turn_number: self.state.turn_number,
            round_number: self.state.round_number,
        })
        .await;
        self.persist(vec![GameEvent::GameStarted {
            player_order: self.state.player_order.clone(),
            rng_seed: self.state.rng_seed,
            at: now,
        }])
        .await;
        self.notify_lobby().await;
        self.send_turn_hints().await;
        self.arm_turn_timers();
    }

    async fn handle_afk_warning(&mut self, token: TimerToken) {
        if !self.afk_tokens.is_current(token) {
            return;
        }
        if !matches!(
            self.state.phase,
            GamePhase::TurnRoll | GamePhase::TurnDecide
        ) {
            return;
        }
        let Some(player) = self.state.current_player() else {
            return;
        };
        if player.kind.is_ai() {
            return;
        }
        let seconds_remaining = self
            .config
            .game
            .afk_timeout_secs
            .saturating_sub(self.config.game.afk_warning_secs);
        self.broadcast(&RoomEvent::AfkWarning {
            user_id: player.user_id.clone(),
            seconds_remaining,
        })
        .await;
    }

    async fn handle_afk_timeout(&mut self, token: TimerToken) {
        if !self.afk_tokens.is_current(token) {
            return;
        }
        if !matches!(
            self.state.phase,
            GamePhase::TurnRoll | GamePhase::TurnDecide
        ) {
            return;
        }
        let Some(player) = self.state.current_player() else {
            return;
        };
        if player.kind.is_ai() {
            return;
        }
        let afk_user = player.user_id.clone();
        let now = self.clock.now();
        let (category, outcome, struck_out) = match self.state.afk_auto_score(now) {
            Ok(result) => result,
            Err(error) => {
                tracing::error!(room_code = %self.state.code, %error, "AFK auto-score failed");
                return;
            }
        };
        tracing::info!(
            room_code = %self.state.code,
            user_id = %afk_user,
            %category,
            "Auto-scored AFK turn"
        );
        self.apply_score_outcome(&afk_user, category, outcome, true)
            .await;
        if struck_out && self.state.phase != GamePhase::GameOver {
            self.abandon_player(&afk_user, "went missing for three turns")
                .await;
        }
    }

    async fn handle_grace_expired(&mut self, user_id: &UserId, token: TimerToken) {
        let current = self
            .grace_tokens
            .get(user_id)
            .is_some_and(|tokens| tokens.is_current(token));
        if !current {
            return;
        }
        let still_disconnected = self
            .state
            .player(user_id)
            .is_some_and(|p| p.presence == PresenceState::Disconnected);
        if !still_disconnected {
            return;
        }
        tracing::info!(room_code = %self.state.code, %user_id, "Grace period expired");
        self.abandon_player(user_id, "did not reconnect in time").await;
    }
}
