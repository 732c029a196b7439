//! Role-filtered state views.
//!
//! The hard contract: strategy hints (expected values) reach only the player
//! whose turn it is, and only when the room enables them. Spectators get
//! every scorecard in full and never a hint; players additionally see their
//! own live turn state. Committed scores are public to everyone.

use crate::ai::category_hints;
use crate::game::PlayerRecord;
use crate::protocol::{
    PlayerView, Role, RoomEvent, RoomStateView, UserId, GAME_NAME,
};

use super::RoomActor;

impl RoomActor {
    /// Build the state view a connection of `role` (and optionally a known
    /// viewer) is allowed to see.
    pub(super) fn filtered_state(&self, role: Role, viewer: Option<&UserId>) -> RoomStateView {
        let current = self.state.current_user_id().cloned();
        let players = self
            .state
            .players
            .iter()
            .map(|record| {
                let is_viewer = viewer == Some(&record.user_id);
                let wants_hints = role == Role::Player
                    && is_viewer
                    && self.state.config.show_hints
                    && current.as_ref() == Some(&record.user_id);
                self.player_view(record, wants_hints)
            })
            .collect();

        RoomStateView {
            code: self.state.code.clone(),
            game: GAME_NAME.to_string(),
            phase: self.state.phase,
            config: self.state.config.clone(),
            turn_number: self.state.turn_number,
            round_number: self.state.round_number,
            current_user_id: current,
            players,
            spectators: self.spectators.views(),
            turn_started_at: self.state.turn_started_at,
            started_at: self.state.started_at,
            completed_at: self.state.completed_at,
            paused_at: self.state.paused_at,
            rankings: self.state.rankings.clone(),
        }
    }

    fn player_view(&self, record: &PlayerRecord, with_hints: bool) -> PlayerView {
        let hints = if with_hints {
            record
                .current_dice
                .map(|dice| category_hints(&dice, &record.scorecard, record.rolls_remaining))
        } else {
            None
        };
        PlayerView {
            user_id: record.user_id.clone(),
            display_name: record.display_name.clone(),
            avatar_seed: record.avatar_seed.clone(),
            kind: record.kind.clone(),
            seat_index: record.seat_index,
            is_host: record.is_host,
            presence: record.presence,
            reconnect_deadline: record.reconnect_deadline,
            scorecard: record.scorecard.scored_entries(),
            totals: record.scorecard.totals(),
            current_dice: record.current_dice,
            kept_mask: record.kept_mask,
            rolls_remaining: record.rolls_remaining,
            roll_number: record.roll_number,
            hints,
        }
    }

    /// The hint-free view of one player, safe for any audience.
    pub(super) fn player_view_public(&self, user_id: &UserId) -> Option<PlayerView> {
        self.state
            .player(user_id)
            .map(|record| self.player_view(record, false))
    }

    /// Push expected-value hints to the acting player's own connections.
    /// No-op unless the room enables hints, the current player is human,
    /// and there are dice to reason about.
    pub(super) async fn send_turn_hints(&self) {
        if !self.state.config.show_hints {
            return;
        }
        let Some(player) = self.state.current_player() else {
            return;
        };
        if player.kind.is_ai() {
            return;
        }
        let Some(dice) = player.current_dice else {
            return;
        };
        let hints = category_hints(&dice, &player.scorecard, player.rolls_remaining);
        let user_id = player.user_id.clone();
        let event = RoomEvent::StrategyHints { hints };
        let Some(json) = self.envelope(&event) else {
            return;
        };
        for conn in self
            .connections
            .values()
            .filter(|c| c.role == Role::Player && c.user_id == user_id)
        {
            let _ = conn.outbound.send(json.clone()).await;
        }
    }

    /// Full state refresh to every connection of one user, each filtered by
    /// that connection's role.
    pub(super) async fn send_state_refresh_to_user(&self, user_id: &UserId) {
        let targets: Vec<(crate::protocol::ConnectionId, Role)> = self
            .connections
            .iter()
            .filter(|(_, c)| &c.user_id == user_id)
            .map(|(id, c)| (*id, c.role))
            .collect();
        for (conn_id, role) in targets {
            let state = self.filtered_state(role, Some(user_id));
            self.send_to(
                conn_id,
                &RoomEvent::RoomState {
                    state: Box::new(state),
                },
            )
            .await;
        }
    }
}
