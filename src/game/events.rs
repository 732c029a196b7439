//! Turn-level game events: the append-only log a room persists alongside its
//! snapshot. Replaying the log from empty reconstructs the same durable
//! state the last transition produced (chat history excluded, it is bounded
//! and volatile).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::{Identity, RoomCode, UserId};

use super::category::Category;
use super::dice::{Dice, KeptMask};
use super::state::{GameState, PlayerKind, PresenceState, RankingEntry, RoomConfig};

/// One entry in a room's event log.
///
/// Events carry their resulting values (rolled dice, committed points) so
/// replay never has to re-run the PRNG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    #[serde(rename = "player.joined")]
    PlayerJoined {
        identity: Identity,
        kind: PlayerKind,
        seat_index: usize,
        at: DateTime<Utc>,
    },
    #[serde(rename = "game.started")]
    GameStarted {
        player_order: Vec<UserId>,
        rng_seed: u64,
        at: DateTime<Utc>,
    },
    #[serde(rename = "turn.rolled")]
    TurnRolled {
        user_id: UserId,
        dice: Dice,
        roll_number: u8,
        rolls_remaining: u8,
    },
    #[serde(rename = "dice.kept.toggled")]
    DiceKeptToggled { user_id: UserId, kept_mask: KeptMask },
    #[serde(rename = "turn.scored")]
    TurnScored {
        user_id: UserId,
        category: Category,
        points: u32,
        at: DateTime<Utc>,
    },
    #[serde(rename = "player.disconnected")]
    PlayerDisconnected {
        user_id: UserId,
        reconnect_deadline: DateTime<Utc>,
    },
    #[serde(rename = "player.abandoned")]
    PlayerAbandoned { user_id: UserId },
    #[serde(rename = "game.over")]
    GameOver {
        rankings: Vec<RankingEntry>,
        at: DateTime<Utc>,
    },
}

/// Rebuild a room's durable state by folding the event log over an empty
/// room. The reconstruction applies recorded values directly rather than
/// re-validating commands, so any log a live room wrote is replayable.
pub fn replay(code: RoomCode, config: RoomConfig, log: &[GameEvent]) -> GameState {
    let mut state = GameState::new(code, config, 0);

    for event in log {
        match event {
            GameEvent::PlayerJoined {
                identity,
                kind,
                seat_index,
                at,
            } => {
                let mut record =
                    super::state::PlayerRecord::new(identity.clone(), kind.clone(), *seat_index, *at);
                record.is_host = state.players.is_empty();
                state.players.push(record);
            }
            GameEvent::GameStarted {
                player_order,
                rng_seed,
                at,
            } => {
                state.player_order = player_order.clone();
                state.rng_seed = *rng_seed;
                state.current_player_index = 0;
                state.turn_number = 1;
                state.round_number = 1;
                state.started_at = Some(*at);
                state.turn_started_at = Some(*at);
                state.phase = super::state::GamePhase::TurnRoll;
                if let Some(player) = state.current_player_mut() {
                    player.begin_turn();
                }
            }
            GameEvent::TurnRolled {
                user_id,
                dice,
                roll_number,
                rolls_remaining,
            } => {
                if let Some(player) = state.player_mut(user_id) {
                    player.current_dice = Some(*dice);
                    player.roll_number = *roll_number;
                    player.rolls_remaining = *rolls_remaining;
                }
                state.phase = super::state::GamePhase::TurnDecide;
            }
            GameEvent::DiceKeptToggled { user_id, kept_mask } => {
                if let Some(player) = state.player_mut(user_id) {
                    player.kept_mask = *kept_mask;
                }
            }
            GameEvent::TurnScored {
                user_id,
                category,
                points,
                at,
            } => {
                let turn_number = state.turn_number;
                if let Some(player) = state.player_mut(user_id) {
                    player.scorecard.set(*category, *points);
                    player.current_dice = None;
                    player.kept_mask = [false; super::DICE_COUNT];
                    if player.scorecard.is_complete() {
                        player.finished_turn = Some(turn_number);
                    }
                }
                replay_advance(&mut state, *at);
            }
            GameEvent::PlayerDisconnected {
                user_id,
                reconnect_deadline,
            } => {
                if let Some(player) = state.player_mut(user_id) {
                    player.presence = PresenceState::Disconnected;
                    player.reconnect_deadline = Some(*reconnect_deadline);
                }
            }
            GameEvent::PlayerAbandoned { user_id } => {
                if let Some(player) = state.player_mut(user_id) {
                    player.presence = PresenceState::Abandoned;
                    player.reconnect_deadline = None;
                }
            }
            GameEvent::GameOver { rankings, at } => {
                state.phase = super::state::GamePhase::GameOver;
                state.completed_at = Some(*at);
                state.turn_started_at = None;
                state.rankings = Some(rankings.clone());
            }
        }
    }

    state
}

/// Turn rotation during replay, mirroring the live `advance_turn` without
/// re-ranking (the `game.over` event carries the authoritative rankings).
fn replay_advance(state: &mut GameState, at: DateTime<Utc>) {
    let everyone_done = state.active_players().all(|p| p.scorecard.is_complete());
    if everyone_done {
        // The subsequent game.over event finishes the job
        return;
    }
    let len = state.player_order.len();
    if len == 0 {
        return;
    }
    for step in 1..=len {
        let candidate = (state.current_player_index + step) % len;
        let open = state
            .player_order
            .get(candidate)
            .and_then(|id| state.player(id))
            .is_some_and(|p| p.is_active() && !p.scorecard.is_complete());
        if open {
            if candidate <= state.current_player_index {
                state.round_number = (state.round_number + 1).min(super::MAX_TURNS);
            }
            state.current_player_index = candidate;
            break;
        }
    }
    state.turn_number += 1;
    state.turn_started_at = Some(at);
    state.phase = super::state::GamePhase::TurnRoll;
    if let Some(player) = state.current_player_mut() {
        player.begin_turn();
    }
}
