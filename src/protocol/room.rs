//! Room wire protocol: client commands, server events, and the role-filtered
//! state views they carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::game::{
    Category, Dice, GamePhase, KeptMask, PlayerKind, PresenceState, RankingEntry, RoomConfig,
    ScoreTotals,
};

use super::error_codes::ErrorKind;
use super::room_codes::RoomCode;
use super::types::{
    ChatMessage, JoinRequest, JoinRequestId, MessageId, Role, UserId,
};

/// Quick-chat phrases addressable by key; quick messages skip length
/// validation but not ordering or history bounds.
pub const QUICK_CHAT: [(&str, &str); 6] = [
    ("gg", "Good game!"),
    ("gl", "Good luck!"),
    ("nice", "Nice roll!"),
    ("wow", "Wow!"),
    ("ouch", "Ouch!"),
    ("hurry", "Hurry up!"),
];

/// Look up a quick-chat phrase.
pub fn quick_chat_phrase(key: &str) -> Option<&'static str> {
    QUICK_CHAT
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, phrase)| *phrase)
}

/// Add or remove a reaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReactionOp {
    Add,
    Remove,
}

/// Which chat stream a message belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatScope {
    Player,
    Spectator,
}

/// Room settings a creator may choose; unspecified fields fall back to the
/// server-side defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_players: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_timeout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_spectators: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_hints: Option<bool>,
}

/// Commands a room client may send. `ROOM_JOIN` must be the first message on
/// every connection; everything after it is gated by role and phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomCommand {
    /// First message: attach to the room as player or spectator
    RoomJoin {
        role: Role,
        user_id: UserId,
        display_name: String,
        avatar_seed: String,
        /// Honored only when this join creates the room
        #[serde(default, skip_serializing_if = "Option::is_none")]
        options: Option<RoomCreateOptions>,
        /// Approval token for private rooms
        #[serde(default, skip_serializing_if = "Option::is_none")]
        approval: Option<JoinRequestId>,
    },
    /// Host only, waiting phase: begin the starting countdown
    StartGame,
    /// Current player: roll all unkept dice
    Roll,
    /// Current player: flip one die's keep flag
    ToggleKeep { index: usize },
    /// Current player: keep every die
    KeepAll,
    /// Current player: release every die
    ReleaseAll,
    /// Current player: commit a category
    Score { category: Category },
    /// Player chat: free text or a quick-chat key
    ChatPlayer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quick_key: Option<String>,
    },
    /// React to a retained chat message with one of the fixed emojis
    React {
        message_id: MessageId,
        emoji: String,
        op: ReactionOp,
    },
    /// Give up the seat (players) or detach (spectators)
    Leave,
    /// Host only: remove and ban a player
    Kick { user_id: UserId },
    /// Host only: accept a pending join request
    ApproveJoin { request_id: JoinRequestId },
    /// Host only: reject a pending join request
    DeclineJoin { request_id: JoinRequestId },
    /// Host only, waiting phase: seat an AI opponent
    AddAiPlayer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ai_profile_id: Option<String>,
    },
    /// Host only, waiting phase: remove an AI opponent
    RemoveAiPlayer { user_id: UserId },
    /// Spectator chat (separate stream from player chat)
    ChatSpectator { content: String },
    /// Spectator: predict the winner before the final round
    Predict { winner: UserId },
    /// Spectator: declare who they are cheering for
    RootFor { user_id: UserId },
    /// Spectator: queue for a seat should one open while waiting
    QueueJoin,
    /// Spectator: leave the seat queue
    QueueLeave,
}

/// Expected-value hint for one open category. Only ever sent to the player
/// whose turn it is, and only when the room enables hints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryHint {
    pub category: Category,
    pub immediate_score: u32,
    pub expected_value: f64,
}

/// One player as a viewer is allowed to see them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar_seed: String,
    #[serde(flatten)]
    pub kind: PlayerKind,
    pub seat_index: usize,
    pub is_host: bool,
    pub presence: PresenceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconnect_deadline: Option<DateTime<Utc>>,
    /// Committed categories only; what a slot would score is never shown
    pub scorecard: BTreeMap<Category, u32>,
    pub totals: ScoreTotals,
    pub current_dice: Option<Dice>,
    pub kept_mask: KeptMask,
    pub rolls_remaining: u8,
    pub roll_number: u8,
    /// Strategy hints; present only on the viewer's own record when enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<CategoryHint>>,
}

/// One spectator as shown in room state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SpectatorView {
    pub user_id: UserId,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rooting_for: Option<UserId>,
    pub in_queue: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<usize>,
}

/// The room state a connection receives, already filtered for its role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomStateView {
    pub code: RoomCode,
    pub game: String,
    pub phase: GamePhase,
    pub config: RoomConfig,
    pub turn_number: u32,
    pub round_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_user_id: Option<UserId>,
    pub players: Vec<PlayerView>,
    pub spectators: Vec<SpectatorView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rankings: Option<Vec<RankingEntry>>,
}

/// A spectator's recorded winner guess, resolved at game over.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub user_id: UserId,
    pub display_name: String,
    pub predicted: UserId,
    pub correct: bool,
}

/// Events the room pushes to its clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomEvent {
    /// Reply to `ROOM_JOIN`: granted role and a role-filtered state
    RoomJoined {
        role: Role,
        was_downgraded: bool,
        state: Box<RoomStateView>,
    },
    /// Full state refresh (reconnection, promotion, resume)
    RoomState { state: Box<RoomStateView> },
    PlayerJoined { player: PlayerView },
    PlayerLeft { user_id: UserId },
    SpectatorJoined { spectator: SpectatorView },
    SpectatorLeft { user_id: UserId },
    /// Countdown began; first turn follows after `seconds`
    GameStarting { seconds: u64 },
    /// Countdown elapsed; the order is frozen for the whole game
    GameStarted { player_order: Vec<UserId> },
    TurnStarted {
        user_id: UserId,
        turn_number: u32,
        round_number: u32,
    },
    DiceRolled {
        user_id: UserId,
        dice: Dice,
        kept_mask: KeptMask,
        rolls_remaining: u8,
        roll_number: u8,
    },
    KeptChanged { user_id: UserId, kept_mask: KeptMask },
    TurnScored {
        user_id: UserId,
        category: Category,
        points: u32,
        totals: ScoreTotals,
        /// True when the server scored on behalf of an AFK player
        auto: bool,
    },
    /// The current player has been idle; timeout follows
    AfkWarning {
        user_id: UserId,
        seconds_remaining: u64,
    },
    PlayerPresence {
        user_id: UserId,
        presence: PresenceState,
        #[serde(skip_serializing_if = "Option::is_none")]
        reconnect_deadline: Option<DateTime<Utc>>,
    },
    PlayerAbandoned { user_id: UserId },
    HostChanged { user_id: UserId },
    RoomPaused { paused_at: DateTime<Utc> },
    RoomResumed { phase: GamePhase },
    GameOver {
        rankings: Vec<RankingEntry>,
        predictions: Vec<PredictionResult>,
    },
    ChatMessage { scope: ChatScope, message: ChatMessage },
    ChatHistory {
        scope: ChatScope,
        messages: Vec<ChatMessage>,
    },
    ReactionUpdated {
        message_id: MessageId,
        emoji: String,
        user_id: UserId,
        op: ReactionOp,
    },
    /// Sent to the host when a join request arrives via the lobby
    JoinRequestReceived { request: JoinRequest },
    /// Sent to the host when a pending request resolves or expires
    JoinRequestResolved {
        request_id: JoinRequestId,
        approved: bool,
    },
    /// Expected-value hints for the acting player; never sent to spectators
    StrategyHints { hints: Vec<CategoryHint> },
    /// Spectator seat queue changed
    QueueUpdated { queue: Vec<SpectatorView> },
    PredictionRecorded { user_id: UserId, predicted: UserId },
    /// The room is gone (host left an empty room, TTL elapsed)
    RoomClosed { reason: String },
    /// Typed refusal for the caller; never closes the connection
    RoomError { kind: ErrorKind, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_join_envelope_round_trips() {
        let json = r#"{
            "type": "ROOM_JOIN",
            "payload": {
                "role": "player",
                "user_id": "u-1",
                "display_name": "Astrid",
                "avatar_seed": "seed"
            }
        }"#;
        let cmd: RoomCommand = serde_json::from_str(json).unwrap();
        let RoomCommand::RoomJoin { role, user_id, .. } = cmd else {
            panic!("wrong variant");
        };
        assert_eq!(role, Role::Player);
        assert_eq!(user_id, UserId::from("u-1"));
    }

    #[test]
    fn score_command_carries_category() {
        let cmd: RoomCommand =
            serde_json::from_str(r#"{"type":"SCORE","payload":{"category":"full_house"}}"#)
                .unwrap();
        assert_eq!(
            cmd,
            RoomCommand::Score {
                category: Category::FullHouse
            }
        );
    }

    #[test]
    fn quick_chat_lookup() {
        assert_eq!(quick_chat_phrase("gg"), Some("Good game!"));
        assert_eq!(quick_chat_phrase("nope"), None);
    }

    #[test]
    fn events_tag_uppercase_snake() {
        let event = RoomEvent::PlayerLeft {
            user_id: UserId::from("u"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PLAYER_LEFT");
    }
}
