use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

use super::room_codes::RoomCode;
use crate::game::{PlayerKind, PresenceState};

/// Unique identifier for chat messages
pub type MessageId = Uuid;
/// Unique identifier for invites
pub type InviteId = Uuid;
/// Unique identifier for join requests
pub type JoinRequestId = Uuid;
/// Unique identifier for spectator predictions
pub type PredictionId = Uuid;
/// Identifier of one live transport connection (never leaves the server)
pub type ConnectionId = Uuid;

/// The game this backend hosts; appears verbatim in directory payloads.
pub const GAME_NAME: &str = "dicee";

/// Opaque external user identity. The upstream identity provider guarantees
/// uniqueness; the server never inspects the contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Identity attached to a connection by the upstream auth layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar_seed: String,
}

/// Role a connection plays inside a room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Spectator,
}

/// Directory status of a room as the lobby sees it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Paused,
    Finished,
}

/// Compact per-player line in directory payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar_seed: String,
    #[serde(flatten)]
    pub kind: PlayerKind,
    pub seat_index: usize,
    pub is_host: bool,
    pub presence: PresenceState,
    pub grand_total: u32,
}

/// The canonical message a room sends the lobby to keep the directory
/// consistent. Sent on create, membership change, phase change, round
/// change, pause/resume, game over, and delete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatusUpdate {
    pub code: RoomCode,
    pub game: String,
    pub status: RoomStatus,
    /// Live players, abandoned seats excluded
    pub player_count: usize,
    pub spectator_count: usize,
    pub max_players: u8,
    pub round_number: u32,
    pub total_rounds: u32,
    pub is_public: bool,
    pub allow_spectators: bool,
    pub players: Vec<PlayerSummary>,
    pub host_id: UserId,
    pub host_name: String,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<DateTime<Utc>>,
    /// Optional display identity for themed rooms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

/// The fixed set of reaction emojis accepted on chat messages.
pub const REACTION_EMOJIS: [&str; 5] = ["👍", "😂", "🎲", "🔥", "😮"];

/// Returns true when `emoji` belongs to the fixed reaction set.
pub fn is_allowed_reaction(emoji: &str) -> bool {
    REACTION_EMOJIS.contains(&emoji)
}

/// Kind of chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatMessageKind {
    Text,
    Quick,
    System,
}

/// One chat message in any scope (lobby, room, spectator).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub kind: ChatMessageKind,
    pub user_id: UserId,
    pub display_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// emoji -> reacting users; only emojis from [`REACTION_EMOJIS`] appear
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reactions: BTreeMap<String, BTreeSet<UserId>>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: ChatMessageKind::System,
            user_id: UserId("system".to_string()),
            display_name: String::new(),
            content: content.into(),
            timestamp,
            reactions: BTreeMap::new(),
        }
    }
}

/// An invitation from one user to another to join a room. Expires five
/// minutes after creation; idempotent per (from, to, room).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Invite {
    pub id: InviteId,
    pub room_code: RoomCode,
    pub from_user_id: UserId,
    pub from_display_name: String,
    pub to_user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A request to join a room, routed to the room's host for approval.
/// A user holds at most one pending request; a newer one cancels the prior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub id: JoinRequestId,
    pub room_code: RoomCode,
    pub user_id: UserId,
    pub display_name: String,
    pub avatar_seed: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Kind of lobby-wide highlight moment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HighlightKind {
    /// Five of a kind was scored
    Dicee,
    /// A game finished
    GameOver,
}

/// Compact event a room may fan out to every lobby subscriber.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub kind: HighlightKind,
    pub player_name: String,
    pub room_code: RoomCode,
}

/// One unique online user as reported by lobby presence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUser {
    pub user_id: UserId,
    pub display_name: String,
}
