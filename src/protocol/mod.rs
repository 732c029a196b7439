// Protocol module: wire envelopes, identifiers, room codes, validation

use chrono::{DateTime, Utc};
use serde::Serialize;

pub mod error_codes;
pub mod lobby;
pub mod room;
pub mod room_codes;
pub mod types;
pub mod validation;

// From error_codes
pub use error_codes::ErrorKind;

// From room_codes
pub use room_codes::{generate_room_code, RoomCode, RoomCodeError, ROOM_CODE_ALPHABET, ROOM_CODE_LENGTH};

// From types
pub use types::{
    is_allowed_reaction, ChatMessage, ChatMessageKind, ConnectionId, Highlight, HighlightKind,
    Identity, Invite, InviteId, JoinRequest, JoinRequestId, MessageId, OnlineUser, PlayerSummary,
    PredictionId, Role, RoomStatus, RoomStatusUpdate, UserId, GAME_NAME, REACTION_EMOJIS,
};

// From lobby
pub use lobby::{LobbyCommand, LobbyEvent, RoomUpdateAction};

// From room
pub use room::{
    quick_chat_phrase, CategoryHint, ChatScope, PlayerView, PredictionResult, ReactionOp,
    RoomCommand, RoomCreateOptions, RoomEvent, RoomStateView, SpectatorView, QUICK_CHAT,
};

/// Server-to-client envelope: the tagged event plus the emission timestamp,
/// rendered as `{type, payload?, timestamp}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Envelope<E: Serialize> {
    #[serde(flatten)]
    pub event: E,
    pub timestamp: DateTime<Utc>,
}

impl<E: Serialize> Envelope<E> {
    pub fn new(event: E, timestamp: DateTime<Utc>) -> Self {
        Self { event, timestamp }
    }

    /// Serialize for the wire. Serialization of our event types cannot fail;
    /// if it ever does the connection drops the frame and logs.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_type_payload_timestamp() {
        let event = LobbyEvent::PresenceLeave {
            user_id: UserId::from("u-9"),
        };
        let envelope = Envelope::new(event, Utc::now());
        let value: serde_json::Value =
            serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "PRESENCE_LEAVE");
        assert_eq!(value["payload"]["user_id"], "u-9");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn reaction_set_is_exactly_five() {
        assert_eq!(REACTION_EMOJIS.len(), 5);
        assert!(is_allowed_reaction("🎲"));
        assert!(!is_allowed_reaction("💀"));
    }
}
