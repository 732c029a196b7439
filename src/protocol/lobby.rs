//! Lobby wire protocol: client commands and server events.
//!
//! Envelopes are JSON objects tagged with an `UPPERCASE_SNAKE` `type` and an
//! optional `payload`. Server events additionally carry an ISO-8601
//! `timestamp` added by [`super::Envelope`].

use serde::{Deserialize, Serialize};

use super::error_codes::ErrorKind;
use super::room_codes::RoomCode;
use super::types::{
    ChatMessage, Highlight, Invite, InviteId, JoinRequest, JoinRequestId, OnlineUser,
    RoomStatusUpdate, UserId,
};

/// Commands a lobby client (or a game room, for directory updates) may send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LobbyCommand {
    /// Broadcast a chat message after rate limiting
    LobbyChat { content: String },
    /// Send the current room list to the caller
    GetRooms,
    /// Send the unique-user list to the caller
    GetOnlineUsers,
    /// Directory update from a game room: room came into existence
    RoomCreated { room: RoomStatusUpdate },
    /// Directory update from a game room: any status change
    RoomUpdated { room: RoomStatusUpdate },
    /// Directory update from a game room: room is gone
    RoomClosed { code: RoomCode },
    /// Ask the host of `room_code` for a seat; cancels any prior request
    RequestJoin { room_code: RoomCode },
    /// Withdraw a pending join request
    CancelJoinRequest {
        request_id: JoinRequestId,
        room_code: RoomCode,
    },
    /// Invite another user to a room; expires after the invite TTL
    SendInvite {
        to_user_id: UserId,
        room_code: RoomCode,
    },
    /// Revoke a previously sent invite
    CancelInvite { invite_id: InviteId },
}

/// Action discriminator on directory delta events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomUpdateAction {
    Created,
    Updated,
    Closed,
}

/// Events the lobby pushes to its clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LobbyEvent {
    /// First frame after connect: the current presence picture
    PresenceInit {
        online_count: usize,
        users: Vec<OnlineUser>,
    },
    /// A user's first concurrent connection appeared
    PresenceJoin { user: OnlineUser },
    /// A user's last connection closed
    PresenceLeave { user_id: UserId },
    /// Full room list, in directory order
    LobbyRoomsList { rooms: Vec<RoomStatusUpdate> },
    /// One directory delta
    LobbyRoomUpdate {
        action: RoomUpdateAction,
        #[serde(skip_serializing_if = "Option::is_none")]
        room: Option<Box<RoomStatusUpdate>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<RoomCode>,
    },
    /// One accepted chat message
    LobbyChatMessage { message: ChatMessage },
    /// Recent chat replayed to a new joiner
    LobbyChatHistory { messages: Vec<ChatMessage> },
    /// Unique-user list, answering `GET_ONLINE_USERS`
    LobbyOnlineUsers { users: Vec<OnlineUser> },
    /// An invite addressed to this user arrived
    InviteReceived { invite: Invite },
    /// An invite addressed to this user was revoked or expired
    InviteCancelled { invite_id: InviteId },
    /// This user's join request was forwarded to the room host
    JoinRequestSent { request: JoinRequest },
    /// This user's join request was cancelled (superseded, withdrawn, expired)
    JoinRequestCancelled { request_id: JoinRequestId },
    /// The host approved; the caller may join the room within the TTL
    JoinRequestApproved {
        request_id: JoinRequestId,
        room_code: RoomCode,
        approval_ttl_secs: u64,
    },
    /// The host declined
    JoinRequestDeclined {
        request_id: JoinRequestId,
        room_code: RoomCode,
    },
    /// The join request could not be placed
    JoinRequestError { kind: ErrorKind, message: String },
    /// A highlight moment fanned out from some room
    LobbyHighlight { highlight: Highlight },
    /// Typed refusal for the caller; never closes the connection
    LobbyError { kind: ErrorKind, message: String },
}
