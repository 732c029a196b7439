use serde::{Deserialize, Serialize};
use std::fmt;

/// Surface-stable error kinds for structured error handling.
///
/// Every refusal a client can observe maps to one of these; the set is part
/// of the wire contract and changes only with a protocol version bump.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Schema validation failure; no state was changed
    Malformed,
    /// Missing identity or not permitted (e.g. non-host issuing a host command)
    Unauthorized,
    /// Command is well-formed but not applicable in the current phase
    IllegalState,
    /// Referenced room/message/invite/request does not exist or expired
    NotFound,
    /// Room is full, closed, or the caller is banned
    RoomUnavailable,
    /// Exceeded a per-user quota
    RateLimited,
    /// Idempotency collision (duplicate invite, duplicate join request)
    Conflict,
    /// Unexpected server-side failure; logged with correlation
    Internal,
}

impl ErrorKind {
    /// Returns a human-readable description of this error kind, suitable for
    /// display to end users or client-side debugging.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Malformed => {
                "The message could not be understood. Check the command type and payload shape."
            }
            Self::Unauthorized => {
                "You are not allowed to do that. Host-only commands require the host seat."
            }
            Self::IllegalState => {
                "That command is not valid right now. The game phase or your turn state does not allow it."
            }
            Self::NotFound => {
                "The referenced room, message, invite, or request does not exist or has expired."
            }
            Self::RoomUnavailable => {
                "The room cannot be joined: it is full, closed, or you have been banned from it."
            }
            Self::RateLimited => {
                "You are sending messages too quickly. Wait a moment and try again."
            }
            Self::Conflict => {
                "A matching invite or join request already exists; the duplicate was ignored."
            }
            Self::Internal => {
                "Something went wrong on the server. The incident has been logged; please retry."
            }
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Malformed => "MALFORMED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::IllegalState => "ILLEGAL_STATE",
            Self::NotFound => "NOT_FOUND",
            Self::RoomUnavailable => "ROOM_UNAVAILABLE",
            Self::RateLimited => "RATE_LIMITED",
            Self::Conflict => "CONFLICT",
            Self::Internal => "INTERNAL",
        };
        f.write_str(name)
    }
}
