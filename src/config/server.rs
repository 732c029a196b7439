//! Server and lobby behavior configuration types.

use super::defaults::{
    default_chat_history, default_chat_rate_limit, default_chat_rate_window_secs,
    default_finished_retention_secs, default_finished_room_ttl, default_invite_ttl_secs,
    default_join_approval_ttl, default_join_request_ttl_secs, default_max_connections_per_ip,
    default_max_rooms,
};
use serde::{Deserialize, Serialize};

/// Server configuration for room lifecycle and connection policy.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Maximum number of concurrently live rooms
    #[serde(default = "default_max_rooms")]
    pub max_rooms: usize,
    /// Seconds a room survives after `game_over` before the actor shuts down
    #[serde(default = "default_finished_room_ttl")]
    pub finished_room_ttl_secs: u64,
    /// TTL of a host-approved join authorization (seconds)
    #[serde(default = "default_join_approval_ttl")]
    pub join_approval_ttl_secs: u64,
    /// Maximum simultaneous connections accepted from one IP
    #[serde(default = "default_max_connections_per_ip")]
    pub max_connections_per_ip: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_rooms: default_max_rooms(),
            finished_room_ttl_secs: default_finished_room_ttl(),
            join_approval_ttl_secs: default_join_approval_ttl(),
            max_connections_per_ip: default_max_connections_per_ip(),
        }
    }
}

/// Lobby configuration: chat quota, history and social TTLs.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LobbyConfig {
    /// Maximum accepted chat messages per user per rolling window
    #[serde(default = "default_chat_rate_limit")]
    pub chat_rate_limit: u32,
    /// Rolling window for the chat rate limit (seconds)
    #[serde(default = "default_chat_rate_window_secs")]
    pub chat_rate_window_secs: u64,
    /// How many chat messages are replayed to new joiners
    #[serde(default = "default_chat_history")]
    pub chat_history: usize,
    /// Invite lifetime (seconds)
    #[serde(default = "default_invite_ttl_secs")]
    pub invite_ttl_secs: u64,
    /// Join-request lifetime (seconds)
    #[serde(default = "default_join_request_ttl_secs")]
    pub join_request_ttl_secs: u64,
    /// How long finished rooms stay in the directory for recent results (seconds)
    #[serde(default = "default_finished_retention_secs")]
    pub finished_retention_secs: u64,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            chat_rate_limit: default_chat_rate_limit(),
            chat_rate_window_secs: default_chat_rate_window_secs(),
            chat_history: default_chat_history(),
            invite_ttl_secs: default_invite_ttl_secs(),
            join_request_ttl_secs: default_join_request_ttl_secs(),
            finished_retention_secs: default_finished_retention_secs(),
        }
    }
}
