//! Default value functions for configuration fields.
//!
//! All the default value functions used by serde's `#[serde(default = ...)]`
//! attributes throughout the configuration system, organized by section.

use super::logging::LogFormat;

// =============================================================================
// Port & Root Config
// =============================================================================

pub const fn default_port() -> u16 {
    3646
}

// =============================================================================
// Server Defaults
// =============================================================================

pub const fn default_max_rooms() -> usize {
    1000
}

/// How long a finished room lingers before the actor shuts down (seconds).
pub const fn default_finished_room_ttl() -> u64 {
    300
}

/// TTL of a host-approved join authorization (seconds).
pub const fn default_join_approval_ttl() -> u64 {
    30
}

pub const fn default_max_connections_per_ip() -> usize {
    16
}

// =============================================================================
// Game Timing Defaults
// =============================================================================

pub const fn default_starting_countdown_secs() -> u64 {
    5
}

pub const fn default_afk_warning_secs() -> u64 {
    30
}

pub const fn default_afk_timeout_secs() -> u64 {
    60
}

pub const fn default_grace_period_secs() -> u64 {
    120
}

/// Per-turn hard timeout; 0 disables it and only AFK warning/timeout apply.
pub const fn default_turn_timeout_secs() -> u64 {
    0
}

pub const fn default_room_chat_history() -> usize {
    50
}

pub const fn default_default_max_players() -> u8 {
    4
}

// =============================================================================
// Lobby Defaults
// =============================================================================

pub const fn default_chat_rate_limit() -> u32 {
    30
}

pub const fn default_chat_rate_window_secs() -> u64 {
    60
}

pub const fn default_chat_history() -> usize {
    50
}

pub const fn default_invite_ttl_secs() -> u64 {
    300
}

pub const fn default_join_request_ttl_secs() -> u64 {
    120
}

/// How long finished rooms stay listed for the "recent results" view (seconds).
pub const fn default_finished_retention_secs() -> u64 {
    60
}

// =============================================================================
// Protocol Defaults
// =============================================================================

pub const fn default_room_code_length() -> usize {
    6
}

pub const fn default_max_display_name_length() -> usize {
    32
}

pub const fn default_max_chat_length() -> usize {
    500
}

pub const fn default_max_message_size() -> usize {
    16 * 1024
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    false
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Text
}
