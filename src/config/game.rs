//! Game timing configuration.
//!
//! Structural rules (five dice, thirteen turns, three rolls) are compile-time
//! constants in `crate::game`; everything an operator may want to tune per
//! deployment lives here.

use super::defaults::{
    default_afk_timeout_secs, default_afk_warning_secs, default_default_max_players,
    default_grace_period_secs, default_room_chat_history, default_starting_countdown_secs,
    default_turn_timeout_secs,
};
use serde::{Deserialize, Serialize};

/// Timing and capacity knobs applied to every room.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GameTimingConfig {
    /// Countdown between `start_game` and the first turn (seconds)
    #[serde(default = "default_starting_countdown_secs")]
    pub starting_countdown_secs: u64,
    /// Idle time on a turn before the AFK warning fires (seconds)
    #[serde(default = "default_afk_warning_secs")]
    pub afk_warning_secs: u64,
    /// Idle time on a turn before the turn is auto-scored (seconds)
    #[serde(default = "default_afk_timeout_secs")]
    pub afk_timeout_secs: u64,
    /// Reconnection grace after a disconnect before the seat is abandoned (seconds)
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
    /// Hard per-turn timeout; 0 disables it
    #[serde(default = "default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,
    /// Bounded in-room chat history replayed to joiners
    #[serde(default = "default_room_chat_history")]
    pub room_chat_history: usize,
    /// Seats in a room when the creator does not specify a count
    #[serde(default = "default_default_max_players")]
    pub default_max_players: u8,
}

impl Default for GameTimingConfig {
    fn default() -> Self {
        Self {
            starting_countdown_secs: default_starting_countdown_secs(),
            afk_warning_secs: default_afk_warning_secs(),
            afk_timeout_secs: default_afk_timeout_secs(),
            grace_period_secs: default_grace_period_secs(),
            turn_timeout_secs: default_turn_timeout_secs(),
            room_chat_history: default_room_chat_history(),
            default_max_players: default_default_max_players(),
        }
    }
}
