//! Protocol configuration types: wire limits and identifier formats.

use super::defaults::{
    default_max_chat_length, default_max_display_name_length, default_max_message_size,
    default_room_code_length,
};
use serde::{Deserialize, Serialize};

/// Protocol configuration for message validation.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProtocolConfig {
    /// Room code length (restricted alphabet, see `protocol::room_codes`)
    #[serde(default = "default_room_code_length")]
    pub room_code_length: usize,
    /// Maximum display name length in characters
    #[serde(default = "default_max_display_name_length")]
    pub max_display_name_length: usize,
    /// Maximum chat message length in characters, after trimming
    #[serde(default = "default_max_chat_length")]
    pub max_chat_length: usize,
    /// Maximum inbound frame size in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            room_code_length: default_room_code_length(),
            max_display_name_length: default_max_display_name_length(),
            max_chat_length: default_max_chat_length(),
            max_message_size: default_max_message_size(),
        }
    }
}
