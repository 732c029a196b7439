//! Configuration validation functions.

use super::Config;
use crate::game::{DICE_COUNT, MAX_PLAYERS, MIN_PLAYERS};

/// Validate configuration consistency before the server starts.
///
/// Catches operator mistakes that would otherwise surface as confusing
/// mid-game behavior (an AFK warning that never precedes the timeout, rooms
/// that abandon players instantly, zero-length room codes).
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    if config.protocol.room_code_length == 0 {
        anyhow::bail!("protocol.room_code_length must be at least 1");
    }

    if config.protocol.max_chat_length == 0 {
        anyhow::bail!("protocol.max_chat_length must be at least 1");
    }

    if config.game.afk_warning_secs >= config.game.afk_timeout_secs {
        anyhow::bail!(
            "game.afk_warning_secs ({}) must be lower than game.afk_timeout_secs ({})",
            config.game.afk_warning_secs,
            config.game.afk_timeout_secs
        );
    }

    if config.game.grace_period_secs == 0 {
        anyhow::bail!("game.grace_period_secs must be at least 1");
    }

    let seats = config.game.default_max_players;
    if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&seats) {
        anyhow::bail!(
            "game.default_max_players ({seats}) must be within [{MIN_PLAYERS}..{MAX_PLAYERS}]"
        );
    }

    if config.lobby.chat_rate_limit == 0 || config.lobby.chat_rate_window_secs == 0 {
        anyhow::bail!("lobby chat rate limit and window must both be at least 1");
    }

    if config.protocol.max_message_size < DICE_COUNT * 64 {
        anyhow::bail!(
            "protocol.max_message_size ({}) is too small to carry a full room state frame",
            config.protocol.max_message_size
        );
    }

    Ok(())
}
