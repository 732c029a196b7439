//! Dice, scoring and the authoritative game state machine.
//!
//! Everything in this module is pure: transitions take the injected RNG and
//! timestamps as arguments and never touch a clock, a socket, or a global.
//! The room actor owns a [`GameState`] and drives it through
//! [`transitions`]; the append-only [`events`] log makes any reachable state
//! reconstructible.

pub mod category;
pub mod dice;
pub mod events;
pub mod scorecard;
pub mod scoring;
pub mod state;
pub mod transitions;

pub use category::Category;
pub use dice::{Dice, KeptMask, DICE_FACES};
pub use events::GameEvent;
pub use scorecard::{ScoreTotals, Scorecard};
pub use scoring::score_dice;
pub use state::{
    GamePhase, GameState, PlayerKind, PlayerRecord, PresenceState, RankingEntry, RoomConfig,
};
pub use transitions::{GameError, ScoreOutcome, TurnAdvance};

/// Number of dice in play.
pub const DICE_COUNT: usize = 5;

/// Rolls available per turn.
pub const MAX_ROLLS_PER_TURN: u8 = 3;

/// Rounds in a complete game; one category scored per round per player.
pub const MAX_TURNS: u32 = 13;

/// Fewest players a game can start with.
pub const MIN_PLAYERS: u8 = 2;

/// Most seats a room can be configured with.
pub const MAX_PLAYERS: u8 = 4;

/// Bonus awarded when the upper-section subtotal reaches the threshold.
pub const UPPER_BONUS: u32 = 35;

/// Upper-section subtotal needed for the bonus.
pub const UPPER_BONUS_THRESHOLD: u32 = 63;

/// Consecutive AFK turns before a seat is abandoned.
pub const MAX_CONSECUTIVE_AFK_TURNS: u8 = 3;
