use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::{Identity, PlayerSummary, RoomCode, UserId};

use super::dice::{Dice, KeptMask};
use super::scorecard::Scorecard;
use super::{DICE_COUNT, MAX_ROLLS_PER_TURN};

// ============================================================================
// GAME PHASE STATE MACHINE
// ============================================================================
//
// ```text
// [*] --> Waiting: Room Created
//
// Waiting --> Countdown: Host starts with >= MIN_PLAYERS seated
// Countdown --> TurnRoll: Countdown elapses; player order freezes
// TurnRoll --> TurnDecide: Current player rolls
// TurnDecide --> TurnDecide: Keep-mask edits, rerolls
// TurnDecide --> TurnScore: Category committed
// TurnScore --> TurnRoll: Next player's turn begins
// TurnScore --> GameOver: Every active player has a full card
//
// Paused is a sideband reachable from any playing phase when the last
// connected human drops; the pre-pause phase is stored and restored on the
// first reattach.
// ```
//
// `TurnRoll` means the current player has rolls remaining and no dice
// committed for this turn yet. `TurnDecide` is entered after a roll (dice
// exist; rolls may remain). `TurnScore` is the transient scoring commit.
// `GameOver` is terminal and records rankings.

/// Phase of the room's game state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Waiting,
    Countdown,
    TurnRoll,
    TurnDecide,
    TurnScore,
    GameOver,
    Paused,
}

impl GamePhase {
    /// Phases in which the game is in progress (pausable, AFK-timed).
    pub const fn is_playing(self) -> bool {
        matches!(
            self,
            GamePhase::Countdown | GamePhase::TurnRoll | GamePhase::TurnDecide | GamePhase::TurnScore
        )
    }
}

/// Human seat or an AI driven by a named profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlayerKind {
    Human,
    Ai {
        #[serde(rename = "aiProfileId")]
        ai_profile_id: String,
    },
}

impl PlayerKind {
    pub const fn is_ai(&self) -> bool {
        matches!(self, PlayerKind::Ai { .. })
    }

    pub const fn is_human(&self) -> bool {
        matches!(self, PlayerKind::Human)
    }
}

/// Presence of a seated player.
///
/// `Abandoned` is terminal for the game instance: the seat is released and
/// the player is skipped in turn order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceState {
    Connected,
    Disconnected,
    Abandoned,
}

/// Per-room configuration chosen at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomConfig {
    pub max_players: u8,
    /// Hard per-turn timeout in seconds; 0 disables it
    pub turn_timeout_seconds: u64,
    pub is_public: bool,
    pub allow_spectators: bool,
    /// Send expected-value hints to the player whose turn it is
    pub show_hints: bool,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_players: 4,
            turn_timeout_seconds: 0,
            is_public: true,
            allow_spectators: true,
            show_hints: false,
        }
    }
}

/// One seat in a room: identity, card, live turn state, presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar_seed: String,
    #[serde(flatten)]
    pub kind: PlayerKind,
    pub seat_index: usize,
    pub scorecard: Scorecard,
    pub current_dice: Option<Dice>,
    pub kept_mask: KeptMask,
    pub rolls_remaining: u8,
    pub roll_number: u8,
    pub presence: PresenceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconnect_deadline: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<DateTime<Utc>>,
    pub joined_at: DateTime<Utc>,
    pub turns_consecutive_afk: u8,
    pub is_host: bool,
    /// Turn number on which the 13th category was committed; ranking tie-break
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_turn: Option<u32>,
}

impl PlayerRecord {
    pub fn new(identity: Identity, kind: PlayerKind, seat_index: usize, now: DateTime<Utc>) -> Self {
        Self {
            user_id: identity.user_id,
            display_name: identity.display_name,
            avatar_seed: identity.avatar_seed,
            kind,
            seat_index,
            scorecard: Scorecard::new(),
            current_dice: None,
            kept_mask: [false; DICE_COUNT],
            rolls_remaining: MAX_ROLLS_PER_TURN,
            roll_number: 0,
            presence: PresenceState::Connected,
            reconnect_deadline: None,
            last_seen_at: Some(now),
            joined_at: now,
            turns_consecutive_afk: 0,
            is_host: false,
            finished_turn: None,
        }
    }

    pub const fn is_active(&self) -> bool {
        !matches!(self.presence, PresenceState::Abandoned)
    }

    /// Reset the per-turn fields for a fresh turn.
    pub fn begin_turn(&mut self) {
        self.rolls_remaining = MAX_ROLLS_PER_TURN;
        self.roll_number = 0;
        self.current_dice = None;
        self.kept_mask = [false; DICE_COUNT];
    }

    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            avatar_seed: self.avatar_seed.clone(),
            kind: self.kind.clone(),
            seat_index: self.seat_index,
            is_host: self.is_host,
            presence: self.presence,
            grand_total: self.scorecard.grand_total(),
        }
    }
}

/// Final standing of one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub rank: usize,
    pub user_id: UserId,
    pub display_name: String,
    pub grand_total: u32,
}

/// The authoritative, durable state of one room.
///
/// Everything here survives a cold restart; live connections and timers are
/// volatile and rebuilt by the room actor around this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub code: RoomCode,
    pub phase: GamePhase,
    /// Pre-pause phase; present exactly while `phase == Paused`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_phase: Option<GamePhase>,
    pub config: RoomConfig,
    pub players: Vec<PlayerRecord>,
    /// Seat order frozen when the countdown elapses; empty while waiting
    pub player_order: Vec<UserId>,
    pub current_player_index: usize,
    /// Total turns taken across all players, 1-based during play
    pub turn_number: u32,
    /// 1..=13; advances when the turn wraps back to the first active seat
    pub round_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rankings: Option<Vec<RankingEntry>>,
    /// Seed for the per-game dice PRNG; stored so replay is possible
    pub rng_seed: u64,
    pub banned_users: Vec<UserId>,
    /// Optional display identity for themed rooms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

impl GameState {
    pub fn new(code: RoomCode, config: RoomConfig, rng_seed: u64) -> Self {
        Self {
            code,
            phase: GamePhase::Waiting,
            resume_phase: None,
            config,
            players: Vec::new(),
            player_order: Vec::new(),
            current_player_index: 0,
            turn_number: 0,
            round_number: 0,
            turn_started_at: None,
            started_at: None,
            completed_at: None,
            paused_at: None,
            rankings: None,
            rng_seed,
            banned_users: Vec::new(),
            identity: None,
        }
    }

    pub fn player(&self, user_id: &UserId) -> Option<&PlayerRecord> {
        self.players.iter().find(|p| &p.user_id == user_id)
    }

    pub fn player_mut(&mut self, user_id: &UserId) -> Option<&mut PlayerRecord> {
        self.players.iter_mut().find(|p| &p.user_id == user_id)
    }

    pub fn host(&self) -> Option<&PlayerRecord> {
        self.players.iter().find(|p| p.is_host)
    }

    /// Players still in the game (not abandoned).
    pub fn active_players(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.players.iter().filter(|p| p.is_active())
    }

    pub fn active_player_count(&self) -> usize {
        self.active_players().count()
    }

    /// The user whose turn it is, during play.
    pub fn current_user_id(&self) -> Option<&UserId> {
        if !matches!(
            self.phase,
            GamePhase::TurnRoll | GamePhase::TurnDecide | GamePhase::TurnScore
        ) && self.phase != GamePhase::Paused
        {
            return None;
        }
        self.player_order.get(self.current_player_index)
    }

    pub fn current_player(&self) -> Option<&PlayerRecord> {
        let user_id = self.current_user_id()?.clone();
        self.player(&user_id)
    }

    pub fn current_player_mut(&mut self) -> Option<&mut PlayerRecord> {
        let user_id = self.current_user_id()?.clone();
        self.player_mut(&user_id)
    }

    pub fn is_banned(&self, user_id: &UserId) -> bool {
        self.banned_users.contains(user_id)
    }

    /// Lowest free seat index.
    pub fn next_seat_index(&self) -> usize {
        let mut seat = 0;
        while self.players.iter().any(|p| p.seat_index == seat) {
            seat += 1;
        }
        seat
    }

    /// Checks the structural invariants every transition must preserve.
    /// Used by tests and by persistence on load.
    pub fn invariants_hold(&self) -> bool {
        let one_host = self.players.is_empty()
            || self.players.iter().filter(|p| p.is_host).count() == 1;
        let turn_budget = self
            .players
            .iter()
            .all(|p| p.rolls_remaining + p.roll_number <= MAX_ROLLS_PER_TURN);
        let paused_consistent =
            (self.phase == GamePhase::Paused) == self.resume_phase.is_some();
        let order_is_seated = self
            .player_order
            .iter()
            .all(|id| self.player(id).is_some());
        one_host && turn_budget && paused_consistent && order_is_seated
    }
}
