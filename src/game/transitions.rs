//! Pure transitions over [`GameState`].
//!
//! Every public method validates phase and caller, mutates the state, and
//! returns what changed. Timestamps and randomness are passed in; a
//! transition applied to equal states with equal inputs yields equal states.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::protocol::{ErrorKind, Identity, UserId};
use crate::runtime::SeededRng;

use super::category::Category;
use super::dice::{reroll_unkept, roll_all, Dice, KeptMask};
use super::scorecard::ScoreTotals;
use super::scoring::score_dice;
use super::state::{GamePhase, GameState, PlayerKind, PlayerRecord, PresenceState, RankingEntry};
use super::{DICE_COUNT, MAX_CONSECUTIVE_AFK_TURNS, MAX_TURNS, MIN_PLAYERS};

/// Why a transition was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("command is not valid in the {0:?} phase")]
    WrongPhase(GamePhase),
    #[error("it is not your turn")]
    NotCurrentPlayer,
    #[error("no rolls remaining this turn")]
    NoRollsRemaining,
    #[error("no dice have been rolled this turn")]
    NoDiceThisTurn,
    #[error("die index {0} is out of range")]
    DieIndexOutOfRange(usize),
    #[error("category {0} is already scored")]
    CategoryAlreadyScored(Category),
    #[error("only the host may do that")]
    NotHost,
    #[error("need at least {MIN_PLAYERS} players to start, have {0}")]
    NotEnoughPlayers(usize),
    #[error("the room is full")]
    RoomFull,
    #[error("you are banned from this room")]
    Banned,
    #[error("already seated in this room")]
    AlreadySeated,
    #[error("no such player in this room")]
    UnknownPlayer,
}

impl GameError {
    /// The surface-stable error kind this failure maps to on the wire.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            GameError::NotHost => ErrorKind::Unauthorized,
            GameError::Banned | GameError::RoomFull => ErrorKind::RoomUnavailable,
            GameError::UnknownPlayer => ErrorKind::NotFound,
            GameError::AlreadySeated => ErrorKind::Conflict,
            _ => ErrorKind::IllegalState,
        }
    }
}

/// What happened after a score was committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnAdvance {
    /// Play continues; the named player's turn began
    NextPlayer(UserId),
    /// Every active player finished their card
    GameOver,
}

/// Result of committing a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreOutcome {
    pub category: Category,
    pub points: u32,
    pub totals: ScoreTotals,
    pub advance: TurnAdvance,
}

/// Result of a roll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollOutcome {
    pub dice: Dice,
    pub kept_mask: KeptMask,
    pub rolls_remaining: u8,
    pub roll_number: u8,
}

impl GameState {
    /// Seat a player. Only possible while waiting; the first seat is host.
    pub fn add_player(
        &mut self,
        identity: Identity,
        kind: PlayerKind,
        now: DateTime<Utc>,
    ) -> Result<&PlayerRecord, GameError> {
        if self.is_banned(&identity.user_id) {
            return Err(GameError::Banned);
        }
        if self.phase != GamePhase::Waiting {
            return Err(GameError::WrongPhase(self.phase));
        }
        if self.players.iter().any(|p| p.user_id == identity.user_id) {
            return Err(GameError::AlreadySeated);
        }
        if self.players.len() >= usize::from(self.config.max_players) {
            return Err(GameError::RoomFull);
        }
        let seat = self.next_seat_index();
        let mut record = PlayerRecord::new(identity, kind, seat, now);
        record.is_host = self.players.is_empty();
        self.players.push(record);
        // SAFETY: the record was pushed on the previous line.
        #[allow(clippy::unwrap_used)]
        Ok(self.players.last().unwrap())
    }

    /// Remove a seat entirely; only while waiting. Host reassignment is the
    /// caller's job when the removed seat was hosting.
    pub fn remove_waiting_player(&mut self, user_id: &UserId) -> Result<PlayerRecord, GameError> {
        if self.phase != GamePhase::Waiting {
            return Err(GameError::WrongPhase(self.phase));
        }
        let idx = self
            .players
            .iter()
            .position(|p| &p.user_id == user_id)
            .ok_or(GameError::UnknownPlayer)?;
        Ok(self.players.remove(idx))
    }

    /// Host pressed start: enter the countdown.
    pub fn start_countdown(&mut self, caller: &UserId) -> Result<(), GameError> {
        if self.phase != GamePhase::Waiting {
            return Err(GameError::WrongPhase(self.phase));
        }
        let host = self.host().ok_or(GameError::UnknownPlayer)?;
        if &host.user_id != caller {
            return Err(GameError::NotHost);
        }
        let seated = self.active_player_count();
        if seated < usize::from(MIN_PLAYERS) {
            return Err(GameError::NotEnoughPlayers(seated));
        }
        self.phase = GamePhase::Countdown;
        Ok(())
    }

    /// Countdown cancelled (player left, room no longer startable).
    pub fn cancel_countdown(&mut self) {
        if self.phase == GamePhase::Countdown {
            self.phase = GamePhase::Waiting;
        }
    }

    /// Countdown elapsed: freeze the player order and begin the first turn.
    /// Returns the first player to act.
    pub fn begin_game(&mut self, now: DateTime<Utc>) -> Result<UserId, GameError> {
        if self.phase != GamePhase::Countdown {
            return Err(GameError::WrongPhase(self.phase));
        }
        let mut order: Vec<(usize, UserId)> = self
            .active_players()
            .map(|p| (p.seat_index, p.user_id.clone()))
            .collect();
        order.sort_by_key(|(seat, _)| *seat);
        self.player_order = order.into_iter().map(|(_, id)| id).collect();
        self.current_player_index = 0;
        self.turn_number = 1;
        self.round_number = 1;
        self.started_at = Some(now);
        self.begin_current_turn(now);
        // SAFETY: start_countdown guaranteed at least MIN_PLAYERS seats.
        #[allow(clippy::unwrap_used)]
        Ok(self.player_order.first().cloned().unwrap())
    }

    fn begin_current_turn(&mut self, now: DateTime<Utc>) {
        self.phase = GamePhase::TurnRoll;
        self.turn_started_at = Some(now);
        if let Some(player) = self.current_player_mut() {
            player.begin_turn();
        }
    }

    /// Roll the dice: all five on the first roll, unkept dice afterwards.
    pub fn roll(&mut self, caller: &UserId, rng: &mut SeededRng) -> Result<RollOutcome, GameError> {
        if !matches!(self.phase, GamePhase::TurnRoll | GamePhase::TurnDecide) {
            return Err(GameError::WrongPhase(self.phase));
        }
        if self.current_user_id() != Some(caller) {
            return Err(GameError::NotCurrentPlayer);
        }
        let Some(player) = self.current_player_mut() else {
            return Err(GameError::UnknownPlayer);
        };
        if player.rolls_remaining == 0 {
            return Err(GameError::NoRollsRemaining);
        }

        let dice = match player.current_dice.as_mut() {
            None => {
                let rolled = roll_all(rng);
                player.current_dice = Some(rolled);
                rolled
            }
            Some(dice) => {
                let kept = player.kept_mask;
                reroll_unkept(dice, &kept, rng);
                *dice
            }
        };
        player.rolls_remaining -= 1;
        player.roll_number += 1;
        let outcome = RollOutcome {
            dice,
            kept_mask: player.kept_mask,
            rolls_remaining: player.rolls_remaining,
            roll_number: player.roll_number,
        };
        self.phase = GamePhase::TurnDecide;
        Ok(outcome)
    }

    /// Flip one die's keep flag. Involutive per index.
    pub fn toggle_keep(&mut self, caller: &UserId, index: usize) -> Result<KeptMask, GameError> {
        let player = self.decide_phase_player(caller)?;
        if index >= DICE_COUNT {
            return Err(GameError::DieIndexOutOfRange(index));
        }
        player.kept_mask[index] = !player.kept_mask[index];
        Ok(player.kept_mask)
    }

    pub fn keep_all(&mut self, caller: &UserId) -> Result<KeptMask, GameError> {
        let player = self.decide_phase_player(caller)?;
        player.kept_mask = [true; DICE_COUNT];
        Ok(player.kept_mask)
    }

    pub fn release_all(&mut self, caller: &UserId) -> Result<KeptMask, GameError> {
        let player = self.decide_phase_player(caller)?;
        player.kept_mask = [false; DICE_COUNT];
        Ok(player.kept_mask)
    }

    /// Replace the whole keep mask at once; same gating as the edits above.
    /// This is how AI keep decisions are applied.
    pub fn set_kept(&mut self, caller: &UserId, mask: KeptMask) -> Result<KeptMask, GameError> {
        let player = self.decide_phase_player(caller)?;
        player.kept_mask = mask;
        Ok(player.kept_mask)
    }

    /// Keep-mask edits require the decide phase and at least one roll taken.
    fn decide_phase_player(&mut self, caller: &UserId) -> Result<&mut PlayerRecord, GameError> {
        if self.phase != GamePhase::TurnDecide {
            return Err(GameError::WrongPhase(self.phase));
        }
        if self.current_user_id() != Some(caller) {
            return Err(GameError::NotCurrentPlayer);
        }
        let Some(player) = self.current_player_mut() else {
            return Err(GameError::UnknownPlayer);
        };
        if player.roll_number == 0 {
            return Err(GameError::NoDiceThisTurn);
        }
        Ok(player)
    }

    /// Commit a category and advance the turn.
    pub fn score(
        &mut self,
        caller: &UserId,
        category: Category,
        now: DateTime<Utc>,
    ) -> Result<ScoreOutcome, GameError> {
        let phase_ok = match self.phase {
            GamePhase::TurnDecide => true,
            GamePhase::TurnRoll => self
                .current_player()
                .is_some_and(|p| p.rolls_remaining == 0),
            _ => false,
        };
        if !phase_ok {
            return Err(GameError::WrongPhase(self.phase));
        }
        if self.current_user_id() != Some(caller) {
            return Err(GameError::NotCurrentPlayer);
        }
        let Some(player) = self.current_player() else {
            return Err(GameError::UnknownPlayer);
        };
        if player.roll_number == 0 || player.current_dice.is_none() {
            return Err(GameError::NoDiceThisTurn);
        }
        if player.scorecard.is_scored(category) {
            return Err(GameError::CategoryAlreadyScored(category));
        }
        self.commit_score(category, now)
    }

    /// Commit the given category for the current player, scoring whatever
    /// dice are on the table (all-zero evaluation when none were rolled),
    /// then advance. Shared by `score` and the AFK path.
    fn commit_score(
        &mut self,
        category: Category,
        now: DateTime<Utc>,
    ) -> Result<ScoreOutcome, GameError> {
        let turn_number = self.turn_number;
        let Some(player) = self.current_player_mut() else {
            return Err(GameError::UnknownPlayer);
        };
        let dice = player.current_dice.unwrap_or([0; DICE_COUNT]);
        let points = score_dice(&dice, category);
        if !player.scorecard.set(category, points) {
            return Err(GameError::CategoryAlreadyScored(category));
        }
        player.current_dice = None;
        player.kept_mask = [false; DICE_COUNT];
        if player.scorecard.is_complete() {
            player.finished_turn = Some(turn_number);
        }
        let totals = player.scorecard.totals();
        self.phase = GamePhase::TurnScore;
        let advance = self.advance_turn(now);
        Ok(ScoreOutcome {
            category,
            points,
            totals,
            advance,
        })
    }

    /// AFK fallback: pick the highest-scoring open category for the current
    /// dice; ties break to the lexicographically first wire name.
    pub fn afk_pick_category(&self) -> Option<Category> {
        let player = self.current_player()?;
        let dice = player.current_dice.unwrap_or([0; DICE_COUNT]);
        player
            .scorecard
            .unscored()
            .max_by(|a, b| {
                score_dice(&dice, *a)
                    .cmp(&score_dice(&dice, *b))
                    // max_by keeps the later of equal elements; order so the
                    // lexicographically first name wins the tie
                    .then_with(|| b.wire_name().cmp(a.wire_name()))
            })
    }

    /// Score on behalf of an AFK player and bump their strike counter.
    /// Returns the chosen category plus the usual outcome, and whether the
    /// strike limit made the seat abandoned.
    pub fn afk_auto_score(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<(Category, ScoreOutcome, bool), GameError> {
        if !matches!(self.phase, GamePhase::TurnRoll | GamePhase::TurnDecide) {
            return Err(GameError::WrongPhase(self.phase));
        }
        let category = self.afk_pick_category().ok_or(GameError::UnknownPlayer)?;
        let afk_user = self.current_user_id().cloned().ok_or(GameError::UnknownPlayer)?;
        let outcome = self.commit_score(category, now)?;
        let mut abandoned = false;
        if let Some(player) = self.player_mut(&afk_user) {
            player.turns_consecutive_afk += 1;
            abandoned = player.turns_consecutive_afk >= MAX_CONSECUTIVE_AFK_TURNS;
        }
        Ok((category, outcome, abandoned))
    }

    /// Move to the next active seat or end the game.
    fn advance_turn(&mut self, now: DateTime<Utc>) -> TurnAdvance {
        let everyone_done = self
            .active_players()
            .all(|p| p.scorecard.is_complete());
        if everyone_done || self.active_player_count() == 0 {
            self.finish_game(now);
            return TurnAdvance::GameOver;
        }

        let len = self.player_order.len();
        let mut next_index = self.current_player_index;
        let mut wrapped = false;
        for step in 1..=len {
            let candidate = (self.current_player_index + step) % len;
            let active_with_open_card = self
                .player_order
                .get(candidate)
                .and_then(|id| self.player(id))
                .is_some_and(|p| p.is_active() && !p.scorecard.is_complete());
            if active_with_open_card {
                next_index = candidate;
                wrapped = candidate <= self.current_player_index;
                break;
            }
        }

        self.current_player_index = next_index;
        self.turn_number += 1;
        if wrapped {
            self.round_number = (self.round_number + 1).min(MAX_TURNS);
        }
        self.begin_current_turn(now);
        // SAFETY: at least one active player with an open card exists, so the
        // loop above always found a candidate and current_user_id is Some.
        #[allow(clippy::unwrap_used)]
        TurnAdvance::NextPlayer(self.current_user_id().cloned().unwrap())
    }

    /// Terminal transition: compute rankings and close the game.
    pub fn finish_game(&mut self, now: DateTime<Utc>) {
        self.phase = GamePhase::GameOver;
        self.resume_phase = None;
        self.completed_at = Some(now);
        self.turn_started_at = None;
        self.rankings = Some(self.compute_rankings());
    }

    /// Rankings: active players above abandoned ones, then grand total
    /// descending; equal totals break to whoever finished their card on an
    /// earlier turn, then to the lower seat.
    pub fn compute_rankings(&self) -> Vec<RankingEntry> {
        let mut entries: Vec<&PlayerRecord> = self.players.iter().collect();
        entries.sort_by(|a, b| {
            b.is_active()
                .cmp(&a.is_active())
                .then_with(|| b.scorecard.grand_total().cmp(&a.scorecard.grand_total()))
                .then_with(|| {
                    a.finished_turn
                        .unwrap_or(u32::MAX)
                        .cmp(&b.finished_turn.unwrap_or(u32::MAX))
                })
                .then_with(|| a.seat_index.cmp(&b.seat_index))
        });
        entries
            .into_iter()
            .enumerate()
            .map(|(i, p)| RankingEntry {
                rank: i + 1,
                user_id: p.user_id.clone(),
                display_name: p.display_name.clone(),
                grand_total: p.scorecard.grand_total(),
            })
            .collect()
    }

    /// Mark a seat abandoned. If it was the current player's seat the turn
    /// advances; the result reports what the game did next.
    pub fn mark_abandoned(
        &mut self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<TurnAdvance>, GameError> {
        let was_current = self.current_user_id() == Some(user_id);
        let Some(player) = self.player_mut(user_id) else {
            return Err(GameError::UnknownPlayer);
        };
        player.presence = PresenceState::Abandoned;
        player.reconnect_deadline = None;

        if self.active_player_count() == 0 {
            self.finish_game(now);
            return Ok(Some(TurnAdvance::GameOver));
        }
        if was_current && matches!(self.phase, GamePhase::TurnRoll | GamePhase::TurnDecide) {
            return Ok(Some(self.advance_turn(now)));
        }
        Ok(None)
    }

    /// All humans are gone: stop the clock where it stands.
    pub fn pause(&mut self, now: DateTime<Utc>) {
        if self.phase.is_playing() {
            self.resume_phase = Some(self.phase);
            self.phase = GamePhase::Paused;
            self.paused_at = Some(now);
        }
    }

    /// First human returned: restore the pre-pause phase and restart the
    /// turn clock from now. Returns the restored phase.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Option<GamePhase> {
        let restored = self.resume_phase.take()?;
        self.phase = restored;
        self.paused_at = None;
        if matches!(restored, GamePhase::TurnRoll | GamePhase::TurnDecide) {
            self.turn_started_at = Some(now);
        }
        Some(restored)
    }

    /// True when every connected human has dropped (AI seats do not keep a
    /// room awake).
    pub fn all_humans_disconnected(&self) -> bool {
        let mut humans = self
            .active_players()
            .filter(|p| p.kind.is_human())
            .peekable();
        if humans.peek().is_none() {
            return false;
        }
        humans.all(|p| p.presence == PresenceState::Disconnected)
    }

    /// Transfer the host seat to the longest-connected active human.
    /// Returns the new host, if any human remains to take it.
    pub fn transfer_host(&mut self) -> Option<UserId> {
        for player in &mut self.players {
            player.is_host = false;
        }
        let new_host = self
            .players
            .iter()
            .filter(|p| p.is_active() && p.kind.is_human())
            // Connected players outrank disconnected ones, then seniority
            .min_by_key(|p| (p.presence != PresenceState::Connected, p.joined_at))
            .map(|p| p.user_id.clone())?;
        if let Some(player) = self.player_mut(&new_host) {
            player.is_host = true;
        }
        Some(new_host)
    }
}
