//! The AI drive loop.
//!
//! Whenever the current player is an AI seat, the room asks its decision
//! engine for a move, sleeps the engine's thinking estimate (so clients can
//! animate and the pacing feels human), re-checks the phase, validates the
//! decision exactly like a human command, and applies it. Illegal decisions
//! fall back deterministically; the loop re-arms until the turn ends or the
//! room's phase changes underneath it.

use std::time::Duration;

use crate::ai::{optimal, DecisionEngine, GameContext, TurnAction, TurnDecision};
use crate::game::{GameEvent, GamePhase, PlayerKind, PlayerRecord};
use crate::protocol::{RoomEvent, UserId};
use crate::runtime::TimerToken;

use super::{RoomActor, TimerKind};

impl RoomActor {
    /// Schedule the next AI action after the engine's thinking delay.
    /// Called whenever a turn starts or continues with an AI in the seat.
    pub(super) fn schedule_ai_step(&mut self) {
        if !matches!(
            self.state.phase,
            GamePhase::TurnRoll | GamePhase::TurnDecide
        ) {
            return;
        }
        let Some(player) = self.state.current_player() else {
            return;
        };
        if !player.kind.is_ai() {
            return;
        }
        let user_id = player.user_id.clone();
        let ctx = self.build_context(player);
        self.ensure_engine(&user_id);
        let Some(engine) = self.engines.get(&user_id) else {
            return;
        };
        let delay = engine.estimate_thinking_time(&ctx);
        let token = self.ai_tokens.issue();
        self.schedule(TimerKind::AiStep, token, Duration::from_millis(delay));
    }

    /// The thinking delay elapsed: decide and act, if the world still looks
    /// the way it did when we went to sleep.
    pub(super) async fn handle_ai_step(&mut self, token: TimerToken) {
        if !self.ai_tokens.is_current(token) {
            return;
        }
        if !matches!(
            self.state.phase,
            GamePhase::TurnRoll | GamePhase::TurnDecide
        ) {
            return;
        }
        let Some(player) = self.state.current_player() else {
            return;
        };
        if !player.kind.is_ai() {
            return;
        }
        let user_id = player.user_id.clone();
        let ctx = self.build_context(player);

        self.ensure_engine(&user_id);
        let decision = match self.engines.get_mut(&user_id) {
            Some(engine) => match engine.decide(&ctx) {
                Ok(decision) => decision,
                Err(error) => {
                    tracing::warn!(room_code = %self.state.code, %user_id, %error, "AI decision failed");
                    fallback_decision(&ctx)
                }
            },
            None => fallback_decision(&ctx),
        };

        let decision = if optimal::is_legal(&decision, &ctx) {
            decision
        } else {
            tracing::warn!(
                room_code = %self.state.code,
                %user_id,
                ?decision,
                "AI produced an illegal decision; falling back"
            );
            fallback_decision(&ctx)
        };

        tracing::debug!(
            room_code = %self.state.code,
            %user_id,
            reasoning = %decision.reasoning,
            confidence = decision.confidence,
            "AI decision"
        );
        self.apply_ai_decision(&user_id, decision).await;
    }

    async fn apply_ai_decision(&mut self, user_id: &UserId, decision: TurnDecision) {
        match decision.action {
            TurnAction::Roll => {
                self.ai_roll(user_id).await;
                self.schedule_ai_step();
            }
            TurnAction::Keep { keep_mask } => {
                // Keeping is only half a move: lock the mask, then reroll
                match self.state.set_kept(user_id, keep_mask) {
                    Ok(kept_mask) => {
                        self.broadcast(&RoomEvent::KeptChanged {
                            user_id: user_id.clone(),
                            kept_mask,
                        })
                        .await;
                        self.persist(vec![GameEvent::DiceKeptToggled {
                            user_id: user_id.clone(),
                            kept_mask,
                        }])
                        .await;
                    }
                    Err(error) => {
                        tracing::warn!(room_code = %self.state.code, %user_id, %error, "AI keep refused");
                    }
                }
                self.ai_roll(user_id).await;
                self.schedule_ai_step();
            }
            TurnAction::Score { category } => {
                let now = self.clock.now();
                match self.state.score(user_id, category, now) {
                    Ok(outcome) => {
                        // apply_score_outcome re-arms the next turn's driver
                        self.apply_score_outcome(user_id, category, outcome, false).await;
                    }
                    Err(error) => {
                        tracing::warn!(room_code = %self.state.code, %user_id, %error, "AI score refused");
                        self.ai_force_score(user_id).await;
                    }
                }
            }
        }
    }

    async fn ai_roll(&mut self, user_id: &UserId) {
        match self.state.roll(user_id, &mut self.dice_rng) {
            Ok(outcome) => {
                self.broadcast(&RoomEvent::DiceRolled {
                    user_id: user_id.clone(),
                    dice: outcome.dice,
                    kept_mask: outcome.kept_mask,
                    rolls_remaining: outcome.rolls_remaining,
                    roll_number: outcome.roll_number,
                })
                .await;
                self.persist(vec![GameEvent::TurnRolled {
                    user_id: user_id.clone(),
                    dice: outcome.dice,
                    roll_number: outcome.roll_number,
                    rolls_remaining: outcome.rolls_remaining,
                }])
                .await;
            }
            Err(error) => {
                tracing::warn!(room_code = %self.state.code, %user_id, %error, "AI roll refused");
                self.ai_force_score(user_id).await;
            }
        }
    }

    /// Last-ditch: the turn must end. Score the first open category the
    /// deterministic AFK picker would choose.
    async fn ai_force_score(&mut self, user_id: &UserId) {
        if self.state.current_user_id() != Some(user_id) {
            return;
        }
        let Some(category) = self.state.afk_pick_category() else {
            return;
        };
        let now = self.clock.now();
        match self.state.score(user_id, category, now) {
            Ok(outcome) => {
                self.apply_score_outcome(user_id, category, outcome, false).await;
            }
            Err(error) => {
                tracing::error!(
                    room_code = %self.state.code,
                    %user_id,
                    %error,
                    "AI force-score failed; abandoning seat to unblock the game"
                );
                self.abandon_player(user_id, "stopped responding").await;
            }
        }
    }

    /// Restored rooms arrive without engines; rebuild one from the seat's
    /// profile so the game can continue.
    fn ensure_engine(&mut self, user_id: &UserId) {
        if self.engines.contains_key(user_id) {
            return;
        }
        let Some(player) = self.state.player(user_id) else {
            return;
        };
        let PlayerKind::Ai { ai_profile_id } = &player.kind else {
            return;
        };
        let profile = crate::ai::profile_by_id(ai_profile_id)
            .unwrap_or_else(crate::ai::AiProfile::default_profile);
        let mut engine = DecisionEngine::new(profile);
        engine.initialize(self.state.rng_seed.wrapping_add(player.seat_index as u64 + 1));
        self.engines.insert(user_id.clone(), engine);
    }

    fn build_context(&self, player: &PlayerRecord) -> GameContext {
        let my_total = player.scorecard.grand_total();
        let opponent_totals: Vec<u32> = self
            .state
            .active_players()
            .filter(|p| p.user_id != player.user_id)
            .map(|p| p.scorecard.grand_total())
            .collect();
        let best_opponent = opponent_totals.iter().copied().max().unwrap_or(0);
        GameContext {
            dice: player.current_dice,
            rolls_remaining: player.rolls_remaining,
            scorecard: player.scorecard.clone(),
            score_differential: my_total as i32 - best_opponent as i32,
            round: self.state.round_number,
            opponent_totals,
        }
    }
}

/// The deterministic fallback chain for broken or illegal AI output:
/// no dice yet, roll; rolls remaining, bank the best immediate category;
/// otherwise bank the lexicographically first open category.
fn fallback_decision(ctx: &GameContext) -> TurnDecision {
    if ctx.dice.is_none() {
        return TurnDecision::roll("fallback: no dice yet", 0.1);
    }
    if ctx.rolls_remaining > 0 {
        // SAFETY-adjacent: an AI at a decision point always has open slots
        if let Some(dice) = ctx.dice {
            if let Some((category, _)) =
                crate::ai::expectation::best_scoring_category(&dice, &ctx.scorecard)
            {
                return TurnDecision::score(category, "fallback: banking the best slot", 0.1);
            }
        }
        return TurnDecision::roll("fallback: nothing to bank", 0.1);
    }
    let first_open = ctx
        .scorecard
        .unscored()
        .min_by(|a, b| a.wire_name().cmp(b.wire_name()));
    match first_open {
        Some(category) => TurnDecision::score(category, "fallback: first open slot", 0.1),
        None => TurnDecision::roll("fallback: card is full", 0.0),
    }
}
