//! The personality brain: the optimal line, bent by character traits, then
//! degraded by skill like the probabilistic brain.

use crate::game::{score_dice, Category};
use crate::runtime::SeededRng;

use super::context::{GameContext, TurnAction, TurnDecision};
use super::expectation::{adjusted_immediate_score, bonus_achievable, largest_group, mask_matching_face};
use super::optimal;
use super::probabilistic::apply_skill_noise;
use super::profile::{AiProfile, PersonalityTraits};

pub fn decide(profile: &AiProfile, ctx: &GameContext, rng: &mut SeededRng) -> TurnDecision {
    let base = optimal::decide(ctx);
    let shaped = apply_trait_overrides(&profile.traits, base, ctx, rng);
    apply_skill_noise(shaped, profile.skill_level, ctx, rng)
}

/// Conditionally override the given line according to the trait vector.
/// Checked in order: dicee chase, risk conversion, upper-section switch,
/// use-all-rolls insistence. The first override that fires wins.
pub fn apply_trait_overrides(
    traits: &PersonalityTraits,
    base: TurnDecision,
    ctx: &GameContext,
    rng: &mut SeededRng,
) -> TurnDecision {
    let Some(dice) = ctx.dice else {
        return base;
    };

    // Chase the dicee when a big group is showing
    if !ctx.scorecard.is_scored(Category::Dicee) && ctx.rolls_remaining > 0 {
        let (face, count) = largest_group(&dice);
        let chase_threshold = if traits.dicee_chaser > 0.5 { 3 } else { 4 };
        if count >= chase_threshold && count < 5 && rng.chance(traits.dicee_chaser) {
            return TurnDecision::keep(
                mask_matching_face(&dice, face),
                format!("chasing the dicee with {count} {face}s"),
                0.6,
            );
        }
    }

    if let TurnAction::Score { category } = base.action {
        let points = score_dice(&dice, category);

        // A small banked score is a wasted turn to a risk taker
        if traits.risk_tolerance > 0.7 && points < 30 && ctx.rolls_remaining > 0 {
            return TurnDecision::roll(
                format!("{points} is not worth banking, rolling on"),
                0.55,
            );
        }

        // Bonus-minded players steer commits into the upper section
        if traits.upper_section_focus > 0.6
            && category.upper_face().is_none()
            && bonus_achievable(&ctx.scorecard)
        {
            if let Some(upper) = best_pace_upper(&dice, ctx) {
                return TurnDecision::score(
                    upper,
                    format!("working the bonus with {upper}"),
                    0.6,
                );
            }
        }

        // Some players just have to use every roll
        if ctx.rolls_remaining > 0 && rng.chance(traits.uses_all_rolls * 0.4) {
            return TurnDecision::roll("still have rolls left, using them", 0.5);
        }
    }

    base
}

/// An open upper category whose current dice meet the face x3 bonus pace.
fn best_pace_upper(dice: &crate::game::Dice, ctx: &GameContext) -> Option<Category> {
    ctx.scorecard
        .unscored()
        .filter(|c| c.upper_face().is_some())
        .filter(|c| {
            let face = f64::from(c.upper_face().unwrap_or(0));
            f64::from(score_dice(dice, *c)) >= face * 3.0 && face > 0.0
        })
        .max_by(|a, b| {
            adjusted_immediate_score(dice, *a, &ctx.scorecard)
                .partial_cmp(&adjusted_immediate_score(dice, *b, &ctx.scorecard))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

/// Artificial pacing of a decision in milliseconds.
///
/// Score commits get a longer base than keep tweaks; character scales it,
/// the late game and a desperate position stretch it, and nothing returns
/// faster than 200 ms.
pub fn estimate_thinking_time(traits: &PersonalityTraits, ctx: &GameContext) -> u64 {
    use super::context::{GameStage, Position};

    let base: f64 = if ctx.rolls_remaining == 0 || ctx.dice.is_none() {
        1200.0
    } else {
        800.0
    };
    let mut millis = base * traits.thinking_time.max(0.1);
    if ctx.stage() == GameStage::Late {
        millis *= 1.2;
    }
    if ctx.position() == Position::FarBehind {
        millis *= 1.3;
    }
    millis.max(200.0) as u64
}
