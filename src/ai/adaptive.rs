//! The adaptive brain: the personality pipeline, but the effective traits
//! are recomputed per decision from game stage, competitive position and
//! upper-bonus viability.

use crate::game::dice::dice_total;
use crate::game::{score_dice, Category};
use crate::runtime::SeededRng;

use super::context::{GameContext, GameStage, Position, TurnAction, TurnDecision};
use super::expectation::{adjusted_immediate_score, bonus_achievable};
use super::personality::apply_trait_overrides;
use super::probabilistic::apply_skill_noise;
use super::profile::{AiProfile, PersonalityTraits};

pub fn decide(profile: &AiProfile, ctx: &GameContext, rng: &mut SeededRng) -> TurnDecision {
    let effective = effective_traits(&profile.traits, ctx);
    let base = super::optimal::decide(ctx);
    let shaped = apply_trait_overrides(&effective, base, ctx, rng);
    let noisy = apply_skill_noise(shaped, profile.skill_level, ctx, rng);
    // The chance guard outranks noise: a protected slot stays protected
    protect_chance(noisy, ctx)
}

/// Pure trait modulation: traits in, traits out, per decision.
pub fn effective_traits(base: &PersonalityTraits, ctx: &GameContext) -> PersonalityTraits {
    let mut t = *base;

    match ctx.stage() {
        GameStage::Early => {
            // Too early to burn turns hunting five of a kind
            t.dicee_chaser *= 0.6;
        }
        GameStage::Mid => {
            if bonus_achievable(&ctx.scorecard) {
                t.upper_section_focus = t.upper_section_focus.max(0.7);
            } else {
                t.upper_section_focus *= 0.5;
            }
        }
        GameStage::Late => {
            t.risk_tolerance *= 0.6;
            t.uses_all_rolls *= 0.6;
        }
    }

    match ctx.position() {
        Position::Leading => {
            t.risk_tolerance *= 0.7;
            t.dicee_chaser *= 0.7;
        }
        Position::Tied => {}
        Position::Behind => {
            t.risk_tolerance = (t.risk_tolerance + 0.1).min(1.0);
        }
        Position::FarBehind => {
            // Swing for the fences, but keep working the upper section
            t.risk_tolerance = (t.risk_tolerance + 0.25).min(1.0);
            t.dicee_chaser = (t.dicee_chaser + 0.25).min(1.0);
        }
    }

    t.risk_tolerance = t.risk_tolerance.clamp(0.0, 1.0);
    t.dicee_chaser = t.dicee_chaser.clamp(0.0, 1.0);
    t.upper_section_focus = t.upper_section_focus.clamp(0.0, 1.0);
    t.uses_all_rolls = t.uses_all_rolls.clamp(0.0, 1.0);
    t
}

/// Chance is the last resort, not a dumping ground: before the late game it
/// may only be committed when the dice total at least 25, or when neither a
/// reroll nor a non-zero alternative exists.
fn protect_chance(decision: TurnDecision, ctx: &GameContext) -> TurnDecision {
    if ctx.stage() == GameStage::Late {
        return decision;
    }
    let TurnAction::Score { category } = decision.action else {
        return decision;
    };
    if category != Category::Chance {
        return decision;
    }
    let Some(dice) = ctx.dice else {
        return decision;
    };
    if dice_total(&dice) >= 25 {
        return decision;
    }

    if ctx.rolls_remaining > 0 {
        return TurnDecision::roll("too early to burn chance, rolling", 0.5);
    }

    let alternative = ctx
        .scorecard
        .unscored()
        .filter(|c| *c != Category::Chance)
        .filter(|c| score_dice(&dice, *c) > 0)
        .max_by(|a, b| {
            adjusted_immediate_score(&dice, *a, &ctx.scorecard)
                .partial_cmp(&adjusted_immediate_score(&dice, *b, &ctx.scorecard))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    match alternative {
        Some(category) => TurnDecision::score(
            category,
            format!("protecting chance, taking {category} instead"),
            0.5,
        ),
        None => decision,
    }
}
