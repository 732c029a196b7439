//! The optimal brain: greedy one-ply expected-value search.

use crate::game::Category;

use super::context::{GameContext, TurnAction, TurnDecision};
use super::expectation::{best_keep_plan, best_scoring_category};

/// Decide the best line for the current context.
///
/// No dice yet: roll. Out of rolls: commit the best category. Otherwise
/// compare the best keep-EV against the best commit value; a winning keep
/// with an empty mask is just a full reroll.
pub fn decide(ctx: &GameContext) -> TurnDecision {
    let Some(dice) = ctx.dice else {
        return TurnDecision::roll("opening roll", 1.0);
    };

    let best_score = best_scoring_category(&dice, &ctx.scorecard);

    if ctx.rolls_remaining == 0 {
        return match best_score {
            Some((category, value)) => TurnDecision::score(
                category,
                format!("out of rolls, best slot is {category} for {value:.0}"),
                0.9,
            ),
            // A full card never reaches a decision point; cover it anyway
            None => TurnDecision::score(Category::Chance, "card already full", 0.1),
        };
    }

    let best_keep = best_keep_plan(&dice, &ctx.scorecard, ctx.rolls_remaining);

    match (best_keep, best_score) {
        (Some(keep), Some((category, score_value))) => {
            if keep.expected_value > score_value {
                let confidence = decision_confidence(keep.expected_value, score_value);
                if keep.mask.iter().all(|&k| !k) {
                    TurnDecision::roll(
                        format!("nothing worth holding, rerolling for {}", keep.category),
                        confidence,
                    )
                } else {
                    TurnDecision::keep(
                        keep.mask,
                        format!(
                            "holding for {} (EV {:.1} over {:.1})",
                            keep.category, keep.expected_value, score_value
                        ),
                        confidence,
                    )
                }
            } else {
                TurnDecision::score(
                    category,
                    format!("banking {category} for {score_value:.0}"),
                    decision_confidence(score_value, keep.expected_value),
                )
            }
        }
        (None, Some((category, value))) => {
            TurnDecision::score(category, format!("banking {category} for {value:.0}"), 0.8)
        }
        _ => TurnDecision::roll("no open categories to evaluate", 0.2),
    }
}

/// Confidence grows with the margin between the chosen line and the runner-up.
fn decision_confidence(chosen: f64, alternative: f64) -> f64 {
    let margin = (chosen - alternative).abs();
    (0.55 + margin / 40.0).clamp(0.5, 0.95)
}

/// True when the decision is structurally legal for the context; the room
/// still re-validates, this is the engine's own sanity gate.
pub fn is_legal(decision: &TurnDecision, ctx: &GameContext) -> bool {
    match &decision.action {
        TurnAction::Roll => ctx.rolls_remaining > 0,
        TurnAction::Keep { .. } => ctx.dice.is_some() && ctx.rolls_remaining > 0,
        TurnAction::Score { category } => {
            ctx.dice.is_some() && !ctx.scorecard.is_scored(*category)
        }
    }
}
