//! The probabilistic brain: the optimal line, degraded by skill.

use crate::game::{score_dice, DICE_COUNT};
use crate::runtime::SeededRng;

use super::context::{GameContext, TurnAction, TurnDecision};
use super::optimal;
use super::profile::AiProfile;

pub fn decide(profile: &AiProfile, ctx: &GameContext, rng: &mut SeededRng) -> TurnDecision {
    let best = optimal::decide(ctx);
    apply_skill_noise(best, profile.skill_level, ctx, rng)
}

/// With probability `skill` play the given line; otherwise perturb it:
/// 30% force a roll, 30% flip one bit of the keep mask, 40% commit a
/// different non-zero category. Perturbations that would be illegal in the
/// current context fall back to the original line.
pub fn apply_skill_noise(
    best: TurnDecision,
    skill: f64,
    ctx: &GameContext,
    rng: &mut SeededRng,
) -> TurnDecision {
    if rng.chance(skill) {
        return best;
    }

    let bucket = rng.unit();
    if bucket < 0.3 {
        if ctx.rolls_remaining > 0 {
            return TurnDecision::roll("gut feeling, rolling again", 0.3);
        }
        return best;
    }

    if bucket < 0.6 {
        if ctx.dice.is_none() || ctx.rolls_remaining == 0 {
            return best;
        }
        let mut mask = match &best.action {
            TurnAction::Keep { keep_mask } => *keep_mask,
            _ => [false; DICE_COUNT],
        };
        let flip = rng.below(DICE_COUNT);
        mask[flip] = !mask[flip];
        return TurnDecision::keep(mask, "second-guessing one die", 0.35);
    }

    // Commit a different category that still scores something
    let Some(dice) = ctx.dice else {
        return best;
    };
    let chosen = match &best.action {
        TurnAction::Score { category } => Some(*category),
        _ => None,
    };
    let alternatives: Vec<_> = ctx
        .scorecard
        .unscored()
        .filter(|c| Some(*c) != chosen)
        .filter(|c| score_dice(&dice, *c) > 0)
        .collect();
    match rng.pick(&alternatives) {
        Some(&category) => TurnDecision::score(
            category,
            format!("settling for {category}"),
            0.3,
        ),
        None => best,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::profile::{BrainType, PersonalityTraits};
    use crate::game::Scorecard;

    fn profile(skill: f64) -> AiProfile {
        AiProfile {
            id: "test".to_string(),
            display_name: "Test".to_string(),
            skill_level: skill,
            traits: PersonalityTraits::default(),
            brain_type: BrainType::Probabilistic,
        }
    }

    fn ctx(dice: Option<[u8; 5]>, rolls_remaining: u8) -> GameContext {
        GameContext {
            dice,
            rolls_remaining,
            scorecard: Scorecard::new(),
            score_differential: 0,
            round: 6,
            opponent_totals: vec![],
        }
    }

    #[test]
    fn full_skill_is_exactly_optimal() {
        let context = ctx(Some([2, 3, 3, 5, 6]), 2);
        let mut rng = SeededRng::new(11);
        let decision = decide(&profile(1.0), &context, &mut rng);
        assert_eq!(decision, optimal::decide(&context));
    }

    #[test]
    fn zero_skill_still_returns_legal_actions() {
        let context = ctx(Some([2, 3, 3, 5, 6]), 1);
        for seed in 0..200u64 {
            let mut rng = SeededRng::new(seed);
            let decision = decide(&profile(0.0), &context, &mut rng);
            assert!(
                optimal::is_legal(&decision, &context),
                "seed {seed} produced illegal {decision:?}"
            );
        }
    }

    #[test]
    fn same_seed_same_decision() {
        let context = ctx(Some([1, 1, 4, 5, 6]), 2);
        let mut a = SeededRng::new(7);
        let mut b = SeededRng::new(7);
        assert_eq!(
            decide(&profile(0.3), &context, &mut a),
            decide(&profile(0.3), &context, &mut b)
        );
    }
}
