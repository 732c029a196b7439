//! Expected-value analysis for keep decisions.
//!
//! One-ply heuristics, category family by category family: each open
//! category gets a keep mask and an EV estimate for rerolling around it.
//! Everything here is deterministic; the noise layers live in the brains.

use crate::game::dice::{face_counts, Dice, KeptMask};
use crate::game::{score_dice, Category, Scorecard, DICE_COUNT, UPPER_BONUS_THRESHOLD};
use crate::protocol::room::CategoryHint;

/// Average face of a rerolled die.
const MEAN_DIE: f64 = 3.5;

/// A keep mask with the category it serves and its estimated value.
#[derive(Debug, Clone, PartialEq)]
pub struct KeepPlan {
    pub category: Category,
    pub mask: KeptMask,
    pub expected_value: f64,
}

/// The face with the most dice; ties break to the higher face.
pub fn largest_group(dice: &Dice) -> (u8, u8) {
    let counts = face_counts(dice);
    let mut best_face = 1u8;
    let mut best_count = 0u8;
    for (i, &count) in counts.iter().enumerate() {
        let face = (i + 1) as u8;
        if count > best_count || (count == best_count && face > best_face) {
            best_face = face;
            best_count = count;
        }
    }
    (best_face, best_count)
}

/// Mask keeping every die showing `face`.
pub fn mask_matching_face(dice: &Dice, face: u8) -> KeptMask {
    let mut mask = [false; DICE_COUNT];
    for (i, &d) in dice.iter().enumerate() {
        mask[i] = d == face;
    }
    mask
}

/// Can the upper bonus still be reached, assuming perfect remaining rolls?
pub fn bonus_achievable(scorecard: &Scorecard) -> bool {
    let ceiling: u32 = Category::ALL
        .into_iter()
        .filter(|c| !scorecard.is_scored(*c))
        .filter_map(Category::upper_face)
        .map(|face| u32::from(face) * DICE_COUNT as u32)
        .sum();
    scorecard.upper_subtotal() + ceiling >= UPPER_BONUS_THRESHOLD
}

/// Immediate commit value with the upper-bonus adjustment: +5 when the score
/// meets the face x3 pace target and the bonus is still in reach.
pub fn adjusted_immediate_score(dice: &Dice, category: Category, scorecard: &Scorecard) -> f64 {
    let raw = f64::from(score_dice(dice, category));
    if let Some(face) = category.upper_face() {
        let pace_target = f64::from(face) * 3.0;
        if raw >= pace_target && bonus_achievable(scorecard) {
            return raw + 5.0;
        }
    }
    raw
}

/// Best category to commit right now, by adjusted immediate score; ties
/// break to the lexicographically first wire name.
pub fn best_scoring_category(dice: &Dice, scorecard: &Scorecard) -> Option<(Category, f64)> {
    scorecard
        .unscored()
        .map(|c| (c, adjusted_immediate_score(dice, c, scorecard)))
        .max_by(|(a, av), (b, bv)| {
            av.partial_cmp(bv)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.wire_name().cmp(a.wire_name()))
        })
}

/// Keep analysis for one category.
pub fn keep_plan(dice: &Dice, category: Category, rolls_remaining: u8) -> KeepPlan {
    if rolls_remaining == 0 {
        // Nothing to reroll: the keep value is the commit value
        return KeepPlan {
            category,
            mask: [true; DICE_COUNT],
            expected_value: f64::from(score_dice(dice, category)),
        };
    }
    let rolls = f64::from(rolls_remaining);
    let counts = face_counts(dice);

    let (mask, expected_value) = match category {
        Category::Ones
        | Category::Twos
        | Category::Threes
        | Category::Fours
        | Category::Fives
        | Category::Sixes => {
            // SAFETY: upper_face is Some for upper-section categories.
            #[allow(clippy::unwrap_used)]
            let face = category.upper_face().unwrap();
            let have = f64::from(counts[(face - 1) as usize]);
            let free = DICE_COUNT as f64 - have;
            // Each free die matches at 1/6 per remaining roll
            let expected_matches = (have + free * rolls / 6.0).min(DICE_COUNT as f64);
            (mask_matching_face(dice, face), f64::from(face) * expected_matches)
        }

        Category::ThreeOfAKind | Category::FourOfAKind | Category::Dicee => {
            let (face, have) = largest_group(dice);
            let target = match category {
                Category::ThreeOfAKind => 3.0,
                Category::FourOfAKind => 4.0,
                _ => 5.0,
            };
            let free = DICE_COUNT as f64 - f64::from(have);
            let expected_matches =
                (f64::from(have) + free * rolls / 6.0).min(DICE_COUNT as f64);
            let completion = (expected_matches / target).min(1.0);
            let payoff = match category {
                Category::Dicee => 50.0 * completion, // long odds stay long
                _ => f64::from(face) * target + MEAN_DIE * (DICE_COUNT as f64 - target),
            };
            let value = if category == Category::Dicee {
                payoff * completion
            } else if f64::from(have) >= target {
                // Already made: current total plus average improvement on the rest
                f64::from(face) * f64::from(have) + MEAN_DIE * free
            } else {
                completion * payoff
            };
            (mask_matching_face(dice, face), value)
        }

        Category::FullHouse => full_house_plan(dice, &counts, rolls),

        Category::SmallStraight => straight_plan(dice, &counts, rolls, 4, 30.0),
        Category::LargeStraight => straight_plan(dice, &counts, rolls, 5, 40.0),

        Category::Chance => {
            // Keep the big dice, reroll the rest at 3.5 apiece
            let mut mask = [false; DICE_COUNT];
            let mut kept_sum = 0.0;
            let mut rerolled = 0.0;
            for (i, &d) in dice.iter().enumerate() {
                if d >= 5 {
                    mask[i] = true;
                    kept_sum += f64::from(d);
                } else {
                    rerolled += 1.0;
                }
            }
            (mask, kept_sum + MEAN_DIE * rerolled)
        }
    };

    KeepPlan {
        category,
        mask,
        expected_value,
    }
}

/// Full house: completed > keep the triple > keep the best pair(s).
fn full_house_plan(dice: &Dice, counts: &[u8; 6], rolls: f64) -> (KeptMask, f64) {
    let has_three = counts.iter().position(|&c| c == 3);
    let has_pair = counts.iter().position(|&c| c == 2);

    if has_three.is_some() && has_pair.is_some() {
        return ([true; DICE_COUNT], 25.0);
    }

    if let Some(triple_idx) = has_three {
        // Keep the triple, chase a pair with the other two dice
        let face = (triple_idx + 1) as u8;
        let mask = mask_matching_face(dice, face);
        let p = (0.35 * rolls).min(1.0);
        return (mask, 25.0 * p);
    }

    // Keep every paired face (one pair or two pairs)
    let mut mask = [false; DICE_COUNT];
    let mut pairs = 0;
    for (i, &count) in counts.iter().enumerate() {
        if count == 2 {
            pairs += 1;
            let face = (i + 1) as u8;
            for (j, &d) in dice.iter().enumerate() {
                if d == face {
                    mask[j] = true;
                }
            }
        }
    }
    let p = match pairs {
        // Two pairs: one die must hit either face
        2 => (rolls / 3.0).min(1.0),
        1 => (0.2 * rolls).min(1.0),
        _ => (0.1 * rolls).min(1.0),
    };
    (mask, 25.0 * p)
}

/// Straights: keep one die per face of the best window and price the
/// missing faces at roughly one-in-three per remaining roll each.
fn straight_plan(
    dice: &Dice,
    counts: &[u8; 6],
    rolls: f64,
    length: usize,
    payoff: f64,
) -> (KeptMask, f64) {
    // Candidate windows of consecutive faces
    let windows: &[std::ops::Range<u8>] = if length == 4 {
        &[1..5, 2..6, 3..7]
    } else {
        &[1..6, 2..7]
    };

    let mut best_window = windows[0].clone();
    let mut best_present = 0;
    for window in windows {
        let present = window
            .clone()
            .filter(|face| counts[(face - 1) as usize] > 0)
            .count();
        if present > best_present {
            best_present = present;
            best_window = window.clone();
        }
    }

    // One die per present face in the window
    let mut mask = [false; DICE_COUNT];
    for face in best_window {
        if counts[(face - 1) as usize] > 0 {
            if let Some(i) = dice.iter().position(|&d| d == face) {
                mask[i] = true;
            }
        }
    }

    let missing = length.saturating_sub(best_present);
    if missing == 0 {
        return (mask, payoff);
    }
    let per_face = (rolls / 3.0).min(1.0);
    let p = per_face.powi(missing as i32);
    (mask, payoff * p)
}

/// The keep plan with the highest EV across all open categories.
pub fn best_keep_plan(
    dice: &Dice,
    scorecard: &Scorecard,
    rolls_remaining: u8,
) -> Option<KeepPlan> {
    scorecard
        .unscored()
        .map(|c| keep_plan(dice, c, rolls_remaining))
        .max_by(|a, b| {
            a.expected_value
                .partial_cmp(&b.expected_value)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.category.wire_name().cmp(a.category.wire_name()))
        })
}

/// Per-category hints for the current player, when the room enables them.
pub fn category_hints(dice: &Dice, scorecard: &Scorecard, rolls_remaining: u8) -> Vec<CategoryHint> {
    scorecard
        .unscored()
        .map(|category| CategoryHint {
            category,
            immediate_score: score_dice(dice, category),
            expected_value: keep_plan(dice, category, rolls_remaining).expected_value,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn largest_group_ties_break_high() {
        assert_eq!(largest_group(&[2, 2, 5, 5, 3]), (5, 2));
        assert_eq!(largest_group(&[6, 6, 6, 1, 1]), (6, 3));
    }

    #[test]
    fn upper_plan_keeps_matching_face() {
        let plan = keep_plan(&[4, 4, 1, 2, 3], Category::Fours, 2);
        assert_eq!(plan.mask, [true, true, false, false, false]);
        // 2 kept + 3 free dice * 2 rolls / 6 = 3 expected fours
        assert!((plan.expected_value - 12.0).abs() < 1e-9);
    }

    #[test]
    fn completed_full_house_is_certain() {
        let plan = keep_plan(&[3, 3, 3, 5, 5], Category::FullHouse, 2);
        assert_eq!(plan.mask, [true; 5]);
        assert!((plan.expected_value - 25.0).abs() < 1e-9);
    }

    #[test]
    fn straight_plan_keeps_the_run() {
        let plan = keep_plan(&[1, 2, 3, 4, 4], Category::SmallStraight, 1);
        assert!((plan.expected_value - 30.0).abs() < 1e-9);
        assert_eq!(plan.mask.iter().filter(|&&k| k).count(), 4);
    }

    #[test]
    fn chance_plan_keeps_high_dice() {
        let plan = keep_plan(&[6, 5, 2, 1, 3], Category::Chance, 1);
        assert_eq!(plan.mask, [true, true, false, false, false]);
        assert!((plan.expected_value - (11.0 + 3.5 * 3.0)).abs() < 1e-9);
    }

    #[test]
    fn bonus_adjustment_applies_at_pace() {
        let card = Scorecard::new();
        // Three sixes meet the 6x3 pace target
        let adjusted = adjusted_immediate_score(&[6, 6, 6, 1, 2], Category::Sixes, &card);
        assert!((adjusted - 23.0).abs() < 1e-9);
        // Two sixes miss the pace target: no adjustment
        let flat = adjusted_immediate_score(&[6, 6, 1, 1, 2], Category::Sixes, &card);
        assert!((flat - 12.0).abs() < 1e-9);
    }

    #[test]
    fn bonus_achievable_flips_when_out_of_reach() {
        let mut card = Scorecard::new();
        assert!(bonus_achievable(&card));
        // Zero out everything but Ones; ceiling collapses to 5 + subtotal 0
        for category in [
            Category::Twos,
            Category::Threes,
            Category::Fours,
            Category::Fives,
            Category::Sixes,
        ] {
            card.set(category, 0);
        }
        assert!(!bonus_achievable(&card));
    }

    #[test]
    fn zero_rolls_reduce_to_immediate_score() {
        let plan = keep_plan(&[2, 2, 2, 3, 3], Category::FullHouse, 0);
        assert!((plan.expected_value - 25.0).abs() < 1e-9);
        let plan = keep_plan(&[2, 2, 2, 3, 4], Category::FullHouse, 0);
        assert!((plan.expected_value - 0.0).abs() < 1e-9);
    }

    #[test]
    fn best_keep_plan_prefers_made_hands() {
        let card = Scorecard::new();
        let plan = best_keep_plan(&[4, 4, 4, 4, 4], &card, 2).unwrap();
        assert_eq!(plan.category, Category::Dicee);
        assert!((plan.expected_value - 50.0).abs() < 1e-9);
    }
}
