use super::category::Category;
use super::dice::{dice_total, face_counts, Dice};

/// Score a set of dice for one category.
///
/// Scoring never fails: dice that do not satisfy a pattern score zero in
/// that category, which is exactly what committing a spoiled category means.
pub fn score_dice(dice: &Dice, category: Category) -> u32 {
    let counts = face_counts(dice);
    let total = dice_total(dice);

    match category {
        // Upper section: sum of the matching face
        Category::Ones
        | Category::Twos
        | Category::Threes
        | Category::Fours
        | Category::Fives
        | Category::Sixes => {
            // SAFETY: upper_face() is Some for every upper-section category.
            #[allow(clippy::unwrap_used)]
            let face = category.upper_face().unwrap();
            u32::from(counts[(face - 1) as usize]) * u32::from(face)
        }

        Category::ThreeOfAKind => {
            if counts.iter().any(|&c| c >= 3) {
                total
            } else {
                0
            }
        }

        Category::FourOfAKind => {
            if counts.iter().any(|&c| c >= 4) {
                total
            } else {
                0
            }
        }

        Category::FullHouse => {
            // Five of a kind does not double as 3+2 here
            let has_three = counts.contains(&3);
            let has_two = counts.contains(&2);
            if has_three && has_two {
                25
            } else {
                0
            }
        }

        Category::SmallStraight => {
            let run = longest_run(&counts);
            if run >= 4 {
                30
            } else {
                0
            }
        }

        Category::LargeStraight => {
            let run = longest_run(&counts);
            if run >= 5 {
                40
            } else {
                0
            }
        }

        Category::Dicee => {
            if counts.contains(&5) {
                50
            } else {
                0
            }
        }

        Category::Chance => total,
    }
}

/// Length of the longest consecutive run of present faces.
pub fn longest_run(counts: &[u8; 6]) -> usize {
    let mut best = 0;
    let mut current = 0;
    for &count in counts {
        if count > 0 {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_section_sums_matching_faces() {
        assert_eq!(score_dice(&[3, 3, 3, 1, 2], Category::Threes), 9);
        assert_eq!(score_dice(&[6, 6, 6, 6, 6], Category::Sixes), 30);
        assert_eq!(score_dice(&[2, 3, 4, 5, 6], Category::Ones), 0);
    }

    #[test]
    fn of_a_kind_scores_all_dice_or_zero() {
        assert_eq!(score_dice(&[4, 4, 4, 2, 1], Category::ThreeOfAKind), 15);
        assert_eq!(score_dice(&[4, 4, 2, 2, 1], Category::ThreeOfAKind), 0);
        assert_eq!(score_dice(&[5, 5, 5, 5, 2], Category::FourOfAKind), 22);
        assert_eq!(score_dice(&[5, 5, 5, 2, 2], Category::FourOfAKind), 0);
    }

    #[test]
    fn dicee_counts_as_four_of_a_kind_sum() {
        // Scenario from the rulebook: [4,4,4,4,4]
        assert_eq!(score_dice(&[4, 4, 4, 4, 4], Category::Dicee), 50);
        assert_eq!(score_dice(&[4, 4, 4, 4, 4], Category::Threes), 0);
        assert_eq!(score_dice(&[4, 4, 4, 4, 4], Category::FourOfAKind), 20);
    }

    #[test]
    fn full_house_requires_exactly_three_plus_two() {
        assert_eq!(score_dice(&[2, 2, 3, 3, 3], Category::FullHouse), 25);
        assert_eq!(score_dice(&[2, 2, 2, 2, 3], Category::FullHouse), 0);
        assert_eq!(score_dice(&[5, 5, 5, 5, 5], Category::FullHouse), 0);
    }

    #[test]
    fn straights() {
        assert_eq!(score_dice(&[1, 2, 3, 4, 6], Category::SmallStraight), 30);
        assert_eq!(score_dice(&[2, 3, 4, 5, 5], Category::SmallStraight), 30);
        assert_eq!(score_dice(&[1, 2, 3, 4, 5], Category::LargeStraight), 40);
        assert_eq!(score_dice(&[2, 3, 4, 5, 6], Category::LargeStraight), 40);
        assert_eq!(score_dice(&[1, 2, 3, 4, 6], Category::LargeStraight), 0);
        assert_eq!(score_dice(&[1, 1, 3, 4, 6], Category::SmallStraight), 0);
    }

    #[test]
    fn chance_is_always_the_total() {
        assert_eq!(score_dice(&[5, 5, 5, 5, 6], Category::Chance), 26);
        assert_eq!(score_dice(&[1, 1, 1, 1, 1], Category::Chance), 5);
    }
}
