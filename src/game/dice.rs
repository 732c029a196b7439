use crate::runtime::SeededRng;

use super::DICE_COUNT;

/// Faces on a die.
pub const DICE_FACES: u8 = 6;

/// Five dice, ordered; each value in 1..=6.
pub type Dice = [u8; DICE_COUNT];

/// Per-die keep flag aligned with [`Dice`]; kept dice survive a reroll.
pub type KeptMask = [bool; DICE_COUNT];

/// Roll all five dice fresh.
pub fn roll_all(rng: &mut SeededRng) -> Dice {
    let mut dice = [0u8; DICE_COUNT];
    for die in &mut dice {
        *die = rng.roll_die();
    }
    dice
}

/// Reroll every unkept die using the injected RNG.
pub fn reroll_unkept(dice: &mut Dice, kept: &KeptMask, rng: &mut SeededRng) {
    for (die, kept) in dice.iter_mut().zip(kept.iter()) {
        if !kept {
            *die = rng.roll_die();
        }
    }
}

/// Count occurrences of each face value, index 0 holding ones.
pub fn face_counts(dice: &Dice) -> [u8; DICE_FACES as usize] {
    let mut counts = [0u8; DICE_FACES as usize];
    for &d in dice {
        if (1..=DICE_FACES).contains(&d) {
            counts[(d - 1) as usize] += 1;
        }
    }
    counts
}

/// Sum of all dice.
pub fn dice_total(dice: &Dice) -> u32 {
    dice.iter().map(|&d| u32::from(d)).sum()
}

/// True when every die shows a legal face.
pub fn is_valid(dice: &Dice) -> bool {
    dice.iter().all(|d| (1..=DICE_FACES).contains(d))
}
