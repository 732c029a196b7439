use serde::{Deserialize, Serialize};

use crate::game::{Category, Dice, KeptMask, Scorecard};

/// Read-only view of the game a brain decides from.
///
/// Built by the room actor from authoritative state; brains never see the
/// room itself and have no way to mutate anything.
#[derive(Debug, Clone)]
pub struct GameContext {
    /// Dice on the table; `None` before the first roll of the turn
    pub dice: Option<Dice>,
    pub rolls_remaining: u8,
    pub scorecard: Scorecard,
    /// Own grand total minus the best opponent's grand total
    pub score_differential: i32,
    /// Current round, 1..=13
    pub round: u32,
    /// Opponents' grand totals, for position awareness
    pub opponent_totals: Vec<u32>,
}

/// Stage of the game, derived from the round counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GameStage {
    Early,
    Mid,
    Late,
}

/// Standing relative to the best opponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Leading,
    Tied,
    Behind,
    FarBehind,
}

impl GameContext {
    pub fn stage(&self) -> GameStage {
        match self.round {
            0..=4 => GameStage::Early,
            5..=9 => GameStage::Mid,
            _ => GameStage::Late,
        }
    }

    pub fn position(&self) -> Position {
        let diff = self.score_differential;
        if diff > 20 {
            Position::Leading
        } else if diff >= -10 {
            Position::Tied
        } else if diff >= -30 {
            Position::Behind
        } else {
            Position::FarBehind
        }
    }
}

/// What the brain wants to do; validated by the room like any human command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum TurnAction {
    Roll,
    Keep {
        #[serde(rename = "keepMask")]
        keep_mask: KeptMask,
    },
    Score { category: Category },
}

/// A brain's answer for one decision point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnDecision {
    #[serde(flatten)]
    pub action: TurnAction,
    pub reasoning: String,
    /// 0..=1; how sure the brain is about this line
    pub confidence: f64,
}

impl TurnDecision {
    pub fn roll(reasoning: impl Into<String>, confidence: f64) -> Self {
        Self {
            action: TurnAction::Roll,
            reasoning: reasoning.into(),
            confidence,
        }
    }

    pub fn keep(keep_mask: KeptMask, reasoning: impl Into<String>, confidence: f64) -> Self {
        Self {
            action: TurnAction::Keep { keep_mask },
            reasoning: reasoning.into(),
            confidence,
        }
    }

    pub fn score(category: Category, reasoning: impl Into<String>, confidence: f64) -> Self {
        Self {
            action: TurnAction::Score { category },
            reasoning: reasoning.into(),
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(round: u32, diff: i32) -> GameContext {
        GameContext {
            dice: None,
            rolls_remaining: 3,
            scorecard: Scorecard::new(),
            score_differential: diff,
            round,
            opponent_totals: vec![],
        }
    }

    #[test]
    fn stage_boundaries() {
        assert_eq!(ctx(4, 0).stage(), GameStage::Early);
        assert_eq!(ctx(5, 0).stage(), GameStage::Mid);
        assert_eq!(ctx(9, 0).stage(), GameStage::Mid);
        assert_eq!(ctx(10, 0).stage(), GameStage::Late);
    }

    #[test]
    fn position_boundaries() {
        assert_eq!(ctx(1, 21).position(), Position::Leading);
        assert_eq!(ctx(1, 20).position(), Position::Tied);
        assert_eq!(ctx(1, -10).position(), Position::Tied);
        assert_eq!(ctx(1, -11).position(), Position::Behind);
        assert_eq!(ctx(1, -30).position(), Position::Behind);
        assert_eq!(ctx(1, -31).position(), Position::FarBehind);
    }

    #[test]
    fn decision_serializes_with_flattened_action() {
        let decision = TurnDecision::score(Category::Dicee, "five fours", 0.95);
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["action"], "score");
        assert_eq!(json["category"], "dicee");
        assert_eq!(json["confidence"], 0.95);
    }
}
