use serde::{Deserialize, Serialize};
use std::fmt;

/// The thirteen scoring categories, upper section first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Ones,
    Twos,
    Threes,
    Fours,
    Fives,
    Sixes,
    ThreeOfAKind,
    FourOfAKind,
    FullHouse,
    SmallStraight,
    LargeStraight,
    Dicee,
    Chance,
}

impl Category {
    /// All categories in canonical declaration order.
    pub const ALL: [Category; 13] = [
        Category::Ones,
        Category::Twos,
        Category::Threes,
        Category::Fours,
        Category::Fives,
        Category::Sixes,
        Category::ThreeOfAKind,
        Category::FourOfAKind,
        Category::FullHouse,
        Category::SmallStraight,
        Category::LargeStraight,
        Category::Dicee,
        Category::Chance,
    ];

    /// Index into scorecard storage; follows declaration order.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Upper-section categories score the sum of one face; returns that face.
    pub const fn upper_face(self) -> Option<u8> {
        match self {
            Category::Ones => Some(1),
            Category::Twos => Some(2),
            Category::Threes => Some(3),
            Category::Fours => Some(4),
            Category::Fives => Some(5),
            Category::Sixes => Some(6),
            _ => None,
        }
    }

    pub const fn is_upper(self) -> bool {
        self.upper_face().is_some()
    }

    /// Categories worth a fixed score when the pattern is met.
    pub const fn fixed_score(self) -> Option<u32> {
        match self {
            Category::FullHouse => Some(25),
            Category::SmallStraight => Some(30),
            Category::LargeStraight => Some(40),
            Category::Dicee => Some(50),
            _ => None,
        }
    }

    /// Stable wire name, also the key used for lexicographic tie-breaks.
    pub const fn wire_name(self) -> &'static str {
        match self {
            Category::Ones => "ones",
            Category::Twos => "twos",
            Category::Threes => "threes",
            Category::Fours => "fours",
            Category::Fives => "fives",
            Category::Sixes => "sixes",
            Category::ThreeOfAKind => "three_of_a_kind",
            Category::FourOfAKind => "four_of_a_kind",
            Category::FullHouse => "full_house",
            Category::SmallStraight => "small_straight",
            Category::LargeStraight => "large_straight",
            Category::Dicee => "dicee",
            Category::Chance => "chance",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}
