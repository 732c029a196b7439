use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::category::Category;
use super::{UPPER_BONUS, UPPER_BONUS_THRESHOLD};

/// Derived score totals; recomputed, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreTotals {
    pub upper_subtotal: u32,
    pub upper_bonus: u32,
    pub lower_total: u32,
    pub grand_total: u32,
}

/// One player's scorecard: a slot per category, set exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scorecard {
    slots: [Option<u32>; 13],
}

impl Scorecard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, category: Category) -> Option<u32> {
        self.slots[category.index()]
    }

    pub fn is_scored(&self, category: Category) -> bool {
        self.get(category).is_some()
    }

    /// Commit a score. Returns false (and changes nothing) when the slot was
    /// already filled; the caller treats that as an illegal command.
    pub fn set(&mut self, category: Category, points: u32) -> bool {
        let slot = &mut self.slots[category.index()];
        if slot.is_some() {
            return false;
        }
        *slot = Some(points);
        true
    }

    /// Categories still open, in declaration order.
    pub fn unscored(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ALL
            .into_iter()
            .filter(move |c| self.slots[c.index()].is_none())
    }

    pub fn scored_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub fn upper_subtotal(&self) -> u32 {
        Category::ALL
            .into_iter()
            .filter(|c| c.is_upper())
            .filter_map(|c| self.get(c))
            .sum()
    }

    pub fn totals(&self) -> ScoreTotals {
        let upper_subtotal = self.upper_subtotal();
        let upper_bonus = if upper_subtotal >= UPPER_BONUS_THRESHOLD {
            UPPER_BONUS
        } else {
            0
        };
        let lower_total = Category::ALL
            .into_iter()
            .filter(|c| !c.is_upper())
            .filter_map(|c| self.get(c))
            .sum();
        ScoreTotals {
            upper_subtotal,
            upper_bonus,
            lower_total,
            grand_total: upper_subtotal + upper_bonus + lower_total,
        }
    }

    pub fn grand_total(&self) -> u32 {
        self.totals().grand_total
    }

    /// Scored entries as an ordered map, the shape state views expose.
    pub fn scored_entries(&self) -> BTreeMap<Category, u32> {
        Category::ALL
            .into_iter()
            .filter_map(|c| self.get(c).map(|points| (c, points)))
            .collect()
    }
}

// Persisted as a category -> points map so snapshots stay readable and the
// layout survives reordering of the enum.
impl Serialize for Scorecard {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.scored_entries().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Scorecard {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let entries = BTreeMap::<Category, u32>::deserialize(deserializer)?;
        let mut card = Scorecard::new();
        for (category, points) in entries {
            card.set(category, points);
        }
        Ok(card)
    }
}
