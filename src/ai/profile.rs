use serde::{Deserialize, Serialize};

/// Which decision pipeline drives a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrainType {
    Optimal,
    Probabilistic,
    Personality,
    Adaptive,
}

/// Trait vector modulating the personality and adaptive brains.
/// All values live in `[0, 1]` except `thinking_time`, a multiplier around 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalityTraits {
    /// Willingness to reroll instead of banking a small score
    pub risk_tolerance: f64,
    /// Appetite for hunting five of a kind
    pub dicee_chaser: f64,
    /// Weight on securing the upper bonus
    pub upper_section_focus: f64,
    /// Tendency to burn all three rolls even when a score is fine
    pub uses_all_rolls: f64,
    /// Pacing multiplier for the artificial thinking delay
    pub thinking_time: f64,
}

impl Default for PersonalityTraits {
    fn default() -> Self {
        Self {
            risk_tolerance: 0.5,
            dicee_chaser: 0.5,
            upper_section_focus: 0.5,
            uses_all_rolls: 0.5,
            thinking_time: 1.0,
        }
    }
}

/// One AI opponent definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiProfile {
    pub id: String,
    pub display_name: String,
    /// Probability of playing the optimal line in the noise layer, `[0, 1]`
    pub skill_level: f64,
    pub traits: PersonalityTraits,
    pub brain_type: BrainType,
}

impl AiProfile {
    /// The profile used when a host seats an AI without naming one.
    pub fn default_profile() -> Self {
        // SAFETY: builtin_profiles() is a non-empty constant list.
        #[allow(clippy::unwrap_used)]
        builtin_profiles().into_iter().next().unwrap()
    }
}

/// The opponents shipped with the server.
pub fn builtin_profiles() -> Vec<AiProfile> {
    vec![
        AiProfile {
            id: "steady-sam".to_string(),
            display_name: "Steady Sam".to_string(),
            skill_level: 0.75,
            traits: PersonalityTraits::default(),
            brain_type: BrainType::Probabilistic,
        },
        AiProfile {
            id: "professor".to_string(),
            display_name: "The Professor".to_string(),
            skill_level: 1.0,
            traits: PersonalityTraits {
                thinking_time: 1.4,
                ..PersonalityTraits::default()
            },
            brain_type: BrainType::Optimal,
        },
        AiProfile {
            id: "lucky-lou".to_string(),
            display_name: "Lucky Lou".to_string(),
            skill_level: 0.8,
            traits: PersonalityTraits {
                risk_tolerance: 0.9,
                dicee_chaser: 0.85,
                upper_section_focus: 0.3,
                uses_all_rolls: 0.8,
                thinking_time: 0.7,
            },
            brain_type: BrainType::Personality,
        },
        AiProfile {
            id: "granny-gwen".to_string(),
            display_name: "Granny Gwen".to_string(),
            skill_level: 0.85,
            traits: PersonalityTraits {
                risk_tolerance: 0.2,
                dicee_chaser: 0.2,
                upper_section_focus: 0.8,
                uses_all_rolls: 0.3,
                thinking_time: 1.8,
            },
            brain_type: BrainType::Personality,
        },
        AiProfile {
            id: "chameleon".to_string(),
            display_name: "Chameleon".to_string(),
            skill_level: 0.9,
            traits: PersonalityTraits {
                risk_tolerance: 0.6,
                dicee_chaser: 0.5,
                upper_section_focus: 0.6,
                uses_all_rolls: 0.5,
                thinking_time: 1.0,
            },
            brain_type: BrainType::Adaptive,
        },
        AiProfile {
            id: "rookie".to_string(),
            display_name: "Rookie".to_string(),
            skill_level: 0.4,
            traits: PersonalityTraits {
                thinking_time: 0.6,
                ..PersonalityTraits::default()
            },
            brain_type: BrainType::Probabilistic,
        },
    ]
}

/// Look up a builtin profile by id.
pub fn profile_by_id(id: &str) -> Option<AiProfile> {
    builtin_profiles().into_iter().find(|p| p.id == id)
}
