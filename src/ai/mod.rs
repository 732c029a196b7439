//! AI decision engine.
//!
//! Pure decision logic: given a read-only [`GameContext`] and an
//! [`AiProfile`], produce a [`TurnDecision`]. No I/O happens here; the room
//! actor validates the decision like any human command and honors the
//! thinking-time estimate as an artificial delay.
//!
//! Brains are a tagged dispatch rather than an inheritance tree: each brain
//! module exposes a pure `decide` and the engine routes by
//! [`profile::BrainType`]. All randomness flows through the injected
//! [`SeededRng`], so decisions are reproducible per (context, profile, seed).

pub mod adaptive;
pub mod context;
pub mod expectation;
pub mod optimal;
pub mod personality;
pub mod probabilistic;
pub mod profile;

use thiserror::Error;

use crate::runtime::SeededRng;

pub use context::{GameContext, GameStage, Position, TurnAction, TurnDecision};
pub use expectation::category_hints;
pub use profile::{builtin_profiles, profile_by_id, AiProfile, BrainType, PersonalityTraits};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AiError {
    #[error("decision engine used before initialize")]
    NotInitialized,
}

/// One AI player's decision engine: a profile plus its seeded RNG.
///
/// `initialize` must run before the first `decide`; the room actor seeds it
/// from the game seed and the player's seat so replays agree.
#[derive(Debug)]
pub struct DecisionEngine {
    profile: AiProfile,
    rng: Option<SeededRng>,
}

impl DecisionEngine {
    pub fn new(profile: AiProfile) -> Self {
        Self { profile, rng: None }
    }

    pub fn initialize(&mut self, seed: u64) {
        self.rng = Some(SeededRng::new(seed));
    }

    pub fn profile(&self) -> &AiProfile {
        &self.profile
    }

    /// Produce a decision for the current context.
    pub fn decide(&mut self, ctx: &GameContext) -> Result<TurnDecision, AiError> {
        let rng = self.rng.as_mut().ok_or(AiError::NotInitialized)?;
        let decision = match self.profile.brain_type {
            BrainType::Optimal => optimal::decide(ctx),
            BrainType::Probabilistic => probabilistic::decide(&self.profile, ctx, rng),
            BrainType::Personality => personality::decide(&self.profile, ctx, rng),
            BrainType::Adaptive => adaptive::decide(&self.profile, ctx, rng),
        };
        Ok(decision)
    }

    /// Milliseconds the caller should wait before applying the decision.
    pub fn estimate_thinking_time(&self, ctx: &GameContext) -> u64 {
        personality::estimate_thinking_time(&self.profile.traits, ctx)
    }
}
