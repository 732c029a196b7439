//! AI engine behavior across brains: contract errors, pacing, and the
//! personality/adaptive overrides observable from outside.

use dicee_arena_server::ai::{
    builtin_profiles, profile_by_id, AiError, DecisionEngine, GameContext, TurnAction,
};
use dicee_arena_server::game::{Category, Scorecard};

fn ctx(dice: Option<[u8; 5]>, rolls_remaining: u8, round: u32, diff: i32) -> GameContext {
    GameContext {
        dice,
        rolls_remaining,
        scorecard: Scorecard::new(),
        score_differential: diff,
        round,
        opponent_totals: vec![],
    }
}

#[test]
fn decide_requires_initialize() {
    let profile = profile_by_id("professor").unwrap();
    let mut engine = DecisionEngine::new(profile);
    assert_eq!(
        engine.decide(&ctx(None, 3, 1, 0)),
        Err(AiError::NotInitialized)
    );
    engine.initialize(1);
    assert!(engine.decide(&ctx(None, 3, 1, 0)).is_ok());
}

#[test]
fn opening_position_always_rolls() {
    for profile in builtin_profiles() {
        let mut engine = DecisionEngine::new(profile);
        engine.initialize(5);
        let decision = engine.decide(&ctx(None, 3, 1, 0)).unwrap();
        assert_eq!(decision.action, TurnAction::Roll, "{}", engine.profile().id);
    }
}

#[test]
fn out_of_rolls_always_scores() {
    for profile in builtin_profiles() {
        for seed in 0..10 {
            let mut engine = DecisionEngine::new(profile.clone());
            engine.initialize(seed);
            let decision = engine.decide(&ctx(Some([2, 3, 4, 4, 6]), 0, 5, 0)).unwrap();
            assert!(
                matches!(decision.action, TurnAction::Score { .. }),
                "{} seed {seed}: {decision:?}",
                profile.id
            );
        }
    }
}

#[test]
fn optimal_banks_a_made_dicee() {
    let mut engine = DecisionEngine::new(profile_by_id("professor").unwrap());
    engine.initialize(3);
    let decision = engine.decide(&ctx(Some([6, 6, 6, 6, 6]), 2, 5, 0)).unwrap();
    assert_eq!(
        decision.action,
        TurnAction::Score {
            category: Category::Dicee
        }
    );
    assert!(decision.confidence > 0.0);
    assert!(!decision.reasoning.is_empty());
}

#[test]
fn thinking_time_respects_floor_and_modifiers() {
    let professor = profile_by_id("professor").unwrap();
    let engine = DecisionEngine::new(professor);

    // Keep decisions pace faster than score decisions
    let keep_time = engine.estimate_thinking_time(&ctx(Some([1, 2, 3, 4, 5]), 2, 3, 0));
    let score_time = engine.estimate_thinking_time(&ctx(Some([1, 2, 3, 4, 5]), 0, 3, 0));
    assert!(keep_time < score_time);
    assert!(keep_time >= 200);

    // Late game and a desperate position both stretch the pause
    let calm = engine.estimate_thinking_time(&ctx(Some([1, 2, 3, 4, 5]), 0, 3, 0));
    let tense = engine.estimate_thinking_time(&ctx(Some([1, 2, 3, 4, 5]), 0, 12, -40));
    assert!(tense > calm);
}

#[test]
fn adaptive_brain_protects_chance_early() {
    // Low-total dice, rolls left, early game: the adaptive brain must not
    // bank chance even if noise nudges it that way
    let chameleon = profile_by_id("chameleon").unwrap();
    for seed in 0..50 {
        let mut engine = DecisionEngine::new(chameleon.clone());
        engine.initialize(seed);
        let decision = engine.decide(&ctx(Some([1, 2, 2, 3, 4]), 1, 3, 0)).unwrap();
        if let TurnAction::Score { category } = decision.action {
            assert_ne!(
                category,
                Category::Chance,
                "seed {seed} banked chance early with rolls remaining"
            );
        }
    }
}

#[test]
fn skilled_probabilistic_matches_optimal() {
    let mut steady = profile_by_id("steady-sam").unwrap();
    steady.skill_level = 1.0;
    let professor = profile_by_id("professor").unwrap();

    let context = ctx(Some([5, 5, 3, 2, 1]), 2, 6, 0);
    let mut a = DecisionEngine::new(steady);
    let mut b = DecisionEngine::new(professor);
    a.initialize(9);
    b.initialize(9);
    assert_eq!(a.decide(&context).unwrap().action, b.decide(&context).unwrap().action);
}

#[test]
fn every_decision_is_phase_compatible() {
    // Sweep dice/rolls combinations across all profiles and seeds; every
    // returned action must be structurally legal for its context
    let contexts = [
        ctx(None, 3, 2, 0),
        ctx(Some([1, 1, 2, 5, 6]), 2, 2, 0),
        ctx(Some([3, 3, 3, 2, 2]), 1, 8, -20),
        ctx(Some([4, 5, 6, 2, 2]), 0, 12, 30),
    ];
    for profile in builtin_profiles() {
        for seed in 0..25u64 {
            for context in &contexts {
                let mut engine = DecisionEngine::new(profile.clone());
                engine.initialize(seed);
                let decision = engine.decide(context).unwrap();
                match &decision.action {
                    TurnAction::Roll => assert!(context.rolls_remaining > 0),
                    TurnAction::Keep { .. } => {
                        assert!(context.dice.is_some() && context.rolls_remaining > 0);
                    }
                    TurnAction::Score { category } => {
                        assert!(context.dice.is_some());
                        assert!(!context.scorecard.is_scored(*category));
                    }
                }
            }
        }
    }
}
