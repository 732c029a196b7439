//! Property tests for the game core: state-machine invariants, scoring
//! arithmetic, room-code validation, rate limiting, and AI determinism.

use chrono::Utc;
use proptest::prelude::*;

use dicee_arena_server::ai::{builtin_profiles, DecisionEngine, GameContext};
use dicee_arena_server::config::{LobbyConfig, ProtocolConfig};
use dicee_arena_server::game::{
    events::{replay, GameEvent},
    Category, GamePhase, GameState, PlayerKind, RoomConfig, Scorecard,
};
use dicee_arena_server::lobby::chat::LobbyChat;
use dicee_arena_server::protocol::{Identity, RoomCode, UserId, ROOM_CODE_ALPHABET};
use dicee_arena_server::runtime::SeededRng;

fn alphabet_char() -> impl Strategy<Value = char> {
    proptest::sample::select(
        ROOM_CODE_ALPHABET
            .iter()
            .map(|&b| b as char)
            .collect::<Vec<char>>(),
    )
}

fn identity(id: &str) -> Identity {
    Identity {
        user_id: UserId::from(id),
        display_name: format!("Player {id}"),
        avatar_seed: id.to_string(),
    }
}

/// A started two-player game with a deterministic seed.
fn started_game(seed: u64) -> (GameState, SeededRng) {
    let now = Utc::now();
    let mut state = GameState::new(
        RoomCode::parse("ABC234").unwrap(),
        RoomConfig::default(),
        seed,
    );
    state
        .add_player(identity("p1"), PlayerKind::Human, now)
        .unwrap();
    state
        .add_player(identity("p2"), PlayerKind::Human, now)
        .unwrap();
    state.start_countdown(&UserId::from("p1")).unwrap();
    state.begin_game(now).unwrap();
    (state, SeededRng::new(seed))
}

/// One randomly chosen player intent; illegal picks are simply skipped,
/// mirroring how the room rejects them without mutating state.
#[derive(Debug, Clone)]
enum Op {
    Roll,
    Toggle(usize),
    KeepAll,
    ReleaseAll,
    Score(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Roll),
        2 => (0usize..5).prop_map(Op::Toggle),
        1 => Just(Op::KeepAll),
        1 => Just(Op::ReleaseAll),
        3 => (0usize..13).prop_map(Op::Score),
    ]
}

proptest! {
    /// Every six-character draw from the restricted alphabet parses; any
    /// six-character string containing a character outside it is rejected.
    #[test]
    fn room_code_alphabet_is_exact(
        good in proptest::collection::vec(alphabet_char(), 6),
        bad_char in any::<char>(),
        position in 0usize..6,
    ) {
        let good_code: String = good.iter().collect();
        prop_assert!(RoomCode::parse(&good_code).is_ok());

        let canonical_bad = bad_char.to_ascii_uppercase();
        prop_assume!(
            !canonical_bad.is_ascii() || !ROOM_CODE_ALPHABET.contains(&(canonical_bad as u8))
        );
        let mut tampered: Vec<char> = good;
        tampered[position] = bad_char;
        let bad_code: String = tampered.iter().collect();
        prop_assert!(RoomCode::parse(&bad_code).is_err());
    }

    /// Lower-case input canonicalizes to the same code as upper-case.
    #[test]
    fn room_codes_are_case_insensitive(raw in proptest::collection::vec(alphabet_char(), 6)) {
        let upper: String = raw.iter().collect();
        let lower = upper.to_ascii_lowercase();
        let a = RoomCode::parse(&upper).unwrap();
        let b = RoomCode::parse(&lower).unwrap();
        prop_assert_eq!(a, b);
    }

    /// Grand total always equals upper subtotal + bonus + lower total, with
    /// the bonus flipping exactly at 63.
    #[test]
    fn grand_total_is_always_the_sum_of_parts(
        scores in proptest::collection::vec(proptest::option::of(0u32..=50), 13)
    ) {
        let mut card = Scorecard::new();
        for (category, points) in Category::ALL.into_iter().zip(scores) {
            if let Some(points) = points {
                card.set(category, points);
            }
        }
        let totals = card.totals();
        prop_assert_eq!(
            totals.grand_total,
            totals.upper_subtotal + totals.upper_bonus + totals.lower_total
        );
        if totals.upper_subtotal >= 63 {
            prop_assert_eq!(totals.upper_bonus, 35);
        } else {
            prop_assert_eq!(totals.upper_bonus, 0);
        }
    }

    /// For any legal command sequence, structural invariants hold after
    /// every step and the current player's roll budget always sums to 3.
    #[test]
    fn legal_command_sequences_preserve_invariants(
        seed in any::<u64>(),
        ops in proptest::collection::vec(op_strategy(), 1..120),
    ) {
        let now = Utc::now();
        let (mut state, mut rng) = started_game(seed);
        for op in ops {
            if state.phase == GamePhase::GameOver {
                break;
            }
            let current = match state.current_user_id() {
                Some(user) => user.clone(),
                None => break,
            };
            match op {
                Op::Roll => { let _ = state.roll(&current, &mut rng); }
                Op::Toggle(i) => { let _ = state.toggle_keep(&current, i); }
                Op::KeepAll => { let _ = state.keep_all(&current); }
                Op::ReleaseAll => { let _ = state.release_all(&current); }
                Op::Score(i) => {
                    let category = Category::ALL[i];
                    let _ = state.score(&current, category, now);
                }
            }
            prop_assert!(state.invariants_hold());
            if let Some(player) = state.current_player() {
                prop_assert_eq!(player.rolls_remaining + player.roll_number, 3);
            }
            prop_assert!(state.round_number <= 13);
        }
    }

    /// Toggle-keep is involutive per index once dice are on the table.
    #[test]
    fn toggle_keep_is_involutive(seed in any::<u64>(), index in 0usize..5) {
        let (mut state, mut rng) = started_game(seed);
        let current = state.current_user_id().cloned().unwrap();
        state.roll(&current, &mut rng).unwrap();
        let before = state.current_player().unwrap().kept_mask;
        state.toggle_keep(&current, index).unwrap();
        state.toggle_keep(&current, index).unwrap();
        prop_assert_eq!(before, state.current_player().unwrap().kept_mask);
    }

    /// keep_all then release_all restores the empty mask after a roll, and
    /// both are refused before any roll.
    #[test]
    fn keep_all_release_all_law(seed in any::<u64>()) {
        let (mut state, mut rng) = started_game(seed);
        let current = state.current_user_id().cloned().unwrap();

        // Before the first roll both edits are no-ops by refusal
        prop_assert!(state.keep_all(&current).is_err());
        prop_assert!(state.release_all(&current).is_err());

        state.roll(&current, &mut rng).unwrap();
        state.keep_all(&current).unwrap();
        prop_assert_eq!(state.current_player().unwrap().kept_mask, [true; 5]);
        state.release_all(&current).unwrap();
        prop_assert_eq!(state.current_player().unwrap().kept_mask, [false; 5]);
    }

    /// Same context, same profile, same seed: same decision, for every
    /// builtin brain.
    #[test]
    fn ai_decisions_are_deterministic(seed in any::<u64>(), dice in proptest::collection::vec(1u8..=6, 5)) {
        let dice: [u8; 5] = dice.try_into().unwrap();
        let ctx = GameContext {
            dice: Some(dice),
            rolls_remaining: 1,
            scorecard: Scorecard::new(),
            score_differential: 0,
            round: 6,
            opponent_totals: vec![40],
        };
        for profile in builtin_profiles() {
            let mut a = DecisionEngine::new(profile.clone());
            let mut b = DecisionEngine::new(profile);
            a.initialize(seed);
            b.initialize(seed);
            prop_assert_eq!(a.decide(&ctx).unwrap(), b.decide(&ctx).unwrap());
        }
    }

    /// In any rolling 60-second window a user gets at most 30 accepted
    /// lobby chat messages.
    #[test]
    fn chat_rate_limit_bounds_any_window(
        offsets in proptest::collection::vec(0i64..180, 1..200)
    ) {
        let mut chat = LobbyChat::new(&LobbyConfig::default());
        let protocol = ProtocolConfig::default();
        let user = UserId::from("u");
        let base = Utc::now();
        let mut offsets = offsets;
        offsets.sort_unstable();

        let mut accepted: Vec<i64> = Vec::new();
        for offset in offsets {
            let at = base + chrono::Duration::seconds(offset);
            if chat.post(&user, "U", "hello", &protocol, at).is_ok() {
                accepted.push(offset);
            }
        }
        for (i, &start) in accepted.iter().enumerate() {
            let in_window = accepted[i..]
                .iter()
                .take_while(|&&t| t - start < 60)
                .count();
            prop_assert!(in_window <= 30, "window starting at {start} admitted {in_window}");
        }
    }

    /// Replaying the recorded event log reconstructs the same durable state
    /// the live game reached.
    #[test]
    fn event_log_replay_matches_live_state(
        seed in any::<u64>(),
        turns in 1usize..10,
    ) {
        let now = Utc::now();
        let (mut live, mut rng) = started_game(seed);
        let mut log = vec![
            GameEvent::PlayerJoined {
                identity: identity("p1"),
                kind: PlayerKind::Human,
                seat_index: 0,
                at: now,
            },
            GameEvent::PlayerJoined {
                identity: identity("p2"),
                kind: PlayerKind::Human,
                seat_index: 1,
                at: now,
            },
            GameEvent::GameStarted {
                player_order: live.player_order.clone(),
                rng_seed: seed,
                at: now,
            },
        ];

        for _ in 0..turns {
            if live.phase == GamePhase::GameOver {
                break;
            }
            let current = live.current_user_id().cloned().unwrap();
            let roll = live.roll(&current, &mut rng).unwrap();
            log.push(GameEvent::TurnRolled {
                user_id: current.clone(),
                dice: roll.dice,
                roll_number: roll.roll_number,
                rolls_remaining: roll.rolls_remaining,
            });
            let category = live
                .current_player()
                .unwrap()
                .scorecard
                .unscored()
                .next()
                .unwrap();
            let outcome = live.score(&current, category, now).unwrap();
            log.push(GameEvent::TurnScored {
                user_id: current.clone(),
                category,
                points: outcome.points,
                at: now,
            });
        }

        let rebuilt = replay(
            RoomCode::parse("ABC234").unwrap(),
            RoomConfig::default(),
            &log,
        );
        prop_assert_eq!(rebuilt.phase, live.phase);
        prop_assert_eq!(rebuilt.turn_number, live.turn_number);
        prop_assert_eq!(rebuilt.round_number, live.round_number);
        prop_assert_eq!(rebuilt.current_player_index, live.current_player_index);
        for (a, b) in rebuilt.players.iter().zip(live.players.iter()) {
            prop_assert_eq!(&a.user_id, &b.user_id);
            prop_assert_eq!(&a.scorecard, &b.scorecard);
            prop_assert_eq!(a.rolls_remaining, b.rolls_remaining);
        }
    }
}

/// Boundary: a roll with exactly one roll remaining succeeds, lands in
/// turn_decide with zero remaining, and the next roll is refused.
#[test]
fn last_roll_boundary() {
    let (mut state, mut rng) = started_game(7);
    let current = state.current_user_id().cloned().unwrap();
    state.roll(&current, &mut rng).unwrap();
    state.roll(&current, &mut rng).unwrap();
    let outcome = state.roll(&current, &mut rng).unwrap();
    assert_eq!(outcome.rolls_remaining, 0);
    assert_eq!(state.phase, GamePhase::TurnDecide);
    assert!(state.roll(&current, &mut rng).is_err());
}

/// Boundary: the 13th score by the last player flips the game to
/// game_over with rankings populated.
#[test]
fn final_score_ends_the_game() {
    let now = Utc::now();
    let (mut state, mut rng) = started_game(11);
    loop {
        let current = state.current_user_id().cloned().unwrap();
        state.roll(&current, &mut rng).unwrap();
        let category = state
            .current_player()
            .unwrap()
            .scorecard
            .unscored()
            .next()
            .unwrap();
        let outcome = state.score(&current, category, now).unwrap();
        if state.phase == GamePhase::GameOver {
            assert!(matches!(
                outcome.advance,
                dicee_arena_server::game::TurnAdvance::GameOver
            ));
            break;
        }
    }
    let rankings = state.rankings.expect("rankings recorded");
    assert_eq!(rankings.len(), 2);
    assert_eq!(rankings[0].rank, 1);
    assert!(state.completed_at.is_some());
}
