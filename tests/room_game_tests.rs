//! End-to-end room scenarios, driven through actor handles on virtual time.


use std::time::Duration;

use dicee_arena_server::game::{Category, RoomConfig};
use dicee_arena_server::protocol::{Role, RoomCommand};
use dicee_arena_server::room::RoomMsg;
use dicee_arena_server::storage::RoomStore;
use test_helpers::*;

/// Scenario: two humans, happy path through the first turn.
#[tokio::test(start_paused = true)]
async fn two_human_happy_path() {
    let (env, _lobby_sink) = room_test_env(test_config());
    let room = spawn_room(&env, "ABC234", RoomConfig::default(), 42);

    let mut host = join_room(&room, "host", Role::Player).await;
    let joined = host.recv_type("ROOM_JOINED").await;
    assert_eq!(joined["payload"]["role"], "player");
    assert_eq!(joined["payload"]["was_downgraded"], false);
    assert_eq!(joined["payload"]["state"]["code"], "ABC234");

    let mut guest = join_room(&room, "guest", Role::Player).await;
    guest.recv_type("ROOM_JOINED").await;
    host.recv_type("PLAYER_JOINED").await;

    send(&room, &host, RoomCommand::StartGame).await;
    let starting = host.recv_type("GAME_STARTING").await;
    assert_eq!(starting["payload"]["seconds"], 3);

    tokio::time::advance(Duration::from_secs(4)).await;
    let started = host.recv_type("GAME_STARTED").await;
    let order = started["payload"]["player_order"].as_array().unwrap();
    assert_eq!(order.len(), 2);
    assert_eq!(order[0], "host");

    let turn = host.recv_type("TURN_STARTED").await;
    assert_eq!(turn["payload"]["user_id"], "host");
    assert_eq!(turn["payload"]["turn_number"], 1);
    assert_eq!(turn["payload"]["round_number"], 1);

    send(&room, &host, RoomCommand::Roll).await;
    let rolled = host.recv_type("DICE_ROLLED").await;
    assert_eq!(rolled["payload"]["rolls_remaining"], 2);
    assert_eq!(rolled["payload"]["roll_number"], 1);
    let dice = rolled["payload"]["dice"].as_array().unwrap();
    assert_eq!(dice.len(), 5);
    for die in dice {
        let value = die.as_u64().unwrap();
        assert!((1..=6).contains(&value));
    }

    // Guest sees the same roll, in the same order
    let guest_rolled = guest.recv_type("DICE_ROLLED").await;
    assert_eq!(guest_rolled["payload"]["dice"], rolled["payload"]["dice"]);

    let expected_total: u64 = dice.iter().map(|d| d.as_u64().unwrap()).sum();
    send(
        &room,
        &host,
        RoomCommand::Score {
            category: Category::Chance,
        },
    )
    .await;
    let scored = host.recv_type("TURN_SCORED").await;
    assert_eq!(scored["payload"]["user_id"], "host");
    assert_eq!(scored["payload"]["category"], "chance");
    assert_eq!(scored["payload"]["points"], expected_total);
    assert_eq!(scored["payload"]["auto"], false);
    assert_eq!(scored["payload"]["totals"]["grandTotal"], expected_total);

    let next_turn = host.recv_type("TURN_STARTED").await;
    assert_eq!(next_turn["payload"]["user_id"], "guest");
    assert_eq!(next_turn["payload"]["turn_number"], 2);
}

/// Phase gating: rolling out of turn and scoring a taken category refuse
/// with ILLEGAL_STATE and change nothing.
#[tokio::test(start_paused = true)]
async fn illegal_commands_get_typed_errors() {
    let (env, _lobby_sink) = room_test_env(test_config());
    let room = spawn_room(&env, "ABC234", RoomConfig::default(), 42);

    let mut host = join_room(&room, "host", Role::Player).await;
    host.recv_type("ROOM_JOINED").await;
    let mut guest = join_room(&room, "guest", Role::Player).await;
    guest.recv_type("ROOM_JOINED").await;

    // Roll before the game starts
    send(&room, &host, RoomCommand::Roll).await;
    let error = host.recv_type("ROOM_ERROR").await;
    assert_eq!(error["payload"]["kind"], "ILLEGAL_STATE");

    // Non-host cannot start
    send(&room, &guest, RoomCommand::StartGame).await;
    let error = guest.recv_type("ROOM_ERROR").await;
    assert_eq!(error["payload"]["kind"], "UNAUTHORIZED");

    send(&room, &host, RoomCommand::StartGame).await;
    tokio::time::advance(Duration::from_secs(4)).await;
    host.recv_type("TURN_STARTED").await;

    // Guest acts out of turn
    send(&room, &guest, RoomCommand::Roll).await;
    let error = guest.recv_type("ROOM_ERROR").await;
    assert_eq!(error["payload"]["kind"], "ILLEGAL_STATE");

    // Keep edits before any roll
    send(&room, &host, RoomCommand::KeepAll).await;
    let error = host.recv_type("ROOM_ERROR").await;
    assert_eq!(error["payload"]["kind"], "ILLEGAL_STATE");
}

/// Scenario: the current player idles; the server warns, then auto-scores
/// the best open category and advances.
#[tokio::test(start_paused = true)]
async fn afk_turn_is_auto_scored() {
    let (env, _lobby_sink) = room_test_env(test_config());
    let room = spawn_room(&env, "ABC234", RoomConfig::default(), 42);

    let mut host = join_room(&room, "host", Role::Player).await;
    host.recv_type("ROOM_JOINED").await;
    let mut guest = join_room(&room, "guest", Role::Player).await;
    guest.recv_type("ROOM_JOINED").await;
    send(&room, &host, RoomCommand::StartGame).await;
    tokio::time::advance(Duration::from_secs(4)).await;
    host.recv_type("TURN_STARTED").await;

    // Cross the warning threshold
    tokio::time::advance(Duration::from_secs(31)).await;
    let warning = host.recv_type("AFK_WARNING").await;
    assert_eq!(warning["payload"]["user_id"], "host");

    // Cross the timeout
    tokio::time::advance(Duration::from_secs(30)).await;
    let scored = host.recv_type("TURN_SCORED").await;
    assert_eq!(scored["payload"]["user_id"], "host");
    assert_eq!(scored["payload"]["auto"], true);
    // Never rolled: every category is worth zero, the lexicographically
    // first open one is chance
    assert_eq!(scored["payload"]["category"], "chance");
    assert_eq!(scored["payload"]["points"], 0);

    let next_turn = host.recv_type("TURN_STARTED").await;
    assert_eq!(next_turn["payload"]["user_id"], "guest");
}

/// Scenario: reconnection within grace restores the exact turn state.
#[tokio::test(start_paused = true)]
async fn reconnect_within_grace_restores_turn_state() {
    let (env, _lobby_sink) = room_test_env(test_config());
    let room = spawn_room(&env, "ABC234", RoomConfig::default(), 42);

    let mut host = join_room(&room, "host", Role::Player).await;
    host.recv_type("ROOM_JOINED").await;
    let mut guest = join_room(&room, "guest", Role::Player).await;
    guest.recv_type("ROOM_JOINED").await;
    send(&room, &host, RoomCommand::StartGame).await;
    tokio::time::advance(Duration::from_secs(4)).await;
    host.recv_type("TURN_STARTED").await;

    send(&room, &host, RoomCommand::Roll).await;
    let rolled = host.recv_type("DICE_ROLLED").await;
    let dice = rolled["payload"]["dice"].clone();
    send(&room, &host, RoomCommand::ToggleKeep { index: 0 }).await;
    host.recv_type("KEPT_CHANGED").await;

    // Transport drops; the other player watches the presence change
    assert!(room.send(RoomMsg::Detach { conn_id: host.conn_id }).await);
    let presence = guest.recv_type("PLAYER_PRESENCE").await;
    assert_eq!(presence["payload"]["user_id"], "host");
    assert_eq!(presence["payload"]["presence"], "disconnected");
    assert!(presence["payload"]["reconnect_deadline"].is_string());

    // Reattach well within the 120s grace window
    tokio::time::advance(Duration::from_secs(30)).await;
    let mut host2 = join_room(&room, "host", Role::Player).await;
    let rejoined = host2.recv_type("ROOM_JOINED").await;
    assert_eq!(rejoined["payload"]["role"], "player");
    assert_eq!(rejoined["payload"]["was_downgraded"], false);

    let me = rejoined["payload"]["state"]["players"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["userId"] == "host")
        .unwrap()
        .clone();
    assert_eq!(me["presence"], "connected");
    assert_eq!(me["currentDice"], dice);
    assert_eq!(me["keptMask"][0], true);
    assert_eq!(me["rollsRemaining"], 2);
    assert_eq!(me["rollNumber"], 1);
    assert_eq!(rejoined["payload"]["state"]["phase"], "turn_decide");

    // And the game is still playable
    send(&room, &host2, RoomCommand::Roll).await;
    let rolled = host2.recv_type("DICE_ROLLED").await;
    assert_eq!(rolled["payload"]["rolls_remaining"], 1);
}

/// Scenario: grace expiry abandons the seat and play continues without it.
#[tokio::test(start_paused = true)]
async fn grace_expiry_abandons_the_seat() {
    let (env, _lobby_sink) = room_test_env(test_config());
    let room = spawn_room(&env, "ABC234", RoomConfig::default(), 42);

    let mut host = join_room(&room, "host", Role::Player).await;
    host.recv_type("ROOM_JOINED").await;
    let mut guest = join_room(&room, "guest", Role::Player).await;
    guest.recv_type("ROOM_JOINED").await;
    let mut third = join_room(&room, "third", Role::Player).await;
    third.recv_type("ROOM_JOINED").await;
    send(&room, &host, RoomCommand::StartGame).await;
    tokio::time::advance(Duration::from_secs(4)).await;
    guest.recv_type("TURN_STARTED").await;

    assert!(room.send(RoomMsg::Detach { conn_id: guest.conn_id }).await);

    // Past the 120s grace: the seat is gone for good
    tokio::time::advance(Duration::from_secs(121)).await;
    let abandoned = host.recv_type("PLAYER_ABANDONED").await;
    assert_eq!(abandoned["payload"]["user_id"], "guest");
}

/// Scenario: every human drops, the room pauses where it stands, and the
/// first reattach resumes the exact phase.
#[tokio::test(start_paused = true)]
async fn all_disconnect_pauses_and_resume_restores_phase() {
    let (env, _lobby_sink) = room_test_env(test_config());
    let room = spawn_room(&env, "ABC234", RoomConfig::default(), 42);

    let mut host = join_room(&room, "host", Role::Player).await;
    host.recv_type("ROOM_JOINED").await;
    let mut guest = join_room(&room, "guest", Role::Player).await;
    guest.recv_type("ROOM_JOINED").await;
    send(&room, &host, RoomCommand::StartGame).await;
    tokio::time::advance(Duration::from_secs(4)).await;
    host.recv_type("TURN_STARTED").await;
    send(&room, &host, RoomCommand::Roll).await;
    host.recv_type("DICE_ROLLED").await;

    assert!(room.send(RoomMsg::Detach { conn_id: host.conn_id }).await);
    assert!(room.send(RoomMsg::Detach { conn_id: guest.conn_id }).await);

    // Reattach within grace; pause must not have abandoned anyone.
    // Resume happens before the join reply, so the wire order is
    // ROOM_RESUMED then ROOM_JOINED with the live phase.
    tokio::time::advance(Duration::from_secs(10)).await;
    let mut guest2 = join_room(&room, "guest", Role::Player).await;
    let resumed = guest2.recv_type("ROOM_RESUMED").await;
    assert_eq!(resumed["payload"]["phase"], "turn_decide");
    let rejoined = guest2.recv_type("ROOM_JOINED").await;
    assert_eq!(rejoined["payload"]["state"]["phase"], "turn_decide");

    // The AFK clock restarted relative to now: the idle host times out
    // 60 virtual seconds later, not immediately
    tokio::time::advance(Duration::from_secs(61)).await;
    let scored = guest2.recv_type("TURN_SCORED").await;
    assert_eq!(scored["payload"]["user_id"], "host");
    assert_eq!(scored["payload"]["auto"], true);
}

/// Scenario: a full, playing room downgrades a would-be player to
/// spectator, with full scorecards and no strategy hints.
#[tokio::test(start_paused = true)]
async fn late_joiner_is_downgraded_to_spectator() {
    let (env, _lobby_sink) = room_test_env(test_config());
    let room_config = RoomConfig {
        max_players: 2,
        show_hints: true,
        ..RoomConfig::default()
    };
    let room = spawn_room(&env, "ABC234", room_config, 42);

    let mut host = join_room(&room, "host", Role::Player).await;
    host.recv_type("ROOM_JOINED").await;
    let mut guest = join_room(&room, "guest", Role::Player).await;
    guest.recv_type("ROOM_JOINED").await;
    send(&room, &host, RoomCommand::StartGame).await;
    tokio::time::advance(Duration::from_secs(4)).await;
    host.recv_type("TURN_STARTED").await;
    send(&room, &host, RoomCommand::Roll).await;
    host.recv_type("DICE_ROLLED").await;

    let mut watcher = join_room(&room, "watcher", Role::Player).await;
    let joined = watcher.recv_type("ROOM_JOINED").await;
    assert_eq!(joined["payload"]["role"], "spectator");
    assert_eq!(joined["payload"]["was_downgraded"], true);

    let players = joined["payload"]["state"]["players"].as_array().unwrap();
    assert_eq!(players.len(), 2);
    for player in players {
        // Scorecards visible in full; EV hints never reach spectators
        assert!(player["scorecard"].is_object());
        assert!(player.get("hints").is_none());
    }

    // Drain the chat replays; after that the spectator stream must be
    // silent, with no STRATEGY_HINTS leaking in
    watcher.recv_type("CHAT_HISTORY").await;
    watcher.recv_type("CHAT_HISTORY").await;
    assert!(watcher.idle());
}

/// Scenario: the host kicks a player; the seat is banned and cannot rejoin.
#[tokio::test(start_paused = true)]
async fn kicked_player_is_banned() {
    let (env, _lobby_sink) = room_test_env(test_config());
    let room = spawn_room(&env, "ABC234", RoomConfig::default(), 42);

    let mut host = join_room(&room, "host", Role::Player).await;
    host.recv_type("ROOM_JOINED").await;
    let mut guest = join_room(&room, "guest", Role::Player).await;
    guest.recv_type("ROOM_JOINED").await;

    send(
        &room,
        &host,
        RoomCommand::Kick {
            user_id: "guest".into(),
        },
    )
    .await;
    host.recv_type("PLAYER_LEFT").await;

    let mut again = join_room(&room, "guest", Role::Player).await;
    let refused = again.recv_type("ROOM_ERROR").await;
    assert_eq!(refused["payload"]["kind"], "ROOM_UNAVAILABLE");
}

/// Scenario: a queued spectator is promoted when a waiting-phase seat opens.
#[tokio::test(start_paused = true)]
async fn queued_spectator_gets_the_open_seat() {
    let (env, _lobby_sink) = room_test_env(test_config());
    let room_config = RoomConfig {
        max_players: 2,
        ..RoomConfig::default()
    };
    let room = spawn_room(&env, "ABC234", room_config, 42);

    let mut host = join_room(&room, "host", Role::Player).await;
    host.recv_type("ROOM_JOINED").await;
    let mut guest = join_room(&room, "guest", Role::Player).await;
    guest.recv_type("ROOM_JOINED").await;

    // Room is full: this join lands as a spectator
    let mut hopeful = join_room(&room, "hopeful", Role::Player).await;
    let joined = hopeful.recv_type("ROOM_JOINED").await;
    assert_eq!(joined["payload"]["role"], "spectator");
    send(&room, &hopeful, RoomCommand::QueueJoin).await;
    hopeful.recv_type("QUEUE_UPDATED").await;

    // The guest walks; the queue head takes the seat
    send(&room, &guest, RoomCommand::Leave).await;
    let promoted = hopeful.recv_type("PLAYER_JOINED").await;
    assert_eq!(promoted["payload"]["player"]["userId"], "hopeful");
    let refresh = hopeful.recv_type("ROOM_STATE").await;
    let players = refresh["payload"]["state"]["players"].as_array().unwrap();
    assert!(players.iter().any(|p| p["userId"] == "hopeful"));
}

/// Scenario: one human against an AI opponent; the AI takes whole turns by
/// itself on virtual time.
#[tokio::test(start_paused = true)]
async fn ai_opponent_plays_its_turn() {
    let (env, _lobby_sink) = room_test_env(test_config());
    let room = spawn_room(&env, "ABC234", RoomConfig::default(), 42);

    let mut host = join_room(&room, "host", Role::Player).await;
    host.recv_type("ROOM_JOINED").await;
    send(
        &room,
        &host,
        RoomCommand::AddAiPlayer {
            ai_profile_id: Some("professor".to_string()),
        },
    )
    .await;
    let seated = host.recv_type("PLAYER_JOINED").await;
    let ai_id = seated["payload"]["player"]["userId"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(seated["payload"]["player"]["type"], "ai");

    send(&room, &host, RoomCommand::StartGame).await;
    tokio::time::advance(Duration::from_secs(4)).await;
    host.recv_type("TURN_STARTED").await;

    // Human plays a quick first turn
    send(&room, &host, RoomCommand::Roll).await;
    host.recv_type("DICE_ROLLED").await;
    send(
        &room,
        &host,
        RoomCommand::Score {
            category: Category::Chance,
        },
    )
    .await;
    host.recv_type("TURN_SCORED").await;
    let turn = host.recv_type("TURN_STARTED").await;
    assert_eq!(turn["payload"]["user_id"], ai_id);

    // The AI thinks (virtual delay), rolls, and eventually scores
    let rolled = host.recv_type("DICE_ROLLED").await;
    assert_eq!(rolled["payload"]["user_id"], ai_id);
    let scored = host.recv_type("TURN_SCORED").await;
    assert_eq!(scored["payload"]["user_id"], ai_id);
    assert_eq!(scored["payload"]["auto"], false);

    // And the turn comes back around
    let turn = host.recv_type("TURN_STARTED").await;
    assert_eq!(turn["payload"]["user_id"], "host");
}

/// Scenario: cold restart. The durable slice is enough to wake the room
/// with every seat in grace, and a reattach picks the game back up.
#[tokio::test(start_paused = true)]
async fn snapshot_restores_room_after_restart() {
    let (env, _lobby_sink) = room_test_env(test_config());
    let room = spawn_room(&env, "ABC234", RoomConfig::default(), 42);

    let mut host = join_room(&room, "host", Role::Player).await;
    host.recv_type("ROOM_JOINED").await;
    let mut guest = join_room(&room, "guest", Role::Player).await;
    guest.recv_type("ROOM_JOINED").await;
    send(&room, &host, RoomCommand::StartGame).await;
    tokio::time::advance(Duration::from_secs(4)).await;
    host.recv_type("TURN_STARTED").await;
    send(&room, &host, RoomCommand::Roll).await;
    let rolled = host.recv_type("DICE_ROLLED").await;
    let dice = rolled["payload"]["dice"].clone();

    // "Crash": spawn a fresh actor from the same store
    let snapshot = env
        .store
        .load_snapshot(&"ABC234".parse().unwrap())
        .await
        .unwrap()
        .expect("snapshot was persisted");
    let revived = dicee_arena_server::room::RoomActor::spawn_restored(
        snapshot.state,
        env.clock.clone(),
        env.store.clone(),
        env.lobby.clone(),
        env.config.clone(),
    );

    let mut host2 = join_room(&revived, "host", Role::Player).await;
    let rejoined = host2.recv_type("ROOM_JOINED").await;
    assert_eq!(rejoined["payload"]["role"], "player");
    let me = rejoined["payload"]["state"]["players"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["userId"] == "host")
        .unwrap()
        .clone();
    assert_eq!(me["currentDice"], dice);
    assert_eq!(me["rollsRemaining"], 2);
}
