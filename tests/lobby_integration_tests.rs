//! Lobby actor scenarios: presence, chat quota, directory lifecycle,
//! invites and the join-request round trip.


use std::time::Duration;

use chrono::Utc;
use dicee_arena_server::lobby::LobbyMsg;
use dicee_arena_server::protocol::{
    LobbyCommand, PlayerSummary, Role, RoomCommand, RoomStatus, RoomStatusUpdate, UserId,
};
use dicee_arena_server::room::RoomMsg;
use test_helpers::*;
use uuid::Uuid;

fn fake_status(code: &str, status: RoomStatus) -> RoomStatusUpdate {
    RoomStatusUpdate {
        code: code.parse().unwrap(),
        game: "dicee".to_string(),
        status,
        player_count: 2,
        spectator_count: 0,
        max_players: 4,
        round_number: 3,
        total_rounds: 13,
        is_public: true,
        allow_spectators: true,
        players: Vec::<PlayerSummary>::new(),
        host_id: UserId::from("h"),
        host_name: "Host".to_string(),
        updated_at: Utc::now(),
        paused_at: None,
        identity: None,
    }
}

#[tokio::test(start_paused = true)]
async fn presence_counts_unique_users() {
    let (env, _registry) = lobby_test_env(test_config());

    let mut alice = join_lobby(&env.lobby, "alice").await;
    let init = alice.recv_type("PRESENCE_INIT").await;
    assert_eq!(init["payload"]["online_count"], 1);

    // Second tab for the same user: no join broadcast, count stays 1
    let mut alice_tab = join_lobby(&env.lobby, "alice").await;
    let init = alice_tab.recv_type("PRESENCE_INIT").await;
    assert_eq!(init["payload"]["online_count"], 1);

    // A different user joins: broadcast fires once
    let mut bob = join_lobby(&env.lobby, "bob").await;
    let init = bob.recv_type("PRESENCE_INIT").await;
    assert_eq!(init["payload"]["online_count"], 2);
    let joined = alice.recv_type("PRESENCE_JOIN").await;
    assert_eq!(joined["payload"]["user"]["userId"], "bob");

    // First tab closes: still online, no leave broadcast
    assert!(env.lobby.send(LobbyMsg::Detach { conn_id: alice.conn_id }).await);
    assert!(env.lobby.send(LobbyMsg::Command {
        conn_id: bob.conn_id,
        command: LobbyCommand::GetOnlineUsers,
    })
    .await);
    let users = bob.recv_type("LOBBY_ONLINE_USERS").await;
    assert_eq!(users["payload"]["users"].as_array().unwrap().len(), 2);

    // Last tab closes: the leave goes out
    assert!(env.lobby.send(LobbyMsg::Detach { conn_id: alice_tab.conn_id }).await);
    let left = bob.recv_type("PRESENCE_LEAVE").await;
    assert_eq!(left["payload"]["user_id"], "alice");
}

#[tokio::test(start_paused = true)]
async fn chat_rate_limit_is_thirty_per_minute() {
    let (env, _registry) = lobby_test_env(test_config());
    let mut chatty = join_lobby(&env.lobby, "chatty").await;
    chatty.recv_type("PRESENCE_INIT").await;

    for i in 0..30 {
        assert!(env.lobby.send(LobbyMsg::Command {
            conn_id: chatty.conn_id,
            command: LobbyCommand::LobbyChat {
                content: format!("message {i}"),
            },
        })
        .await);
        let message = chatty.recv_type("LOBBY_CHAT_MESSAGE").await;
        assert_eq!(message["payload"]["message"]["content"], format!("message {i}"));
    }

    // Message 31 inside the same rolling window bounces
    assert!(env.lobby.send(LobbyMsg::Command {
        conn_id: chatty.conn_id,
        command: LobbyCommand::LobbyChat {
            content: "one too many".to_string(),
        },
    })
    .await);
    let error = chatty.recv_type("LOBBY_ERROR").await;
    assert_eq!(error["payload"]["kind"], "RATE_LIMITED");

    // Once the window rolls past, chat flows again
    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(env.lobby.send(LobbyMsg::Command {
        conn_id: chatty.conn_id,
        command: LobbyCommand::LobbyChat {
            content: "fresh window".to_string(),
        },
    })
    .await);
    chatty.recv_type("LOBBY_CHAT_MESSAGE").await;
}

#[tokio::test(start_paused = true)]
async fn chat_history_replays_to_new_joiners() {
    let (env, _registry) = lobby_test_env(test_config());
    let mut early = join_lobby(&env.lobby, "early").await;
    early.recv_type("PRESENCE_INIT").await;

    for i in 0..3 {
        assert!(env.lobby.send(LobbyMsg::Command {
            conn_id: early.conn_id,
            command: LobbyCommand::LobbyChat {
                content: format!("hello {i}"),
            },
        })
        .await);
        early.recv_type("LOBBY_CHAT_MESSAGE").await;
    }

    let mut late = join_lobby(&env.lobby, "late").await;
    let history = late.recv_type("LOBBY_CHAT_HISTORY").await;
    let messages = history["payload"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["content"], "hello 0");
}

#[tokio::test(start_paused = true)]
async fn directory_lists_and_expires_finished_rooms() {
    let (env, _registry) = lobby_test_env(test_config());
    let mut client = join_lobby(&env.lobby, "viewer").await;
    client.recv_type("LOBBY_ROOMS_LIST").await;

    env.lobby.room_update(fake_status("ABC234", RoomStatus::Playing)).await;
    let update = client.recv_type("LOBBY_ROOM_UPDATE").await;
    assert_eq!(update["payload"]["action"], "created");
    assert_eq!(update["payload"]["room"]["code"], "ABC234");

    assert!(env.lobby.send(LobbyMsg::Command {
        conn_id: client.conn_id,
        command: LobbyCommand::GetRooms,
    })
    .await);
    let list = client.recv_type("LOBBY_ROOMS_LIST").await;
    assert_eq!(list["payload"]["rooms"].as_array().unwrap().len(), 1);

    // The room finishes; it lingers for the recent-results view
    env.lobby.room_update(fake_status("ABC234", RoomStatus::Finished)).await;
    let update = client.recv_type("LOBBY_ROOM_UPDATE").await;
    assert_eq!(update["payload"]["action"], "updated");

    // After the ~60s retention (plus a sweep tick) it is gone
    tokio::time::advance(Duration::from_secs(80)).await;
    let update = client.recv_type("LOBBY_ROOM_UPDATE").await;
    assert_eq!(update["payload"]["action"], "closed");
    assert_eq!(update["payload"]["code"], "ABC234");

    assert!(env.lobby.send(LobbyMsg::Command {
        conn_id: client.conn_id,
        command: LobbyCommand::GetRooms,
    })
    .await);
    let list = client.recv_type("LOBBY_ROOMS_LIST").await;
    assert!(list["payload"]["rooms"].as_array().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn invites_route_dedupe_and_cancel() {
    let (env, _registry) = lobby_test_env(test_config());
    let mut sender = join_lobby(&env.lobby, "sender").await;
    sender.recv_type("PRESENCE_INIT").await;
    let mut target = join_lobby(&env.lobby, "target").await;
    target.recv_type("PRESENCE_INIT").await;

    // The invite references a listed room
    env.lobby.room_update(fake_status("ABC234", RoomStatus::Waiting)).await;
    sender.recv_type("LOBBY_ROOM_UPDATE").await;

    assert!(env.lobby.send(LobbyMsg::Command {
        conn_id: sender.conn_id,
        command: LobbyCommand::SendInvite {
            to_user_id: UserId::from("target"),
            room_code: "ABC234".parse().unwrap(),
        },
    })
    .await);
    let received = target.recv_type("INVITE_RECEIVED").await;
    assert_eq!(received["payload"]["invite"]["roomCode"], "ABC234");
    assert_eq!(received["payload"]["invite"]["fromUserId"], "sender");
    let invite_id: Uuid = received["payload"]["invite"]["id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    // The same (from, to, room) triple is idempotent
    assert!(env.lobby.send(LobbyMsg::Command {
        conn_id: sender.conn_id,
        command: LobbyCommand::SendInvite {
            to_user_id: UserId::from("target"),
            room_code: "ABC234".parse().unwrap(),
        },
    })
    .await);
    let error = sender.recv_type("LOBBY_ERROR").await;
    assert_eq!(error["payload"]["kind"], "CONFLICT");

    // Revocation reaches the target
    assert!(env.lobby.send(LobbyMsg::Command {
        conn_id: sender.conn_id,
        command: LobbyCommand::CancelInvite { invite_id },
    })
    .await);
    let cancelled = target.recv_type("INVITE_CANCELLED").await;
    assert_eq!(
        cancelled["payload"]["invite_id"].as_str().unwrap(),
        invite_id.to_string()
    );
}

/// The full join-request round trip: lobby -> room host -> approval ->
/// authorized private-room join.
#[tokio::test(start_paused = true)]
async fn join_request_approval_admits_into_private_room() {
    let (env, registry) = lobby_test_env(test_config());

    // A private room with a seated host
    let room = registry
        .create_room(Some(dicee_arena_server::protocol::RoomCreateOptions {
            is_public: Some(false),
            ..Default::default()
        }))
        .await
        .expect("room created");
    let code = room.code().clone();
    let mut host = join_room(&room, "host", Role::Player).await;
    host.recv_type("ROOM_JOINED").await;

    // A hopeful player asks from the lobby
    let mut hopeful = join_lobby(&env.lobby, "hopeful").await;
    hopeful.recv_type("PRESENCE_INIT").await;
    assert!(env.lobby.send(LobbyMsg::Command {
        conn_id: hopeful.conn_id,
        command: LobbyCommand::RequestJoin {
            room_code: code.clone(),
        },
    })
    .await);
    let sent = hopeful.recv_type("JOIN_REQUEST_SENT").await;
    let request_id: Uuid = sent["payload"]["request"]["id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    // The host sees it on the room connection and approves
    let received = host.recv_type("JOIN_REQUEST_RECEIVED").await;
    assert_eq!(received["payload"]["request"]["userId"], "hopeful");
    send(&room, &host, RoomCommand::ApproveJoin { request_id }).await;

    let approved = hopeful.recv_type("JOIN_REQUEST_APPROVED").await;
    assert_eq!(approved["payload"]["room_code"], code.as_str());

    // The approval authorizes a player join within its TTL
    let mut joined_client = join_room(&room, "hopeful", Role::Player).await;
    let joined = joined_client.recv_type("ROOM_JOINED").await;
    assert_eq!(joined["payload"]["role"], "player");
    assert_eq!(joined["payload"]["was_downgraded"], false);
}

/// Without approval, a private room refuses a direct player join.
#[tokio::test(start_paused = true)]
async fn private_room_refuses_unapproved_joins() {
    let (_env, registry) = lobby_test_env(test_config());
    let room = registry
        .create_room(Some(dicee_arena_server::protocol::RoomCreateOptions {
            is_public: Some(false),
            ..Default::default()
        }))
        .await
        .expect("room created");
    let mut host = join_room(&room, "host", Role::Player).await;
    host.recv_type("ROOM_JOINED").await;

    let mut stranger = join_room(&room, "stranger", Role::Player).await;
    let refused = stranger.recv_type("ROOM_ERROR").await;
    assert_eq!(refused["payload"]["kind"], "UNAUTHORIZED");
}

/// A room actor spawned through the registry reports itself to the lobby
/// directory, and GET_ROOMS sees it.
#[tokio::test(start_paused = true)]
async fn rooms_created_by_the_registry_appear_in_the_directory() {
    let (env, registry) = lobby_test_env(test_config());
    let mut viewer = join_lobby(&env.lobby, "viewer").await;
    viewer.recv_type("PRESENCE_INIT").await;

    let room = registry.create_room(None).await.expect("room created");
    let mut host = join_room(&room, "host", Role::Player).await;
    host.recv_type("ROOM_JOINED").await;

    let update = viewer.recv_type("LOBBY_ROOM_UPDATE").await;
    assert_eq!(update["payload"]["room"]["code"], room.code().as_str());

    assert!(env.lobby.send(LobbyMsg::Command {
        conn_id: viewer.conn_id,
        command: LobbyCommand::GetRooms,
    })
    .await);
    let list = viewer.recv_type("LOBBY_ROOMS_LIST").await;
    let rooms = list["payload"]["rooms"].as_array().unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0]["status"], "waiting");
    assert_eq!(rooms[0]["playerCount"], 1);
}
