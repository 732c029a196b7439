//! Socket pumps: bridge WebSocket frames to actor mailboxes.
//!
//! Each connection gets a writer task draining a per-connection channel of
//! pre-serialized frames, and a read loop that parses commands and forwards
//! them to the owning actor. Parse failures answer with a typed error frame
//! and never close the socket; actors never see malformed input.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::lobby::LobbyMsg;
use crate::protocol::validation::parse_command;
use crate::protocol::{
    Envelope, ErrorKind, Identity, LobbyCommand, LobbyEvent, RoomCode, RoomCommand, RoomEvent,
};
use crate::room::{RoomHandle, RoomMsg};

use super::routes::AppState;

/// Outbound frames buffered per connection before backpressure.
const OUTBOUND_CAPACITY: usize = 64;

fn spawn_writer(
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> (mpsc::Sender<String>, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
    let task = tokio::spawn(async move {
        while let Some(json) = rx.recv().await {
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });
    (tx, task)
}

pub(super) async fn handle_lobby_socket(socket: WebSocket, state: AppState, identity: Identity) {
    let (sender, mut receiver) = socket.split();
    let (tx, writer) = spawn_writer(sender);
    let conn_id = Uuid::new_v4();

    tracing::info!(%conn_id, user_id = %identity.user_id, "Lobby WebSocket established");
    let attached = state
        .lobby
        .send(LobbyMsg::Attach {
            conn_id,
            identity,
            outbound: tx.clone(),
        })
        .await;
    if !attached {
        drop(tx);
        let _ = writer.await;
        return;
    }

    while let Some(frame) = receiver.next().await {
        let Ok(message) = frame else { break };
        let text = match message {
            Message::Text(text) => text.to_string(),
            Message::Close(_) => break,
            // Ping/pong keepalive is answered by the transport layer and
            // never reaches the actor
            _ => continue,
        };
        match parse_command::<LobbyCommand>(&text, &state.config.protocol) {
            Ok(command) => {
                if !state.lobby.send(LobbyMsg::Command { conn_id, command }).await {
                    break;
                }
            }
            Err((kind, reason)) => {
                send_lobby_error(&state, &tx, kind, reason).await;
            }
        }
    }

    let _ = state.lobby.send(LobbyMsg::Detach { conn_id }).await;
    drop(tx);
    let _ = writer.await;
    tracing::debug!(%conn_id, "Lobby WebSocket closed");
}

pub(super) async fn handle_room_socket(socket: WebSocket, state: AppState, code_param: String) {
    let (sender, mut receiver) = socket.split();
    let (tx, writer) = spawn_writer(sender);
    let conn_id = Uuid::new_v4();
    let mut room: Option<RoomHandle> = None;

    tracing::info!(%conn_id, code = %code_param, "Room WebSocket established");

    while let Some(frame) = receiver.next().await {
        let Ok(message) = frame else { break };
        let text = match message {
            Message::Text(text) => text.to_string(),
            Message::Close(_) => break,
            _ => continue,
        };
        let command = match parse_command::<RoomCommand>(&text, &state.config.protocol) {
            Ok(command) => command,
            Err((kind, reason)) => {
                send_room_error(&state, &tx, kind, reason).await;
                continue;
            }
        };

        match &room {
            Some(handle) => {
                if !handle.send(RoomMsg::Command { conn_id, command }).await {
                    send_room_error(
                        &state,
                        &tx,
                        ErrorKind::NotFound,
                        "The room has closed".to_string(),
                    )
                    .await;
                    break;
                }
            }
            None => {
                // The first accepted frame must be ROOM_JOIN; it resolves
                // (or creates) the room this socket belongs to
                let options = match &command {
                    RoomCommand::RoomJoin { options, .. } => options.clone(),
                    _ => {
                        send_room_error(
                            &state,
                            &tx,
                            ErrorKind::Unauthorized,
                            "ROOM_JOIN must be the first message".to_string(),
                        )
                        .await;
                        continue;
                    }
                };

                let resolved = resolve_room(&state, &code_param, options).await;
                match resolved {
                    Ok(handle) => {
                        let attached = handle
                            .send(RoomMsg::Attach {
                                conn_id,
                                outbound: tx.clone(),
                            })
                            .await;
                        if attached {
                            let _ = handle.send(RoomMsg::Command { conn_id, command }).await;
                            room = Some(handle);
                        } else {
                            send_room_error(
                                &state,
                                &tx,
                                ErrorKind::NotFound,
                                "The room has closed".to_string(),
                            )
                            .await;
                            break;
                        }
                    }
                    Err((kind, reason)) => {
                        send_room_error(&state, &tx, kind, reason).await;
                        // A bad code is unrecoverable on this socket
                        if kind == ErrorKind::NotFound || kind == ErrorKind::Malformed {
                            break;
                        }
                    }
                }
            }
        }
    }

    if let Some(handle) = &room {
        let _ = handle.send(RoomMsg::Detach { conn_id }).await;
    }
    drop(tx);
    let _ = writer.await;
    tracing::debug!(%conn_id, "Room WebSocket closed");
}

async fn resolve_room(
    state: &AppState,
    code_param: &str,
    options: Option<crate::protocol::RoomCreateOptions>,
) -> Result<RoomHandle, (ErrorKind, String)> {
    if code_param.eq_ignore_ascii_case("new") {
        return state.registry.create_room(options).await;
    }
    let code = RoomCode::parse(code_param).map_err(|e| (ErrorKind::Malformed, e.to_string()))?;
    state
        .registry
        .lookup_or_restore(&code)
        .await
        .ok_or_else(|| (ErrorKind::NotFound, format!("No room {code}")))
}

async fn send_lobby_error(state: &AppState, tx: &mpsc::Sender<String>, kind: ErrorKind, message: String) {
    let event = LobbyEvent::LobbyError { kind, message };
    if let Ok(json) = Envelope::new(event, state.clock.now()).to_json() {
        let _ = tx.send(json).await;
    }
}

async fn send_room_error(state: &AppState, tx: &mpsc::Sender<String>, kind: ErrorKind, message: String) {
    let event = RoomEvent::RoomError { kind, message };
    if let Ok(json) = Envelope::new(event, state.clock.now()).to_json() {
        let _ = tx.send(json).await;
    }
}
