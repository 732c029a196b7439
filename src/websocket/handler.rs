use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::protocol::validation::{validate_display_name, validate_user_id};
use crate::protocol::{Identity, UserId};

use super::connection::{handle_lobby_socket, handle_room_socket};
use super::routes::AppState;

/// Identity attached to a lobby connection by the upstream auth layer,
/// passed through as query parameters on the upgrade request.
#[derive(Debug, Deserialize)]
pub(super) struct IdentityQuery {
    #[serde(alias = "userId")]
    pub user_id: String,
    #[serde(alias = "displayName")]
    pub display_name: String,
    #[serde(alias = "avatarSeed", default)]
    pub avatar_seed: String,
}

/// WebSocket handler for the lobby connection.
pub(super) async fn lobby_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<IdentityQuery>,
) -> Response {
    if let Err(reason) = validate_user_id(&query.user_id)
        .and_then(|()| validate_display_name(&query.display_name, &state.config.protocol))
    {
        return (StatusCode::BAD_REQUEST, reason).into_response();
    }
    let identity = Identity {
        user_id: UserId(query.user_id),
        display_name: query.display_name,
        avatar_seed: query.avatar_seed,
    };
    ws.on_upgrade(move |socket| handle_lobby_socket(socket, state, identity))
}

/// WebSocket handler for a game-room connection. The path segment is a room
/// code, or the literal `new` to create a room; the first frame must be
/// `ROOM_JOIN`.
pub(super) async fn room_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| handle_room_socket(socket, state, code))
}
