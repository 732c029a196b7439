use axum::extract::State;
use axum::routing::get;
use serde_json::json;
use std::sync::Arc;

use crate::config::Config;
use crate::lobby::LobbyHandle;
use crate::registry::RoomRegistry;
use crate::runtime::Clock;

use super::handler::{lobby_handler, room_handler};

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub lobby: LobbyHandle,
    pub registry: Arc<RoomRegistry>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<Config>,
}

/// Create the Axum router with WebSocket support.
pub fn create_router(state: AppState) -> axum::Router {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let cors = CorsLayer::new().allow_origin(Any).allow_headers(Any);

    axum::Router::new()
        .route("/lobby", get(lobby_handler))
        .route("/rooms/{code}", get(room_handler))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint: liveness plus a couple of cheap gauges.
async fn health_check(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(json!({
        "status": "ok",
        "rooms": state.registry.live_rooms(),
        "time": state.clock.now().to_rfc3339(),
    }))
}
