// WebSocket module
//
// The transport edge of the server:
//
// - handler: WebSocket upgrade handlers (lobby and room entry points)
// - connection: socket pumps bridging frames to actor mailboxes
// - routes: HTTP route setup (websockets, health)

mod connection;
mod handler;
mod routes;

pub use routes::{create_router, AppState};
