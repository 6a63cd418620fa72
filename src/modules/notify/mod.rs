use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub mod dto;
pub mod handler;
pub mod processor;
pub mod registry;

/// Websocket routes. Authentication happens inside the socket handshake, so
/// no middleware layer is attached here.
pub fn router() -> Router<AppState> {
    Router::new().route("/ws/progress", get(handler::ws_progress))
}
