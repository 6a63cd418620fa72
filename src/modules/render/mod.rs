use axum::routing::post;
use axum::Router;
use crate::state::AppState;

pub mod dto;
pub mod events;
pub mod handler;
pub mod service;

/// Push-delivery endpoints invoked by the queue infrastructure, not by end
/// users; response status is the ack/nack signal.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs", post(handler::process_render_job))
        .route("/dead-letter", post(handler::process_dead_letter))
}
