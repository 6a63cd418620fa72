use axum::middleware;
use axum::routing::post;
use axum::Router;
use crate::state::AppState;

pub mod dto;
pub mod handler;
pub mod model;
pub mod repository;
pub mod service;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/canvases/{id}/render", post(handler::render_canvas))
        .route("/prompts/{id}/render", post(handler::render_prompt))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth::auth_middleware,
        ))
}
