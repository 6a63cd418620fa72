use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{info, warn};

use super::dto::{TokenFrame, WsQuery};
use super::registry::ClientConnection;
use crate::common::security::{self, AuthError};
use crate::state::AppState;

/// How long a client that sent no `token` query parameter gets to deliver
/// its token as the first text frame.
const FIRST_FRAME_DEADLINE: Duration = Duration::from_secs(10);

const CLOSE_MISSING_TOKEN: u16 = 4001;
const CLOSE_INVALID_TOKEN: u16 = 4002;
const CLOSE_AUTH_FAILED: u16 = 4003;

/// Upgrade to the render progress stream. Browser WebSocket clients cannot
/// set an Authorization header, so the JWT arrives either as a `token` query
/// parameter or as the first text frame after the upgrade.
pub async fn ws_progress(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.token))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, query_token: Option<String>) {
    let token = match query_token {
        Some(token) => Some(token),
        None => await_token_frame(&mut socket).await,
    };

    let Some(token) = token else {
        warn!("Rejected websocket: {}", AuthError::MissingToken);
        close_with(socket, CLOSE_MISSING_TOKEN, "Authentication token required").await;
        return;
    };

    let user_id = match security::verify_token(&state.config.jwt_secret, &token) {
        Ok(claims) => claims.sub,
        Err(err @ AuthError::InvalidToken(_)) => {
            warn!("Rejected websocket: {}", err);
            close_with(socket, CLOSE_INVALID_TOKEN, "Invalid or expired token").await;
            return;
        }
        Err(err) => {
            warn!("Rejected websocket: {}", err);
            close_with(socket, CLOSE_AUTH_FAILED, "Authentication failed").await;
            return;
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let connection = ClientConnection::new(tx);
    let connection_id = connection.id;
    state.connections.connect(user_id, connection);
    info!(
        "User '{}' connected. Total connections for user: {}",
        user_id,
        state.connections.connection_count(user_id)
    );

    let (mut sender, mut receiver) = socket.split();

    // Pump frames queued by the result listener out to this socket.
    let mut writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(frame).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                // Clients have nothing to say after authenticating; drain and ignore
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Websocket error for user '{}': {}", user_id, e);
                    break;
                }
            },
            _ = state.shutdown.cancelled() => break,
            _ = &mut writer => break,
        }
    }

    state.connections.disconnect(user_id, connection_id);
    writer.abort();
    info!("Cleaned up connection for user '{}'", user_id);
}

/// Wait for the client's first text frame and pull a token out of it. The
/// frame may be a JSON object `{"token": "..."}` or the bare token string.
async fn await_token_frame(socket: &mut WebSocket) -> Option<String> {
    let frame = timeout(FIRST_FRAME_DEADLINE, socket.recv()).await.ok()??;
    let text = match frame {
        Ok(Message::Text(text)) => text,
        _ => return None,
    };

    let token = match serde_json::from_str::<TokenFrame>(&text) {
        Ok(frame) => frame.token,
        Err(_) => text.trim().to_string(),
    };

    (!token.is_empty()).then_some(token)
}

async fn close_with(mut socket: WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}
