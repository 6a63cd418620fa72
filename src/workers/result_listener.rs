use std::time::Duration;

use futures_util::StreamExt;
use redis::ErrorKind;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::modules::notify::processor::ResultProcessor;
use crate::modules::render::events::RenderResult;
use crate::state::AppState;

/// Upper bound on one wait for a bus message. Waking with nothing to read is
/// the normal idle path, not an error.
const POLL_TIMEOUT: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const RESET_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
enum BusError {
    #[error("connection lost: {0}")]
    Connection(redis::RedisError),
    #[error("protocol error: {0}")]
    Protocol(redis::RedisError),
    #[error("fatal error: {0}")]
    Fatal(redis::RedisError),
}

fn classify(err: redis::RedisError) -> BusError {
    if err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.is_timeout()
    {
        return BusError::Connection(err);
    }
    match err.kind() {
        ErrorKind::AuthenticationFailed | ErrorKind::InvalidClientConfig => BusError::Fatal(err),
        _ => BusError::Protocol(err),
    }
}

/// Long-running subscriber on the render result channel. Transport failures
/// trigger a resubscribe after a backoff; only unrecoverable conditions such
/// as bad credentials make this return Err.
pub async fn run_result_listener(state: AppState) -> anyhow::Result<()> {
    info!("📡 Starting result listener...");

    loop {
        if state.shutdown.is_cancelled() {
            return Ok(());
        }

        match listen_once(&state).await {
            Ok(()) => return Ok(()),
            Err(BusError::Connection(e)) => {
                error!(
                    "Result bus connection lost: {}. Reconnecting in {}s",
                    e,
                    RECONNECT_DELAY.as_secs()
                );
                tokio::select! {
                    _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    _ = state.shutdown.cancelled() => return Ok(()),
                }
            }
            Err(BusError::Protocol(e)) => {
                error!(
                    "Result bus protocol error: {}. Resetting in {}s",
                    e,
                    RESET_DELAY.as_secs()
                );
                tokio::select! {
                    _ = tokio::time::sleep(RESET_DELAY) => {}
                    _ = state.shutdown.cancelled() => return Ok(()),
                }
            }
            Err(BusError::Fatal(e)) => {
                return Err(anyhow::anyhow!("Result listener cannot continue: {}", e));
            }
        }
    }
}

/// One subscription lifetime: subscribe, then drain messages until the
/// connection fails or shutdown is requested.
async fn listen_once(state: &AppState) -> Result<(), BusError> {
    let mut pubsub = state.redis.get_pubsub().await.map_err(classify)?;
    pubsub
        .subscribe(&state.config.result_channel)
        .await
        .map_err(classify)?;
    info!(
        "Subscribed to result channel '{}'",
        state.config.result_channel
    );

    let mut stream = pubsub.on_message();
    loop {
        let msg = tokio::select! {
            polled = timeout(POLL_TIMEOUT, stream.next()) => match polled {
                Ok(Some(msg)) => msg,
                Ok(None) => {
                    return Err(BusError::Connection(redis::RedisError::from((
                        ErrorKind::IoError,
                        "pub/sub stream ended",
                    ))));
                }
                // Idle window with no traffic; keep waiting
                Err(_) => continue,
            },
            _ = state.shutdown.cancelled() => return Ok(()),
        };

        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Discarding unreadable bus payload: {}", e);
                continue;
            }
        };
        info!("Received from result bus: {}", payload);

        let result: RenderResult = match serde_json::from_str(&payload) {
            Ok(result) => result,
            Err(e) => {
                error!("Malformed render result on bus: {}", e);
                continue;
            }
        };

        deliver(state, &result).await;
    }
}

async fn deliver(state: &AppState, result: &RenderResult) {
    match ResultProcessor::process(state, result).await {
        Ok(Some(message)) => state.connections.send_to_user(result.user_id, &message),
        Ok(None) => {}
        Err(e) => {
            error!(
                "Error processing result for user '{}': {}",
                result.user_id, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_connection_problems() {
        let err = redis::RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        ));
        assert!(matches!(classify(err), BusError::Connection(_)));
    }

    #[test]
    fn server_responses_are_protocol_problems() {
        let err = redis::RedisError::from((ErrorKind::ResponseError, "wrong type"));
        assert!(matches!(classify(err), BusError::Protocol(_)));
    }

    #[test]
    fn auth_failures_are_fatal() {
        let err = redis::RedisError::from((ErrorKind::AuthenticationFailed, "denied"));
        assert!(matches!(classify(err), BusError::Fatal(err) if err.kind() == ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn bad_client_config_is_fatal() {
        let err = redis::RedisError::from((ErrorKind::InvalidClientConfig, "no such db"));
        assert!(matches!(classify(err), BusError::Fatal(_)));
    }
}
