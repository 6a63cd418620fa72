use std::sync::Arc;

use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::settings::AppConfig;
use crate::infrastructure::db::pool::connect_to_db;
use crate::infrastructure::queue::rabbitmq::JobQueue;
use crate::infrastructure::redis::client::RedisService;
use crate::infrastructure::storage::s3::StorageService;
use crate::modules::notify::registry::ConnectionRegistry;
use crate::state::AppState;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod middleware;
mod modules;
mod routes;
mod state;
mod workers;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting server...");

    let config = AppConfig::new()
        .map_err(|e| anyhow::anyhow!("Incomplete environment configuration: {}", e))?;

    let db = connect_to_db(&config.database_url).await?;
    let redis = RedisService::new(&config.redis_url).await?;

    let queue = match &config.amqp_url {
        Some(url) => match JobQueue::new(url, &config.render_queue, &config.render_dlq).await {
            Ok(queue) => Some(queue),
            Err(e) => {
                error!("Failed to connect to RabbitMQ: {}", e);
                None
            }
        },
        None => {
            warn!("AMQP_URL not set; render submission is disabled");
            None
        }
    };

    let storage = match (
        &config.minio_url,
        &config.minio_access_key,
        &config.minio_secret_key,
    ) {
        (Some(endpoint), Some(access_key), Some(secret_key)) => Some(
            StorageService::new(endpoint, &config.minio_bucket, access_key, secret_key).await,
        ),
        _ => {
            warn!("Storage credentials not fully configured; media cleanup is disabled");
            None
        }
    };

    let connections = Arc::new(ConnectionRegistry::new());
    let shutdown = CancellationToken::new();

    let state = AppState::new(config, db, redis, queue, storage, connections, shutdown.clone());

    let listener_handle = tokio::spawn(workers::result_listener::run_result_listener(
        state.clone(),
    ));
    let sweeper_handle = tokio::spawn(workers::storage_sweeper::run_storage_sweeper(
        state.clone(),
    ));

    let app = app::create_app(state.clone()).await;

    let addr = format!("0.0.0.0:{}", state.config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();

    if let Err(e) = sweeper_handle.await {
        warn!("Storage sweeper did not shut down cleanly: {}", e);
    }
    match listener_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Result listener terminated with error: {}", e),
        Err(e) => warn!("Result listener did not shut down cleanly: {}", e),
    }

    info!("Server stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM and cancels the shared token so the
/// websocket loops and workers wind down while axum drains connections.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}
