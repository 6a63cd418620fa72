use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::settings::AppConfig;
use crate::infrastructure::db::pool::DbPool;
use crate::infrastructure::queue::rabbitmq::JobQueue;
use crate::infrastructure::redis::client::RedisService;
use crate::infrastructure::storage::s3::StorageService;
use crate::modules::notify::registry::ConnectionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub redis: RedisService,
    /// None when AMQP is not configured; render submission answers 503.
    pub queue: Option<JobQueue>,
    /// None when storage credentials are not configured.
    pub storage: Option<StorageService>,
    pub connections: Arc<ConnectionRegistry>,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: DbPool,
        redis: RedisService,
        queue: Option<JobQueue>,
        storage: Option<StorageService>,
        connections: Arc<ConnectionRegistry>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            db,
            redis,
            queue,
            storage,
            connections,
            shutdown,
        }
    }
}
