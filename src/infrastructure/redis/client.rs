use redis::aio::{MultiplexedConnection, PubSub};
use redis::{AsyncCommands, Client};
use tracing::info;

#[derive(Clone)]
pub struct RedisService {
    client: Client,
}

impl RedisService {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = Client::open(connection_string)?;

        // Test connection
        let _conn = client.get_multiplexed_async_connection().await?;

        info!("✅ Connected to Redis");
        Ok(Self { client })
    }

    pub async fn get_conn(&self) -> Result<MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    /// Dedicated pub/sub connection. Pub/sub cannot share the multiplexed
    /// connection, so the listener owns one of these for its lifetime and
    /// drops it on teardown.
    pub async fn get_pubsub(&self) -> Result<PubSub, redis::RedisError> {
        self.client.get_async_pubsub().await
    }

    pub async fn publish(&self, channel: &str, payload: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.get_conn().await?;
        let _: () = conn.publish(channel, payload).await?;
        Ok(())
    }
}
