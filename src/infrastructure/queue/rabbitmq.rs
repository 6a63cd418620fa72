use anyhow::{anyhow, Result};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{
    options::*, BasicProperties, Channel, Connection, ConnectionProperties,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// How many delivery attempts the broker makes before a job is dead-lettered.
const DELIVERY_LIMIT: i64 = 5;

/// Handle to the render work queue. Jobs are published persistent with their
/// attributes as AMQP headers; the queue is declared with a dead-letter
/// companion so exhausted jobs end up in front of the dead-letter handler.
#[derive(Clone)]
pub struct JobQueue {
    url: String,
    queue: String,
    dead_letter_queue: String,
    conn: Arc<Mutex<Connection>>,
    channel: Arc<Mutex<Channel>>,
}

impl JobQueue {
    async fn connect(url: &str) -> Result<(Connection, Channel)> {
        info!("Connecting to RabbitMQ at {}", url);
        let conn = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| anyhow!("Failed to connect to RabbitMQ: {}", e))?;

        let channel = conn
            .create_channel()
            .await
            .map_err(|e| anyhow!("Failed to create channel: {}", e))?;

        info!("Connected to RabbitMQ");
        Ok((conn, channel))
    }

    pub async fn new(url: &str, queue: &str, dead_letter_queue: &str) -> Result<Self> {
        let (conn, channel) = Self::connect(url).await?;

        Ok(Self {
            url: url.to_string(),
            queue: queue.to_string(),
            dead_letter_queue: dead_letter_queue.to_string(),
            conn: Arc::new(Mutex::new(conn)),
            channel: Arc::new(Mutex::new(channel)),
        })
    }

    async fn reconnect(&self) -> Result<()> {
        warn!("RabbitMQ connection dropped, reconnecting...");
        let (conn, channel) = Self::connect(&self.url).await?;
        *self.conn.lock().await = conn;
        *self.channel.lock().await = channel;
        Ok(())
    }

    async fn declare_topology(&self, channel: &Channel) -> Result<()> {
        let mut dlq_args = FieldTable::default();
        dlq_args.insert("x-queue-type".into(), AMQPValue::LongString("quorum".into()));

        channel
            .queue_declare(
                &self.dead_letter_queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                dlq_args,
            )
            .await
            .map_err(|e| anyhow!("Failed to declare dead-letter queue: {}", e))?;

        let mut args = FieldTable::default();
        args.insert("x-queue-type".into(), AMQPValue::LongString("quorum".into()));
        args.insert("x-dead-letter-exchange".into(), AMQPValue::LongString("".into()));
        args.insert(
            "x-dead-letter-routing-key".into(),
            AMQPValue::LongString(self.dead_letter_queue.as_str().into()),
        );
        args.insert("x-delivery-limit".into(), AMQPValue::LongLongInt(DELIVERY_LIMIT));

        channel
            .queue_declare(
                &self.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                args,
            )
            .await
            .map_err(|e| anyhow!("Failed to declare queue: {}", e))?;

        Ok(())
    }

    async fn publish_internal(&self, payload: &[u8], attributes: &[(&str, String)]) -> Result<()> {
        let channel = self.channel.lock().await;

        // Ensure both queues exist before the first publish
        self.declare_topology(&channel).await?;

        let mut headers = FieldTable::default();
        for (key, value) in attributes {
            headers.insert((*key).into(), AMQPValue::LongString(value.as_str().into()));
        }

        let properties = BasicProperties::default()
            .with_delivery_mode(2) // Persistent
            .with_content_type("text/plain".into())
            .with_headers(headers);

        channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await
            .map_err(|e| anyhow!("Failed to publish message: {}", e))?
            .await
            .map_err(|e| anyhow!("Failed to confirm publication: {}", e))?;

        Ok(())
    }

    /// Publish a job body with its attribute headers, retrying once over a
    /// fresh connection if the channel has gone away.
    pub async fn publish(&self, payload: &[u8], attributes: &[(&str, String)]) -> Result<()> {
        if let Err(e) = self.publish_internal(payload, attributes).await {
            warn!("RabbitMQ publish failed: {}. Retrying after reconnect.", e);
            self.reconnect().await?;
            self.publish_internal(payload, attributes).await?;
        }

        Ok(())
    }
}
