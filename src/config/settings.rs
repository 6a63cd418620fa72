use serde::Deserialize;
use crate::config::env::{self, EnvKey};

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub result_channel: String,
    pub amqp_url: Option<String>,
    pub render_queue: String,
    pub render_dlq: String,
    pub minio_url: Option<String>,
    pub minio_bucket: String,
    pub minio_access_key: Option<String>,
    pub minio_secret_key: Option<String>,
    pub public_media_host: Option<String>,
    pub jwt_secret: String,
    pub renderer_bin: String,
    pub render_timeout_secs: u64,
    pub render_work_dir: String,
    pub media_retention_days: i64,
    pub cleanup_schedule: String,
}

impl AppConfig {
    pub fn new() -> Result<Self, std::env::VarError> {
        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            database_url: env::get(EnvKey::DatabaseUrl)?,
            redis_url: env::get(EnvKey::RedisUrl)?,
            result_channel: env::get_or(EnvKey::ResultChannel, "video_links"),
            amqp_url: env::get(EnvKey::AmqpUrl).ok(),
            render_queue: env::get_or(EnvKey::RenderQueue, "render_jobs"),
            render_dlq: env::get_or(EnvKey::RenderDlq, "render_jobs_dlq"),
            minio_url: env::get(EnvKey::MinioUrl).ok(),
            minio_bucket: env::get_or(EnvKey::MinioBucket, "rendered-videos"),
            minio_access_key: env::get(EnvKey::MinioAccessKey).ok(),
            minio_secret_key: env::get(EnvKey::MinioSecretKey).ok(),
            public_media_host: env::get(EnvKey::PublicMediaHost).ok(),
            jwt_secret: env::get(EnvKey::JwtSecret)?,
            renderer_bin: env::get_or(EnvKey::RendererBin, "manim"),
            render_timeout_secs: env::get_parsed(EnvKey::RenderTimeoutSecs, 600),
            render_work_dir: env::get_or(EnvKey::RenderWorkDir, "/tmp/sceneflow"),
            media_retention_days: env::get_parsed(EnvKey::MediaRetentionDays, 4),
            cleanup_schedule: env::get_or(EnvKey::CleanupSchedule, "0 0 3 * * *"),
        })
    }
}
