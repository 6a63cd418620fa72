use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    DatabaseUrl,
    RedisUrl,
    ResultChannel,
    AmqpUrl,
    RenderQueue,
    RenderDlq,
    MinioUrl,
    MinioBucket,
    MinioAccessKey,
    MinioSecretKey,
    PublicMediaHost,
    JwtSecret,
    RendererBin,
    RenderTimeoutSecs,
    RenderWorkDir,
    MediaRetentionDays,
    CleanupSchedule,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::RedisUrl => "REDIS_URL",
            EnvKey::ResultChannel => "RESULT_CHANNEL",
            EnvKey::AmqpUrl => "AMQP_URL",
            EnvKey::RenderQueue => "RENDER_QUEUE",
            EnvKey::RenderDlq => "RENDER_DLQ",
            EnvKey::MinioUrl => "MINIO_ENDPOINT",
            EnvKey::MinioBucket => "MINIO_BUCKET_VIDEOS",
            EnvKey::MinioAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::MinioSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::PublicMediaHost => "PUBLIC_MEDIA_HOST",
            EnvKey::JwtSecret => "JWT_SECRET",
            EnvKey::RendererBin => "RENDERER_BIN",
            EnvKey::RenderTimeoutSecs => "RENDER_TIMEOUT_SECS",
            EnvKey::RenderWorkDir => "RENDER_WORK_DIR",
            EnvKey::MediaRetentionDays => "MEDIA_RETENTION_DAYS",
            EnvKey::CleanupSchedule => "CLEANUP_SCHEDULE",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
