use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Which entity table a render request or result points at.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Canvas,
    Prompt,
}

impl SourceKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "canvas" => Some(Self::Canvas),
            "prompt" => Some(Self::Prompt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Canvas => "canvas",
            Self::Prompt => "prompt",
        }
    }
}

/// A resolved (kind, id) pair. Built once where a result enters the system,
/// so downstream code never re-dispatches on a raw string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRef {
    pub kind: SourceKind,
    pub id: Uuid,
}

impl SourceRef {
    pub fn new(kind: SourceKind, id: Uuid) -> Self {
        Self { kind, id }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema, Clone)]
pub struct Canvas {
    pub id: Uuid,
    pub title: String,
    pub code: Option<String>,
    pub video_url: Option<String>,
    #[serde(with = "time::serde::iso8601::option")]
    pub latest_render_at: Option<OffsetDateTime>,
    pub author_id: Uuid,
    #[serde(with = "time::serde::iso8601")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema, Clone)]
pub struct Prompt {
    pub id: Uuid,
    pub prompt_text: String,
    pub code: Option<String>,
    pub video_url: Option<String>,
    #[serde(with = "time::serde::iso8601::option")]
    pub latest_render_at: Option<OffsetDateTime>,
    pub author_id: Uuid,
    #[serde(with = "time::serde::iso8601")]
    pub updated_at: OffsetDateTime,
}
