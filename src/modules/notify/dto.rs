use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::modules::render::events::ResultStatus;
use crate::modules::sources::model::SourceKind;

/// Frame pushed to a user's websocket clients when one of their renders
/// reaches a terminal state.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct UserMessage {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    pub source_id: Uuid,
    pub source_type: SourceKind,
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// First text frame sent by clients that cannot put the token in the query
/// string.
#[derive(Debug, Deserialize)]
pub struct TokenFrame {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}
