use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Envelope the queue infrastructure wraps around a pushed message.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PushEnvelope {
    pub message: PushMessage,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PushMessage {
    /// Base64-encoded code payload.
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default, rename = "messageId")]
    pub message_id: Option<String>,
}

/// Acknowledgement body for a pushed job. `rejected` means the message was
/// unprocessable and must not be redelivered.
#[derive(Debug, Serialize, ToSchema)]
pub struct RenderAck {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl RenderAck {
    pub fn rejected() -> Self {
        Self {
            status: "rejected".to_string(),
            job_id: None,
        }
    }

    pub fn success(job_id: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            job_id: Some(job_id.into()),
        }
    }

    pub fn failure(job_id: impl Into<String>) -> Self {
        Self {
            status: "failure".to_string(),
            job_id: Some(job_id.into()),
        }
    }
}
