use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::modules::sources::model::{SourceKind, SourceRef};

/// One render request as it travels the work queue. The code is the message
/// body; everything here rides in the attribute headers.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RenderJob {
    pub job_id: Uuid,
    pub user_id: Uuid,
    pub source_id: Uuid,
    pub source_type: SourceKind,
    #[serde(with = "time::serde::rfc3339")]
    pub request_timestamp: OffsetDateTime,
}

impl RenderJob {
    pub fn new(user_id: Uuid, source: SourceRef, request_timestamp: OffsetDateTime) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            user_id,
            source_id: source.id,
            source_type: source.kind,
            request_timestamp,
        }
    }

    pub fn attributes(&self) -> Result<Vec<(&'static str, String)>, time::error::Format> {
        Ok(vec![
            ("user_id", self.user_id.to_string()),
            ("job_id", self.job_id.to_string()),
            ("source_id", self.source_id.to_string()),
            ("source_type", self.source_type.as_str().to_string()),
            ("request_timestamp", self.request_timestamp.format(&Rfc3339)?),
        ])
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Failure,
}

/// Terminal outcome of a job, JSON-encoded onto the result bus.
///
/// `job_id` is a plain string: dead-lettered messages may arrive without a
/// parseable id and are still reported (as "Unknown Job").
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RenderResult {
    pub job_id: String,
    pub user_id: Uuid,
    pub source_id: Uuid,
    pub source_type: SourceKind,
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub request_timestamp: OffsetDateTime,
}

impl RenderResult {
    pub fn success(job: &RenderJob, video_url: String) -> Self {
        Self {
            job_id: job.job_id.to_string(),
            user_id: job.user_id,
            source_id: job.source_id,
            source_type: job.source_type,
            status: ResultStatus::Success,
            video_url: Some(video_url),
            error: None,
            request_timestamp: job.request_timestamp,
        }
    }

    pub fn failure(job: &RenderJob, error: String) -> Self {
        Self {
            job_id: job.job_id.to_string(),
            user_id: job.user_id,
            source_id: job.source_id,
            source_type: job.source_type,
            status: ResultStatus::Failure,
            video_url: None,
            error: Some(error),
            request_timestamp: job.request_timestamp,
        }
    }

    pub fn source(&self) -> SourceRef {
        SourceRef::new(self.source_type, self.source_id)
    }
}
