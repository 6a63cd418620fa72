use anyhow::Result;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::dto::UserMessage;
use crate::modules::render::events::{RenderResult, ResultStatus};
use crate::modules::sources::model::SourceRef;
use crate::modules::sources::repository::SourceRepository;
use crate::state::AppState;

pub const DEFAULT_ERROR_DETAIL: &str = "Unknown error occurred";

/// True when the entity has already accepted a newer render request than the
/// one this result answers. Equal timestamps are NOT superseded: the accept
/// path stamps the entity with the same instant the job carries.
pub fn is_superseded(stored: Option<OffsetDateTime>, incoming: OffsetDateTime) -> bool {
    stored.is_some_and(|latest| latest > incoming)
}

pub struct ResultProcessor;

impl ResultProcessor {
    /// Applies the staleness rule, persists the video link of a surviving
    /// success, and builds the frame to deliver. `None` means the result was
    /// dropped (entity gone, or superseded by a newer request).
    pub async fn process(state: &AppState, result: &RenderResult) -> Result<Option<UserMessage>> {
        let source = result.source();

        let Some(latest_render_at) =
            SourceRepository::fetch_render_state(&state.db, source).await?
        else {
            warn!(
                "Dropping result for missing {} {}",
                source.kind.as_str(),
                source.id
            );
            return Ok(None);
        };

        if is_superseded(latest_render_at, result.request_timestamp) {
            info!(
                "Dropping superseded result for {} {} (job '{}')",
                source.kind.as_str(),
                source.id,
                result.job_id
            );
            return Ok(None);
        }

        if result.status == ResultStatus::Success {
            if let Some(video_url) = &result.video_url {
                SourceRepository::set_video_url(&state.db, source, video_url).await?;
                return Ok(Some(success_message(source, video_url.clone())));
            }
        }

        // Failures, and successes that arrived without a link
        Ok(Some(failure_message(source, result.error.clone())))
    }
}

pub fn success_message(source: SourceRef, video_url: String) -> UserMessage {
    UserMessage {
        message: format!(
            "Your {} has been successfully rendered.",
            source.kind.as_str()
        ),
        video_url: Some(video_url),
        source_id: source.id,
        source_type: source.kind,
        status: ResultStatus::Success,
        detail: None,
    }
}

pub fn failure_message(source: SourceRef, detail: Option<String>) -> UserMessage {
    UserMessage {
        message: format!(
            "An error occurred while processing your request for {} with ID {}.",
            source.kind.as_str(),
            source.id
        ),
        video_url: None,
        source_id: source.id,
        source_type: source.kind,
        status: ResultStatus::Failure,
        detail: Some(detail.unwrap_or_else(|| DEFAULT_ERROR_DETAIL.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::sources::model::SourceKind;
    use time::macros::datetime;
    use uuid::Uuid;

    #[test]
    fn never_rendered_entity_is_not_superseded() {
        let incoming = datetime!(2025-08-20 10:00:00 UTC);
        assert!(!is_superseded(None, incoming));
    }

    #[test]
    fn older_stored_request_is_not_superseded() {
        let stored = datetime!(2025-08-20 10:00:00 UTC);
        let incoming = datetime!(2025-08-20 10:05:00 UTC);
        assert!(!is_superseded(Some(stored), incoming));
    }

    #[test]
    fn equal_timestamps_apply() {
        let at = datetime!(2025-08-20 10:00:00 UTC);
        assert!(!is_superseded(Some(at), at));
    }

    #[test]
    fn newer_stored_request_supersedes() {
        let stored = datetime!(2025-08-20 10:05:00 UTC);
        let incoming = datetime!(2025-08-20 10:00:00 UTC);
        assert!(is_superseded(Some(stored), incoming));
    }

    #[test]
    fn success_frame_shape() {
        let source = SourceRef::new(SourceKind::Canvas, Uuid::new_v4());
        let frame = success_message(source, "http://media.example.com/a_Demo.mp4".to_string());

        assert_eq!(frame.message, "Your canvas has been successfully rendered.");
        assert_eq!(
            frame.video_url.as_deref(),
            Some("http://media.example.com/a_Demo.mp4")
        );
        assert_eq!(frame.source_id, source.id);
        assert_eq!(frame.source_type, SourceKind::Canvas);
        assert_eq!(frame.status, ResultStatus::Success);
        assert_eq!(frame.detail, None);
    }

    #[test]
    fn failure_frame_carries_detail() {
        let source = SourceRef::new(SourceKind::Prompt, Uuid::new_v4());
        let frame = failure_message(source, Some("renderer exploded".to_string()));

        assert_eq!(
            frame.message,
            format!(
                "An error occurred while processing your request for prompt with ID {}.",
                source.id
            )
        );
        assert_eq!(frame.video_url, None);
        assert_eq!(frame.status, ResultStatus::Failure);
        assert_eq!(frame.detail.as_deref(), Some("renderer exploded"));
    }

    #[test]
    fn failure_frame_defaults_missing_detail() {
        let source = SourceRef::new(SourceKind::Canvas, Uuid::new_v4());
        let frame = failure_message(source, None);
        assert_eq!(frame.detail.as_deref(), Some(DEFAULT_ERROR_DETAIL));
    }

    #[test]
    fn frame_serializes_without_null_fields() {
        let source = SourceRef::new(SourceKind::Canvas, Uuid::new_v4());
        let frame = success_message(source, "http://m/v.mp4".to_string());
        let json = serde_json::to_value(&frame).unwrap();

        assert_eq!(json["status"], "success");
        assert_eq!(json["source_type"], "canvas");
        assert!(json.get("detail").is_none());
    }
}
