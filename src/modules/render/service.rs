use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use regex::Regex;
use tempfile::TempDir;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::process::Command;
use tracing::{error, info};
use url::Url;
use uuid::Uuid;

use super::dto::PushMessage;
use super::events::{RenderJob, RenderResult, ResultStatus};
use crate::config::settings::AppConfig;
use crate::infrastructure::queue::rabbitmq::JobQueue;
use crate::infrastructure::storage::s3::StorageService;
use crate::modules::sources::model::SourceKind;
use crate::state::AppState;

/// Matches the first class declaration inheriting from the `Scene` base type.
static SCENE_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"class\s+(\w+)\s*\((?:.*\b)?Scene\b(?:.*)?\):").expect("valid regex")
});

/// Shareable links outlive the four-day media retention window.
const SHARE_LINK_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

pub const RETRY_EXHAUSTED_ERROR: &str = "Job failed after all retry attempts. \
     The rendering service was unable to complete the request.";

#[derive(Debug, Error)]
pub enum RenderError {
    /// Malformed job payload. Acknowledged without publishing a result: the
    /// attributes carry no trustworthy delivery target.
    #[error("Invalid message payload: {0}")]
    Validation(String),
    /// The job can never succeed; a failure result is published and the
    /// message is acknowledged.
    #[error("{0}")]
    Permanent(String),
    /// Transient dependency outage; the delivery is nacked for redelivery.
    #[error("{0}")]
    Retryable(String),
}

fn attr<'a>(message: &'a PushMessage, key: &str) -> Result<&'a str, RenderError> {
    message
        .attributes
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| RenderError::Validation(format!("missing '{key}' attribute")))
}

fn uuid_attr(message: &PushMessage, key: &str) -> Result<Uuid, RenderError> {
    Uuid::parse_str(attr(message, key)?)
        .map_err(|_| RenderError::Validation(format!("'{key}' is not a valid UUID")))
}

/// Decodes a pushed queue message into the job it carries plus the code to
/// render (base64 body, UTF-8, trimmed).
pub fn decode_job(message: &PushMessage) -> Result<(RenderJob, String), RenderError> {
    let data = message
        .data
        .as_deref()
        .ok_or_else(|| RenderError::Validation("message data is missing".to_string()))?;

    let decoded = BASE64
        .decode(data)
        .map_err(|e| RenderError::Validation(format!("message data is not valid base64: {e}")))?;

    let code = String::from_utf8(decoded)
        .map_err(|e| RenderError::Validation(format!("code is not valid UTF-8: {e}")))?
        .trim()
        .to_string();

    // Older producers published the id under 'task_id'.
    let job_id = message
        .attributes
        .get("job_id")
        .or_else(|| message.attributes.get("task_id"))
        .ok_or_else(|| RenderError::Validation("missing 'job_id' attribute".to_string()))?;
    let job_id = Uuid::parse_str(job_id)
        .map_err(|_| RenderError::Validation("'job_id' is not a valid UUID".to_string()))?;

    let user_id = uuid_attr(message, "user_id")?;
    let source_id = uuid_attr(message, "source_id")?;

    let source_type = attr(message, "source_type")?;
    let source_type = SourceKind::parse(source_type)
        .ok_or_else(|| RenderError::Validation(format!("unknown source_type '{source_type}'")))?;

    let request_timestamp = attr(message, "request_timestamp")?;
    let request_timestamp = OffsetDateTime::parse(request_timestamp, &Rfc3339)
        .map_err(|_| RenderError::Validation("'request_timestamp' is not a valid timestamp".to_string()))?;

    if code.is_empty() {
        return Err(RenderError::Validation(
            "'job_id', 'user_id', and code data must be provided.".to_string(),
        ));
    }

    let job = RenderJob {
        job_id,
        user_id,
        source_id,
        source_type,
        request_timestamp,
    };

    Ok((job, code))
}

/// Takes the first matching class; a script with several scenes renders the
/// one declared first.
pub fn extract_first_scene_name(code: &str) -> Result<String, RenderError> {
    let captures = SCENE_CLASS.captures(code).ok_or_else(|| {
        RenderError::Permanent(
            "Could not find any class inheriting from 'Scene' in the provided code.".to_string(),
        )
    })?;

    let scene_name = captures[1].to_string();
    info!("Extracted scene name: {}", scene_name);
    Ok(scene_name)
}

/// Writes the code into a per-job work directory, runs the renderer against
/// it, and returns the directory guard together with the produced video path.
/// Dropping the guard removes the directory on every exit path.
pub async fn render_video(
    config: &AppConfig,
    code: &str,
    scene_name: &str,
) -> Result<(TempDir, PathBuf), RenderError> {
    tokio::fs::create_dir_all(&config.render_work_dir)
        .await
        .map_err(|e| RenderError::Permanent(format!("Failed to create work area: {e}")))?;

    let work_dir = tempfile::Builder::new()
        .prefix("render-")
        .tempdir_in(&config.render_work_dir)
        .map_err(|e| RenderError::Permanent(format!("Failed to create work directory: {e}")))?;

    let script_stem = Uuid::new_v4().to_string();
    let script_path = work_dir.path().join(format!("{script_stem}.py"));
    tokio::fs::write(&script_path, code)
        .await
        .map_err(|e| RenderError::Permanent(format!("Failed to write script: {e}")))?;

    let media_dir = work_dir.path().join("media");

    info!("Starting render for scene '{}'", scene_name);
    let mut command = Command::new(&config.renderer_bin);
    command
        .arg(&script_path)
        .arg(scene_name)
        .arg("--media_dir")
        .arg(&media_dir)
        .arg("-ql")
        .kill_on_drop(true);

    let rendered = tokio::time::timeout(
        Duration::from_secs(config.render_timeout_secs),
        command.output(),
    )
    .await
    .map_err(|_| {
        RenderError::Permanent(format!(
            "Rendering for scene '{}' timed out after {}s.",
            scene_name, config.render_timeout_secs
        ))
    })?;

    let output = rendered.map_err(|e| {
        RenderError::Permanent(format!(
            "Failed to run renderer '{}': {e}",
            config.renderer_bin
        ))
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("Rendering for '{}' failed. STDERR:\n{}", scene_name, stderr);
        return Err(RenderError::Permanent(format!(
            "Rendering for scene '{}' failed: {}",
            scene_name,
            stderr.trim()
        )));
    }

    let video_path = media_dir
        .join("videos")
        .join(&script_stem)
        .join("480p15")
        .join(format!("{scene_name}.mp4"));

    if !tokio::fs::try_exists(&video_path).await.unwrap_or(false) {
        return Err(RenderError::Permanent(format!(
            "Rendered video for '{scene_name}' not found at expected path."
        )));
    }

    Ok((work_dir, video_path))
}

/// Uploads the artifact under `<job_id>_<scene>.mp4` (overwriting any earlier
/// render of the same job) and returns a direct-download link for it.
pub async fn upload_and_get_link(
    storage: Option<&StorageService>,
    config: &AppConfig,
    video_path: &Path,
    job_id: Uuid,
    scene_name: &str,
) -> Result<String, RenderError> {
    let storage = storage
        .ok_or_else(|| RenderError::Permanent("Storage client is not initialized.".to_string()))?;

    let file_name = format!("{job_id}_{scene_name}.mp4");
    info!("Uploading {} to bucket '{}'", file_name, storage.bucket);

    let body = tokio::fs::read(video_path)
        .await
        .map_err(|e| RenderError::Permanent(format!("Failed to read rendered video: {e}")))?;

    storage
        .put_object(&file_name, body, "video/mp4")
        .await
        .map_err(|e| RenderError::Retryable(format!("Failed to upload '{file_name}': {e}")))?;

    let link = storage
        .presigned_url(&file_name, SHARE_LINK_TTL)
        .await
        .map_err(|e| {
            RenderError::Retryable(format!("Failed to create link for '{file_name}': {e}"))
        })?;

    direct_download_url(&link, config.public_media_host.as_deref())
        .map_err(|e| RenderError::Permanent(format!("Failed to normalize link: {e}")))
}

/// Rewrites a storage-endpoint link into its public direct-download form:
/// substitute the public media host and drop the query string.
pub fn direct_download_url(
    link: &str,
    public_host: Option<&str>,
) -> Result<String, url::ParseError> {
    let mut url = Url::parse(link)?;
    if let Some(host) = public_host {
        url.set_host(Some(host))?;
    }
    url.set_query(None);
    Ok(url.to_string())
}

/// Rebuilds a result for a job the queue gave up on. `None` when the
/// attributes no longer identify a deliverable target.
pub fn dead_letter_result(message: &PushMessage) -> Option<RenderResult> {
    let job_id = message
        .attributes
        .get("job_id")
        .or_else(|| message.attributes.get("task_id"))
        .cloned()
        .unwrap_or_else(|| "Unknown Job".to_string());

    let user_id = message
        .attributes
        .get("user_id")
        .and_then(|v| Uuid::parse_str(v).ok())?;
    let source_id = message
        .attributes
        .get("source_id")
        .and_then(|v| Uuid::parse_str(v).ok())?;
    let source_type = message
        .attributes
        .get("source_type")
        .and_then(|v| SourceKind::parse(v))?;
    let request_timestamp = message
        .attributes
        .get("request_timestamp")
        .and_then(|v| OffsetDateTime::parse(v, &Rfc3339).ok())?;

    Some(RenderResult {
        job_id,
        user_id,
        source_id,
        source_type,
        status: ResultStatus::Failure,
        video_url: None,
        error: Some(RETRY_EXHAUSTED_ERROR.to_string()),
        request_timestamp,
    })
}

/// Best-effort publish of a result onto the bus. A lost result is logged and
/// accepted; the job is still acknowledged.
pub async fn publish_result(state: &AppState, result: &RenderResult) {
    let payload = match serde_json::to_string(result) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Failed to serialize result for job '{}': {}", result.job_id, e);
            return;
        }
    };

    info!(
        "Publishing result for job '{}' to channel '{}'",
        result.job_id, state.config.result_channel
    );
    if let Err(e) = state
        .redis
        .publish(&state.config.result_channel, &payload)
        .await
    {
        error!("Failed to publish result for job '{}': {}", result.job_id, e);
    }
}

pub struct JobSubmitter;

impl JobSubmitter {
    /// Publishes the job's code as the message body and everything else as
    /// attribute headers. Returns the id the queue message carries.
    pub async fn submit(queue: &JobQueue, job: &RenderJob, code: &str) -> Result<Uuid> {
        info!("Submitting render job {} for user {}", job.job_id, job.user_id);

        let attributes = job.attributes()?;
        queue.publish(code.as_bytes(), &attributes).await?;

        info!("Successfully published render job {}", job.job_id);
        Ok(job.job_id)
    }
}

pub struct RenderService;

impl RenderService {
    /// Runs a decoded job through scene extraction, rendering, and upload.
    /// The work directory is removed when this returns, success or not.
    pub async fn process(state: &AppState, job: &RenderJob, code: &str) -> Result<String, RenderError> {
        let scene_name = extract_first_scene_name(code)?;

        let (_work_dir, video_path) = render_video(&state.config, code, &scene_name).await?;

        upload_and_get_link(
            state.storage.as_ref(),
            &state.config,
            &video_path,
            job.job_id,
            &scene_name,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn push_message(data: Option<&str>, attributes: &[(&str, &str)]) -> PushMessage {
        PushMessage {
            data: data.map(str::to_string),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            message_id: None,
        }
    }

    fn valid_attributes(job_key: &'static str) -> Vec<(&'static str, String)> {
        vec![
            (job_key, Uuid::new_v4().to_string()),
            ("user_id", Uuid::new_v4().to_string()),
            ("source_id", Uuid::new_v4().to_string()),
            ("source_type", "canvas".to_string()),
            ("request_timestamp", "2025-08-20T10:00:00Z".to_string()),
        ]
    }

    #[test]
    fn extracts_first_scene_class() {
        let code = r#"
from manim import *

class Intro(Scene):
    def construct(self):
        pass

class Outro(Scene):
    def construct(self):
        pass
"#;
        assert_eq!(extract_first_scene_name(code).unwrap(), "Intro");
    }

    #[test]
    fn extracts_scene_with_qualified_base() {
        let code = "class Plot(manim.Scene):\n    pass\n";
        assert_eq!(extract_first_scene_name(code).unwrap(), "Plot");
    }

    #[test]
    fn rejects_code_without_scene_class() {
        let code = "class Helper:\n    pass\n";
        let err = extract_first_scene_name(code).unwrap_err();
        assert!(matches!(err, RenderError::Permanent(_)));
        assert!(err.to_string().contains("inheriting from 'Scene'"));
    }

    #[test]
    fn decodes_valid_push_message() {
        let code = "class Demo(Scene):\n    pass";
        let data = BASE64.encode(code);
        let attributes = valid_attributes("job_id");
        let pairs: Vec<(&str, &str)> = attributes
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .collect();

        let message = push_message(Some(&data), &pairs);
        let (job, decoded) = decode_job(&message).unwrap();

        assert_eq!(decoded, code);
        assert_eq!(job.source_type, SourceKind::Canvas);
        assert_eq!(job.request_timestamp.unix_timestamp(), 1_755_684_000);
    }

    #[test]
    fn accepts_task_id_as_job_id() {
        let data = BASE64.encode("class Demo(Scene):\n    pass");
        let attributes = valid_attributes("task_id");
        let pairs: Vec<(&str, &str)> = attributes
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .collect();

        let message = push_message(Some(&data), &pairs);
        assert!(decode_job(&message).is_ok());
    }

    #[test]
    fn rejects_message_without_data() {
        let attributes = valid_attributes("job_id");
        let pairs: Vec<(&str, &str)> = attributes
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .collect();

        let err = decode_job(&push_message(None, &pairs)).unwrap_err();
        assert!(matches!(err, RenderError::Validation(_)));
    }

    #[test]
    fn rejects_invalid_base64() {
        let attributes = valid_attributes("job_id");
        let pairs: Vec<(&str, &str)> = attributes
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .collect();

        let err = decode_job(&push_message(Some("%%%"), &pairs)).unwrap_err();
        assert!(matches!(err, RenderError::Validation(_)));
    }

    #[test]
    fn rejects_missing_user_id() {
        let data = BASE64.encode("class Demo(Scene):\n    pass");
        let job_id = Uuid::new_v4().to_string();
        let message = push_message(
            Some(&data),
            &[
                ("job_id", job_id.as_str()),
                ("source_id", job_id.as_str()),
                ("source_type", "canvas"),
                ("request_timestamp", "2025-08-20T10:00:00Z"),
            ],
        );

        let err = decode_job(&message).unwrap_err();
        assert!(err.to_string().contains("user_id"));
    }

    #[test]
    fn rejects_blank_code_payload() {
        let data = BASE64.encode("   \n\n  ");
        let attributes = valid_attributes("job_id");
        let pairs: Vec<(&str, &str)> = attributes
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .collect();

        let err = decode_job(&push_message(Some(&data), &pairs)).unwrap_err();
        assert!(err
            .to_string()
            .contains("'job_id', 'user_id', and code data must be provided."));
    }

    #[test]
    fn rejects_unknown_source_type() {
        let data = BASE64.encode("class Demo(Scene):\n    pass");
        let id = Uuid::new_v4().to_string();
        let message = push_message(
            Some(&data),
            &[
                ("job_id", id.as_str()),
                ("user_id", id.as_str()),
                ("source_id", id.as_str()),
                ("source_type", "movie"),
                ("request_timestamp", "2025-08-20T10:00:00Z"),
            ],
        );

        let err = decode_job(&message).unwrap_err();
        assert!(err.to_string().contains("source_type"));
    }

    #[test]
    fn normalizes_link_host_and_query() {
        let link = "http://minio:9000/rendered-videos/abc_Demo.mp4?X-Amz-Signature=deadbeef";
        let url = direct_download_url(link, Some("media.example.com")).unwrap();
        assert_eq!(url, "http://media.example.com:9000/rendered-videos/abc_Demo.mp4");
    }

    #[test]
    fn normalizes_link_without_public_host() {
        let link = "http://minio:9000/rendered-videos/abc_Demo.mp4?X-Amz-Expires=604800";
        let url = direct_download_url(link, None).unwrap();
        assert_eq!(url, "http://minio:9000/rendered-videos/abc_Demo.mp4");
    }

    #[test]
    fn dead_letter_synthesizes_generic_failure() {
        let user_id = Uuid::new_v4();
        let source_id = Uuid::new_v4();
        let user = user_id.to_string();
        let source = source_id.to_string();
        let message = push_message(
            None,
            &[
                ("task_id", "render-42"),
                ("user_id", user.as_str()),
                ("source_id", source.as_str()),
                ("source_type", "prompt"),
                ("request_timestamp", "2025-08-20T10:00:00Z"),
            ],
        );

        let result = dead_letter_result(&message).unwrap();
        assert_eq!(result.job_id, "render-42");
        assert_eq!(result.user_id, user_id);
        assert_eq!(result.source_id, source_id);
        assert_eq!(result.status, ResultStatus::Failure);
        assert_eq!(result.video_url, None);
        assert_eq!(result.error.as_deref(), Some(RETRY_EXHAUSTED_ERROR));
    }

    #[test]
    fn dead_letter_defaults_unknown_job_id() {
        let user = Uuid::new_v4().to_string();
        let message = push_message(
            None,
            &[
                ("user_id", user.as_str()),
                ("source_id", user.as_str()),
                ("source_type", "canvas"),
                ("request_timestamp", "2025-08-20T10:00:00Z"),
            ],
        );

        let result = dead_letter_result(&message).unwrap();
        assert_eq!(result.job_id, "Unknown Job");
    }

    #[test]
    fn dead_letter_without_target_is_dropped() {
        let message = push_message(
            None,
            &[("job_id", "render-42"), ("source_type", "canvas")],
        );
        assert!(dead_letter_result(&message).is_none());

        let empty = PushMessage {
            data: None,
            attributes: HashMap::new(),
            message_id: None,
        };
        assert!(dead_letter_result(&empty).is_none());
    }
}
