use super::dto::{PushEnvelope, RenderAck};
use super::events::RenderResult;
use super::service::{self, RenderError, RenderService};
use crate::common::response::ApiError;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::{error, info, warn};

/// Work-queue push delivery of a render job
#[utoipa::path(
    post,
    path = "/api/v1/render/jobs",
    request_body = PushEnvelope,
    responses(
        (status = 200, description = "Job acknowledged (processed or rejected)", body = RenderAck),
        (status = 503, description = "Transient failure, message should be redelivered")
    ),
    tag = "Render"
)]
pub async fn process_render_job(
    State(state): State<AppState>,
    Json(envelope): Json<PushEnvelope>,
) -> impl IntoResponse {
    let (job, code) = match service::decode_job(&envelope.message) {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!(
                "Rejecting unprocessable job (message id {:?}): {}",
                envelope.message.message_id, err
            );
            return (StatusCode::OK, Json(RenderAck::rejected())).into_response();
        }
    };

    info!("Processing job_id '{}' for user_id '{}'", job.job_id, job.user_id);

    match RenderService::process(&state, &job, &code).await {
        Ok(video_url) => {
            let result = RenderResult::success(&job, video_url);
            service::publish_result(&state, &result).await;
            (StatusCode::OK, Json(RenderAck::success(job.job_id.to_string()))).into_response()
        }
        Err(RenderError::Retryable(reason)) => {
            warn!("Job '{}' failed with a retryable error: {}", job.job_id, reason);
            ApiError(reason, StatusCode::SERVICE_UNAVAILABLE).into_response()
        }
        Err(err) => {
            error!("Job '{}' failed: {}", job.job_id, err);
            let result = RenderResult::failure(&job, err.to_string());
            service::publish_result(&state, &result).await;
            (StatusCode::OK, Json(RenderAck::failure(job.job_id.to_string()))).into_response()
        }
    }
}

/// Push delivery for jobs whose redeliveries are exhausted
#[utoipa::path(
    post,
    path = "/api/v1/render/dead-letter",
    request_body = PushEnvelope,
    responses(
        (status = 200, description = "Dead letter acknowledged", body = RenderAck)
    ),
    tag = "Render"
)]
pub async fn process_dead_letter(
    State(state): State<AppState>,
    Json(envelope): Json<PushEnvelope>,
) -> impl IntoResponse {
    match service::dead_letter_result(&envelope.message) {
        Some(result) => {
            info!("Publishing failure notice for job_id '{}'", result.job_id);
            let job_id = result.job_id.clone();
            service::publish_result(&state, &result).await;
            (StatusCode::OK, Json(RenderAck::failure(job_id)))
        }
        None => {
            warn!("Dead-letter message without a deliverable target; dropping");
            (StatusCode::OK, Json(RenderAck::rejected()))
        }
    }
}
