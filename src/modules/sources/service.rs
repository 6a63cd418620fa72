use super::model::{SourceKind, SourceRef};
use super::repository::SourceRepository;
use crate::modules::render::events::RenderJob;
use crate::modules::render::service::JobSubmitter;
use crate::state::AppState;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("There is no code to render.")]
    NoCode,
    #[error("Render queue is not available.")]
    DependencyUnavailable,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub struct SourceService;

impl SourceService {
    /// Accepts a render request for an owned entity: applies the optional
    /// code update, stamps `latest_render_at` with the accepted request time,
    /// and publishes the job carrying that same timestamp.
    pub async fn request_render(
        state: AppState,
        source: SourceRef,
        user_id: Uuid,
        code_override: Option<String>,
    ) -> Result<Uuid, SubmitError> {
        info!(
            "User {} requesting render for {} {}",
            user_id,
            source.kind.as_str(),
            source.id
        );

        let stored_code = match source.kind {
            SourceKind::Canvas => {
                SourceRepository::find_canvas_for_owner(&state.db, source.id, user_id)
                    .await?
                    .ok_or(SubmitError::NotFound("Canvas"))?
                    .code
            }
            SourceKind::Prompt => {
                SourceRepository::find_prompt_for_owner(&state.db, source.id, user_id)
                    .await?
                    .ok_or(SubmitError::NotFound("Prompt"))?
                    .code
            }
        };

        let code = code_override
            .clone()
            .or(stored_code)
            .ok_or(SubmitError::NoCode)?;

        let queue = state.queue.as_ref().ok_or(SubmitError::DependencyUnavailable)?;

        let request_time = OffsetDateTime::now_utc();
        SourceRepository::record_render_request(
            &state.db,
            source,
            code_override.as_deref(),
            request_time,
        )
        .await?;

        let job = RenderJob::new(user_id, source, request_time);
        JobSubmitter::submit(queue, &job, &code)
            .await
            .map_err(|err| {
                error!("Failed to submit render job {}: {:#}", job.job_id, err);
                SubmitError::DependencyUnavailable
            })?;

        Ok(job.job_id)
    }
}
