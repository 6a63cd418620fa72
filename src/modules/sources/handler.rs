use super::dto::{RenderAccepted, RenderRequest};
use super::model::{SourceKind, SourceRef};
use super::service::{SourceService, SubmitError};
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::common::security::TokenClaims;
use crate::state::AppState;
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

/// Submit a canvas's code for rendering
#[utoipa::path(
    post,
    path = "/api/v1/canvases/{id}/render",
    params(
        ("id" = Uuid, Path, description = "Canvas ID")
    ),
    request_body = RenderRequest,
    responses(
        (status = 202, description = "Render job accepted", body = ApiResponse<RenderAccepted>),
        (status = 400, description = "No code to render"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Canvas not found"),
        (status = 503, description = "Render queue unavailable")
    ),
    tag = "Sources",
    security(("bearer_auth" = []))
)]
pub async fn render_canvas(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RenderRequest>,
) -> impl IntoResponse {
    submit_render(state, SourceRef::new(SourceKind::Canvas, id), claims.sub, payload).await
}

/// Submit a prompt's generated code for rendering
#[utoipa::path(
    post,
    path = "/api/v1/prompts/{id}/render",
    params(
        ("id" = Uuid, Path, description = "Prompt ID")
    ),
    request_body = RenderRequest,
    responses(
        (status = 202, description = "Render job accepted", body = ApiResponse<RenderAccepted>),
        (status = 400, description = "No code to render"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Prompt not found"),
        (status = 503, description = "Render queue unavailable")
    ),
    tag = "Sources",
    security(("bearer_auth" = []))
)]
pub async fn render_prompt(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RenderRequest>,
) -> impl IntoResponse {
    submit_render(state, SourceRef::new(SourceKind::Prompt, id), claims.sub, payload).await
}

async fn submit_render(
    state: AppState,
    source: SourceRef,
    user_id: Uuid,
    payload: RenderRequest,
) -> axum::response::Response {
    if let Err(e) = payload.validate() {
        return ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response();
    }

    match SourceService::request_render(state, source, user_id, payload.code).await {
        Ok(job_id) => ApiSuccess(
            ApiResponse::success(RenderAccepted { job_id }, "Render job submitted successfully"),
            StatusCode::ACCEPTED,
        )
        .into_response(),
        Err(err) => {
            let status = match &err {
                SubmitError::NotFound(_) => StatusCode::NOT_FOUND,
                SubmitError::NoCode => StatusCode::BAD_REQUEST,
                SubmitError::DependencyUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                SubmitError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            ApiError(err.to_string(), status).into_response()
        }
    }
}
