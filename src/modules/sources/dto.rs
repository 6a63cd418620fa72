use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct RenderRequest {
    /// Replaces the entity's stored code before rendering when present.
    #[validate(length(min = 1, max = 100000, message = "Code must be between 1 and 100000 characters"))]
    pub code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RenderAccepted {
    pub job_id: Uuid,
}
