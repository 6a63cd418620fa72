use utoipa::OpenApi;
use crate::modules::render::dto::*;
use crate::modules::sources::dto::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::sources::handler::render_canvas,
        crate::modules::sources::handler::render_prompt,
        crate::modules::render::handler::process_render_job,
        crate::modules::render::handler::process_dead_letter,
    ),
    components(
        schemas(
            RenderRequest, RenderAccepted,
            PushEnvelope, PushMessage, RenderAck,
            crate::modules::sources::model::SourceKind,
            crate::modules::render::events::ResultStatus,
            crate::modules::notify::dto::UserMessage,
        )
    ),
    tags(
        (name = "Sources", description = "Render submission for user canvases and prompts"),
        (name = "Render", description = "Queue push delivery endpoints")
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

use utoipa::Modify;
use utoipa::openapi::security::{SecurityScheme, HttpAuthScheme, HttpBuilder};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
