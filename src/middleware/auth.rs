use crate::common::response::ApiError;
use crate::common::security::{self, TokenClaims};
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Extract token from header
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|auth_header| auth_header.to_str().ok())
        .and_then(|auth_value| security::bearer_token(auth_value).map(ToOwned::to_owned));

    let token = match token {
        Some(t) => t,
        None => {
            return Err(ApiError(
                "Unauthorized: Missing or invalid token".to_string(),
                StatusCode::UNAUTHORIZED,
            ));
        }
    };

    // 2. Verify JWT
    let claims: TokenClaims = security::verify_token(&state.config.jwt_secret, &token)
        .map_err(|err| ApiError(format!("Unauthorized: {err}"), StatusCode::UNAUTHORIZED))?;

    // 3. Inject claims into request extensions
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
