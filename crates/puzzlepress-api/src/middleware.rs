use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use puzzlepress_types::models::Role;

use crate::auth::{AppState, AuthError, verify_token};
use crate::error::ApiError;

/// Gate for dashboard routes.
pub async fn require_author(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, ApiError> {
    authorize(&state, Role::Author, req, next).await
}

/// Gate for reader actions on the public blog.
pub async fn require_user(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, ApiError> {
    authorize(&state, Role::User, req, next).await
}

/// Extract and validate the bearer JWT, then hand the claims to the handler
/// through request extensions. Nothing downstream runs on failure.
async fn authorize(state: &AppState, role: Role, mut req: Request, next: Next) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".into()))?;

    let claims = verify_token(&state.jwt_secret, token).map_err(|e| match e {
        AuthError::ServerMisconfigured => ApiError::from(e),
        other => {
            warn!("Rejected token: {}", other);
            ApiError::Unauthorized("Invalid or expired token".into())
        }
    })?;

    if claims.role != role {
        warn!(username = %claims.username, "Token has role {:?}, route needs {:?}", claims.role, role);
        return Err(ApiError::Forbidden("Insufficient role".into()));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
