use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{extract::State, http::StatusCode};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use puzzlepress_db::Database;
use puzzlepress_types::api::{Claims, LoginRequest, LoginResponse, SignupRequest, SignupResponse};
use puzzlepress_types::models::Role;

use crate::error::{ApiError, ApiResult};
use crate::extract::Json;

/// Session tokens expire after eight hours.
const TOKEN_TTL_HOURS: i64 = 8;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub author_signup_enabled: bool,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username does not exist")]
    NotFound,

    #[error("Wrong password")]
    BadCredentials,

    /// The signing secret is unset. Never fall back to a default secret.
    #[error("token signing secret is not configured")]
    ServerMisconfigured,

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotFound | AuthError::BadCredentials => ApiError::Unauthorized(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

// -- Signup --

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<SignupResponse>)> {
    register(&state, Role::User, req).await
}

/// Authors are normally provisioned by seeding; self-service is opt-in.
pub async fn signup_author(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<SignupResponse>)> {
    if !state.author_signup_enabled {
        return Err(ApiError::Forbidden("Author signup is disabled".into()));
    }
    register(&state, Role::Author, req).await
}

async fn register(
    state: &AppState,
    role: Role,
    req: SignupRequest,
) -> ApiResult<(StatusCode, Json<SignupResponse>)> {
    let name_len = req.username.chars().count();
    if !(3..=32).contains(&name_len) {
        return Err(ApiError::bad_request("Username must be 3 to 32 characters"));
    }
    if req.password.chars().count() < 8 {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }

    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {}", e)))??;

    let username = req.username;
    let account = state
        .db
        .run(move |db| match role {
            Role::Author => db.post_new_author(&username, &password_hash),
            Role::User => db.post_new_user(&username, &password_hash),
        })
        .await?;

    info!(username = %account.username, ?role, "Registered new principal");

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "Signup successful".into(),
            id: account.id,
            username: account.username,
        }),
    ))
}

// -- Login --

/// Dashboard login: authenticates an author.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    authenticate(&state, Role::Author, req).await.map(Json)
}

pub async fn login_user(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    authenticate(&state, Role::User, req).await.map(Json)
}

async fn authenticate(state: &AppState, role: Role, req: LoginRequest) -> ApiResult<LoginResponse> {
    let username = req.username.clone();
    let principal = state
        .db
        .run(move |db| db.get_credentials(role, &username))
        .await?
        .ok_or_else(|| {
            warn!(username = %req.username, ?role, "Login for unknown username");
            AuthError::NotFound
        })?;

    let password = req.password;
    let digest = principal.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &digest))
        .await
        .map_err(|e| ApiError::Internal(format!("verify task failed: {}", e)))??;

    if !verified {
        warn!(username = %principal.username, ?role, "Login with wrong password");
        return Err(AuthError::BadCredentials.into());
    }

    let token = create_token(&state.jwt_secret, role, principal.id, &principal.username)
        .inspect_err(|e| error!("Refusing to issue token: {}", e))?;

    Ok(LoginResponse {
        message: "Login successful".into(),
        token,
    })
}

// -- Primitives --

/// Argon2id digest in PHC string form.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Constant-time check of `password` against a stored digest.
pub fn verify_password(password: &str, digest: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(digest).map_err(|e| AuthError::Hashing(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn create_token(secret: &str, role: Role, id: Uuid, username: &str) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::ServerMisconfigured);
    }

    let claims = Claims {
        sub: id,
        username: username.to_string(),
        role,
        exp: (chrono::Utc::now() + chrono::Duration::hours(TOKEN_TTL_HOURS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::ServerMisconfigured);
    }

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_digest_verifies_only_the_original() {
        let digest = hash_password("correct horse").unwrap();
        assert!(digest.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &digest).unwrap());
        assert!(!verify_password("battery staple", &digest).unwrap());
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }

    #[test]
    fn token_round_trips_claims() {
        let id = Uuid::new_v4();
        let token = create_token("s3cret", Role::Author, id, "ana").unwrap();

        let claims = verify_token("s3cret", &token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.username, "ana");
        assert_eq!(claims.role, Role::Author);

        let ttl = claims.exp as i64 - chrono::Utc::now().timestamp();
        assert!((TOKEN_TTL_HOURS * 3600 - 60..=TOKEN_TTL_HOURS * 3600).contains(&ttl));
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let token = create_token("one", Role::User, Uuid::new_v4(), "bo").unwrap();
        assert!(matches!(verify_token("two", &token), Err(AuthError::Token(_))));
    }

    #[test]
    fn empty_secret_never_signs_or_verifies() {
        assert!(matches!(
            create_token("", Role::Author, Uuid::new_v4(), "ana"),
            Err(AuthError::ServerMisconfigured)
        ));
        assert!(matches!(verify_token("", "a.b.c"), Err(AuthError::ServerMisconfigured)));
    }
}
