use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use puzzlepress_db::DbError;
use puzzlepress_types::api::MessageResponse;
use thiserror::Error;
use tracing::{error, warn};

pub type ApiResult<T> = Result<T, ApiError>;

/// Every handler failure ends up here and leaves as `status + {"message"}`.
/// Internal details are logged, never sent.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// The request could not be extracted (bad JSON, path or query).
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("request cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{} not found", capitalize(what)))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Rejected { status, .. } => *status,
            Self::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(detail) => {
                error!(error = %detail, "Internal server error");
                "Server error".to_string()
            }
            Self::Cancelled => {
                warn!("Request cancelled before the database call finished");
                self.to_string()
            }
            other => other.to_string(),
        };

        (status, Json(MessageResponse { message })).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => Self::not_found(what),
            DbError::Conflict(_) => Self::Conflict(conflict_message(&err)),
            DbError::InvalidAssociation(e) => Self::BadRequest(e.to_string()),
            DbError::InvalidReference => Self::BadRequest("Referenced resource does not exist".into()),
            DbError::Cancelled => Self::Cancelled,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

fn conflict_message(err: &DbError) -> String {
    if err.is_conflict_on("title") {
        "A post with this title already exists.".to_string()
    } else if err.is_conflict_on("username") {
        "Username is already taken.".to_string()
    } else {
        capitalize(&err.to_string())
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use puzzlepress_types::models::InvalidAssociation;

    #[test]
    fn store_errors_map_to_http_statuses() {
        let cases = [
            (DbError::NotFound("post"), StatusCode::NOT_FOUND),
            (DbError::Conflict("title".into()), StatusCode::CONFLICT),
            (DbError::InvalidAssociation(InvalidAssociation), StatusCode::BAD_REQUEST),
            (DbError::InvalidReference, StatusCode::BAD_REQUEST),
            (DbError::Cancelled, StatusCode::SERVICE_UNAVAILABLE),
            (DbError::Poisoned, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (db_err, status) in cases {
            assert_eq!(ApiError::from(db_err).status(), status);
        }
    }

    #[test]
    fn title_conflict_has_the_client_facing_message() {
        let err = ApiError::from(DbError::Conflict("title".into()));
        assert_eq!(err.to_string(), "A post with this title already exists.");
        assert_eq!(ApiError::from(DbError::NotFound("post")).to_string(), "Post not found");
    }
}
