use puzzlepress_types::models::InvalidAssociation;
use rusqlite::ErrorCode;
use rusqlite::ffi;
use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

/// Store failures normalized into what callers need to tell apart.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A uniqueness constraint was violated. Carries the offending column(s).
    #[error("duplicate value for {0}")]
    Conflict(String),

    #[error(transparent)]
    InvalidAssociation(#[from] InvalidAssociation),

    /// A foreign key points at a row that does not exist.
    #[error("referenced row does not exist")]
    InvalidReference,

    #[error("database call cancelled")]
    Cancelled,

    #[error("database lock poisoned")]
    Poisoned,

    #[error("database task failed: {0}")]
    Task(String),

    #[error("database error: {0}")]
    Store(rusqlite::Error),
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        let rusqlite::Error::SqliteFailure(code, message) = &err else {
            return Self::Store(err);
        };

        match code.code {
            ErrorCode::OperationInterrupted => Self::Cancelled,
            ErrorCode::ConstraintViolation => match code.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    Self::Conflict(conflicting_columns(message.as_deref()))
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Self::InvalidReference,
                // The only CHECK in the schema is the comment principal one.
                ffi::SQLITE_CONSTRAINT_CHECK => Self::InvalidAssociation(InvalidAssociation),
                _ => Self::Store(err),
            },
            _ => Self::Store(err),
        }
    }
}

impl DbError {
    pub fn is_conflict_on(&self, column: &str) -> bool {
        matches!(self, Self::Conflict(cols) if cols.split(',').any(|c| c == column))
    }
}

/// "UNIQUE constraint failed: items.model, items.name" -> "model,name"
fn conflicting_columns(message: Option<&str>) -> String {
    let Some(list) = message.and_then(|m| m.split_once(": ").map(|(_, cols)| cols)) else {
        return "unknown".to_string();
    };

    list.split(", ")
        .map(|col| col.rsplit('.').next().unwrap_or(col).trim())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_and_composite_conflicts() {
        assert_eq!(conflicting_columns(Some("UNIQUE constraint failed: posts.title")), "title");
        assert_eq!(
            conflicting_columns(Some("UNIQUE constraint failed: items.model, items.name")),
            "model,name"
        );
        assert_eq!(conflicting_columns(None), "unknown");
    }

    #[test]
    fn conflict_matches_any_listed_column() {
        let err = DbError::Conflict("model,name".into());
        assert!(err.is_conflict_on("name"));
        assert!(!err.is_conflict_on("title"));
        assert!(!DbError::InvalidReference.is_conflict_on("title"));
    }
}
