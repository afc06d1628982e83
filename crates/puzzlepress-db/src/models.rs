/// Database-side types. Read shapes that reach the API live in
/// puzzlepress-types; these carry secrets or write inputs only.
use chrono::{DateTime, Utc};
use puzzlepress_types::models::Account;
use uuid::Uuid;

/// A user or author row including the stored password hash.
#[derive(Debug, Clone)]
pub struct CredentialsRow {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl CredentialsRow {
    pub fn into_account(self) -> Account {
        Account {
            id: self.id,
            username: self.username,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPlayer {
    pub id: Uuid,
    pub username: String,
    pub score: i64,
    pub leaderboard_id: i64,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub id: Uuid,
    pub title: String,
    pub text: String,
    pub author_id: Uuid,
    pub published: bool,
}

/// Field-level post update. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub text: Option<String>,
    pub published: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
}
