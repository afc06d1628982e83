use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// -- Puzzles --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Puzzle {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub characters: Vec<Character>,
    pub leaderboard: Option<LeaderboardRef>,
}

/// A character hidden in a puzzle image. `x` and `y` are percentages of the
/// image width and height.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: i64,
    pub puzzle_id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub x: f64,
    pub y: f64,
}

/// Leaderboard as nested inside a puzzle, without its players.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRef {
    pub id: i64,
    pub puzzle_id: String,
}

/// Players are ranked when read: highest score first, earlier submissions win ties.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    pub id: i64,
    pub puzzle_id: String,
    pub players: Vec<Player>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: Uuid,
    pub username: String,
    pub score: i64,
    pub leaderboard_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: i64,
    pub model: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

// -- Principals --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Author,
}

/// Public view of an author or user. Password hashes never leave the db crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// A principal reduced to what other people may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
}

// -- Posts --

/// `published == false` marks a draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub text: String,
    pub author_id: Uuid,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostWithAuthor {
    #[serde(flatten)]
    pub post: Post,
    pub author: Principal,
}

/// A post with its author and its comments in ascending creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub author: Principal,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorWithPosts {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub posts: Vec<PostDetail>,
}

// -- Comments --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub parent_id: Uuid,
    pub commenter: CommentedBy,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentedBy {
    pub role: Role,
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("a comment must reference exactly one of a user or an author")]
pub struct InvalidAssociation;

/// Who wrote a comment. Exactly one principal, never both, never neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commenter {
    User(Uuid),
    Author(Uuid),
}

impl Commenter {
    pub fn from_ids(
        user_id: Option<Uuid>,
        author_id: Option<Uuid>,
    ) -> Result<Self, InvalidAssociation> {
        match (user_id, author_id) {
            (Some(id), None) => Ok(Self::User(id)),
            (None, Some(id)) => Ok(Self::Author(id)),
            _ => Err(InvalidAssociation),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::User(_) => Role::User,
            Self::Author(_) => Role::Author,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::User(id) | Self::Author(id) => *id,
        }
    }

    /// Split into the `(user_id, author_id)` column pair.
    pub fn columns(&self) -> (Option<Uuid>, Option<Uuid>) {
        match self {
            Self::User(id) => (Some(*id), None),
            Self::Author(id) => (None, Some(*id)),
        }
    }
}

// -- Seed input (admin tooling) --

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPuzzle {
    pub id: String,
    pub name: String,
    pub image_url: String,
    #[serde(default)]
    pub characters: Vec<NewCharacter>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCharacter {
    pub name: String,
    pub image_url: Option<String>,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewItem {
    pub model: String,
    pub name: String,
    pub description: Option<String>,
}
