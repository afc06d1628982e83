use std::collections::HashMap;

use puzzlepress_types::models::{Comment, CommentedBy, Commenter};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, ToSql};
use uuid::Uuid;

use super::{OptionalExt, now, opt_uuid_at, time_at, uuid_at};
use crate::{Database, DbError, DbResult};

/// Comment columns with the commenter's username from whichever table it lives in.
const COMMENT_SELECT: &str = "SELECT c.id, c.text, c.parent_id, c.user_id, c.author_id,
            COALESCE(u.username, a.username), c.created_at
     FROM comments c
     LEFT JOIN users u ON u.id = c.user_id
     LEFT JOIN authors a ON a.id = c.author_id";

impl Database {
    /// Comments on one post, oldest first.
    pub fn get_post_comments(&self, post_id: Uuid) -> DbResult<Vec<Comment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{COMMENT_SELECT} WHERE c.parent_id = ?1 ORDER BY c.created_at ASC, c.id ASC"
            ))?;
            let rows = stmt
                .query_map([post_id.to_string()], map_comment)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn post_new_comment(&self, post_id: Uuid, commenter: Commenter, text: &str) -> DbResult<Comment> {
        self.with_conn(|conn| insert_comment(conn, post_id, commenter, text))
    }

    /// Comment on a post readers can see. Drafts and missing posts are both
    /// `NotFound("post")`; the check and the insert share one lock.
    pub fn post_new_comment_on_published(
        &self,
        post_id: Uuid,
        commenter: Commenter,
        text: &str,
    ) -> DbResult<Comment> {
        self.with_conn(|conn| {
            let published: Option<bool> = conn
                .query_row(
                    "SELECT published FROM posts WHERE id = ?1",
                    [post_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            if published != Some(true) {
                return Err(DbError::NotFound("post"));
            }
            insert_comment(conn, post_id, commenter, text)
        })
    }

    /// Replace a comment's text. The comment must belong to `post_id`.
    pub fn edit_comment(&self, post_id: Uuid, comment_id: i64, text: &str) -> DbResult<Comment> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE comments SET text = ?3 WHERE id = ?1 AND parent_id = ?2",
                (comment_id, post_id.to_string(), text),
            )?;
            if changed == 0 {
                return Err(DbError::NotFound("comment"));
            }
            query_comment(conn, post_id, comment_id)?.ok_or(DbError::NotFound("comment"))
        })
    }

    /// Remove a comment from `post_id`, returning it as it was.
    pub fn delete_comment(&self, post_id: Uuid, comment_id: i64) -> DbResult<Comment> {
        self.with_conn(|conn| {
            let comment = query_comment(conn, post_id, comment_id)?.ok_or(DbError::NotFound("comment"))?;
            conn.execute("DELETE FROM comments WHERE id = ?1", [comment_id])?;
            Ok(comment)
        })
    }
}

fn insert_comment(conn: &Connection, post_id: Uuid, commenter: Commenter, text: &str) -> DbResult<Comment> {
    let (user_id, author_id) = commenter.columns();
    conn.execute(
        "INSERT INTO comments (text, parent_id, user_id, author_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            text,
            post_id.to_string(),
            user_id.map(|id| id.to_string()),
            author_id.map(|id| id.to_string()),
            now(),
        ),
    )?;
    query_comment(conn, post_id, conn.last_insert_rowid())?.ok_or(DbError::NotFound("comment"))
}

fn query_comment(conn: &Connection, post_id: Uuid, comment_id: i64) -> DbResult<Option<Comment>> {
    let row = conn
        .query_row(
            &format!("{COMMENT_SELECT} WHERE c.id = ?1 AND c.parent_id = ?2"),
            (comment_id, post_id.to_string()),
            map_comment,
        )
        .optional()?;
    Ok(row)
}

/// Comments on every post matched by `post_filter`, a condition over
/// `posts p`, grouped by post and oldest first. The filter runs as a
/// subquery, so the number of posts never reaches the bound-variable limit.
pub(crate) fn comments_for_posts(
    conn: &Connection,
    post_filter: &str,
    params: &[&dyn ToSql],
) -> DbResult<HashMap<Uuid, Vec<Comment>>> {
    let sql = format!(
        "{COMMENT_SELECT}
         WHERE c.parent_id IN (SELECT p.id FROM posts p WHERE {post_filter})
         ORDER BY c.created_at ASC, c.id ASC"
    );

    let mut grouped: HashMap<Uuid, Vec<Comment>> = HashMap::new();
    let mut stmt = conn.prepare(&sql)?;
    for comment in stmt.query_map(params, map_comment)? {
        let comment = comment?;
        grouped.entry(comment.parent_id).or_default().push(comment);
    }

    Ok(grouped)
}

fn map_comment(row: &Row<'_>) -> rusqlite::Result<Comment> {
    let commenter = Commenter::from_ids(opt_uuid_at(row, 3)?, opt_uuid_at(row, 4)?)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    Ok(Comment {
        id: row.get(0)?,
        text: row.get(1)?,
        parent_id: uuid_at(row, 2)?,
        commenter: CommentedBy {
            role: commenter.role(),
            id: commenter.id(),
            username: row.get(5)?,
        },
        created_at: time_at(row, 6)?,
    })
}
