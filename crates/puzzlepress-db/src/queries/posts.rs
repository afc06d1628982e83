use std::collections::HashMap;

use puzzlepress_types::models::{AuthorWithPosts, Post, PostDetail, PostWithAuthor, Principal};
use rusqlite::{Connection, Row, ToSql};
use uuid::Uuid;

use super::comments::comments_for_posts;
use super::{OptionalExt, now, time_at, to_sql_time, uuid_at};
use crate::models::{NewPost, PostChanges};
use crate::{Database, DbError, DbResult};

const POST_COLUMNS: &str = "id, title, text, author_id, published, created_at";

/// Post columns plus the author's username.
const POST_WITH_AUTHOR: &str = "SELECT p.id, p.title, p.text, p.author_id, p.published, p.created_at, a.username
     FROM posts p
     JOIN authors a ON a.id = p.author_id";

impl Database {
    // -- Reads --

    /// All published posts with their author and comments.
    pub fn get_all_posts(&self) -> DbResult<Vec<PostDetail>> {
        self.with_conn(|conn| {
            let posts = query_posts_with_author(
                conn,
                &format!("{POST_WITH_AUTHOR} WHERE p.published = 1 ORDER BY p.created_at DESC, p.rowid DESC"),
                &[],
            )?;
            attach_comments(conn, posts, "p.published = 1", &[])
        })
    }

    /// Unpublished posts, optionally narrowed to one author.
    pub fn get_all_drafts(&self, author_id: Option<Uuid>) -> DbResult<Vec<PostWithAuthor>> {
        self.with_conn(|conn| {
            let author = author_id.map(|id| id.to_string());
            query_posts_with_author(
                conn,
                &format!(
                    "{POST_WITH_AUTHOR} WHERE p.published = 0 AND (?1 IS NULL OR p.author_id = ?1)
                     ORDER BY p.created_at DESC, p.rowid DESC"
                ),
                &[&author],
            )
        })
    }

    pub fn get_all_drafts_by_author(&self, author_id: Uuid) -> DbResult<Vec<PostWithAuthor>> {
        self.get_all_drafts(Some(author_id))
    }

    /// Every post of one author, drafts included, newest first.
    pub fn get_all_posts_by_author(&self, author_id: Uuid) -> DbResult<Vec<PostWithAuthor>> {
        self.with_conn(|conn| {
            query_posts_with_author(
                conn,
                &format!("{POST_WITH_AUTHOR} WHERE p.author_id = ?1 ORDER BY p.created_at DESC, p.rowid DESC"),
                &[&author_id.to_string()],
            )
        })
    }

    /// The author with all of their posts and each post's comments.
    pub fn get_posts_by_author(&self, author_id: Uuid) -> DbResult<Option<AuthorWithPosts>> {
        self.with_conn(|conn| {
            let author = conn
                .query_row(
                    "SELECT id, username, created_at FROM authors WHERE id = ?1",
                    [author_id.to_string()],
                    |row| Ok((uuid_at(row, 0)?, row.get::<_, String>(1)?, time_at(row, 2)?)),
                )
                .optional()?;

            let Some((id, username, created_at)) = author else {
                return Ok(None);
            };

            let posts = query_posts_with_author(
                conn,
                &format!("{POST_WITH_AUTHOR} WHERE p.author_id = ?1 ORDER BY p.created_at DESC, p.rowid DESC"),
                &[&id.to_string()],
            )?;

            Ok(Some(AuthorWithPosts {
                id,
                username,
                created_at,
                posts: attach_comments(conn, posts, "p.author_id = ?1", &[&id.to_string()])?,
            }))
        })
    }

    /// One post with its author and comments oldest first.
    pub fn get_post(&self, post_id: Uuid) -> DbResult<Option<PostDetail>> {
        self.with_conn(|conn| {
            let Some(post) = query_post_with_author(conn, post_id)? else {
                return Ok(None);
            };
            Ok(attach_comments(conn, vec![post], "p.id = ?1", &[&post_id.to_string()])?.pop())
        })
    }

    // -- Writes --

    pub fn post_new_post(&self, new: NewPost) -> DbResult<Post> {
        self.with_conn(|conn| {
            let post = conn.query_row(
                &format!(
                    "INSERT INTO posts (id, title, text, author_id, published, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     RETURNING {POST_COLUMNS}"
                ),
                (
                    new.id.to_string(),
                    &new.title,
                    &new.text,
                    new.author_id.to_string(),
                    new.published,
                    now(),
                ),
                map_post,
            )?;
            Ok(post)
        })
    }

    pub fn update_post(&self, post_id: Uuid, changes: PostChanges) -> DbResult<Post> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "UPDATE posts SET
                        title = COALESCE(?2, title),
                        text = COALESCE(?3, text),
                        published = COALESCE(?4, published),
                        created_at = COALESCE(?5, created_at)
                     WHERE id = ?1
                     RETURNING {POST_COLUMNS}"
                ),
                (
                    post_id.to_string(),
                    changes.title,
                    changes.text,
                    changes.published,
                    changes.created_at.map(to_sql_time),
                ),
                map_post,
            )
            .optional()?
            .ok_or(DbError::NotFound("post"))
        })
    }

    /// Drafts only take title and text edits.
    pub fn update_draft(&self, post_id: Uuid, title: Option<String>, text: Option<String>) -> DbResult<Post> {
        self.update_post(
            post_id,
            PostChanges {
                title,
                text,
                ..PostChanges::default()
            },
        )
    }

    /// Flip the published flag; returns the post with its author.
    pub fn set_post_published(&self, post_id: Uuid, published: bool) -> DbResult<PostWithAuthor> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET published = ?2 WHERE id = ?1",
                (post_id.to_string(), published),
            )?;
            if changed == 0 {
                return Err(DbError::NotFound("post"));
            }
            query_post_with_author(conn, post_id)?.ok_or(DbError::NotFound("post"))
        })
    }

    pub fn post_post_publish(&self, post_id: Uuid) -> DbResult<PostWithAuthor> {
        self.set_post_published(post_id, true)
    }

    pub fn post_post_unpublish(&self, post_id: Uuid) -> DbResult<PostWithAuthor> {
        self.set_post_published(post_id, false)
    }

    /// Delete a post. Its comments go with it (ON DELETE CASCADE).
    pub fn delete_post(&self, post_id: Uuid) -> DbResult<Post> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("DELETE FROM posts WHERE id = ?1 RETURNING {POST_COLUMNS}"),
                [post_id.to_string()],
                map_post,
            )
            .optional()?
            .ok_or(DbError::NotFound("post"))
        })
    }
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        text: row.get(2)?,
        author_id: uuid_at(row, 3)?,
        published: row.get(4)?,
        created_at: time_at(row, 5)?,
    })
}

fn map_post_with_author(row: &Row<'_>) -> rusqlite::Result<PostWithAuthor> {
    let post = map_post(row)?;
    let author = Principal {
        id: post.author_id,
        username: row.get(6)?,
    };
    Ok(PostWithAuthor { post, author })
}

fn query_posts_with_author(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> DbResult<Vec<PostWithAuthor>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map_post_with_author)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_post_with_author(conn: &Connection, post_id: Uuid) -> DbResult<Option<PostWithAuthor>> {
    let row = conn
        .query_row(
            &format!("{POST_WITH_AUTHOR} WHERE p.id = ?1"),
            [post_id.to_string()],
            map_post_with_author,
        )
        .optional()?;
    Ok(row)
}

/// Batch-load comments for `posts`, preserving post order. `post_filter`
/// must select the same posts the page was read with.
fn attach_comments(
    conn: &Connection,
    posts: Vec<PostWithAuthor>,
    post_filter: &str,
    params: &[&dyn ToSql],
) -> DbResult<Vec<PostDetail>> {
    let mut by_post: HashMap<Uuid, Vec<_>> = comments_for_posts(conn, post_filter, params)?;

    Ok(posts
        .into_iter()
        .map(|PostWithAuthor { post, author }| PostDetail {
            comments: by_post.remove(&post.id).unwrap_or_default(),
            post,
            author,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;
    use chrono::{Duration, Utc};
    use puzzlepress_types::models::Commenter;

    #[test]
    fn duplicate_title_is_a_conflict() {
        let db = fixtures::db();
        let author = fixtures::author(&db, "ana");
        fixtures::post(&db, author.id, "Same", true);

        let err = db
            .post_new_post(NewPost {
                id: Uuid::new_v4(),
                title: "Same".into(),
                text: "other".into(),
                author_id: author.id,
                published: false,
            })
            .unwrap_err();
        assert!(err.is_conflict_on("title"), "got {err:?}");
    }

    #[test]
    fn post_for_unknown_author_is_rejected() {
        let db = fixtures::db();
        let err = db
            .post_new_post(NewPost {
                id: Uuid::new_v4(),
                title: "Orphan".into(),
                text: "".into(),
                author_id: Uuid::new_v4(),
                published: true,
            })
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidReference), "got {err:?}");
    }

    #[test]
    fn published_and_drafts_are_split_by_flag() {
        let db = fixtures::db();
        let ana = fixtures::author(&db, "ana");
        let bo = fixtures::author(&db, "bo");
        fixtures::post(&db, ana.id, "Live", true);
        fixtures::post(&db, ana.id, "Ana draft", false);
        fixtures::post(&db, bo.id, "Bo draft", false);

        let live = db.get_all_posts().unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].post.title, "Live");
        assert_eq!(live[0].author.username, "ana");

        assert_eq!(db.get_all_drafts(None).unwrap().len(), 2);
        let ana_drafts = db.get_all_drafts_by_author(ana.id).unwrap();
        assert_eq!(ana_drafts.len(), 1);
        assert_eq!(ana_drafts[0].post.title, "Ana draft");
    }

    #[test]
    fn posts_by_author_are_newest_first() {
        let db = fixtures::db();
        let ana = fixtures::author(&db, "ana");
        let old = fixtures::post(&db, ana.id, "Old", true);
        let new = fixtures::post(&db, ana.id, "New", false);
        let mid = fixtures::post(&db, ana.id, "Mid", true);

        let base = Utc::now();
        for (post, age) in [(&old, 3), (&mid, 2), (&new, 1)] {
            db.update_post(
                post.id,
                PostChanges {
                    created_at: Some(base - Duration::days(age)),
                    ..PostChanges::default()
                },
            )
            .unwrap();
        }

        let titles: Vec<_> = db
            .get_all_posts_by_author(ana.id)
            .unwrap()
            .into_iter()
            .map(|p| p.post.title)
            .collect();
        assert_eq!(titles, ["New", "Mid", "Old"]);
    }

    #[test]
    fn update_changes_only_given_fields() {
        let db = fixtures::db();
        let ana = fixtures::author(&db, "ana");
        let post = fixtures::post(&db, ana.id, "Before", false);

        let updated = db
            .update_post(
                post.id,
                PostChanges {
                    title: Some("After".into()),
                    published: Some(true),
                    ..PostChanges::default()
                },
            )
            .unwrap();
        assert_eq!(updated.title, "After");
        assert_eq!(updated.text, post.text);
        assert!(updated.published);
        assert_eq!(updated.created_at, post.created_at);
    }

    #[test]
    fn update_to_taken_title_is_a_conflict() {
        let db = fixtures::db();
        let ana = fixtures::author(&db, "ana");
        fixtures::post(&db, ana.id, "Taken", true);
        let draft = fixtures::post(&db, ana.id, "Draft", false);

        let err = db.update_draft(draft.id, Some("Taken".into()), None).unwrap_err();
        assert!(err.is_conflict_on("title"), "got {err:?}");
    }

    #[test]
    fn update_missing_post_is_not_found() {
        let db = fixtures::db();
        let err = db.update_draft(Uuid::new_v4(), None, Some("x".into())).unwrap_err();
        assert!(matches!(err, DbError::NotFound("post")));
    }

    #[test]
    fn publish_and_unpublish_flip_the_flag() {
        let db = fixtures::db();
        let ana = fixtures::author(&db, "ana");
        let post = fixtures::post(&db, ana.id, "Flip", false);

        let published = db.post_post_publish(post.id).unwrap();
        assert!(published.post.published);
        assert_eq!(published.author.username, "ana");

        let unpublished = db.post_post_unpublish(post.id).unwrap();
        assert!(!unpublished.post.published);

        assert!(matches!(db.post_post_publish(Uuid::new_v4()), Err(DbError::NotFound(_))));
    }

    #[test]
    fn deleting_a_post_cascades_to_comments() {
        let db = fixtures::db();
        let ana = fixtures::author(&db, "ana");
        let post = fixtures::post(&db, ana.id, "Doomed", true);
        let comment = db.post_new_comment(post.id, Commenter::Author(ana.id), "bye").unwrap();

        let deleted = db.delete_post(post.id).unwrap();
        assert_eq!(deleted.id, post.id);
        assert!(db.get_post(post.id).unwrap().is_none());
        assert!(db.get_post_comments(post.id).unwrap().is_empty());
        assert!(matches!(
            db.edit_comment(post.id, comment.id, "ghost"),
            Err(DbError::NotFound("comment"))
        ));
        assert!(matches!(db.delete_post(post.id), Err(DbError::NotFound(_))));
    }

    #[test]
    fn author_with_posts_nests_comments() {
        let db = fixtures::db();
        let ana = fixtures::author(&db, "ana");
        let reader = fixtures::user(&db, "reader");
        let post = fixtures::post(&db, ana.id, "Hello", true);
        fixtures::post(&db, ana.id, "Unfinished", false);
        db.post_new_comment(post.id, Commenter::User(reader.id), "nice").unwrap();

        let author = db.get_posts_by_author(ana.id).unwrap().unwrap();
        assert_eq!(author.username, "ana");
        assert_eq!(author.posts.len(), 2);
        let hello = author.posts.iter().find(|p| p.post.title == "Hello").unwrap();
        assert_eq!(hello.comments.len(), 1);
        assert_eq!(hello.comments[0].commenter.username, "reader");

        assert!(db.get_posts_by_author(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn listing_more_posts_than_sqlite_binds_keeps_comments() {
        // Bundled SQLite caps bound variables at 32766 per statement.
        const POSTS: usize = 33_000;

        let db = fixtures::db();
        let ana = fixtures::author(&db, "ana");
        let author_id = ana.id.to_string();

        db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO posts (id, title, text, author_id, published, created_at)
                     VALUES (?1, ?2, '', ?3, 1, ?4)",
                )?;
                for n in 0..POSTS {
                    stmt.execute((Uuid::new_v4().to_string(), format!("Bulk {n}"), &author_id, now()))?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .unwrap();

        let last = fixtures::post(&db, ana.id, "Commented", true);
        db.post_new_comment(last.id, Commenter::Author(ana.id), "still here").unwrap();

        let posts = db.get_all_posts().unwrap();
        assert_eq!(posts.len(), POSTS + 1);
        let commented = posts.iter().find(|p| p.post.id == last.id).unwrap();
        assert_eq!(commented.comments.len(), 1);
        assert_eq!(commented.comments[0].text, "still here");
    }
}
