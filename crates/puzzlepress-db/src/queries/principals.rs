use puzzlepress_types::models::{Account, Role};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::{OptionalExt, now, time_at, uuid_at};
use crate::models::CredentialsRow;
use crate::{Database, DbResult};

impl Database {
    // -- Authors --

    pub fn post_new_author(&self, username: &str, password_hash: &str) -> DbResult<Account> {
        self.with_conn(|conn| insert_principal(conn, Role::Author, username, password_hash))
    }

    pub fn get_author(&self, username: &str) -> DbResult<Option<CredentialsRow>> {
        self.with_conn(|conn| query_by_username(conn, Role::Author, username))
    }

    // -- Users --

    pub fn post_new_user(&self, username: &str, password_hash: &str) -> DbResult<Account> {
        self.with_conn(|conn| insert_principal(conn, Role::User, username, password_hash))
    }

    pub fn get_user(&self, username: &str) -> DbResult<Option<CredentialsRow>> {
        self.with_conn(|conn| query_by_username(conn, Role::User, username))
    }

    /// Login lookup for either principal table.
    pub fn get_credentials(&self, role: Role, username: &str) -> DbResult<Option<CredentialsRow>> {
        match role {
            Role::Author => self.get_author(username),
            Role::User => self.get_user(username),
        }
    }
}

fn table(role: Role) -> &'static str {
    match role {
        Role::Author => "authors",
        Role::User => "users",
    }
}

fn insert_principal(
    conn: &Connection,
    role: Role,
    username: &str,
    password_hash: &str,
) -> DbResult<Account> {
    let sql = format!(
        "INSERT INTO {} (id, username, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)
         RETURNING id, username, password_hash, created_at",
        table(role)
    );

    let row = conn.query_row(
        &sql,
        (Uuid::new_v4().to_string(), username, password_hash, now()),
        map_credentials,
    )?;

    Ok(row.into_account())
}

fn query_by_username(
    conn: &Connection,
    role: Role,
    username: &str,
) -> DbResult<Option<CredentialsRow>> {
    let sql = format!(
        "SELECT id, username, password_hash, created_at FROM {} WHERE username = ?1",
        table(role)
    );

    let row = conn
        .prepare(&sql)?
        .query_row([username], map_credentials)
        .optional()?;

    Ok(row)
}

fn map_credentials(row: &Row<'_>) -> rusqlite::Result<CredentialsRow> {
    Ok(CredentialsRow {
        id: uuid_at(row, 0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: time_at(row, 3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;

    #[test]
    fn author_round_trips_through_lookup() {
        let db = fixtures::db();
        let created = db.post_new_author("ana", "hash-a").unwrap();

        let found = db.get_author("ana").unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.password_hash, "hash-a");
        assert!(db.get_author("nobody").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_a_conflict() {
        let db = fixtures::db();
        db.post_new_user("bo", "h").unwrap();

        let err = db.post_new_user("bo", "h2").unwrap_err();
        assert!(err.is_conflict_on("username"), "got {err:?}");
    }

    #[test]
    fn users_and_authors_are_separate_tables() {
        let db = fixtures::db();
        db.post_new_author("cy", "author-hash").unwrap();
        db.post_new_user("cy", "user-hash").unwrap();

        assert_eq!(db.get_credentials(Role::Author, "cy").unwrap().unwrap().password_hash, "author-hash");
        assert_eq!(db.get_credentials(Role::User, "cy").unwrap().unwrap().password_hash, "user-hash");
    }
}
