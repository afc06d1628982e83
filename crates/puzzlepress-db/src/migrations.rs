use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (puzzles, leaderboards, items)");
        conn.execute_batch(
            "
            CREATE TABLE puzzles (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                image_url   TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE characters (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                puzzle_id   TEXT NOT NULL REFERENCES puzzles(id) ON DELETE CASCADE,
                name        TEXT NOT NULL,
                image_url   TEXT,
                x           REAL NOT NULL,
                y           REAL NOT NULL
            );

            CREATE INDEX idx_characters_puzzle ON characters(puzzle_id);

            CREATE TABLE leaderboards (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                puzzle_id   TEXT NOT NULL UNIQUE REFERENCES puzzles(id) ON DELETE CASCADE
            );

            CREATE TABLE players (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL,
                score           INTEGER NOT NULL,
                leaderboard_id  INTEGER NOT NULL REFERENCES leaderboards(id) ON DELETE CASCADE,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_players_rank ON players(leaderboard_id, score DESC, created_at);

            CREATE TABLE items (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                model       TEXT NOT NULL,
                name        TEXT NOT NULL,
                description TEXT,
                created_at  TEXT NOT NULL,
                UNIQUE(model, name)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (authors, users, posts, comments)");
        conn.execute_batch(
            "
            CREATE TABLE authors (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE posts (
                id          TEXT PRIMARY KEY,
                title       TEXT NOT NULL UNIQUE,
                text        TEXT NOT NULL,
                author_id   TEXT NOT NULL REFERENCES authors(id),
                published   INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_posts_author ON posts(author_id, created_at);

            CREATE TABLE comments (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                text        TEXT NOT NULL,
                parent_id   TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                user_id     TEXT REFERENCES users(id) ON DELETE CASCADE,
                author_id   TEXT REFERENCES authors(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                CHECK ((user_id IS NULL) <> (author_id IS NULL))
            );

            CREATE INDEX idx_comments_parent ON comments(parent_id, created_at);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
