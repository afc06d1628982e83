use puzzlepress_types::models::{Character, Leaderboard, LeaderboardRef, NewPuzzle, Player, Puzzle};
use rusqlite::{Connection, Row};

use super::{OptionalExt, now, time_at, uuid_at};
use crate::models::NewPlayer;
use crate::{Database, DbResult};

impl Database {
    // -- Puzzles --

    pub fn get_puzzle_by_id(&self, puzzle_id: &str) -> DbResult<Option<Puzzle>> {
        self.with_conn(|conn| query_puzzle(conn, puzzle_id))
    }

    /// Insert a puzzle with its characters and an empty leaderboard.
    pub fn create_puzzle(&self, new: &NewPuzzle) -> DbResult<Puzzle> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO puzzles (id, name, image_url, created_at) VALUES (?1, ?2, ?3, ?4)",
                (&new.id, &new.name, &new.image_url, now()),
            )?;

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO characters (puzzle_id, name, image_url, x, y) VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for c in &new.characters {
                    stmt.execute((&new.id, &c.name, &c.image_url, c.x, c.y))?;
                }
            }

            tx.execute("INSERT INTO leaderboards (puzzle_id) VALUES (?1)", [&new.id])?;

            let puzzle = query_puzzle(&tx, &new.id)?.ok_or(crate::DbError::NotFound("puzzle"))?;
            tx.commit()?;
            Ok(puzzle)
        })
    }

    // -- Leaderboards --

    pub fn get_leaderboard_by_puzzle_id(&self, puzzle_id: &str) -> DbResult<Option<Leaderboard>> {
        self.with_conn(|conn| {
            let Some(board) = query_leaderboard_ref(conn, puzzle_id)? else {
                return Ok(None);
            };

            // Rank is never stored: highest score first, earlier submission wins ties.
            let mut stmt = conn.prepare(
                "SELECT id, username, score, leaderboard_id, created_at FROM players
                 WHERE leaderboard_id = ?1
                 ORDER BY score DESC, created_at ASC, rowid ASC",
            )?;
            let players = stmt
                .query_map([board.id], map_player)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Some(Leaderboard {
                id: board.id,
                puzzle_id: board.puzzle_id,
                players,
            }))
        })
    }

    /// The leaderboard row alone, without loading its players.
    pub fn get_leaderboard_ref(&self, puzzle_id: &str) -> DbResult<Option<LeaderboardRef>> {
        self.with_conn(|conn| query_leaderboard_ref(conn, puzzle_id))
    }

    /// Every submission is a new row; players are never upserted.
    pub fn post_new_player(&self, new: NewPlayer) -> DbResult<Player> {
        self.with_conn(|conn| {
            let player = conn.query_row(
                "INSERT INTO players (id, username, score, leaderboard_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING id, username, score, leaderboard_id, created_at",
                (new.id.to_string(), &new.username, new.score, new.leaderboard_id, now()),
                map_player,
            )?;
            Ok(player)
        })
    }
}

fn query_puzzle(conn: &Connection, puzzle_id: &str) -> DbResult<Option<Puzzle>> {
    let puzzle = conn
        .query_row(
            "SELECT id, name, image_url, created_at FROM puzzles WHERE id = ?1",
            [puzzle_id],
            |row| {
                Ok(Puzzle {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    image_url: row.get(2)?,
                    created_at: time_at(row, 3)?,
                    characters: Vec::new(),
                    leaderboard: None,
                })
            },
        )
        .optional()?;

    let Some(mut puzzle) = puzzle else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT id, puzzle_id, name, image_url, x, y FROM characters WHERE puzzle_id = ?1 ORDER BY id",
    )?;
    puzzle.characters = stmt
        .query_map([puzzle_id], |row| {
            Ok(Character {
                id: row.get(0)?,
                puzzle_id: row.get(1)?,
                name: row.get(2)?,
                image_url: row.get(3)?,
                x: row.get(4)?,
                y: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    puzzle.leaderboard = query_leaderboard_ref(conn, puzzle_id)?;

    Ok(Some(puzzle))
}

fn query_leaderboard_ref(conn: &Connection, puzzle_id: &str) -> DbResult<Option<LeaderboardRef>> {
    let board = conn
        .query_row(
            "SELECT id, puzzle_id FROM leaderboards WHERE puzzle_id = ?1",
            [puzzle_id],
            |row| {
                Ok(LeaderboardRef {
                    id: row.get(0)?,
                    puzzle_id: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(board)
}

fn map_player(row: &Row<'_>) -> rusqlite::Result<Player> {
    Ok(Player {
        id: uuid_at(row, 0)?,
        username: row.get(1)?,
        score: row.get(2)?,
        leaderboard_id: row.get(3)?,
        created_at: time_at(row, 4)?,
    })
}
