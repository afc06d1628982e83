pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;

mod cancel;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

pub use error::{DbError, DbResult};

/// SQLite VM instructions between cancellation checks.
const CANCEL_CHECK_OPS: i32 = 1_000;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::init(conn)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.progress_handler(CANCEL_CHECK_OPS, Some(cancel::requested));

        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&Connection) -> DbResult<T>,
    {
        if cancel::requested() {
            return Err(DbError::Cancelled);
        }
        let conn = self.conn.lock().map_err(|_| DbError::Poisoned)?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&mut Connection) -> DbResult<T>,
    {
        if cancel::requested() {
            return Err(DbError::Cancelled);
        }
        let mut conn = self.conn.lock().map_err(|_| DbError::Poisoned)?;
        f(&mut conn)
    }

    /// Run blocking database work off the async runtime.
    ///
    /// Dropping the returned future (request timeout, client gone) flags the
    /// call as cancelled: work that has not reached the connection yet is
    /// skipped and a running statement is interrupted, resolving to
    /// [`DbError::Cancelled`].
    pub async fn run<F, T>(self: &Arc<Self>, f: F) -> DbResult<T>
    where
        F: FnOnce(&Database) -> DbResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(self);
        let flag = Arc::new(AtomicBool::new(false));
        let _cancel_on_drop = cancel::CancelOnDrop::new(flag.clone());

        tokio::task::spawn_blocking(move || cancel::scoped(flag, || f(&db)))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                DbError::Task(e.to_string())
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn run_returns_closure_result() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let version: i64 = db
            .run(|db| {
                db.with_conn(|conn| {
                    Ok(conn.query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))?)
                })
            })
            .await
            .unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn raised_flag_interrupts_running_statement() {
        let db = Database::open_in_memory().unwrap();
        let flag = Arc::new(AtomicBool::new(false));
        let inner = flag.clone();

        let result: DbResult<i64> = cancel::scoped(flag, || {
            db.with_conn(|conn| {
                inner.store(true, Ordering::Relaxed);
                // Long enough to cross several progress-handler checks.
                let n = conn.query_row(
                    "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 1000000)
                     SELECT COUNT(*) FROM c",
                    [],
                    |r| r.get(0),
                )?;
                Ok(n)
            })
        });

        assert!(matches!(result, Err(DbError::Cancelled)));
    }

    #[test]
    fn raised_flag_skips_work_before_it_starts() {
        let db = Database::open_in_memory().unwrap();
        let flag = Arc::new(AtomicBool::new(true));
        let result = cancel::scoped(flag, || db.with_conn(|_| Ok(())));
        assert!(matches!(result, Err(DbError::Cancelled)));
    }

    #[test]
    fn connection_is_usable_outside_any_scope() {
        let db = Database::open_in_memory().unwrap();
        let one: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT 1", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(one, 1);
    }
}
