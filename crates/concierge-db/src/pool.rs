//! Connection pool creation and configuration.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

/// Runtime tunables for SQLite connection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// Busy timeout for SQLite connections, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    ///
    /// Every connection to `:memory:` is its own database, so in-memory
    /// pools should use a size of 1.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

impl DbRuntimeSettings {
    /// Settings for a single shared in-memory database.
    pub fn in_memory() -> Self {
        Self {
            pool_max_size: 1,
            ..Self::default()
        }
    }
}

/// A type alias for the SQLite connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Errors that can occur when creating the database pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to create database connection pool: {0}")]
    PoolInit(#[from] r2d2::Error),
}

/// Creates a SQLite pool with WAL mode, foreign keys, and a busy timeout.
///
/// # Errors
///
/// Returns `PoolError::PoolInit` if the first connections cannot be opened
/// or initialised.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(flags)
        .with_init(move |conn| init_connection(conn, settings.busy_timeout_ms));

    let pool = Pool::builder()
        .max_size(settings.pool_max_size)
        .build(manager)?;

    tracing::debug!(
        path = db_path,
        max_size = settings.pool_max_size,
        "database pool ready"
    );

    Ok(pool)
}

fn init_connection(conn: &mut Connection, busy_timeout_ms: u64) -> rusqlite::Result<()> {
    // In-memory databases report "memory" instead of "wal".
    let journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    if journal_mode != "wal" && journal_mode != "memory" {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("failed to set WAL journal mode, got: {journal_mode}")),
        ));
    }
    conn.execute_batch(&format!(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = {busy_timeout_ms};"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_pool_applies_pragmas() {
        let settings = DbRuntimeSettings {
            busy_timeout_ms: 2_500,
            pool_max_size: 1,
        };
        let pool = create_pool(":memory:", settings).expect("pool creation should succeed");
        let conn = pool.get().expect("should get a connection");

        let fk: i32 = conn
            .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1, "foreign keys should be enabled");

        let busy_timeout: i32 = conn
            .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(busy_timeout, 2_500);
        assert_eq!(pool.max_size(), 1);
    }
}
