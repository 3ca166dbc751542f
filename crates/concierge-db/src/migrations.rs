//! Embedded SQL migration runner.
//!
//! Migrations run in order on startup and are recorded in
//! `_concierge_migrations`; anything already recorded is skipped.

use rusqlite::Connection;
use thiserror::Error;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. New migrations are appended here.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_init",
        sql: include_str!("migrations/000_init.sql"),
    },
    Migration {
        name: "001_businesses",
        sql: include_str!("migrations/001_businesses.sql"),
    },
    Migration {
        name: "002_leads",
        sql: include_str!("migrations/002_leads.sql"),
    },
    Migration {
        name: "003_prospects",
        sql: include_str!("migrations/003_prospects.sql"),
    },
    Migration {
        name: "004_call_logs",
        sql: include_str!("migrations/004_call_logs.sql"),
    },
];

/// Errors that can occur during migration execution.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A SQL statement within a migration failed.
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        name: String,
        source: rusqlite::Error,
    },

    /// Failed to query migration state.
    #[error("failed to check migration state: {0}")]
    StateQuery(rusqlite::Error),
}

/// Runs all pending migrations and returns how many were applied.
///
/// Each migration and its tracking row are committed in one transaction, so
/// a failure leaves no partial schema behind.
///
/// # Errors
///
/// Returns `MigrationError` if any migration fails to execute or if the
/// tracking table cannot be queried.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    run_migrations_from_list(conn, MIGRATIONS)
}

fn run_migrations_from_list(
    conn: &Connection,
    migrations: &[Migration],
) -> Result<usize, MigrationError> {
    let failed = |name: &str| {
        let name = name.to_string();
        move |source| MigrationError::ExecutionFailed { name, source }
    };

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _concierge_migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(failed("_concierge_migrations_bootstrap"))?;

    let mut applied = 0;

    for migration in migrations {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _concierge_migrations WHERE name = ?1",
                [migration.name],
                |row| row.get(0),
            )
            .map_err(MigrationError::StateQuery)?;

        if already_applied {
            tracing::debug!(migration = migration.name, "migration already applied");
            continue;
        }

        tracing::info!(migration = migration.name, "applying migration");

        let tx = conn
            .unchecked_transaction()
            .map_err(failed(migration.name))?;
        tx.execute_batch(migration.sql)
            .map_err(failed(migration.name))?;
        tx.execute(
            "INSERT INTO _concierge_migrations (name) VALUES (?1)",
            [migration.name],
        )
        .map_err(failed(migration.name))?;
        tx.commit().map_err(failed(migration.name))?;

        applied += 1;
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, table: &str) -> bool {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [table],
            |row| row.get(0),
        )
        .expect("should query sqlite_master")
    }

    #[test]
    fn fresh_database_gets_every_table() {
        let conn = Connection::open_in_memory().unwrap();
        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, MIGRATIONS.len());

        for table in ["businesses", "leads", "prospects", "call_logs"] {
            assert!(table_exists(&conn, table), "{table} should exist");
        }
    }

    #[test]
    fn second_run_applies_nothing() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let second = run_migrations(&conn).expect("second run should succeed");
        assert_eq!(second, 0);
    }

    #[test]
    fn failed_migration_rolls_back_its_schema() {
        let conn = Connection::open_in_memory().unwrap();
        let migrations = [Migration {
            name: "001_broken",
            sql: "
                CREATE TABLE rollback_probe (id INTEGER PRIMARY KEY);
                INSERT INTO no_such_table VALUES (1);
            ",
        }];

        let err = run_migrations_from_list(&conn, &migrations).unwrap_err();
        match err {
            MigrationError::ExecutionFailed { name, .. } => assert_eq!(name, "001_broken"),
            other => panic!("unexpected error type: {other:?}"),
        }
        assert!(!table_exists(&conn, "rollback_probe"));
    }

    #[test]
    fn lead_status_defaults_to_new() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO businesses (id, business_name) VALUES ('acme', 'Acme')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO leads (business_id, inquiry) VALUES ('acme', 'question')",
            [],
        )
        .unwrap();
        let status: String = conn
            .query_row("SELECT status FROM leads", [], |row| row.get(0))
            .unwrap();
        assert_eq!(status, "new");
    }
}
