//! Database layer for the concierge backend.
//!
//! Provides the SQLite connection pool (via `r2d2`) and the embedded,
//! versioned migrations that create the CRM tables: businesses, leads,
//! dialer prospects, and call logs.
//!
//! SQL files are compiled into the binary with `include_str!`, so a
//! deployed server always carries the schema its queries expect.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
