pub mod migrations;
pub mod queries;

use anyhow::Context;
use rusqlite::Connection;

pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).context("failed to open database")?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("failed to set database pragmas")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}

/// Open a database and apply migrations only up to (and including) the named
/// file. Exists for tests that need a half-migrated database, e.g. one where
/// the ledger tables from `0002_payments.sql` are still missing.
pub fn init_db_until(path: &str, last: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).context("failed to open database")?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("failed to set database pragmas")?;

    migrations::run_migrations_until(&conn, Some(last))?;

    Ok(conn)
}
