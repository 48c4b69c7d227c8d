use chrono::Utc;
use rusqlite::Connection;
use tracing::info;

use crate::error::AppResult;

const USER_VERSION: i32 = 2;

pub fn run(conn: &Connection) -> AppResult<()> {
    // Ensure migration history table exists
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS migration_history (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        );
        "#,
    )?;

    let mut current_version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if current_version < 1 {
        info!(target: "ledger::db", version = current_version, "running migration v1");
        migrate_to_v1(conn)?;
        current_version = 1;
        conn.execute(&format!("PRAGMA user_version = {}", current_version), [])?;
        record_migration(conn, 1, "Backfill vault account versions")?;
    }

    if current_version < 2 {
        info!(target: "ledger::db", version = current_version, "running migration v2");
        migrate_to_v2(conn)?;
        current_version = 2;
        conn.execute(&format!("PRAGMA user_version = {}", current_version), [])?;
        record_migration(conn, 2, "Normalize cycle references to ISO period start dates")?;
    }

    debug_assert!(current_version == USER_VERSION);

    Ok(())
}

fn record_migration(conn: &Connection, version: i32, description: &str) -> AppResult<()> {
    conn.execute(
        r#"
        INSERT OR IGNORE INTO migration_history (version, description, applied_at)
        VALUES (?1, ?2, ?3)
        "#,
        rusqlite::params![version, description, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Accounts written before optimistic versioning existed carry no version;
/// treat them all as generation zero.
fn migrate_to_v1(conn: &Connection) -> AppResult<()> {
    conn.execute(
        "UPDATE vault_balance SET version = 0 WHERE version IS NULL",
        [],
    )?;
    Ok(())
}

/// Cycle references used to hold a locale-formatted month name (for example
/// "Janeiro 2026"). Anything that does not look like an ISO date is cleared so
/// the next ledger pass rolls the account onto the normalized key.
fn migrate_to_v2(conn: &Connection) -> AppResult<()> {
    conn.execute(
        r#"
        UPDATE vault_balance
        SET cycle_reference = ''
        WHERE cycle_reference NOT GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]'
        "#,
        [],
    )?;
    Ok(())
}
