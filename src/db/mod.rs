use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::AppResult;

pub mod migrations;

pub mod repositories;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Handle to the ledger's SQLite file. Connections are opened per use; WAL
/// and a busy timeout let per-account writers on different connections
/// coexist.
#[derive(Clone, Debug)]
pub struct DbPool {
    path: PathBuf,
}

impl DbPool {
    pub fn new<P: Into<PathBuf>>(path: P) -> AppResult<Self> {
        let path = path.into();
        info!(target: "ledger::db", db_path = %path.display(), "opening ledger database");
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let pool = Self { path };
        // Fail fast on an unusable file before any ledger operation runs.
        pool.get_connection()?;

        Ok(pool)
    }

    pub fn get_connection(&self) -> AppResult<Connection> {
        let mut conn = Connection::open(&self.path)?;
        configure_connection(&mut conn)?;
        conn.execute_batch(SCHEMA_SQL)?;
        migrations::run(&conn)?;
        debug!(target: "ledger::db", db_path = %self.path.display(), "ledger connection ready");
        Ok(conn)
    }
}

fn configure_connection(conn: &mut Connection) -> AppResult<()> {
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.pragma_update(None, "foreign_keys", &1)?;
    conn.pragma_update(None, "journal_mode", &"WAL")?;
    Ok(())
}
