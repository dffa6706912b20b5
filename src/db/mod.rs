pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;

/// Open (or create) the conversation database at the given path with schema
/// and migrations applied.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }

    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(std::time::Duration::from_millis(5000))?;

    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&mut conn).context("failed to run migrations")?;

    tracing::info!(path = %path.display(), "conversation database initialized");
    Ok(conn)
}

/// Open an in-memory database with schema and migrations applied.
pub fn open_memory_database() -> Result<Connection> {
    let mut conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&mut conn).context("failed to run migrations")?;
    Ok(conn)
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub schema_version: u32,
    pub embedding_model: Option<String>,
    pub join_format: Option<String>,
    pub conversation_count: u64,
}

/// Run SQLite's integrity check and collect schema facts.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity: String = conn
        .query_row("PRAGMA integrity_check", [], |row| row.get(0))
        .context("integrity check failed to run")?;
    let conversation_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))?;

    Ok(HealthReport {
        integrity_ok: integrity == "ok",
        integrity_details: integrity,
        schema_version: migrations::get_schema_version(conn)?,
        embedding_model: migrations::get_embedding_model(conn)?,
        join_format: migrations::get_join_format(conn)?,
        conversation_count: conversation_count as u64,
    })
}
