//! Forward-only schema migrations for the conversation log.
//!
//! The version lives in `schema_meta` and each step is applied in order until
//! [`CURRENT_SCHEMA_VERSION`] is reached.

use rusqlite::Connection;

pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Text the vector store embeds for each turn. Stored so a later change to the
/// format can be detected against existing vectors.
pub const EMBEDDING_JOIN_FORMAT: &str = "User: {user} Bot: {bot}";

pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

fn update_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'",
        [version.to_string()],
    )?;
    Ok(())
}

fn get_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    match conn.query_row(
        "SELECT value FROM schema_meta WHERE key = ?1",
        [key],
        |row| row.get::<_, String>(0),
    ) {
        Ok(val) => Ok(Some(val)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Embedding model the stored vectors were produced with, if recorded.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    get_meta(conn, "embedding_model")
}

pub fn set_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
        [model],
    )?;
    Ok(())
}

pub fn get_join_format(conn: &Connection) -> rusqlite::Result<Option<String>> {
    get_meta(conn, "embedding_join_format")
}

/// Run any pending migrations, each inside its own transaction.
pub fn run_migrations(conn: &mut Connection) -> rusqlite::Result<()> {
    let mut version = get_schema_version(conn)?;
    tracing::debug!(schema_version = version, target = CURRENT_SCHEMA_VERSION, "checking migrations");

    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        tracing::info!(from = version, to = next, "running migration");

        let tx = conn.transaction()?;
        match next {
            2 => migrate_v1_to_v2(&tx)?,
            _ => {
                tracing::error!(version = next, "unknown migration target");
                break;
            }
        }
        update_schema_version(&tx, next)?;
        tx.commit()?;
        version = next;
    }

    Ok(())
}

/// v1 → v2: timestamp index for recency queries, and the join format the
/// vector store embeds. The model is recorded on first use.
fn migrate_v1_to_v2(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_conversations_timestamp ON conversations(timestamp);",
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('embedding_join_format', ?1)",
        [EMBEDDING_JOIN_FORMAT],
    )?;
    Ok(())
}
