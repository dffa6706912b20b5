//! Relational conversation log.
//!
//! One `conversations` row per turn, independent of the vector store. Used
//! for history and statistics rather than semantic retrieval.

use std::path::Path;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::types::{MemoryEntry, Sentiment};
use crate::error::{MemoryError, Result};

/// The JSON blob stored in the `metadata` column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnMetadata {
    pub tags: Vec<String>,
    pub sentiment: Sentiment,
    pub entities: Vec<String>,
    pub conversation_id: String,
    pub turn_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationRecord {
    pub id: i64,
    pub timestamp: String,
    #[serde(rename = "user")]
    pub user_text: String,
    #[serde(rename = "bot")]
    pub bot_text: String,
    pub metadata: TurnMetadata,
}

pub struct ConversationLog {
    conn: Connection,
}

impl ConversationLog {
    /// Open (or create) the log at `path`. Safe to call on an existing database.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Ok(Self {
            conn: crate::db::open_database(path)?,
        })
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Ok(Self {
            conn: crate::db::open_memory_database()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Insert one turn. Returns the new row id.
    pub fn log_turn(&self, entry: &MemoryEntry, entities: &[String]) -> Result<i64> {
        let metadata = TurnMetadata {
            tags: entry.tags.clone(),
            sentiment: entry.sentiment,
            entities: entities.to_vec(),
            conversation_id: entry.conversation_id.clone(),
            turn_id: entry.turn_id.clone(),
        };
        let metadata_json = serde_json::to_string(&metadata)?;

        self.conn.execute(
            "INSERT INTO conversations (timestamp, user_text, bot_text, metadata) VALUES (?1, ?2, ?3, ?4)",
            params![entry.timestamp, entry.user_text, entry.bot_text, metadata_json],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// The `limit` newest turns, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<ConversationRecord>> {
        self.query(
            "SELECT id, timestamp, user_text, bot_text, metadata FROM conversations \
             ORDER BY timestamp DESC, id DESC LIMIT ?1",
            params![limit as i64],
        )
    }

    /// Turns whose user or bot text contains `needle`.
    pub fn search(&self, needle: &str) -> Result<Vec<ConversationRecord>> {
        let pattern = format!("%{}%", escape_like(needle));
        self.query(
            "SELECT id, timestamp, user_text, bot_text, metadata FROM conversations \
             WHERE user_text LIKE ?1 ESCAPE '\\' OR bot_text LIKE ?1 ESCAPE '\\' \
             ORDER BY timestamp DESC, id DESC",
            params![pattern],
        )
    }

    pub fn count(&self) -> Result<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Oldest and newest turn timestamps.
    pub fn time_range(&self) -> Result<(Option<String>, Option<String>)> {
        Ok(self.conn.query_row(
            "SELECT MIN(timestamp), MAX(timestamp) FROM conversations",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?)
    }

    /// Delete every row. Only used by an explicit reset.
    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM conversations", [])?;
        Ok(())
    }

    fn query(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<ConversationRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, |row| {
                let metadata: Option<String> = row.get(4)?;
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    metadata,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows
            .into_iter()
            .map(|(id, timestamp, user_text, bot_text, metadata)| {
                let metadata = match metadata {
                    Some(raw) => parse_metadata(id, &raw).unwrap_or_else(|e| {
                        tracing::warn!(row = id, error = %e, "metadata unreadable, using defaults");
                        TurnMetadata::default()
                    }),
                    None => TurnMetadata::default(),
                };
                ConversationRecord {
                    id,
                    timestamp,
                    user_text,
                    bot_text,
                    metadata,
                }
            })
            .collect())
    }
}

fn parse_metadata(id: i64, raw: &str) -> Result<TurnMetadata> {
    serde_json::from_str(raw).map_err(|e| MemoryError::MalformedEntryField {
        field: format!("conversations.metadata (row {id})"),
        reason: e.to_string(),
    })
}

/// Escape LIKE wildcards so the needle matches literally.
fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
