//! CLI `recent`, `search` and `tagged` commands. These read the logs directly
//! and never load the embedding model.

use anyhow::{Context, Result};

use lyra::config::LyraConfig;
use lyra::memory::conversation_log::{ConversationLog, ConversationRecord};
use lyra::memory::history::HistoryLog;

fn open_log(config: &LyraConfig) -> Result<ConversationLog> {
    let db_path = config.resolved_db_path();
    ConversationLog::open(&db_path)
        .with_context(|| format!("failed to open conversation log at {}", db_path.display()))
}

fn print_records(records: &[ConversationRecord]) {
    if records.is_empty() {
        println!("No conversations found.");
        return;
    }
    for record in records {
        println!("[{}] #{} ({})", record.timestamp, record.id, record.metadata.conversation_id);
        println!("  User: {}", super::preview(&record.user_text, 120));
        println!("  Bot:  {}", super::preview(&record.bot_text, 120));
        if !record.metadata.tags.is_empty() {
            println!("  tags: {}", record.metadata.tags.join(", "));
        }
    }
}

/// Newest turns from the relational log.
pub fn recent(config: &LyraConfig, limit: usize) -> Result<()> {
    let log = open_log(config)?;
    print_records(&log.recent(limit)?);
    Ok(())
}

/// Literal text search over the relational log.
pub fn search(config: &LyraConfig, text: &str) -> Result<()> {
    let log = open_log(config)?;
    let records = log.search(text)?;
    println!("Found {} turn(s)\n", records.len());
    print_records(&records);
    Ok(())
}

/// History entries carrying `tag`.
pub fn tagged(config: &LyraConfig, tag: &str) -> Result<()> {
    let history = HistoryLog::open(config.resolved_history_path());
    let entries = history.by_tag(tag);
    if entries.is_empty() {
        println!("No turns tagged '{tag}'.");
        return Ok(());
    }
    for entry in entries {
        println!("[{}] {}", entry.timestamp, super::preview(&entry.user_text, 120));
        println!("  -> {}", super::preview(&entry.bot_text, 120));
    }
    Ok(())
}
