//! CLI `add` and `context` commands: write a turn, or retrieve context for a
//! message, through the full memory manager.

use anyhow::Result;
use std::sync::Arc;

use lyra::config::LyraConfig;
use lyra::memory::types::NewTurn;

/// Record one turn and report which stores accepted it.
pub async fn add(
    config: LyraConfig,
    user: String,
    bot: String,
    tags: Vec<String>,
    conversation: Option<String>,
) -> Result<()> {
    let manager = crate::server::build_manager(config).await?;

    let mut turn = NewTurn::new(user, bot).with_tags(tags.as_slice());
    if let Some(id) = conversation {
        turn = turn.in_conversation(id);
    }

    let m = Arc::clone(&manager);
    let outcome = tokio::task::spawn_blocking(move || m.record_turn(turn)).await??;

    println!("Recorded turn {}", outcome.turn_id);
    if let Some(ordinal) = outcome.ordinal {
        println!("  vector store:    #{ordinal}");
    }
    if outcome.history_logged {
        println!("  history:         ok");
    }
    if let Some(row_id) = outcome.row_id {
        println!("  relational log:  row {row_id}");
    }
    for failure in &outcome.failures {
        println!("  WARNING: {failure}");
    }
    Ok(())
}

/// Print ranked context and its summary for `query`.
pub async fn context(config: LyraConfig, query: String, k: Option<usize>, json: bool) -> Result<()> {
    let k = k.unwrap_or(config.retrieval.default_k);
    let manager = crate::server::build_manager(config).await?;

    let bundle = tokio::task::spawn_blocking(move || manager.get_context(&query, k)).await??;

    if json {
        println!("{}", serde_json::to_string_pretty(&bundle)?);
        return Ok(());
    }

    println!("Summary: {}\n", bundle.summary);
    for (i, result) in bundle.context.iter().enumerate() {
        let age = result
            .age_hours
            .map_or_else(|| "age unknown".to_string(), |h| format!("{h:.1}h ago"));
        println!(
            "  {}. (score: {:.4}, {}) {}",
            i + 1,
            result.score,
            age,
            super::preview(&result.entry.user_text, 100)
        );
        println!("     -> {}", super::preview(&result.entry.bot_text, 100));
        if !result.entry.tags.is_empty() {
            println!("     tags: {}", result.entry.tags.join(", "));
        }
    }
    Ok(())
}
