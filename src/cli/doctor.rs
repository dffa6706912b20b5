//! CLI `doctor` command: check every store and print a health report.

use anyhow::{Context, Result};

use lyra::config::LyraConfig;
use lyra::db;
use lyra::memory::history::HistoryLog;
use lyra::memory::vector_store::VectorStore;

/// Run diagnostics on all three stores and print a health report.
pub fn doctor(config: &LyraConfig) -> Result<()> {
    println!("Lyra Health Report");
    println!("==================");
    println!();

    relational_report(config)?;
    println!();
    vector_report(config);
    println!();

    let history_path = config.resolved_history_path();
    if history_path.exists() {
        let history = HistoryLog::open(&history_path);
        println!("History:           {}", history_path.display());
        println!("  Turns:           {}", history.len());
        println!("  File size:       {}", format_bytes(file_size(&history_path)));
    } else {
        println!("History:           not found at {}", history_path.display());
    }

    Ok(())
}

fn relational_report(config: &LyraConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Relational log:    not found at {}", db_path.display());
        println!("Run `lyra add` or `lyra serve` to initialize.");
        return Ok(());
    }

    let conn = db::open_database(&db_path)
        .context("failed to open database (may be corrupt)")?;

    let report = db::check_database_health(&conn)
        .context("failed to run health check")?;

    println!("Relational log:    {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size(&db_path)));
    println!("Schema version:    {}", report.schema_version);
    println!("Rows:              {}", report.conversation_count);
    println!("Join format:       {}", report.join_format.as_deref().unwrap_or("(not set)"));
    println!();
    let configured = match config.embedding.provider.as_str() {
        "hashed" => "hashed",
        _ => config.embedding.model.as_str(),
    };
    println!("Embedding model:");
    println!("  Stored:          {}", report.embedding_model.as_deref().unwrap_or("(not set)"));
    println!("  Configured:      {configured}");
    if let Some(ref stored) = report.embedding_model {
        if stored != configured {
            println!("  WARNING: model mismatch! Stored vectors are not comparable; run `lyra reset`.");
        } else {
            println!("  Status:          OK");
        }
    }
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup: cp backup.db {}", db_path.display());
        println!("  2. Or start over: lyra reset");
    }
    Ok(())
}

fn vector_report(config: &LyraConfig) {
    let index_path = config.resolved_index_path();
    if !index_path.exists() {
        println!("Vector index:      not found at {}", index_path.display());
        return;
    }

    println!("Vector index:      {}", index_path.display());
    println!("File size:         {}", format_bytes(file_size(&index_path)));
    match VectorStore::try_restore(&index_path, config.embedding.dimension) {
        Ok(store) => {
            println!("  Vectors:         {}", store.len());
            println!("  Dimension:       {}", store.dimension());
            if store.is_aligned() {
                println!("  Alignment:       OK");
            } else {
                println!("  Alignment:       FAILED (vectors and metadata differ)");
            }
            if !VectorStore::metadata_path(&index_path).exists() {
                println!("  WARNING: metadata sidecar missing; entries are placeholders.");
            }
        }
        Err(e) => {
            println!("  Restore:         FAILED ({e})");
            println!("  The server will start with an empty index; run `lyra reset` to rebuild.");
        }
    }
}

fn file_size(path: &std::path::Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
