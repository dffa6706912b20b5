use anyhow::Result;

use lyra::config::LyraConfig;
use lyra::memory::manager::MemoryStores;
use lyra::memory::stats::MemoryStats;

/// Display memory statistics in the terminal.
pub fn stats(config: &LyraConfig, json: bool) -> Result<()> {
    let stores = MemoryStores::open(config);
    let stats = MemoryStats::collect(&stores);

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Memory Statistics");
    println!("{}", "=".repeat(40));

    match &stats.vector {
        Some(v) => {
            println!("Vector store:");
            println!("  Vectors:             {}", v.count);
            println!("  Dimension:           {}", v.dimension);
            println!("  Aligned:             {}", if v.aligned { "yes" } else { "NO" });
            println!("  Index size:          {}", super::doctor::format_bytes(v.index_size_bytes));
        }
        None => println!("Vector store:          disabled"),
    }
    println!();

    match &stats.history {
        Some(h) => {
            println!("History:");
            println!("  Turns:               {}", h.count);
            println!("  Conversations:       {}", h.conversations);
            if let Some(ref oldest) = h.oldest_turn {
                println!("  Oldest turn:         {oldest}");
            }
            if let Some(ref newest) = h.newest_turn {
                println!("  Newest turn:         {newest}");
            }
            if !h.by_tag.is_empty() {
                println!("  By tag:");
                for (tag, count) in &h.by_tag {
                    println!("    {:<16} {}", tag, count);
                }
            }
        }
        None => println!("History:               disabled"),
    }
    println!();

    match &stats.relational {
        Some(r) => {
            println!("Relational log:");
            println!("  Rows:                {}", r.count);
            println!("  Database size:       {}", super::doctor::format_bytes(r.db_size_bytes));
        }
        None => println!("Relational log:        unavailable"),
    }

    Ok(())
}
