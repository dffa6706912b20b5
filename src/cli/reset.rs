//! CLI `reset` command: clear every memory store after user confirmation.

use anyhow::{bail, Result};
use std::io::Write;

use lyra::config::LyraConfig;
use lyra::memory::manager::MemoryStores;

/// Clear all three stores after user confirmation.
pub fn reset(config: &LyraConfig, yes: bool) -> Result<()> {
    if !yes {
        println!("WARNING: This will permanently delete ALL remembered conversations.");
        println!("Relational log:  {}", config.resolved_db_path().display());
        println!("Vector index:    {}", config.resolved_index_path().display());
        println!("History:         {}", config.resolved_history_path().display());
        print!("\nType YES to confirm: ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim() != "YES" {
            bail!("reset cancelled");
        }
    }

    let mut stores = MemoryStores::open(config);
    stores.clear_all()?;

    println!("All memory stores cleared.");
    Ok(())
}
