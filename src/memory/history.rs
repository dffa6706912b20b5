//! Append-only conversation history as a JSON array on disk.
//!
//! The whole file is loaded at open, appended to in memory, and rewritten on
//! every save. A missing or unparsable file is treated as an empty history.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use super::types::MemoryEntry;
use crate::error::Result;

pub struct HistoryLog {
    path: PathBuf,
    entries: Vec<MemoryEntry>,
}

impl HistoryLog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(raw) => match serde_json::from_slice::<Vec<MemoryEntry>>(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    error!(path = %path.display(), error = %e, "history corrupt, starting empty");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no history file, starting empty");
                Vec::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "history unreadable, starting empty");
                Vec::new()
            }
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append and rewrite the file. The entry stays in memory even if the
    /// save fails.
    pub fn append(&mut self, entry: MemoryEntry) -> Result<()> {
        self.entries.push(entry);
        self.save()
    }

    pub fn save(&self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.entries)?;
        super::write_atomic(&self.path, &bytes)?;
        debug!(path = %self.path.display(), count = self.entries.len(), "history saved");
        Ok(())
    }

    pub fn all(&self) -> &[MemoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries carrying exactly `tag`, in insertion order.
    pub fn by_tag(&self, tag: &str) -> Vec<MemoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.has_tag(tag))
            .cloned()
            .collect()
    }

    /// The `n` newest entries by timestamp, newest first. Entries with an
    /// unparsable timestamp sort last.
    pub fn recent(&self, n: usize) -> Vec<MemoryEntry> {
        let mut sorted: Vec<&MemoryEntry> = self.entries.iter().collect();
        sorted.sort_by_key(|e| std::cmp::Reverse(e.parsed_timestamp()));
        sorted.into_iter().take(n).cloned().collect()
    }

    /// Forget everything and rewrite the file. Only used by an explicit reset.
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.save()
    }
}
