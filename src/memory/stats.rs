use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use super::manager::MemoryStores;
use super::types::MemoryEntry;

/// Response from memory_stats.
#[derive(Debug, Default, Serialize)]
pub struct MemoryStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<VectorStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<HistoryStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relational: Option<RelationalStats>,
}

#[derive(Debug, Serialize)]
pub struct VectorStats {
    pub count: usize,
    pub dimension: usize,
    /// Every vector has exactly one metadata record.
    pub aligned: bool,
    pub index_size_bytes: u64,
}

#[derive(Debug, Serialize)]
pub struct HistoryStats {
    pub count: usize,
    pub by_tag: BTreeMap<String, u64>,
    pub conversations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_turn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_turn: Option<String>,
    pub file_size_bytes: u64,
}

#[derive(Debug, Serialize)]
pub struct RelationalStats {
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_turn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_turn: Option<String>,
    pub db_size_bytes: u64,
}

impl MemoryStats {
    /// Gather statistics from every enabled store. A store whose counts
    /// cannot be read is reported as absent.
    pub fn collect(stores: &MemoryStores) -> Self {
        let vector = stores.vectors.as_ref().map(|v| VectorStats {
            count: v.len(),
            dimension: v.dimension(),
            aligned: v.is_aligned(),
            index_size_bytes: v.path().map_or(0, file_size),
        });

        let history = stores.history.as_ref().map(|h| {
            let entries = h.all();
            let (oldest_turn, newest_turn) = time_range(entries);
            HistoryStats {
                count: entries.len(),
                by_tag: tag_histogram(entries),
                conversations: entries
                    .iter()
                    .map(|e| e.conversation_id.as_str())
                    .collect::<BTreeSet<_>>()
                    .len(),
                oldest_turn,
                newest_turn,
                file_size_bytes: file_size(h.path()),
            }
        });

        let relational = stores.conversations.as_ref().and_then(|log| {
            let count = log
                .count()
                .map_err(|e| tracing::warn!(error = %e, "relational stats unavailable"))
                .ok()?;
            let (oldest_turn, newest_turn) = log.time_range().unwrap_or_default();
            Some(RelationalStats {
                count,
                oldest_turn,
                newest_turn,
                db_size_bytes: log.connection().path().map_or(0, |p| file_size(Path::new(p))),
            })
        });

        Self {
            vector,
            history,
            relational,
        }
    }
}

/// Count entries per tag.
fn tag_histogram(entries: &[MemoryEntry]) -> BTreeMap<String, u64> {
    let mut map = BTreeMap::new();
    for tag in entries.iter().flat_map(|e| e.tags.iter()) {
        *map.entry(tag.clone()).or_insert(0) += 1;
    }
    map
}

/// Oldest and newest parsable timestamps, as stored.
fn time_range(entries: &[MemoryEntry]) -> (Option<String>, Option<String>) {
    let parsed: Vec<_> = entries
        .iter()
        .filter_map(|e| e.parsed_timestamp().map(|t| (t, &e.timestamp)))
        .collect();
    let oldest = parsed.iter().min_by_key(|(t, _)| *t).map(|(_, raw)| (*raw).clone());
    let newest = parsed.iter().max_by_key(|(t, _)| *t).map(|(_, raw)| (*raw).clone());
    (oldest, newest)
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
