//! The combined memory manager.
//!
//! One entry point for writing and reading conversation memory. A write fans
//! out to the JSON history, the relational log and the vector store, each in
//! its own failure boundary. A read embeds the query, searches the vector
//! store, rescores by recency, collapses duplicates and asks the summarizer
//! for a digest.
//!
//! All operations are synchronous and serialized by an operation gate, so a
//! read started after a write returns always observes that write.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use chrono::Utc;
use tracing::{debug, info, warn};

use super::conversation_log::{ConversationLog, ConversationRecord};
use super::history::HistoryLog;
use super::ranking;
use super::stats::MemoryStats;
use super::types::{
    normalize_tags, ContextBundle, MemoryEntry, NewTurn, RetrievalResult, Sentiment, WriteOutcome,
};
use super::vector_store::VectorStore;
use crate::config::{DedupPolicy, LyraConfig, RetrievalConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::{MemoryError, Result};
use crate::summary::SummaryProvider;

pub const NO_CONTEXT_SUMMARY: &str = "No relevant context found.";
pub const SUMMARY_FALLBACK: &str = "Could not generate summary.";

/// The three backing stores. A `None` store is disabled and is skipped by
/// every operation.
#[derive(Default)]
pub struct MemoryStores {
    pub vectors: Option<VectorStore>,
    pub history: Option<HistoryLog>,
    pub conversations: Option<ConversationLog>,
}

impl MemoryStores {
    /// Open every store enabled in `config`. The vector store and history
    /// recover from bad files on their own; a relational log that cannot be
    /// opened is left disabled.
    pub fn open(config: &LyraConfig) -> Self {
        let storage = &config.storage;

        let vectors = storage
            .use_vector
            .then(|| VectorStore::open(config.resolved_index_path(), config.embedding.dimension));

        let history = storage
            .use_history
            .then(|| HistoryLog::open(config.resolved_history_path()));

        let conversations = if storage.use_sql {
            let db_path = config.resolved_db_path();
            match ConversationLog::open(&db_path) {
                Ok(log) => Some(log),
                Err(e) => {
                    warn!(
                        path = %db_path.display(),
                        error = %format!("{e:#}"),
                        "relational log unavailable, continuing without it"
                    );
                    None
                }
            }
        } else {
            None
        };

        Self {
            vectors,
            history,
            conversations,
        }
    }

    /// Empty every enabled store and write the empty state to disk.
    pub fn clear_all(&mut self) -> Result<()> {
        if let Some(vectors) = self.vectors.as_mut() {
            vectors.clear();
            vectors.persist()?;
        }
        if let Some(history) = self.history.as_mut() {
            history.clear()?;
        }
        if let Some(log) = self.conversations.as_ref() {
            log.clear()?;
        }
        info!("all memory stores reset");
        Ok(())
    }
}

/// Tunables for [`CombinedMemoryManager`] that do not belong to a store.
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    pub retrieval: RetrievalConfig,
    pub default_conversation: String,
    /// Persist the vector index after every write.
    pub autosave: bool,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            default_conversation: "default".into(),
            autosave: true,
        }
    }
}

impl From<&LyraConfig> for ManagerOptions {
    fn from(config: &LyraConfig) -> Self {
        Self {
            retrieval: config.retrieval.clone(),
            default_conversation: config.storage.default_conversation.clone(),
            autosave: config.storage.autosave,
        }
    }
}

pub struct CombinedMemoryManager {
    gate: Mutex<()>,
    stores: Mutex<MemoryStores>,
    embedder: Arc<dyn EmbeddingProvider>,
    summarizer: Arc<dyn SummaryProvider>,
    options: ManagerOptions,
}

impl CombinedMemoryManager {
    /// Fails only when the embedder and the vector store disagree on width.
    pub fn new(
        stores: MemoryStores,
        embedder: Arc<dyn EmbeddingProvider>,
        summarizer: Arc<dyn SummaryProvider>,
        options: ManagerOptions,
    ) -> Result<Self> {
        if let Some(vectors) = &stores.vectors {
            if vectors.dimension() != embedder.dimensions() {
                return Err(MemoryError::DimensionMismatch {
                    expected: vectors.dimension(),
                    actual: embedder.dimensions(),
                });
            }
        }

        Ok(Self {
            gate: Mutex::new(()),
            stores: Mutex::new(stores),
            embedder,
            summarizer,
            options,
        })
    }

    /// Build providers and open stores from configuration.
    pub fn from_config(config: &LyraConfig) -> anyhow::Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::from(crate::embedding::create_provider(&config.embedding)?);
        let summarizer: Arc<dyn SummaryProvider> =
            Arc::from(crate::summary::create_provider(&config.summary)?);

        let stores = MemoryStores::open(config);
        if let Some(log) = &stores.conversations {
            check_embedding_model(log, embedder.model_name());
        }

        info!(
            embedder = embedder.model_name(),
            summarizer = summarizer.name(),
            vectors = ?stores.vectors.as_ref().map(VectorStore::len),
            "memory manager ready"
        );

        Self::new(stores, embedder, summarizer, ManagerOptions::from(config))
            .context("embedding provider does not match the vector index")
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    /// Record one completed turn in every enabled store.
    pub fn add_memory(
        &self,
        user_text: &str,
        bot_text: &str,
        tags: Option<&[String]>,
        conversation_id: Option<&str>,
    ) -> Result<WriteOutcome> {
        let mut turn = NewTurn::new(user_text, bot_text);
        if let Some(tags) = tags {
            turn = turn.with_tags(tags);
        }
        if let Some(id) = conversation_id {
            turn = turn.in_conversation(id);
        }
        self.record_turn(turn)
    }

    /// [`add_memory`](Self::add_memory) with sentiment and entities.
    ///
    /// Store failures are logged and listed in the outcome. The only error is
    /// an embedding of the wrong width, raised before anything is written.
    pub fn record_turn(&self, turn: NewTurn) -> Result<WriteOutcome> {
        let _op = self.lock_gate();

        let conversation_id = turn
            .conversation_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| self.options.default_conversation.clone());

        let entry = MemoryEntry {
            turn_id: uuid::Uuid::now_v7().to_string(),
            user_text: turn.user_text,
            bot_text: turn.bot_text,
            timestamp: Utc::now().to_rfc3339(),
            tags: normalize_tags(&turn.tags),
            sentiment: turn.sentiment.unwrap_or(Sentiment::NEUTRAL).normalized(),
            conversation_id,
            embedding_ref: None,
        };

        let mut outcome = WriteOutcome {
            turn_id: entry.turn_id.clone(),
            ..Default::default()
        };

        let mut stores = self.lock_stores();
        let expected = stores
            .vectors
            .as_ref()
            .map_or_else(|| self.embedder.dimensions(), VectorStore::dimension);

        let embedding = if stores.vectors.is_some() {
            let embedding = match self.embedder.embed(&entry.embedding_text()) {
                Ok(v) => v,
                Err(e) => {
                    warn!(turn_id = %entry.turn_id, error = %format!("{e:#}"), "embedding failed, storing zero vector");
                    outcome.failures.push(format!("embedding: {e:#}"));
                    vec![0.0; expected]
                }
            };
            if embedding.len() != expected {
                return Err(MemoryError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
            Some(embedding)
        } else {
            None
        };

        if let Some(history) = stores.history.as_mut() {
            match history.append(entry.clone()) {
                Ok(()) => outcome.history_logged = true,
                Err(e) => {
                    warn!(turn_id = %entry.turn_id, error = %e, "history write failed");
                    outcome.failures.push(format!("history: {e}"));
                }
            }
        }

        if let Some(log) = stores.conversations.as_ref() {
            match log.log_turn(&entry, &turn.entities) {
                Ok(row_id) => outcome.row_id = Some(row_id),
                Err(e) => {
                    warn!(turn_id = %entry.turn_id, error = %e, "relational log write failed");
                    outcome.failures.push(format!("relational log: {e}"));
                }
            }
        }

        if let (Some(vectors), Some(embedding)) = (stores.vectors.as_mut(), embedding) {
            match vectors.add(&embedding, entry.clone()) {
                Ok(ordinal) => {
                    outcome.ordinal = Some(ordinal);
                    if self.options.autosave {
                        if let Err(e) = vectors.persist() {
                            warn!(error = %e, "vector index autosave failed");
                            outcome.failures.push(format!("vector persist: {e}"));
                        }
                    }
                }
                Err(e) => {
                    warn!(turn_id = %entry.turn_id, error = %e, "vector store write failed");
                    outcome.failures.push(format!("vector store: {e}"));
                }
            }
        }

        info!(
            turn_id = %outcome.turn_id,
            conversation = %entry.conversation_id,
            tags = ?entry.tags,
            ordinal = ?outcome.ordinal,
            row_id = ?outcome.row_id,
            failures = outcome.failures.len(),
            "memory recorded"
        );
        Ok(outcome)
    }

    /// Ranked, deduplicated past turns relevant to `query`, plus a summary.
    pub fn get_context(&self, query: &str, k: usize) -> Result<ContextBundle> {
        let _op = self.lock_gate();

        let candidates = {
            let stores = self.lock_stores();
            let Some(vectors) = stores.vectors.as_ref() else {
                debug!("vector store disabled, no context");
                return Ok(no_context());
            };
            if vectors.is_empty() || k == 0 {
                return Ok(no_context());
            }

            let embedding = match self.embedder.embed(query) {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %format!("{e:#}"), "query embedding failed, no context");
                    return Ok(no_context());
                }
            };
            if embedding.len() != vectors.dimension() {
                return Err(MemoryError::DimensionMismatch {
                    expected: vectors.dimension(),
                    actual: embedding.len(),
                });
            }

            let (distances, entries) = match vectors.search(&embedding, k) {
                Ok(found) => found,
                Err(e) => {
                    warn!(error = %e, "vector search failed, no context");
                    return Ok(no_context());
                }
            };

            let keep_vectors = self.options.retrieval.dedup == DedupPolicy::Cosine;
            distances
                .into_iter()
                .zip(entries)
                .map(|(distance, entry)| {
                    let embedding = keep_vectors
                        .then(|| entry.embedding_ref.and_then(|i| vectors.vector(i)))
                        .flatten()
                        .map(<[f32]>::to_vec);
                    RetrievalResult {
                        embedding,
                        ..RetrievalResult::new(entry, ranking::similarity_from_distance(distance))
                    }
                })
                .collect::<Vec<_>>()
        };

        if candidates.is_empty() {
            return Ok(no_context());
        }

        let found = candidates.len();
        let ranked = ranking::apply_decay(candidates, Utc::now(), &self.options.retrieval);
        let context = ranking::collapse(ranked, &self.options.retrieval);
        debug!(query_len = query.len(), k, found, kept = context.len(), "context ranked");

        if context.is_empty() {
            return Ok(no_context());
        }

        let prompt = ranking::summary_prompt(&context);
        let summary = match self.summarizer.summarize(&prompt) {
            Ok(summary) => summary,
            Err(e) => {
                warn!(summarizer = self.summarizer.name(), error = %format!("{e:#}"), "summary failed, using fallback");
                SUMMARY_FALLBACK.to_string()
            }
        };

        Ok(ContextBundle { context, summary })
    }

    /// Write the vector index and its metadata to disk.
    pub fn persist(&self) -> Result<()> {
        let _op = self.lock_gate();
        let stores = self.lock_stores();
        if let Some(vectors) = stores.vectors.as_ref() {
            vectors.persist()?;
            info!(count = vectors.len(), "vector index persisted");
        }
        Ok(())
    }

    /// Clear every enabled store. The only deletion path.
    pub fn reset(&self) -> Result<()> {
        let _op = self.lock_gate();
        self.lock_stores().clear_all()
    }

    /// Newest turns from the relational log.
    pub fn recent_conversations(&self, limit: usize) -> Result<Vec<ConversationRecord>> {
        let stores = self.lock_stores();
        stores
            .conversations
            .as_ref()
            .ok_or_else(|| MemoryError::unavailable("relational log", "disabled"))?
            .recent(limit)
    }

    /// Relational-log turns containing `needle` on either side.
    pub fn search_conversations(&self, needle: &str) -> Result<Vec<ConversationRecord>> {
        let stores = self.lock_stores();
        stores
            .conversations
            .as_ref()
            .ok_or_else(|| MemoryError::unavailable("relational log", "disabled"))?
            .search(needle)
    }

    /// History entries carrying `tag`, oldest first.
    pub fn tagged(&self, tag: &str) -> Result<Vec<MemoryEntry>> {
        let stores = self.lock_stores();
        Ok(stores
            .history
            .as_ref()
            .ok_or_else(|| MemoryError::unavailable("history", "disabled"))?
            .by_tag(tag))
    }

    /// The `n` newest history entries, newest first.
    pub fn recent_history(&self, n: usize) -> Result<Vec<MemoryEntry>> {
        let stores = self.lock_stores();
        Ok(stores
            .history
            .as_ref()
            .ok_or_else(|| MemoryError::unavailable("history", "disabled"))?
            .recent(n))
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats::collect(&self.lock_stores())
    }

    /// Direct access to the stores, for maintenance and tests.
    pub fn lock_stores(&self) -> MutexGuard<'_, MemoryStores> {
        self.stores.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn no_context() -> ContextBundle {
    ContextBundle {
        context: Vec::new(),
        summary: NO_CONTEXT_SUMMARY.to_string(),
    }
}

/// Record the embedding model on first use; warn when it changes.
fn check_embedding_model(log: &ConversationLog, configured: &str) {
    match crate::db::migrations::get_embedding_model(log.connection()) {
        Ok(Some(stored)) if stored != configured => {
            warn!(
                stored = %stored,
                configured = %configured,
                "embedding model changed, existing vectors are not comparable (run `lyra reset`)"
            );
        }
        Ok(Some(_)) => {}
        Ok(None) => {
            if let Err(e) = crate::db::migrations::set_embedding_model(log.connection(), configured) {
                warn!(error = %e, "could not record embedding model");
            }
        }
        Err(e) => warn!(error = %e, "could not read embedding model"),
    }
}
