#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Utc};
use lyra::config::LyraConfig;
use lyra::embedding::hashed::HashedEmbeddingProvider;
use lyra::embedding::EmbeddingProvider;
use lyra::memory::conversation_log::ConversationLog;
use lyra::memory::history::HistoryLog;
use lyra::memory::manager::{CombinedMemoryManager, ManagerOptions, MemoryStores};
use lyra::memory::types::MemoryEntry;
use lyra::memory::vector_store::VectorStore;
use lyra::summary::digest::DigestSummarizer;
use lyra::summary::SummaryProvider;

pub const DIM: usize = 384;

/// Config with every artifact under `dir`, the hashed embedder and the
/// digest summarizer.
pub fn test_config(dir: &Path) -> LyraConfig {
    let path = |name: &str| dir.join(name).to_string_lossy().into_owned();
    let mut config = LyraConfig::default();
    config.storage.db_path = path("conversation_history.db");
    config.storage.index_path = path("vector_index.bin");
    config.storage.history_path = path("conversation_history.json");
    config.embedding.provider = "hashed".into();
    config.embedding.dimension = DIM;
    config.summary.provider = "digest".into();
    config
}

/// A fully on-disk manager rooted at `dir`.
pub fn disk_manager(dir: &Path) -> CombinedMemoryManager {
    CombinedMemoryManager::from_config(&test_config(dir)).unwrap()
}

/// In-memory vector store and relational log, history under `dir`.
pub fn memory_stores(dir: &Path) -> MemoryStores {
    MemoryStores {
        vectors: Some(VectorStore::new(DIM)),
        history: Some(HistoryLog::open(dir.join("history.json"))),
        conversations: Some(ConversationLog::open_in_memory().unwrap()),
    }
}

pub fn manager_with(
    stores: MemoryStores,
    embedder: Arc<dyn EmbeddingProvider>,
    summarizer: Arc<dyn SummaryProvider>,
    options: ManagerOptions,
) -> CombinedMemoryManager {
    CombinedMemoryManager::new(stores, embedder, summarizer, options).unwrap()
}

pub fn hashed() -> Arc<dyn EmbeddingProvider> {
    Arc::new(HashedEmbeddingProvider::new(DIM))
}

pub fn digest() -> Arc<dyn SummaryProvider> {
    Arc::new(DigestSummarizer::default())
}

/// An entry as it would have been recorded `hours_ago`.
pub fn aged_entry(user: &str, bot: &str, hours_ago: i64, tags: &[&str]) -> MemoryEntry {
    MemoryEntry {
        turn_id: uuid::Uuid::now_v7().to_string(),
        user_text: user.into(),
        bot_text: bot.into(),
        timestamp: (Utc::now() - Duration::hours(hours_ago)).to_rfc3339(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        conversation_id: "default".into(),
        ..Default::default()
    }
}

/// A vector store pre-filled with `entries`, embedded the way the manager
/// embeds them.
pub fn seeded_vectors(entries: Vec<MemoryEntry>) -> VectorStore {
    let embedder = HashedEmbeddingProvider::new(DIM);
    let mut store = VectorStore::new(DIM);
    for entry in entries {
        let embedding = embedder.embed(&entry.embedding_text()).unwrap();
        store.add(&embedding, entry).unwrap();
    }
    store
}

pub struct FailingSummarizer;

impl SummaryProvider for FailingSummarizer {
    fn summarize(&self, _prompt: &str) -> anyhow::Result<String> {
        anyhow::bail!("summarizer offline")
    }

    fn name(&self) -> &str {
        "failing"
    }
}

pub struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("model not loaded")
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

/// Claims `DIM` but returns vectors of another width.
pub struct LyingEmbedder;

impl EmbeddingProvider for LyingEmbedder {
    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(vec![0.5; DIM / 2])
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "lying"
    }
}

/// User texts of a context, in order.
pub fn users(results: &[lyra::memory::types::RetrievalResult]) -> Vec<String> {
    results.iter().map(|r| r.entry.user_text.clone()).collect()
}
