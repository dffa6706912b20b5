mod helpers;

use std::sync::Arc;

use helpers::*;
use lyra::error::MemoryError;
use lyra::memory::manager::{CombinedMemoryManager, ManagerOptions, MemoryStores, SUMMARY_FALLBACK};
use lyra::memory::vector_store::VectorStore;
use tempfile::TempDir;

#[test]
fn relational_failure_does_not_block_other_stores() {
    let tmp = TempDir::new().unwrap();
    let stores = memory_stores(tmp.path());
    stores
        .conversations
        .as_ref()
        .unwrap()
        .connection()
        .pragma_update(None, "query_only", true)
        .unwrap();
    let manager = manager_with(stores, hashed(), digest(), ManagerOptions::default());

    let outcome = manager
        .add_memory("I love hiking", "That's great, tell me more!", None, None)
        .unwrap();

    assert!(outcome.row_id.is_none());
    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0].starts_with("relational log"));
    assert!(outcome.history_logged);
    assert_eq!(outcome.ordinal, Some(0));

    let stores = manager.lock_stores();
    assert_eq!(stores.vectors.as_ref().unwrap().len(), 1);
    assert_eq!(stores.history.as_ref().unwrap().len(), 1);
    assert_eq!(stores.conversations.as_ref().unwrap().count().unwrap(), 0);
    drop(stores);

    let bundle = manager.get_context("hiking", 5).unwrap();
    assert_eq!(users(&bundle.context), vec!["I love hiking"]);
}

#[test]
fn history_failure_does_not_block_other_stores() {
    let tmp = TempDir::new().unwrap();
    // A directory where the history file should be makes every save fail.
    let blocked = tmp.path().join("history.json");
    std::fs::create_dir_all(&blocked).unwrap();

    let manager = manager_with(
        memory_stores(tmp.path()),
        hashed(),
        digest(),
        ManagerOptions::default(),
    );
    let outcome = manager.add_memory("cats", "meow", None, None).unwrap();

    assert!(!outcome.history_logged);
    assert!(outcome.failures.iter().any(|f| f.starts_with("history")));
    assert!(outcome.row_id.is_some());
    assert_eq!(outcome.ordinal, Some(0));
}

#[test]
fn summarizer_failure_uses_fallback() {
    let tmp = TempDir::new().unwrap();
    let manager = manager_with(
        memory_stores(tmp.path()),
        hashed(),
        Arc::new(FailingSummarizer),
        ManagerOptions::default(),
    );
    manager.add_memory("I love hiking", "Great!", None, None).unwrap();

    let bundle = manager.get_context("hiking", 5).unwrap();
    assert_eq!(bundle.summary, SUMMARY_FALLBACK);
    assert_eq!(users(&bundle.context), vec!["I love hiking"]);
}

#[test]
fn embedding_failure_stores_zero_vector() {
    let tmp = TempDir::new().unwrap();
    let manager = manager_with(
        memory_stores(tmp.path()),
        Arc::new(FailingEmbedder),
        digest(),
        ManagerOptions::default(),
    );

    let outcome = manager.add_memory("I love hiking", "Great!", None, None).unwrap();
    assert_eq!(outcome.ordinal, Some(0));
    assert!(outcome.failures.iter().any(|f| f.starts_with("embedding")));

    let stores = manager.lock_stores();
    let vectors = stores.vectors.as_ref().unwrap();
    assert!(vectors.vector(0).unwrap().iter().all(|x| *x == 0.0));
    assert!(vectors.is_aligned());
    drop(stores);

    // The query cannot be embedded either; that degrades to no context.
    let bundle = manager.get_context("hiking", 5).unwrap();
    assert!(bundle.context.is_empty());
}

#[test]
fn wrong_width_embedding_is_rejected_before_any_write() {
    let tmp = TempDir::new().unwrap();
    let manager = manager_with(
        memory_stores(tmp.path()),
        Arc::new(LyingEmbedder),
        digest(),
        ManagerOptions::default(),
    );

    let err = manager.add_memory("hi", "hello", None, None).unwrap_err();
    assert!(matches!(
        err,
        MemoryError::DimensionMismatch {
            expected: DIM,
            actual
        } if actual == DIM / 2
    ));

    let stores = manager.lock_stores();
    assert_eq!(stores.vectors.as_ref().unwrap().len(), 0);
    assert_eq!(stores.history.as_ref().unwrap().len(), 0);
    assert_eq!(stores.conversations.as_ref().unwrap().count().unwrap(), 0);
}

#[test]
fn embedder_and_index_width_must_agree() {
    let stores = MemoryStores {
        vectors: Some(VectorStore::new(DIM * 2)),
        ..Default::default()
    };
    let result = CombinedMemoryManager::new(stores, hashed(), digest(), ManagerOptions::default());
    assert!(matches!(result, Err(MemoryError::DimensionMismatch { .. })));
}

#[test]
fn corrupt_index_starts_empty() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    std::fs::write(config.resolved_index_path(), b"definitely not an index").unwrap();

    let manager = CombinedMemoryManager::from_config(&config).unwrap();
    assert_eq!(manager.stats().vector.unwrap().count, 0);

    manager.add_memory("I love hiking", "Great!", None, None).unwrap();
    drop(manager);

    let manager = disk_manager(tmp.path());
    assert_eq!(manager.stats().vector.unwrap().count, 1);
}

#[test]
fn corrupt_history_starts_empty() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    std::fs::write(config.resolved_history_path(), "[{ broken").unwrap();

    let manager = CombinedMemoryManager::from_config(&config).unwrap();
    let outcome = manager.add_memory("cats", "meow", None, None).unwrap();
    assert!(outcome.history_logged);
    assert_eq!(manager.stats().history.unwrap().count, 1);
}

#[test]
fn concurrent_writers_are_serialized() {
    let tmp = TempDir::new().unwrap();
    let manager = Arc::new(manager_with(
        memory_stores(tmp.path()),
        hashed(),
        digest(),
        ManagerOptions::default(),
    ));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let manager = Arc::clone(&manager);
            std::thread::spawn(move || {
                manager
                    .add_memory(&format!("turn {i}"), "ok", None, None)
                    .unwrap()
            })
        })
        .collect();

    let mut ordinals: Vec<usize> = handles
        .into_iter()
        .map(|h| h.join().unwrap().ordinal.unwrap())
        .collect();
    ordinals.sort_unstable();
    assert_eq!(ordinals, (0..8).collect::<Vec<_>>());

    let stores = manager.lock_stores();
    assert!(stores.vectors.as_ref().unwrap().is_aligned());
    assert_eq!(stores.history.as_ref().unwrap().len(), 8);
    assert_eq!(stores.conversations.as_ref().unwrap().count().unwrap(), 8);
}
