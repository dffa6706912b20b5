mod helpers;

use helpers::*;
use lyra::config::{DedupPolicy, RetrievalConfig};
use lyra::memory::manager::{ManagerOptions, MemoryStores};
use tempfile::TempDir;

fn manager_over(
    entries: Vec<lyra::memory::types::MemoryEntry>,
    retrieval: RetrievalConfig,
) -> lyra::memory::manager::CombinedMemoryManager {
    let stores = MemoryStores {
        vectors: Some(seeded_vectors(entries)),
        ..Default::default()
    };
    manager_with(
        stores,
        hashed(),
        digest(),
        ManagerOptions {
            retrieval,
            ..Default::default()
        },
    )
}

#[test]
fn recency_outweighs_stale_better_match() {
    // Raw similarity to "hiking": stale 0.5, fresh ~0.38.
    let manager = manager_over(
        vec![
            aged_entry("hiking", "yes", 20, &[]),
            aged_entry("hiking boots and gear", "nice", 0, &[]),
        ],
        RetrievalConfig::default(),
    );

    let bundle = manager.get_context("hiking", 5).unwrap();
    assert_eq!(users(&bundle.context), vec!["hiking boots and gear", "hiking"]);

    let stale = &bundle.context[1];
    assert!((stale.age_hours.unwrap() - 20.0).abs() < 0.1);
    assert!((stale.score - 0.5 / 6.0).abs() < 0.01, "score {}", stale.score);
}

#[test]
fn important_turns_never_decay() {
    let manager = manager_over(
        vec![
            aged_entry("hiking", "yes", 100, &["important"]),
            aged_entry("hiking boots and gear", "nice", 0, &[]),
        ],
        RetrievalConfig::default(),
    );

    let bundle = manager.get_context("hiking", 5).unwrap();
    assert_eq!(users(&bundle.context), vec!["hiking", "hiking boots and gear"]);
    assert!((bundle.context[0].score - 0.5).abs() < 1e-3);
}

#[test]
fn turns_older_than_window_score_zero() {
    let manager = manager_over(
        vec![aged_entry("hiking", "yes", 30, &[])],
        RetrievalConfig::default(),
    );
    let bundle = manager.get_context("hiking", 5).unwrap();
    assert_eq!(bundle.context.len(), 1);
    assert_eq!(bundle.context[0].score, 0.0);
}

#[test]
fn unparsable_timestamp_keeps_similarity() {
    let mut entry = aged_entry("hiking", "yes", 0, &[]);
    entry.timestamp = "sometime last week".into();
    let manager = manager_over(vec![entry], RetrievalConfig::default());

    let bundle = manager.get_context("hiking", 5).unwrap();
    assert_eq!(bundle.context.len(), 1);
    assert!(bundle.context[0].age_hours.is_none());
    assert!((bundle.context[0].score - 0.5).abs() < 1e-3);
}

#[test]
fn duplicate_user_text_collapses_to_first() {
    let tmp = TempDir::new().unwrap();
    let manager = manager_with(
        memory_stores(tmp.path()),
        hashed(),
        digest(),
        ManagerOptions::default(),
    );
    manager.add_memory("hi", "hello", None, None).unwrap();
    manager.add_memory("hi", "hello", None, None).unwrap();
    manager.add_memory("bye", "see you", None, None).unwrap();

    let bundle = manager.get_context("hi", 5).unwrap();
    assert_eq!(users(&bundle.context), vec!["hi", "bye"]);
}

#[test]
fn cosine_policy_merges_near_identical_turns() {
    let entries = || {
        vec![
            aged_entry("I like tea", "ok", 0, &[]),
            aged_entry("I like tea!", "ok", 0, &[]),
            aged_entry("Taxes are due", "ugh", 0, &[]),
        ]
    };

    let exact = manager_over(entries(), RetrievalConfig::default());
    assert_eq!(exact.get_context("tea", 5).unwrap().context.len(), 3);

    let cosine = manager_over(
        entries(),
        RetrievalConfig {
            dedup: DedupPolicy::Cosine,
            ..Default::default()
        },
    );
    let bundle = cosine.get_context("tea", 5).unwrap();
    let kept = users(&bundle.context);
    assert_eq!(kept.len(), 2);
    assert!(kept.contains(&"Taxes are due".to_string()));
    assert_eq!(kept.iter().filter(|u| u.starts_with("I like tea")).count(), 1);
}

#[test]
fn k_is_clamped_to_store_size() {
    let manager = manager_over(
        vec![
            aged_entry("cats", "meow", 0, &[]),
            aged_entry("dogs", "woof", 0, &[]),
        ],
        RetrievalConfig::default(),
    );
    assert_eq!(manager.get_context("cats", 50).unwrap().context.len(), 2);
    assert_eq!(manager.get_context("cats", 1).unwrap().context.len(), 1);
}
