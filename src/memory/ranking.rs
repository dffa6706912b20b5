//! Time-decayed ranking and duplicate collapsing for retrieved turns.
//!
//! Ranking is two-phase: [`apply_decay`] builds new results with decayed
//! scores, then sorts them. Nothing shared with the vector store is mutated.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use super::types::RetrievalResult;
use crate::config::{DedupPolicy, RetrievalConfig};
use crate::embedding::cosine_similarity;

/// Linear fade from 1.0 at age zero to 0.0 at `window_hours`. Pinned entries
/// always get 1.0.
pub fn decay_factor(age_hours: f64, window_hours: f64, pinned: bool) -> f64 {
    if pinned {
        return 1.0;
    }
    if window_hours <= 0.0 {
        return 0.0;
    }
    (1.0 - age_hours / window_hours).clamp(0.0, 1.0)
}

/// Convert a squared-L2 distance between unit vectors into cosine similarity,
/// floored at zero so decay can only lower a score.
pub fn similarity_from_distance(distance: f32) -> f32 {
    (1.0 - distance / 2.0).clamp(0.0, 1.0)
}

/// Rescore candidates (whose `score` is raw similarity) by similarity ×
/// decay and sort best first. Similarity is clamped to `[0, 1]` first; a
/// negative score would otherwise rise toward zero as it ages.
///
/// Entries with an unparsable timestamp keep their raw similarity and no
/// age. The sort is stable, so equal scores keep search order.
pub fn apply_decay(
    candidates: Vec<RetrievalResult>,
    now: DateTime<Utc>,
    config: &RetrievalConfig,
) -> Vec<RetrievalResult> {
    let mut ranked: Vec<RetrievalResult> = candidates
        .into_iter()
        .map(|candidate| {
            let RetrievalResult {
                entry,
                score: similarity,
                embedding,
                ..
            } = candidate;
            let similarity = similarity.clamp(0.0, 1.0);
            let age_hours = entry
                .parsed_timestamp()
                .map(|ts| (now - ts).num_milliseconds() as f64 / 3_600_000.0);

            let score = match age_hours {
                Some(age) => {
                    let pinned = entry.has_tag(&config.important_tag);
                    similarity * decay_factor(age, config.decay_window_hours, pinned) as f32
                }
                None => {
                    tracing::debug!(
                        timestamp = %entry.timestamp,
                        "unparsable timestamp, skipping decay"
                    );
                    similarity
                }
            };

            RetrievalResult {
                entry,
                score,
                age_hours,
                embedding,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}

/// Keep the first result per distinct `user_text`, drop empty ones, and
/// preserve order.
pub fn deduplicate(results: Vec<RetrievalResult>) -> Vec<RetrievalResult> {
    let mut seen: HashSet<String> = HashSet::new();
    results
        .into_iter()
        .filter(|r| !r.entry.user_text.is_empty() && seen.insert(r.entry.user_text.clone()))
        .collect()
}

/// [`deduplicate`], then also drop results whose stored embedding is more
/// similar than `threshold` to one already kept. Results without an
/// embedding are only subject to the exact-text rule.
pub fn deduplicate_similar(results: Vec<RetrievalResult>, threshold: f32) -> Vec<RetrievalResult> {
    let mut kept: Vec<RetrievalResult> = Vec::new();
    for result in deduplicate(results) {
        let duplicate = result.embedding.as_deref().is_some_and(|candidate| {
            kept.iter().any(|k| {
                k.embedding
                    .as_deref()
                    .is_some_and(|accepted| cosine_similarity(candidate, accepted) > threshold)
            })
        });
        if !duplicate {
            kept.push(result);
        }
    }
    kept
}

/// Dispatch on the configured policy.
pub fn collapse(results: Vec<RetrievalResult>, config: &RetrievalConfig) -> Vec<RetrievalResult> {
    match config.dedup {
        DedupPolicy::Exact => deduplicate(results),
        DedupPolicy::Cosine => deduplicate_similar(results, config.dedup_threshold),
    }
}

pub const SUMMARY_INSTRUCTION: &str = "Summarize these past conversations:";

/// Prompt handed to the summarizer: the fixed instruction, then one line per turn.
pub fn summary_prompt(results: &[RetrievalResult]) -> String {
    let mut prompt = String::from(SUMMARY_INSTRUCTION);
    for r in results {
        prompt.push_str("\n- User: ");
        prompt.push_str(&r.entry.user_text);
        prompt.push_str(" | Bot: ");
        prompt.push_str(&r.entry.bot_text);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::MemoryEntry;
    use chrono::Duration;

    fn entry_aged(user: &str, now: DateTime<Utc>, hours: i64, tags: &[&str]) -> MemoryEntry {
        MemoryEntry {
            user_text: user.into(),
            timestamp: (now - Duration::hours(hours)).to_rfc3339(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    fn result(user: &str) -> RetrievalResult {
        RetrievalResult::new(
            MemoryEntry {
                user_text: user.into(),
                ..Default::default()
            },
            1.0,
        )
    }

    #[test]
    fn decay_is_linear_over_window() {
        assert_eq!(decay_factor(0.0, 24.0, false), 1.0);
        assert!((decay_factor(6.0, 24.0, false) - 0.75).abs() < 1e-12);
        assert_eq!(decay_factor(24.0, 24.0, false), 0.0);
        assert_eq!(decay_factor(100.0, 24.0, false), 0.0);
    }

    #[test]
    fn important_pins_decay_at_one() {
        assert_eq!(decay_factor(100.0, 24.0, true), 1.0);

        let now = Utc::now();
        let config = RetrievalConfig::default();
        let ranked = apply_decay(
            vec![RetrievalResult::new(entry_aged("old but important", now, 100, &["important"]), 0.8)],
            now,
            &config,
        );
        assert!((ranked[0].score - 0.8).abs() < 1e-6);
        assert!((ranked[0].age_hours.unwrap() - 100.0).abs() < 1e-6);
    }

    #[test]
    fn older_never_outranks_younger_at_equal_similarity() {
        let now = Utc::now();
        let config = RetrievalConfig::default();
        for (young, old) in [(0, 1), (2, 12), (12, 23), (20, 30), (30, 40)] {
            let ranked = apply_decay(
                vec![
                    RetrievalResult::new(entry_aged("old", now, old, &[]), 0.9),
                    RetrievalResult::new(entry_aged("young", now, young, &[]), 0.9),
                ],
                now,
                &config,
            );
            let score = |name: &str| ranked.iter().find(|r| r.entry.user_text == name).unwrap().score;
            assert!(score("old") <= score("young"), "ages {young} vs {old}");
        }
    }

    #[test]
    fn negative_similarity_never_favours_older_entries() {
        let now = Utc::now();
        let config = RetrievalConfig::default();
        let ranked = apply_decay(
            vec![
                RetrievalResult::new(entry_aged("old", now, 30, &[]), -0.4),
                RetrievalResult::new(entry_aged("young", now, 0, &[]), -0.4),
            ],
            now,
            &config,
        );
        let score = |name: &str| ranked.iter().find(|r| r.entry.user_text == name).unwrap().score;
        assert!(score("old") <= score("young"));
        assert!(ranked.iter().all(|r| (0.0..=1.0).contains(&r.score)));
    }

    #[test]
    fn ranking_sorts_descending_and_keeps_ties_stable() {
        let now = Utc::now();
        let config = RetrievalConfig::default();
        let ranked = apply_decay(
            vec![
                RetrievalResult::new(entry_aged("stale", now, 30, &[]), 0.99),
                RetrievalResult::new(entry_aged("tie-a", now, 0, &[]), 0.5),
                RetrievalResult::new(entry_aged("best", now, 0, &[]), 0.9),
                RetrievalResult::new(entry_aged("tie-b", now, 0, &[]), 0.5),
            ],
            now,
            &config,
        );
        let users: Vec<&str> = ranked.iter().map(|r| r.entry.user_text.as_str()).collect();
        assert_eq!(users, vec!["best", "tie-a", "tie-b", "stale"]);
    }

    #[test]
    fn malformed_timestamp_keeps_raw_score() {
        let now = Utc::now();
        let entry = MemoryEntry {
            user_text: "mystery".into(),
            timestamp: "last tuesday".into(),
            ..Default::default()
        };
        let ranked = apply_decay(vec![RetrievalResult::new(entry, 0.7)], now, &RetrievalConfig::default());
        assert_eq!(ranked.len(), 1);
        assert!((ranked[0].score - 0.7).abs() < 1e-6);
        assert!(ranked[0].age_hours.is_none());
    }

    #[test]
    fn deduplicate_keeps_first_occurrence_in_order() {
        let out = deduplicate(vec![result("hi"), result("hi"), result("bye")]);
        let users: Vec<&str> = out.iter().map(|r| r.entry.user_text.as_str()).collect();
        assert_eq!(users, vec!["hi", "bye"]);
    }

    #[test]
    fn deduplicate_drops_empty_user_text() {
        let out = deduplicate(vec![result(""), result("x"), result("")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entry.user_text, "x");
    }

    #[test]
    fn similarity_dedup_merges_close_embeddings() {
        let with_embedding = |user: &str, v: Vec<f32>| {
            let mut r = result(user);
            r.embedding = Some(v);
            r
        };
        let out = deduplicate_similar(
            vec![
                with_embedding("I like tea", vec![1.0, 0.0, 0.0]),
                with_embedding("I really like tea", vec![0.99, 0.05, 0.0]),
                with_embedding("Taxes are due", vec![0.0, 1.0, 0.0]),
                with_embedding("I like tea", vec![0.0, 0.0, 1.0]),
            ],
            0.95,
        );
        let users: Vec<&str> = out.iter().map(|r| r.entry.user_text.as_str()).collect();
        assert_eq!(users, vec!["I like tea", "Taxes are due"]);
    }

    #[test]
    fn summary_prompt_lists_each_turn() {
        let mut a = result("I love hiking");
        a.entry.bot_text = "Tell me more!".into();
        let prompt = summary_prompt(&[a]);
        assert!(prompt.starts_with(SUMMARY_INSTRUCTION));
        assert!(prompt.contains("- User: I love hiking | Bot: Tell me more!"));
    }

    #[test]
    fn distance_maps_to_cosine() {
        assert_eq!(similarity_from_distance(0.0), 1.0);
        assert_eq!(similarity_from_distance(2.0), 0.0);
        assert_eq!(similarity_from_distance(4.0), 0.0);
        assert_eq!(similarity_from_distance(3.0), 0.0);
    }
}
