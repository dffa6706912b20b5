//! Deterministic feature-hashing embeddings.
//!
//! Each lowercase alphanumeric token is hashed (FNV-1a) into one of
//! `dimensions` buckets with a hash-derived sign. The result is stable across
//! runs and platforms, needs no model files, and ranks texts by shared
//! vocabulary. Used for offline deployments and tests.

use anyhow::Result;

use super::{l2_normalize, EmbeddingProvider};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

pub struct HashedEmbeddingProvider {
    dimensions: usize,
}

impl HashedEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

impl EmbeddingProvider for HashedEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; self.dimensions];
        for token in tokens(text) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        l2_normalize(&mut v);
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "hashed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[test]
    fn produces_configured_dimension_and_unit_norm() {
        let provider = HashedEmbeddingProvider::new(384);
        let v = provider.embed("User: I love hiking Bot: tell me more").unwrap();
        assert_eq!(v.len(), 384);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn same_text_same_vector() {
        let provider = HashedEmbeddingProvider::new(64);
        assert_eq!(
            provider.embed("Hiking in the Alps").unwrap(),
            provider.embed("hiking, in the ALPS!").unwrap()
        );
    }

    #[test]
    fn shared_vocabulary_ranks_higher() {
        let provider = HashedEmbeddingProvider::new(384);
        let query = provider.embed("hiking").unwrap();
        let near = provider.embed("I love hiking").unwrap();
        let far = provider.embed("quantum computers use qubits").unwrap();
        assert!(cosine_similarity(&query, &near) > cosine_similarity(&query, &far));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let provider = HashedEmbeddingProvider::new(8);
        assert_eq!(provider.embed("  ...  ").unwrap(), vec![0.0; 8]);
    }
}
