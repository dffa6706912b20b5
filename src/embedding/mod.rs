//! Text-to-vector embedding.
//!
//! Provides the [`EmbeddingProvider`] trait with two implementations: a local
//! ONNX sentence encoder ([`local::LocalEmbeddingProvider`]) and a
//! deterministic feature-hashing encoder ([`hashed::HashedEmbeddingProvider`])
//! for offline runs and tests. The variant is chosen from configuration by
//! [`create_provider`].

pub mod hashed;
pub mod local;

use anyhow::Result;

/// Default embedding width (all-MiniLM-L6-v2).
pub const EMBEDDING_DIM: usize = 384;

/// Trait for embedding text into vectors.
///
/// Implementations return L2-normalized vectors of exactly
/// [`dimensions`](EmbeddingProvider::dimensions) entries. All methods are
/// synchronous; async callers should go through `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }

    /// Identifier recorded alongside stored vectors.
    fn model_name(&self) -> &str;
}

/// Create an embedding provider from config.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => {
            let provider = local::LocalEmbeddingProvider::new(config)?;
            Ok(Box::new(provider))
        }
        "hashed" => Ok(Box::new(hashed::HashedEmbeddingProvider::new(
            config.dimension,
        ))),
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local, hashed"),
    }
}

/// L2-normalize a vector in place. A zero vector is left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Cosine similarity; 0.0 when either side has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
