//! Local ONNX Runtime sentence encoder.
//!
//! Runs a sentence-transformers export through `ort`: tokenize, infer,
//! mask-weighted mean pooling, then L2 normalization. Model files are read
//! from `<cache_dir>/model.onnx` and `<cache_dir>/tokenizer.json`.

use std::sync::Mutex;

use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::{l2_normalize, EmbeddingProvider};
use crate::config::EmbeddingConfig;

/// all-MiniLM-L6-v2 was trained at 256 tokens.
const MAX_SEQ_LEN: usize = 256;

pub struct LocalEmbeddingProvider {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dimensions: usize,
    model: String,
}

// Safety: Tokenizer is Send+Sync and the Session is only touched under the Mutex.
unsafe impl Send for LocalEmbeddingProvider {}
unsafe impl Sync for LocalEmbeddingProvider {}

impl LocalEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let cache_dir = crate::config::expand_tilde(&config.cache_dir);
        let model_path = cache_dir.join("model.onnx");
        let tokenizer_path = cache_dir.join("tokenizer.json");

        anyhow::ensure!(
            model_path.exists(),
            "ONNX model not found at {}. Run `lyra model download` first.",
            model_path.display()
        );
        anyhow::ensure!(
            tokenizer_path.exists(),
            "Tokenizer not found at {}. Run `lyra model download` first.",
            tokenizer_path.display()
        );

        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to set truncation: {e}"))?;
        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        tracing::info!(
            model = %config.model,
            path = %model_path.display(),
            dimensions = config.dimension,
            "sentence encoder loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dimensions: config.dimension,
            model: config.model.clone(),
        })
    }

    /// Mask-weighted mean over the token axis of a `[batch, seq, hidden]` tensor.
    fn mean_pool(
        data: &[f32],
        mask: &[i64],
        batch: usize,
        seq: usize,
        hidden: usize,
    ) -> Vec<Vec<f32>> {
        (0..batch)
            .map(|b| {
                let mut pooled = vec![0.0f32; hidden];
                let mut count = 0.0f32;
                for s in 0..seq {
                    let weight = mask[b * seq + s] as f32;
                    if weight == 0.0 {
                        continue;
                    }
                    let row = &data[(b * seq + s) * hidden..(b * seq + s + 1) * hidden];
                    pooled.iter_mut().zip(row).for_each(|(p, x)| *p += x * weight);
                    count += weight;
                }
                if count > 0.0 {
                    pooled.iter_mut().for_each(|p| *p /= count);
                }
                l2_normalize(&mut pooled);
                pooled
            })
            .collect()
    }
}

impl EmbeddingProvider for LocalEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .context("encoder returned no embedding")
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

        let batch = encodings.len();
        let seq = encodings.first().map_or(0, |e| e.get_ids().len());

        let input_ids: Vec<i64> = encodings
            .iter()
            .flat_map(|e| e.get_ids().iter().map(|&id| id as i64))
            .collect();
        let attention_mask: Vec<i64> = encodings
            .iter()
            .flat_map(|e| e.get_attention_mask().iter().map(|&m| m as i64))
            .collect();
        let token_type_ids = vec![0i64; batch * seq];

        let shape = vec![batch as i64, seq as i64];
        let input_ids = Tensor::from_array((shape.clone(), input_ids.into_boxed_slice()))?;
        let mask_tensor =
            Tensor::from_array((shape.clone(), attention_mask.clone().into_boxed_slice()))?;
        let token_type_ids = Tensor::from_array((shape, token_type_ids.into_boxed_slice()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("encoder session lock poisoned: {e}"))?;

        let outputs = session.run(ort::inputs! {
            "input_ids" => input_ids,
            "attention_mask" => mask_tensor,
            "token_type_ids" => token_type_ids,
        })?;

        // Output naming differs between exports.
        let token_embeddings = outputs
            .get("token_embeddings")
            .or_else(|| outputs.get("last_hidden_state"))
            .unwrap_or_else(|| &outputs[0]);

        let (out_shape, data) = token_embeddings
            .try_extract_tensor::<f32>()
            .context("failed to extract token embeddings")?;

        let dims: &[i64] = &out_shape;
        anyhow::ensure!(
            dims.len() == 3 && dims[2] == self.dimensions as i64,
            "unexpected encoder output shape {dims:?}, expected [batch, seq, {}]",
            self.dimensions
        );

        Ok(Self::mean_pool(
            data,
            &attention_mask,
            batch,
            dims[1] as usize,
            dims[2] as usize,
        ))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[test]
    fn mean_pool_ignores_padding() {
        // one sequence of two tokens, second is padding
        let data = vec![3.0, 4.0, 100.0, 100.0];
        let mask = vec![1, 0];
        let pooled = LocalEmbeddingProvider::mean_pool(&data, &mask, 1, 2, 2);
        assert!((pooled[0][0] - 0.6).abs() < 1e-6);
        assert!((pooled[0][1] - 0.8).abs() < 1e-6);
    }

    fn test_config() -> EmbeddingConfig {
        EmbeddingConfig::default()
    }

    #[test]
    #[ignore] // Requires model files: run `lyra model download`, then `cargo test -- --ignored`
    fn embed_produces_configured_dims_and_unit_norm() {
        let provider = LocalEmbeddingProvider::new(&test_config()).unwrap();
        let embedding = provider.embed("Hello world").unwrap();
        assert_eq!(embedding.len(), 384);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    #[ignore]
    fn similar_turns_score_higher() {
        let provider = LocalEmbeddingProvider::new(&test_config()).unwrap();
        let a = provider.embed("User: I love hiking Bot: That's great!").unwrap();
        let b = provider.embed("hiking trips in the mountains").unwrap();
        let c = provider.embed("quarterly tax filing deadlines").unwrap();
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }
}
