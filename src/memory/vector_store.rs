//! Flat (brute-force) nearest-neighbor index with a metadata side-table.
//!
//! Vectors are L2-normalized on insert and on query, so the squared Euclidean
//! distance used for ranking orders results exactly as cosine similarity
//! would (`d = 2 - 2·cos`). The store is append-only: an ordinal, once
//! returned by [`VectorStore::add`], identifies the same vector for the
//! lifetime of the store.
//!
//! Persistence writes two companion artifacts: the index itself in a compact
//! binary form (`<name>.bin`) and the metadata as a JSON array
//! (`<name>.json`), one object per vector in insertion order.

use std::path::{Path, PathBuf};

use bincode::Options;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::types::MemoryEntry;
use crate::embedding::l2_normalize;
use crate::error::{MemoryError, Result};

const INDEX_MAGIC: [u8; 4] = *b"LYVX";
const INDEX_FORMAT_VERSION: u32 = 1;

/// On-disk layout of the binary index artifact.
#[derive(Serialize, Deserialize)]
struct IndexFile {
    magic: [u8; 4],
    version: u32,
    dimension: u32,
    count: u64,
    data: Vec<f32>,
}

pub struct VectorStore {
    dimension: usize,
    /// Row-major `count × dimension` matrix.
    data: Vec<f32>,
    metadata: Vec<MemoryEntry>,
    path: Option<PathBuf>,
}

impl VectorStore {
    /// An empty in-memory store.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
            metadata: Vec::new(),
            path: None,
        }
    }

    /// An empty store that persists to `path`.
    pub fn with_path(dimension: usize, path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::new(dimension)
        }
    }

    /// Restore from `path`, falling back to a fresh empty store on any failure.
    pub fn open(path: impl Into<PathBuf>, dimension: usize) -> Self {
        let path = path.into();
        match Self::try_restore(&path, dimension) {
            Ok(store) => store,
            Err(e) => {
                error!(
                    path = %path.display(),
                    error = %e,
                    "vector index unusable, starting with an empty store"
                );
                Self::with_path(dimension, path)
            }
        }
    }

    /// Restore from `path`. A missing index is not an error and yields an
    /// empty store; unreadable or inconsistent artifacts are.
    pub fn try_restore(path: &Path, dimension: usize) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), dimension, "no vector index on disk, creating new");
            return Ok(Self::with_path(dimension, path));
        }

        let bytes = std::fs::read(path)?;
        let file: IndexFile = bincode::DefaultOptions::new()
            .with_limit(bytes.len() as u64)
            .deserialize(&bytes)
            .map_err(|e| MemoryError::corrupt(path, e))?;

        if file.magic != INDEX_MAGIC || file.version != INDEX_FORMAT_VERSION {
            return Err(MemoryError::corrupt(path, "unrecognized index header"));
        }
        if file.dimension as usize != dimension {
            return Err(MemoryError::corrupt(
                path,
                format!("index dimension {} but {dimension} configured", file.dimension),
            ));
        }
        let count = file.count as usize;
        if file.data.len() != count * dimension {
            return Err(MemoryError::corrupt(
                path,
                format!("{} floats for {count} vectors", file.data.len()),
            ));
        }

        let metadata_path = Self::metadata_path(path);
        let metadata = if metadata_path.exists() {
            let raw = std::fs::read(&metadata_path)?;
            let mut metadata: Vec<MemoryEntry> = serde_json::from_slice(&raw)
                .map_err(|e| MemoryError::corrupt(&metadata_path, e))?;
            // The sidecar is written before the index, so an interrupted
            // persist leaves it ahead by the records the index never got.
            if metadata.len() > count {
                warn!(
                    path = %metadata_path.display(),
                    records = metadata.len(),
                    count,
                    "metadata sidecar ahead of index, dropping trailing records"
                );
                metadata.truncate(count);
            }
            if metadata.len() != count {
                return Err(MemoryError::corrupt(
                    &metadata_path,
                    format!("{} metadata records for {count} vectors", metadata.len()),
                ));
            }
            metadata
        } else {
            warn!(
                path = %metadata_path.display(),
                count,
                "metadata sidecar missing, using empty placeholders"
            );
            vec![MemoryEntry::default(); count]
        };

        info!(path = %path.display(), count, "vector index restored");
        Ok(Self {
            dimension,
            data: file.data,
            metadata,
            path: Some(path.to_path_buf()),
        })
    }

    /// Sidecar path holding the metadata array: same base name, `.json`.
    pub fn metadata_path(index_path: &Path) -> PathBuf {
        index_path.with_extension("json")
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Vectors and metadata have the same length and are index-aligned.
    pub fn is_aligned(&self) -> bool {
        self.data.len() == self.metadata.len() * self.dimension
    }

    pub fn entries(&self) -> &[MemoryEntry] {
        &self.metadata
    }

    /// The stored (normalized) vector at `ordinal`.
    pub fn vector(&self, ordinal: usize) -> Option<&[f32]> {
        let start = ordinal.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(())
    }

    /// Append a vector and its metadata. Returns the new ordinal, which is
    /// the previous count.
    pub fn add(&mut self, embedding: &[f32], mut metadata: MemoryEntry) -> Result<usize> {
        self.check_dimension(embedding)?;

        let ordinal = self.len();
        let mut normalized = embedding.to_vec();
        l2_normalize(&mut normalized);

        metadata.embedding_ref = Some(ordinal);
        self.data.extend_from_slice(&normalized);
        self.metadata.push(metadata);

        debug!(ordinal, "vector added");
        Ok(ordinal)
    }

    /// Nearest neighbors of `query`, best match first.
    ///
    /// Returns `(distances, entries)` of equal length `min(k, len)`; both are
    /// empty for an empty store.
    pub fn search(&self, query: &[f32], k: usize) -> Result<(Vec<f32>, Vec<MemoryEntry>)> {
        let count = self.data.len() / self.dimension.max(1);
        if count == 0 || k == 0 {
            return Ok((Vec::new(), Vec::new()));
        }
        self.check_dimension(query)?;

        let mut q = query.to_vec();
        l2_normalize(&mut q);
        let q = ArrayView1::from(&q[..]);

        let matrix = ArrayView2::from_shape((count, self.dimension), &self.data[..count * self.dimension])
            .map_err(|e| MemoryError::CorruptPersistedState {
                path: self.describe_path(),
                reason: e.to_string(),
            })?;

        // ‖v − q‖² = ‖v‖² + ‖q‖² − 2·v·q
        let dots: Array1<f32> = matrix.dot(&q);
        let row_norms = matrix.map_axis(Axis(1), |row| row.dot(&row));
        let q_norm = q.dot(&q);

        let mut ranked: Vec<(usize, f32)> = dots
            .iter()
            .zip(row_norms.iter())
            .enumerate()
            .map(|(i, (dot, norm))| (i, (norm + q_norm - 2.0 * dot).max(0.0)))
            .collect();
        ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k.min(count));

        let mut distances = Vec::with_capacity(ranked.len());
        let mut entries = Vec::with_capacity(ranked.len());
        for (ordinal, distance) in ranked {
            distances.push(distance);
            match self.metadata.get(ordinal) {
                Some(entry) => entries.push(entry.clone()),
                None => {
                    warn!(ordinal, metadata_len = self.metadata.len(), "ordinal beyond metadata");
                    entries.push(MemoryEntry::default());
                }
            }
        }

        Ok((distances, entries))
    }

    /// Write both artifacts to the configured path. A store without a path
    /// has nothing to persist.
    pub fn persist(&self) -> Result<()> {
        match &self.path {
            Some(path) => self.persist_to(path),
            None => {
                debug!("in-memory vector store, skipping persist");
                Ok(())
            }
        }
    }

    pub fn persist_to(&self, path: &Path) -> Result<()> {
        let file = IndexFile {
            magic: INDEX_MAGIC,
            version: INDEX_FORMAT_VERSION,
            dimension: self.dimension as u32,
            count: self.len() as u64,
            data: self.data.clone(),
        };
        let index_bytes = bincode::DefaultOptions::new().serialize(&file)?;
        let metadata_bytes = serde_json::to_vec_pretty(&self.metadata)?;

        super::write_atomic(&Self::metadata_path(path), &metadata_bytes)?;
        super::write_atomic(path, &index_bytes)?;

        debug!(path = %path.display(), count = self.len(), "vector index saved");
        Ok(())
    }

    /// Drop every vector. Only used by an explicit reset.
    pub fn clear(&mut self) {
        self.data.clear();
        self.metadata.clear();
    }

    fn describe_path(&self) -> String {
        self.path
            .as_ref()
            .map_or_else(|| "<memory>".to_string(), |p| p.display().to_string())
    }
}
