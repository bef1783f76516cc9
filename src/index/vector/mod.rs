//! C3 VectorIndex: an exact temp-mode index that promotes, once, to a
//! trained IVF+PQ index once enough vectors have accumulated.
//!
//! ```text
//! Temp(FlatIndex) --[len() >= params.train_threshold()]--> Trained(IvfPqIndex)
//! ```
//!
//! The promotion is monotonic and one-shot: once trained, the index never
//! reverts to temp mode, even if vectors are later pruned elsewhere in the
//! engine (C3 itself is append-only).

mod flat;
mod ivf_pq;
mod math;
mod params;

pub use flat::FlatIndex;
pub use ivf_pq::IvfPqIndex;
pub use params::IvfPqParams;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// The index key written to `index_state.json`, reproduced verbatim from the
/// on-disk contract: normative configuration `IVF256,PQ16,RFlat`.
pub const INDEX_KEY: &str = "IVF256,PQ16,RFlat";

/// C3 VectorIndex: dispatches between temp (exact) and trained (IVF+PQ) modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VectorIndex {
    /// Exact brute-force mode, active below the training threshold.
    Temp(FlatIndex),
    /// Trained IVF+PQ mode, active from the training threshold onward.
    Trained(Box<IvfPqIndex>),
}

/// Sidecar state persisted alongside the vector index binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexState {
    /// Whether the index has promoted to trained (IVF+PQ) mode.
    pub is_trained: bool,
    /// Vector dimension.
    pub dimension: usize,
    /// Normative index configuration descriptor, always [`INDEX_KEY`].
    pub index_key: String,
    /// Number of vectors stored.
    pub vector_count: usize,
}

impl VectorIndex {
    /// Creates a new temp-mode index over `dim`-dimensional vectors.
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self::Temp(FlatIndex::new(dim))
    }

    /// Vector dimension.
    #[must_use]
    pub fn dim(&self) -> usize {
        match self {
            Self::Temp(f) => f.dim(),
            Self::Trained(t) => t.dim(),
        }
    }

    /// Number of vectors stored.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Temp(f) => f.len(),
            Self::Trained(t) => t.len(),
        }
    }

    /// Returns `true` if no vectors are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` once promoted to trained (IVF+PQ) mode.
    #[must_use]
    pub fn is_trained(&self) -> bool {
        matches!(self, Self::Trained(_))
    }

    /// Appends `batch`, promoting from temp to trained mode in-place if the
    /// resulting count reaches `params.train_threshold()` and the index is
    /// not already trained. Promotion is one-shot and never reverses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if any vector's length does not
    /// match this index's dimension, or an error from training if promotion
    /// is triggered.
    pub fn add(&mut self, batch: &[Vec<f32>], params: IvfPqParams) -> Result<Vec<u32>> {
        match self {
            Self::Temp(flat) => {
                let ids = flat.add(batch)?;
                if flat.len() >= params.train_threshold() {
                    tracing::info!(vector_count = flat.len(), "promoting vector index to trained (IVF+PQ) mode");
                    let dim = flat.dim();
                    let vectors = flat.reconstruct_all();
                    let trained = IvfPqIndex::train(dim, params, &vectors)?;
                    *self = Self::Trained(Box::new(trained));
                }
                Ok(ids)
            }
            Self::Trained(trained) => trained.add(batch),
        }
    }

    /// Returns the `top_k` nearest stored vectors to `query` by inner
    /// product, exact in temp mode and approximate-then-exact-rescored in
    /// trained mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `query.len() != self.dim()`.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<(u32, f32)>> {
        match self {
            Self::Temp(f) => f.search(query, top_k),
            Self::Trained(t) => t.search(query, top_k),
        }
    }

    /// Current state summary, as written to `index_state.json`.
    #[must_use]
    pub fn state(&self) -> IndexState {
        IndexState {
            is_trained: self.is_trained(),
            dimension: self.dim(),
            index_key: INDEX_KEY.to_string(),
            vector_count: self.len(),
        }
    }

    /// Serializes the index to `path` (the `faiss.index`-equivalent opaque
    /// binary) via `bincode`, and writes the sidecar `index_state.json`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`]-equivalent/[`Error::Io`] on failure.
    pub fn save(&self, path: &Path, state_path: &Path) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| Error::PersistenceFailure(format!("vector index encode failed: {e}")))?;
        fs::write(path, bytes)?;
        let state = serde_json::to_string_pretty(&self.state())?;
        fs::write(state_path, state)?;
        Ok(())
    }

    /// Loads an index previously written by [`Self::save`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::FormatError`] if the binary is truncated or
    /// corrupted.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        bincode::deserialize(&bytes)
            .map_err(|e| Error::FormatError(format!("vector index decode failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    fn random_unit_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let v: Vec<f32> = (0..dim).map(|_| rng.gen::<f32>() * 2.0 - 1.0).collect();
                math::normalize(&v)
            })
            .collect()
    }

    fn tiny_params() -> IvfPqParams {
        IvfPqParams {
            nlist: 4,
            m: 2,
            nbits: 4,
            nprobe: 2,
            k_factor_rf: 4,
        }
    }

    #[test]
    fn starts_in_temp_mode() {
        let index = VectorIndex::new(8);
        assert!(!index.is_trained());
        assert!(index.is_empty());
    }

    #[test]
    fn promotes_to_trained_at_threshold() {
        let params = tiny_params();
        let threshold = params.train_threshold();
        let mut index = VectorIndex::new(8);

        let below = random_unit_vectors(threshold - 1, 8, 1);
        index.add(&below, params).unwrap();
        assert!(!index.is_trained());

        let one_more = random_unit_vectors(1, 8, 2);
        index.add(&one_more, params).unwrap();
        assert!(index.is_trained());
        assert_eq!(index.len(), threshold);
    }

    #[test]
    fn promotion_is_one_shot_and_does_not_revert() {
        let params = tiny_params();
        let threshold = params.train_threshold();
        let mut index = VectorIndex::new(8);
        index.add(&random_unit_vectors(threshold, 8, 5), params).unwrap();
        assert!(index.is_trained());

        index.add(&random_unit_vectors(1, 8, 6), params).unwrap();
        assert!(index.is_trained());
    }

    #[test]
    fn state_reports_index_key_and_counts() {
        let index = VectorIndex::new(8);
        let state = index.state();
        assert_eq!(state.index_key, INDEX_KEY);
        assert!(!state.is_trained);
        assert_eq!(state.dimension, 8);
        assert_eq!(state.vector_count, 0);
    }

    #[test]
    fn save_and_load_round_trip_temp_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = VectorIndex::new(4);
        index
            .add(&[vec![1.0, 0.0, 0.0, 0.0]], IvfPqParams::normative())
            .unwrap();

        let bin_path = dir.path().join("faiss.index");
        let state_path = dir.path().join("index_state.json");
        index.save(&bin_path, &state_path).unwrap();

        let loaded = VectorIndex::load(&bin_path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(!loaded.is_trained());

        let state_json = fs::read_to_string(&state_path).unwrap();
        assert!(state_json.contains("IVF256,PQ16,RFlat"));
    }
}
