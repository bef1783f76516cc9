//! Temp-mode vector index: exact inner product over unit-norm vectors.
//!
//! Active until the corpus exceeds the IVF-PQ training threshold. Every
//! stored vector remains individually reconstructable, which the trained
//! index relies on at promotion time.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::math::{dot, normalize};
use crate::error::{Error, Result};

/// Exact brute-force vector index over unit-norm vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    dim: usize,
    vectors: Vec<f32>,
}

impl FlatIndex {
    /// Creates an empty flat index over `dim`-dimensional vectors.
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: Vec::new(),
        }
    }

    /// Vector dimension this index was created with.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of vectors stored.
    #[must_use]
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.vectors.len() / self.dim
        }
    }

    /// Returns `true` if no vectors are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Normalizes and appends `batch`, returning the contiguous ids assigned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if any vector's length does not
    /// equal [`Self::dim`].
    pub fn add(&mut self, batch: &[Vec<f32>]) -> Result<Vec<u32>> {
        let start = self.len();
        let mut ids = Vec::with_capacity(batch.len());
        for (i, v) in batch.iter().enumerate() {
            if v.len() != self.dim {
                return Err(Error::DimensionMismatch {
                    expected: self.dim,
                    actual: v.len(),
                });
            }
            self.vectors.extend_from_slice(&normalize(v));
            ids.push(u32::try_from(start + i).map_err(|_| {
                Error::Internal("vector index id exceeds u32::MAX".to_string())
            })?);
        }
        Ok(ids)
    }

    /// Returns the `top_k` stored vectors by descending inner product with
    /// `query` (which is normalized before comparison).
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `query.len() != self.dim()`.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<(u32, f32)>> {
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let q = normalize(query);
        #[cfg(feature = "parallel")]
        let iter = (0..self.len()).into_par_iter();
        #[cfg(not(feature = "parallel"))]
        let iter = 0..self.len();
        let mut scores: Vec<(u32, f32)> = iter
            .map(|i| {
                let v = &self.vectors[i * self.dim..(i + 1) * self.dim];
                (u32::try_from(i).unwrap_or(u32::MAX), dot(&q, v))
            })
            .collect();
        scores.sort_by(|a, b| b.1.total_cmp(&a.1));
        scores.truncate(top_k);
        Ok(scores)
    }

    /// Reconstructs the unit-norm vector stored at `id`, or `None` if out of
    /// range.
    #[must_use]
    pub fn reconstruct(&self, id: u32) -> Option<Vec<f32>> {
        let i = id as usize;
        if i >= self.len() {
            return None;
        }
        Some(self.vectors[i * self.dim..(i + 1) * self.dim].to_vec())
    }

    /// Reconstructs every stored vector, in id order. Used at promotion time
    /// to seed the trained IVF-PQ index.
    #[must_use]
    pub fn reconstruct_all(&self) -> Vec<Vec<f32>> {
        (0..self.len())
            .map(|i| self.vectors[i * self.dim..(i + 1) * self.dim].to_vec())
            .collect()
    }
}
