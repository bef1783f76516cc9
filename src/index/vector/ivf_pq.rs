//! Trained-mode vector index: IVF coarse quantization plus product
//! quantization, with an exact-rescoring refinement layer (`IVF256,PQ16,RFlat`).
//!
//! Built once, from a full snapshot of the vectors accumulated while the
//! temp-mode [`super::flat::FlatIndex`] was active (see
//! [`super::VectorIndex`] for the promotion trigger). Training is one-shot:
//! there is no re-training or incremental centroid adjustment after vectors
//! are added post-promotion.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::math::{dot, kmeans, normalize, sq_euclidean};
use super::params::IvfPqParams;
use crate::error::{Error, Result};

/// Trained IVF+PQ approximate nearest-neighbor index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvfPqIndex {
    dim: usize,
    params: IvfPqParams,
    /// `nlist` coarse centroids, unit-norm, flattened `nlist * dim`.
    coarse_centroids: Vec<f32>,
    /// `m` subspaces, each with `2^nbits` codebook entries of width `dim/m`,
    /// flattened `m * codebook_size * (dim/m)`.
    pq_codebooks: Vec<f32>,
    /// Inverted lists: one per coarse centroid, holding `(id, pq_code)`.
    inverted_lists: Vec<Vec<(u32, Vec<u8>)>>,
    /// Raw unit-norm vectors, by id, retained for exact rescoring.
    raw_vectors: Vec<f32>,
    next_id: u32,
}

impl IvfPqIndex {
    fn subspace_dim(dim: usize, m: usize) -> usize {
        dim / m
    }

    /// Trains coarse centroids and per-subspace PQ codebooks from `vectors`
    /// (assumed already unit-norm, e.g. reconstructed from a
    /// [`super::flat::FlatIndex`]) and assigns them contiguous ids `0..n`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `params` is invalid for `dim`, or
    /// [`Error::Internal`] if there are fewer vectors than `params.nlist`.
    pub fn train(dim: usize, params: IvfPqParams, vectors: &[Vec<f32>]) -> Result<Self> {
        params.validate_for_dim(dim)?;
        let n = vectors.len();
        if n < params.nlist {
            return Err(Error::Internal(format!(
                "cannot train IVF with nlist={} from only {n} vectors",
                params.nlist
            )));
        }
        for v in vectors {
            if v.len() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    actual: v.len(),
                });
            }
        }

        let flat: Vec<f32> = vectors.iter().flatten().copied().collect();
        let coarse_centroids = kmeans(&flat, dim, params.nlist, 25, true);

        let sub_dim = Self::subspace_dim(dim, params.m);
        let codebook_size = params.codebook_size();
        let mut pq_codebooks = vec![0.0f32; params.m * codebook_size * sub_dim];
        for sub in 0..params.m {
            let sub_data: Vec<f32> = vectors
                .iter()
                .flat_map(|v| v[sub * sub_dim..(sub + 1) * sub_dim].iter().copied())
                .collect();
            let effective_k = codebook_size.min(n);
            let book = kmeans(&sub_data, sub_dim, effective_k, 25, false);
            pq_codebooks[sub * codebook_size * sub_dim..sub * codebook_size * sub_dim + book.len()]
                .copy_from_slice(&book);
        }

        let mut index = Self {
            dim,
            params,
            coarse_centroids,
            pq_codebooks,
            inverted_lists: vec![Vec::new(); params.nlist],
            raw_vectors: Vec::with_capacity(n * dim),
            next_id: 0,
        };
        for v in vectors {
            index.insert(v);
        }
        Ok(index)
    }

    /// Number of vectors stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.next_id as usize
    }

    /// Returns `true` if no vectors are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.next_id == 0
    }

    fn nearest_centroid(&self, v: &[f32]) -> usize {
        let mut best = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for c in 0..self.params.nlist {
            let centroid = &self.coarse_centroids[c * self.dim..(c + 1) * self.dim];
            let score = dot(v, centroid);
            if score > best_score {
                best_score = score;
                best = c;
            }
        }
        best
    }

    fn encode(&self, v: &[f32]) -> Vec<u8> {
        let sub_dim = Self::subspace_dim(self.dim, self.params.m);
        let codebook_size = self.params.codebook_size();
        let mut code = Vec::with_capacity(self.params.m);
        for sub in 0..self.params.m {
            let sub_vec = &v[sub * sub_dim..(sub + 1) * sub_dim];
            let book_base = sub * codebook_size * sub_dim;
            let mut best = 0usize;
            let mut best_dist = f32::INFINITY;
            for entry in 0..codebook_size {
                let centroid = &self.pq_codebooks
                    [book_base + entry * sub_dim..book_base + (entry + 1) * sub_dim];
                let d = sq_euclidean(sub_vec, centroid);
                if d < best_dist {
                    best_dist = d;
                    best = entry;
                }
            }
            #[allow(clippy::cast_possible_truncation)]
            code.push(best as u8);
        }
        code
    }

    /// Appends a single already-trained-space vector, assigning it the next
    /// id. Does not retrain centroids or codebooks.
    fn insert(&mut self, v: &[f32]) -> u32 {
        let cell = self.nearest_centroid(v);
        let code = self.encode(v);
        let id = self.next_id;
        self.inverted_lists[cell].push((id, code));
        self.raw_vectors.extend_from_slice(v);
        self.next_id += 1;
        id
    }

    /// Normalizes and appends `batch` to the trained index, assigning
    /// contiguous ids. Centroids and codebooks are not retrained.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if any vector's length does not
    /// equal [`Self::dim`].
    pub fn add(&mut self, batch: &[Vec<f32>]) -> Result<Vec<u32>> {
        let mut ids = Vec::with_capacity(batch.len());
        for v in batch {
            if v.len() != self.dim {
                return Err(Error::DimensionMismatch {
                    expected: self.dim,
                    actual: v.len(),
                });
            }
            ids.push(self.insert(&normalize(v)));
        }
        Ok(ids)
    }

    /// Dimension this index was trained for.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    fn asymmetric_score(&self, query: &[f32], code: &[u8]) -> f32 {
        let sub_dim = Self::subspace_dim(self.dim, self.params.m);
        let codebook_size = self.params.codebook_size();
        let mut score = 0.0f32;
        for (sub, &entry) in code.iter().enumerate() {
            let q_sub = &query[sub * sub_dim..(sub + 1) * sub_dim];
            let book_base = sub * codebook_size * sub_dim;
            let centroid =
                &self.pq_codebooks[book_base + entry as usize * sub_dim
                    ..book_base + (entry as usize + 1) * sub_dim];
            score += dot(q_sub, centroid);
        }
        score
    }

    fn reconstruct(&self, id: u32) -> &[f32] {
        let i = id as usize;
        &self.raw_vectors[i * self.dim..(i + 1) * self.dim]
    }

    /// Approximate search: probes the `nprobe` nearest coarse cells, scores
    /// their members by asymmetric PQ distance, takes the top
    /// `k_factor_rf * top_k` candidates, then exactly rescores those against
    /// their raw stored vectors before returning the final `top_k`.
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

        let mut cells: Vec<(usize, f32)> = (0..self.params.nlist)
            .map(|c| {
                let centroid = &self.coarse_centroids[c * self.dim..(c + 1) * self.dim];
                (c, dot(&q, centroid))
            })
            .collect();
        cells.sort_by(|a, b| b.1.total_cmp(&a.1));
        cells.truncate(self.params.nprobe);

        #[cfg(feature = "parallel")]
        let mut approx: Vec<(u32, f32)> = cells
            .par_iter()
            .flat_map(|(cell, _)| {
                self.inverted_lists[*cell]
                    .par_iter()
                    .map(|(id, code)| (*id, self.asymmetric_score(&q, code)))
            })
            .collect();
        #[cfg(not(feature = "parallel"))]
        let mut approx: Vec<(u32, f32)> = {
            let mut acc = Vec::new();
            for (cell, _) in &cells {
                for (id, code) in &self.inverted_lists[*cell] {
                    acc.push((*id, self.asymmetric_score(&q, code)));
                }
            }
            acc
        };
        approx.sort_by(|a, b| b.1.total_cmp(&a.1));
        approx.truncate(self.params.k_factor_rf * top_k);

        let mut exact: Vec<(u32, f32)> = approx
            .into_iter()
            .map(|(id, _)| {
                let v = self.reconstruct(id);
                (id, dot(&q, v))
            })
            .collect();
        exact.sort_by(|a, b| b.1.total_cmp(&a.1));
        exact.truncate(top_k);
        Ok(exact)
    }
}
