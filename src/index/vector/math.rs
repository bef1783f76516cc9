//! Scalar vector-math helpers shared by the flat and IVF-PQ indices.

/// Inner product (dot product) of two equal-length vectors.
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Squared Euclidean distance between two equal-length vectors.
#[must_use]
pub fn sq_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Returns an L2-normalized copy of `v`. A zero (or near-zero) vector is
/// divided by `f32::MIN_POSITIVE` rather than by exactly zero, avoiding NaN
/// propagation for degenerate inputs.
#[must_use]
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm = if norm <= 0.0 { f32::MIN_POSITIVE } else { norm };
    v.iter().map(|x| x / norm).collect()
}

/// Runs `iterations` rounds of Lloyd's algorithm over `data` (a flattened
/// `n * dim` matrix), seeded from its first `k` rows.
///
/// When `spherical` is true, cluster assignment uses inner product and
/// centroids are re-normalized to unit length after each update (appropriate
/// for unit-norm input, e.g. coarse IVF centroids). When false, assignment
/// uses squared Euclidean distance and centroids are left as plain means
/// (appropriate for PQ subspace codebooks, which reconstruct values rather
/// than directions).
///
/// Clusters that receive no points in an iteration keep their previous
/// centroid rather than collapsing to a NaN mean.
///
/// # Panics
///
/// Panics if `data` holds fewer than `k` points.
#[must_use]
pub fn kmeans(data: &[f32], dim: usize, k: usize, iterations: usize, spherical: bool) -> Vec<f32> {
    let n = data.len() / dim;
    assert!(n >= k, "kmeans requires at least k={k} points, got {n}");

    let mut centroids = data[..k * dim].to_vec();

    for _ in 0..iterations {
        let mut sums = vec![0.0f32; k * dim];
        let mut counts = vec![0u32; k];

        for i in 0..n {
            let point = &data[i * dim..(i + 1) * dim];
            let mut best = 0usize;
            let mut best_score = f32::NEG_INFINITY;
            for c in 0..k {
                let centroid = &centroids[c * dim..(c + 1) * dim];
                let score = if spherical {
                    dot(point, centroid)
                } else {
                    -sq_euclidean(point, centroid)
                };
                if score > best_score {
                    best_score = score;
                    best = c;
                }
            }
            counts[best] += 1;
            for d in 0..dim {
                sums[best * dim + d] += point[d];
            }
        }

        for c in 0..k {
            if counts[c] == 0 {
                continue;
            }
            let count = counts[c] as f32;
            for d in 0..dim {
                centroids[c * dim + d] = sums[c * dim + d] / count;
            }
            if spherical {
                let slice = &mut centroids[c * dim..(c + 1) * dim];
                let norm = slice.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm = if norm <= 0.0 { f32::MIN_POSITIVE } else { norm };
                for v in slice.iter_mut() {
                    *v /= norm;
                }
            }
        }
    }

    centroids
}
