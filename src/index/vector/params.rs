//! Tuning parameters for the IVF-PQ vector index.

use serde::{Deserialize, Serialize};

/// Parameters governing coarse quantization, product quantization, and
/// search-time probing/refinement for [`super::IvfPqIndex`].
///
/// | Parameter | Default | Role |
/// |---|---|---|
/// | `nlist` | 256 | IVF coarse centroids (inner-product metric) |
/// | `m` | 16 | PQ subvectors; dimension must be divisible by `m` |
/// | `nbits` | 8 | Bits per subvector code (256 codebook entries at 8) |
/// | `nprobe` | 10 | Coarse cells probed per search |
/// | `k_factor_rf` | 10 | PQ candidates fetched per requested result, before exact rescoring |
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IvfPqParams {
    /// Number of IVF coarse centroids.
    pub nlist: usize,
    /// Number of PQ subvectors.
    pub m: usize,
    /// Bits per subvector code.
    pub nbits: u32,
    /// Number of coarse cells probed at search time.
    pub nprobe: usize,
    /// Refinement factor: PQ candidates fetched are `k_factor_rf * top_k`.
    pub k_factor_rf: usize,
}

impl Default for IvfPqParams {
    fn default() -> Self {
        Self {
            nlist: 256,
            m: 16,
            nbits: 8,
            nprobe: 10,
            k_factor_rf: 10,
        }
    }
}

impl IvfPqParams {
    /// The normative spec configuration: `IVF256,PQ16,RFlat`.
    #[must_use]
    pub fn normative() -> Self {
        Self::default()
    }

    /// Number of codebook entries per subspace, `2^nbits`.
    #[must_use]
    pub fn codebook_size(&self) -> usize {
        1usize << self.nbits
    }

    /// Training threshold `T_train = nlist * 39` above which a temp-mode
    /// index promotes to trained (IVF+PQ) mode.
    #[must_use]
    pub const fn train_threshold(&self) -> usize {
        self.nlist * 39
    }

    /// Validates that `dim` is compatible with `m` (must divide evenly) and
    /// that `nprobe` does not exceed `nlist`.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error if either invariant is violated.
    pub fn validate_for_dim(&self, dim: usize) -> crate::error::Result<()> {
        if self.m == 0 || dim % self.m != 0 {
            return Err(crate::error::Error::Config(format!(
                "vector dimension {dim} is not divisible by m={}",
                self.m
            )));
        }
        if self.nprobe == 0 || self.nprobe > self.nlist {
            return Err(crate::error::Error::Config(format!(
                "nprobe {} must be in [1, nlist={}]",
                self.nprobe, self.nlist
            )));
        }
        Ok(())
    }
}

impl From<crate::config::VectorConfig> for IvfPqParams {
    fn from(cfg: crate::config::VectorConfig) -> Self {
        Self {
            nlist: cfg.nlist,
            m: cfg.m,
            nbits: cfg.nbits,
            nprobe: cfg.nprobe,
            k_factor_rf: cfg.k_factor_rf,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normative_matches_spec_defaults() {
        let p = IvfPqParams::normative();
        assert_eq!(p.nlist, 256);
        assert_eq!(p.m, 16);
        assert_eq!(p.nbits, 8);
        assert_eq!(p.nprobe, 10);
        assert_eq!(p.k_factor_rf, 10);
        assert_eq!(p.train_threshold(), 9984);
        assert_eq!(p.codebook_size(), 256);
    }

    #[test]
    fn rejects_dim_not_divisible_by_m() {
        let p = IvfPqParams::normative();
        assert!(p.validate_for_dim(500).is_err());
        assert!(p.validate_for_dim(512).is_ok());
    }
}
