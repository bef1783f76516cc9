//! Engine configuration.
//!
//! Provides configuration support via an optional `washi.toml`, environment
//! variables, and built-in defaults.
//!
//! # Priority (highest to lowest)
//!
//! 1. Environment variables (`WASHI_*`)
//! 2. Configuration file (`washi.toml`)
//! 3. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Error;

/// Builds the `WASHI_*` environment provider, mapping `WASHI_SECTION_FIELD`
/// to the nested `section.field` key (splitting only on the first
/// underscore, since section names are single words but field names like
/// `min_df` and `k_factor_rf` contain underscores of their own).
fn env_provider() -> Env {
    Env::prefixed("WASHI_").map(|key| {
        let key = key.to_lowercase();
        match key.split_once('_') {
            Some((section, field)) => format!("{section}.{field}").into(),
            None => key.into(),
        }
    })
}

/// BM25 scoring configuration section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BmConfig {
    /// Term frequency saturation parameter.
    pub k1: f32,
    /// Document length normalization parameter.
    pub b: f32,
    /// Minimum document frequency a term must reach to be eligible for scoring/kept after pruning.
    pub min_df: u32,
}

impl Default for BmConfig {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            min_df: 2,
        }
    }
}

/// Vector index (IVF+PQ) configuration section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    /// Number of IVF coarse centroids.
    pub nlist: usize,
    /// Number of PQ subvectors (dimension must be divisible by this).
    pub m: usize,
    /// Bits per PQ subvector code.
    pub nbits: u32,
    /// Number of IVF cells probed at search time.
    pub nprobe: usize,
    /// Refinement factor: PQ candidates fetched are `k_factor_rf * top_k`.
    pub k_factor_rf: usize,
}

impl Default for VectorConfig {
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

impl VectorConfig {
    /// Returns the training threshold `T_train = nlist * 39` above which the
    /// vector index promotes from temp (exact) mode to trained (IVF+PQ) mode.
    #[must_use]
    pub const fn train_threshold(&self) -> usize {
        self.nlist * 39
    }
}

/// Hybrid search / fusion configuration section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Include the BM25 branch in fusion.
    pub use_bm25: bool,
    /// Enable cross-encoder rescoring.
    pub use_rerank: bool,
    /// Candidates fetched per retrieval branch.
    pub retrieval_k: usize,
    /// Max candidates passed to the reranker.
    pub rerank_top_k: usize,
    /// Blend weight on the reranker side, in `[0, 1]`.
    pub rerank_weight: f32,
    /// RRF ranking constant.
    pub rrf_k: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            use_bm25: true,
            use_rerank: true,
            retrieval_k: 100,
            rerank_top_k: 20,
            rerank_weight: 0.5,
            rrf_k: 60,
        }
    }
}

/// Chunking configuration section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between hard-sliced windows, in characters.
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// BM25 scoring parameters.
    pub bm25: BmConfig,
    /// Vector index parameters.
    pub vector: VectorConfig,
    /// Hybrid search / fusion parameters.
    pub search: SearchConfig,
    /// Chunking parameters.
    pub chunk: ChunkConfig,
}

impl Config {
    /// Loads configuration from `washi.toml` in the current directory, layered
    /// with `WASHI_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or a value
    /// fails validation.
    pub fn load() -> Result<Self, Error> {
        Self::load_from_path("washi.toml")
    }

    /// Loads configuration from a specific file path. Missing files are
    /// treated as empty (defaults apply).
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is malformed, or a value fails
    /// validation.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(env_provider());

        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a configuration from a TOML string, layered over defaults and
    /// then over `WASHI_*` environment variables, same priority as
    /// [`Self::load_from_path`].
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, Error> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml_str))
            .merge(env_provider());

        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates range/consistency constraints across all sections.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value found.
    pub fn validate(&self) -> Result<(), Error> {
        if self.vector.nlist == 0 {
            return Err(Error::Config("vector.nlist must be > 0".into()));
        }
        if self.vector.m == 0 {
            return Err(Error::Config("vector.m must be > 0".into()));
        }
        if !(1..=16).contains(&self.vector.nbits) {
            return Err(Error::Config(format!(
                "vector.nbits {} is out of range [1, 16]",
                self.vector.nbits
            )));
        }
        if self.vector.nprobe == 0 || self.vector.nprobe > self.vector.nlist {
            return Err(Error::Config(format!(
                "vector.nprobe {} must be in [1, nlist={}]",
                self.vector.nprobe, self.vector.nlist
            )));
        }
        if !(0.0..=1.0).contains(&self.search.rerank_weight) {
            return Err(Error::Config(format!(
                "search.rerank_weight {} is out of range [0.0, 1.0]",
                self.search.rerank_weight
            )));
        }
        if self.search.retrieval_k == 0 {
            return Err(Error::Config("search.retrieval_k must be > 0".into()));
        }
        if self.chunk.chunk_size == 0 {
            return Err(Error::Config("chunk.chunk_size must be > 0".into()));
        }
        if self.chunk.chunk_overlap >= self.chunk.chunk_size {
            return Err(Error::Config(format!(
                "chunk.chunk_overlap {} must be < chunk.chunk_size {}",
                self.chunk.chunk_overlap, self.chunk.chunk_size
            )));
        }
        if self.bm25.k1 < 0.0 {
            return Err(Error::Config("bm25.k1 must be >= 0".into()));
        }
        if !(0.0..=1.0).contains(&self.bm25.b) {
            return Err(Error::Config(format!(
                "bm25.b {} is out of range [0.0, 1.0]",
                self.bm25.b
            )));
        }
        Ok(())
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, Error> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert!((cfg.bm25.k1 - 1.5).abs() < 1e-6);
        assert!((cfg.bm25.b - 0.75).abs() < 1e-6);
        assert_eq!(cfg.bm25.min_df, 2);
        assert_eq!(cfg.vector.nlist, 256);
        assert_eq!(cfg.vector.train_threshold(), 9984);
        assert_eq!(cfg.search.retrieval_k, 100);
        assert_eq!(cfg.chunk.chunk_size, 500);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_overlap_larger_than_size() {
        let toml = "[chunk]\nchunk_size = 100\nchunk_overlap = 200\n";
        let cfg = Config::from_toml(toml);
        assert!(cfg.is_err());
    }

    #[test]
    fn rejects_rerank_weight_out_of_range() {
        let toml = "[search]\nrerank_weight = 1.5\n";
        let cfg = Config::from_toml(toml);
        assert!(cfg.is_err());
    }

    #[test]
    fn env_overrides_file() {
        std::env::set_var("WASHI_BM25_MIN_DF", "5");
        let cfg = Config::from_toml("[bm25]\nmin_df = 3\n").unwrap();
        assert_eq!(cfg.bm25.min_df, 5);
        std::env::remove_var("WASHI_BM25_MIN_DF");
    }
}
