//! # washi-search
//!
//! Hybrid BM25 + vector retrieval engine for Japanese PDF document corpora.
//!
//! `washi-search` indexes pre-extracted, pre-chunked document text into a
//! dense IVF+PQ vector index and a binary-posting-list BM25 index sharing a
//! common SQLite-backed metadata store, and answers queries by fusing both
//! branches with Reciprocal Rank Fusion, optionally rescored by a
//! cross-encoder reranker.
//!
//! PDF extraction, the embedding/reranker models, and any HTTP/CLI surface
//! are external collaborators — see [`traits`] for their contracts. This
//! crate owns the retrieval engine core: [`index::vector::VectorIndex`],
//! [`index::bm25::Bm25Index`], [`metadata::MetadataStore`],
//! [`builder::IndexBuilder`], and [`search::HybridSearcher`].
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use washi_search::{builder::IndexBuilder, config::Config, search::HybridSearcher};
//!
//! let mut builder = IndexBuilder::new("embeddings/", Config::load()?, my_embedder, my_extractor)?;
//! builder.add_pdf_file("report.pdf")?;
//! builder.save()?;
//!
//! let searcher = HybridSearcher::new(
//!     Config::load()?.search,
//!     builder.vector(),
//!     builder.bm25(),
//!     builder.metadata(),
//!     &my_embedder,
//! );
//! let results = searcher.search::<MyReranker>("ラーメン", 10, None)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod builder;
pub mod config;
pub mod error;
pub mod fusion;
pub mod index;
pub mod metadata;
pub mod persistence;
pub mod search;
pub mod text;
pub mod traits;

pub use builder::{BuilderStats, IndexBuilder};
pub use config::Config;
pub use error::{Error, Result};
pub use fusion::{DocKey, FusedResult};
pub use metadata::{MetadataRecord, MetadataStore};
pub use search::{HybridSearcher, SearchResult};
pub use traits::{Embedder, ExtractedPage, PageExtractor, Reranker};
