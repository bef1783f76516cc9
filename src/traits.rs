//! Contracts for external collaborators.
//!
//! PDF extraction, embedding, and reranking are out of scope for this crate;
//! only the interfaces the coordinator and searcher call against are defined
//! here. Production callers supply concrete implementations (a PDF parser, an
//! embedding model, a cross-encoder) that satisfy these traits.

use crate::error::Result;

/// One page of extracted text from a source document.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    /// Zero-indexed page number within the source document.
    pub page: u32,
    /// Extracted text content.
    pub text: String,
}

/// Produces pages of text from raw document bytes.
///
/// Implementations own the concrete document format (PDF, etc); this crate
/// only consumes `{page, text}` records.
pub trait PageExtractor {
    /// Extracts pages from `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::ExtractionFailure`] if the document
    /// cannot be parsed or yields no pages.
    fn extract(&self, bytes: &[u8]) -> Result<Vec<ExtractedPage>>;
}

/// Produces fixed-dimension dense embeddings for text.
///
/// Vectors need not be pre-normalized; [`crate::index::vector::VectorIndex`]
/// normalizes on insertion and query.
pub trait Embedder {
    /// The dimension of vectors this embedder produces.
    fn dimension(&self) -> usize;

    /// Embeds a batch of texts, returning one vector per input in order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::EmbedderFailure`] on model or input
    /// error.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Scores `(query, candidate)` pairs for relevance.
pub trait Reranker {
    /// Computes a relevance score for each `(query, candidate text)` pair, in
    /// order. Scores are calibrated cross-encoder logits, not probabilities;
    /// callers normalize via a logistic squash before blending.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::RerankerFailure`] on model error.
    fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>>;
}
