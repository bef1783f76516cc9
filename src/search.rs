//! C5 HybridSearcher: vector + BM25 retrieval, RRF fusion, optional
//! cross-encoder rerank blend.

use crate::config::SearchConfig;
use crate::error::Result;
use crate::fusion::{blend_with_rerank, rrf_merge, FusedResult, RankedBranch};
use crate::index::bm25::Bm25Index;
use crate::index::vector::VectorIndex;
use crate::metadata::{MetadataRecord, MetadataStore};
use crate::traits::{Embedder, Reranker};

/// One final search result: hydrated metadata and its blended/fused score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched chunk's metadata.
    pub metadata: MetadataRecord,
    /// Final score: RRF score, or the rerank-blended score if reranking ran.
    pub score: f32,
}

impl From<FusedResult> for SearchResult {
    fn from(f: FusedResult) -> Self {
        Self { metadata: f.metadata, score: f.score }
    }
}

/// Orchestrates the vector and BM25 retrieval branches, RRF fusion, and the
/// optional cross-encoder rerank blend, over a fixed set of stores.
pub struct HybridSearcher<'a, E: Embedder> {
    config: SearchConfig,
    vector: &'a VectorIndex,
    bm25: &'a Bm25Index,
    metadata: &'a MetadataStore,
    embedder: &'a E,
}

impl<'a, E: Embedder> HybridSearcher<'a, E> {
    /// Builds a searcher over the given stores and configuration.
    #[must_use]
    pub fn new(
        config: SearchConfig,
        vector: &'a VectorIndex,
        bm25: &'a Bm25Index,
        metadata: &'a MetadataStore,
        embedder: &'a E,
    ) -> Self {
        Self { config, vector, bm25, metadata, embedder }
    }

    /// Hydrates `(doc_id, _)` pairs into metadata records, preserving rank
    /// order, in a single batched [`MetadataStore::fetch`] call. Ids with no
    /// surviving metadata (e.g. from a store race) are silently dropped.
    fn hydrate(&self, ranked: &[(u32, f32)]) -> Result<RankedBranch> {
        let ids: Vec<u32> = ranked.iter().map(|(id, _)| *id).collect();
        self.metadata.fetch(&ids)
    }

    /// Runs the vector branch, optionally the BM25 branch, fuses them via
    /// RRF, and (if `use_rerank` and `reranker` is supplied) blends in
    /// cross-encoder scores over the top `rerank_top_k` candidates.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding, either retrieval branch, metadata
    /// hydration, or (when reranking) the reranker call fails.
    pub fn search<R: Reranker>(
        &self,
        query: &str,
        top_k: usize,
        reranker: Option<&R>,
    ) -> Result<Vec<SearchResult>> {
        let retrieval_k = self.config.retrieval_k;

        let query_vector = self
            .embedder
            .embed(std::slice::from_ref(&query.to_string()))?
            .into_iter()
            .next()
            .unwrap_or_default();
        let vector_hits = self.vector.search(&query_vector, retrieval_k)?;
        let vector_branch = self.hydrate(&vector_hits)?;

        let mut branches: Vec<RankedBranch> = vec![vector_branch];
        if self.config.use_bm25 {
            let bm25_hits = self.bm25.search(query, retrieval_k)?;
            branches.push(self.hydrate(&bm25_hits)?);
        }

        let fused = rrf_merge(&branches, self.config.rrf_k);

        let final_results = if self.config.use_rerank && !fused.is_empty() {
            if let Some(reranker) = reranker {
                let mut candidates = fused;
                candidates.truncate(self.config.rerank_top_k);
                let texts: Vec<String> =
                    candidates.iter().map(|c| c.metadata.text.clone()).collect();
                let cross_scores = reranker.score(query, &texts)?;
                blend_with_rerank(candidates, &cross_scores, self.config.rerank_weight)
            } else {
                fused
            }
        } else {
            fused
        };

        Ok(final_results
            .into_iter()
            .take(top_k)
            .map(SearchResult::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::bm25::Bm25Params;
    use crate::metadata::NewRecord;

    struct StubEmbedder;
    impl Embedder for StubEmbedder {
        fn dimension(&self) -> usize {
            4
        }
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0, 0.0]).collect())
        }
    }

    struct StubReranker;
    impl Reranker for StubReranker {
        fn score(&self, _query: &str, candidates: &[String]) -> Result<Vec<f32>> {
            Ok(candidates.iter().map(|_| 2.0).collect())
        }
    }

    fn seeded_stores() -> (VectorIndex, Bm25Index, MetadataStore) {
        let mut vector = VectorIndex::new(4);
        let texts = vec![
            "美味しいラーメン屋に行きたい".to_string(),
            "素敵なカフェが近所にあるよ".to_string(),
        ];
        let bm25 = Bm25Index::open_in_memory(Bm25Params::default()).unwrap();
        bm25.add(&texts).unwrap();

        let metadata = MetadataStore::open_in_memory().unwrap();
        let records: Vec<NewRecord> = texts
            .iter()
            .map(|t| NewRecord { text: t.clone(), file: "a.pdf".to_string(), page: 0, chunk: 0 })
            .collect();
        metadata.append(&records, 0);
        metadata.flush().unwrap();

        vector
            .add(
                &[vec![1.0, 0.0, 0.0, 0.0], vec![0.0, 1.0, 0.0, 0.0]],
                crate::index::vector::IvfPqParams::normative(),
            )
            .unwrap();

        (vector, bm25, metadata)
    }

    #[test]
    fn search_fuses_vector_and_bm25_branches() {
        let (vector, bm25, metadata) = seeded_stores();
        let embedder = StubEmbedder;
        let searcher = HybridSearcher::new(
            SearchConfig { use_rerank: false, ..SearchConfig::default() },
            &vector,
            &bm25,
            &metadata,
            &embedder,
        );
        let results = searcher.search::<StubReranker>("ラーメン", 5, None).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].metadata.text, "美味しいラーメン屋に行きたい");
    }

    #[test]
    fn search_with_rerank_blends_scores() {
        let (vector, bm25, metadata) = seeded_stores();
        let embedder = StubEmbedder;
        let searcher = HybridSearcher::new(
            SearchConfig { use_rerank: true, ..SearchConfig::default() },
            &vector,
            &bm25,
            &metadata,
            &embedder,
        );
        let results = searcher.search(query_for_test(), 5, Some(&StubReranker)).unwrap();
        assert!(!results.is_empty());
    }

    fn query_for_test() -> &'static str {
        "ラーメン"
    }

    #[test]
    fn search_without_bm25_uses_vector_branch_only() {
        let (vector, bm25, metadata) = seeded_stores();
        let embedder = StubEmbedder;
        let searcher = HybridSearcher::new(
            SearchConfig { use_bm25: false, use_rerank: false, ..SearchConfig::default() },
            &vector,
            &bm25,
            &metadata,
            &embedder,
        );
        let results = searcher.search::<StubReranker>("ラーメン", 5, None).unwrap();
        assert!(!results.is_empty());
    }
}
