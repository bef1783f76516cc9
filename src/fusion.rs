//! C5 score fusion: Reciprocal Rank Fusion over (file, page) groups, plus the
//! optional cross-encoder blend.
//!
//! The RRF grouping key is a `(String, u32)` file/page pair, never a hash of
//! the pair — a hashed key collides silently at scale, which this crate
//! avoids by keeping the key itself around for grouping and for tie-break
//! ordering.

#![allow(clippy::cast_precision_loss)]

use rustc_hash::FxHashMap;

use crate::metadata::MetadataRecord;

/// Grouping key for fusion: source file and page, never a hash of the pair.
pub type DocKey = (String, u32);

/// A single `(doc_key, metadata, score)` result surviving a fusion stage.
#[derive(Debug, Clone)]
pub struct FusedResult {
    /// The grouping key this result was merged under.
    pub key: DocKey,
    /// First-seen metadata for this key.
    pub metadata: MetadataRecord,
    /// The result's score at this stage (RRF score, or the final blended score).
    pub score: f32,
}

/// One retrieval branch's ranked results, each already hydrated with
/// metadata, in descending-score order.
pub type RankedBranch = Vec<MetadataRecord>;

/// Fuses one or more ranked branches via Reciprocal Rank Fusion.
///
/// `rrf(key) = Σ_branch 1/(k + rank_branch(key) + 1)`, rank 0-indexed. A key
/// absent from a branch contributes nothing from that branch. The first
/// branch in which a key appears supplies its metadata for the merged
/// result. Ties in the final RRF score are broken by first-seen order across
/// the concatenation of branches.
#[must_use]
pub fn rrf_merge(branches: &[RankedBranch], k: u32) -> Vec<FusedResult> {
    let mut scores: FxHashMap<DocKey, f32> = FxHashMap::default();
    let mut first_seen: FxHashMap<DocKey, (MetadataRecord, usize)> = FxHashMap::default();
    let mut order = 0usize;

    for branch in branches {
        for (rank, record) in branch.iter().enumerate() {
            let key = (record.file.clone(), record.page);
            let contribution = 1.0 / (f64::from(k) + rank as f64 + 1.0);
            *scores.entry(key.clone()).or_insert(0.0) += contribution as f32;
            first_seen.entry(key).or_insert_with(|| {
                let entry = (record.clone(), order);
                order += 1;
                entry
            });
        }
    }

    let mut results: Vec<FusedResult> = scores
        .into_iter()
        .map(|(key, score)| {
            let (metadata, _) = first_seen
                .get(&key)
                .cloned()
                .expect("every scored key was inserted into first_seen in the same pass");
            FusedResult { key, metadata, score }
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| first_seen[&a.key].1.cmp(&first_seen[&b.key].1))
    });
    results
}

/// Blends normalized cross-encoder scores with normalized RRF scores.
///
/// `final = w * s_cross_norm + (1 - w) * s_rrf_norm`, where `s_rrf_norm` is
/// each candidate's RRF score divided by the maximum RRF score among the
/// candidates, and `s_cross_norm` is the logistic squash of the raw
/// cross-encoder logit: `1 / (1 + exp(-s_cross))`.
///
/// `cross_scores` must be the same length as `candidates`, in the same
/// order. Returns candidates re-sorted by descending blended score.
#[must_use]
pub fn blend_with_rerank(
    candidates: Vec<FusedResult>,
    cross_scores: &[f32],
    weight: f32,
) -> Vec<FusedResult> {
    debug_assert_eq!(candidates.len(), cross_scores.len());
    if candidates.is_empty() {
        return candidates;
    }

    let max_rrf = candidates.iter().map(|c| c.score).fold(f32::MIN, f32::max);

    let mut blended: Vec<FusedResult> = candidates
        .into_iter()
        .zip(cross_scores)
        .map(|(mut c, &s_cross)| {
            let s_cross_norm = 1.0 / (1.0 + (-s_cross).exp());
            let s_rrf_norm = c.score / max_rrf;
            c.score = weight * s_cross_norm + (1.0 - weight) * s_rrf_norm;
            c
        })
        .collect();

    blended.sort_by(|a, b| b.score.total_cmp(&a.score));
    blended
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(file: &str, page: u32) -> MetadataRecord {
        MetadataRecord {
            id: 0,
            text: format!("{file}:{page}"),
            file: file.to_string(),
            page,
            chunk: 0,
        }
    }

    // === RRF worked example from the fusion specification ===
    // Vector ranks [A, B, C]; BM25 ranks [C, A, D]; k=60.
    // RRF(A) = 1/61 + 1/62, RRF(C) = 1/63 + 1/61, RRF(B) = 1/62, RRF(D) = 1/63.
    // Expected order: A, C, B, D.
    #[test]
    fn rrf_merge_matches_worked_example() {
        let a = record("a.pdf", 0);
        let b = record("b.pdf", 0);
        let c = record("c.pdf", 0);
        let d = record("d.pdf", 0);

        let vector_branch = vec![a.clone(), b.clone(), c.clone()];
        let bm25_branch = vec![c.clone(), a.clone(), d.clone()];

        let results = rrf_merge(&[vector_branch, bm25_branch], 60);
        let order: Vec<&str> = results.iter().map(|r| r.key.0.as_str()).collect();
        assert_eq!(order, vec!["a.pdf", "c.pdf", "b.pdf", "d.pdf"]);
    }

    #[test]
    fn rrf_merge_keys_by_file_page_pair_not_hash() {
        let branch = vec![record("same.pdf", 0), record("same.pdf", 1)];
        let results = rrf_merge(&[branch], 60);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn rrf_merge_missing_branch_contributes_nothing() {
        let a = record("a.pdf", 0);
        let only_in_one = vec![a.clone()];
        let empty: RankedBranch = Vec::new();
        let results = rrf_merge(&[only_in_one, empty], 60);
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 1.0 / 61.0).abs() < 1e-6);
    }

    #[test]
    fn rrf_monotonicity_raising_rank_does_not_lower_score() {
        let a = record("a.pdf", 0);
        let b = record("b.pdf", 0);
        let low_rank = rrf_merge(&[vec![b.clone(), a.clone()]], 60);
        let high_rank = rrf_merge(&[vec![a.clone(), b.clone()]], 60);

        let score_of = |results: &[FusedResult], file: &str| {
            results.iter().find(|r| r.key.0 == file).unwrap().score
        };
        assert!(score_of(&high_rank, "a.pdf") >= score_of(&low_rank, "a.pdf"));
    }

    #[test]
    fn blend_weights_cross_encoder_and_rrf() {
        let candidates = vec![
            FusedResult { key: ("a.pdf".into(), 0), metadata: record("a.pdf", 0), score: 1.0 },
            FusedResult { key: ("b.pdf".into(), 0), metadata: record("b.pdf", 0), score: 0.5 },
        ];
        // b has a much higher cross-encoder logit than a.
        let blended = blend_with_rerank(candidates, &[0.0, 5.0], 0.5);
        assert_eq!(blended[0].key.0, "b.pdf");
    }

    #[test]
    fn blend_on_empty_candidates_is_empty() {
        assert!(blend_with_rerank(Vec::new(), &[], 0.5).is_empty());
    }
}
