//! C7 Persistence/Verify: cross-store integrity checks and legacy migration.
//!
//! Saving and loading the individual stores is each store's own
//! responsibility ([`crate::index::vector::VectorIndex::save`]/`load`,
//! opening the SQLite-backed [`crate::index::bm25::Bm25Index`] and
//! [`crate::metadata::MetadataStore`]); this module is the cross-cutting
//! layer: the `|C3| == |C1| == C2.corpus_size` invariant check, and the
//! one-shot legacy-artifact migration described in spec.md §6.

use std::path::Path;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::index::bm25::Bm25Index;
use crate::index::posting::Posting;
use crate::index::vector::{IvfPqParams, VectorIndex};

/// Checks the `|C3| == |C1| == C2.corpus_size` invariant.
///
/// # Errors
///
/// Returns [`Error::IntegrityFailure`] if the three counts disagree.
/// Remediation is re-indexing from source; this is not recoverable in place.
pub fn verify_sizes(vector_count: u64, metadata_count: u64, bm25_count: u64) -> Result<(bool, String)> {
    if vector_count == metadata_count && metadata_count == bm25_count {
        Ok((true, "stores consistent".to_string()))
    } else {
        let message = format!(
            "store size mismatch: vector={vector_count} metadata={metadata_count} bm25={bm25_count}"
        );
        tracing::error!(%message, "verify failed");
        Err(Error::IntegrityFailure(message))
    }
}

/// One-shot migration of a legacy JSON BM25 snapshot (`bm25_stats.json`) into
/// the SQLite-backed index, run only when the current index is empty.
///
/// The legacy snapshot is `{"doc_lengths": [u32, ...], "postings": {term:
/// [[doc_id, tf], ...]}}`, reflecting the shape `bm25_indexer.py`'s
/// `_migrate_from_json` reads. Terms below `min_df` are dropped during
/// migration rather than carried over and pruned later. On success the
/// source file is renamed with a `.old` suffix, which also prevents
/// re-triggering the migration on a later run.
///
/// Returns `true` if a migration ran, `false` if no legacy file was present
/// or the index was already non-empty.
///
/// # Errors
///
/// Returns [`Error::FormatError`] if the legacy file is present but
/// malformed.
pub fn migrate_legacy_bm25(dir: &Path, bm25: &Bm25Index) -> Result<bool> {
    let legacy_path = dir.join("bm25_stats.json");
    if !legacy_path.exists() || bm25.corpus_size()? != 0 {
        return Ok(false);
    }

    let raw = std::fs::read_to_string(&legacy_path)?;
    let snapshot: LegacyBm25Snapshot = serde_json::from_str(&raw)
        .map_err(|e| Error::FormatError(format!("legacy bm25 snapshot malformed: {e}")))?;

    let postings: FxHashMap<String, Vec<Posting>> = snapshot
        .postings
        .into_iter()
        .map(|(term, entries)| {
            let list = entries
                .into_iter()
                .map(|(doc_id, tf)| Posting { doc_id, tf })
                .collect();
            (term, list)
        })
        .collect();

    bm25.migrate_from_snapshot(&snapshot.doc_lengths, &postings)?;

    std::fs::rename(&legacy_path, dir.join("bm25_stats.json.old"))?;
    tracing::info!(n_docs = snapshot.doc_lengths.len(), "migrated legacy bm25 snapshot");
    Ok(true)
}

#[derive(Debug, serde::Deserialize)]
struct LegacyBm25Snapshot {
    doc_lengths: Vec<u32>,
    postings: std::collections::HashMap<String, Vec<(u32, u16)>>,
}

/// One-shot migration of a legacy raw-vectors artifact (`vectors.npz`
/// equivalent — here a bincode-encoded `Vec<Vec<f32>>`) into a fresh
/// [`VectorIndex`], run only when no current `faiss.index` is present.
///
/// If the legacy vector count already exceeds `params.train_threshold()`,
/// the rebuilt index trains immediately into IVF+PQ mode rather than
/// starting in temp mode and promoting on the next `add`. On success the
/// source file is renamed with a `.old` suffix.
///
/// # Errors
///
/// Returns [`Error::FormatError`] if the legacy file is present but
/// malformed.
pub fn migrate_legacy_vectors(
    dir: &Path,
    dim: usize,
    params: IvfPqParams,
) -> Result<Option<VectorIndex>> {
    let legacy_path = dir.join("vectors.npz");
    if !legacy_path.exists() || dir.join("faiss.index").exists() {
        return Ok(None);
    }

    let bytes = std::fs::read(&legacy_path)?;
    let vectors: Vec<Vec<f32>> = bincode::deserialize(&bytes)
        .map_err(|e| Error::FormatError(format!("legacy vector artifact malformed: {e}")))?;

    let mut index = VectorIndex::new(dim);
    index.add(&vectors, params)?;

    std::fs::rename(&legacy_path, dir.join("vectors.npz.old"))?;
    tracing::info!(n_vectors = vectors.len(), "rebuilt vector index from legacy artifact");
    Ok(Some(index))
}
