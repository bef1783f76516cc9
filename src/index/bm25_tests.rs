//! Tests for the `bm25` module.

use super::*;

// =========================================================================
// Basic functionality tests
// =========================================================================

#[test]
fn new_index_is_empty() {
    let index = Bm25Index::open_in_memory(Bm25Params::default()).unwrap();
    assert_eq!(index.corpus_size().unwrap(), 0);
    assert_eq!(index.term_count().unwrap(), 0);
}

#[test]
fn add_assigns_contiguous_ids() {
    let index = Bm25Index::open_in_memory(Bm25Params::default()).unwrap();
    let ids = index
        .add(&["rust programming".into(), "python programming".into()])
        .unwrap();
    assert_eq!(ids, vec![0, 1]);
    assert_eq!(index.corpus_size().unwrap(), 2);

    let more = index.add(&["java programming".into()]).unwrap();
    assert_eq!(more, vec![2]);
    assert_eq!(index.corpus_size().unwrap(), 3);
}

// =========================================================================
// Search tests
// =========================================================================

#[test]
fn search_returns_matching_docs() {
    let index = Bm25Index::open_in_memory(Bm25Params { min_df: 1, ..Bm25Params::default() }).unwrap();
    index
        .add(&[
            "rust programming language".into(),
            "python programming language".into(),
            "rust is fast".into(),
        ])
        .unwrap();

    let results = index.search("rust", 10).unwrap();
    let ids: Vec<u32> = results.iter().map(|(id, _)| *id).collect();
    assert!(ids.contains(&0));
    assert!(ids.contains(&2));
    assert!(!ids.contains(&1));
}

#[test]
fn search_empty_query_returns_empty() {
    let index = Bm25Index::open_in_memory(Bm25Params::default()).unwrap();
    index.add(&["rust programming".into()]).unwrap();
    assert!(index.search("", 10).unwrap().is_empty());
}

#[test]
fn search_empty_index_returns_empty() {
    let index = Bm25Index::open_in_memory(Bm25Params::default()).unwrap();
    assert!(index.search("rust", 10).unwrap().is_empty());
}

#[test]
fn search_respects_top_k() {
    let index = Bm25Index::open_in_memory(Bm25Params { min_df: 1, ..Bm25Params::default() }).unwrap();
    let docs: Vec<String> = (0..50)
        .map(|i| format!("document number {i} about rust"))
        .collect();
    index.add(&docs).unwrap();

    let results = index.search("rust", 5).unwrap();
    assert_eq!(results.len(), 5);
}

#[test]
fn search_scores_sorted_descending() {
    let index = Bm25Index::open_in_memory(Bm25Params { min_df: 1, ..Bm25Params::default() }).unwrap();
    index
        .add(&["rust".into(), "rust rust".into(), "rust rust rust".into()])
        .unwrap();

    let results = index.search("rust", 10).unwrap();
    for window in results.windows(2) {
        assert!(window[0].1 >= window[1].1);
    }
}

#[test]
fn duplicate_query_terms_do_not_inflate_score() {
    let index = Bm25Index::open_in_memory(Bm25Params { min_df: 1, ..Bm25Params::default() }).unwrap();
    index.add(&["rust programming".into()]).unwrap();

    let once = index.search("rust", 10).unwrap();
    let repeated = index.search("rust rust rust", 10).unwrap();
    assert_eq!(once, repeated);
}

// =========================================================================
// min_df and vocabulary pruning
// =========================================================================

#[test]
fn min_df_excludes_rare_terms_from_scoring() {
    let index = Bm25Index::open_in_memory(Bm25Params { min_df: 2, ..Bm25Params::default() }).unwrap();
    index.add(&["uniqueterm here".into()]).unwrap();
    // "uniqueterm" has df=1, below min_df=2: must not score.
    assert!(index.search("uniqueterm", 10).unwrap().is_empty());
}

#[test]
fn prune_removes_rare_terms() {
    let index = Bm25Index::open_in_memory(Bm25Params { min_df: 1, ..Bm25Params::default() }).unwrap();
    index
        .add(&[
            "共通の単語がある".into(),
            "共通の単語がある".into(),
            "レアな単語xyz".into(),
        ])
        .unwrap();

    let before = index.term_count().unwrap();
    let deleted = index.prune(2).unwrap();
    let after = index.term_count().unwrap();

    assert!(deleted > 0);
    assert!(after < before);
}

// =========================================================================
// Japanese corpus scenario (spec end-to-end scenario 1)
// =========================================================================

#[test]
fn ramen_corpus_ranks_ramen_doc_first() {
    let index = Bm25Index::open_in_memory(Bm25Params { min_df: 1, ..Bm25Params::default() }).unwrap();
    let corpus = [
        "美味しいラーメン屋に行きたい",
        "素敵なカフェが近所にあるよ",
        "新鮮な魚介を提供する店です",
        "隠れた豚骨の名店だよ",
        "おすすめの中華そばの店",
    ];
    index
        .add(&corpus.iter().map(|s| s.to_string()).collect::<Vec<_>>())
        .unwrap();

    let results = index.search("ラーメン", 3).unwrap();
    assert_eq!(results[0].0, 0);
}

// =========================================================================
// Thread safety
// =========================================================================

#[test]
fn concurrent_reads_do_not_panic() {
    use std::sync::Arc;
    use std::thread;

    let index = Arc::new(
        Bm25Index::open_in_memory(Bm25Params { min_df: 1, ..Bm25Params::default() }).unwrap(),
    );
    let docs: Vec<String> = (0..100)
        .map(|i| format!("document {i} about rust programming"))
        .collect();
    index.add(&docs).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let idx = Arc::clone(&index);
            thread::spawn(move || {
                for _ in 0..20 {
                    let results = idx.search("rust", 10).unwrap();
                    assert!(!results.is_empty());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("thread panicked");
    }
}
