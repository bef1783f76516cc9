//! Unicode-aware tokenizer shared by the BM25 index.
//!
//! # Algorithm
//!
//! 1. Lowercase the input.
//! 2. Extract maximal runs of alphanumeric characters (this naturally spans
//!    ASCII word characters, Hiragana, Katakana, and CJK Unified Ideographs,
//!    since Rust's Unicode-aware [`char::is_alphanumeric`] classifies all of
//!    them as letters).
//! 3. For each run `w`, emit `w` itself; if `w` has at least two characters,
//!    additionally emit every adjacent character bigram.
//!
//! The bigram expansion gives substring recall over Japanese text without a
//! morphological analyzer: a query for a two-character substring of a longer
//! run still matches via its bigram token.

/// Tokenizes `text` into lowercase terms, including bigram expansions.
///
/// Returns tokens in emission order with duplicates preserved (the BM25
/// indexer counts term frequency from this output; callers that need a
/// deduplicated term set, such as query-side lookups, should collect into a
/// `HashSet` themselves).
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut tokens = Vec::new();
    let mut run: Vec<char> = Vec::new();

    for c in lower.chars() {
        if c.is_alphanumeric() {
            run.push(c);
        } else {
            flush_run(&mut run, &mut tokens);
        }
    }
    flush_run(&mut run, &mut tokens);

    tokens
}

fn flush_run(run: &mut Vec<char>, tokens: &mut Vec<String>) {
    if run.is_empty() {
        return;
    }
    tokens.push(run.iter().collect());
    if run.len() >= 2 {
        for pair in run.windows(2) {
            tokens.push(pair.iter().collect());
        }
    }
    run.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: tokenize is idempotent — tokenizing the same string
        /// twice always yields the same token sequence (spec.md §8).
        #[test]
        fn prop_tokenize_is_idempotent(s in "\\PC*") {
            prop_assert_eq!(tokenize(&s), tokenize(&s));
        }

        /// Property: a single run of `n` ASCII letters emits the run itself
        /// plus every length-2 window (spec.md §8).
        #[test]
        fn prop_single_run_emits_itself_and_all_bigrams(s in "[a-z]{2,12}") {
            let tokens = tokenize(&s);
            prop_assert!(tokens.contains(&s));
            for pair in s.chars().collect::<Vec<_>>().windows(2) {
                let bigram: String = pair.iter().collect();
                prop_assert!(tokens.contains(&bigram));
            }
        }
    }

    // =========================================================================
    // Basic functionality tests
    // =========================================================================

    #[test]
    fn tokenize_basic_ascii() {
        let tokens = tokenize("Hello World");
        // "hello" (5 chars) -> word + 4 bigrams, "world" likewise
        assert!(tokens.contains(&"hello".to_string()));
        assert!(tokens.contains(&"world".to_string()));
        assert!(tokens.contains(&"he".to_string()));
        assert!(tokens.contains(&"ld".to_string()));
    }

    #[test]
    fn tokenize_empty() {
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn tokenize_punctuation_separates_runs() {
        let tokens = tokenize("hi, there!");
        assert!(tokens.contains(&"hi".to_string()));
        assert!(tokens.contains(&"there".to_string()));
    }

    // =========================================================================
    // Japanese tokenization tests
    // =========================================================================

    #[test]
    fn tokenize_japanese_whole_word_and_bigrams() {
        let tokens = tokenize("日本語テスト");
        assert!(tokens.contains(&"日本語テスト".to_string()));
        assert!(tokens.contains(&"日本".to_string()));
        assert!(tokens.contains(&"本語".to_string()));
    }

    #[test]
    fn tokenize_single_char_run_has_no_bigram() {
        let tokens = tokenize("あ hello");
        assert_eq!(tokens.iter().filter(|t| t.as_str() == "あ").count(), 1);
    }

    #[test]
    fn tokenize_idempotent() {
        let s = "美味しいラーメン屋に行きたい";
        assert_eq!(tokenize(s), tokenize(s));
    }
}
