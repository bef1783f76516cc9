//! Sentence-boundary-aware chunker (C6).
//!
//! Packs a page's text into chunks of at most `size` characters, splitting on
//! sentence terminators so a chunk boundary rarely falls mid-sentence. A
//! sentence longer than `size` on its own is hard-sliced into overlapping
//! windows so no chunk ever exceeds the size bound.

const SENTENCE_TERMINATORS: [char; 5] = ['。', '．', '！', '？', '\n'];

/// Splits `text` into chunks of at most `size` characters with `overlap`
/// characters of context repeated between adjacent hard-sliced windows.
///
/// All returned chunks are trimmed and non-empty. If `text.trim()` is empty,
/// returns an empty vector.
#[must_use]
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed.chars().count() <= size {
        return vec![trimmed.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in split_sentences(trimmed) {
        let sentence_len = sentence.chars().count();

        if sentence_len > size {
            flush(&mut chunks, &mut current, &mut current_len);
            for window in hard_slice(&sentence, size, overlap) {
                push_trimmed(&mut chunks, &window);
            }
            continue;
        }

        if current_len + sentence_len > size && !current.is_empty() {
            flush(&mut chunks, &mut current, &mut current_len);
        }
        current.push_str(&sentence);
        current_len += sentence_len;
    }
    flush(&mut chunks, &mut current, &mut current_len);

    chunks
}

fn flush(chunks: &mut Vec<String>, current: &mut String, current_len: &mut usize) {
    if !current.is_empty() {
        push_trimmed(chunks, current);
        current.clear();
        *current_len = 0;
    }
}

fn push_trimmed(chunks: &mut Vec<String>, s: &str) {
    let t = s.trim();
    if !t.is_empty() {
        chunks.push(t.to_string());
    }
}

/// Splits on sentence-terminating characters, keeping each terminator
/// attached to the sentence it closes.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        current.push(c);
        if SENTENCE_TERMINATORS.contains(&c) {
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        sentences.push(current);
    }
    sentences
}

/// Slices `s` into `size`-wide character windows advancing by `size - overlap`.
fn hard_slice(s: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let step = size.saturating_sub(overlap).max(1);
    let mut windows = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        windows.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: no chunk ever exceeds `size` characters, regardless of
        /// input text or overlap (spec.md §8, chunker invariant).
        #[test]
        fn prop_no_chunk_exceeds_size(s in "\\PC{0,2000}", size in 10usize..200, overlap in 0usize..9) {
            let chunks = chunk_text(&s, size, overlap);
            for chunk in &chunks {
                prop_assert!(chunk.chars().count() <= size);
                prop_assert!(!chunk.trim().is_empty());
            }
        }
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_text("hello world", 500, 50);
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("   ", 500, 50).is_empty());
    }

    #[test]
    fn chunk_boundary_ends_with_terminator_or_is_short() {
        let sentence = "これは最初の文です。これは二番目の文です。これは三番目の文です。";
        let text = sentence.repeat(50);
        let chunks = chunk_text(&text, 100, 10);
        for chunk in &chunks {
            let ends_with_terminator = chunk.ends_with(['。', '．', '！', '？']);
            assert!(ends_with_terminator || chunk.chars().count() < 100);
            assert!(chunk.chars().count() <= 100);
        }
    }

    #[test]
    fn oversized_sentence_is_hard_sliced() {
        let text = "a".repeat(1000);
        let chunks = chunk_text(&text, 100, 20);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
        }
    }

    #[test]
    fn reconstructs_original_modulo_overlap_and_whitespace() {
        let text = "文A。文B。文C。".repeat(30);
        let chunks = chunk_text(&text, 20, 5);
        let joined: String = chunks.concat();
        // every character of the original appears in the chunked output
        for c in text.chars() {
            assert!(joined.contains(c));
        }
    }
}
