//! Content-page filtering (C6).
//!
//! Rejects pages that carry no retrievable prose: tables of contents, index
//! pages, bare page-number filler, and chapter-title-only pages.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

const MIN_TEXT_LENGTH: usize = 100;
const MIN_UNIQUE_CHARS: usize = 20;
const SHORT_PAGE_THRESHOLD: usize = 500;

static SKIP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(目次|索引|contents?|index|第\d+[章節部編]|chapter \d+)$")
        .expect("static skip pattern is valid")
});

static DIGITS_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\d\s\-\.]+$").expect("static digits-only pattern is valid"));

/// Returns `false` if `text` is unlikely to carry retrievable content:
/// - trimmed length under [`MIN_TEXT_LENGTH`] characters,
/// - fewer than [`MIN_UNIQUE_CHARS`] distinct alphabetic characters,
/// - the whole page is digits/whitespace/dashes/dots (page-number filler),
/// - the first line is a TOC/index/chapter-title marker and the page is short.
#[must_use]
pub fn is_content_page(text: &str) -> bool {
    let trimmed = text.trim();
    let len = trimmed.chars().count();
    if len < MIN_TEXT_LENGTH {
        return false;
    }

    let unique_alpha: HashSet<char> = trimmed.chars().filter(|c| c.is_alphabetic()).collect();
    if unique_alpha.len() < MIN_UNIQUE_CHARS {
        return false;
    }

    if DIGITS_ONLY.is_match(trimmed) {
        return false;
    }

    if let Some(first_line) = trimmed.lines().next() {
        if SKIP_PATTERN.is_match(first_line.trim()) && len < SHORT_PAGE_THRESHOLD {
            return false;
        }
    }

    true
}
