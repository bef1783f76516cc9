//! Binary posting-list encoding (C2 on-disk format).
//!
//! A term's posting list is the concatenation of fixed 6-byte records,
//! `(u32 little-endian doc_id, u16 little-endian tf)`, sorted ascending by
//! `doc_id` with no duplicate ids — `df` is always `postings.len()`.

use crate::error::{Error, Result};

/// Size in bytes of one posting record.
pub const RECORD_SIZE: usize = 6;

/// A single posting: a document id and its saturating term frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    /// Document id this posting belongs to.
    pub doc_id: u32,
    /// Term frequency within that document, saturated to `u16::MAX`.
    pub tf: u16,
}

impl Posting {
    /// Creates a posting, saturating `tf` to `u16::MAX` if it overflows.
    #[must_use]
    pub fn new(doc_id: u32, tf: u32) -> Self {
        Self {
            doc_id,
            tf: u16::try_from(tf).unwrap_or(u16::MAX),
        }
    }
}

/// Encodes postings, which must already be sorted ascending by `doc_id`, into
/// the 6-byte-record binary blob.
#[must_use]
pub fn encode(postings: &[Posting]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(postings.len() * RECORD_SIZE);
    for p in postings {
        buf.extend_from_slice(&p.doc_id.to_le_bytes());
        buf.extend_from_slice(&p.tf.to_le_bytes());
    }
    buf
}

/// Decodes a binary posting blob into postings, preserving on-disk order.
///
/// # Errors
///
/// Returns [`Error::FormatError`] if `blob.len()` is not a multiple of
/// [`RECORD_SIZE`] (a truncated or corrupted blob).
pub fn decode(blob: &[u8]) -> Result<Vec<Posting>> {
    if blob.len() % RECORD_SIZE != 0 {
        return Err(Error::FormatError(format!(
            "posting blob length {} is not a multiple of {RECORD_SIZE}",
            blob.len()
        )));
    }
    let mut out = Vec::with_capacity(blob.len() / RECORD_SIZE);
    for chunk in blob.chunks_exact(RECORD_SIZE) {
        let doc_id = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let tf = u16::from_le_bytes([chunk[4], chunk[5]]);
        out.push(Posting { doc_id, tf });
    }
    Ok(out)
}

/// Merges two ascending, duplicate-free posting lists into one ascending,
/// duplicate-free list. On a doc-id collision `new` wins (this only occurs if
/// a doc id is re-added, which does not happen under the append-only
/// contract; kept for defensiveness rather than assumed).
#[must_use]
pub fn merge(existing: &[Posting], new: &[Posting]) -> Vec<Posting> {
    let mut merged = Vec::with_capacity(existing.len() + new.len());
    let (mut i, mut j) = (0, 0);
    while i < existing.len() && j < new.len() {
        match existing[i].doc_id.cmp(&new[j].doc_id) {
            std::cmp::Ordering::Less => {
                merged.push(existing[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                merged.push(new[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                merged.push(new[j]);
                i += 1;
                j += 1;
            }
        }
    }
    merged.extend_from_slice(&existing[i..]);
    merged.extend_from_slice(&new[j..]);
    merged
}
