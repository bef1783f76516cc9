//! BM25 full-text search index for hybrid search (C2).
//!
//! # Algorithm
//!
//! BM25 score for a document D and query Q:
//! ```text
//! score(D, Q) = Σ idf(qi) * (f(qi, D) * (k1 + 1)) / (f(qi, D) + k1 * (1 - b + b * |D| / avgdl))
//! ```
//!
//! Where:
//! - `f(qi, D)` = term frequency of `qi` in `D`
//! - `|D|` = document length (token count, including bigrams)
//! - `avgdl` = average document length
//! - `k1 = 1.5`, `b = 0.75` (Okapi BM25 defaults for this corpus)
//!
//! Postings are persisted as binary blobs (see [`crate::index::posting`]) in a
//! SQLite store with WAL journaling; `stats`/`doc_lens`/`terms` tables match
//! the on-disk layout in the spec's external-interfaces section.
//!
//! # Example
//!
//! ```rust,ignore
//! use washi_search::index::bm25::{Bm25Index, Bm25Params};
//!
//! let index = Bm25Index::open_in_memory(Bm25Params::default())?;
//! index.add(&["rust programming language".into(), "python programming".into()])?;
//! let results = index.search("rust", 10)?;
//! ```

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use rustc_hash::FxHashMap;
use std::path::Path;

use super::posting::{self, Posting};
use crate::error::{Error, Result};
use crate::text::tokenizer::tokenize;

/// BM25 tuning parameters.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    /// Term frequency saturation parameter.
    pub k1: f32,
    /// Document length normalization parameter.
    pub b: f32,
    /// Minimum document frequency a term must reach to contribute to scoring.
    pub min_df: u32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            min_df: 2,
        }
    }
}

/// SQLite-backed BM25 full-text index.
///
/// A single connection guarded by a mutex serializes all access.
/// `rusqlite::Connection` is `Send` but not `Sync`; wrapping it is the
/// simplest way to share one index across reader threads, and matches the
/// "single-writer, many-reader" scheduling model the engine targets — readers
/// never block each other for long since queries are in-process CPU work, not
/// blocking I/O.
pub struct Bm25Index {
    conn: Mutex<Connection>,
    params: Bm25Params,
}

impl Bm25Index {
    /// Opens (creating if absent) a BM25 store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open<P: AsRef<Path>>(path: P, params: Bm25Params) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            params,
        })
    }

    /// Opens an in-memory BM25 store, useful for tests and transient indices.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be initialized.
    pub fn open_in_memory(params: Bm25Params) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            params,
        })
    }

    fn init_connection(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "cache_size", -64_000i64)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS stats (key TEXT PRIMARY KEY, value REAL NOT NULL);
             CREATE TABLE IF NOT EXISTS doc_lens (doc_id INTEGER PRIMARY KEY, length INTEGER NOT NULL);
             CREATE TABLE IF NOT EXISTS terms (term TEXT PRIMARY KEY, df INTEGER NOT NULL, postings BLOB NOT NULL);",
        )?;
        Ok(())
    }

    fn read_corpus_size(conn: &Connection) -> Result<u64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM doc_lens", [], |r| r.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn read_avgdl(conn: &Connection) -> Result<f64> {
        let (count, total): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(length), 0) FROM doc_lens",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        if count == 0 {
            Ok(0.0)
        } else {
            Ok(total as f64 / count as f64)
        }
    }

    /// Returns the number of documents currently indexed.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    pub fn corpus_size(&self) -> Result<u64> {
        Self::read_corpus_size(&self.conn.lock())
    }

    /// Returns the average document length (in tokens) across the corpus.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    pub fn avgdl(&self) -> Result<f64> {
        Self::read_avgdl(&self.conn.lock())
    }

    /// Returns the number of distinct terms in the vocabulary.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    pub fn term_count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM terms", [], |r| r.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Adds `texts` to the index, assigning contiguous doc-ids starting at the
    /// current corpus size, and returns the assigned ids in order.
    ///
    /// # Errors
    ///
    /// Returns an error if tokenization, posting merge, or the underlying
    /// transaction fails.
    pub fn add(&self, texts: &[String]) -> Result<Vec<u32>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let start_id = u32::try_from(Self::read_corpus_size(&tx)?)
            .map_err(|_| Error::Internal("corpus size exceeds u32::MAX".into()))?;

        let mut batch_terms: FxHashMap<String, FxHashMap<u32, u32>> = FxHashMap::default();
        let mut assigned_ids = Vec::with_capacity(texts.len());

        for (i, text) in texts.iter().enumerate() {
            let doc_id = start_id
                + u32::try_from(i).map_err(|_| Error::Internal("batch too large".into()))?;
            assigned_ids.push(doc_id);

            let tokens = tokenize(text);
            let length = u32::try_from(tokens.len()).unwrap_or(u32::MAX);
            tx.execute(
                "INSERT INTO doc_lens (doc_id, length) VALUES (?1, ?2)",
                params![doc_id, length],
            )?;

            let mut tf_map: FxHashMap<String, u32> = FxHashMap::default();
            for tok in tokens {
                *tf_map.entry(tok).or_insert(0) += 1;
            }
            for (term, tf) in tf_map {
                batch_terms.entry(term).or_default().insert(doc_id, tf);
            }
        }

        for (term, doc_tfs) in batch_terms {
            let existing_blob: Option<Vec<u8>> = tx
                .query_row(
                    "SELECT postings FROM terms WHERE term = ?1",
                    params![term],
                    |r| r.get(0),
                )
                .optional()?;
            let existing = match existing_blob {
                Some(blob) => posting::decode(&blob)?,
                None => Vec::new(),
            };

            let mut new_postings: Vec<Posting> = doc_tfs
                .into_iter()
                .map(|(doc_id, tf)| Posting::new(doc_id, tf))
                .collect();
            new_postings.sort_by_key(|p| p.doc_id);

            let merged = posting::merge(&existing, &new_postings);
            let df = u32::try_from(merged.len()).unwrap_or(u32::MAX);
            let blob = posting::encode(&merged);

            tx.execute(
                "INSERT INTO terms (term, df, postings) VALUES (?1, ?2, ?3)
                 ON CONFLICT(term) DO UPDATE SET df = excluded.df, postings = excluded.postings",
                params![term, df, blob],
            )?;
        }

        let corpus_size = Self::read_corpus_size(&tx)?;
        let avgdl = Self::read_avgdl(&tx)?;
        Self::upsert_stat(&tx, "corpus_size", corpus_size as f64)?;
        Self::upsert_stat(&tx, "avgdl", avgdl)?;

        tx.commit()?;
        Ok(assigned_ids)
    }

    fn upsert_stat(conn: &Connection, key: &str, value: f64) -> Result<()> {
        conn.execute(
            "INSERT INTO stats (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Searches the index for documents matching `query`.
    ///
    /// Query terms are deduplicated into a set before lookup (by design:
    /// repeating a term in the query does not inflate its contribution).
    /// Terms with document frequency below `min_df` are skipped. Results are
    /// sorted by descending score, ties broken by ascending doc-id.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read or a stored
    /// posting blob is corrupted.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<(u32, f32)>> {
        let conn = self.conn.lock();

        let corpus_size = Self::read_corpus_size(&conn)?;
        if corpus_size == 0 {
            return Ok(Vec::new());
        }

        let query_terms: std::collections::HashSet<String> = tokenize(query).into_iter().collect();
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let avgdl = Self::read_avgdl(&conn)?;
        let n = corpus_size as f32;
        let k1 = self.params.k1;
        let b = self.params.b;

        let mut term_postings: Vec<(f32, Vec<Posting>)> = Vec::new();
        for term in &query_terms {
            let row: Option<(u32, Vec<u8>)> = conn
                .query_row(
                    "SELECT df, postings FROM terms WHERE term = ?1",
                    params![term],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()?;
            let Some((df, blob)) = row else { continue };
            if df < self.params.min_df {
                continue;
            }
            let df_f = df as f32;
            let idf = ((n - df_f + 0.5) / (df_f + 0.5) + 1.0).ln();
            term_postings.push((idf, posting::decode(&blob)?));
        }

        if term_postings.is_empty() {
            return Ok(Vec::new());
        }

        let mut candidate_ids: std::collections::BTreeSet<u32> = std::collections::BTreeSet::new();
        for (_, postings) in &term_postings {
            candidate_ids.extend(postings.iter().map(|p| p.doc_id));
        }

        let doc_lens = Self::read_doc_lens(&conn, &candidate_ids)?;

        let mut scores: FxHashMap<u32, f32> = FxHashMap::default();
        for (idf, postings) in &term_postings {
            for posting in postings {
                let Some(&doc_len) = doc_lens.get(&posting.doc_id) else { continue };
                let tf = f32::from(posting.tf);
                let len_norm = 1.0 - b + b * (doc_len as f32) / avgdl;
                let numerator = tf * (k1 + 1.0);
                let denominator = tf + k1 * len_norm;
                *scores.entry(posting.doc_id).or_insert(0.0) += idf * numerator / denominator;
            }
        }

        let mut results: Vec<(u32, f32)> = scores.into_iter().collect();
        results.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        results.truncate(top_k);
        Ok(results)
    }

    fn read_doc_lens(
        conn: &Connection,
        ids: &std::collections::BTreeSet<u32>,
    ) -> Result<FxHashMap<u32, u32>> {
        let mut out = FxHashMap::default();
        if ids.is_empty() {
            return Ok(out);
        }
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!("SELECT doc_id, length FROM doc_lens WHERE doc_id IN ({placeholders})");
        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> =
            ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
        let mut rows = stmt.query(params.as_slice())?;
        while let Some(row) = rows.next()? {
            out.insert(row.get(0)?, row.get(1)?);
        }
        Ok(out)
    }

    /// Restores the index from a legacy snapshot's already-tokenized
    /// doc-lengths and postings, dropping terms below `min_df` during the
    /// restore rather than carrying them over for a later [`Self::prune`].
    /// Only sensible to call on an empty index; the caller is responsible
    /// for that check (see [`crate::persistence::migrate_legacy_bm25`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying transaction fails.
    pub fn migrate_from_snapshot(
        &self,
        doc_lengths: &[u32],
        postings: &FxHashMap<String, Vec<Posting>>,
    ) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        for (doc_id, &length) in doc_lengths.iter().enumerate() {
            tx.execute(
                "INSERT INTO doc_lens (doc_id, length) VALUES (?1, ?2)",
                params![u32::try_from(doc_id).unwrap_or(u32::MAX), length],
            )?;
        }

        for (term, term_postings) in postings {
            if term_postings.len() < self.params.min_df as usize {
                continue;
            }
            let mut sorted = term_postings.clone();
            sorted.sort_by_key(|p| p.doc_id);
            let df = u32::try_from(sorted.len()).unwrap_or(u32::MAX);
            let blob = posting::encode(&sorted);
            tx.execute(
                "INSERT INTO terms (term, df, postings) VALUES (?1, ?2, ?3)",
                params![term, df, blob],
            )?;
        }

        let corpus_size = Self::read_corpus_size(&tx)?;
        let avgdl = Self::read_avgdl(&tx)?;
        Self::upsert_stat(&tx, "corpus_size", corpus_size as f64)?;
        Self::upsert_stat(&tx, "avgdl", avgdl)?;

        tx.commit()?;
        Ok(())
    }

    /// Drops every term whose document frequency is below `min_df`, and
    /// returns the number of terms removed. Intended as an offline
    /// maintenance operation; the engine's single-writer model blocks ingest
    /// for the duration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read or written.
    pub fn prune(&self, min_df: u32) -> Result<u64> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM terms WHERE df < ?1", params![min_df])?;
        Ok(deleted as u64)
    }
}

#[cfg(test)]
#[path = "bm25_tests.rs"]
mod bm25_tests;
