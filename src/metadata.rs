//! Persistent metadata store (C1): the join key across C1/C2/C3.
//!
//! Records are buffered in memory on [`MetadataStore::append`] and only
//! become durable on [`MetadataStore::flush`]. The coordinator (C4) commits
//! in the order vector-index, BM25, metadata-append, metadata-flush; if the
//! process crashes between append and flush the other stores are ahead of
//! disk, which [`crate::persistence::verify`] detects.

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

use crate::error::Result;

/// One retrievable span of text: a chunk from one page of one file.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    /// Dense, monotonically assigned document id; join key across stores.
    pub id: u32,
    /// The chunk's text.
    pub text: String,
    /// Source filename, stored exactly as given (never normalized at write time).
    pub file: String,
    /// Zero-indexed page number within the file.
    pub page: u32,
    /// Zero-indexed chunk number within the page.
    pub chunk: u32,
}

/// Fields needed to append a record; `id` is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewRecord {
    /// The chunk's text.
    pub text: String,
    /// Source filename, stored exactly as given.
    pub file: String,
    /// Zero-indexed page number within the file.
    pub page: u32,
    /// Zero-indexed chunk number within the page.
    pub chunk: u32,
}

/// Persistent, append-only metadata store.
pub struct MetadataStore {
    conn: Mutex<Connection>,
    buffer: Mutex<Vec<MetadataRecord>>,
}

impl MetadataStore {
    /// Opens (creating if absent) a metadata store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            buffer: Mutex::new(Vec::new()),
        })
    }

    /// Opens an in-memory metadata store, for tests and transient indices.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be initialized.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            buffer: Mutex::new(Vec::new()),
        })
    }

    fn init_connection(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "cache_size", -64_000i64)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS metadata (
                id INTEGER PRIMARY KEY,
                text TEXT NOT NULL,
                file TEXT NOT NULL,
                page INTEGER NOT NULL,
                chunk INTEGER NOT NULL DEFAULT 0
             );
             CREATE INDEX IF NOT EXISTS idx_metadata_file_page ON metadata(file, page);",
        )?;
        Ok(())
    }

    /// Buffers `records` in memory, assigning contiguous ids starting at
    /// `start_id`. Returns the number of records buffered. Not durable until
    /// [`Self::flush`] is called.
    pub fn append(&self, records: &[NewRecord], start_id: u32) -> usize {
        let mut buffer = self.buffer.lock();
        for (i, r) in records.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let id = start_id + i as u32;
            buffer.push(MetadataRecord {
                id,
                text: r.text.clone(),
                file: r.file.clone(),
                page: r.page,
                chunk: r.chunk,
            });
        }
        records.len()
    }

    /// Atomically persists every buffered record and clears the buffer.
    /// Returns the number of records flushed.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying transaction fails; the buffer is
    /// left untouched on failure so the caller can retry.
    pub fn flush(&self) -> Result<usize> {
        let mut buffer = self.buffer.lock();
        if buffer.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for record in buffer.iter() {
            tx.execute(
                "INSERT INTO metadata (id, text, file, page, chunk) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET text = excluded.text, file = excluded.file,
                     page = excluded.page, chunk = excluded.chunk",
                params![record.id, record.text, record.file, record.page, record.chunk],
            )?;
        }
        tx.commit()?;

        let n = buffer.len();
        buffer.clear();
        Ok(n)
    }

    /// Returns records matching `ids`, in the order requested, silently
    /// dropping unknown ids. Checks the in-memory buffer before the
    /// persisted store so not-yet-flushed records are visible to the caller
    /// that just appended them.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    pub fn fetch(&self, ids: &[u32]) -> Result<Vec<MetadataRecord>> {
        let buffer = self.buffer.lock();
        let conn = self.conn.lock();

        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(record) = buffer.iter().find(|r| r.id == id) {
                out.push(record.clone());
                continue;
            }
            let record: Option<MetadataRecord> = conn
                .query_row(
                    "SELECT id, text, file, page, chunk FROM metadata WHERE id = ?1",
                    params![id],
                    |row| {
                        Ok(MetadataRecord {
                            id: row.get(0)?,
                            text: row.get(1)?,
                            file: row.get(2)?,
                            page: row.get(3)?,
                            chunk: row.get(4)?,
                        })
                    },
                )
                .ok();
            if let Some(record) = record {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Total number of records: persisted plus buffered. Used by the
    /// coordinator to assign the next batch's `start_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    pub fn count(&self) -> Result<u64> {
        let buffer_len = self.buffer.lock().len() as u64;
        let conn = self.conn.lock();
        let persisted: i64 = conn.query_row("SELECT COUNT(*) FROM metadata", [], |r| r.get(0))?;
        Ok(persisted.max(0) as u64 + buffer_len)
    }

    /// Returns distinct filenames among persisted records, NFC-normalized.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    pub fn files(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT DISTINCT file FROM metadata")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = std::collections::BTreeSet::new();
        for row in rows {
            out.insert(row?.nfc().collect::<String>());
        }
        Ok(out.into_iter().collect())
    }

    /// Returns persisted records whose filename matches `name`, probing NFC,
    /// then NFD, then the raw string, returning the first non-empty result.
    /// Filenames are never normalized at write time, only at lookup, so this
    /// three-probe chain tolerates mixed normalization forms on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    pub fn by_file(&self, name: &str) -> Result<Vec<MetadataRecord>> {
        let conn = self.conn.lock();
        for candidate in [
            name.nfc().collect::<String>(),
            name.nfd().collect::<String>(),
            name.to_string(),
        ] {
            let records = Self::query_by_file(&conn, &candidate)?;
            if !records.is_empty() {
                return Ok(records);
            }
        }
        Ok(Vec::new())
    }

    fn query_by_file(conn: &Connection, file: &str) -> Result<Vec<MetadataRecord>> {
        let mut stmt = conn.prepare(
            "SELECT id, text, file, page, chunk FROM metadata WHERE file = ?1 ORDER BY page, chunk",
        )?;
        let rows = stmt.query_map(params![file], |row| {
            Ok(MetadataRecord {
                id: row.get(0)?,
                text: row.get(1)?,
                file: row.get(2)?,
                page: row.get(3)?,
                chunk: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str, file: &str, page: u32, chunk: u32) -> NewRecord {
        NewRecord {
            text: text.to_string(),
            file: file.to_string(),
            page,
            chunk,
        }
    }

    #[test]
    fn append_buffers_without_persisting() {
        let store = MetadataStore::open_in_memory().unwrap();
        let n = store.append(&[record("hello", "a.pdf", 0, 0)], 0);
        assert_eq!(n, 1);
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.fetch(&[0]).unwrap().len() == 1);
    }

    #[test]
    fn flush_persists_and_clears_buffer() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.append(&[record("hello", "a.pdf", 0, 0), record("world", "a.pdf", 0, 1)], 0);
        let flushed = store.flush().unwrap();
        assert_eq!(flushed, 2);
        assert_eq!(store.flush().unwrap(), 0);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn fetch_drops_unknown_ids_and_preserves_order() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.append(&[record("a", "f.pdf", 0, 0), record("b", "f.pdf", 1, 0)], 0);
        store.flush().unwrap();

        let fetched = store.fetch(&[1, 99, 0]).unwrap();
        let ids: Vec<u32> = fetched.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 0]);
    }

    #[test]
    fn files_returns_distinct_nfc_normalized_names() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.append(&[record("a", "resume.pdf", 0, 0), record("b", "resume.pdf", 1, 0)], 0);
        store.flush().unwrap();
        assert_eq!(store.files().unwrap(), vec!["resume.pdf".to_string()]);
    }

    #[test]
    fn by_file_finds_records_for_exact_name() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.append(&[record("a", "report.pdf", 0, 0), record("b", "other.pdf", 0, 0)], 0);
        store.flush().unwrap();

        let records = store.by_file("report.pdf").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "a");
    }

    #[test]
    fn by_file_falls_back_through_normalization_forms() {
        let store = MetadataStore::open_in_memory().unwrap();
        // "résumé" stored in NFD (decomposed) form.
        let nfd_name: String = "résumé".nfd().collect();
        store.append(&[record("content", &nfd_name, 0, 0)], 0);
        store.flush().unwrap();

        // Looked up via the NFC (composed) form.
        let nfc_name: String = "résumé".nfc().collect();
        let records = store.by_file(&nfc_name).unwrap();
        assert_eq!(records.len(), 1);
    }
}
