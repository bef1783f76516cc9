//! C4 IndexBuilder: coordinates ingest across C1/C2/C3.
//!
//! Commits in the fixed order vector-index, BM25, metadata-append,
//! metadata-flush (see [`crate::persistence`] for the consistency window this
//! leaves between a crash and the next `verify()`).

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::index::bm25::{Bm25Index, Bm25Params};
use crate::index::vector::{IvfPqParams, VectorIndex};
use crate::metadata::{MetadataStore, NewRecord};
use crate::text::{chunk_text, is_content_page};
use crate::traits::{Embedder, PageExtractor};

const EMBED_BATCH_SIZE: usize = 32;

/// Aggregate size counters, returned by [`IndexBuilder::stats`].
#[derive(Debug, Clone, Copy)]
pub struct BuilderStats {
    /// Total documents in the metadata store.
    pub doc_count: u64,
    /// Total documents in the BM25 index.
    pub bm25_corpus_size: u64,
    /// Total vectors in the vector index.
    pub vector_count: usize,
    /// Whether the vector index has promoted to trained (IVF+PQ) mode.
    pub vector_trained: bool,
}

/// Coordinates ingest of documents into the metadata, BM25, and vector
/// stores under a single doc-id assignment per batch.
pub struct IndexBuilder<E: Embedder, X: PageExtractor> {
    dir: PathBuf,
    config: Config,
    embedder: E,
    extractor: X,
    vector: VectorIndex,
    bm25: Bm25Index,
    metadata: MetadataStore,
}

impl<E: Embedder, X: PageExtractor> IndexBuilder<E, X> {
    /// Creates a fresh index rooted at `dir`, with no PDFs ingested yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying stores cannot be opened at `dir`.
    pub fn new<P: AsRef<Path>>(dir: P, config: Config, embedder: E, extractor: X) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let dim = embedder.dimension();
        Ok(Self {
            bm25: Bm25Index::open(
                dir.join("bm25.db"),
                Bm25Params {
                    k1: config.bm25.k1,
                    b: config.bm25.b,
                    min_df: config.bm25.min_df,
                },
            )?,
            metadata: MetadataStore::open(dir.join("metadata.db"))?,
            vector: VectorIndex::new(dim),
            dir,
            config,
            embedder,
            extractor,
        })
    }

    /// Reconstructs an index from a directory previously populated by
    /// [`Self::save`]. If a `faiss.index` binary is present it is loaded
    /// directly; otherwise legacy-artifact migration
    /// ([`crate::persistence::migrate_legacy_vectors`]) is attempted before
    /// falling back to an empty temp-mode index. Legacy BM25 migration
    /// ([`crate::persistence::migrate_legacy_bm25`]) runs unconditionally
    /// when the BM25 store is still empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FormatError`] if an on-disk artifact is corrupted, or
    /// any error from opening the underlying stores.
    pub fn load<P: AsRef<Path>>(dir: P, config: Config, embedder: E, extractor: X) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let dim = embedder.dimension();
        let faiss_path = dir.join("faiss.index");

        let bm25 = Bm25Index::open(
            dir.join("bm25.db"),
            Bm25Params {
                k1: config.bm25.k1,
                b: config.bm25.b,
                min_df: config.bm25.min_df,
            },
        )?;
        crate::persistence::migrate_legacy_bm25(&dir, &bm25)?;

        let params: IvfPqParams = config.vector.into();
        let vector = if faiss_path.exists() {
            VectorIndex::load(&faiss_path)?
        } else if let Some(migrated) =
            crate::persistence::migrate_legacy_vectors(&dir, dim, params)?
        {
            migrated
        } else {
            VectorIndex::new(dim)
        };

        Ok(Self {
            bm25,
            metadata: MetadataStore::open(dir.join("metadata.db"))?,
            vector,
            dir,
            config,
            embedder,
            extractor,
        })
    }

    fn ivf_pq_params(&self) -> IvfPqParams {
        self.config.vector.into()
    }

    /// Extracts, filters, chunks, embeds, and indexes `bytes` under
    /// `filename`. Returns the number of chunks ingested and a human-readable
    /// status message.
    ///
    /// Any failure aborts the batch before any store is mutated by it; the
    /// caller must not record `filename` as processed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExtractionFailure`] if extraction fails,
    /// [`Error::NoContent`] if every page is filtered out, or an error from
    /// embedding/indexing.
    pub fn add_pdf(&mut self, bytes: &[u8], filename: &str) -> Result<(usize, String)> {
        let span = tracing::info_span!("add_pdf", filename, n_chunks = tracing::field::Empty);
        let _enter = span.enter();

        let pages = self
            .extractor
            .extract(bytes)
            .map_err(|_| Error::ExtractionFailure(filename.to_string()))?;

        let chunk_size = self.config.chunk.chunk_size;
        let chunk_overlap = self.config.chunk.chunk_overlap;

        let mut texts = Vec::new();
        let mut records = Vec::new();
        for page in &pages {
            if !is_content_page(&page.text) {
                continue;
            }
            for (chunk_idx, chunk) in chunk_text(&page.text, chunk_size, chunk_overlap)
                .into_iter()
                .enumerate()
            {
                records.push(NewRecord {
                    text: chunk.clone(),
                    file: filename.to_string(),
                    page: page.page,
                    #[allow(clippy::cast_possible_truncation)]
                    chunk: chunk_idx as u32,
                });
                texts.push(chunk);
            }
        }

        if texts.is_empty() {
            return Err(Error::NoContent(filename.to_string()));
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            vectors.extend(self.embedder.embed(batch)?);
        }

        self.vector.add(&vectors, self.ivf_pq_params())?;
        self.bm25.add(&texts)?;
        let start_id = u32::try_from(self.metadata.count()?)
            .map_err(|_| Error::Internal("doc count exceeds u32::MAX".to_string()))?;
        self.metadata.append(&records, start_id);

        span.record("n_chunks", texts.len());
        let n = texts.len();
        Ok((n, format!("ingested {n} chunks from {filename}")))
    }

    /// Reads `path` from disk and delegates to [`Self::add_pdf`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, or any error from
    /// [`Self::add_pdf`].
    pub fn add_pdf_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(usize, String)> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("unknown")
            .to_string();
        self.add_pdf(&bytes, &filename)
    }

    /// Flushes buffered metadata and persists all three stores to disk.
    ///
    /// Called explicitly by the caller at a chosen cadence to amortize fsync
    /// cost; `flush` of the metadata buffer happens inside this call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PersistenceFailure`]-class errors on I/O failure.
    pub fn save(&self) -> Result<()> {
        self.metadata.flush()?;
        self.vector.save(
            &self.dir.join("faiss.index"),
            &self.dir.join("index_state.json"),
        )?;
        Ok(())
    }

    /// Cross-store integrity check: `|C3| == |C1| == C2.corpus_size`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IntegrityFailure`] if the stores have diverged.
    pub fn verify(&self) -> Result<(bool, String)> {
        crate::persistence::verify_sizes(
            self.vector.len() as u64,
            self.metadata.count()?,
            self.bm25.corpus_size()?,
        )
    }

    /// Aggregate size counters across all three stores.
    ///
    /// # Errors
    ///
    /// Returns an error if any underlying store cannot be read.
    pub fn stats(&self) -> Result<BuilderStats> {
        Ok(BuilderStats {
            doc_count: self.metadata.count()?,
            bm25_corpus_size: self.bm25.corpus_size()?,
            vector_count: self.vector.len(),
            vector_trained: self.vector.is_trained(),
        })
    }

    /// Read access to the metadata store, for hydration by [`crate::search`].
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Read access to the BM25 index, for the BM25 branch of hybrid search.
    pub fn bm25(&self) -> &Bm25Index {
        &self.bm25
    }

    /// Read access to the vector index, for the vector branch of hybrid search.
    pub fn vector(&self) -> &VectorIndex {
        &self.vector
    }
}
