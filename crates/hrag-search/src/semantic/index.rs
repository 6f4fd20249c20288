//! SQLite-backed document store for semantic retrieval.
//!
//! Each row keeps the document text, a SHA-256 of that text, and its
//! embedding as a JSON array. The embedding space the rows were built with
//! is recorded in `index_meta` so queries are never scored against vectors
//! from a different model.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow, bail};
use hrag_core::config::SeedDocument;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::semantic::model::Embedder;
use crate::semantic::search::{ScoredDocument, knn_search};

const META_MODEL: &str = "embedding_model";
const META_DIM: &str = "embedding_dim";

/// Outcome of [`VectorIndex::load_documents`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

pub struct VectorIndex {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex").finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// Open (or create) an index file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the schema cannot be
    /// created.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open vector index {}", path.display()))?;
        Self::from_connection(conn)
    }

    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory vector index")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("vector index lock poisoned"))
    }

    /// Number of stored documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn len(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .context("failed to count indexed documents")?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Model id the stored vectors were produced with, if any were stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata table cannot be read.
    pub fn model_id(&self) -> Result<Option<String>> {
        let conn = self.lock()?;
        read_meta(&conn, META_MODEL)
    }

    /// Embed and upsert documents. Rows whose text hash is unchanged are
    /// skipped without calling the embedder.
    ///
    /// The batch is written in one transaction: a failure leaves the index
    /// as it was.
    ///
    /// # Errors
    ///
    /// Returns an error for duplicate or blank ids in the batch, a model
    /// mismatch with the existing index, or any embedding/storage failure.
    pub fn load_documents(
        &self,
        embedder: &dyn Embedder,
        documents: &[SeedDocument],
    ) -> Result<LoadStats> {
        let mut seen = HashSet::new();
        for doc in documents {
            if doc.id.trim().is_empty() {
                bail!("document id must not be blank");
            }
            if !seen.insert(doc.id.as_str()) {
                bail!("duplicate document id '{}' in batch", doc.id);
            }
        }

        let model_id = embedder.model_id();
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .context("failed to begin vector index transaction")?;

        match read_meta(&tx, META_MODEL)? {
            Some(existing) if existing != model_id => {
                bail!(
                    "vector index was built with '{existing}'; refusing to add vectors from '{model_id}' (rebuild the index)"
                );
            }
            Some(_) => {}
            None => {
                write_meta(&tx, META_MODEL, &model_id)?;
                write_meta(&tx, META_DIM, &embedder.dimension().to_string())?;
            }
        }

        let mut stats = LoadStats::default();
        let mut pending = Vec::new();
        for doc in documents {
            let hash = content_hash_hex(&doc.text);
            match stored_hash(&tx, &doc.id)? {
                Some(existing) if existing == hash => stats.unchanged += 1,
                Some(_) => pending.push((doc, hash, true)),
                None => pending.push((doc, hash, false)),
            }
        }

        if !pending.is_empty() {
            let texts: Vec<&str> = pending.iter().map(|(doc, _, _)| doc.text.as_str()).collect();
            let embeddings = embedder
                .embed_batch(&texts)
                .context("batch embedding inference failed")?;
            if embeddings.len() != pending.len() {
                bail!(
                    "embedding batch length mismatch: expected {}, got {}",
                    pending.len(),
                    embeddings.len()
                );
            }

            for ((doc, hash, exists), embedding) in pending.iter().zip(embeddings) {
                if embedding.len() != embedder.dimension() {
                    bail!(
                        "invalid embedding dimension for document {}: expected {}, got {}",
                        doc.id,
                        embedder.dimension(),
                        embedding.len()
                    );
                }
                upsert(&tx, &doc.id, &doc.text, hash, &embedding)?;
                if *exists {
                    stats.updated += 1;
                } else {
                    stats.inserted += 1;
                }
            }
        }

        tx.commit().context("failed to commit vector index load")?;
        info!(
            inserted = stats.inserted,
            updated = stats.updated,
            unchanged = stats.unchanged,
            "vector index loaded"
        );
        Ok(stats)
    }

    /// Top-`limit` documents by cosine similarity to `query_embedding`.
    ///
    /// An index with no documents returns an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error when `model_id` differs from the one the index was
    /// built with, or the query fails.
    pub fn search(
        &self,
        model_id: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let conn = self.lock()?;
        match read_meta(&conn, META_MODEL)? {
            None => {
                debug!("vector index is empty");
                Ok(Vec::new())
            }
            Some(existing) if existing != model_id => bail!(
                "vector index was built with '{existing}' but queries use '{model_id}'"
            ),
            Some(_) => knn_search(&conn, query_embedding, limit),
        }
    }
}

fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            doc_id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            embedding_json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )
    .context("failed to create vector index schema")?;
    Ok(())
}

fn read_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM index_meta WHERE key = ?1",
        params![key],
        |row| row.get::<_, String>(0),
    )
    .optional()
    .with_context(|| format!("failed to read index metadata '{key}'"))
}

fn write_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO index_meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )
    .with_context(|| format!("failed to write index metadata '{key}'"))?;
    Ok(())
}

fn stored_hash(conn: &Connection, doc_id: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT content_hash FROM documents WHERE doc_id = ?1",
        params![doc_id],
        |row| row.get::<_, String>(0),
    )
    .optional()
    .with_context(|| format!("failed to query content hash for document {doc_id}"))
}

fn upsert(
    conn: &Connection,
    doc_id: &str,
    content: &str,
    content_hash: &str,
    embedding: &[f32],
) -> Result<()> {
    let encoded = serde_json::to_string(embedding).context("failed to encode embedding")?;
    conn.execute(
        "INSERT INTO documents (doc_id, content, content_hash, embedding_json)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(doc_id) DO UPDATE SET
             content = excluded.content,
             content_hash = excluded.content_hash,
             embedding_json = excluded.embedding_json",
        params![doc_id, content, content_hash, encoded],
    )
    .with_context(|| format!("failed to store embedding for document {doc_id}"))?;
    Ok(())
}

fn content_hash_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
