//! SQLite-backed store for documents and chunks
//!
//! The single shared mutable resource of the service. Every operation is one
//! transaction; vector similarity goes through the in-process [`VectorIndex`],
//! which is rebuilt from the `document_chunks` table on open.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{Chunk, Document, DocumentCounts, DocumentStatus, FileType, NewChunk};

use super::vector_index::VectorIndex;

/// A chunk with its cosine similarity to a query
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub similarity: f32,
}

/// A chunk matched by substring search, with its occurrence count
#[derive(Debug, Clone)]
pub struct SubstringMatch {
    pub chunk: Chunk,
    pub occurrences: usize,
}

/// Durable store for documents and chunks with vector retrieval
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    index: RwLock<Box<dyn VectorIndex>>,
    dimension: usize,
}

impl Store {
    /// Open (or create) the database at the given path
    pub fn open<P: AsRef<Path>>(
        path: P,
        index: Box<dyn VectorIndex>,
        dimension: usize,
    ) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::store(format!("failed to open database: {}", e)))?;
        Self::with_connection(conn, index, dimension)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory(index: Box<dyn VectorIndex>, dimension: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::store(format!("failed to open in-memory database: {}", e)))?;
        Self::with_connection(conn, index, dimension)
    }

    fn with_connection(
        conn: Connection,
        index: Box<dyn VectorIndex>,
        dimension: usize,
    ) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            index: RwLock::new(index),
            dimension,
        };
        store.migrate()?;
        store.rebuild_index()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS documents (
                document_id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                file_type TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                file_hash TEXT NOT NULL UNIQUE,
                file_path TEXT NOT NULL,
                character_count INTEGER,
                word_count INTEGER,
                page_count INTEGER,
                chunk_count INTEGER NOT NULL DEFAULT 0,
                processing_status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (processing_status IN ('pending', 'processing', 'completed', 'failed')),
                error_message TEXT,
                uploaded_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(processing_status);
            CREATE INDEX IF NOT EXISTS idx_documents_hash ON documents(file_hash);

            CREATE TABLE IF NOT EXISTS document_chunks (
                chunk_id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL
                    REFERENCES documents(document_id) ON DELETE CASCADE,
                chunk_index INTEGER NOT NULL,
                chunk_text TEXT NOT NULL,
                chunk_size INTEGER NOT NULL,
                embedding BLOB,
                created_at TEXT NOT NULL,
                UNIQUE (document_id, chunk_index)
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_document ON document_chunks(document_id);
            "#,
        )
        .map_err(|e| Error::store(format!("failed to run migrations: {}", e)))?;

        tracing::info!("database migrations complete");
        Ok(())
    }

    /// Reload every persisted vector into the index
    fn rebuild_index(&self) -> Result<()> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT document_id, chunk_index, embedding FROM document_chunks
                 WHERE embedding IS NOT NULL",
            )
            .map_err(store_err)?;

        let rows = stmt
            .query_map([], |row| {
                let document_id: String = row.get(0)?;
                let chunk_index: i64 = row.get(1)?;
                let blob: Vec<u8> = row.get(2)?;
                Ok((document_id, chunk_index as u32, blob))
            })
            .map_err(store_err)?;

        let mut index = self.index.write();
        let mut loaded = 0usize;
        for row in rows {
            let (document_id, chunk_index, blob) = row.map_err(store_err)?;
            index.insert(index_key(&document_id, chunk_index), &decode_embedding(&blob));
            loaded += 1;
        }
        if loaded > 0 {
            tracing::info!("vector index rebuilt with {} entries", loaded);
        }
        Ok(())
    }

    // ==================== Documents ====================

    /// Insert a new document; fails with `DuplicateContent` when a document
    /// with the same hash already exists, carrying the existing id.
    pub fn create_document(&self, doc: &Document) -> Result<()> {
        let conn = self.conn.lock();

        if let Some(existing_id) = Self::find_by_hash(&conn, &doc.file_hash)? {
            return Err(Error::DuplicateContent { existing_id });
        }

        let inserted = conn.execute(
            r#"
            INSERT INTO documents (
                document_id, filename, file_type, file_size, file_hash, file_path,
                character_count, word_count, page_count, chunk_count,
                processing_status, error_message, uploaded_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                doc.document_id,
                doc.filename,
                doc.file_type.extension(),
                doc.file_size as i64,
                doc.file_hash,
                doc.file_path,
                doc.character_count.map(|c| c as i64),
                doc.word_count.map(|c| c as i64),
                doc.page_count.map(|c| c as i64),
                doc.chunk_count as i64,
                doc.status.as_str(),
                doc.error_message,
                doc.uploaded_at.to_rfc3339(),
                doc.updated_at.to_rfc3339(),
            ],
        );

        match inserted {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => {
                // Lost a race against a concurrent upload of the same bytes
                match Self::find_by_hash(&conn, &doc.file_hash)? {
                    Some(existing_id) => Err(Error::DuplicateContent { existing_id }),
                    None => Err(Error::store(format!("failed to create document: {}", e))),
                }
            }
            Err(e) => Err(Error::store(format!("failed to create document: {}", e))),
        }
    }

    fn find_by_hash(conn: &Connection, file_hash: &str) -> Result<Option<String>> {
        conn.query_row(
            "SELECT document_id FROM documents WHERE file_hash = ?1",
            params![file_hash],
            |row| row.get(0),
        )
        .optional()
        .map_err(store_err)
    }

    /// Fetch a document by id
    pub fn get_document(&self, document_id: &str) -> Result<Document> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM documents WHERE document_id = ?1",
            params![document_id],
            row_to_document,
        )
        .optional()
        .map_err(store_err)?
        .ok_or_else(|| Error::NotFound(format!("document {}", document_id)))
    }

    /// Fetch a document by content hash
    pub fn get_document_by_hash(&self, file_hash: &str) -> Result<Option<Document>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM documents WHERE file_hash = ?1",
            params![file_hash],
            row_to_document,
        )
        .optional()
        .map_err(store_err)
    }

    /// List documents, newest first
    pub fn list_documents(
        &self,
        offset: u64,
        limit: u64,
        status: Option<DocumentStatus>,
    ) -> Result<Vec<Document>> {
        let conn = self.conn.lock();
        let mut documents = Vec::new();

        match status {
            Some(status) => {
                let mut stmt = conn
                    .prepare(
                        "SELECT * FROM documents WHERE processing_status = ?1
                         ORDER BY uploaded_at DESC LIMIT ?2 OFFSET ?3",
                    )
                    .map_err(store_err)?;
                let rows = stmt
                    .query_map(
                        params![status.as_str(), limit as i64, offset as i64],
                        row_to_document,
                    )
                    .map_err(store_err)?;
                for row in rows {
                    documents.push(row.map_err(store_err)?);
                }
            }
            None => {
                let mut stmt = conn
                    .prepare(
                        "SELECT * FROM documents ORDER BY uploaded_at DESC LIMIT ?1 OFFSET ?2",
                    )
                    .map_err(store_err)?;
                let rows = stmt
                    .query_map(params![limit as i64, offset as i64], row_to_document)
                    .map_err(store_err)?;
                for row in rows {
                    documents.push(row.map_err(store_err)?);
                }
            }
        }

        Ok(documents)
    }

    /// Count documents, optionally by status
    pub fn count_documents(&self, status: Option<DocumentStatus>) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = match status {
            Some(status) => conn
                .query_row(
                    "SELECT COUNT(*) FROM documents WHERE processing_status = ?1",
                    params![status.as_str()],
                    |row| row.get(0),
                )
                .map_err(store_err)?,
            None => conn
                .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
                .map_err(store_err)?,
        };
        Ok(count as u64)
    }

    /// Transition a document's status, guarded by the lifecycle DAG.
    ///
    /// Illegal transitions fail with `InvalidTransition` and leave the row
    /// untouched; this is the mutual-exclusion primitive for ingestion claims.
    pub fn update_document_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        error_message: Option<&str>,
    ) -> Result<Document> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(store_err)?;

        let current = Self::status_in_tx(&tx, document_id)?;
        if !current.can_transition(status) {
            return Err(Error::InvalidTransition {
                from: current.as_str().to_string(),
                to: status.as_str().to_string(),
            });
        }

        tx.execute(
            "UPDATE documents SET processing_status = ?2, error_message = ?3, updated_at = ?4
             WHERE document_id = ?1",
            params![
                document_id,
                status.as_str(),
                error_message,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(store_err)?;

        let doc = tx
            .query_row(
                "SELECT * FROM documents WHERE document_id = ?1",
                params![document_id],
                row_to_document,
            )
            .map_err(store_err)?;

        tx.commit().map_err(store_err)?;
        Ok(doc)
    }

    /// Complete a document: transition `processing -> completed` and record
    /// the extraction counts in the same transaction.
    pub fn finalize_document(&self, document_id: &str, counts: &DocumentCounts) -> Result<Document> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(store_err)?;

        let current = Self::status_in_tx(&tx, document_id)?;
        if !current.can_transition(DocumentStatus::Completed) {
            return Err(Error::InvalidTransition {
                from: current.as_str().to_string(),
                to: DocumentStatus::Completed.as_str().to_string(),
            });
        }

        tx.execute(
            r#"
            UPDATE documents SET
                processing_status = 'completed',
                error_message = NULL,
                chunk_count = ?2,
                character_count = ?3,
                word_count = ?4,
                page_count = ?5,
                updated_at = ?6
            WHERE document_id = ?1
            "#,
            params![
                document_id,
                counts.chunk_count as i64,
                counts.character_count as i64,
                counts.word_count as i64,
                counts.page_count.map(|c| c as i64),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(store_err)?;

        let doc = tx
            .query_row(
                "SELECT * FROM documents WHERE document_id = ?1",
                params![document_id],
                row_to_document,
            )
            .map_err(store_err)?;

        tx.commit().map_err(store_err)?;
        Ok(doc)
    }

    fn status_in_tx(tx: &rusqlite::Transaction<'_>, document_id: &str) -> Result<DocumentStatus> {
        let raw: Option<String> = tx
            .query_row(
                "SELECT processing_status FROM documents WHERE document_id = ?1",
                params![document_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;
        let raw = raw.ok_or_else(|| Error::NotFound(format!("document {}", document_id)))?;
        DocumentStatus::parse(&raw)
            .ok_or_else(|| Error::store(format!("corrupt status value: {}", raw)))
    }

    /// Delete a document, its chunks (cascade), and the on-disk file.
    /// Returns the number of chunks removed.
    pub fn delete_document(&self, document_id: &str) -> Result<usize> {
        let (file_path, keys) = {
            let mut conn = self.conn.lock();
            let tx = conn.transaction().map_err(store_err)?;

            let file_path: Option<String> = tx
                .query_row(
                    "SELECT file_path FROM documents WHERE document_id = ?1",
                    params![document_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(store_err)?;
            let file_path =
                file_path.ok_or_else(|| Error::NotFound(format!("document {}", document_id)))?;

            let keys = Self::chunk_keys_in_tx(&tx, document_id)?;

            tx.execute(
                "DELETE FROM documents WHERE document_id = ?1",
                params![document_id],
            )
            .map_err(store_err)?;
            tx.commit().map_err(store_err)?;

            (file_path, keys)
        };

        self.index.write().remove(&keys);

        match std::fs::remove_file(&file_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("failed to remove file {}: {}", file_path, e),
        }

        tracing::info!(
            "deleted document {} and {} chunks",
            document_id,
            keys.len()
        );
        Ok(keys.len())
    }

    fn chunk_keys_in_tx(tx: &rusqlite::Transaction<'_>, document_id: &str) -> Result<Vec<String>> {
        let mut stmt = tx
            .prepare("SELECT chunk_index FROM document_chunks WHERE document_id = ?1")
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![document_id], |row| row.get::<_, i64>(0))
            .map_err(store_err)?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(index_key(document_id, row.map_err(store_err)? as u32));
        }
        Ok(keys)
    }

    // ==================== Chunks ====================

    /// Insert a document's chunks in one transaction: either all rows appear
    /// or none do. Vectors must have the configured dimension.
    pub fn create_chunks_batch(&self, document_id: &str, chunks: &[NewChunk]) -> Result<usize> {
        for chunk in chunks {
            if let Some(embedding) = &chunk.embedding {
                if embedding.len() != self.dimension {
                    return Err(Error::store(format!(
                        "embedding dimension {} does not match configured {}",
                        embedding.len(),
                        self.dimension
                    )));
                }
            }
        }

        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction().map_err(store_err)?;
            let now = Utc::now().to_rfc3339();

            for chunk in chunks {
                tx.execute(
                    r#"
                    INSERT INTO document_chunks (
                        chunk_id, document_id, chunk_index, chunk_text,
                        chunk_size, embedding, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                    params![
                        chunk_id(document_id, chunk.index),
                        document_id,
                        chunk.index as i64,
                        chunk.text,
                        chunk.text.chars().count() as i64,
                        chunk.embedding.as_ref().map(|v| encode_embedding(v)),
                        now,
                    ],
                )
                .map_err(|e| Error::store(format!("failed to insert chunk: {}", e)))?;
            }

            tx.commit().map_err(store_err)?;
        }

        let mut index = self.index.write();
        for chunk in chunks {
            if let Some(embedding) = &chunk.embedding {
                index.insert(index_key(document_id, chunk.index), embedding);
            }
        }

        Ok(chunks.len())
    }

    /// Delete all chunks of a document; idempotent. Used by the ingestion
    /// failure path to clear partial writes.
    pub fn delete_chunks(&self, document_id: &str) -> Result<usize> {
        let keys = {
            let mut conn = self.conn.lock();
            let tx = conn.transaction().map_err(store_err)?;
            let keys = Self::chunk_keys_in_tx(&tx, document_id)?;
            tx.execute(
                "DELETE FROM document_chunks WHERE document_id = ?1",
                params![document_id],
            )
            .map_err(store_err)?;
            tx.commit().map_err(store_err)?;
            keys
        };

        self.index.write().remove(&keys);
        Ok(keys.len())
    }

    /// All chunks of a document in `chunk_index` order
    pub fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT * FROM document_chunks WHERE document_id = ?1 ORDER BY chunk_index",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![document_id], row_to_chunk)
            .map_err(store_err)?;
        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(row.map_err(store_err)?);
        }
        Ok(chunks)
    }

    /// One chunk by position
    pub fn get_chunk_at(&self, document_id: &str, chunk_index: u32) -> Result<Option<Chunk>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM document_chunks WHERE document_id = ?1 AND chunk_index = ?2",
            params![document_id, chunk_index as i64],
            row_to_chunk,
        )
        .optional()
        .map_err(store_err)
    }

    /// Count chunks, optionally for one document
    pub fn count_chunks(&self, document_id: Option<&str>) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = match document_id {
            Some(id) => conn
                .query_row(
                    "SELECT COUNT(*) FROM document_chunks WHERE document_id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .map_err(store_err)?,
            None => conn
                .query_row("SELECT COUNT(*) FROM document_chunks", [], |row| row.get(0))
                .map_err(store_err)?,
        };
        Ok(count as u64)
    }

    /// Count chunks carrying a vector
    pub fn count_chunks_with_embeddings(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM document_chunks WHERE embedding IS NOT NULL",
                [],
                |row| row.get(0),
            )
            .map_err(store_err)?;
        Ok(count as u64)
    }

    // ==================== Retrieval ====================

    /// Top-k chunks by cosine similarity, descending. `min_similarity`
    /// filters scores below the threshold; `filter_document` restricts the
    /// candidates to one document.
    pub fn search_vector(
        &self,
        query: &[f32],
        k: usize,
        filter_document: Option<&str>,
        min_similarity: f32,
    ) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(Error::store(format!(
                "query dimension {} does not match configured {}",
                query.len(),
                self.dimension
            )));
        }

        let hits = {
            let index = self.index.read();
            match filter_document {
                Some(document_id) => {
                    let prefix = format!("{}/", document_id);
                    let accept = |key: &str| key.starts_with(prefix.as_str());
                    index.search(query, k, Some(&accept))
                }
                None => index.search(query, k, None),
            }
        };

        let mut results = Vec::with_capacity(hits.len());
        for (key, similarity) in hits {
            if similarity < min_similarity {
                continue;
            }
            let Some((document_id, chunk_index)) = parse_index_key(&key) else {
                continue;
            };
            if let Some(chunk) = self.get_chunk_at(&document_id, chunk_index)? {
                results.push(ScoredChunk { chunk, similarity });
            }
        }
        Ok(results)
    }

    /// Up to k chunks containing `query` as a case-insensitive substring,
    /// ordered by occurrence count descending.
    pub fn search_substring(
        &self,
        query: &str,
        k: usize,
        filter_document: Option<&str>,
    ) -> Result<Vec<SubstringMatch>> {
        let needle = query.to_lowercase();
        if needle.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let chunks = match filter_document {
            Some(document_id) => self.get_chunks(document_id)?,
            None => {
                let conn = self.conn.lock();
                let mut stmt = conn
                    .prepare(
                        "SELECT * FROM document_chunks ORDER BY document_id, chunk_index",
                    )
                    .map_err(store_err)?;
                let rows = stmt.query_map([], row_to_chunk).map_err(store_err)?;
                let mut chunks = Vec::new();
                for row in rows {
                    chunks.push(row.map_err(store_err)?);
                }
                chunks
            }
        };

        let mut matches: Vec<SubstringMatch> = chunks
            .into_iter()
            .filter_map(|chunk| {
                let occurrences = chunk.text.to_lowercase().matches(&needle).count();
                (occurrences > 0).then_some(SubstringMatch { chunk, occurrences })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.occurrences
                .cmp(&a.occurrences)
                .then_with(|| a.chunk.document_id.cmp(&b.chunk.document_id))
                .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
        });
        matches.truncate(k);
        Ok(matches)
    }

    /// Database liveness probe
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(store_err)?;
        Ok(())
    }

    /// Configured vector dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

fn store_err(e: rusqlite::Error) -> Error {
    Error::store(e.to_string())
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Index key for a chunk position; zero-padded so lexicographic order equals
/// `(document_id, chunk_index)` order.
fn index_key(document_id: &str, chunk_index: u32) -> String {
    format!("{}/{:08}", document_id, chunk_index)
}

fn parse_index_key(key: &str) -> Option<(String, u32)> {
    let (document_id, index) = key.rsplit_once('/')?;
    Some((document_id.to_string(), index.parse().ok()?))
}

fn chunk_id(document_id: &str, chunk_index: u32) -> String {
    format!("chunk_{}_{}", document_id, chunk_index)
}

fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn parse_timestamp(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let file_type_raw: String = row.get("file_type")?;
    let status_raw: String = row.get("processing_status")?;
    let uploaded_at: String = row.get("uploaded_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Document {
        document_id: row.get("document_id")?,
        filename: row.get("filename")?,
        file_type: FileType::from_extension(&file_type_raw).unwrap_or(FileType::Txt),
        file_size: row.get::<_, i64>("file_size")? as u64,
        file_hash: row.get("file_hash")?,
        file_path: row.get("file_path")?,
        character_count: row.get::<_, Option<i64>>("character_count")?.map(|c| c as u64),
        word_count: row.get::<_, Option<i64>>("word_count")?.map(|c| c as u64),
        page_count: row.get::<_, Option<i64>>("page_count")?.map(|c| c as u32),
        chunk_count: row.get::<_, i64>("chunk_count")? as u32,
        status: DocumentStatus::parse(&status_raw).unwrap_or(DocumentStatus::Failed),
        error_message: row.get("error_message")?,
        uploaded_at: parse_timestamp(uploaded_at),
        updated_at: parse_timestamp(updated_at),
    })
}

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chunk> {
    let embedding: Option<Vec<u8>> = row.get("embedding")?;
    Ok(Chunk {
        chunk_id: row.get("chunk_id")?,
        document_id: row.get("document_id")?,
        chunk_index: row.get::<_, i64>("chunk_index")? as u32,
        text: row.get("chunk_text")?,
        char_length: row.get::<_, i64>("chunk_size")? as u32,
        embedding: embedding.map(|blob| decode_embedding(&blob)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::vector_index::FlatIndex;
    use crate::types::FileType;

    const DIM: usize = 4;

    fn test_store() -> Store {
        Store::in_memory(Box::new(FlatIndex::new()), DIM).unwrap()
    }

    fn test_document(name: &str, hash: &str) -> Document {
        Document::new(name, FileType::Txt, 100, hash, format!("/tmp/does-not-exist/{}", hash))
    }

    fn axis(axis: usize, value: f32) -> Vec<f32> {
        let mut v = vec![0.0; DIM];
        v[axis] = value;
        v
    }

    fn embedded_chunks(texts: &[&str]) -> Vec<NewChunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| NewChunk {
                index: i as u32,
                text: text.to_string(),
                embedding: Some(axis(i % DIM, 1.0)),
            })
            .collect()
    }

    #[test]
    fn create_and_get_document() {
        let store = test_store();
        let doc = test_document("a.txt", "hash-a");
        store.create_document(&doc).unwrap();

        let fetched = store.get_document(&doc.document_id).unwrap();
        assert_eq!(fetched.filename, "a.txt");
        assert_eq!(fetched.status, DocumentStatus::Pending);
        assert_eq!(fetched.chunk_count, 0);

        assert!(matches!(
            store.get_document("doc_missing"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn duplicate_hash_returns_existing_id() {
        let store = test_store();
        let first = test_document("a.txt", "same-hash");
        store.create_document(&first).unwrap();

        let second = test_document("b.txt", "same-hash");
        match store.create_document(&second) {
            Err(Error::DuplicateContent { existing_id }) => {
                assert_eq!(existing_id, first.document_id);
            }
            other => panic!("expected DuplicateContent, got {:?}", other.map(|_| ())),
        }

        assert_eq!(store.count_documents(None).unwrap(), 1);
    }

    #[test]
    fn status_transitions_follow_the_dag() {
        let store = test_store();
        let doc = test_document("a.txt", "h");
        store.create_document(&doc).unwrap();
        let id = &doc.document_id;

        // pending -> completed is illegal
        assert!(matches!(
            store.update_document_status(id, DocumentStatus::Completed, None),
            Err(Error::InvalidTransition { .. })
        ));

        store
            .update_document_status(id, DocumentStatus::Processing, None)
            .unwrap();

        // a second claim is rejected
        assert!(matches!(
            store.update_document_status(id, DocumentStatus::Processing, None),
            Err(Error::InvalidTransition { .. })
        ));

        let failed = store
            .update_document_status(id, DocumentStatus::Failed, Some("parse_error: bad file"))
            .unwrap();
        assert_eq!(failed.status, DocumentStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("parse_error: bad file"));

        // failed documents may be re-claimed, and the error clears
        let reclaimed = store
            .update_document_status(id, DocumentStatus::Processing, None)
            .unwrap();
        assert_eq!(reclaimed.status, DocumentStatus::Processing);
        assert_eq!(reclaimed.error_message, None);
    }

    #[test]
    fn chunk_batch_is_atomic() {
        let store = test_store();
        let doc = test_document("a.txt", "h");
        store.create_document(&doc).unwrap();

        // Duplicate chunk_index mid-batch violates the composite unique
        // constraint; nothing may remain.
        let mut chunks = embedded_chunks(&["one", "two", "three"]);
        chunks[2].index = 1;
        let result = store.create_chunks_batch(&doc.document_id, &chunks);
        assert!(result.is_err());
        assert_eq!(store.count_chunks(Some(&doc.document_id)).unwrap(), 0);
        assert_eq!(store.index.read().len(), 0);

        // A valid batch lands fully
        let chunks = embedded_chunks(&["one", "two", "three"]);
        assert_eq!(
            store.create_chunks_batch(&doc.document_id, &chunks).unwrap(),
            3
        );
        assert_eq!(store.count_chunks(Some(&doc.document_id)).unwrap(), 3);
        assert_eq!(store.index.read().len(), 3);
    }

    #[test]
    fn wrong_dimension_is_rejected_before_writing() {
        let store = test_store();
        let doc = test_document("a.txt", "h");
        store.create_document(&doc).unwrap();

        let chunks = vec![NewChunk {
            index: 0,
            text: "short vector".to_string(),
            embedding: Some(vec![1.0, 0.0]),
        }];
        assert!(store.create_chunks_batch(&doc.document_id, &chunks).is_err());
        assert_eq!(store.count_chunks(None).unwrap(), 0);
    }

    #[test]
    fn finalize_records_counts() {
        let store = test_store();
        let doc = test_document("a.txt", "h");
        store.create_document(&doc).unwrap();
        store
            .update_document_status(&doc.document_id, DocumentStatus::Processing, None)
            .unwrap();
        store
            .create_chunks_batch(&doc.document_id, &embedded_chunks(&["one", "two"]))
            .unwrap();

        let done = store
            .finalize_document(
                &doc.document_id,
                &DocumentCounts {
                    chunk_count: 2,
                    character_count: 120,
                    word_count: 20,
                    page_count: None,
                },
            )
            .unwrap();

        assert_eq!(done.status, DocumentStatus::Completed);
        assert_eq!(done.chunk_count, 2);
        assert_eq!(done.character_count, Some(120));
        assert_eq!(
            store.count_chunks(Some(&doc.document_id)).unwrap(),
            done.chunk_count as u64
        );
    }

    #[test]
    fn delete_cascades_to_chunks_only_for_that_document() {
        let store = test_store();
        let keep = test_document("keep.txt", "h-keep");
        let drop = test_document("drop.txt", "h-drop");
        store.create_document(&keep).unwrap();
        store.create_document(&drop).unwrap();
        store
            .create_chunks_batch(&keep.document_id, &embedded_chunks(&["kept"]))
            .unwrap();
        store
            .create_chunks_batch(&drop.document_id, &embedded_chunks(&["gone", "also gone"]))
            .unwrap();

        let removed = store.delete_document(&drop.document_id).unwrap();
        assert_eq!(removed, 2);
        assert!(matches!(
            store.get_document(&drop.document_id),
            Err(Error::NotFound(_))
        ));
        assert_eq!(store.count_chunks(Some(&keep.document_id)).unwrap(), 1);
        assert_eq!(store.count_chunks(None).unwrap(), 1);
        assert_eq!(store.index.read().len(), 1);
    }

    #[test]
    fn delete_chunks_is_idempotent() {
        let store = test_store();
        let doc = test_document("a.txt", "h");
        store.create_document(&doc).unwrap();
        store
            .create_chunks_batch(&doc.document_id, &embedded_chunks(&["x", "y"]))
            .unwrap();

        assert_eq!(store.delete_chunks(&doc.document_id).unwrap(), 2);
        assert_eq!(store.delete_chunks(&doc.document_id).unwrap(), 0);
    }

    #[test]
    fn vector_search_orders_and_filters() {
        let store = test_store();
        let doc_a = test_document("a.txt", "h-a");
        let doc_b = test_document("b.txt", "h-b");
        store.create_document(&doc_a).unwrap();
        store.create_document(&doc_b).unwrap();

        store
            .create_chunks_batch(
                &doc_a.document_id,
                &[
                    NewChunk {
                        index: 0,
                        text: "close".into(),
                        embedding: Some(vec![1.0, 0.1, 0.0, 0.0]),
                    },
                    NewChunk {
                        index: 1,
                        text: "far".into(),
                        embedding: Some(axis(1, 1.0)),
                    },
                ],
            )
            .unwrap();
        store
            .create_chunks_batch(
                &doc_b.document_id,
                &[NewChunk {
                    index: 0,
                    text: "closest".into(),
                    embedding: Some(axis(0, 2.0)),
                }],
            )
            .unwrap();

        let results = store.search_vector(&axis(0, 1.0), 3, None, 0.0).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk.text, "closest");
        assert_eq!(results[1].chunk.text, "close");
        assert!(results[0].similarity >= results[1].similarity);
        assert!(results[1].similarity >= results[2].similarity);

        // min_similarity drops the orthogonal chunk
        let results = store.search_vector(&axis(0, 1.0), 3, None, 0.5).unwrap();
        assert_eq!(results.len(), 2);

        // document filter
        let results = store
            .search_vector(&axis(0, 1.0), 3, Some(&doc_a.document_id), 0.0)
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.chunk.document_id == doc_a.document_id));
    }

    #[test]
    fn substring_search_counts_occurrences() {
        let store = test_store();
        let doc = test_document("a.txt", "h");
        store.create_document(&doc).unwrap();
        store
            .create_chunks_batch(
                &doc.document_id,
                &[
                    NewChunk {
                        index: 0,
                        text: "The fox saw another FOX chasing a fox.".into(),
                        embedding: Some(axis(0, 1.0)),
                    },
                    NewChunk {
                        index: 1,
                        text: "One fox only.".into(),
                        embedding: Some(axis(1, 1.0)),
                    },
                    NewChunk {
                        index: 2,
                        text: "No animals here.".into(),
                        embedding: Some(axis(2, 1.0)),
                    },
                ],
            )
            .unwrap();

        let matches = store.search_substring("fox", 10, None).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].chunk.chunk_index, 0);
        assert_eq!(matches[0].occurrences, 3);
        assert_eq!(matches[1].occurrences, 1);

        assert!(store.search_substring("", 10, None).unwrap().is_empty());
        assert!(store
            .search_substring("zebra", 10, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn index_key_order_matches_position_order() {
        let a = index_key("doc_x", 2);
        let b = index_key("doc_x", 10);
        assert!(a < b);
        assert_eq!(parse_index_key(&a), Some(("doc_x".to_string(), 2)));
    }
}
