//! Asynchronous ingestion: claim, parse, chunk, embed, persist

use std::sync::Arc;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::storage::Store;
use crate::types::{Document, DocumentCounts, DocumentStatus, NewChunk};

use super::chunker::TextChunker;
use super::parser::FileParser;

/// Drives one document from `pending` to `completed` or `failed`.
///
/// The claim transition (`pending|failed -> processing`) is the mutual
/// exclusion primitive: at most one worker acts on a document at a time,
/// regardless of the worker-pool size.
pub struct IngestionPipeline {
    store: Arc<Store>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: TextChunker,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<Store>,
        embedder: Arc<dyn EmbeddingProvider>,
        chunking: &ChunkingConfig,
    ) -> Result<Self> {
        Ok(Self {
            store,
            embedder,
            chunker: TextChunker::new(chunking.chunk_size, chunking.chunk_overlap)?,
        })
    }

    /// Run ingestion for one document id. Never panics; all failures land in
    /// the document's status.
    pub async fn run(&self, document_id: &str) {
        let doc = match self
            .store
            .update_document_status(document_id, DocumentStatus::Processing, None)
        {
            Ok(doc) => doc,
            Err(Error::InvalidTransition { from, to }) => {
                tracing::debug!(
                    "skipping {}: claim rejected ({} -> {})",
                    document_id,
                    from,
                    to
                );
                return;
            }
            Err(e) => {
                tracing::error!("failed to claim {}: {}", document_id, e);
                return;
            }
        };

        match self.process(&doc).await {
            Ok(chunk_count) => {
                tracing::info!(
                    "ingestion completed for {} ({} chunks)",
                    document_id,
                    chunk_count
                );
            }
            Err(e) => self.fail(document_id, &e).await,
        }
    }

    async fn process(&self, doc: &Document) -> Result<usize> {
        let data = tokio::fs::read(&doc.file_path)
            .await
            .map_err(|e| Error::parse(format!("cannot read {}: {}", doc.file_path, e)))?;

        let parsed = FileParser::parse(doc.file_type, &data)?;

        let passages = self.chunker.chunk(&parsed.content);
        if passages.is_empty() {
            return Err(Error::parse("no_content"));
        }
        tracing::debug!("{}: {} passages", doc.document_id, passages.len());

        let embeddings = self.embedder.embed_many(&passages).await?;
        if embeddings.len() != passages.len() {
            return Err(Error::EmbeddingProvider(format!(
                "expected {} embeddings, got {}",
                passages.len(),
                embeddings.len()
            )));
        }

        let chunks: Vec<NewChunk> = passages
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (text, embedding))| NewChunk {
                index: i as u32,
                text,
                embedding: Some(embedding),
            })
            .collect();

        let chunk_count = self.store.create_chunks_batch(&doc.document_id, &chunks)?;
        self.store.finalize_document(
            &doc.document_id,
            &DocumentCounts {
                chunk_count: chunk_count as u32,
                character_count: parsed.character_count,
                word_count: parsed.word_count,
                page_count: parsed.page_count,
            },
        )?;

        Ok(chunk_count)
    }

    /// Failure path: record the error and clear any partial chunk writes.
    async fn fail(&self, document_id: &str, err: &Error) {
        let stage = match err {
            Error::Parse(_) | Error::Io(_) => "parse_error",
            Error::EmbeddingProvider(_) => "embedding_error",
            _ => "storage_error",
        };
        let message = format!("{}: {}", stage, err);
        tracing::error!("ingestion failed for {}: {}", document_id, message);

        if let Err(e) = self.store.delete_chunks(document_id) {
            tracing::warn!("cleanup of partial chunks for {} failed: {}", document_id, e);
        }
        if let Err(e) =
            self.store
                .update_document_status(document_id, DocumentStatus::Failed, Some(&message))
        {
            tracing::error!("could not mark {} failed: {}", document_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FlatIndex;
    use crate::types::FileType;
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DIM: usize = 4;

    struct RecordingEmbedder {
        fail: bool,
        batch_sizes: parking_lot::Mutex<Vec<usize>>,
        calls: AtomicUsize,
    }

    impl RecordingEmbedder {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                batch_sizes: parking_lot::Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl EmbeddingProvider for RecordingEmbedder {
        async fn embed_one(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::EmbeddingProvider("provider down".into()));
            }
            Ok(vec![0.5, 1.0, 0.0, 0.0])
        }

        async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.batch_sizes.lock().push(texts.len());
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed_one(text).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            DIM
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn write_file(dir: &std::path::Path, name: &str, contents: &[u8]) -> String {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path.to_string_lossy().to_string()
    }

    fn pending_document(store: &Store, path: &str, hash: &str) -> Document {
        let doc = Document::new("input.txt", FileType::Txt, 100, hash, path);
        store.create_document(&doc).unwrap();
        doc
    }

    fn pipeline(store: Arc<Store>, embedder: Arc<RecordingEmbedder>) -> IngestionPipeline {
        IngestionPipeline::new(store, embedder, &ChunkingConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn successful_run_completes_with_counts() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::in_memory(Box::new(FlatIndex::new()), DIM).unwrap());

        let sentence = "The quick brown fox jumps over the lazy dog. ";
        let text: String = sentence.repeat(60).chars().take(2400).collect();
        let path = write_file(dir.path(), "input.txt", text.as_bytes());
        let doc = pending_document(&store, &path, "hash-ok");

        let embedder = RecordingEmbedder::new(false);
        pipeline(store.clone(), embedder.clone())
            .run(&doc.document_id)
            .await;

        let done = store.get_document(&doc.document_id).unwrap();
        assert_eq!(done.status, DocumentStatus::Completed);
        assert_eq!(done.chunk_count, 3);
        assert_eq!(done.character_count, Some(2400));
        assert_eq!(
            store.count_chunks(Some(&doc.document_id)).unwrap(),
            done.chunk_count as u64
        );

        // All chunks carry a vector of the configured dimension
        for chunk in store.get_chunks(&doc.document_id).unwrap() {
            assert_eq!(chunk.embedding.as_ref().map(Vec::len), Some(DIM));
        }

        // One embed_many call covering every passage
        assert_eq!(*embedder.batch_sizes.lock(), vec![3]);
    }

    #[tokio::test]
    async fn provider_failure_routes_to_failed_status() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::in_memory(Box::new(FlatIndex::new()), DIM).unwrap());

        let path = write_file(dir.path(), "input.txt", b"Some ordinary text content.");
        let doc = pending_document(&store, &path, "hash-fail");

        pipeline(store.clone(), RecordingEmbedder::new(true))
            .run(&doc.document_id)
            .await;

        let failed = store.get_document(&doc.document_id).unwrap();
        assert_eq!(failed.status, DocumentStatus::Failed);
        assert!(failed
            .error_message
            .as_deref()
            .unwrap()
            .starts_with("embedding_error"));
        assert_eq!(store.count_chunks(Some(&doc.document_id)).unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_file_is_a_parse_failure() {
        let store = Arc::new(Store::in_memory(Box::new(FlatIndex::new()), DIM).unwrap());
        let doc = pending_document(&store, "/nonexistent/path.txt", "hash-missing");

        pipeline(store.clone(), RecordingEmbedder::new(false))
            .run(&doc.document_id)
            .await;

        let failed = store.get_document(&doc.document_id).unwrap();
        assert_eq!(failed.status, DocumentStatus::Failed);
        assert!(failed
            .error_message
            .as_deref()
            .unwrap()
            .starts_with("parse_error"));
    }

    #[tokio::test]
    async fn whitespace_only_file_fails_with_no_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::in_memory(Box::new(FlatIndex::new()), DIM).unwrap());

        let path = write_file(dir.path(), "blank.txt", b"  \n\n   \n");
        let doc = pending_document(&store, &path, "hash-blank");

        pipeline(store.clone(), RecordingEmbedder::new(false))
            .run(&doc.document_id)
            .await;

        let failed = store.get_document(&doc.document_id).unwrap();
        assert_eq!(failed.status, DocumentStatus::Failed);
        assert!(failed.error_message.as_deref().unwrap().contains("no_content"));
    }

    #[tokio::test]
    async fn completed_documents_cannot_be_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::in_memory(Box::new(FlatIndex::new()), DIM).unwrap());

        let path = write_file(dir.path(), "input.txt", b"Content to ingest once.");
        let doc = pending_document(&store, &path, "hash-once");

        let embedder = RecordingEmbedder::new(false);
        let pipeline = pipeline(store.clone(), embedder.clone());
        pipeline.run(&doc.document_id).await;
        assert_eq!(
            store.get_document(&doc.document_id).unwrap().status,
            DocumentStatus::Completed
        );
        let calls_after_first = embedder.calls.load(Ordering::SeqCst);

        // Second run: the claim is rejected, nothing reprocesses
        pipeline.run(&doc.document_id).await;
        assert_eq!(embedder.calls.load(Ordering::SeqCst), calls_after_first);
        assert_eq!(
            store.get_document(&doc.document_id).unwrap().status,
            DocumentStatus::Completed
        );
    }

    #[tokio::test]
    async fn failed_documents_can_be_reingested() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::in_memory(Box::new(FlatIndex::new()), DIM).unwrap());

        let path = write_file(dir.path(), "input.txt", b"Recoverable content.");
        let doc = pending_document(&store, &path, "hash-retry");

        pipeline(store.clone(), RecordingEmbedder::new(true))
            .run(&doc.document_id)
            .await;
        assert_eq!(
            store.get_document(&doc.document_id).unwrap().status,
            DocumentStatus::Failed
        );

        pipeline(store.clone(), RecordingEmbedder::new(false))
            .run(&doc.document_id)
            .await;
        let done = store.get_document(&doc.document_id).unwrap();
        assert_eq!(done.status, DocumentStatus::Completed);
        assert_eq!(done.error_message, None);
    }
}
