//! End-to-end tests over the wired service with deterministic fake providers

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use docqa_rag::config::RagConfig;
use docqa_rag::error::Result;
use docqa_rag::providers::chat::{ChatMessage, ChatProvider, Completion};
use docqa_rag::providers::EmbeddingProvider;
use docqa_rag::server::state::AppState;
use docqa_rag::storage::{FlatIndex, Store};
use docqa_rag::types::query::ChatRequest;
use docqa_rag::types::DocumentStatus;

const DIM: usize = 8;
const PROBE: &str = "fox";

/// Deterministic embedder: first coordinate is the fraction of characters
/// covered by occurrences of the probe word, second is constant.
struct ProbeEmbedder;

#[async_trait]
impl EmbeddingProvider for ProbeEmbedder {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let occurrences = text.to_lowercase().matches(PROBE).count();
        let fraction = if text.is_empty() {
            0.0
        } else {
            (occurrences * PROBE.len()) as f32 / text.len() as f32
        };
        let mut v = vec![0.0; DIM];
        v[0] = fraction;
        v[1] = 1.0;
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "probe"
    }
}

struct CountingChat {
    calls: AtomicUsize,
}

#[async_trait]
impl ChatProvider for CountingChat {
    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Completion {
            text: "According to Source 1, the answer is in the documents.".to_string(),
            tokens_used: 57,
            model: "fake-chat".to_string(),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn model(&self) -> &str {
        "fake-chat"
    }
}

struct Harness {
    state: AppState,
    store: Arc<Store>,
    chat: Arc<CountingChat>,
    _data_dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let data_dir = tempfile::tempdir().unwrap();
    let mut config = RagConfig::default();
    config.storage.data_dir = data_dir.path().to_path_buf();
    config.provider.embedding_dimension = DIM;

    let store = Arc::new(Store::in_memory(Box::new(FlatIndex::new()), DIM).unwrap());
    let chat = Arc::new(CountingChat {
        calls: AtomicUsize::new(0),
    });
    let state = AppState::new(
        config,
        store.clone(),
        Arc::new(ProbeEmbedder),
        chat.clone(),
    )
    .unwrap();

    Harness {
        state,
        store,
        chat,
        _data_dir: data_dir,
    }
}

/// Poll until the document reaches a terminal status
async fn wait_for_terminal(store: &Store, document_id: &str) -> DocumentStatus {
    for _ in 0..200 {
        let status = store.get_document(document_id).unwrap().status;
        if matches!(status, DocumentStatus::Completed | DocumentStatus::Failed) {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("document {} never reached a terminal status", document_id);
}

fn fox_text() -> String {
    let sentence = "The quick brown fox jumps over the lazy dog. ";
    sentence.repeat(60).chars().take(2400).collect()
}

fn chat_request(query: &str) -> ChatRequest {
    ChatRequest {
        query: query.to_string(),
        conversation_history: None,
        document_id: None,
        top_k: None,
        temperature: None,
        max_tokens: None,
    }
}

#[tokio::test]
async fn duplicate_uploads_collapse_to_one_document() {
    let h = harness();
    let bytes = fox_text().into_bytes();

    let first = h.state.uploads().accept("fox.txt", &bytes).await.unwrap();
    let second = h.state.uploads().accept("fox_copy.txt", &bytes).await.unwrap();

    assert_eq!(second.document.document_id, first.document.document_id);
    assert!(second.deduplicated);
    assert_eq!(h.store.count_documents(None).unwrap(), 1);

    // After quiescence exactly one document exists, fully ingested
    let status = wait_for_terminal(&h.store, &first.document.document_id).await;
    assert_eq!(status, DocumentStatus::Completed);
    assert_eq!(h.store.count_documents(None).unwrap(), 1);
}

#[tokio::test]
async fn ingestion_progresses_to_completed_with_three_chunks() {
    let h = harness();

    let accepted = h
        .state
        .uploads()
        .accept("fox.txt", fox_text().as_bytes())
        .await
        .unwrap();

    // Immediately after accept the document is pending or already claimed
    let early = h.store.get_document(&accepted.document.document_id).unwrap();
    assert!(matches!(
        early.status,
        DocumentStatus::Pending | DocumentStatus::Processing | DocumentStatus::Completed
    ));

    let status = wait_for_terminal(&h.store, &accepted.document.document_id).await;
    assert_eq!(status, DocumentStatus::Completed);

    let doc = h.store.get_document(&accepted.document.document_id).unwrap();
    assert_eq!(doc.chunk_count, 3);
    assert_eq!(doc.character_count, Some(2400));

    // chunk_count matches the stored chunks, every vector has the
    // configured dimension
    let chunks = h.store.get_chunks(&doc.document_id).unwrap();
    assert_eq!(chunks.len(), doc.chunk_count as usize);
    for chunk in &chunks {
        assert_eq!(chunk.embedding.as_ref().map(Vec::len), Some(DIM));
    }
}

#[tokio::test]
async fn semantic_search_returns_fox_chunks_descending() {
    let h = harness();
    let accepted = h
        .state
        .uploads()
        .accept("fox.txt", fox_text().as_bytes())
        .await
        .unwrap();
    wait_for_terminal(&h.store, &accepted.document.document_id).await;

    let results = h.state.search().semantic("fox", 2, None, 0.0).await.unwrap();

    assert_eq!(results.len(), 2);
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    for hit in &results {
        assert!(hit.chunk.text.contains("fox"));
        assert_eq!(hit.document_name, "fox.txt");
    }
}

#[tokio::test]
async fn hybrid_search_ranks_by_weighted_fusion() {
    let h = harness();
    let accepted = h
        .state
        .uploads()
        .accept("fox.txt", fox_text().as_bytes())
        .await
        .unwrap();
    wait_for_terminal(&h.store, &accepted.document.document_id).await;

    let results = h
        .state
        .search()
        .hybrid("fox", 3, None, 0.5, 0.5, 0.0)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    for hit in &results {
        let expected = 0.5 * hit.semantic_score.unwrap() + 0.5 * hit.keyword_score.unwrap();
        assert!((hit.score - expected).abs() < 1e-6);
        // Every returned chunk came from a candidate set; with this corpus
        // every chunk matches the probe word
        assert!(hit.chunk.text.to_lowercase().contains("fox"));
    }
    for pair in results.windows(2) {
        assert!(
            pair[0].score > pair[1].score
                || ((pair[0].score - pair[1].score).abs() < 1e-6
                    && (pair[0].chunk.document_id.as_str(), pair[0].chunk.chunk_index)
                        <= (pair[1].chunk.document_id.as_str(), pair[1].chunk.chunk_index))
        );
    }
}

#[tokio::test]
async fn chat_with_no_documents_short_circuits() {
    let h = harness();

    let answer = h.state.rag().answer(&chat_request("anything")).await.unwrap();

    assert!(answer.answer.contains("no indexed documents available"));
    assert!(answer.sources.is_empty());
    assert_eq!(answer.context_used, 0);
    assert_eq!(answer.tokens_used, 0);
    assert_eq!(h.chat.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn chat_cites_the_ingested_document() {
    let h = harness();
    let text = "Machine learning is a subset of artificial intelligence focused on \
                learning from data. The fox is unrelated but keeps the embedder honest.";
    let accepted = h
        .state
        .uploads()
        .accept("ml_intro.txt", text.as_bytes())
        .await
        .unwrap();
    wait_for_terminal(&h.store, &accepted.document.document_id).await;

    let answer = h
        .state
        .rag()
        .answer(&chat_request("what is machine learning?"))
        .await
        .unwrap();

    assert_eq!(h.chat.calls.load(Ordering::SeqCst), 1);
    assert!(answer.context_used >= 1);
    assert!(!answer.sources.is_empty());
    assert_eq!(answer.sources[0].document_filename, "ml_intro.txt");
    assert!(answer.sources[0].text_preview.chars().count() <= 200);
    assert_eq!(answer.model, "fake-chat");
    assert_eq!(answer.tokens_used, 57);
}

#[tokio::test]
async fn deleting_a_document_removes_only_its_chunks() {
    let h = harness();

    let keep = h
        .state
        .uploads()
        .accept("keep.txt", b"The fox that stays around for a while.")
        .await
        .unwrap();
    let drop = h
        .state
        .uploads()
        .accept("drop.txt", b"A different fox that will be deleted.")
        .await
        .unwrap();
    wait_for_terminal(&h.store, &keep.document.document_id).await;
    wait_for_terminal(&h.store, &drop.document.document_id).await;

    let removed = h.store.delete_document(&drop.document.document_id).unwrap();
    assert!(removed >= 1);

    assert!(h.store.get_document(&drop.document.document_id).is_err());
    let kept_chunks = h.store.get_chunks(&keep.document.document_id).unwrap();
    assert!(!kept_chunks.is_empty());
    assert_eq!(
        h.store.count_chunks(None).unwrap(),
        kept_chunks.len() as u64
    );

    // Deleted chunks no longer surface in retrieval
    let results = h.state.search().semantic("fox", 10, None, 0.0).await.unwrap();
    assert!(results
        .iter()
        .all(|hit| hit.chunk.document_id == keep.document.document_id));
}
