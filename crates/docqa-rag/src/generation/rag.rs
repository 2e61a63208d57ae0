//! RAG orchestration: retrieve, assemble, complete, cite

use std::sync::Arc;

use crate::config::{RagOptions, SearchConfig};
use crate::error::{Error, Result};
use crate::providers::chat::ChatProvider;
use crate::retrieval::{RankedChunk, SearchService};
use crate::types::query::ChatRequest;
use crate::types::response::Source;

use super::prompt::PromptBuilder;

/// Maximum characters of a source text preview
const PREVIEW_CHARS: usize = 200;

/// A grounded answer with its citations
#[derive(Debug, Clone)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<Source>,
    pub context_used: usize,
    pub model: String,
    pub tokens_used: u32,
}

/// Turns a query plus optional prior turns into a grounded, cited answer
pub struct RagEngine {
    search: Arc<SearchService>,
    chat: Arc<dyn ChatProvider>,
    options: RagOptions,
    weights: SearchConfig,
}

impl RagEngine {
    pub fn new(
        search: Arc<SearchService>,
        chat: Arc<dyn ChatProvider>,
        options: RagOptions,
        weights: SearchConfig,
    ) -> Self {
        Self {
            search,
            chat,
            options,
            weights,
        }
    }

    /// Answer a chat request.
    ///
    /// When retrieval is empty the completion provider is never called and a
    /// fixed "no documents" answer is returned.
    pub async fn answer(&self, request: &ChatRequest) -> Result<RagAnswer> {
        if request.query.trim().is_empty() {
            return Err(Error::validation("query must not be empty"));
        }

        let top_k = request.top_k.unwrap_or(self.options.top_k_default);
        tracing::info!("rag chat: \"{}\" (top_k={})", request.query, top_k);

        let results = self
            .search
            .hybrid(
                &request.query,
                top_k,
                request.document_id.as_deref(),
                self.weights.semantic_weight,
                self.weights.keyword_weight,
                0.0,
            )
            .await?;

        if results.is_empty() {
            tracing::warn!("no indexed chunks matched the query; skipping completion");
            return Ok(RagAnswer {
                answer: self.options.no_context_answer.clone(),
                sources: Vec::new(),
                context_used: 0,
                model: "none".to_string(),
                tokens_used: 0,
            });
        }

        let assembled =
            PromptBuilder::assemble_context(&results, self.options.max_context_chars);
        let messages = PromptBuilder::build_messages(
            &assembled.text,
            request.conversation_history.as_deref(),
            &request.query,
        );

        let completion = self
            .chat
            .complete(
                &messages,
                request.temperature.unwrap_or(self.options.temperature_default),
                request.max_tokens.unwrap_or(self.options.max_tokens_default),
            )
            .await?;

        let sources = extract_sources(&results[..assembled.used]);
        tracing::info!(
            "rag chat answered with {} sources, {} tokens",
            sources.len(),
            completion.tokens_used
        );

        Ok(RagAnswer {
            answer: completion.text,
            sources,
            context_used: assembled.used,
            model: completion.model,
            tokens_used: completion.tokens_used,
        })
    }
}

/// Source entries for the results actually included in the context
fn extract_sources(included: &[RankedChunk]) -> Vec<Source> {
    included
        .iter()
        .enumerate()
        .map(|(i, result)| Source {
            index: i + 1,
            document_id: result.chunk.document_id.clone(),
            document_filename: result.document_name.clone(),
            chunk_index: result.chunk.chunk_index,
            relevance_score: result.score,
            text_preview: preview(&result.chunk.text),
        })
        .collect()
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    text.chars().take(PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::chat::{ChatMessage, Completion, Role};
    use crate::providers::EmbeddingProvider;
    use crate::storage::{FlatIndex, Store};
    use crate::types::{Document, FileType, NewChunk};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DIM: usize = 4;

    struct UniformEmbedder;

    #[async_trait]
    impl EmbeddingProvider for UniformEmbedder {
        async fn embed_one(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.5, 0.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            DIM
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "uniform"
        }
    }

    /// Counts calls and records the last message list
    struct CountingChat {
        calls: AtomicUsize,
        last_messages: parking_lot::Mutex<Vec<ChatMessage>>,
    }

    impl CountingChat {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                last_messages: parking_lot::Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatProvider for CountingChat {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            _temperature: f32,
            _max_tokens: u32,
        ) -> Result<Completion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_messages.lock() = messages.to_vec();
            Ok(Completion {
                text: "According to Source 1, machine learning learns from data.".to_string(),
                tokens_used: 42,
                model: "fake-model".to_string(),
            })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn model(&self) -> &str {
            "fake-model"
        }
    }

    fn engine_with(
        store: Arc<Store>,
        chat: Arc<CountingChat>,
    ) -> RagEngine {
        let search = Arc::new(SearchService::new(store, Arc::new(UniformEmbedder)));
        RagEngine::new(
            search,
            chat,
            RagOptions::default(),
            SearchConfig::default(),
        )
    }

    fn request(query: &str) -> ChatRequest {
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
    async fn empty_retrieval_short_circuits_without_completion() {
        let store = Arc::new(Store::in_memory(Box::new(FlatIndex::new()), DIM).unwrap());
        let chat = CountingChat::new();
        let engine = engine_with(store, chat.clone());

        let answer = engine.answer(&request("anything")).await.unwrap();

        assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
        assert!(answer.answer.contains("no indexed documents available"));
        assert!(answer.sources.is_empty());
        assert_eq!(answer.context_used, 0);
        assert_eq!(answer.tokens_used, 0);
    }

    #[tokio::test]
    async fn grounded_answer_cites_the_ingested_document() {
        let store = Arc::new(Store::in_memory(Box::new(FlatIndex::new()), DIM).unwrap());
        let doc = Document::new("ml_guide.txt", FileType::Txt, 50, "h", "/tmp/none");
        store.create_document(&doc).unwrap();
        store
            .create_chunks_batch(
                &doc.document_id,
                &[NewChunk {
                    index: 0,
                    text: "Machine learning is a subset of artificial intelligence.".into(),
                    embedding: Some(vec![1.0, 0.5, 0.0, 0.0]),
                }],
            )
            .unwrap();

        let chat = CountingChat::new();
        let engine = engine_with(store, chat.clone());

        let answer = engine
            .answer(&request("what is machine learning?"))
            .await
            .unwrap();

        assert_eq!(chat.calls.load(Ordering::SeqCst), 1);
        assert!(answer.context_used >= 1);
        assert!(!answer.sources.is_empty());
        assert_eq!(answer.sources[0].document_filename, "ml_guide.txt");
        assert_eq!(answer.sources[0].index, 1);
        assert_eq!(answer.model, "fake-model");
        assert_eq!(answer.tokens_used, 42);

        // The system prompt carries the grounding instruction and context
        let messages = chat.last_messages.lock();
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("[Source 1: ml_guide.txt]"));
        assert!(messages[0].content.contains("Machine learning is a subset"));
    }

    #[tokio::test]
    async fn history_is_passed_through_verbatim() {
        let store = Arc::new(Store::in_memory(Box::new(FlatIndex::new()), DIM).unwrap());
        let doc = Document::new("a.txt", FileType::Txt, 10, "h", "/tmp/none");
        store.create_document(&doc).unwrap();
        store
            .create_chunks_batch(
                &doc.document_id,
                &[NewChunk {
                    index: 0,
                    text: "Some indexed content.".into(),
                    embedding: Some(vec![1.0, 0.5, 0.0, 0.0]),
                }],
            )
            .unwrap();

        let chat = CountingChat::new();
        let engine = engine_with(store, chat.clone());

        let mut req = request("follow-up question");
        req.conversation_history = Some(vec![
            ChatMessage::user("first question"),
            ChatMessage::assistant("first answer"),
        ]);
        engine.answer(&req).await.unwrap();

        let messages = chat.last_messages.lock();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].content, "first question");
        assert_eq!(messages[2].content, "first answer");
        assert_eq!(messages[3].content, "follow-up question");
    }

    #[tokio::test]
    async fn previews_are_truncated() {
        let store = Arc::new(Store::in_memory(Box::new(FlatIndex::new()), DIM).unwrap());
        let doc = Document::new("long.txt", FileType::Txt, 10, "h", "/tmp/none");
        store.create_document(&doc).unwrap();
        store
            .create_chunks_batch(
                &doc.document_id,
                &[NewChunk {
                    index: 0,
                    text: "word ".repeat(100),
                    embedding: Some(vec![1.0, 0.5, 0.0, 0.0]),
                }],
            )
            .unwrap();

        let chat = CountingChat::new();
        let engine = engine_with(store, chat.clone());
        let answer = engine.answer(&request("words?")).await.unwrap();

        assert_eq!(answer.sources[0].text_preview.chars().count(), 200);
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let store = Arc::new(Store::in_memory(Box::new(FlatIndex::new()), DIM).unwrap());
        let chat = CountingChat::new();
        let engine = engine_with(store, chat.clone());

        assert!(matches!(
            engine.answer(&request("   ")).await,
            Err(Error::Validation(_))
        ));
        assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
    }
}
