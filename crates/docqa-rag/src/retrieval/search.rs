//! Search service: semantic, keyword, and hybrid ranking

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::storage::Store;
use crate::types::Chunk;

/// Hybrid candidate sets are expanded to `min(k * 4, 40)` before fusion
const CANDIDATE_MULTIPLIER: usize = 4;
const CANDIDATE_CAP: usize = 40;

/// Keyword relevance saturates at five occurrences
const KEYWORD_SCORE_PER_MATCH: f32 = 0.2;

/// A ranked chunk with its scores and the owning document's filename
#[derive(Debug, Clone)]
pub struct RankedChunk {
    pub chunk: Chunk,
    pub document_name: String,
    /// Mode-specific primary score (similarity, relevance, or fused)
    pub score: f32,
    /// Cosine similarity component, when semantic search contributed
    pub semantic_score: Option<f32>,
    /// Keyword relevance component, when keyword search contributed
    pub keyword_score: Option<f32>,
    /// Substring occurrence count, for keyword results
    pub match_count: Option<usize>,
}

/// A neighboring chunk returned by context-mode search
#[derive(Debug, Clone)]
pub struct NeighborChunk {
    pub chunk_index: u32,
    pub text: String,
}

/// Statistics over the searchable corpus
#[derive(Debug, Clone, Copy)]
pub struct SearchStatistics {
    pub total_documents: u64,
    pub total_chunks: u64,
    pub chunks_with_embeddings: u64,
    pub searchable_percentage: f64,
    pub average_chunks_per_document: f64,
}

/// Ranks chunks for a query under semantic, keyword, and hybrid modes
pub struct SearchService {
    store: Arc<Store>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SearchService {
    pub fn new(store: Arc<Store>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Vector-similarity search
    pub async fn semantic(
        &self,
        query: &str,
        top_k: usize,
        filter_document: Option<&str>,
        min_similarity: f32,
    ) -> Result<Vec<RankedChunk>> {
        validate_query(query)?;
        tracing::info!("semantic search: \"{}\" (top_k={})", query, top_k);

        let query_embedding = self.embedder.embed_one(query).await?;
        let scored = self
            .store
            .search_vector(&query_embedding, top_k, filter_document, min_similarity)?;

        let mut names = NameCache::new(&self.store);
        scored
            .into_iter()
            .map(|hit| {
                let document_name = names.get(&hit.chunk.document_id)?;
                Ok(RankedChunk {
                    document_name,
                    score: hit.similarity,
                    semantic_score: Some(hit.similarity),
                    keyword_score: None,
                    match_count: None,
                    chunk: hit.chunk,
                })
            })
            .collect()
    }

    /// Case-insensitive substring search, scored by occurrence frequency
    pub async fn keyword(
        &self,
        query: &str,
        top_k: usize,
        filter_document: Option<&str>,
    ) -> Result<Vec<RankedChunk>> {
        validate_query(query)?;
        tracing::info!("keyword search: \"{}\" (top_k={})", query, top_k);

        let matches = self.store.search_substring(query, top_k, filter_document)?;

        let mut names = NameCache::new(&self.store);
        let mut results = Vec::with_capacity(matches.len());
        for hit in matches {
            let score = keyword_score(hit.occurrences);
            let document_name = names.get(&hit.chunk.document_id)?;
            results.push(RankedChunk {
                document_name,
                score,
                semantic_score: None,
                keyword_score: Some(score),
                match_count: Some(hit.occurrences),
                chunk: hit.chunk,
            });
        }

        sort_ranked(&mut results);
        results.truncate(top_k);
        Ok(results)
    }

    /// Weighted fusion of semantic and keyword search over the union of their
    /// candidate sets. Missing components score 0; ties break on ascending
    /// `(document_id, chunk_index)`.
    pub async fn hybrid(
        &self,
        query: &str,
        top_k: usize,
        filter_document: Option<&str>,
        semantic_weight: f32,
        keyword_weight: f32,
        min_similarity: f32,
    ) -> Result<Vec<RankedChunk>> {
        validate_query(query)?;
        let (semantic_weight, keyword_weight) =
            normalize_weights(semantic_weight, keyword_weight)?;
        tracing::info!(
            "hybrid search: \"{}\" (top_k={}, semantic_w={:.2}, keyword_w={:.2})",
            query,
            top_k,
            semantic_weight,
            keyword_weight
        );

        let fetch = (top_k * CANDIDATE_MULTIPLIER).min(CANDIDATE_CAP).max(top_k);
        let semantic = self
            .semantic(query, fetch, filter_document, min_similarity)
            .await?;
        let keyword = self.keyword(query, fetch, filter_document).await?;

        // Union candidates by position; BTreeMap keeps the deterministic
        // (document_id, chunk_index) order for tie-breaking.
        let mut candidates: BTreeMap<(String, u32), RankedChunk> = BTreeMap::new();

        for hit in semantic {
            let key = (hit.chunk.document_id.clone(), hit.chunk.chunk_index);
            candidates.insert(key, hit);
        }
        for hit in keyword {
            let key = (hit.chunk.document_id.clone(), hit.chunk.chunk_index);
            match candidates.get_mut(&key) {
                Some(existing) => {
                    existing.keyword_score = hit.keyword_score;
                    existing.match_count = hit.match_count;
                }
                None => {
                    candidates.insert(key, hit);
                }
            }
        }

        let mut fused: Vec<RankedChunk> = candidates
            .into_values()
            .map(|mut candidate| {
                let semantic_score = candidate.semantic_score.unwrap_or(0.0);
                let keyword_score = candidate.keyword_score.unwrap_or(0.0);
                candidate.score =
                    semantic_weight * semantic_score + keyword_weight * keyword_score;
                candidate.semantic_score = Some(semantic_score);
                candidate.keyword_score = Some(keyword_score);
                candidate
            })
            .collect();

        sort_ranked(&mut fused);
        fused.truncate(top_k);
        Ok(fused)
    }

    /// Hybrid search plus each result's immediate neighbors in its document.
    /// Neighbors are presentation-only and never affect ranking.
    pub async fn hybrid_with_context(
        &self,
        query: &str,
        top_k: usize,
        filter_document: Option<&str>,
        semantic_weight: f32,
        keyword_weight: f32,
        min_similarity: f32,
    ) -> Result<Vec<(RankedChunk, Vec<NeighborChunk>)>> {
        let ranked = self
            .hybrid(
                query,
                top_k,
                filter_document,
                semantic_weight,
                keyword_weight,
                min_similarity,
            )
            .await?;

        let mut with_context = Vec::with_capacity(ranked.len());
        for hit in ranked {
            let mut neighbors = Vec::new();
            if let Some(previous) = hit.chunk.chunk_index.checked_sub(1) {
                if let Some(chunk) = self.store.get_chunk_at(&hit.chunk.document_id, previous)? {
                    neighbors.push(NeighborChunk {
                        chunk_index: chunk.chunk_index,
                        text: chunk.text,
                    });
                }
            }
            if let Some(chunk) = self
                .store
                .get_chunk_at(&hit.chunk.document_id, hit.chunk.chunk_index + 1)?
            {
                neighbors.push(NeighborChunk {
                    chunk_index: chunk.chunk_index,
                    text: chunk.text,
                });
            }
            with_context.push((hit, neighbors));
        }
        Ok(with_context)
    }

    /// Corpus statistics for `/search/stats` and `/rag/health`
    pub fn statistics(&self) -> Result<SearchStatistics> {
        let total_documents = self
            .store
            .count_documents(Some(crate::types::DocumentStatus::Completed))?;
        let total_chunks = self.store.count_chunks(None)?;
        let chunks_with_embeddings = self.store.count_chunks_with_embeddings()?;

        let searchable_percentage = if total_chunks > 0 {
            chunks_with_embeddings as f64 / total_chunks as f64 * 100.0
        } else {
            0.0
        };
        let average_chunks_per_document = if total_documents > 0 {
            total_chunks as f64 / total_documents as f64
        } else {
            0.0
        };

        Ok(SearchStatistics {
            total_documents,
            total_chunks,
            chunks_with_embeddings,
            searchable_percentage,
            average_chunks_per_document,
        })
    }
}

fn validate_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(Error::validation("query must not be empty"));
    }
    Ok(())
}

/// Keyword relevance: saturating occurrence frequency
fn keyword_score(occurrences: usize) -> f32 {
    (KEYWORD_SCORE_PER_MATCH * occurrences as f32).min(1.0)
}

/// Validate fusion weights and normalize them to sum to 1
fn normalize_weights(semantic_weight: f32, keyword_weight: f32) -> Result<(f32, f32)> {
    if semantic_weight < 0.0 || keyword_weight < 0.0 {
        return Err(Error::validation("search weights must be non-negative"));
    }
    let total = semantic_weight + keyword_weight;
    if total <= 0.0 {
        return Err(Error::validation("at least one search weight must be positive"));
    }
    Ok((semantic_weight / total, keyword_weight / total))
}

/// Descending by score, ties by ascending `(document_id, chunk_index)`
fn sort_ranked(results: &mut [RankedChunk]) {
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.chunk.document_id.cmp(&b.chunk.document_id))
            .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
    });
}

/// Per-query cache of document filenames
struct NameCache<'a> {
    store: &'a Store,
    names: HashMap<String, String>,
}

impl<'a> NameCache<'a> {
    fn new(store: &'a Store) -> Self {
        Self {
            store,
            names: HashMap::new(),
        }
    }

    fn get(&mut self, document_id: &str) -> Result<String> {
        if let Some(name) = self.names.get(document_id) {
            return Ok(name.clone());
        }
        let name = self.store.get_document(document_id)?.filename;
        self.names.insert(document_id.to_string(), name.clone());
        Ok(name)
    }
}
