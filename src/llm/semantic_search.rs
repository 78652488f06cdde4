use anyhow::{Error, Result};
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::database::collections::CURRICULA;
use crate::database::vector_db::{ScoredRecord, VectorDB};
use crate::llm::embeddings::EmbeddingGenerator;

pub const DEFAULT_LIMIT: u64 = 5;
const EMBEDDING_CACHE_SIZE: usize = 256;

/// Nearest-neighbour lookup over stored passages.
#[async_trait]
pub trait PassageIndex: Send + Sync {
    async fn nearest(
        &self,
        collection: &str,
        query: Vec<f32>,
        limit: u64,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredRecord>>;
}

#[async_trait]
impl PassageIndex for VectorDB {
    async fn nearest(
        &self,
        collection: &str,
        query: Vec<f32>,
        limit: u64,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredRecord>> {
        self.search(collection, query, limit, None, score_threshold)
            .await
            .map_err(|e| Error::msg(format!("Failed to search: {}", e)))
    }
}

/// Finds curriculum passages related to a question and renders them as
/// prompt context.
pub struct KnowledgeRetriever {
    embeddings: EmbeddingGenerator,
    index: Arc<dyn PassageIndex>,
    collection_name: String,
    limit: u64,
    score_threshold: Option<f32>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl KnowledgeRetriever {
    pub fn new(embeddings: EmbeddingGenerator, index: Arc<dyn PassageIndex>, score_threshold: Option<f32>) -> Self {
        let capacity = NonZeroUsize::new(EMBEDDING_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Self {
            embeddings,
            index,
            collection_name: CURRICULA.to_string(),
            limit: DEFAULT_LIMIT,
            score_threshold,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(hit) = self.cache.lock().get(text) {
            return Ok(hit.clone());
        }
        let embedding = self.embeddings.generate_embedding(text).await?;
        self.cache.lock().put(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    pub async fn search(&self, question: &str) -> Result<Vec<ScoredRecord>> {
        let query = self.embed(question).await?;
        let hits = self
            .index
            .nearest(&self.collection_name, query, self.limit, self.score_threshold)
            .await?;
        log::debug!("{} passages matched in {}", hits.len(), self.collection_name);
        Ok(hits)
    }

    /// Returns formatted context, or `None` when nothing matched.
    pub async fn context_for(&self, question: &str) -> Result<Option<String>> {
        let hits = self.search(question).await?;
        if hits.is_empty() {
            return Ok(None);
        }
        Ok(Some(format_results(&hits)))
    }
}

fn passage_text(record: &ScoredRecord) -> String {
    match record.payload.get("text").and_then(|t| t.as_str()) {
        Some(text) => text.to_string(),
        None => serde_json::to_string(&record.payload).unwrap_or_default(),
    }
}

pub fn format_results(results: &[ScoredRecord]) -> String {
    let mut formatted = String::new();

    for (i, result) in results.iter().enumerate() {
        let source = result
            .payload
            .get("source")
            .and_then(|s| s.as_str())
            .map(|s| format!(" (Source: {})", s))
            .unwrap_or_default();
        formatted.push_str(&format!(
            "{}. [Score: {:.2}] {}{}\n",
            i + 1,
            result.score,
            passage_text(result),
            source
        ));
    }

    formatted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::vector_db::RecordId;
    use crate::testing::ScriptedProvider;
    use serde_json::json;
    use std::collections::HashMap;

    struct StaticIndex {
        hits: Vec<ScoredRecord>,
        calls: Mutex<Vec<(String, u64, Option<f32>)>>,
    }

    #[async_trait]
    impl PassageIndex for StaticIndex {
        async fn nearest(
            &self,
            collection: &str,
            _query: Vec<f32>,
            limit: u64,
            score_threshold: Option<f32>,
        ) -> Result<Vec<ScoredRecord>> {
            self.calls.lock().push((collection.to_string(), limit, score_threshold));
            Ok(self.hits.clone())
        }
    }

    fn record(id: u64, payload: serde_json::Value, score: f32) -> ScoredRecord {
        let payload: HashMap<String, serde_json::Value> = serde_json::from_value(payload).unwrap();
        ScoredRecord { id: RecordId::Num(id), payload, score }
    }

    #[test]
    fn formats_text_with_source_or_raw_payload() {
        let formatted = format_results(&[
            record(1, json!({ "text": "Thesis is 30 ECTS", "source": "handbook" }), 0.913),
            record(2, json!({ "module": "ML" }), 0.5),
        ]);
        assert_eq!(
            formatted,
            "1. [Score: 0.91] Thesis is 30 ECTS (Source: handbook)\n2. [Score: 0.50] {\"module\":\"ML\"}\n"
        );
    }

    #[tokio::test]
    async fn searches_curricula_and_caches_query_embeddings() {
        let provider = ScriptedProvider::replying("ok");
        let index = Arc::new(StaticIndex {
            hits: vec![record(1, json!({ "text": "Databases I" }), 0.8)],
            calls: Mutex::new(Vec::new()),
        });
        let retriever = KnowledgeRetriever::new(
            EmbeddingGenerator::new(Box::new(provider.clone()), 4),
            index.clone(),
            Some(0.3),
        );

        let context = retriever.context_for("Which database courses?").await.unwrap().unwrap();
        assert!(context.contains("Databases I"));
        retriever.context_for("Which database courses?").await.unwrap();

        assert_eq!(provider.embedded.lock().len(), 1);
        assert_eq!(
            index.calls.lock()[0],
            ("curricula".to_string(), 5, Some(0.3))
        );
    }

    #[tokio::test]
    async fn no_hits_means_no_context() {
        let index = Arc::new(StaticIndex { hits: Vec::new(), calls: Mutex::new(Vec::new()) });
        let retriever = KnowledgeRetriever::new(
            EmbeddingGenerator::new(Box::new(ScriptedProvider::replying("ok")), 4),
            index,
            None,
        );
        assert!(retriever.context_for("anything").await.unwrap().is_none());
    }
}
