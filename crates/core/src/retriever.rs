use crate::config::DEFAULT_TOP_K;
use crate::embeddings::EmbeddingProvider;
use crate::index::DocumentIndex;
use crate::{QaError, RetrievedChunk};
use std::sync::Arc;
use tracing::debug;

/// Embeds a question and looks it up in a document index. Must share the
/// embedding provider that built the index.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub async fn retrieve(
        &self,
        index: &DocumentIndex,
        query: &str,
    ) -> Result<Vec<RetrievedChunk>, QaError> {
        self.retrieve_k(index, query, self.top_k).await
    }

    /// Returns `min(k, index.len())` chunks, most similar first.
    pub async fn retrieve_k(
        &self,
        index: &DocumentIndex,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, QaError> {
        let query_vector = self.embedder.embed_query(query).await?;
        let expected = self.embedder.dimensions();
        if query_vector.len() != expected {
            return Err(QaError::EmbeddingService(format!(
                "{} query embedding has dimension {} instead of {expected}",
                self.embedder.name(),
                query_vector.len()
            )));
        }

        let results = index.search(&query_vector, k).await?;
        debug!(
            requested = k,
            returned = results.len(),
            chunk_count = index.len(),
            "similarity search complete"
        );
        Ok(results)
    }
}
