//! Per-document vector index construction.
//!
//! [`IndexBuilder`] embeds every chunk, hands the complete vector set to the
//! configured [`VectorBackend`], and records which page each chunk came from.
//! The result is a [`DocumentIndex`] that lives for one question.

use crate::embeddings::{check_embeddings, EmbeddingProvider};
use crate::traits::{VectorBackend, VectorIndex};
use crate::{Chunk, QaError, RetrievedChunk};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 16;
pub const DEFAULT_EMBEDDING_CONCURRENCY: usize = 4;

/// Assigns a page to every chunk.
///
/// With at least as many page numbers as chunks, chunk `i` gets
/// `page_numbers[i]`. Otherwise the page numbers are reused cyclically, which
/// is only an approximation of where a chunk came from.
pub fn attribute_pages(chunk_count: usize, page_numbers: &[u32]) -> Result<Vec<u32>, QaError> {
    if page_numbers.is_empty() {
        return Err(QaError::InvalidArgument(
            "page attribution needs at least one page number".to_string(),
        ));
    }

    let pages = if page_numbers.len() >= chunk_count {
        page_numbers[..chunk_count].to_vec()
    } else {
        (0..chunk_count)
            .map(|index| page_numbers[index % page_numbers.len()])
            .collect()
    };

    Ok(pages)
}

pub struct DocumentIndex {
    chunks: Vec<Chunk>,
    pages: Vec<u32>,
    vectors: Box<dyn VectorIndex>,
    backend: &'static str,
}

impl std::fmt::Debug for DocumentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentIndex")
            .field("chunks", &self.chunks.len())
            .field("pages", &self.pages)
            .field("backend", &self.backend)
            .finish()
    }
}

impl DocumentIndex {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Page per chunk, indexed by chunk position.
    pub fn page_attribution(&self) -> &[u32] {
        &self.pages
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// Top `top_k` chunks for an already embedded query, best first, earlier
    /// chunk first on equal scores.
    pub async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, QaError> {
        let mut hits = self.vectors.search(query_vector, top_k).await?;
        hits.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then(left.position.cmp(&right.position))
        });

        hits.into_iter()
            .take(top_k)
            .map(|hit| {
                let chunk = self.chunks.get(hit.position).cloned().ok_or_else(|| {
                    QaError::VectorIndex {
                        backend: self.backend.to_string(),
                        details: format!("hit references unknown chunk {}", hit.position),
                    }
                })?;
                Ok(RetrievedChunk {
                    page: self.pages[hit.position],
                    chunk,
                    score: hit.score,
                })
            })
            .collect()
    }

    pub async fn discard(self) -> Result<(), QaError> {
        self.vectors.discard().await
    }
}

pub struct IndexBuilder {
    embedder: Arc<dyn EmbeddingProvider>,
    backend: Arc<dyn VectorBackend>,
    batch_size: usize,
    concurrency: usize,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, backend: Arc<dyn VectorBackend>) -> Self {
        Self {
            embedder,
            backend,
            batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
            concurrency: DEFAULT_EMBEDDING_CONCURRENCY,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Either every chunk ends up in the index or the whole build fails.
    pub async fn build(
        &self,
        chunks: Vec<Chunk>,
        page_numbers: &[u32],
    ) -> Result<DocumentIndex, QaError> {
        if chunks.is_empty() {
            return Err(QaError::Chunking(
                "document produced no chunks to index".to_string(),
            ));
        }
        let pages = attribute_pages(chunks.len(), page_numbers)?;

        let embeddings = self.embed_all(&chunks).await?;
        let vectors = self.backend.build(&chunks, embeddings).await?;

        info!(
            backend = self.backend.name(),
            chunk_count = chunks.len(),
            page_count = page_numbers.len(),
            "knowledge base created from text chunks"
        );

        Ok(DocumentIndex {
            chunks,
            pages,
            vectors,
            backend: self.backend.name(),
        })
    }

    async fn embed_all(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>, QaError> {
        let texts = chunks.iter().map(|chunk| chunk.text.as_str()).collect::<Vec<_>>();
        let provider = self.embedder.name();
        let dimensions = self.embedder.dimensions();

        debug!(
            provider,
            chunk_count = texts.len(),
            batch_size = self.batch_size,
            concurrency = self.concurrency,
            "embedding chunks"
        );

        // `buffered` keeps batch order while running up to `concurrency`
        // requests; the first failure ends the collection.
        let batches = stream::iter(texts.chunks(self.batch_size))
            .map(|batch| async move {
                let vectors = self.embedder.embed_documents(batch).await?;
                check_embeddings(provider, batch.len(), dimensions, &vectors)?;
                Ok::<_, QaError>(vectors)
            })
            .buffered(self.concurrency)
            .try_collect::<Vec<_>>()
            .await?;

        Ok(batches.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::stores::InMemoryBackend;

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(position, text)| Chunk {
                position,
                text: text.to_string(),
            })
            .collect()
    }

    #[test]
    fn one_to_one_attribution_truncates_extra_pages() {
        let pages = attribute_pages(3, &[1, 2, 3, 4, 5]).expect("attribution");
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[test]
    fn attribution_wraps_when_chunks_outnumber_pages() {
        let pages = attribute_pages(7, &[1, 2, 3]).expect("attribution");
        assert_eq!(pages, vec![1, 2, 3, 1, 2, 3, 1]);

        let single = attribute_pages(4, &[1]).expect("attribution");
        assert_eq!(single, vec![1, 1, 1, 1]);
    }

    #[test]
    fn attribution_needs_page_numbers() {
        assert!(matches!(
            attribute_pages(2, &[]),
            Err(QaError::InvalidArgument(_))
        ));
        assert_eq!(attribute_pages(0, &[1]).expect("attribution"), Vec::<u32>::new());
    }

    #[tokio::test]
    async fn build_records_pages_and_chunks() {
        let builder = IndexBuilder::new(
            Arc::new(CharacterNgramEmbedder::default()),
            Arc::new(InMemoryBackend),
        )
        .with_batch_size(2)
        .with_concurrency(3);

        let index = builder
            .build(
                chunks(&["payment terms", "termination", "governing law", "notices", "venue"]),
                &[1, 2],
            )
            .await
            .expect("index should build");

        assert_eq!(index.len(), 5);
        assert_eq!(index.page_attribution(), &[1, 2, 1, 2, 1]);
        assert_eq!(index.backend(), "memory");
        assert_eq!(index.chunks()[3].text, "notices");
    }

    #[tokio::test]
    async fn build_rejects_empty_chunk_list() {
        let builder = IndexBuilder::new(
            Arc::new(CharacterNgramEmbedder::default()),
            Arc::new(InMemoryBackend),
        );
        let result = builder.build(Vec::new(), &[1]).await;
        assert!(matches!(result, Err(QaError::Chunking(_))));
    }

    #[tokio::test]
    async fn search_maps_hits_back_to_chunks_and_pages() {
        let builder = IndexBuilder::new(
            Arc::new(CharacterNgramEmbedder::default()),
            Arc::new(InMemoryBackend),
        );
        let index = builder
            .build(
                chunks(&["the lease term is five years", "rent is due monthly"]),
                &[3, 7],
            )
            .await
            .expect("index should build");

        let query = CharacterNgramEmbedder::default().embed("rent is due monthly");
        let hits = index.search(&query, 1).await.expect("search should succeed");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.position, 1);
        assert_eq!(hits[0].page, 7);
    }
}
