use crate::{Chunk, QaError};
use async_trait::async_trait;

/// Score of one stored vector against a query, addressed by chunk position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorHit {
    pub position: usize,
    pub score: f32,
}

/// A vector index technology. Each `build` produces an independent index for
/// one document.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// `embeddings[i]` belongs to `chunks[i]`; both must be complete.
    async fn build(
        &self,
        chunks: &[Chunk],
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Box<dyn VectorIndex>, QaError>;
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest similarity first. May return fewer than `top_k` hits.
    async fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<VectorHit>, QaError>;

    /// Releases backend-side storage. Indexes held in memory need nothing.
    async fn discard(&self) -> Result<(), QaError> {
        Ok(())
    }
}
