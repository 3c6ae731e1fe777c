use crate::traits::{VectorBackend, VectorHit, VectorIndex};
use crate::{Chunk, QaError};
use async_trait::async_trait;

/// Exact cosine search over vectors held in process memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct InMemoryBackend;

#[derive(Debug)]
pub struct InMemoryIndex {
    vectors: Vec<Vec<f32>>,
    dimensions: usize,
}

impl InMemoryIndex {
    pub fn new(vectors: Vec<Vec<f32>>) -> Result<Self, QaError> {
        let dimensions = vectors.first().map(Vec::len).unwrap_or(0);
        if let Some((position, vector)) = vectors
            .iter()
            .enumerate()
            .find(|(_, vector)| vector.len() != dimensions)
        {
            return Err(QaError::VectorIndex {
                backend: "memory".to_string(),
                details: format!(
                    "vector {position} has dimension {} instead of {dimensions}",
                    vector.len()
                ),
            });
        }

        Ok(Self {
            vectors,
            dimensions,
        })
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorBackend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn build(
        &self,
        chunks: &[Chunk],
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Box<dyn VectorIndex>, QaError> {
        if chunks.len() != embeddings.len() {
            return Err(QaError::VectorIndex {
                backend: self.name().to_string(),
                details: format!(
                    "embedding count {} doesn't match chunk count {}",
                    embeddings.len(),
                    chunks.len()
                ),
            });
        }

        Ok(Box::new(InMemoryIndex::new(embeddings)?))
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn len(&self) -> usize {
        self.vectors.len()
    }

    async fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<VectorHit>, QaError> {
        if !self.vectors.is_empty() && query_vector.len() != self.dimensions {
            return Err(QaError::EmbeddingService(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.dimensions
            )));
        }

        let mut hits = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| VectorHit {
                position,
                score: cosine_similarity(vector, query_vector),
            })
            .collect::<Vec<_>>();

        // Stable sort keeps earlier chunks first on equal scores.
        hits.sort_by(|left, right| right.score.total_cmp(&left.score));
        hits.truncate(top_k);
        Ok(hits)
    }
}
