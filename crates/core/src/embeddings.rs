use crate::error::QaError;
use async_trait::async_trait;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 128;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Turns text into fixed-dimension vectors. Output order matches input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn dimensions(&self) -> usize;

    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, QaError>;

    /// Queries may be embedded differently from documents, but always with
    /// the same model.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, QaError> {
        self.embed_documents(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                QaError::EmbeddingService(format!("{} returned no query embedding", self.name()))
            })
    }
}

/// Checks a provider response before anything is stored from it.
pub fn check_embeddings(
    provider: &str,
    expected_count: usize,
    dimensions: usize,
    vectors: &[Vec<f32>],
) -> Result<(), QaError> {
    if vectors.len() != expected_count {
        return Err(QaError::EmbeddingService(format!(
            "{provider} returned {} embeddings for {expected_count} inputs",
            vectors.len()
        )));
    }

    for (index, vector) in vectors.iter().enumerate() {
        if vector.len() != dimensions {
            return Err(QaError::EmbeddingService(format!(
                "{provider} embedding {index} has dimension {} instead of {dimensions}",
                vector.len()
            )));
        }
        if vector.iter().any(|value| !value.is_finite()) {
            return Err(QaError::EmbeddingService(format!(
                "{provider} embedding {index} contains non-finite values"
            )));
        }
    }

    Ok(())
}

/// Offline embedder hashing character trigrams into buckets. Useful without
/// network access and in tests; not a semantic model.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    /// Unit-length trigram histogram of the lowercased text. Texts shorter
    /// than three characters map to the zero vector.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let buckets = self.dimensions.max(1);
        let mut vector = vec![0f32; buckets];

        let chars = text.chars().flat_map(char::to_lowercase).collect::<Vec<_>>();
        for trigram in chars.windows(3) {
            vector[trigram_bucket(trigram, buckets)] += 1.0;
        }

        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|value| *value /= norm);
        }
        vector
    }
}

fn trigram_bucket(trigram: &[char], buckets: usize) -> usize {
    let hash = trigram
        .iter()
        .flat_map(|ch| u32::from(*ch).to_le_bytes())
        .fold(FNV_OFFSET, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
        });
    (hash % buckets as u64) as usize
}

#[async_trait]
impl EmbeddingProvider for CharacterNgramEmbedder {
    fn name(&self) -> &'static str {
        "local"
    }

    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, QaError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }
}
