use crate::traits::{VectorBackend, VectorHit, VectorIndex};
use crate::{Chunk, QaError};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

const BACKEND: &str = "qdrant";

/// Qdrant over its REST API. Every build creates a throwaway collection that
/// is deleted again by `discard`.
pub struct QdrantBackend {
    endpoint: String,
    client: Client,
}

impl QdrantBackend {
    pub fn new(endpoint: impl Into<String>, client: Client) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn create_collection(&self, collection: &str, vector_size: usize) -> Result<(), QaError> {
        let response = self
            .client
            .put(format!("{}/collections/{}", self.endpoint, collection))
            .json(&json!({
                "vectors": {
                    "size": vector_size,
                    "distance": "Cosine",
                }
            }))
            .send()
            .await
            .map_err(request_error)?;

        ensure_success(response, "create collection").await
    }

    async fn upsert_points(
        &self,
        collection: &str,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), QaError> {
        let points = chunks
            .iter()
            .zip(embeddings.iter())
            .map(|(chunk, embedding)| {
                json!({
                    "id": chunk.position,
                    "vector": embedding,
                    "payload": {
                        "position": chunk.position,
                        "text": chunk.text,
                    },
                })
            })
            .collect::<Vec<_>>();

        let response = self
            .client
            .put(format!(
                "{}/collections/{}/points?wait=true",
                self.endpoint, collection
            ))
            .json(&json!({ "points": points }))
            .send()
            .await
            .map_err(request_error)?;

        ensure_success(response, "upsert points").await
    }
}

pub struct QdrantIndex {
    endpoint: String,
    collection: String,
    client: Client,
    len: usize,
    vector_size: usize,
}

#[async_trait]
impl VectorBackend for QdrantBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn build(
        &self,
        chunks: &[Chunk],
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Box<dyn VectorIndex>, QaError> {
        if chunks.len() != embeddings.len() {
            return Err(backend_error(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let vector_size = embeddings.first().map(Vec::len).unwrap_or(0);
        if vector_size == 0 {
            return Err(backend_error("cannot create a collection without vectors"));
        }

        let collection = format!("docqa_{}", Uuid::new_v4().simple());
        self.create_collection(&collection, vector_size).await?;

        let index = QdrantIndex {
            endpoint: self.endpoint.clone(),
            collection,
            client: self.client.clone(),
            len: chunks.len(),
            vector_size,
        };

        if let Err(error) = self.upsert_points(&index.collection, chunks, &embeddings).await {
            // A half-filled collection must not outlive the failed build.
            if let Err(cleanup) = index.discard().await {
                warn!(collection = %index.collection, error = %cleanup, "failed to drop partial collection");
            }
            return Err(error);
        }

        debug!(collection = %index.collection, points = index.len, "qdrant collection ready");
        Ok(Box::new(index))
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    fn len(&self) -> usize {
        self.len
    }

    async fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<VectorHit>, QaError> {
        if query_vector.len() != self.vector_size {
            return Err(QaError::EmbeddingService(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.vector_size
            )));
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/search",
                self.endpoint, self.collection
            ))
            .json(&json!({
                "vector": query_vector,
                "limit": top_k,
                "with_payload": false,
            }))
            .send()
            .await
            .map_err(request_error)?;

        let response = check_status(response, "search").await?;
        let body: Value = response.json().await.map_err(request_error)?;
        let mut hits = parse_search_hits(&body)?;
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn discard(&self) -> Result<(), QaError> {
        let response = self
            .client
            .delete(format!("{}/collections/{}", self.endpoint, self.collection))
            .send()
            .await
            .map_err(request_error)?;

        ensure_success(response, "delete collection").await
    }
}

fn parse_search_hits(body: &Value) -> Result<Vec<VectorHit>, QaError> {
    let results = body
        .pointer("/result")
        .and_then(Value::as_array)
        .ok_or_else(|| backend_error("search response has no result array"))?;

    let mut hits = results
        .iter()
        .map(|hit| {
            let position = hit
                .pointer("/id")
                .and_then(Value::as_u64)
                .ok_or_else(|| backend_error(format!("search hit without numeric id: {hit}")))?;
            let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);
            Ok(VectorHit {
                position: position as usize,
                score: score as f32,
            })
        })
        .collect::<Result<Vec<_>, QaError>>()?;

    hits.sort_by(|left, right| {
        right
            .score
            .total_cmp(&left.score)
            .then(left.position.cmp(&right.position))
    });
    Ok(hits)
}

fn backend_error(details: impl Into<String>) -> QaError {
    QaError::VectorIndex {
        backend: BACKEND.to_string(),
        details: details.into(),
    }
}

fn request_error(error: reqwest::Error) -> QaError {
    backend_error(error.to_string())
}

async fn check_status(response: Response, operation: &str) -> Result<Response, QaError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(backend_error(format!("{operation} returned {status}: {body}")))
}

async fn ensure_success(response: Response, operation: &str) -> Result<(), QaError> {
    check_status(response, operation).await.map(|_| ())
}
