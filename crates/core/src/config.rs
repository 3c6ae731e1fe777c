use crate::chunking::ChunkingConfig;
use crate::embeddings::{CharacterNgramEmbedder, EmbeddingProvider};
use crate::error::QaError;
use crate::gemini::{GeminiClient, GeminiSettings};
use crate::generation::LanguageModel;
use crate::index::{DEFAULT_EMBEDDING_BATCH_SIZE, DEFAULT_EMBEDDING_CONCURRENCY};
use crate::orchestrator::QaCoordinator;
use crate::stores::{InMemoryBackend, QdrantBackend};
use crate::traits::VectorBackend;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Credential shared by the embedding and generation services. Its value
/// never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Result<Self, QaError> {
        let value = value.into().trim().to_string();
        if value.is_empty() {
            return Err(QaError::Configuration("API key is empty".to_string()));
        }
        Ok(Self(value))
    }

    pub fn from_env(variable: &str) -> Result<Self, QaError> {
        let value = std::env::var(variable).map_err(|_| {
            QaError::Configuration(format!("{variable} environment variable not set"))
        })?;
        Self::new(value)
            .map_err(|_| QaError::Configuration(format!("{variable} environment variable is empty")))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    Gemini,
    /// Offline character-trigram hashing.
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorBackendKind {
    Memory,
    Qdrant,
}

#[derive(Debug, Clone)]
pub struct QaConfig {
    pub api_key: Option<ApiKey>,
    pub gemini: GeminiSettings,
    pub embedding_backend: EmbeddingBackend,
    pub vector_backend: VectorBackendKind,
    pub qdrant_url: String,
    pub chunking: ChunkingConfig,
    pub top_k: usize,
    pub embedding_batch_size: usize,
    pub embedding_concurrency: usize,
    pub request_timeout: Duration,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            gemini: GeminiSettings::default(),
            embedding_backend: EmbeddingBackend::Gemini,
            vector_backend: VectorBackendKind::Memory,
            qdrant_url: "http://localhost:6333".to_string(),
            chunking: ChunkingConfig::default(),
            top_k: DEFAULT_TOP_K,
            embedding_batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
            embedding_concurrency: DEFAULT_EMBEDDING_CONCURRENCY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl QaConfig {
    pub fn validate(&self) -> Result<(), QaError> {
        self.chunking.validate()?;

        if self.top_k == 0 {
            return Err(QaError::Configuration("top_k must be positive".to_string()));
        }
        if self.embedding_batch_size == 0 || self.embedding_concurrency == 0 {
            return Err(QaError::Configuration(
                "embedding batch size and concurrency must be positive".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(QaError::Configuration(
                "request timeout must be positive".to_string(),
            ));
        }

        parse_http_url("gemini base url", &self.gemini.base_url)?;
        if self.vector_backend == VectorBackendKind::Qdrant {
            parse_http_url("qdrant url", &self.qdrant_url)?;
        }

        // Generation always goes to Gemini, so the key is required either way.
        if self.api_key.is_none() {
            return Err(QaError::Configuration(format!(
                "no API key configured; set {API_KEY_ENV} or pass --api-key"
            )));
        }

        Ok(())
    }

    pub fn http_client(&self) -> Result<reqwest::Client, QaError> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|error| QaError::Configuration(format!("http client: {error}")))
    }

    /// Validates the configuration and wires the selected collaborators.
    pub fn build_coordinator(&self) -> Result<QaCoordinator, QaError> {
        self.validate()?;

        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| QaError::Configuration("no API key configured".to_string()))?;
        let client = self.http_client()?;
        let gemini = Arc::new(GeminiClient::new(client.clone(), api_key, self.gemini.clone())?);

        let embedder: Arc<dyn EmbeddingProvider> = match self.embedding_backend {
            EmbeddingBackend::Gemini => gemini.clone(),
            EmbeddingBackend::Local => Arc::new(CharacterNgramEmbedder::default()),
        };
        let backend: Arc<dyn VectorBackend> = match self.vector_backend {
            VectorBackendKind::Memory => Arc::new(InMemoryBackend),
            VectorBackendKind::Qdrant => Arc::new(QdrantBackend::new(&self.qdrant_url, client)),
        };
        let model: Arc<dyn LanguageModel> = gemini;

        QaCoordinator::new(self, embedder, backend, model)
    }
}

fn parse_http_url(label: &str, value: &str) -> Result<Url, QaError> {
    let url = Url::parse(value)
        .map_err(|error| QaError::Configuration(format!("{label} '{value}': {error}")))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(QaError::Configuration(format!(
            "{label} '{value}' must use http or https"
        )));
    }
    Ok(url)
}
