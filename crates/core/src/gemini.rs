//! Google Gemini REST adapter.
//!
//! One [`GeminiClient`] serves both collaborators: chunk and query embeddings
//! through `batchEmbedContents`, and answers through `generateContent`. Both
//! calls authenticate with the `x-goog-api-key` header.

use crate::config::ApiKey;
use crate::embeddings::EmbeddingProvider;
use crate::error::QaError;
use crate::generation::{Completion, LanguageModel};
use crate::models::TokenUsage;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_EMBEDDING_MODEL: &str = "embedding-001";
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

const API_VERSION: &str = "v1beta";
const TASK_RETRIEVAL_DOCUMENT: &str = "RETRIEVAL_DOCUMENT";
const TASK_RETRIEVAL_QUERY: &str = "RETRIEVAL_QUERY";

#[derive(Debug, Clone, PartialEq)]
pub struct GeminiSettings {
    pub base_url: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub generation_model: String,
    pub temperature: f32,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

pub struct GeminiClient {
    client: Client,
    api_key: ApiKey,
    base_url: Url,
    settings: GeminiSettings,
}

impl GeminiClient {
    pub fn new(client: Client, api_key: ApiKey, settings: GeminiSettings) -> Result<Self, QaError> {
        let base_url = Url::parse(&settings.base_url).map_err(|error| {
            QaError::Configuration(format!("gemini base url '{}': {error}", settings.base_url))
        })?;

        Ok(Self {
            client,
            api_key,
            base_url,
            settings,
        })
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/{API_VERSION}/{}:{method}",
            self.base_url.as_str().trim_end_matches('/'),
            model_path(model)
        )
    }

    async fn post<B, T>(&self, url: String, body: &B) -> Result<T, String>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", self.api_key.expose())
            .json(body)
            .send()
            .await
            .map_err(|error| format!("request failed: {error}"))?;

        let response = check_response(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|error| format!("failed to parse response: {error}"))
    }

    async fn embed_with_task(
        &self,
        texts: &[&str],
        task_type: &'static str,
    ) -> Result<Vec<Vec<f32>>, QaError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = "gemini",
            model = %self.settings.embedding_model,
            batch_size = texts.len(),
            task_type,
            "embedding batch"
        );

        let model = model_path(&self.settings.embedding_model);
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|&text| EmbedRequest {
                    model: model.clone(),
                    content: RequestContent {
                        role: None,
                        parts: vec![RequestPart { text }],
                    },
                    task_type,
                })
                .collect(),
        };

        let url = self.model_url(&self.settings.embedding_model, "batchEmbedContents");
        let response: BatchEmbedResponse = self.post(url, &request).await.map_err(|message| {
            error!(provider = "gemini", error = %message, "embedding request failed");
            QaError::EmbeddingService(message)
        })?;

        Ok(response
            .embeddings
            .into_iter()
            .map(|embedding| embedding.values)
            .collect())
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn dimensions(&self) -> usize {
        self.settings.embedding_dimensions
    }

    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, QaError> {
        self.embed_with_task(texts, TASK_RETRIEVAL_DOCUMENT).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, QaError> {
        self.embed_with_task(&[text], TASK_RETRIEVAL_QUERY)
            .await?
            .into_iter()
            .next()
            .filter(|vector| !vector.is_empty())
            .ok_or_else(|| QaError::EmbeddingService("gemini returned no query embedding".to_string()))
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn name(&self) -> &str {
        &self.settings.generation_model
    }

    async fn complete(&self, prompt: &str) -> Result<Completion, QaError> {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                role: Some("user"),
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
            },
        };

        let url = self.model_url(&self.settings.generation_model, "generateContent");
        let response: GenerateResponse = self.post(url, &request).await.map_err(|message| {
            error!(provider = "gemini", error = %message, "generation request failed");
            QaError::Generation(message)
        })?;

        completion_from_response(response)
    }
}

fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

async fn check_response(response: Response) -> Result<Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(format!("API returned {status}: {}", error_detail(&body)))
}

fn error_detail(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|parsed| parsed.error.message)
        .unwrap_or_else(|_| body.to_string())
}

fn completion_from_response(response: GenerateResponse) -> Result<Completion, QaError> {
    let usage = response.usage_metadata.map(|usage| TokenUsage {
        prompt_tokens: usage.prompt_token_count,
        completion_tokens: usage.candidates_token_count,
        total_tokens: usage.total_token_count,
    });

    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(QaError::Generation(format!("prompt was blocked: {reason}")));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| QaError::Generation("response has no candidates".to_string()))?;

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
        return Err(QaError::Generation(format!(
            "model returned an empty answer (finish reason: {reason})"
        )));
    }

    Ok(Completion { text, usage })
}

// ── wire types ─────────────────────────────────────────────────────

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: String,
    content: RequestContent<'a>,
    task_type: &'static str,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    total_token_count: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}
