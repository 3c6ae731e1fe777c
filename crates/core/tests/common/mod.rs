#![allow(dead_code)]

use async_trait::async_trait;
use docqa_core::{
    ApiKey, CharacterNgramEmbedder, ChunkingConfig, Chunk, Completion, EmbeddingProvider,
    InMemoryBackend, LanguageModel, QaConfig, QaCoordinator, QaError, TokenUsage, VectorBackend,
    VectorHit, VectorIndex,
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn build_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for text in pages {
        // An empty string yields a page with no text operators at all.
        let operations = if text.is_empty() {
            Vec::new()
        } else {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content should encode"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("pdf should serialize");
    bytes
}

/// Local trigram embeddings plus call counting and an optional poison marker.
#[derive(Default)]
pub struct CountingEmbedder {
    inner: CharacterNgramEmbedder,
    pub document_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
    pub fail_on: Mutex<Option<String>>,
}

impl CountingEmbedder {
    pub fn failing_on(marker: &str) -> Self {
        let embedder = Self::default();
        embedder.set_failure(Some(marker));
        embedder
    }

    pub fn set_failure(&self, marker: Option<&str>) {
        *self.fail_on.lock().expect("failure marker") = marker.map(str::to_string);
    }

    pub fn total_calls(&self) -> usize {
        self.document_calls.load(Ordering::SeqCst) + self.query_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions
    }

    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, QaError> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        let marker = self.fail_on.lock().expect("failure marker").clone();
        if let Some(marker) = marker {
            if texts.iter().any(|text| text.contains(&marker)) {
                return Err(QaError::EmbeddingService(format!(
                    "quota exceeded while embedding '{marker}'"
                )));
            }
        }
        Ok(texts.iter().map(|text| self.inner.embed(text)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, QaError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.embed(text))
    }
}

#[derive(Default)]
pub struct CountingBackend {
    pub builds: AtomicUsize,
    pub discards: Arc<AtomicUsize>,
}

struct CountingIndex {
    inner: Box<dyn VectorIndex>,
    discards: Arc<AtomicUsize>,
}

#[async_trait]
impl VectorBackend for CountingBackend {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn build(
        &self,
        chunks: &[Chunk],
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Box<dyn VectorIndex>, QaError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        let inner = InMemoryBackend.build(chunks, embeddings).await?;
        Ok(Box::new(CountingIndex {
            inner,
            discards: self.discards.clone(),
        }))
    }
}

#[async_trait]
impl VectorIndex for CountingIndex {
    fn len(&self) -> usize {
        self.inner.len()
    }

    async fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<VectorHit>, QaError> {
        self.inner.search(query_vector, top_k).await
    }

    async fn discard(&self) -> Result<(), QaError> {
        self.discards.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Records prompts and replies with a fixed answer, or fails on demand.
pub struct ScriptedModel {
    pub reply: String,
    pub prompts: Mutex<Vec<String>>,
    pub unavailable: AtomicBool,
}

impl ScriptedModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().expect("prompt log").len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().expect("prompt log").last().cloned()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<Completion, QaError> {
        self.prompts
            .lock()
            .expect("prompt log")
            .push(prompt.to_string());
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QaError::Generation("service unavailable".to_string()));
        }
        Ok(Completion {
            text: self.reply.clone(),
            usage: Some(TokenUsage {
                prompt_tokens: Some(100),
                completion_tokens: Some(10),
                total_tokens: Some(110),
            }),
        })
    }
}

pub struct Harness {
    pub embedder: Arc<CountingEmbedder>,
    pub backend: Arc<CountingBackend>,
    pub model: Arc<ScriptedModel>,
    pub coordinator: QaCoordinator,
}

impl Harness {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self::with_embedder(CountingEmbedder::default(), chunk_size, chunk_overlap)
    }

    pub fn with_embedder(embedder: CountingEmbedder, chunk_size: usize, chunk_overlap: usize) -> Self {
        let embedder = Arc::new(embedder);
        let backend = Arc::new(CountingBackend::default());
        let model = Arc::new(ScriptedModel::replying("  The answer is on page two.  "));
        let config = QaConfig {
            api_key: Some(ApiKey::new("unused").expect("key")),
            chunking: ChunkingConfig {
                chunk_size,
                chunk_overlap,
                ..ChunkingConfig::default()
            },
            embedding_batch_size: 1,
            ..QaConfig::default()
        };

        let coordinator =
            QaCoordinator::new(&config, embedder.clone(), backend.clone(), model.clone())
                .expect("coordinator should build");

        Self {
            embedder,
            backend,
            model,
            coordinator,
        }
    }

    pub fn pipeline_calls(&self) -> usize {
        self.embedder.total_calls()
            + self.backend.builds.load(Ordering::SeqCst)
            + self.model.calls()
    }
}

pub const LEASE_PAGES: [&str; 3] = [
    "This lease is made between Acme Corp and Beta LLC.",
    "The monthly rent for the warehouse is 4200 dollars.",
    "Either party may terminate with ninety days notice.",
];
