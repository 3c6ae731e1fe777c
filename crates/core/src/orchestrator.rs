use crate::chunking::TextSplitter;
use crate::config::QaConfig;
use crate::embeddings::EmbeddingProvider;
use crate::extractor::{extract_with, LopdfExtractor, PdfExtractor};
use crate::generation::{AnswerGenerator, LanguageModel};
use crate::index::IndexBuilder;
use crate::retriever::Retriever;
use crate::traits::VectorBackend;
use crate::{Answer, ExtractedText, QaError, UploadedDocument};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Runs extraction, chunking, indexing, retrieval and generation for one
/// question. Holds no per-document state: every call builds a fresh index.
pub struct QaCoordinator {
    extractor: Arc<dyn PdfExtractor>,
    splitter: TextSplitter,
    index_builder: IndexBuilder,
    retriever: Retriever,
    generator: AnswerGenerator,
}

impl QaCoordinator {
    pub fn new(
        config: &QaConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        backend: Arc<dyn VectorBackend>,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self, QaError> {
        let splitter = TextSplitter::new(config.chunking.clone())?;
        let index_builder = IndexBuilder::new(embedder.clone(), backend)
            .with_batch_size(config.embedding_batch_size)
            .with_concurrency(config.embedding_concurrency);
        let retriever = Retriever::new(embedder).with_top_k(config.top_k);

        Ok(Self {
            extractor: Arc::new(LopdfExtractor),
            splitter,
            index_builder,
            retriever,
            generator: AnswerGenerator::new(model),
        })
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn PdfExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub async fn answer(
        &self,
        document: &UploadedDocument,
        question: &str,
    ) -> Result<Answer, QaError> {
        let fingerprint = document.fingerprint();
        let question = question.trim();

        let extracted = self.extract(document).await?;
        if extracted.is_blank() {
            return Err(QaError::Extraction(
                "could not extract text from the PDF".to_string(),
            ));
        }
        info!(
            document = %document.name,
            fingerprint = %fingerprint,
            page_count = extracted.page_count(),
            "text extracted"
        );

        let chunks = self.splitter.split(&extracted.full_text);
        if chunks.is_empty() {
            return Err(QaError::Chunking(
                "could not process the document text".to_string(),
            ));
        }

        let index = self
            .index_builder
            .build(chunks, &extracted.page_numbers())
            .await?;

        let outcome = async {
            let sources = self.retriever.retrieve(&index, question).await?;
            let completion = self.generator.generate(&sources, question).await?;
            Ok::<_, QaError>((sources, completion))
        }
        .await;

        if let Err(error) = index.discard().await {
            warn!(fingerprint = %fingerprint, error = %error, "failed to release vector index");
        }

        let (sources, completion) = outcome?;
        Ok(Answer {
            question: question.to_string(),
            text: completion.text,
            sources,
            document_fingerprint: fingerprint,
            usage: completion.usage,
            generated_at: Utc::now(),
        })
    }

    async fn extract(&self, document: &UploadedDocument) -> Result<ExtractedText, QaError> {
        let extractor = self.extractor.clone();
        let bytes = document.bytes.clone();

        tokio::task::spawn_blocking(move || extract_with(extractor.as_ref(), &bytes))
            .await
            .map_err(|error| QaError::Extraction(format!("extraction task failed: {error}")))?
    }
}
