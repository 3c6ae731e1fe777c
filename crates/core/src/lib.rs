pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod gemini;
pub mod generation;
pub mod index;
pub mod models;
pub mod orchestrator;
pub mod retriever;
pub mod session;
pub mod stores;
pub mod traits;

pub use chunking::{ChunkingConfig, TextSplitter, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use config::{ApiKey, EmbeddingBackend, QaConfig, VectorBackendKind, API_KEY_ENV, DEFAULT_TOP_K};
pub use embeddings::{CharacterNgramEmbedder, EmbeddingProvider, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{QaError, Result};
pub use extractor::{extract_text, extract_text_from_bytes, LopdfExtractor, PageText, PdfExtractor};
pub use gemini::{GeminiClient, GeminiSettings};
pub use generation::{build_prompt, AnswerGenerator, Completion, LanguageModel};
pub use index::{attribute_pages, DocumentIndex, IndexBuilder};
pub use models::{Answer, Chunk, ExtractedText, RetrievedChunk, TokenUsage, UploadedDocument};
pub use orchestrator::QaCoordinator;
pub use retriever::Retriever;
pub use session::{Session, SessionState};
pub use stores::{InMemoryBackend, QdrantBackend};
pub use traits::{VectorBackend, VectorHit, VectorIndex};
