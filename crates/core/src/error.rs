use thiserror::Error;

#[derive(Debug, Error)]
pub enum QaError {
    #[error("{0}")]
    Validation(String),

    #[error("pdf extraction error: {0}")]
    Extraction(String),

    #[error("invalid chunking config: {0}")]
    Chunking(String),

    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    #[error("invalid response from {backend}: {details}")]
    VectorIndex { backend: String, details: String },

    #[error("generation error: {0}")]
    Generation(String),

    #[error("resource load error: {0}")]
    ResourceLoad(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl QaError {
    /// Pipeline stage the error belongs to, used as a log field.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Extraction(_) => "extraction",
            Self::Chunking(_) => "chunking",
            Self::EmbeddingService(_) => "embedding",
            Self::VectorIndex { .. } => "vector_index",
            Self::Generation(_) => "generation",
            Self::ResourceLoad(_) => "resource",
            Self::Configuration(_) => "configuration",
            Self::InvalidArgument(_) => "argument",
            Self::Io(_) => "io",
        }
    }

    /// Errors the user fixes by changing their input rather than by retrying.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T, E = QaError> = std::result::Result<T, E>;
