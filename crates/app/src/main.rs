mod presentation;
mod shell;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use docqa_core::config::DEFAULT_REQUEST_TIMEOUT;
use docqa_core::gemini::{
    DEFAULT_BASE_URL, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_GENERATION_MODEL, DEFAULT_TEMPERATURE,
};
use docqa_core::index::{DEFAULT_EMBEDDING_BATCH_SIZE, DEFAULT_EMBEDDING_CONCURRENCY};
use docqa_core::{
    ApiKey, ChunkingConfig, EmbeddingBackend, GeminiSettings, QaConfig, QaCoordinator, QaError,
    Session, UploadedDocument, VectorBackendKind,
};
use presentation::Theme;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docqa", version, about = "Ask questions about a PDF document")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// API key for the embedding and generation services
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini API base URL
    #[arg(long, env = "DOCQA_GEMINI_URL", default_value = DEFAULT_BASE_URL)]
    gemini_url: String,

    /// Embedding model name
    #[arg(long, env = "DOCQA_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Dimension of the vectors returned by the embedding model
    #[arg(long, env = "DOCQA_EMBEDDING_DIMENSIONS", default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    embedding_dimensions: usize,

    /// Generation model name
    #[arg(long, env = "DOCQA_GENERATION_MODEL", default_value = DEFAULT_GENERATION_MODEL)]
    generation_model: String,

    /// Sampling temperature for answer generation
    #[arg(long, env = "DOCQA_TEMPERATURE", default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,

    /// Embedding backend
    #[arg(long, env = "DOCQA_EMBEDDING_BACKEND", value_enum, default_value_t = EmbeddingChoice::Gemini)]
    embedding_backend: EmbeddingChoice,

    /// Vector index backend
    #[arg(long, env = "DOCQA_VECTOR_BACKEND", value_enum, default_value_t = VectorChoice::Memory)]
    vector_backend: VectorChoice,

    /// Qdrant base URL
    #[arg(long, env = "DOCQA_QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Maximum chunk length in characters
    #[arg(long, env = "DOCQA_CHUNK_SIZE", default_value_t = docqa_core::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Characters carried over between consecutive chunks
    #[arg(long, env = "DOCQA_CHUNK_OVERLAP", default_value_t = docqa_core::DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,

    /// Number of chunks handed to the answer generator
    #[arg(long, env = "DOCQA_TOP_K", default_value_t = docqa_core::DEFAULT_TOP_K)]
    top_k: usize,

    /// Chunks per embedding request
    #[arg(long, env = "DOCQA_EMBEDDING_BATCH_SIZE", default_value_t = DEFAULT_EMBEDDING_BATCH_SIZE)]
    embedding_batch_size: usize,

    /// Embedding requests in flight at once
    #[arg(long, env = "DOCQA_EMBEDDING_CONCURRENCY", default_value_t = DEFAULT_EMBEDDING_CONCURRENCY)]
    embedding_concurrency: usize,

    /// Timeout for every external HTTP call, in seconds
    #[arg(long, env = "DOCQA_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    timeout_secs: u64,

    /// JSON file with the user-facing strings
    #[arg(long, env = "DOCQA_THEME", default_value = "styles/theme.json")]
    theme: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbeddingChoice {
    Gemini,
    Local,
}

#[derive(Clone, Copy, ValueEnum)]
enum VectorChoice {
    Memory,
    Qdrant,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a PDF and answer one question about it.
    Ask {
        /// PDF file to upload.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Question about the document.
        #[arg(long, default_value = "")]
        question: String,
    },
    /// Interactive session: open documents and ask repeatedly.
    Shell {
        /// PDF file to upload before the first prompt.
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

impl Cli {
    fn qa_config(&self) -> Result<QaConfig, QaError> {
        let api_key = self.api_key.as_deref().map(ApiKey::new).transpose()?;

        Ok(QaConfig {
            api_key,
            gemini: GeminiSettings {
                base_url: self.gemini_url.clone(),
                embedding_model: self.embedding_model.clone(),
                embedding_dimensions: self.embedding_dimensions,
                generation_model: self.generation_model.clone(),
                temperature: self.temperature,
            },
            embedding_backend: match self.embedding_backend {
                EmbeddingChoice::Gemini => EmbeddingBackend::Gemini,
                EmbeddingChoice::Local => EmbeddingBackend::Local,
            },
            vector_backend: match self.vector_backend {
                VectorChoice::Memory => VectorBackendKind::Memory,
                VectorChoice::Qdrant => VectorBackendKind::Qdrant,
            },
            qdrant_url: self.qdrant_url.clone(),
            chunking: ChunkingConfig {
                chunk_size: self.chunk_size,
                chunk_overlap: self.chunk_overlap,
                ..ChunkingConfig::default()
            },
            top_k: self.top_k,
            embedding_batch_size: self.embedding_batch_size,
            embedding_concurrency: self.embedding_concurrency,
            request_timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let (theme, theme_error) = Theme::load_or_default(&cli.theme);
    if let Some(error) = theme_error {
        warn!(stage = error.stage(), error = %error, "using default theme");
        eprintln!("{}", theme.render_warning(&error));
    }

    let coordinator = cli
        .qa_config()
        .and_then(|config| config.build_coordinator())
        .context("invalid configuration")?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "docqa boot"
    );

    match cli.command {
        Command::Ask { file, question } => Ok(run_ask(&coordinator, &theme, file, &question).await),
        Command::Shell { file } => {
            shell::run(&coordinator, &theme, file).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_ask(
    coordinator: &QaCoordinator,
    theme: &Theme,
    file: Option<PathBuf>,
    question: &str,
) -> ExitCode {
    let mut session = Session::new();
    println!("{}\n", theme.header());

    if let Some(path) = file {
        match load_upload(&path).await {
            Ok(document) => session.upload(document),
            Err(error) => {
                session.fail(&error);
                println!("{}", theme.render_error(&error));
                return ExitCode::FAILURE;
            }
        }
    }

    if session.document().is_some() && !question.trim().is_empty() {
        eprintln!("{}", theme.progress);
    }

    match session.process(coordinator, question).await {
        Ok(answer) => {
            print!("{}", theme.render_answer(answer));
            ExitCode::SUCCESS
        }
        Err(error) => {
            println!("{}", theme.render_error(&error));
            ExitCode::FAILURE
        }
    }
}

/// Reads a PDF from disk into an upload. Only `.pdf` files are accepted.
pub(crate) async fn load_upload(path: &Path) -> Result<UploadedDocument, QaError> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(QaError::Validation(format!(
            "{} is not a PDF file",
            path.display()
        )));
    }

    let bytes = tokio::fs::read(path).await.map_err(|error| {
        QaError::Validation(format!("could not read {}: {error}", path.display()))
    })?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(UploadedDocument::new(name, bytes))
}
