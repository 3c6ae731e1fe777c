use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A PDF handed to the session by the user. Only lives as long as the session
/// keeps it.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedDocument {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// SHA-256 of the raw bytes, hex encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    pub full_text: String,
    /// 1-indexed, contiguous, one entry per page.
    pub page_texts: BTreeMap<u32, String>,
}

impl ExtractedText {
    pub fn page_numbers(&self) -> Vec<u32> {
        self.page_texts.keys().copied().collect()
    }

    pub fn page_count(&self) -> usize {
        self.page_texts.len()
    }

    pub fn is_blank(&self) -> bool {
        self.full_text.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub position: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub page: u32,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub text: String,
    pub sources: Vec<RetrievedChunk>,
    pub document_fingerprint: String,
    pub usage: Option<TokenUsage>,
    pub generated_at: DateTime<Utc>,
}

impl Answer {
    /// Distinct source pages in retrieval order.
    pub fn source_pages(&self) -> Vec<u32> {
        let mut pages = Vec::new();
        for source in &self.sources {
            if !pages.contains(&source.page) {
                pages.push(source.page);
            }
        }
        pages
    }
}
