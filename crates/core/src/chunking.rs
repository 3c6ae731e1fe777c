use crate::error::QaError;
use crate::models::Chunk;
use std::collections::VecDeque;
use tracing::{debug, warn};

pub const DEFAULT_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Most preferred first. An empty string splits between characters.
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: ["\n\n", "\n", ".", " ", ""]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), QaError> {
        if self.chunk_size == 0 {
            return Err(QaError::Chunking("chunk_size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(QaError::Chunking(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Recursive character splitter: splits on the most preferred separator
/// present, merges small pieces up to `chunk_size`, and recurses into pieces
/// that are still too long with the remaining separators.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: ChunkingConfig,
}

impl TextSplitter {
    pub fn new(config: ChunkingConfig) -> Result<Self, QaError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn split(&self, text: &str) -> Vec<Chunk> {
        let chunks = self
            .split_recursive(text, &self.config.separators)
            .into_iter()
            .enumerate()
            .map(|(position, text)| Chunk { position, text })
            .collect::<Vec<_>>();

        debug!(chunk_count = chunks.len(), "text split into chunks");
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];

        for (index, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate.as_str();
                remaining = &separators[index + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut fitting = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.config.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge_pieces(&fitting));
                fitting.clear();
            }

            if remaining.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge_pieces(&fitting));
        }

        chunks
    }

    /// Pieces already carry their separators, so they are joined with nothing.
    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let chunk_size = self.config.chunk_size;
        let chunk_overlap = self.config.chunk_overlap;

        let mut merged = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > chunk_size && !current.is_empty() {
                if total > chunk_size {
                    warn!(total, chunk_size, "created a chunk longer than chunk_size");
                }
                if let Some(chunk) = join_trimmed(&current) {
                    merged.push(chunk);
                }

                // Keep a tail of at most chunk_overlap characters that still
                // leaves room for the incoming piece.
                while total > chunk_overlap || (total + len > chunk_size && total > 0) {
                    match current.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            current.push_back(piece);
            total += len;
        }

        if let Some(chunk) = join_trimmed(&current) {
            merged.push(chunk);
        }

        merged
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn join_trimmed(pieces: &VecDeque<&str>) -> Option<String> {
    let joined = pieces.iter().copied().collect::<String>();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Splits `text` at every occurrence of `separator`, attaching the separator
/// to the start of the following piece. Empty pieces are dropped.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(start, ch)| &text[start..start + ch.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (index, _) in text.match_indices(separator) {
        if index > start {
            pieces.push(&text[start..index]);
        }
        start = index;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter(chunk_size: usize, chunk_overlap: usize) -> TextSplitter {
        TextSplitter::new(ChunkingConfig {
            chunk_size,
            chunk_overlap,
            ..ChunkingConfig::default()
        })
        .expect("config should be valid")
    }

    /// Fixed-width tokens so every chunk has exactly one location in the text.
    fn numbered_text(paragraphs: usize, words_per_paragraph: usize) -> String {
        let mut counter = 0;
        (0..paragraphs)
            .map(|_| {
                (0..words_per_paragraph)
                    .map(|_| {
                        counter += 1;
                        format!("w{counter:05}")
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn locate(text: &str, chunks: &[Chunk]) -> Vec<(usize, usize)> {
        chunks
            .iter()
            .map(|chunk| {
                let start = text
                    .find(&chunk.text)
                    .unwrap_or_else(|| panic!("chunk {} is not a substring", chunk.position));
                (start, start + chunk.text.len())
            })
            .collect()
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let config = ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..ChunkingConfig::default()
        };
        assert!(matches!(TextSplitter::new(config), Err(QaError::Chunking(_))));

        let config = ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 250,
            ..ChunkingConfig::default()
        };
        assert!(matches!(TextSplitter::new(config), Err(QaError::Chunking(_))));

        let config = ChunkingConfig {
            chunk_size: 0,
            chunk_overlap: 0,
            ..ChunkingConfig::default()
        };
        assert!(matches!(TextSplitter::new(config), Err(QaError::Chunking(_))));
    }

    #[test]
    fn short_text_is_a_single_trimmed_chunk() {
        let chunks = splitter(1_000, 200).split("  A short clause.\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "A short clause.");
        assert_eq!(chunks[0].position, 0);
    }

    #[test]
    fn blank_text_has_no_chunks() {
        assert!(splitter(100, 10).split("").is_empty());
        assert!(splitter(100, 10).split(" \n\n \n").is_empty());
    }

    #[test]
    fn chunks_respect_size_and_cover_text_in_order() {
        let text = numbered_text(12, 40);
        let chunk_size = 120;
        let chunk_overlap = 30;
        let chunks = splitter(chunk_size, chunk_overlap).split(&text);
        assert!(chunks.len() > 10);

        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= chunk_size);
        }

        let spans = locate(&text, &chunks);
        assert_eq!(spans[0].0, 0);
        assert_eq!(spans[spans.len() - 1].1, text.len());

        for pair in spans.windows(2) {
            let (previous, next) = (pair[0], pair[1]);
            assert!(next.0 > previous.0, "chunks must move forward");
            if next.0 > previous.1 {
                assert!(
                    text[previous.1..next.0].trim().is_empty(),
                    "only whitespace may fall between chunks"
                );
            } else {
                assert!(previous.1 - next.0 <= chunk_overlap);
            }
        }
    }

    #[test]
    fn consecutive_chunks_share_context() {
        let text = numbered_text(1, 60);
        let chunks = splitter(100, 30).split(&text);
        let spans = locate(&text, &chunks);

        let overlapping = spans.windows(2).filter(|pair| pair[1].0 < pair[0].1).count();
        assert_eq!(overlapping, spans.len() - 1);
    }

    #[test]
    fn paragraph_breaks_are_preferred() {
        let text = format!("{}\n\n{}", "a".repeat(40), "b".repeat(40));
        let chunks = splitter(60, 0).split(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "a".repeat(40));
        assert_eq!(chunks[1].text, "b".repeat(40));
    }

    #[test]
    fn unbroken_text_falls_back_to_hard_cuts() {
        let text = "x".repeat(250);
        let chunks = splitter(100, 20).split(&text);
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|chunk| chunk.text.chars().count() <= 100));
        assert!(chunks.iter().all(|chunk| chunk.text.chars().all(|c| c == 'x')));
    }

    #[test]
    fn lengths_are_counted_in_characters() {
        let text = "é".repeat(150);
        let chunks = splitter(100, 10).split(&text);
        assert!(chunks.iter().all(|chunk| chunk.text.chars().count() <= 100));
        assert_eq!(chunks[0].text.chars().count(), 100);
    }

    #[test]
    fn separator_stays_with_following_piece() {
        assert_eq!(
            split_keeping_separator("one. two. three", ". "),
            vec!["one", ". two", ". three"]
        );
        assert_eq!(split_keeping_separator("\n\nlead", "\n\n"), vec!["\n\nlead"]);
        assert_eq!(split_keeping_separator("ab", ""), vec!["a", "b"]);
    }
}
