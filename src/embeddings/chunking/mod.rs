#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::config::ConfigError;
use crate::corpus::Document;

/// A bounded, overlapping slice of a document ready for embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic identifier: `<source>#<chunk_index>`
    pub id: String,
    /// Source identifier of the parent document, if it had one
    pub source: Option<String>,
    /// Position of this chunk within its document
    pub chunk_index: usize,
    /// Character offset of the chunk start within the document
    pub start: usize,
    /// The chunk text
    pub text: String,
    /// Estimated token count
    pub token_count: usize,
}

/// Configuration for content chunking
///
/// Sizes are measured in characters (Unicode scalar values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length
    pub max_chunk_size: usize,
    /// Characters shared between adjacent chunks of the same document
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
            overlap: 100,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn new(max_chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self {
            max_chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    #[inline]
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(1..=100_000).contains(&self.max_chunk_size) {
            return Err(ConfigError::InvalidMaxChunkSize(self.max_chunk_size));
        }
        if self.overlap >= self.max_chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.overlap,
                self.max_chunk_size,
            ));
        }
        Ok(())
    }
}

/// Split boundaries, strongest first. A cut is placed just after the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Sentence,
    Word,
}

const BOUNDARIES: [Boundary; 3] = [Boundary::Paragraph, Boundary::Sentence, Boundary::Word];

/// Chunk every document with the given configuration
///
/// Fails with a configuration error if `overlap >= max_chunk_size`.
#[inline]
pub fn chunk_documents(documents: &[Document], config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    config.validate()?;

    let mut chunks = Vec::new();
    for document in documents {
        chunks.extend(chunk_document(document, config));
    }

    debug!(
        "Chunked {} documents into {} chunks (avg {} tokens)",
        documents.len(),
        chunks.len(),
        chunks.iter().map(|c| c.token_count).sum::<usize>() / chunks.len().max(1)
    );

    Ok(chunks)
}

/// Split a single document. The configuration must already be validated.
fn chunk_document(document: &Document, config: &ChunkingConfig) -> Vec<Chunk> {
    if document.text.trim().is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = document.text.chars().collect();
    let source_label = document.source.as_deref().unwrap_or("document");
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = if chars.len() - start <= config.max_chunk_size {
            chars.len()
        } else {
            find_cut(&chars, start, config)
        };

        let text: String = chars[start..end].iter().collect();
        let chunk_index = chunks.len();
        chunks.push(Chunk {
            id: format!("{}#{}", source_label, chunk_index),
            source: document.source.clone(),
            chunk_index,
            start,
            token_count: estimate_token_count(&text),
            text,
        });

        if end == chars.len() {
            break;
        }
        start = end - config.overlap;
    }

    chunks
}

/// Find where to end the chunk that starts at `start`.
///
/// The cut lies in `(start + overlap, start + max_chunk_size]` so the next chunk
/// (starting `overlap` characters before the cut) always makes progress. The
/// strongest boundary kind found in that window wins; within a kind, the latest
/// position wins so chunks stay as large as possible. With no boundary at all,
/// the chunk is cut at the size limit.
fn find_cut(chars: &[char], start: usize, config: &ChunkingConfig) -> usize {
    let limit = start + config.max_chunk_size;
    let earliest = start + config.overlap + 1;

    for boundary in BOUNDARIES {
        if let Some(cut) = (earliest..=limit)
            .rev()
            .find(|&cut| is_boundary(chars, cut, boundary))
        {
            return cut;
        }
    }

    limit
}

/// Whether a cut at `cut` (exclusive end) falls just after a boundary of the given kind
fn is_boundary(chars: &[char], cut: usize, boundary: Boundary) -> bool {
    if cut == 0 || cut >= chars.len() {
        return false;
    }
    let prev = chars[cut - 1];
    match boundary {
        Boundary::Paragraph => cut >= 2 && prev == '\n' && chars[cut - 2] == '\n',
        Boundary::Sentence => {
            prev == '\n' || (prev.is_whitespace() && cut >= 2 && is_terminal(chars[cut - 2]))
        }
        Boundary::Word => prev.is_whitespace(),
    }
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Estimate token count using a simple heuristic
/// This is a rough approximation - actual tokenization would be more accurate
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    // Rough heuristic: 1 token ≈ 0.75 words for English text
    // Add extra tokens for punctuation and special characters
    let word_count = text.split_whitespace().count();
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count();

    (punct_count as f64).mul_add(0.1, word_count as f64 / 0.75) as usize
}
