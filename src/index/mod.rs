//! Exact-scan vector index over embedded chunks
//!
//! An index is built once per corpus update and persisted as a directory with
//! two files: `manifest.json` (model, dimension, build time and chunk records)
//! and `vectors.bin` (little-endian `f32`, row-major, one row per chunk).
//! Rebuilding replaces the directory wholesale.


use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::embeddings::{Chunk, Embedder, bytes_to_vec, cosine_distance, vec_to_bytes};
use crate::{Result, SupportError};

const MANIFEST_FILE: &str = "manifest.json";
const VECTORS_FILE: &str = "vectors.bin";
const FORMAT_VERSION: u32 = 1;
const EMBED_BATCH_SIZE: usize = 32;

/// A chunk and its embedding
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A search hit with its cosine distance to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<'a> {
    pub entry: &'a IndexEntry,
    pub distance: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    model: String,
    dimension: usize,
    created_at: DateTime<Utc>,
    chunks: Vec<Chunk>,
}

/// Immutable nearest-neighbour index; all vectors share one dimensionality
#[derive(Debug, Clone)]
pub struct VectorIndex {
    model: String,
    dimension: usize,
    created_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Embed every chunk and build the index
    #[inline]
    pub fn build(chunks: Vec<Chunk>, embedder: &dyn Embedder) -> Result<Self> {
        Self::build_with_progress(chunks, embedder, &ProgressBar::hidden())
    }

    /// Build the index, advancing `bar` by one per embedded chunk
    #[inline]
    pub fn build_with_progress(
        chunks: Vec<Chunk>,
        embedder: &dyn Embedder,
        bar: &ProgressBar,
    ) -> Result<Self> {
        info!(
            "Building index of {} chunks with model {}",
            chunks.len(),
            embedder.model_name()
        );
        bar.set_length(chunks.len() as u64);

        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = embedder.embed_batch(&texts)?;
            if embedded.len() != texts.len() {
                return Err(SupportError::Embedding(format!(
                    "Expected {} embeddings, received {}",
                    texts.len(),
                    embedded.len()
                )));
            }
            vectors.extend(embedded);
            bar.inc(batch.len() as u64);
        }

        let dimension = vectors.first().map_or(0, Vec::len);
        if let Some(position) = vectors
            .iter()
            .position(|v| v.len() != dimension || v.is_empty())
        {
            return Err(SupportError::Embedding(format!(
                "Embedding for chunk {} has dimension {}, expected {}",
                chunks[position].id,
                vectors[position].len(),
                dimension
            )));
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect::<Vec<_>>();

        debug!("Built index with {} entries of dimension {}", entries.len(), dimension);
        Ok(Self {
            model: embedder.model_name().to_string(),
            dimension,
            created_at: Utc::now(),
            entries,
        })
    }

    /// An index with no entries, for an empty corpus
    #[inline]
    pub fn empty(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            dimension: 0,
            created_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// The `k` entries closest to `query`, by ascending cosine distance
    ///
    /// Ties keep insertion order.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor<'_>>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(SupportError::Embedding(format!(
                "Query embedding has dimension {}, index expects {}",
                query.len(),
                self.dimension
            )));
        }

        let mut neighbors: Vec<Neighbor<'_>> = self
            .entries
            .iter()
            .map(|entry| Neighbor {
                entry,
                distance: cosine_distance(query, &entry.vector),
            })
            .collect();
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors.truncate(k);
        Ok(neighbors)
    }

    /// Write the index to `location`, replacing any index already there
    ///
    /// Files are written to a sibling staging directory first and renamed into
    /// place, so a reader never observes a partially written index.
    #[inline]
    pub fn persist(&self, location: &Path) -> Result<()> {
        let staging = sibling_path(location, "staging");
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            model: self.model.clone(),
            dimension: self.dimension,
            created_at: self.created_at,
            chunks: self.entries.iter().map(|e| e.chunk.clone()).collect(),
        };
        let manifest_json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| SupportError::Other(anyhow::Error::new(e)))?;
        fs::write(staging.join(MANIFEST_FILE), manifest_json)?;

        let mut vector_bytes = Vec::with_capacity(self.entries.len() * self.dimension * 4);
        for entry in &self.entries {
            vector_bytes.extend(vec_to_bytes(&entry.vector));
        }
        fs::write(staging.join(VECTORS_FILE), vector_bytes)?;

        replace_dir(&staging, location)?;

        info!(
            "Persisted index of {} entries to {}",
            self.entries.len(),
            location.display()
        );
        Ok(())
    }

    /// Reload a persisted index without re-embedding
    ///
    /// Rejects indexes built with a different embedding model than `embedder`.
    #[inline]
    pub fn load(location: &Path, embedder: &dyn Embedder) -> Result<Self> {
        let manifest_path = location.join(MANIFEST_FILE);
        let manifest_json = fs::read_to_string(&manifest_path).map_err(|e| {
            SupportError::IndexUnavailable(format!(
                "No index at {}: {}",
                location.display(),
                e
            ))
        })?;
        let manifest: Manifest = serde_json::from_str(&manifest_json).map_err(|e| {
            SupportError::IndexUnavailable(format!(
                "Malformed manifest {}: {}",
                manifest_path.display(),
                e
            ))
        })?;

        if manifest.format_version != FORMAT_VERSION {
            return Err(SupportError::IndexUnavailable(format!(
                "Unsupported index format version {}",
                manifest.format_version
            )));
        }
        if manifest.model != embedder.model_name() {
            return Err(SupportError::IndexUnavailable(format!(
                "Index was built with embedding model '{}' but '{}' is configured; re-run ingest",
                manifest.model,
                embedder.model_name()
            )));
        }

        let vector_bytes = fs::read(location.join(VECTORS_FILE)).map_err(|e| {
            SupportError::IndexUnavailable(format!(
                "Missing vectors in {}: {}",
                location.display(),
                e
            ))
        })?;
        if manifest.dimension == 0 && !manifest.chunks.is_empty() {
            return Err(SupportError::IndexUnavailable(
                "Manifest lists chunks but records no vector dimension".to_string(),
            ));
        }
        let expected_len = manifest.chunks.len() * manifest.dimension * 4;
        if vector_bytes.len() != expected_len {
            return Err(SupportError::IndexUnavailable(format!(
                "Vector data is {} bytes, expected {} for {} chunks of dimension {}",
                vector_bytes.len(),
                expected_len,
                manifest.chunks.len(),
                manifest.dimension
            )));
        }

        let values = bytes_to_vec(&vector_bytes);
        let entries: Vec<IndexEntry> = if manifest.dimension == 0 {
            Vec::new()
        } else {
            manifest
                .chunks
                .into_iter()
                .zip(values.chunks_exact(manifest.dimension))
                .map(|(chunk, vector)| IndexEntry {
                    chunk,
                    vector: vector.to_vec(),
                })
                .collect()
        };

        info!(
            "Loaded index of {} entries from {} (model {}, built {})",
            entries.len(),
            location.display(),
            manifest.model,
            manifest.created_at
        );
        Ok(Self {
            model: manifest.model,
            dimension: manifest.dimension,
            created_at: manifest.created_at,
            entries,
        })
    }

    /// Whether `location` looks like a persisted index
    #[inline]
    pub fn exists(location: &Path) -> bool {
        location.join(MANIFEST_FILE).is_file() && location.join(VECTORS_FILE).is_file()
    }
}

/// Move `staging` to `location`, keeping the old directory until the move succeeds
fn replace_dir(staging: &Path, location: &Path) -> Result<()> {
    let previous = sibling_path(location, "previous");
    if location.exists() {
        if previous.exists() {
            fs::remove_dir_all(&previous)?;
        }
        fs::rename(location, &previous)?;
    }

    if let Err(e) = fs::rename(staging, location) {
        if previous.exists() && !location.exists() {
            if let Err(restore) = fs::rename(&previous, location) {
                warn!(
                    "Failed to restore previous index to {}: {}",
                    location.display(),
                    restore
                );
            }
        }
        return Err(e.into());
    }

    if previous.exists() {
        if let Err(e) = fs::remove_dir_all(&previous) {
            warn!("Failed to remove previous index at {}: {}", previous.display(), e);
        }
    }
    Ok(())
}

fn sibling_path(location: &Path, suffix: &str) -> PathBuf {
    let name = location
        .file_name()
        .map_or_else(|| "index".to_string(), |n| n.to_string_lossy().into_owned());
    location.with_file_name(format!(".{}.{}", name, suffix))
}
