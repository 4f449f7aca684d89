// Retrieval module
// Embeds a query and returns the closest chunks from the index


use std::sync::Arc;

use tracing::debug;

use crate::Result;
use crate::config::RetrievalConfig;
use crate::embeddings::{Chunk, Embedder};
use crate::index::VectorIndex;

/// A retrieved chunk and its cosine distance to the query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub distance: f32,
}

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl std::fmt::Debug for Retriever {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder.model_name())
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl Retriever {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self { embedder, top_k }
    }

    #[inline]
    pub fn from_config(embedder: Arc<dyn Embedder>, config: &RetrievalConfig) -> Self {
        Self::new(embedder, config.top_k)
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    #[inline]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Retrieve the configured number of chunks for `query`
    #[inline]
    pub fn retrieve_top(&self, index: &VectorIndex, query: &str) -> Result<Vec<ScoredChunk>> {
        self.retrieve(index, query, self.top_k)
    }

    /// Up to `k` chunks ranked by ascending distance; ties keep index order
    ///
    /// An empty index yields no chunks without embedding the query.
    #[inline]
    pub fn retrieve(&self, index: &VectorIndex, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if index.is_empty() || k == 0 {
            debug!("Skipping retrieval: index has {} entries, k={}", index.len(), k);
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query)?;
        let results: Vec<ScoredChunk> = index
            .search(&query_vector, k)?
            .into_iter()
            .map(|neighbor| ScoredChunk {
                chunk: neighbor.entry.chunk.clone(),
                distance: neighbor.distance,
            })
            .collect();

        debug!("Retrieved {} chunks for query", results.len());
        Ok(results)
    }
}
