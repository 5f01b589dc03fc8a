//! Retriever — embeds a query and asks the vector store for its nearest chunks.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::embedding::Embedder;
use crate::errors::AppError;
use crate::resume::vector_store::{ScoredChunk, VectorStore};

pub const MAX_RESULTS: usize = 20;

/// A retrieved chunk with its distance and the derived relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub document_id: Uuid,
    pub chunk_index: usize,
    pub text: String,
    /// Lower is closer.
    pub distance: f64,
    /// `max(0, 1 - distance)`.
    pub relevance: f64,
    pub metadata: Value,
}

impl From<ScoredChunk> for RetrievedChunk {
    fn from(chunk: ScoredChunk) -> Self {
        Self {
            relevance: relevance_from_distance(chunk.distance),
            document_id: chunk.document_id,
            chunk_index: chunk.chunk_index,
            text: chunk.text,
            distance: chunk.distance,
            metadata: chunk.metadata,
        }
    }
}

pub fn relevance_from_distance(distance: f64) -> f64 {
    (1.0 - distance).max(0.0)
}

#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Returns up to `n_results` chunks sorted by ascending distance.
    /// The query goes through the same embedder used on the write path.
    pub async fn retrieve(
        &self,
        user_id: Uuid,
        query: &str,
        n_results: usize,
    ) -> Result<Vec<RetrievedChunk>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation("query cannot be empty".to_string()));
        }
        let n_results = n_results.clamp(1, MAX_RESULTS);

        let embedding = self.embedder.embed(query).await?;
        let mut chunks: Vec<RetrievedChunk> = self
            .store
            .query(user_id, &embedding, n_results)
            .await?
            .into_iter()
            .map(RetrievedChunk::from)
            .collect();

        // The store already orders by distance; re-sort so callers never depend on that.
        chunks.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        info!(
            "Retrieved {} chunks for user {user_id} (distances: {:?})",
            chunks.len(),
            chunks.iter().map(|c| c.distance).collect::<Vec<_>>()
        );
        Ok(chunks)
    }
}
