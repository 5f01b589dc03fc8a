use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// One uploaded resume PDF and the chunking parameters it was indexed with.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeDocumentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub source_file: String,
    pub s3_key: String,
    pub total_characters: i32,
    pub total_chunks: i32,
    pub chunk_size: i32,
    pub overlap: i32,
    pub embedding_model: String,
    pub created_at: DateTime<Utc>,
}

/// A stored chunk joined with its cosine distance to a query vector.
/// The embedding column itself is never read back.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScoredChunkRow {
    pub document_id: Uuid,
    pub chunk_index: i32,
    pub start_pos: i32,
    pub end_pos: i32,
    pub content: String,
    pub metadata: Value,
    pub distance: f64,
}
