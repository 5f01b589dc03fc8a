//! Vector store adapter — persists embedded chunks and answers nearest-neighbor queries.
//!
//! Default: `PgVectorStore`, PostgreSQL with the `pgvector` extension doing the
//! similarity search (`<=>`, cosine distance in `[0, 2]`). The search itself is
//! never reimplemented here.
//!
//! `AppState` holds an `Arc<dyn VectorStore>`, swapped in tests for an in-memory double.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{ResumeDocumentRow, ScoredChunkRow};
use crate::resume::chunker::TextChunk;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Document metadata written alongside its chunks.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: Uuid,
    pub user_id: Uuid,
    pub source_file: String,
    pub s3_key: String,
    pub total_characters: usize,
    pub chunk_size: usize,
    pub overlap: usize,
    pub embedding_model: String,
}

#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: TextChunk,
    pub embedding: Vec<f32>,
    pub metadata: Value,
}

/// A stored chunk returned by a nearest-neighbor query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub document_id: Uuid,
    pub chunk_index: usize,
    pub start_pos: usize,
    pub end_pos: usize,
    pub text: String,
    /// Cosine distance to the query. Lower is closer.
    pub distance: f64,
    pub metadata: Value,
}

impl From<ScoredChunkRow> for ScoredChunk {
    fn from(row: ScoredChunkRow) -> Self {
        Self {
            document_id: row.document_id,
            chunk_index: row.chunk_index.max(0) as usize,
            start_pos: row.start_pos.max(0) as usize,
            end_pos: row.end_pos.max(0) as usize,
            text: row.content,
            distance: row.distance,
            metadata: row.metadata,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_documents: i64,
    pub total_chunks: i64,
    pub embedding_model: Option<String>,
    pub latest_document: Option<ResumeDocumentRow>,
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Writes the document row and all of its chunks atomically.
    async fn add_document(
        &self,
        document: &NewDocument,
        chunks: &[EmbeddedChunk],
    ) -> Result<(), AppError>;

    /// Swaps every document and chunk of `document.user_id` for the given ones in
    /// one transaction. Returns chunks removed. On error the old data is untouched.
    async fn replace_documents(
        &self,
        document: &NewDocument,
        chunks: &[EmbeddedChunk],
    ) -> Result<u64, AppError>;

    /// Returns up to `n_results` chunks ordered by ascending distance.
    async fn query(
        &self,
        user_id: Uuid,
        embedding: &[f32],
        n_results: usize,
    ) -> Result<Vec<ScoredChunk>, AppError>;

    async fn stats(&self, user_id: Uuid) -> Result<StoreStats, AppError>;

    /// Deletes every document and chunk of the user. Returns chunks removed.
    async fn clear(&self, user_id: Uuid) -> Result<u64, AppError>;

    async fn latest_document(&self, user_id: Uuid) -> Result<Option<ResumeDocumentRow>, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// PgVectorStore
// ────────────────────────────────────────────────────────────────────────────

pub struct PgVectorStore {
    pool: PgPool,
}

impl PgVectorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// pgvector's text input format: `[0.1,0.2,0.3]`.
pub fn vector_literal(embedding: &[f32]) -> String {
    let parts: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

async fn insert_document(
    conn: &mut PgConnection,
    document: &NewDocument,
    chunks: &[EmbeddedChunk],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO resume_documents
            (id, user_id, source_file, s3_key, total_characters, total_chunks,
             chunk_size, overlap, embedding_model)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(document.id)
    .bind(document.user_id)
    .bind(&document.source_file)
    .bind(&document.s3_key)
    .bind(document.total_characters as i32)
    .bind(chunks.len() as i32)
    .bind(document.chunk_size as i32)
    .bind(document.overlap as i32)
    .bind(&document.embedding_model)
    .execute(&mut *conn)
    .await?;

    for embedded in chunks {
        sqlx::query(
            r#"
            INSERT INTO resume_chunks
                (id, document_id, user_id, chunk_index, start_pos, end_pos,
                 overlap_chars, content, metadata, embedding)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10::text::vector)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(document.id)
        .bind(document.user_id)
        .bind(embedded.chunk.chunk_index as i32)
        .bind(embedded.chunk.start_pos as i32)
        .bind(embedded.chunk.end_pos as i32)
        .bind(embedded.chunk.overlap_chars as i32)
        .bind(&embedded.chunk.text)
        .bind(&embedded.metadata)
        .bind(vector_literal(&embedded.embedding))
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn delete_user_rows(conn: &mut PgConnection, user_id: Uuid) -> Result<u64, sqlx::Error> {
    // Chunks cascade from documents; delete them first to count them for the response.
    let removed = sqlx::query("DELETE FROM resume_chunks WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    sqlx::query("DELETE FROM resume_documents WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(removed)
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn add_document(
        &self,
        document: &NewDocument,
        chunks: &[EmbeddedChunk],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        insert_document(&mut tx, document, chunks).await?;
        tx.commit().await?;

        info!(
            "Stored document {} with {} chunks for user {}",
            document.id,
            chunks.len(),
            document.user_id
        );
        Ok(())
    }

    async fn replace_documents(
        &self,
        document: &NewDocument,
        chunks: &[EmbeddedChunk],
    ) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;
        let removed = delete_user_rows(&mut tx, document.user_id).await?;
        insert_document(&mut tx, document, chunks).await?;
        tx.commit().await?;

        info!(
            "Replaced {removed} chunks with document {} ({} chunks) for user {}",
            document.id,
            chunks.len(),
            document.user_id
        );
        Ok(removed)
    }

    async fn query(
        &self,
        user_id: Uuid,
        embedding: &[f32],
        n_results: usize,
    ) -> Result<Vec<ScoredChunk>, AppError> {
        let rows = sqlx::query_as::<_, ScoredChunkRow>(
            r#"
            SELECT document_id, chunk_index, start_pos, end_pos, content, metadata,
                   (embedding <=> $2::text::vector)::float8 AS distance
            FROM resume_chunks
            WHERE user_id = $1
            ORDER BY embedding <=> $2::text::vector
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(vector_literal(embedding))
        .bind(n_results as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ScoredChunk::from).collect())
    }

    async fn stats(&self, user_id: Uuid) -> Result<StoreStats, AppError> {
        let total_documents: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM resume_documents WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        let total_chunks: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM resume_chunks WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        let latest_document = self.latest_document(user_id).await?;

        Ok(StoreStats {
            total_documents,
            total_chunks,
            embedding_model: latest_document.as_ref().map(|d| d.embedding_model.clone()),
            latest_document,
        })
    }

    async fn clear(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;
        let removed = delete_user_rows(&mut tx, user_id).await?;
        tx.commit().await?;

        info!("Cleared {removed} resume chunks for user {user_id}");
        Ok(removed)
    }

    async fn latest_document(&self, user_id: Uuid) -> Result<Option<ResumeDocumentRow>, AppError> {
        Ok(sqlx::query_as::<_, ResumeDocumentRow>(
            "SELECT * FROM resume_documents WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory double for tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;

    struct StoredChunk {
        user_id: Uuid,
        document_id: Uuid,
        embedded: EmbeddedChunk,
    }

    /// Brute-force cosine distance over a `Vec`. Test-only.
    #[derive(Default)]
    pub struct MemoryVectorStore {
        documents: Mutex<Vec<ResumeDocumentRow>>,
        chunks: Mutex<Vec<StoredChunk>>,
    }

    fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if na == 0.0 || nb == 0.0 {
            return 1.0;
        }
        1.0 - (dot / (na * nb)) as f64
    }

    #[async_trait]
    impl VectorStore for MemoryVectorStore {
        async fn add_document(
            &self,
            document: &NewDocument,
            chunks: &[EmbeddedChunk],
        ) -> Result<(), AppError> {
            self.documents.lock().unwrap().push(ResumeDocumentRow {
                id: document.id,
                user_id: document.user_id,
                source_file: document.source_file.clone(),
                s3_key: document.s3_key.clone(),
                total_characters: document.total_characters as i32,
                total_chunks: chunks.len() as i32,
                chunk_size: document.chunk_size as i32,
                overlap: document.overlap as i32,
                embedding_model: document.embedding_model.clone(),
                created_at: Utc::now(),
            });
            self.chunks
                .lock()
                .unwrap()
                .extend(chunks.iter().cloned().map(|embedded| StoredChunk {
                    user_id: document.user_id,
                    document_id: document.id,
                    embedded,
                }));
            Ok(())
        }

        async fn replace_documents(
            &self,
            document: &NewDocument,
            chunks: &[EmbeddedChunk],
        ) -> Result<u64, AppError> {
            let removed = self.clear(document.user_id).await?;
            self.add_document(document, chunks).await?;
            Ok(removed)
        }

        async fn query(
            &self,
            user_id: Uuid,
            embedding: &[f32],
            n_results: usize,
        ) -> Result<Vec<ScoredChunk>, AppError> {
            let chunks = self.chunks.lock().unwrap();
            let mut scored: Vec<ScoredChunk> = chunks
                .iter()
                .filter(|c| c.user_id == user_id)
                .map(|c| ScoredChunk {
                    document_id: c.document_id,
                    chunk_index: c.embedded.chunk.chunk_index,
                    start_pos: c.embedded.chunk.start_pos,
                    end_pos: c.embedded.chunk.end_pos,
                    text: c.embedded.chunk.text.clone(),
                    distance: cosine_distance(&c.embedded.embedding, embedding),
                    metadata: c.embedded.metadata.clone(),
                })
                .collect();
            scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
            scored.truncate(n_results);
            Ok(scored)
        }

        async fn stats(&self, user_id: Uuid) -> Result<StoreStats, AppError> {
            let total_documents = self
                .documents
                .lock()
                .unwrap()
                .iter()
                .filter(|d| d.user_id == user_id)
                .count() as i64;
            let total_chunks = self
                .chunks
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.user_id == user_id)
                .count() as i64;
            let latest_document = self.latest_document(user_id).await?;
            Ok(StoreStats {
                total_documents,
                total_chunks,
                embedding_model: latest_document.as_ref().map(|d| d.embedding_model.clone()),
                latest_document,
            })
        }

        async fn clear(&self, user_id: Uuid) -> Result<u64, AppError> {
            self.documents.lock().unwrap().retain(|d| d.user_id != user_id);
            let mut chunks = self.chunks.lock().unwrap();
            let before = chunks.len();
            chunks.retain(|c| c.user_id != user_id);
            Ok((before - chunks.len()) as u64)
        }

        async fn latest_document(
            &self,
            user_id: Uuid,
        ) -> Result<Option<ResumeDocumentRow>, AppError> {
            Ok(self
                .documents
                .lock()
                .unwrap()
                .iter()
                .filter(|d| d.user_id == user_id)
                .last()
                .cloned())
        }
    }
}
