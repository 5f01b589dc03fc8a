//! Resume Q&A orchestration.
//!
//! Write path: PDF → extract → chunk → embed → archive to S3 → vector store.
//! Read path: question → retriever → synthesizer → answer.

use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::embedding::Embedder;
use crate::errors::AppError;
use crate::resume::chunker::{chunk_statistics, chunk_text, ChunkParams, ChunkStatistics};
use crate::resume::pdf::extract_text;
use crate::resume::retriever::{RetrievedChunk, Retriever};
use crate::resume::synthesizer::AnswerSynthesizer;
use crate::resume::vector_store::{EmbeddedChunk, NewDocument, StoreStats, VectorStore};
use crate::state::AppState;

pub const DEFAULT_SEARCH_RESULTS: usize = 5;
pub const DEFAULT_ANSWER_CHUNKS: usize = 3;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResponse {
    pub document_id: Uuid,
    pub source_file: String,
    pub total_chunks: usize,
    pub total_characters: usize,
    pub chunk_size: usize,
    pub overlap: usize,
    pub chunk_statistics: ChunkStatistics,
    pub collection_stats: StoreStats,
    pub sample_chunk: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub user_id: Uuid,
    pub query: String,
    pub n_results: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub count: usize,
    pub results: Vec<RetrievedChunk>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub user_id: Uuid,
    pub question: String,
    pub n_results: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub question: String,
    pub answer: String,
    pub context_chunks: Vec<RetrievedChunk>,
    pub chunk_scores: Vec<f64>,
    pub num_chunks_used: usize,
    pub llm_backend: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub chunks_removed: u64,
    pub archives_removed: usize,
    pub message: String,
}

/// Where an indexed document came from.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    pub document_id: Uuid,
    pub user_id: Uuid,
    pub source_file: String,
    pub s3_key: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Write path
// ────────────────────────────────────────────────────────────────────────────

/// A document with every chunk embedded, ready to be written.
struct PreparedDocument {
    document: NewDocument,
    chunks: Vec<EmbeddedChunk>,
    statistics: ChunkStatistics,
}

/// Chunks and embeds text. Touches nothing in the store.
async fn prepare_document(
    embedder: &dyn Embedder,
    source: &DocumentSource,
    text: &str,
    params: ChunkParams,
) -> Result<PreparedDocument, AppError> {
    let chunks = chunk_text(text, params)?;
    if chunks.is_empty() {
        return Err(AppError::Validation(
            "Resume contains no text to index".to_string(),
        ));
    }
    let statistics = chunk_statistics(&chunks);
    let total_characters = text.chars().count();

    info!(
        "Chunked {} characters into {} chunks (size {}, overlap {})",
        total_characters,
        chunks.len(),
        params.chunk_size,
        params.overlap
    );

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).await?;
    if embeddings.len() != chunks.len() {
        return Err(AppError::Internal(anyhow::anyhow!(
            "embedder returned {} vectors for {} chunks",
            embeddings.len(),
            chunks.len()
        )));
    }

    let model = embedder.model_name().to_string();
    let processed_at = Utc::now().to_rfc3339();
    let total_chunks = chunks.len();

    let embedded: Vec<EmbeddedChunk> = chunks
        .into_iter()
        .zip(embeddings)
        .map(|(chunk, embedding)| EmbeddedChunk {
            metadata: json!({
                "chunk_index": chunk.chunk_index,
                "start_pos": chunk.start_pos,
                "end_pos": chunk.end_pos,
                "chunk_size": chunk.char_len(),
                "overlap_chars": chunk.overlap_chars,
                "source_file": source.source_file,
                "total_chunks": total_chunks,
                "document_type": "resume",
                "embedding_model": model,
                "processing_timestamp": processed_at,
            }),
            chunk,
            embedding,
        })
        .collect();

    Ok(PreparedDocument {
        document: NewDocument {
            id: source.document_id,
            user_id: source.user_id,
            source_file: source.source_file.clone(),
            s3_key: source.s3_key.clone(),
            total_characters,
            chunk_size: params.chunk_size,
            overlap: params.overlap,
            embedding_model: model,
        },
        chunks: embedded,
        statistics,
    })
}

async fn processed(
    store: &dyn VectorStore,
    prepared: PreparedDocument,
) -> Result<ProcessResponse, AppError> {
    let PreparedDocument {
        document,
        chunks,
        statistics,
    } = prepared;
    let collection_stats = store.stats(document.user_id).await?;

    Ok(ProcessResponse {
        document_id: document.id,
        source_file: document.source_file,
        total_chunks: chunks.len(),
        total_characters: document.total_characters,
        chunk_size: document.chunk_size,
        overlap: document.overlap,
        chunk_statistics: statistics,
        collection_stats,
        sample_chunk: chunks.first().map(|e| e.chunk.text.clone()),
        message: "Resume processed and vectors created successfully".to_string(),
    })
}

/// Chunks, embeds, and stores already-extracted resume text as a new document.
pub async fn index_text(
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    source: &DocumentSource,
    text: &str,
    params: ChunkParams,
) -> Result<ProcessResponse, AppError> {
    let prepared = prepare_document(embedder, source, text, params).await?;
    store
        .add_document(&prepared.document, &prepared.chunks)
        .await?;
    processed(store, prepared).await
}

/// Like `index_text`, but the new document replaces everything the user has
/// indexed. Nothing is removed unless the new chunks were embedded and written.
pub async fn reindex_text(
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    source: &DocumentSource,
    text: &str,
    params: ChunkParams,
) -> Result<ProcessResponse, AppError> {
    let prepared = prepare_document(embedder, source, text, params).await?;
    let removed = store
        .replace_documents(&prepared.document, &prepared.chunks)
        .await?;
    info!(
        "Reindexed {}: replaced {removed} old chunks",
        source.source_file
    );
    processed(store, prepared).await
}

/// Full upload pipeline: extract, archive the uploaded PDF, then index.
pub async fn process_resume(
    state: &AppState,
    user_id: Uuid,
    source_file: String,
    pdf: Bytes,
    params: ChunkParams,
) -> Result<ProcessResponse, AppError> {
    params.validate()?;

    let text = extract_text(pdf.clone()).await?;

    let document_id = Uuid::new_v4();
    let source = DocumentSource {
        document_id,
        user_id,
        s3_key: archive_key(user_id, document_id, &source_file),
        source_file,
    };
    archive_and_index(state, &source, pdf, &text, params).await
}

/// The archive is removed again when indexing fails, so no object is left
/// without a document row pointing at it.
async fn archive_and_index(
    state: &AppState,
    source: &DocumentSource,
    pdf: Bytes,
    text: &str,
    params: ChunkParams,
) -> Result<ProcessResponse, AppError> {
    upload_pdf(state, &source.s3_key, pdf).await?;

    let indexed = index_text(
        state.embedder.as_ref(),
        state.vector_store.as_ref(),
        source,
        text,
        params,
    )
    .await;

    if indexed.is_err() {
        if let Err(e) = delete_pdf(state, &source.s3_key).await {
            warn!("Could not remove archive {} after failed indexing: {e}", source.s3_key);
        }
    }
    indexed
}

/// Re-indexes the user's latest archived PDF with new params. The previous
/// vectors stay in place until the new ones are stored.
pub async fn reprocess_resume(
    state: &AppState,
    user_id: Uuid,
    params: ChunkParams,
) -> Result<ProcessResponse, AppError> {
    params.validate()?;

    let latest = state
        .vector_store
        .latest_document(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No resume uploaded for user {user_id}")))?;

    let pdf = download_pdf(state, &latest.s3_key).await?;
    let text = extract_text(pdf).await?;

    let source = DocumentSource {
        document_id: Uuid::new_v4(),
        user_id,
        source_file: latest.source_file,
        s3_key: latest.s3_key,
    };
    reindex_text(
        state.embedder.as_ref(),
        state.vector_store.as_ref(),
        &source,
        &text,
        params,
    )
    .await
}

pub fn archive_key(user_id: Uuid, document_id: Uuid, source_file: &str) -> String {
    format!("resumes/{user_id}/{document_id}/{}", sanitize_filename(source_file))
}

/// Keeps the file name usable as an S3 key segment.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches(|c| c == '.' || c == '_').is_empty() {
        "resume.pdf".to_string()
    } else {
        cleaned
    }
}

async fn upload_pdf(state: &AppState, key: &str, pdf: Bytes) -> Result<(), AppError> {
    state
        .s3
        .put_object()
        .bucket(&state.config.s3_bucket)
        .key(key)
        .body(ByteStream::from(pdf))
        .content_type("application/pdf")
        .send()
        .await
        .map_err(|e| AppError::S3(format!("upload of {key} failed: {e}")))?;

    info!("Archived resume PDF to s3://{}/{}", state.config.s3_bucket, key);
    Ok(())
}

async fn download_pdf(state: &AppState, key: &str) -> Result<Bytes, AppError> {
    let object = state
        .s3
        .get_object()
        .bucket(&state.config.s3_bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("download of {key} failed: {e}")))?;

    let data = object
        .body
        .collect()
        .await
        .map_err(|e| AppError::S3(format!("reading {key} failed: {e}")))?;
    Ok(data.into_bytes())
}

async fn delete_pdf(state: &AppState, key: &str) -> Result<(), AppError> {
    state
        .s3
        .delete_object()
        .bucket(&state.config.s3_bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("delete of {key} failed: {e}")))?;
    Ok(())
}

/// Removes every archived PDF under `resumes/{user_id}/`. Returns objects deleted.
async fn delete_archives(state: &AppState, user_id: Uuid) -> Result<usize, AppError> {
    let prefix = format!("resumes/{user_id}/");
    let mut deleted = 0;
    let mut continuation: Option<String> = None;

    loop {
        let page = state
            .s3
            .list_objects_v2()
            .bucket(&state.config.s3_bucket)
            .prefix(&prefix)
            .set_continuation_token(continuation.take())
            .send()
            .await
            .map_err(|e| AppError::S3(format!("listing {prefix} failed: {e}")))?;

        for key in page.contents().iter().filter_map(|o| o.key()) {
            delete_pdf(state, key).await?;
            deleted += 1;
        }

        match page.next_continuation_token() {
            Some(token) if page.is_truncated().unwrap_or(false) => {
                continuation = Some(token.to_string())
            }
            _ => break,
        }
    }
    Ok(deleted)
}

// ────────────────────────────────────────────────────────────────────────────
// Read path
// ────────────────────────────────────────────────────────────────────────────

pub async fn search_resume(
    retriever: &Retriever,
    request: SearchRequest,
) -> Result<SearchResponse, AppError> {
    let results = retriever
        .retrieve(
            request.user_id,
            &request.query,
            request.n_results.unwrap_or(DEFAULT_SEARCH_RESULTS),
        )
        .await?;

    Ok(SearchResponse {
        query: request.query,
        count: results.len(),
        results,
    })
}

/// Retrieve → synthesize. Fails with NotFound when nothing is indexed for the user.
pub async fn answer_question(
    retriever: &Retriever,
    synthesizer: &dyn AnswerSynthesizer,
    request: AskRequest,
) -> Result<AskResponse, AppError> {
    let chunks = retriever
        .retrieve(
            request.user_id,
            &request.question,
            request.n_results.unwrap_or(DEFAULT_ANSWER_CHUNKS),
        )
        .await?;

    if chunks.is_empty() {
        return Err(AppError::NotFound(
            "Could not find relevant information in the resume".to_string(),
        ));
    }

    let answer = synthesizer.synthesize(&request.question, &chunks).await?;

    info!(
        "Answered question with {} chunks via {}",
        chunks.len(),
        answer.backend
    );

    Ok(AskResponse {
        question: request.question,
        answer: answer.text,
        chunk_scores: chunks.iter().map(|c| c.distance).collect(),
        num_chunks_used: chunks.len(),
        context_chunks: chunks,
        llm_backend: answer.backend,
    })
}

pub async fn resume_stats(store: &dyn VectorStore, user_id: Uuid) -> Result<StoreStats, AppError> {
    store.stats(user_id).await
}

/// Drops the user's vectors, then their archived PDFs. Archive cleanup is best effort.
pub async fn clear_resume(state: &AppState, user_id: Uuid) -> Result<ClearResponse, AppError> {
    let chunks_removed = state.vector_store.clear(user_id).await?;

    let archives_removed = match delete_archives(state, user_id).await {
        Ok(n) => n,
        Err(e) => {
            warn!("Archived resumes for user {user_id} were not removed: {e}");
            0
        }
    };

    Ok(ClearResponse {
        chunks_removed,
        archives_removed,
        message: "Resume vectors cleared successfully".to_string(),
    })
}
