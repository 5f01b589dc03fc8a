//! Axum route handlers for the Resume Q&A API.

use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::resume::chunker::ChunkParams;
use crate::resume::service::{
    answer_question, clear_resume, process_resume, reprocess_resume, resume_stats, search_resume,
    AskRequest, AskResponse, ClearResponse, ProcessResponse, SearchRequest, SearchResponse,
};
use crate::resume::vector_store::StoreStats;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ReprocessRequest {
    pub user_id: Uuid,
    pub chunk_size: Option<usize>,
    pub overlap: Option<usize>,
}

/// Missing values fall back to the configured defaults.
fn chunk_params(
    state: &AppState,
    chunk_size: Option<usize>,
    overlap: Option<usize>,
) -> Result<ChunkParams, AppError> {
    ChunkParams::new(
        chunk_size.unwrap_or(state.config.chunk_size),
        overlap.unwrap_or(state.config.chunk_overlap),
    )
}

fn parse_field<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, AppError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| AppError::Validation(format!("{name} has an invalid value: '{raw}'")))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/resume/process
///
/// Multipart fields: `user_id`, `file` (the PDF), optional `chunk_size` and `overlap`.
pub async fn handle_process(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, AppError> {
    let mut user_id: Option<Uuid> = None;
    let mut chunk_size: Option<usize> = None;
    let mut overlap: Option<usize> = None;
    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("resume.pdf").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read upload: {e}")))?;
                upload = Some((file_name, data));
            }
            "user_id" | "chunk_size" | "overlap" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read {name}: {e}")))?;
                match name.as_str() {
                    "user_id" => user_id = Some(parse_field("user_id", &value)?),
                    "chunk_size" => chunk_size = Some(parse_field("chunk_size", &value)?),
                    _ => overlap = Some(parse_field("overlap", &value)?),
                }
            }
            _ => {} // unknown fields are ignored
        }
    }

    let user_id = user_id.ok_or_else(|| AppError::Validation("user_id is required".to_string()))?;
    let (file_name, data) =
        upload.ok_or_else(|| AppError::Validation("file is required".to_string()))?;
    if data.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }
    let params = chunk_params(&state, chunk_size, overlap)?;

    let response = process_resume(&state, user_id, file_name, data, params).await?;
    Ok(Json(response))
}

/// POST /api/v1/resume/reprocess
pub async fn handle_reprocess(
    State(state): State<AppState>,
    Json(request): Json<ReprocessRequest>,
) -> Result<Json<ProcessResponse>, AppError> {
    let params = chunk_params(&state, request.chunk_size, request.overlap)?;
    let response = reprocess_resume(&state, request.user_id, params).await?;
    Ok(Json(response))
}

/// POST /api/v1/resume/search
pub async fn handle_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if request.query.trim().is_empty() {
        return Err(AppError::Validation("query cannot be empty".to_string()));
    }
    Ok(Json(search_resume(&state.retriever, request).await?))
}

/// POST /api/v1/resume/ask
pub async fn handle_ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    if request.question.trim().is_empty() {
        return Err(AppError::Validation("question cannot be empty".to_string()));
    }
    let response =
        answer_question(&state.retriever, state.synthesizer.as_ref(), request).await?;
    Ok(Json(response))
}

/// GET /api/v1/resume/stats
pub async fn handle_stats(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<StoreStats>, AppError> {
    Ok(Json(
        resume_stats(state.vector_store.as_ref(), params.user_id).await?,
    ))
}

/// DELETE /api/v1/resume
pub async fn handle_clear(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<ClearResponse>, AppError> {
    Ok(Json(clear_resume(&state, params.user_id).await?))
}
