//! PDF text extraction for uploaded resumes.

use bytes::Bytes;
use tracing::{debug, info};

use crate::errors::AppError;

/// Extracts and normalizes the text of an in-memory PDF.
///
/// `pdf-extract` is synchronous and CPU-bound, so the parse runs inside
/// `spawn_blocking` to keep the executor free.
pub async fn extract_text(pdf: Bytes) -> Result<String, AppError> {
    if !looks_like_pdf(&pdf) {
        return Err(AppError::UnprocessableEntity(
            "Uploaded file is not a PDF".to_string(),
        ));
    }

    let raw = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&pdf))
        .await
        .map_err(|e| {
            // pdf-extract panics on some malformed documents instead of returning Err.
            if e.is_panic() {
                AppError::UnprocessableEntity("PDF parser could not read this file".to_string())
            } else {
                AppError::Internal(anyhow::anyhow!("spawn_blocking failed in PDF extraction: {e}"))
            }
        })?
        .map_err(|e| AppError::UnprocessableEntity(format!("Could not read PDF: {e}")))?;

    debug!("Extracted {} raw characters from PDF", raw.chars().count());

    let text = clean_text(&raw);
    if text.is_empty() {
        return Err(AppError::Validation(
            "PDF contains no extractable text".to_string(),
        ));
    }

    info!("Extracted {} characters from PDF", text.chars().count());
    Ok(text)
}

/// Collapses every whitespace run (newlines included) to one space and trims.
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn looks_like_pdf(bytes: &[u8]) -> bool {
    // The header may be preceded by a little garbage; readers accept it within the first 1KB.
    let window = &bytes[..bytes.len().min(1024)];
    window.windows(5).any(|w| w == b"%PDF-")
}
