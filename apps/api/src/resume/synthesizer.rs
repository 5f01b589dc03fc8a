//! Answer synthesis — turns retrieved chunks into an answer.
//!
//! `LlmSynthesizer` sends the assembled context to Claude and drops to
//! `KeywordSynthesizer` on any LLM failure, so a question always gets an answer.
//! `KeywordSynthesizer` alone is used when no Anthropic key is configured.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::LlmClient;
use crate::resume::prompts::{RESUME_QA_PROMPT, RESUME_QA_SYSTEM};
use crate::resume::retriever::RetrievedChunk;

pub const LLM_BACKEND: &str = "anthropic";
pub const FALLBACK_BACKEND: &str = "keyword_fallback";

/// Lines copied into a keyword-matched answer.
const MAX_MATCHED_LINES: usize = 3;

/// Words too common to count as a keyword hit.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "about", "any", "as", "at", "be", "by", "can", "did", "do", "does",
    "for", "from", "has", "have", "he", "her", "his", "how", "i", "in", "is", "it", "me", "of",
    "on", "or", "she", "tell", "that", "the", "their", "they", "this", "to", "was", "what",
    "when", "where", "which", "who", "with", "you", "your",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub backend: String,
}

/// Carried in `AppState` as `Arc<dyn AnswerSynthesizer>`.
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        question: &str,
        chunks: &[RetrievedChunk],
    ) -> Result<Answer, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Context assembly
// ────────────────────────────────────────────────────────────────────────────

/// Renders chunks, closest first, as `[Context N - Relevance: R]` blocks.
pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    let mut ordered: Vec<&RetrievedChunk> = chunks.iter().collect();
    ordered.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    ordered
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "[Context {} - Relevance: {:.2}]\n{}",
                i + 1,
                chunk.relevance,
                chunk.text.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fills the template in one pass, so braces inside the resume or the
/// question are never read as placeholders.
pub fn build_prompt(question: &str, context: &str) -> String {
    let filled = RESUME_QA_PROMPT.split_once("{context}").and_then(|(head, rest)| {
        rest.split_once("{question}")
            .map(|(middle, tail)| format!("{head}{context}{middle}{}{tail}", question.trim()))
    });
    filled.unwrap_or_else(|| format!("{context}\n\nQuestion: {}", question.trim()))
}

// ────────────────────────────────────────────────────────────────────────────
// LlmSynthesizer
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmSynthesizer {
    llm: LlmClient,
    fallback: KeywordSynthesizer,
}

impl LlmSynthesizer {
    pub fn new(llm: LlmClient) -> Self {
        Self {
            llm,
            fallback: KeywordSynthesizer,
        }
    }
}

#[async_trait]
impl AnswerSynthesizer for LlmSynthesizer {
    async fn synthesize(
        &self,
        question: &str,
        chunks: &[RetrievedChunk],
    ) -> Result<Answer, AppError> {
        let prompt = build_prompt(question, &build_context(chunks));

        match self.llm.complete(&prompt, RESUME_QA_SYSTEM).await {
            Ok(text) => {
                info!("Generated LLM answer from {} context chunks", chunks.len());
                Ok(Answer {
                    text,
                    backend: LLM_BACKEND.to_string(),
                })
            }
            Err(e) => {
                warn!("LLM answer generation failed, using keyword fallback: {e}");
                self.fallback.synthesize(question, chunks).await
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// KeywordSynthesizer
// ────────────────────────────────────────────────────────────────────────────

/// Keyword matching over the retrieved text. No network, deterministic.
///
/// 1. Chunk lines sharing a non-stopword with the question → first three, joined.
/// 2. Otherwise the closest chunk, prefixed by the question's category.
pub struct KeywordSynthesizer;

#[async_trait]
impl AnswerSynthesizer for KeywordSynthesizer {
    async fn synthesize(
        &self,
        question: &str,
        chunks: &[RetrievedChunk],
    ) -> Result<Answer, AppError> {
        Ok(Answer {
            text: keyword_answer(question, chunks),
            backend: FALLBACK_BACKEND.to_string(),
        })
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

fn question_keywords(question: &str) -> HashSet<String> {
    tokenize(question)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

pub fn keyword_answer(question: &str, chunks: &[RetrievedChunk]) -> String {
    let mut ordered: Vec<&RetrievedChunk> = chunks.iter().collect();
    ordered.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    let keywords = question_keywords(question);

    let mut seen = HashSet::new();
    let matched: Vec<&str> = ordered
        .iter()
        .flat_map(|c| c.text.lines())
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| tokenize(line).any(|w| keywords.contains(&w)))
        .filter(|line| seen.insert(*line))
        .take(MAX_MATCHED_LINES)
        .collect();

    if !matched.is_empty() {
        return format!("Based on the resume: {}", matched.join(" "));
    }

    let best = ordered.first().map(|c| c.text.trim()).unwrap_or_default();
    format!("{}{best}", category_prefix(question))
}

/// Prefix chosen by the first matching topic, checked in this order.
fn category_prefix(question: &str) -> &'static str {
    fn has_any(q: &str, words: &[&str]) -> bool {
        words.iter().any(|w| q.contains(w))
    }
    let q = question.to_lowercase();

    if has_any(&q, &["skill", "technology", "programming"]) {
        "Based on the resume, the technical skills include: "
    } else if has_any(&q, &["experience", "work", "job"]) {
        "Work experience summary: "
    } else if has_any(&q, &["education", "degree", "study"]) {
        "Educational background: "
    } else if has_any(&q, &["contact", "email", "phone"]) {
        "Contact information: "
    } else {
        "Based on the resume information: "
    }
}
