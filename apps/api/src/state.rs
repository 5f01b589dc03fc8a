use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::resume::retriever::Retriever;
use crate::resume::synthesizer::AnswerSynthesizer;
use crate::resume::vector_store::VectorStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub s3: S3Client,
    pub config: Config,
    /// Redis-cached HTTP embedder in production.
    pub embedder: Arc<dyn Embedder>,
    /// pgvector-backed store in production.
    pub vector_store: Arc<dyn VectorStore>,
    pub retriever: Retriever,
    /// LLM synthesizer when an Anthropic key is configured, keyword fallback otherwise.
    pub synthesizer: Arc<dyn AnswerSynthesizer>,
}

impl AppState {
    pub fn new(
        s3: S3Client,
        config: Config,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        synthesizer: Arc<dyn AnswerSynthesizer>,
    ) -> Self {
        let retriever = Retriever::new(embedder.clone(), vector_store.clone());
        Self {
            s3,
            config,
            embedder,
            vector_store,
            retriever,
            synthesizer,
        }
    }
}
