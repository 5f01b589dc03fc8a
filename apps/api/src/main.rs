mod config;
mod db;
mod embedding;
mod errors;
mod llm_client;
mod models;
mod resume;
mod routes;
mod state;
#[cfg(test)]
mod stub_http;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::embedding::{CachedEmbedder, Embedder, HttpEmbedder};
use crate::llm_client::LlmClient;
use crate::resume::synthesizer::{AnswerSynthesizer, KeywordSynthesizer, LlmSynthesizer};
use crate::resume::vector_store::PgVectorStore;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rolodex API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (pgvector) and apply migrations
    let db = create_pool(&config.database_url).await?;
    let vector_store = Arc::new(PgVectorStore::new(db));

    // Initialize Redis
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // Initialize embedding client, with the query cache in front of it
    let http_embedder = HttpEmbedder::new(
        &config.embedding_api_url,
        config.embedding_api_key.clone(),
        config.embedding_model.clone(),
        config.embedding_batch_size,
    )?;
    let embedder: Arc<dyn Embedder> =
        Arc::new(CachedEmbedder::new(Arc::new(http_embedder), redis));
    info!("Embedding client initialized (model: {})", embedder.model_name());

    // Initialize answer synthesizer (keyword fallback when no LLM key is configured)
    let synthesizer: Arc<dyn AnswerSynthesizer> = match &config.anthropic_api_key {
        Some(key) => {
            let llm = LlmClient::new(key.clone())?;
            info!("LLM client initialized (model: {})", llm_client::MODEL);
            Arc::new(LlmSynthesizer::new(llm))
        }
        None => {
            warn!("ANTHROPIC_API_KEY not set; answers will use keyword matching only");
            Arc::new(KeywordSynthesizer)
        }
    };

    info!(
        "Default chunking: {} chars with {} overlap",
        config.chunk_size, config.chunk_overlap
    );

    // Build app state
    let state = AppState::new(s3, config.clone(), embedder, vector_store, synthesizer);

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web front end has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "rolodex-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
