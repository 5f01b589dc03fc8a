//! Redis cache for query embeddings.
//!
//! Only single-text `embed` calls (the read path) are cached. Batch calls on the
//! write path pass straight through. Redis being down or stalled never fails a
//! request: every cache round trip is bounded by `CACHE_TIMEOUT` and any error
//! counts as a miss.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client as RedisClient;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Embedder, EmbeddingError};

const CACHE_TTL_SECS: u64 = 3600;
const CACHE_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("redis did not answer within {}ms", CACHE_TIMEOUT.as_millis())]
    Timeout,
}

pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    redis: RedisClient,
    /// Shared multiplexed connection, opened on first use and dropped after any failure.
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, redis: RedisClient) -> Self {
        Self {
            inner,
            redis,
            conn: Mutex::new(None),
        }
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self
            .redis
            .get_multiplexed_async_connection_with_timeouts(CACHE_TIMEOUT, CACHE_TIMEOUT)
            .await?;
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        let result = tokio::time::timeout(CACHE_TIMEOUT, op)
            .await
            .unwrap_or(Err(CacheError::Timeout));
        if result.is_err() {
            *self.conn.lock().await = None;
        }
        result
    }

    async fn lookup(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.bounded(async {
            let mut conn = self.connection().await?;
            let cached = redis::cmd("GET")
                .arg(key)
                .query_async::<_, Option<String>>(&mut conn)
                .await?;
            Ok::<_, CacheError>(cached)
        })
        .await
    }

    async fn store(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.bounded(async {
            let mut conn = self.connection().await?;
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("EX")
                .arg(CACHE_TTL_SECS)
                .query_async::<_, ()>(&mut conn)
                .await?;
            Ok::<_, CacheError>(())
        })
        .await
    }
}

pub fn cache_key(model: &str, text: &str) -> String {
    format!("embedding:{model}:{}", text.trim())
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.inner.embed_batch(texts).await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let key = cache_key(self.inner.model_name(), text);

        match self.lookup(&key).await {
            Ok(Some(cached)) => match serde_json::from_str::<Vec<f32>>(&cached) {
                Ok(vector) => {
                    debug!("Embedding cache hit");
                    return Ok(vector);
                }
                Err(e) => warn!("Discarding malformed cached embedding: {e}"),
            },
            Ok(None) => {}
            Err(e) => warn!("Embedding cache lookup failed: {e}"),
        }

        let vector = self.inner.embed(text).await?;

        match serde_json::to_string(&vector) {
            Ok(encoded) => {
                if let Err(e) = self.store(&key, &encoded).await {
                    warn!("Embedding cache write failed: {e}");
                }
            }
            Err(e) => warn!("Could not encode embedding for cache: {e}"),
        }

        Ok(vector)
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
