//! Text-to-vector embedding pipeline.
//!
//! [`EmbeddingProvider`] is the boundary the knowledge store consumes; the
//! shipped implementation runs all-MiniLM-L6-v2 locally (384 dimensions,
//! L2-normalized). [`embed_with_deadline`] is the async entry point: it moves
//! the blocking call off the runtime, bounds it with a timeout, and retries
//! transient failures.

pub mod local;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ExternalError;
use crate::retry::{with_retry_for, RetryPolicy};

/// Number of dimensions in every stored embedding.
pub const EMBEDDING_DIM: usize = 384;

/// Trait for embedding text into vectors.
///
/// Implementations produce vectors of exactly [`EMBEDDING_DIM`] dimensions.
/// Methods are synchronous; async callers go through [`embed_with_deadline`].
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for batched inference.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Create an embedding provider from config.
///
/// Only `"local"` is supported. Fails if model files are missing; run
/// `sift model download` first.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => {
            let provider = local::LocalEmbeddingProvider::new(config)?;
            Ok(Box::new(provider))
        }
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local"),
    }
}

/// Embed `text` on the blocking pool, bounded by `timeout` per attempt and
/// retried per `policy` on transient failures.
///
/// A vector of the wrong dimensionality, or one that is all zeros or holds a
/// NaN or infinity, is a permanent failure.
pub async fn embed_with_deadline(
    provider: &Arc<dyn EmbeddingProvider>,
    text: &str,
    timeout: Duration,
    policy: &RetryPolicy,
) -> Result<Vec<f32>, ExternalError> {
    with_retry_for(policy, ExternalError::is_transient, || {
        let provider = Arc::clone(provider);
        let text = text.to_owned();
        async move {
            let task = tokio::task::spawn_blocking(move || provider.embed(&text));
            let joined = tokio::time::timeout(timeout, task)
                .await
                .map_err(|_| ExternalError::Timeout {
                    operation: "embed",
                    after: timeout,
                })?;
            let embedding = joined
                .map_err(|e| ExternalError::Join {
                    operation: "embed",
                    message: e.to_string(),
                })?
                .map_err(|e| ExternalError::failed("embed", format!("{e:#}")))?;

            if embedding.len() != EMBEDDING_DIM {
                return Err(ExternalError::permanent(
                    "embed",
                    format!(
                        "expected {EMBEDDING_DIM} dimensions, got {}",
                        embedding.len()
                    ),
                ));
            }
            if let Some(reason) = degenerate(&embedding) {
                return Err(ExternalError::permanent("embed", reason));
            }
            Ok(embedding)
        }
    })
    .await
}

/// Why `embedding` can't be compared by cosine distance, if it can't.
fn degenerate(embedding: &[f32]) -> Option<&'static str> {
    if embedding.iter().any(|v| !v.is_finite()) {
        return Some("embedding contains non-finite values");
    }
    if embedding.iter().all(|v| *v == 0.0) {
        return Some("embedding has zero norm");
    }
    None
}
